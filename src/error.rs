//! Public error surface.
//!
//! Per the error-handling design, almost nothing in this crate ever returns
//! a `Result` across the library boundary — transport and signalling errors
//! are recovered internally and only ever surfaced as a [`crate::events::CoreEvent::Log`].
//! [`CoreError`] exists solely for the handful of cases that *do* cross the
//! boundary: a failed [`crate::Core::new`] (fatal UDP bind) and a failed
//! [`crate::Core::join_room`] call.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("room name must not be empty")]
    EmptyRoomName,

    #[error("could not connect to signalling server: {0}")]
    Dial(#[source] anyhow::Error),

    #[error("local UDP bind failed: {0}")]
    Bind(#[source] std::io::Error),
}
