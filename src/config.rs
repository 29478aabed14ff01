//! Runtime configuration.
//!
//! Everything here has a sane default so a caller only needs to set
//! [`Config::signalling_host`]. There is no config file and no environment
//! variable lookup in this crate — per spec, the signalling host is either
//! compiled in or supplied externally by the (out-of-scope) shell.

use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_public_ip_reflector() -> String {
    "https://api.ipify.org".to_string()
}

fn default_public_ip_timeout_secs() -> u64 {
    3
}

fn default_bucket_ttl_secs() -> u64 {
    2
}

fn default_eviction_interval_secs() -> u64 {
    1
}

fn default_max_buckets_per_sender() -> usize {
    16
}

fn default_punch_attempts() -> u32 {
    10
}

fn default_punch_interval_ms() -> u64 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// `host[:port]` of the signalling service, e.g. `"signal.example.com"`.
    /// The `ws://<host>/ws?room=<room>` URL is built from this at
    /// [`crate::Core::join_room`] time.
    pub signalling_host: String,

    /// HTTPS endpoint that echoes the caller's public IP as plain text.
    #[serde(default = "default_public_ip_reflector")]
    pub public_ip_reflector: String,

    /// Ceiling on public-IP discovery so a flaky reflector can never stall
    /// startup (spec §5).
    #[serde(default = "default_public_ip_timeout_secs")]
    pub public_ip_timeout_secs: u64,

    /// Reassembly bucket age-out, in seconds (spec §4.7).
    #[serde(default = "default_bucket_ttl_secs")]
    pub bucket_ttl_secs: u64,

    /// How often the background sweep walks every live bucket, in seconds.
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,

    /// Cap on live reassembly buckets per sender (spec §9 open question).
    #[serde(default = "default_max_buckets_per_sender")]
    pub max_buckets_per_sender: usize,

    /// Number of priming datagrams per hole-punch burst (spec §4.4).
    #[serde(default = "default_punch_attempts")]
    pub punch_attempts: u32,

    /// Spacing between priming datagrams, in milliseconds.
    #[serde(default = "default_punch_interval_ms")]
    pub punch_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            signalling_host: String::new(),
            public_ip_reflector: default_public_ip_reflector(),
            public_ip_timeout_secs: default_public_ip_timeout_secs(),
            bucket_ttl_secs: default_bucket_ttl_secs(),
            eviction_interval_secs: default_eviction_interval_secs(),
            max_buckets_per_sender: default_max_buckets_per_sender(),
            punch_attempts: default_punch_attempts(),
            punch_interval_ms: default_punch_interval_ms(),
        }
    }
}

impl Config {
    pub fn public_ip_timeout(&self) -> Duration {
        Duration::from_secs(self.public_ip_timeout_secs)
    }

    pub fn bucket_ttl(&self) -> Duration {
        Duration::from_secs(self.bucket_ttl_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    pub fn punch_interval(&self) -> Duration {
        Duration::from_millis(self.punch_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert_eq!(cfg.bucket_ttl_secs, 2);
        assert_eq!(cfg.max_buckets_per_sender, 16);
        assert_eq!(cfg.punch_attempts, 10);
    }

    #[test]
    fn roundtrips_through_json_with_partial_input() {
        let json = serde_json::json!({ "signalling_host": "room.example.com" });
        let cfg: Config = serde_json::from_value(json).unwrap();
        assert_eq!(cfg.signalling_host, "room.example.com");
        assert_eq!(cfg.bucket_ttl_secs, default_bucket_ttl_secs());
    }
}
