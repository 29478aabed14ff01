//! Core data model (spec §3): [`Endpoint`], [`Roster`], and the [`PeerKey`]
//! hairpin-avoidance rule. Shared between the signalling client and the
//! transport layer so both sides agree on exactly one notion of "which
//! address is this peer at".

use serde::{Deserialize, Serialize};

/// Where a client can be reached: its public address, its private (LAN)
/// address, and the UDP port — identical on both sides of the NAT when
/// full-cone/restricted-cone hole-punching succeeds.
///
/// `port` is serialised as a string on the wire (matching the signalling
/// service's JSON contract in spec §6), but used as a `u16` everywhere else
/// in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub public_ip: String,
    pub private_ip: String,
    #[serde(with = "port_as_string")]
    pub port: u16,
}

/// The authoritative membership list of a room, as delivered by the
/// signalling service. Each delivery replaces the previous one in full.
pub type Roster = Vec<Endpoint>;

/// The textual `"ip:port"` form of the target address chosen for a peer.
/// This is the only identity used by the transport and reassembly layers.
pub type PeerKey = String;

/// Hairpin avoidance (spec §3, §8 scenario 4): if the peer's public IP
/// equals ours, address it by its private IP — most NATs will not route a
/// packet back out and in to a sibling behind the same NAT. Otherwise use
/// its public IP.
pub fn peer_key_for(local: &Endpoint, remote: &Endpoint) -> PeerKey {
    let ip = if !local.public_ip.is_empty() && remote.public_ip == local.public_ip {
        &remote.private_ip
    } else {
        &remote.public_ip
    };
    format!("{ip}:{}", remote.port)
}

mod port_as_string {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(port: &u16, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&port.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u16>().map_err(D::Error::custom)
    }
}
