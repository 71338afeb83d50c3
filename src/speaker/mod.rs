//! BGP speaker access
//!
//! This module defines the seam between ribscope and the BGP speaker whose
//! routing table is being pulled:
//!
//! - [`RawPath`]: a transport-neutral representation of one path as listed by
//!   the speaker, with its attributes still wrapped in typed envelopes.
//! - [`AttributeEnvelope`]: a self-describing attribute (type tag + payload).
//! - [`BgpSpeaker`]: the `ListPath(family)` operation.
//! - [`GobgpClient`]: a gRPC client for GoBGP's `GobgpApi/ListPath`.
//!
//! The speaker itself (sessions, RIB, best-path selection) is never
//! reimplemented here.

mod gobgp;

/// Protobuf types generated from `proto/gobgp.proto`
pub mod apipb {
    tonic::include_proto!("apipb");
}

pub use gobgp::GobgpClient;

use crate::lens::rib::AddressFamily;
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Type URL prefix used by protobuf `Any` envelopes of the GoBGP API
pub const APIPB_TYPE_URL_PREFIX: &str = "type.googleapis.com/apipb.";

/// A self-describing attribute envelope: a type tag plus an opaque payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeEnvelope {
    /// Type tag, e.g. `type.googleapis.com/apipb.AsPathAttribute`
    pub type_url: String,
    /// Protobuf-encoded attribute body
    pub value: Vec<u8>,
}

impl AttributeEnvelope {
    pub fn new(type_url: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            type_url: type_url.into(),
            value,
        }
    }

    /// Wrap a GoBGP API message, tagging it with its `apipb` message name
    pub fn pack<M: prost::Message>(message_name: &str, message: &M) -> Self {
        Self {
            type_url: format!("{}{}", APIPB_TYPE_URL_PREFIX, message_name),
            value: message.encode_to_vec(),
        }
    }
}

impl From<prost_types::Any> for AttributeEnvelope {
    fn from(any: prost_types::Any) -> Self {
        Self {
            type_url: any.type_url,
            value: any.value,
        }
    }
}

/// One path as listed by the BGP speaker, before normalization
#[derive(Debug, Clone, Default)]
pub struct RawPath {
    /// Envelope carrying the path's network layer reachability (address prefix)
    pub nlri: Option<AttributeEnvelope>,
    /// Path attribute envelopes
    pub pattrs: Vec<AttributeEnvelope>,
    /// Seconds since the path was received
    pub age_secs: i64,
    /// Address of the peer that advertised the path
    pub neighbor_ip: String,
    /// Speaker-assigned path source identifier
    pub source_id: String,
    /// Speaker-reported source ASN
    pub source_asn: u32,
}

impl RawPath {
    /// Convert a listed API path, turning its receive timestamp into an age
    /// relative to `listed_at`
    ///
    /// A missing or zero timestamp gives age 0, and a timestamp ahead of
    /// `listed_at` (speaker clock skew) is clamped to 0.
    pub fn from_api(path: apipb::Path, listed_at: DateTime<Utc>) -> Self {
        let age_secs = path
            .age
            .filter(|ts| ts.seconds > 0)
            .map(|ts| listed_at.timestamp().saturating_sub(ts.seconds).max(0))
            .unwrap_or(0);

        Self {
            nlri: path.nlri.map(AttributeEnvelope::from),
            pattrs: path.pattrs.into_iter().map(AttributeEnvelope::from).collect(),
            age_secs,
            neighbor_ip: path.neighbor_ip,
            source_id: path.source_id,
            source_asn: path.source_asn,
        }
    }
}

/// Access to a BGP speaker's routing table
pub trait BgpSpeaker {
    /// List all paths of one address family's unicast table
    fn list_path(&self, family: AddressFamily) -> Result<Vec<RawPath>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_envelope() {
        let attr = apipb::NextHopAttribute {
            next_hop: "192.0.2.1".to_string(),
        };
        let env = AttributeEnvelope::pack("NextHopAttribute", &attr);
        assert_eq!(
            env.type_url,
            "type.googleapis.com/apipb.NextHopAttribute"
        );
        assert!(!env.value.is_empty());
    }

    fn listed_at() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_raw_path_from_api_path() {
        let path = apipb::Path {
            nlri: Some(prost_types::Any {
                type_url: "type.googleapis.com/apipb.IPAddressPrefix".to_string(),
                value: vec![],
            }),
            age: Some(prost_types::Timestamp {
                seconds: 1_700_000_000 - 42,
                nanos: 0,
            }),
            neighbor_ip: "192.0.2.1".to_string(),
            source_id: "10.0.0.1".to_string(),
            source_asn: 64501,
            ..Default::default()
        };

        let raw = RawPath::from_api(path, listed_at());
        assert_eq!(raw.age_secs, 42);
        assert_eq!(raw.neighbor_ip, "192.0.2.1");
        assert_eq!(raw.source_asn, 64501);
        assert!(raw.pattrs.is_empty());
        assert!(raw.nlri.is_some());
    }

    #[test]
    fn test_receive_time_edge_cases() {
        let at = |seconds: i64| apipb::Path {
            age: Some(prost_types::Timestamp { seconds, nanos: 0 }),
            ..Default::default()
        };

        // unset timestamp
        assert_eq!(RawPath::from_api(apipb::Path::default(), listed_at()).age_secs, 0);
        // epoch is treated as unset
        assert_eq!(RawPath::from_api(at(0), listed_at()).age_secs, 0);
        // speaker clock ahead of ours
        assert_eq!(RawPath::from_api(at(1_700_000_005), listed_at()).age_secs, 0);
    }

    #[test]
    fn test_decode_gobgpd_path_bytes() {
        use prost::encoding;
        use prost::Message;

        let family = apipb::Family {
            afi: 1,
            safi: 1,
        };
        let received = prost_types::Timestamp {
            seconds: 1_700_000_000 - 600,
            nanos: 0,
        };
        let validation = apipb::Validation {
            state: 2,
            reason: 0,
        };

        // field layout as sent by gobgpd
        let mut buf = Vec::new();
        encoding::message::encode(3, &received, &mut buf);
        encoding::bool::encode(4, &true, &mut buf);
        encoding::message::encode(7, &validation, &mut buf);
        encoding::bool::encode(8, &false, &mut buf);
        encoding::message::encode(9, &family, &mut buf);
        encoding::uint32::encode(10, &64501u32, &mut buf);
        encoding::string::encode(11, &"10.0.0.1".to_string(), &mut buf);
        encoding::bool::encode(14, &true, &mut buf);
        encoding::string::encode(15, &"192.0.2.1".to_string(), &mut buf);
        encoding::bytes::encode(16, &vec![0xab; 16], &mut buf);
        encoding::uint32::encode(18, &7u32, &mut buf);

        let path = apipb::Path::decode(buf.as_slice()).unwrap();
        assert!(path.best);
        assert_eq!(path.family, Some(family));
        assert_eq!(path.source_asn, 64501);
        assert_eq!(path.source_id, "10.0.0.1");
        assert!(path.is_from_external);
        assert_eq!(path.neighbor_ip, "192.0.2.1");
        assert_eq!(path.identifier, 7);

        let raw = RawPath::from_api(path, listed_at());
        assert_eq!(raw.age_secs, 600);
        assert_eq!(raw.source_asn, 64501);
        assert_eq!(raw.neighbor_ip, "192.0.2.1");
    }
}
