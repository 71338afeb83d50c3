//! Path attribute decoding
//!
//! The speaker hands out path attributes as self-describing envelopes: a type
//! tag such as `type.googleapis.com/apipb.AsPathAttribute` plus a protobuf
//! payload. [`AttributeDecoder`] finds the envelope for a requested attribute
//! and decodes it through an explicit registry of known schemas, keyed by the
//! message name at the end of the tag.

use crate::speaker::apipb;
use crate::speaker::AttributeEnvelope;
use prost::Message;
use std::fmt;

/// How a requested attribute name is matched against envelope tags
///
/// Both modes are case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Tag (or the message name part of it) equals the requested name
    Exact,
    /// Tag contains the requested name
    #[default]
    Substring,
}

/// Attribute schemas the decoder knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeKind {
    AsPath,
    NextHop,
    MpReach,
    Communities,
    AddressPrefix,
}

/// Registry of known attribute schemas, keyed by lowercase message name
const ATTRIBUTE_REGISTRY: &[(&str, AttributeKind)] = &[
    ("aspathattribute", AttributeKind::AsPath),
    ("nexthopattribute", AttributeKind::NextHop),
    ("mpreachnlriattribute", AttributeKind::MpReach),
    ("communitiesattribute", AttributeKind::Communities),
    ("ipaddressprefix", AttributeKind::AddressPrefix),
];

impl AttributeKind {
    /// Message name as it appears in envelope tags
    pub fn type_name(&self) -> &'static str {
        match self {
            AttributeKind::AsPath => "AsPathAttribute",
            AttributeKind::NextHop => "NextHopAttribute",
            AttributeKind::MpReach => "MpReachNLRIAttribute",
            AttributeKind::Communities => "CommunitiesAttribute",
            AttributeKind::AddressPrefix => "IPAddressPrefix",
        }
    }

    /// Resolve the schema for an envelope tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        let name = message_name(tag).to_lowercase();
        ATTRIBUTE_REGISTRY
            .iter()
            .find(|(registered, _)| *registered == name)
            .map(|(_, kind)| *kind)
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A decoded, strongly-typed path attribute
#[derive(Debug, Clone, PartialEq)]
pub enum PathAttribute {
    AsPath(apipb::AsPathAttribute),
    NextHop(apipb::NextHopAttribute),
    MpReach(apipb::MpReachNlriAttribute),
    Communities(apipb::CommunitiesAttribute),
    AddressPrefix(apipb::IpAddressPrefix),
}

impl PathAttribute {
    pub fn kind(&self) -> AttributeKind {
        match self {
            PathAttribute::AsPath(_) => AttributeKind::AsPath,
            PathAttribute::NextHop(_) => AttributeKind::NextHop,
            PathAttribute::MpReach(_) => AttributeKind::MpReach,
            PathAttribute::Communities(_) => AttributeKind::Communities,
            PathAttribute::AddressPrefix(_) => AttributeKind::AddressPrefix,
        }
    }
}

/// Failure to decode one field of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecodeError {
    /// Field being decoded, e.g. `asn_path`
    pub field: &'static str,
    pub reason: String,
}

impl FieldDecodeError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldDecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to decode {}: {}", self.field, self.reason)
    }
}

impl std::error::Error for FieldDecodeError {}

/// Finds and decodes attribute envelopes
pub struct AttributeDecoder;

impl AttributeDecoder {
    /// Find the first envelope whose tag matches `name`
    pub fn find<'a>(
        envelopes: &'a [AttributeEnvelope],
        name: &str,
        mode: MatchMode,
    ) -> Option<&'a AttributeEnvelope> {
        let wanted = name.to_lowercase();
        envelopes.iter().find(|env| {
            let tag = env.type_url.to_lowercase();
            match mode {
                MatchMode::Exact => tag == wanted || message_name(&tag) == wanted,
                MatchMode::Substring => tag.contains(&wanted),
            }
        })
    }

    /// Decode a single envelope into the schema registered for its tag
    pub fn decode_envelope(envelope: &AttributeEnvelope) -> Result<PathAttribute, String> {
        let kind = AttributeKind::from_tag(&envelope.type_url)
            .ok_or_else(|| format!("no schema registered for '{}'", envelope.type_url))?;

        let payload = envelope.value.as_slice();
        let decoded = match kind {
            AttributeKind::AsPath => {
                apipb::AsPathAttribute::decode(payload).map(PathAttribute::AsPath)
            }
            AttributeKind::NextHop => {
                apipb::NextHopAttribute::decode(payload).map(PathAttribute::NextHop)
            }
            AttributeKind::MpReach => {
                apipb::MpReachNlriAttribute::decode(payload).map(PathAttribute::MpReach)
            }
            AttributeKind::Communities => {
                apipb::CommunitiesAttribute::decode(payload).map(PathAttribute::Communities)
            }
            AttributeKind::AddressPrefix => {
                apipb::IpAddressPrefix::decode(payload).map(PathAttribute::AddressPrefix)
            }
        };

        decoded.map_err(|e| format!("invalid {} payload: {}", kind, e))
    }

    /// Find the envelope matching `name` and decode it
    ///
    /// Returns `Ok(None)` when no envelope matches; absence is not an error.
    pub fn decode(
        envelopes: &[AttributeEnvelope],
        name: &str,
        mode: MatchMode,
    ) -> Result<Option<PathAttribute>, String> {
        match Self::find(envelopes, name, mode) {
            Some(envelope) => Self::decode_envelope(envelope).map(Some),
            None => Ok(None),
        }
    }
}

/// Message name part of a type tag: `type.googleapis.com/apipb.NextHopAttribute` -> `NextHopAttribute`
fn message_name(tag: &str) -> &str {
    tag.rsplit(|c: char| c == '/' || c == '.').next().unwrap_or(tag)
}
