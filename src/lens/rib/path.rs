//! Canonical path records and their derived properties

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;
use uuid::Uuid;

/// Label used when a first hop is not inside any configured IX subnet
pub const IXP_NOT_APPLICABLE: &str = "N/A";

/// Namespace for deterministic record ids
const RECORD_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_0d1e_4b7a_5f0c_9a3e_2d8b_7e41_c2a9);

/// Address family of a routing table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Both unicast families, in processing order
    pub const ALL: [AddressFamily; 2] = [AddressFamily::Ipv4, AddressFamily::Ipv6];

    /// Family of a network prefix
    pub fn of_prefix(prefix: &IpNet) -> Self {
        match prefix {
            IpNet::V4(_) => AddressFamily::Ipv4,
            IpNet::V6(_) => AddressFamily::Ipv6,
        }
    }

    /// Family of a single address
    pub fn of_addr(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

impl FromStr for AddressFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ipv4" | "v4" | "4" => Ok(AddressFamily::Ipv4),
            "ipv6" | "v6" | "6" => Ok(AddressFamily::Ipv6),
            _ => Err(format!("Unknown address family '{}'. Valid: ipv4, ipv6", s)),
        }
    }
}

/// An internet exchange subnet and its label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IxpSubnet {
    pub subnet: IpNet,
    pub label: String,
}

impl IxpSubnet {
    pub fn new(subnet: IpNet, label: impl Into<String>) -> Self {
        Self {
            subnet,
            label: label.into(),
        }
    }
}

/// Configured IX subnets per address family
///
/// Lookup walks the table in configuration order and the first containing
/// subnet wins; ordering most-specific-first is left to the operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IxpTable {
    pub ipv4: Vec<IxpSubnet>,
    pub ipv6: Vec<IxpSubnet>,
}

impl IxpTable {
    pub fn new(ipv4: Vec<IxpSubnet>, ipv6: Vec<IxpSubnet>) -> Self {
        Self { ipv4, ipv6 }
    }

    fn subnets(&self, family: AddressFamily) -> &[IxpSubnet] {
        match family {
            AddressFamily::Ipv4 => &self.ipv4,
            AddressFamily::Ipv6 => &self.ipv6,
        }
    }

    /// Label of the first configured subnet containing `addr`, or `"N/A"`
    pub fn classify(&self, addr: Option<IpAddr>) -> &str {
        let Some(addr) = addr else {
            return IXP_NOT_APPLICABLE;
        };

        self.subnets(AddressFamily::of_addr(&addr))
            .iter()
            .find(|entry| entry.subnet.contains(&addr))
            .map(|entry| entry.label.as_str())
            .unwrap_or(IXP_NOT_APPLICABLE)
    }
}

/// Normalized, de-duplicatable representation of one routing path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalPath {
    /// Destination network
    pub prefix: IpNet,
    /// Next hop addresses, in the order the speaker lists them
    pub next_hops: Vec<IpAddr>,
    /// AS numbers of the first AS-path segment
    pub asn_path: Vec<u32>,
    /// Standard community values
    pub communities: Vec<u32>,
    /// Peer that advertised the path
    pub neighbor: String,
    /// Speaker-assigned path source identifier
    pub source_id: String,
    /// When the speaker received the path
    pub age: DateTime<Utc>,
}

impl CanonicalPath {
    /// Address family, always that of `prefix`
    pub fn family(&self) -> AddressFamily {
        AddressFamily::of_prefix(&self.prefix)
    }

    /// First AS number of the AS path
    pub fn source_asn(&self) -> Option<u32> {
        self.asn_path.first().copied()
    }

    /// First next hop
    pub fn first_hop(&self) -> Option<IpAddr> {
        self.next_hops.first().copied()
    }

    /// IX label of the first hop
    pub fn ixp<'a>(&self, table: &'a IxpTable) -> &'a str {
        table.classify(self.first_hop())
    }

    /// Deterministic record id derived from prefix, first hop and source ASN
    pub fn record_id(&self) -> String {
        let first_hop = self
            .first_hop()
            .map(|h| h.to_string())
            .unwrap_or_else(|| "-".to_string());
        let source_asn = self
            .source_asn()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "-".to_string());
        let key = format!("{}|{}|{}", self.prefix, first_hop, source_asn);
        Uuid::new_v5(&RECORD_ID_NAMESPACE, key.as_bytes()).to_string()
    }

    /// Document fields describing this path
    ///
    /// Bookkeeping fields (`last_seen`, `first_seen`, `as_name`) are added by
    /// the persister.
    pub fn to_fields(&self, ixps: &IxpTable) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("id".to_string(), json!(self.record_id()));
        fields.insert("prefix".to_string(), json!(self.prefix.to_string()));
        fields.insert("family".to_string(), json!(self.family().to_string()));
        fields.insert(
            "next_hops".to_string(),
            json!(self
                .next_hops
                .iter()
                .map(|h| h.to_string())
                .collect::<Vec<_>>()),
        );
        fields.insert("first_hop".to_string(), json!(self.first_hop()));
        fields.insert("asn_path".to_string(), json!(self.asn_path));
        fields.insert("source_asn".to_string(), json!(self.source_asn()));
        fields.insert("communities".to_string(), json!(self.communities));
        fields.insert("neighbor".to_string(), json!(self.neighbor));
        fields.insert("source_id".to_string(), json!(self.source_id));
        fields.insert("age".to_string(), json!(self.age.to_rfc3339()));
        fields.insert("ixp".to_string(), json!(self.ixp(ixps)));
        fields
    }
}
