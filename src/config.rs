use crate::lens::rib::{IxpSubnet, IxpTable};
use anyhow::{anyhow, Result};
use config::Config;
use ipnet::IpNet;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default RIPEstat endpoint used for ASN name lookups
pub const DEFAULT_REGISTRY_URL: &str = "https://stat.ripe.net/data/as-overview/data.json";

pub struct RibscopeConfig {
    /// Path to the directory to hold ribscope's data
    pub data_dir: String,

    /// Target database identifier; the document store lives at `{data_dir}/{database}.sqlite3`
    pub database: String,

    /// gRPC endpoint of the BGP speaker
    pub speaker_endpoint: String,

    /// Timeout for connecting to and listing paths from the speaker
    pub speaker_timeout_secs: u64,

    /// The operator's own AS number (0 when unset)
    pub own_asn: u32,

    /// Name reported for `own_asn` without any lookup
    pub own_name: String,

    /// Locally originated aggregates used by the local-origin heuristic
    pub local_aggregates: Vec<IpNet>,

    /// Networks whose more-specifics are never stored nor counted
    pub blacklist: Vec<IpNet>,

    /// Internet exchange subnets, in configuration order
    pub ixps: IxpTable,

    /// TTL for shared ASN name cache entries in seconds (default: 20 minutes)
    pub asn_cache_ttl_secs: u64,

    /// ASN registry lookup endpoint
    pub registry_url: String,

    /// Timeout for a single registry lookup
    pub registry_timeout_secs: u64,

    /// Extra attempts for a failed document write
    pub persist_retries: u32,
}

const EMPTY_CONFIG: &str = r#"### ribscope configuration file

### directory for data used by ribscope
# data_dir = "~/.ribscope"

### document store name, stored as {data_dir}/{database}.sqlite3
# database = "ribscope"

### BGP speaker (GoBGP gRPC API)
# speaker_endpoint = "http://127.0.0.1:50051"
# speaker_timeout_secs = 30

### local network identity
# own_asn = 64500
# own_name = "Example Network"
# local_aggregates = ["203.0.113.0/24", "2001:db8::/32"]

### prefixes never stored nor counted
# blacklist = ["0.0.0.0/0", "::/0"]
### (as environment variables, lists are comma separated:
###  RIBSCOPE_BLACKLIST="0.0.0.0/0,::/0")

### internet exchange subnets, first match wins
# [[ixp.ipv4]]
# subnet = "192.0.2.0/24"
# label = "EXAMPLE-IX"

### ASN name resolution
# asn_cache_ttl_secs = 1200
# registry_url = "https://stat.ripe.net/data/as-overview/data.json"
# registry_timeout_secs = 10

### extra attempts for failed document writes
# persist_retries = 1
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    data_dir: Option<String>,
    database: Option<String>,
    speaker_endpoint: Option<String>,
    speaker_timeout_secs: Option<u64>,
    own_asn: Option<u32>,
    own_name: Option<String>,
    local_aggregates: Vec<String>,
    blacklist: Vec<String>,
    ixp: IxpSection,
    asn_cache_ttl_secs: Option<u64>,
    registry_url: Option<String>,
    registry_timeout_secs: Option<u64>,
    persist_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IxpSection {
    ipv4: Vec<IxpEntry>,
    ipv6: Vec<IxpEntry>,
}

#[derive(Debug, Deserialize)]
struct IxpEntry {
    subnet: String,
    label: String,
}

impl Default for RibscopeConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.ribscope", home_dir),
            database: "ribscope".to_string(),
            speaker_endpoint: "http://127.0.0.1:50051".to_string(),
            speaker_timeout_secs: 30,
            own_asn: 0,
            own_name: String::new(),
            local_aggregates: vec![],
            blacklist: vec![],
            ixps: IxpTable::default(),
            asn_cache_ttl_secs: 1200, // 20 minutes
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            registry_timeout_secs: 10,
            persist_retries: 1,
        }
    }
}

impl RibscopeConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<RibscopeConfig> {
        let mut builder = Config::builder();

        // By default use $HOME/.ribscope/ribscope.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        // Config dir
        let ribscope_dir = format!("{}/.ribscope", home_dir.as_str());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(ribscope_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create ribscope directory: {}", e))?;
                let p = format!("{}/ribscope.toml", ribscope_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of RIBSCOPE)
        // E.g., `RIBSCOPE_OWN_ASN=64500 ./ribscope load` would set the local ASN
        builder = builder.add_source(environment());

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let file = settings
            .try_deserialize::<FileConfig>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_file_config(file)
    }

    /// Build a configuration from TOML text, without touching the filesystem or environment
    pub fn from_toml_str(content: &str) -> Result<RibscopeConfig> {
        let settings = Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let file = settings
            .try_deserialize::<FileConfig>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_file_config(file)
    }

    fn from_file_config(file: FileConfig) -> Result<RibscopeConfig> {
        let defaults = RibscopeConfig::default();

        // Parse data directory
        let data_dir = match file.data_dir {
            Some(p) => expand_home(p.as_str()),
            None => defaults.data_dir,
        };

        let ixps = IxpTable::new(
            parse_ixp_entries("ixp.ipv4", file.ixp.ipv4)?,
            parse_ixp_entries("ixp.ipv6", file.ixp.ipv6)?,
        );

        Ok(RibscopeConfig {
            data_dir,
            database: file.database.unwrap_or(defaults.database),
            speaker_endpoint: file.speaker_endpoint.unwrap_or(defaults.speaker_endpoint),
            speaker_timeout_secs: file
                .speaker_timeout_secs
                .unwrap_or(defaults.speaker_timeout_secs),
            own_asn: file.own_asn.unwrap_or(defaults.own_asn),
            own_name: file.own_name.unwrap_or(defaults.own_name),
            local_aggregates: parse_networks("local_aggregates", &file.local_aggregates)?,
            blacklist: parse_networks("blacklist", &file.blacklist)?,
            ixps,
            asn_cache_ttl_secs: file
                .asn_cache_ttl_secs
                .unwrap_or(defaults.asn_cache_ttl_secs),
            registry_url: file.registry_url.unwrap_or(defaults.registry_url),
            registry_timeout_secs: file
                .registry_timeout_secs
                .unwrap_or(defaults.registry_timeout_secs),
            persist_retries: file.persist_retries.unwrap_or(defaults.persist_retries),
        })
    }

    /// Get the path to the SQLite document store
    pub fn sqlite_path(&self) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/{}.sqlite3", data_dir, self.database)
    }

    /// Get the path to the shared ASN name cache
    pub fn asn_cache_path(&self) -> String {
        let data_dir = self.data_dir.trim_end_matches('/');
        format!("{}/asn-cache.sqlite3", data_dir)
    }

    /// Get speaker timeout as Duration
    pub fn speaker_timeout(&self) -> Duration {
        Duration::from_secs(self.speaker_timeout_secs)
    }

    /// Get ASN cache TTL as Duration
    pub fn asn_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.asn_cache_ttl_secs)
    }

    /// Get registry lookup timeout as Duration
    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let join = |nets: &[IpNet]| {
            if nets.is_empty() {
                "(none)".to_string()
            } else {
                nets.iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        };

        let lines = vec![
            format!("Data Directory:     {}", self.data_dir),
            format!("Document Store:     {}", self.sqlite_path()),
            format!("ASN Cache:          {}", self.asn_cache_path()),
            format!("Speaker Endpoint:   {}", self.speaker_endpoint),
            format!("Speaker Timeout:    {} seconds", self.speaker_timeout_secs),
            format!("Own ASN:            {} ({})", self.own_asn, self.own_name),
            format!("Local Aggregates:   {}", join(&self.local_aggregates)),
            format!("Blacklist:          {}", join(&self.blacklist)),
            format!(
                "IX Subnets:         {} IPv4, {} IPv6",
                self.ixps.ipv4.len(),
                self.ixps.ipv6.len()
            ),
            format!("ASN Cache TTL:      {} seconds", self.asn_cache_ttl_secs),
            format!("Registry URL:       {}", self.registry_url),
        ];

        lines.join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.ribscope/ribscope.toml", home_dir)
    }
}

/// `RIBSCOPE_*` variables; network lists are comma separated,
/// e.g. `RIBSCOPE_BLACKLIST=0.0.0.0/0,::/0`
fn environment() -> config::Environment {
    config::Environment::with_prefix("RIBSCOPE")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("local_aggregates")
        .with_list_parse_key("blacklist")
}

fn expand_home(path: &str) -> String {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => format!("{}/{}", home.to_string_lossy(), rest),
            None => path.to_string(),
        },
        None => path.to_string(),
    }
}

/// Parse a list of CIDR strings, normalizing host bits away
fn parse_networks(field: &str, values: &[String]) -> Result<Vec<IpNet>> {
    values
        .iter()
        .map(|v| {
            v.trim()
                .parse::<IpNet>()
                .map(|n| n.trunc())
                .map_err(|e| anyhow!("Invalid network '{}' in {}: {}", v, field, e))
        })
        .collect()
}

fn parse_ixp_entries(field: &str, entries: Vec<IxpEntry>) -> Result<Vec<IxpSubnet>> {
    entries
        .into_iter()
        .map(|entry| {
            let subnet = entry
                .subnet
                .trim()
                .parse::<IpNet>()
                .map_err(|e| anyhow!("Invalid subnet '{}' in {}: {}", entry.subnet, field, e))?;
            Ok(IxpSubnet::new(subnet.trunc(), entry.label))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config = RibscopeConfig::from_toml_str("").unwrap();
        assert_eq!(config.database, "ribscope");
        assert_eq!(config.asn_cache_ttl_secs, 1200);
        assert_eq!(config.own_asn, 0);
        assert!(config.blacklist.is_empty());
        assert!(config.sqlite_path().ends_with("/ribscope.sqlite3"));
    }

    #[test]
    fn test_full_toml() {
        let config = RibscopeConfig::from_toml_str(
            r#"
            data_dir = "/tmp/ribscope-test/"
            database = "lg"
            own_asn = 64500
            own_name = "Example Network"
            local_aggregates = ["203.0.113.0/24", "2001:db8::/32"]
            blacklist = ["198.51.100.7/24"]

            [[ixp.ipv4]]
            subnet = "192.0.2.0/24"
            label = "IX-A"

            [[ixp.ipv4]]
            subnet = "192.0.2.0/25"
            label = "IX-B"
            "#,
        )
        .unwrap();

        assert_eq!(config.sqlite_path(), "/tmp/ribscope-test/lg.sqlite3");
        assert_eq!(config.own_asn, 64500);
        assert_eq!(config.local_aggregates.len(), 2);
        // host bits are dropped
        assert_eq!(config.blacklist[0].to_string(), "198.51.100.0/24");
        assert_eq!(config.ixps.ipv4.len(), 2);
        assert_eq!(config.ixps.ipv4[0].label, "IX-A");
        assert!(config.ixps.ipv6.is_empty());
    }

    #[test]
    fn test_network_lists_from_environment() {
        let vars: config::Map<String, String> = [
            ("RIBSCOPE_BLACKLIST", "10.0.0.0/8"),
            ("RIBSCOPE_LOCAL_AGGREGATES", "203.0.113.0/24,2001:db8::/32"),
            ("RIBSCOPE_OWN_ASN", "64500"),
            ("RIBSCOPE_OWN_NAME", "Example Network"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let file = Config::builder()
            .add_source(environment().source(Some(vars)))
            .build()
            .unwrap()
            .try_deserialize::<FileConfig>()
            .unwrap();
        let config = RibscopeConfig::from_file_config(file).unwrap();

        assert_eq!(config.blacklist, vec!["10.0.0.0/8".parse::<IpNet>().unwrap()]);
        assert_eq!(config.local_aggregates.len(), 2);
        assert_eq!(config.local_aggregates[1].to_string(), "2001:db8::/32");
        assert_eq!(config.own_asn, 64500);
        assert_eq!(config.own_name, "Example Network");
    }

    #[test]
    fn test_invalid_network_is_rejected() {
        let res = RibscopeConfig::from_toml_str(r#"blacklist = ["not-a-prefix"]"#);
        let err = res.err().unwrap().to_string();
        assert!(err.contains("not-a-prefix"));
        assert!(err.contains("blacklist"));
    }

    #[test]
    fn test_summary() {
        let config = RibscopeConfig::default();
        let summary = config.summary();
        assert!(summary.contains("Speaker Endpoint"));
        assert!(summary.contains("(none)"));
    }
}
