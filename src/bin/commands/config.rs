use anyhow::{anyhow, Result};
use clap::Args;
use ribscope::database::{AsnNameCache, SchemaManager, SchemaStatus, SCHEMA_VERSION};
use ribscope::lens::utils::OutputFormat;
use ribscope::{RibscopeConfig, RibscopeDatabase};
use serde::Serialize;
use std::path::Path;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// Also open the stores and report their contents
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    speaker_endpoint: String,
    own_asn: u32,
    own_name: String,
    document_store: StoreInfo,
    asn_cache: StoreInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    documents_by_family: Option<Vec<(String, u64)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_load: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cached_names: Option<u64>,
}

#[derive(Debug, Serialize)]
struct StoreInfo {
    path: String,
    exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<u64>,
}

impl StoreInfo {
    fn new(path: String) -> Self {
        let meta = std::fs::metadata(&path).ok();
        StoreInfo {
            exists: meta.is_some(),
            size_bytes: meta.map(|m| m.len()),
            path,
        }
    }
}

pub fn run(config: &RibscopeConfig, args: ConfigArgs, output_format: OutputFormat) -> Result<()> {
    let mut info = ConfigInfo {
        config_file: RibscopeConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        speaker_endpoint: config.speaker_endpoint.clone(),
        own_asn: config.own_asn,
        own_name: config.own_name.clone(),
        document_store: StoreInfo::new(config.sqlite_path()),
        asn_cache: StoreInfo::new(config.asn_cache_path()),
        documents_by_family: None,
        last_load: None,
        cached_names: None,
    };

    let mut schema_line = None;
    if args.verbose {
        if Path::new(&config.sqlite_path()).exists() {
            let db = RibscopeDatabase::open(&config.sqlite_path())?;
            info.documents_by_family = Some(db.documents().count_by_family()?);
            info.last_load = db.get_meta("last_load")?;
            let status = SchemaManager::new(db.connection()).check_status()?;
            schema_line = Some(match status {
                SchemaStatus::Current => format!("v{} (current)", SCHEMA_VERSION),
                other => format!("{:?}", other),
            });
        }
        if info.asn_cache.exists {
            info.cached_names = Some(AsnNameCache::open(&config.asn_cache_path())?.len()?);
        }
    }

    if output_format.is_json() {
        let out = output_format
            .to_json(&info)
            .map_err(|e| anyhow!("Failed to serialize config info: {}", e))?;
        println!("{}", out);
        return Ok(());
    }

    println!("Config File:        {}", info.config_file);
    println!("{}", config.summary());
    if let Some(schema) = schema_line {
        println!("Schema:             {}", schema);
    }
    if let Some(families) = &info.documents_by_family {
        for (family, count) in families {
            println!("Stored {:<12}{} paths", format!("{}:", family), count);
        }
    }
    if let Some(last_load) = &info.last_load {
        println!("Last Load:          {}", last_load);
    }
    if let Some(names) = info.cached_names {
        println!("Cached Names:       {}", names);
    }
    Ok(())
}
