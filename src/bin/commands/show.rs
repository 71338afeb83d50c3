use anyhow::{anyhow, Result};
use clap::Args;
use ipnet::IpNet;
use ribscope::lens::utils::{to_psv, truncate_name, OutputFormat, DEFAULT_NAME_MAX_LEN};
use ribscope::{PathDocument, RibscopeConfig, RibscopeDatabase};
use serde_json::Value;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Arguments for the Show command
#[derive(Args)]
pub struct ShowArgs {
    /// Network to look up; stored prefixes inside it (or equal to it) are shown
    pub network: IpNet,
}

#[derive(Tabled)]
struct StoredPathRow {
    prefix: String,
    first_hop: String,
    asn_path: String,
    as_name: String,
    ixp: String,
    last_seen: String,
}

impl From<&PathDocument> for StoredPathRow {
    fn from(doc: &PathDocument) -> Self {
        let text = |key: &str| match doc.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let asn_path = doc
            .get("asn_path")
            .and_then(Value::as_array)
            .map(|asns| {
                asns.iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        StoredPathRow {
            prefix: doc.prefix().to_string(),
            first_hop: text("first_hop"),
            asn_path,
            as_name: truncate_name(&text("as_name"), DEFAULT_NAME_MAX_LEN),
            ixp: text("ixp"),
            last_seen: text("last_seen"),
        }
    }
}

pub fn run(config: &RibscopeConfig, args: ShowArgs, output_format: OutputFormat) -> Result<()> {
    let db = RibscopeDatabase::open(&config.sqlite_path())?;
    let docs = db.documents().find_within(&args.network.trunc())?;

    if docs.is_empty() && !output_format.is_json() {
        eprintln!("No stored paths inside {}", args.network);
        return Ok(());
    }

    let out = match output_format {
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let bodies: Vec<_> = docs.iter().map(|d| &d.fields).collect();
            output_format
                .to_json(&bodies)
                .map_err(|e| anyhow!("Failed to serialize documents: {}", e))?
        }
        OutputFormat::Table | OutputFormat::Markdown => {
            let rows: Vec<StoredPathRow> = docs.iter().map(StoredPathRow::from).collect();
            let mut table = Table::new(rows);
            if output_format == OutputFormat::Markdown {
                table.with(Style::markdown());
            } else {
                table.with(Style::rounded());
            }
            table.to_string()
        }
        OutputFormat::Psv => to_psv(
            &["prefix", "first_hop", "asn_path", "as_name", "ixp", "last_seen"],
            docs.iter().map(|d| {
                let r = StoredPathRow::from(d);
                vec![r.prefix, r.first_hop, r.asn_path, r.as_name, r.ixp, r.last_seen]
            }),
        ),
    };
    println!("{}", out);
    Ok(())
}
