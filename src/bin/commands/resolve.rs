use anyhow::{anyhow, Result};
use clap::Args;
use ribscope::lens::rib::AsnResolver;
use ribscope::lens::utils::{to_psv, OutputFormat};
use ribscope::RibscopeConfig;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Arguments for the Resolve command
#[derive(Args)]
pub struct ResolveArgs {
    /// AS numbers to resolve, with or without the "AS" prefix
    #[clap(required = true)]
    pub asns: Vec<String>,
}

#[derive(Serialize, Tabled)]
struct ResolvedAsn {
    asn: u32,
    name: String,
}

pub fn run(config: &RibscopeConfig, args: ResolveArgs, output_format: OutputFormat) -> Result<()> {
    let asns = args
        .asns
        .iter()
        .map(|s| parse_asn(s))
        .collect::<Result<Vec<_>>>()?;

    let mut resolver = AsnResolver::from_config(config)?;
    let results: Vec<ResolvedAsn> = asns
        .into_iter()
        .map(|asn| ResolvedAsn {
            asn,
            name: resolver.resolve(asn),
        })
        .collect();

    let out = match output_format {
        OutputFormat::Table => Table::new(&results).with(Style::rounded()).to_string(),
        OutputFormat::Markdown => Table::new(&results).with(Style::markdown()).to_string(),
        OutputFormat::Json | OutputFormat::JsonPretty => output_format
            .to_json(&results)
            .map_err(|e| anyhow!("Failed to serialize results: {}", e))?,
        OutputFormat::Psv => to_psv(
            &["asn", "name"],
            results.iter().map(|r| vec![r.asn.to_string(), r.name.clone()]),
        ),
    };
    println!("{}", out);
    Ok(())
}

fn parse_asn(s: &str) -> Result<u32> {
    let digits = s
        .strip_prefix("AS")
        .or_else(|| s.strip_prefix("as"))
        .unwrap_or(s);
    digits
        .parse::<u32>()
        .map_err(|_| anyhow!("Invalid AS number '{}'", s))
}
