use anyhow::Result;
use clap::Args;
use ribscope::lens::rib::{AsnResolver, FamilySelection, PathLoader, SummaryReporter};
use ribscope::lens::utils::{OutputFormat, DEFAULT_NAME_MAX_LEN};
use ribscope::{GobgpClient, RibscopeConfig};

/// Arguments for the Summary command
#[derive(Args)]
pub struct SummaryArgs {
    /// Address families to summarize
    #[clap(long, value_enum, default_value = "both")]
    pub family: FamilySelection,

    /// Speaker endpoint, overriding the configured one
    #[clap(short, long)]
    pub endpoint: Option<String>,

    /// Maximum width of AS names in text output
    #[clap(long, default_value_t = DEFAULT_NAME_MAX_LEN)]
    pub name_width: usize,
}

pub fn run(config: &RibscopeConfig, args: SummaryArgs, output_format: OutputFormat) -> Result<()> {
    let SummaryArgs {
        family,
        endpoint,
        name_width,
    } = args;

    let endpoint = endpoint.unwrap_or_else(|| config.speaker_endpoint.clone());
    let speaker = GobgpClient::new(&endpoint, config.speaker_timeout())?;
    let mut resolver = AsnResolver::from_config(config)?;
    let reporter = SummaryReporter::new(name_width);

    let report = PathLoader::from_config(config, &speaker)
        .with_reporter(reporter.clone())
        .load(&family.families(), &mut resolver)?;

    println!("{}", reporter.render(&report.summary, output_format)?);
    Ok(())
}
