use anyhow::Result;
use chrono::Utc;
use clap::Args;
use ribscope::database::ensure_data_dir;
use ribscope::lens::rib::{AsnResolver, FamilySelection, LoadReport, PathLoader, SummaryReporter};
use ribscope::lens::utils::OutputFormat;
use ribscope::{GobgpClient, RibscopeConfig, RibscopeDatabase};

/// Arguments for the Load command
#[derive(Args)]
pub struct LoadArgs {
    /// Address families to load
    #[clap(long, value_enum, default_value = "both")]
    pub family: FamilySelection,

    /// Speaker endpoint, overriding the configured one
    #[clap(short, long)]
    pub endpoint: Option<String>,

    /// Hide the progress bar
    #[clap(short, long)]
    pub quiet: bool,
}

pub fn run(config: &RibscopeConfig, args: LoadArgs, output_format: OutputFormat) -> Result<()> {
    let LoadArgs {
        family,
        endpoint,
        quiet,
    } = args;

    let endpoint = endpoint.unwrap_or_else(|| config.speaker_endpoint.clone());
    let speaker = GobgpClient::new(&endpoint, config.speaker_timeout())?;
    ensure_data_dir(&config.data_dir)?;
    let db = RibscopeDatabase::open(&config.sqlite_path())?;
    let docs = db.documents();
    let mut resolver = AsnResolver::from_config(config)?;

    let loader = PathLoader::from_config(config, &speaker).with_store(&docs);
    let callback = (!quiet).then(super::progress_callback);
    let report = loader.load_with_progress(&family.families(), &mut resolver, callback)?;

    db.set_meta("last_load", &Utc::now().to_rfc3339())?;

    print_persist_stats(&report);
    let out = SummaryReporter::default().render(&report.summary, output_format)?;
    println!("{}", out);
    Ok(())
}

fn print_persist_stats(report: &LoadReport) {
    for family in &report.families {
        let Some(persist) = &family.persist else {
            continue;
        };
        let name = family.family.map(|f| f.to_string()).unwrap_or_default();
        eprintln!(
            "{}: {} created, {} updated, {} failed ({} discarded, {} blacklisted)",
            name,
            persist.created,
            persist.updated,
            persist.failed.len(),
            family.discarded,
            family.blacklisted
        );
        for failure in &persist.failed {
            eprintln!("  failed {} ({}): {}", failure.prefix, failure.id, failure.error);
        }
    }
}
