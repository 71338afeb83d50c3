use clap::{Parser, Subcommand};
use ribscope::lens::utils::OutputFormat;
use ribscope::RibscopeConfig;
use tracing::Level;

mod commands;

use commands::config::ConfigArgs;
use commands::load::LoadArgs;
use commands::resolve::ResolveArgs;
use commands::show::ShowArgs;
use commands::summary::SummaryArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.ribscope/ribscope.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long, global = true)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, psv
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull the speaker's routing tables, store the paths and print the origin summary
    Load(LoadArgs),

    /// Pull the speaker's routing tables and print the origin summary without storing
    Summary(SummaryArgs),

    /// Resolve AS numbers to names through the shared cache and registry
    Resolve(ResolveArgs),

    /// Show stored paths inside a network
    Show(ShowArgs),

    /// Show configuration and store status
    Config(ConfigArgs),
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match RibscopeConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Load(args) => commands::load::run(&config, args, cli.format),
        Commands::Summary(args) => commands::summary::run(&config, args, cli.format),
        Commands::Resolve(args) => commands::resolve::run(&config, args, cli.format),
        Commands::Show(args) => commands::show::run(&config, args, cli.format),
        Commands::Config(args) => commands::config::run(&config, args, cli.format),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}
