use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mgit::{Config, MultiSource, SyncEngine, SyncSummary};

#[derive(Parser)]
#[command(name = "mgit")]
#[command(about = "Discover, clone and fetch every git repository you have access to")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to ~/.mgit/config.json)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover remote repositories and clone them into matching locations
    Clone,

    /// Fetch every repository already cloned under the configured locations
    Fetch,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    info!("Starting mgit v{}", env!("CARGO_PKG_VERSION"));

    let config_path = config_path(cli.config.as_deref())?;
    info!("Reading config file {}", config_path.display());
    let config = Config::load(&config_path)?;

    let summary = match cli.command {
        Commands::Clone => cmd_clone(config).await?,
        Commands::Fetch => cmd_fetch(config).await?,
    };

    print_summary(&summary);

    Ok(if summary.failed > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

fn config_path(raw: Option<&str>) -> Result<PathBuf> {
    match raw {
        Some(raw) => Config::resolve_path(raw),
        None => Config::default_config_path(),
    }
}

/// Discover, match and clone
async fn cmd_clone(config: Config) -> Result<SyncSummary> {
    let sources = MultiSource::from_config(&config).await?;
    let engine = SyncEngine::new(config);

    Ok(SyncSummary::collect(engine.run_discovery_and_clone(sources)).await)
}

/// Scan locations and fetch
async fn cmd_fetch(config: Config) -> Result<SyncSummary> {
    let engine = SyncEngine::new(config);

    Ok(SyncSummary::collect(engine.run_local_fetch()).await)
}

fn print_summary(summary: &SyncSummary) {
    println!("Synchronization complete in {:.2}s", summary.duration.as_secs_f64());
    println!("   Cloned:          {}", summary.cloned);
    println!("   Already present: {}", summary.already_present);
    println!("   Fetched:         {}", summary.fetched);
    println!("   Failed:          {}", summary.failed);

    if summary.failed > 0 {
        println!();
        println!("Failed operations:");
        for (path, error) in summary.failures() {
            println!("   {}: {}", path.display(), error);
        }
    }
}
