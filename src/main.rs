use clap::Parser;
use navcat::cli::run::RunArgs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "navcat")]
#[command(about = "Replay stored monitoring records as one time-ordered frame stream", long_about = None)]
struct Cli {
    /// YAML config file (defaults to ~/.config/navcat/config.yml, then /etc/navcat/config.yml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Storage directory written by the collector
    storage_dir: PathBuf,

    /// Start time: "YYYY-MM-DD HH:MM", "YYYYMMDD HHMM", "HH:MM", "HHMM" or epoch seconds
    start: String,

    /// Stop time, same formats as start
    stop: String,
}

fn main() -> ExitCode {
    // Standard output carries the frame stream, so diagnostics go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "navcat=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let args = RunArgs {
        config_path: navcat::config::resolve_config_path(cli.config.as_deref()),
        storage_dir: cli.storage_dir,
        start: cli.start,
        stop: cli.stop,
    };

    match navcat::cli::run::run(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
