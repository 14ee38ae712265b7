use crate::cli::time::{human_time, parse_time, TimeParseError};
use crate::config::{expand_tilde, load_config, Config, ConfigError};
use crate::output::frame::FrameWriter;
use crate::sequencer::window::{ReplayError, ReplayRange, ReplaySummary, WindowAdvancer};
use crate::source::reader::IncrementalReader;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid time: {0}")]
    Time(#[from] TimeParseError),

    #[error("replay failed: {0}")]
    Replay(#[from] ReplayError),
}

/// Everything the command line supplies.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub config_path: Option<PathBuf>,
    pub storage_dir: PathBuf,
    pub start: String,
    pub stop: String,
}

/// Replay `[start, stop]` from the storage directory onto standard output.
///
/// Configuration and time expressions are checked before anything is read or
/// written.
pub fn run(args: &RunArgs) -> Result<ReplaySummary, RunError> {
    let config = match &args.config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(path)?
        }
        None => Config::default(),
    };

    let range = ReplayRange {
        start: parse_time(&args.start)?,
        stop: parse_time(&args.stop)?,
    };

    let stdout = io::stdout();
    replay(&config, &args.storage_dir, range, stdout.lock())
}

/// Replay `range` from `storage_dir` into `sink` as frames.
pub fn replay<W: Write>(
    config: &Config,
    storage_dir: &Path,
    range: ReplayRange,
    sink: W,
) -> Result<ReplaySummary, RunError> {
    let tag = config.output.tag_bytes().ok_or_else(|| {
        ConfigError::Validation(format!(
            "output.frame_tag must be exactly 4 ASCII characters, got {:?}",
            config.output.frame_tag
        ))
    })?;
    let dir = expand_tilde(storage_dir);

    info!(
        dir = %dir.display(),
        from = %human_time(range.start),
        to = %human_time(range.stop),
        "Emitting"
    );

    let reader = IncrementalReader::hourly(config.replay.retention_slack);
    let mut writer = FrameWriter::with_tag(sink, tag);
    let mut advancer = WindowAdvancer::new(&dir, reader, range);
    let summary = advancer.run(&mut writer)?;

    info!(
        passes = summary.passes,
        frames = summary.frames,
        bytes = summary.bytes,
        "Replay complete"
    );
    Ok(summary)
}
