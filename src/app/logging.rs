use std::{fs::File, path::Path, sync::Mutex};

use tracing_subscriber::{Layer, filter::LevelFilter, layer::SubscriberExt};

/// Verbosity of the `--log-level` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    #[default]
    Off,
}

impl From<Level> for LevelFilter {
    fn from(value: Level) -> Self {
        match value {
            Level::Trace => LevelFilter::TRACE,
            Level::Debug => LevelFilter::DEBUG,
            Level::Info => LevelFilter::INFO,
            Level::Warn => LevelFilter::WARN,
            Level::Error => LevelFilter::ERROR,
            Level::Off => LevelFilter::OFF,
        }
    }
}

/// Sends connection and request events to standard error, or to `file`
/// when given.
///
/// Standard output is left for the response printed by `send`. With `json`,
/// events are written one JSON object per line instead of as text.
pub fn set_up_logging(level: Level, file: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let file = match file {
        Some(path) => Some(Mutex::new(
            File::options().create(true).append(true).open(path)?,
        )),
        None => None,
    };
    let filter = LevelFilter::from(level);

    let (file_text, file_json) = match file {
        Some(writer) if json => (
            None,
            Some(tracing_subscriber::fmt::layer().json().with_writer(writer)),
        ),
        Some(writer) => (
            Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer)),
            None,
        ),
        None => (None, None),
    };

    let to_stderr = file_text.is_none() && file_json.is_none();
    let stderr_text = (to_stderr && !json)
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));
    let stderr_json = (to_stderr && json)
        .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));

    let sub = tracing_subscriber::Registry::default()
        .with(file_text.with_filter(filter))
        .with(file_json.with_filter(filter))
        .with(stderr_text.with_filter(filter))
        .with(stderr_json.with_filter(filter));
    tracing::subscriber::set_global_default(sub)?;

    tracing::debug!(?level, "logging configured");

    Ok(())
}
