//! `log4rs` set-up for binaries and benchmarks. The library itself only emits through `log`.
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

const PATTERN: &str = "{l} - {m}\n";

#[derive(Debug)]
pub enum LoggingError {
    Io(std::io::Error),
    Config(log4rs::config::runtime::ConfigErrors),
    AlreadyInitialized(log::SetLoggerError),
}

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot open log file: {}", err),
            Self::Config(err) => write!(f, "invalid logging configuration: {}", err),
            Self::AlreadyInitialized(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for LoggingError {}

fn init_with(
    name: &str,
    appender: Box<dyn log4rs::append::Append>,
    level: LevelFilter,
) -> Result<log4rs::Handle, LoggingError> {
    let config = Config::builder()
        .appender(Appender::builder().build(name, appender))
        .build(Root::builder().appender(name).build(level))
        .map_err(LoggingError::Config)?;
    log4rs::init_config(config).map_err(LoggingError::AlreadyInitialized)
}

/// Routes every record at or above `level` to `path`, creating parent directories.
///
/// # Errors
/// If the file cannot be opened or a logger is already installed
pub fn init_file_logger<P: AsRef<Path>>(
    path: P,
    level: LevelFilter,
) -> Result<log4rs::Handle, LoggingError> {
    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(path)
        .map_err(LoggingError::Io)?;
    init_with("logfile", Box::new(logfile), level)
}

/// # Errors
/// If a logger is already installed
pub fn init_console_logger(level: LevelFilter) -> Result<log4rs::Handle, LoggingError> {
    let stderr = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .target(log4rs::append::console::Target::Stderr)
        .build();
    init_with("stderr", Box::new(stderr), level)
}
