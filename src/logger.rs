use crate::errors::DbError;
use log::LevelFilter;
use std::path::Path;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";

/// Maps `error|warn|info|debug|trace|off` to a level filter; anything else is `Info`.
#[must_use]
pub fn parse_level(level: Option<&str>) -> LevelFilter {
    match level.unwrap_or("info").trim().to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Builds the logging config: console on stderr, plus `file` when given.
/// Slow-operation warnings (`docquery::slow`) go to the same appenders.
///
/// # Errors
/// Returns `DbError::Config` if the file appender cannot be created.
pub fn build_config(level: LevelFilter, file: Option<&Path>) -> Result<log4rs::Config, DbError> {
    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::append::file::FileAppender;
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let mut builder = Config::builder().appender(Appender::builder().build("console", Box::new(console)));
    let mut root = Root::builder().appender("console");
    if let Some(path) = file {
        let file_appender = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(path)
            .map_err(|e| DbError::Config(format!("log file {}: {e}", path.display())))?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file_appender)));
        root = root.appender("file");
    }
    builder.build(root.build(level)).map_err(|e| DbError::Config(e.to_string()))
}

/// Installs the process-wide logger. A second call in the same process is an error.
///
/// # Errors
/// Returns `DbError::Config` if the config is invalid or a logger is already installed.
pub fn init(level: Option<&str>, file: Option<&Path>) -> Result<(), DbError> {
    let config = build_config(parse_level(level), file)?;
    log4rs::init_config(config).map_err(|e| DbError::Config(e.to_string()))?;
    Ok(())
}

/// Initializes logging from a log4rs YAML file.
///
/// # Errors
/// Returns `DbError::Config` if the file is missing or invalid.
pub fn init_file(path: &Path) -> Result<(), DbError> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| DbError::Config(format!("{}: {e}", path.display())))
}
