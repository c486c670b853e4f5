use log::LevelFilter;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::error::Error;
use std::path::Path;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)(utc)} {l} {t} - {m}{n}";

/// Route the `log` facade to a file; the terminal belongs to the TUI.
pub fn init_file_logger(path: &Path, level: LevelFilter) -> Result<(), Box<dyn Error>> {
    let logfile = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(path)?;

    let config = Config::builder()
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .build(Root::builder().appender("logfile").build(level))?;

    log4rs::init_config(config)?;
    log::info!("file logger initialized at {}", path.display());

    Ok(())
}
