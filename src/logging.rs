//! File logging. stdout belongs to the TUI, so everything goes to a log file.
//!
//! The logger starts before the config is read so config warnings are kept,
//! then [`apply_level`] narrows it to the configured level.

use std::fs::File;
use std::io;
use std::path::Path;

use log::LevelFilter;
use simplelog::{ConfigBuilder, WriteLogger};

/// Start logging to `path` with every level enabled.
pub fn init(path: &Path) -> io::Result<()> {
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let log_file = File::create(path)?;
    WriteLogger::init(LevelFilter::Trace, log_config, log_file)
        .map_err(|e| io::Error::other(e.to_string()))
}

/// Narrow logging to the resolved level.
pub fn apply_level(level: LevelFilter) {
    log::set_max_level(level);
}
