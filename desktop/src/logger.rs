//! A small stderr logger for the desktop binary.

use log::{Level, LevelFilter, Log, Metadata, Record};


struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let prefix = match record.level() {
                Level::Error => "ERROR",
                Level::Warn => " WARN",
                Level::Info => " INFO",
                Level::Debug => "DEBUG",
                Level::Trace => "TRACE",
            };
            eprintln!("{} {}", prefix, record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

/// Installs the logger. With `debug` the full trace firehose is let through.
pub(crate) fn init(debug: bool) {
    let level = if debug {
        LevelFilter::Trace
    } else {
        LevelFilter::Info
    };

    log::set_logger(&LOGGER).expect("called init(), but a logger is already set!");
    log::set_max_level(level);
}
