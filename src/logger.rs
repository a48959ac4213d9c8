//! Logging setup for the command-line tool.
//!
//! The library logs through the `log` facade. The binary installs a
//! `tracing-subscriber` registry that also captures those records: every
//! record at DEBUG and above goes to the log file, the console gets INFO and
//! above, or everything in verbose mode.

use std::fs::File;
use std::sync::Arc;
use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

/// Most verbose level shown on the console
pub fn console_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Console layer on stderr plus, when `file` is given, a plain-text layer
/// writing to it.
pub fn subscriber(verbose: bool, file: Option<File>) -> impl Subscriber + Send + Sync + 'static {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_level(verbose));
    let file = file.map(|file| {
        fmt::layer()
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .with_target(false)
            .with_filter(LevelFilter::DEBUG)
    });
    tracing_subscriber::registry().with(console).with(file)
}

/// Install the subscriber globally, forwarding `log` records to it.
pub fn init(verbose: bool, file: Option<File>) -> Result<(), TryInitError> {
    subscriber(verbose, file).try_init()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_console_level_follows_verbosity() {
        assert_eq!(console_level(false), LevelFilter::INFO);
        assert_eq!(console_level(true), LevelFilter::DEBUG);
    }

    #[test]
    fn test_file_receives_debug_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.log");
        let file = File::create(&path).unwrap();

        tracing::subscriber::with_default(subscriber(false, Some(file)), || {
            tracing::debug!("Adding measure 1");
            tracing::warn!("Title not found");
        });

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("DEBUG"));
        assert!(written.contains("Adding measure 1"));
        assert!(written.contains("WARN"));
        assert!(written.contains("Title not found"));
    }
}
