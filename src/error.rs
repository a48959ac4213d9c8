//! # Error Types
//!
//! This module defines all error types for the tablature converter.
//!
//! Errors come in three layers:
//! - [`TheoryError`] - failures of the pure duration/pitch lookups in `theory`
//! - [`Diagnostic`] - recoverable problems found while parsing a tab; they are
//!   reported through a [`crate::diagnostics::Diagnostics`] sink and never stop
//!   the parse
//! - [`BtabError`] - fatal, per-file failures surfaced at the batch boundary
//!
//! Every [`Diagnostic`] carries the measure number it was raised in and the raw
//! symbols involved, so a log line is enough to find the spot in the tab.
//!
//! ## Usage
//! ```rust
//! use btab::{convert, Config, Diagnostic};
//!
//! let tab = "    q q q q q \n||-0-0-0-0-0-|\n||-----------|\n||-----------|\n||-----------|\n";
//! let conversion = convert(tab, &Config::default());
//! for diagnostic in &conversion.diagnostics {
//!     if let Diagnostic::MeasureDurationMismatch { measure, .. } = diagnostic {
//!         eprintln!("measure {} does not add up", measure);
//!     }
//! }
//! ```

use crate::ast::TimeSignature;
use num_rational::Ratio;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a duration or pitch lookup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TheoryError {
    #[error("Invalid duration: '{0}'")]
    InvalidDuration(String),

    #[error("Invalid pitch: '{0}'")]
    InvalidPitch(String),

    /// Parenthesized frets mark an appoggiatura, which is not rendered.
    #[error("Appoggiatura not supported: '{0}'")]
    UnsupportedGraceNote(String),
}

/// A recoverable problem found while building the document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// The token is skipped, no event is produced.
    #[error("Invalid duration at measure {measure}: {symbols:?}")]
    InvalidDuration { measure: usize, symbols: Vec<String> },

    /// A fallback pitch is used in place of the offending one.
    #[error("Invalid pitch at measure {measure}: {symbols:?}")]
    InvalidPitch { measure: usize, symbols: Vec<String> },

    #[error("Continued note '{code}' without a pending tie (measure {measure})")]
    DanglingTie { measure: usize, code: char },

    #[error("Repetition number '{value}' has no repeated measure (measure {measure})")]
    DanglingRepetitionNumber { measure: usize, value: String },

    /// Advisory only: the measure is still appended.
    #[error("Duration of measure {measure}: {actual} 32nd notes, time signature is {time_signature}")]
    MeasureDurationMismatch {
        measure: usize,
        actual: Ratio<u32>,
        time_signature: TimeSignature,
    },

    #[error("{ornament} at measure {measure} has no preceding note")]
    MissingAnchor { measure: usize, ornament: &'static str },
}

impl Diagnostic {
    /// Measure the diagnostic was raised in.
    pub fn measure(&self) -> usize {
        match self {
            Diagnostic::InvalidDuration { measure, .. }
            | Diagnostic::InvalidPitch { measure, .. }
            | Diagnostic::DanglingTie { measure, .. }
            | Diagnostic::DanglingRepetitionNumber { measure, .. }
            | Diagnostic::MeasureDurationMismatch { measure, .. }
            | Diagnostic::MissingAnchor { measure, .. } => *measure,
        }
    }

    /// Log level used when the diagnostic is forwarded to `log`.
    pub fn level(&self) -> log::Level {
        match self {
            Diagnostic::MeasureDurationMismatch { .. } => log::Level::Warn,
            _ => log::Level::Error,
        }
    }
}

/// A failure that aborts the conversion of one file.
#[derive(Error, Debug)]
pub enum BtabError {
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_yaml::Error),

    /// The tab never declared its strings, so there is no score body.
    #[error("No staff found in '{}'", .0.display())]
    EmptyScore(PathBuf),

    #[error("Unsupported number of strings in '{}': {count} (expected 4 or 5)", .path.display())]
    UnsupportedStrings { path: PathBuf, count: usize },

    #[error("Input directory '{}' does not exist", .0.display())]
    NotADirectory(PathBuf),
}

impl BtabError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BtabError::Io {
            path: path.into(),
            source,
        }
    }
}
