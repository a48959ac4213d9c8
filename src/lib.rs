pub mod ast;
pub mod batch;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod logger;
pub mod musicxml;
pub mod parser;
pub mod reader;
pub mod theory;
pub mod token;
pub mod tokenizer;

pub use ast::*;
pub use config::Config;
pub use diagnostics::{Diagnostics, LogDiagnostics, Recorder};
pub use error::*;
pub use musicxml::to_musicxml;
pub use parser::Parser;
pub use reader::{LineSource, TabReader};
pub use token::Token;
pub use tokenizer::Tokenizer;

use std::path::Path;

/// Result of converting one tab
#[derive(Debug, Clone)]
pub struct Conversion {
    pub document: Document,
    /// Every recoverable problem met on the way, in order
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse a tab held in memory.
/// Diagnostics are logged and also returned with the document.
pub fn convert(source: &str, config: &Config) -> Conversion {
    convert_from(TabReader::from_text(source), config)
}

/// Parse a tab file. Fails if the file cannot be read or holds no usable
/// staff.
pub fn convert_file(path: &Path, config: &Config) -> Result<Conversion, BtabError> {
    let conversion = convert_from(TabReader::open(path)?, config);
    match conversion.document.strings {
        None => Err(BtabError::EmptyScore(path.to_path_buf())),
        Some(4 | 5) => Ok(conversion),
        Some(count) => Err(BtabError::UnsupportedStrings {
            path: path.to_path_buf(),
            count,
        }),
    }
}

fn convert_from<S: LineSource>(source: S, config: &Config) -> Conversion {
    let tokenizer = Tokenizer::new(source, config);
    let (document, recorder) =
        Parser::with_diagnostics(tokenizer, config, Recorder::default()).finish();
    Conversion {
        document,
        diagnostics: recorder.diagnostics,
    }
}
