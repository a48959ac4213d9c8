//! Line and column access to a tab file.
//!
//! The tokenizer reads the header line by line, then switches to reading the
//! score as vertical columns. A column is taken from a *staff block*: a run of
//! non-empty lines, right-padded with blanks to the width of its longest line.
//!
//! ```text
//!     q h        column 4 = "q-0--"
//! ||--0-----     column 5 = " ----"
//! ||--------
//! ||--------
//! ||--------
//! ```
//!
//! A line starting with `=` closes the current block. A line reading `end`
//! closes it and ends the score.

use crate::error::BtabError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Marker line ending the score
const END_MARKER: &str = "end";
/// Lines starting with this character separate staff blocks
const SEPARATOR_PREFIX: char = '=';

/// What the tokenizer needs from its input.
pub trait LineSource {
    /// Current line without its line terminator. Empty at end of input.
    fn read_line(&mut self) -> String;

    fn is_end(&self) -> bool;

    /// Move past the line last returned by `read_line`.
    fn consume_line(&mut self);

    /// Next column of the score, top row first. `None` once no staff block
    /// remains.
    fn next_symbol_column(&mut self) -> Option<String>;
}

/// `LineSource` over any buffered reader
pub struct TabReader<R> {
    input: R,
    line: Option<String>,
    end: bool,
    score_ended: bool,
    block: Vec<Vec<char>>,
    width: usize,
    column: usize,
}

impl<R: BufRead> TabReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            line: None,
            end: false,
            score_ended: false,
            block: Vec::new(),
            width: 0,
            column: 0,
        }
    }

    /// Load the next staff block. Returns false once input or score is over.
    fn refill(&mut self) -> bool {
        self.block.clear();
        self.width = 0;
        self.column = 0;

        while !self.score_ended {
            let mut line = self.read_line();
            while line.is_empty() && !self.end {
                self.consume_line();
                line = self.read_line();
            }

            while !line.is_empty() {
                self.consume_line();
                if line == END_MARKER {
                    self.score_ended = true;
                    break;
                }
                if line.starts_with(SEPARATOR_PREFIX) {
                    break;
                }
                self.block.push(line.chars().collect());
                line = self.read_line();
            }

            if !self.block.is_empty() {
                self.width = self.block.iter().map(Vec::len).max().unwrap_or(0);
                for row in &mut self.block {
                    row.resize(self.width, ' ');
                }
                return true;
            }
            if self.end {
                return false;
            }
        }
        false
    }
}

impl<'a> TabReader<&'a [u8]> {
    /// Reader over an in-memory tab
    pub fn from_text(text: &'a str) -> Self {
        Self::new(text.as_bytes())
    }
}

impl TabReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, BtabError> {
        let file = File::open(path).map_err(|e| BtabError::io(path, e))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> LineSource for TabReader<R> {
    fn read_line(&mut self) -> String {
        if let Some(line) = &self.line {
            return line.clone();
        }
        if self.end {
            return String::new();
        }

        let mut buffer = String::new();
        match self.input.read_line(&mut buffer) {
            Ok(0) => {
                self.end = true;
                String::new()
            }
            Ok(_) => {
                let line = buffer.trim_end_matches(['\n', '\r']).to_string();
                self.line = Some(line.clone());
                line
            }
            Err(e) => {
                log::error!("Failed to read tab input: {}", e);
                self.end = true;
                String::new()
            }
        }
    }

    fn is_end(&self) -> bool {
        self.end
    }

    fn consume_line(&mut self) {
        self.line = None;
    }

    fn next_symbol_column(&mut self) -> Option<String> {
        if self.column >= self.width && !self.refill() {
            return None;
        }
        let column = self.block.iter().map(|row| row[self.column]).collect();
        self.column += 1;
        Some(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(reader: &mut TabReader<&[u8]>) -> Vec<String> {
        std::iter::from_fn(|| reader.next_symbol_column()).collect()
    }

    #[test]
    fn test_read_line_is_stable_until_consumed() {
        let mut reader = TabReader::from_text("first\r\nsecond\n");
        assert_eq!(reader.read_line(), "first");
        assert_eq!(reader.read_line(), "first");
        reader.consume_line();
        assert_eq!(reader.read_line(), "second");
        reader.consume_line();
        assert_eq!(reader.read_line(), "");
        assert!(reader.is_end());
    }

    #[test]
    fn test_columns_are_padded_with_blanks() {
        let mut reader = TabReader::from_text("\n  q\n|-0-\n|---\n");
        let columns = columns(&mut reader);
        assert_eq!(columns, vec![" ||", " --", "q0-", " --"]);
    }

    #[test]
    fn test_blocks_follow_each_other() {
        let mut reader = TabReader::from_text("ab\ncd\n\n\nef\ngh\n");
        assert_eq!(columns(&mut reader), vec!["ac", "bd", "eg", "fh"]);
    }

    #[test]
    fn test_separator_line_closes_block() {
        let mut reader = TabReader::from_text("ab\n====\ncd\n");
        assert_eq!(columns(&mut reader), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_end_marker_stops_the_score() {
        let mut reader = TabReader::from_text("ab\ncd\nend\nef\n");
        assert_eq!(columns(&mut reader), vec!["ac", "bd"]);
        assert_eq!(reader.next_symbol_column(), None);
    }

    #[test]
    fn test_empty_input_has_no_columns() {
        let mut reader = TabReader::from_text("");
        assert_eq!(reader.next_symbol_column(), None);
        assert!(reader.is_end());
    }
}
