//! # Tab Tokenizer
//!
//! Turns a tab into a stream of [`Token`]s. The header is read line by line;
//! the score is read one column at a time, where a column holds the header
//! cell (duration codes, ties, triplets, repeat counts) followed by one cell
//! per string:
//!
//! ```text
//!    e+h      <- header row
//! -|-------   <- G string
//! -|-------
//! -|-0-----
//! -|-------   <- E string
//! ```
//!
//! Columns that belong to one musical symbol (a two-digit fret, a `rest`
//! word) are buffered in `frets` and merged when a separator column
//! (all `-`) or another delimiter arrives.

use crate::ast::TimeSignature;
use crate::config::Config;
use crate::reader::LineSource;
use crate::theory::is_duration_code;
use crate::token::Token;
use std::collections::VecDeque;

/// Filler between symbols on a string row
const SEPARATOR: char = '-';
/// Delimiter drawn for each string in a bar line
const STRING_DELIMITER: char = '|';
const TIE_MARKER: char = '+';
const TRIOLET_MARKER: char = '^';
const REST_WORD: &str = "rest";
const REST_MARKER: &str = "R";
const TIME_SIGNATURE_MARK: &str = "::";
const REPEAT_MARK: &str = "**";
/// Largest numerator or denominator accepted in a time signature
const MAX_TIME_SIGNATURE: u32 = 64;

/// Transition symbols found on a string row, first match wins
const TRANSITIONS: [(char, Token); 6] = [
    ('\\', Token::GlissDown),
    ('H', Token::HammerOn),
    ('h', Token::HammerOn),
    ('p', Token::PullOff),
    ('/', Token::GlissUp),
    ('^', Token::Bend),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    CountStrings,
    Score,
    Finished,
}

/// Tokenizer over a [`LineSource`]
pub struct Tokenizer<S> {
    source: S,
    config: Config,
    state: State,
    strings: usize,
    /// Columns read ahead but not classified yet
    pending: VecDeque<String>,
    /// Columns of the symbol being assembled, header cell first
    frets: Vec<Vec<char>>,
    tokens: VecDeque<Token>,
    done: bool,
}

impl<S: LineSource> Tokenizer<S> {
    pub fn new(source: S, config: &Config) -> Self {
        Self {
            source,
            config: config.clone(),
            state: State::Header,
            strings: 0,
            pending: VecDeque::new(),
            frets: Vec::new(),
            tokens: VecDeque::new(),
            done: false,
        }
    }

    /// Return and consume the next token. Returns `End` forever once the
    /// input is exhausted.
    pub fn next_token(&mut self) -> Token {
        loop {
            if let Some(token) = self.tokens.pop_front() {
                log::debug!("Sending token {}", token);
                return token;
            }
            match self.state {
                State::Header => self.header(),
                State::CountStrings => self.count_strings(),
                State::Score => self.score(),
                State::Finished => self.tokens.push_back(Token::End),
            }
        }
    }

    fn header(&mut self) {
        let line = self.source.read_line();
        if self.source.is_end() {
            self.state = State::Finished;
            return;
        }

        // The duration row of the first staff starts with a blank
        if line.starts_with(' ') {
            self.state = State::CountStrings;
            self.tokens.push_back(Token::HeaderLine(String::new()));
            return;
        }

        self.source.consume_line();
        let config = &self.config;
        let token = if !config.title_marker.is_empty() && line.contains(&config.title_marker) {
            Token::Title(line.replace(&config.title_marker, "").trim().to_string())
        } else if !config.copyright_marker.is_empty() && line.contains(&config.copyright_marker) {
            Token::Copyright(line.replace(&config.copyright_prefix, "").trim().to_string())
        } else {
            Token::HeaderLine(line.trim().to_string())
        };
        self.tokens.push_back(token);
    }

    fn count_strings(&mut self) {
        while let Some(column) = self.source.next_symbol_column() {
            let delimiters = column.chars().filter(|c| *c == STRING_DELIMITER).count();
            self.pending.push_back(column);
            if delimiters > 0 {
                self.strings = delimiters;
                self.tokens.push_back(Token::NbStrings(delimiters));
                self.state = State::Score;
                return;
            }
        }
        self.state = State::Finished;
    }

    fn score(&mut self) {
        let Some(column) = self.next_column() else {
            self.flush();
            self.state = State::Finished;
            return;
        };

        let mut symbol = self.cells(&column);
        let strings: String = symbol[1..].iter().collect();
        let transition = transition(&strings);
        let mut header = header_of(&symbol);
        let mut separator = self.is_separator(&strings);
        let mut trailer = None;

        if let Some(marker @ (TIE_MARKER | TRIOLET_MARKER)) = header {
            for c in symbol.iter_mut().filter(|c| **c == marker) {
                *c = ' ';
            }
            // The marker also ends the symbol written in its column
            if !separator && transition.is_none() {
                self.frets.push(symbol.clone());
                separator = true;
            }
            header = None;
            trailer = Some(if marker == TIE_MARKER {
                Token::Tie
            } else {
                Token::Triolet
            });
        }

        if separator {
            match header {
                None => self.flush(),
                Some(code) if is_duration_code(code) => {
                    self.flush();
                    self.tokens.push_back(Token::TiedNote(code));
                }
                Some(_) => self.frets.push(symbol),
            }
        } else if self.is_bar(&strings) {
            self.flush();
            self.consume_measure(header);
        } else if strings.contains(TIME_SIGNATURE_MARK) {
            self.time_signature();
        } else if strings.contains(REPEAT_MARK) {
            self.tokens.push_back(Token::EndRepetition);
        } else if let Some(token) = transition {
            self.flush();
            self.tokens.push_back(token);
        } else {
            self.frets.push(symbol);
        }

        if let Some(token) = trailer {
            self.tokens.push_back(token);
        }
    }

    /// Scan the columns following a bar: more bars, start-repeat marks and
    /// a repeat count written above them.
    fn consume_measure(&mut self, header: Option<char>) {
        let mut header_text: String = header.into_iter().collect();
        self.tokens.push_back(Token::MeasureBar);

        while let Some(column) = self.next_column() {
            let symbol = self.cells(&column);
            let strings: String = symbol[1..].iter().collect();
            let header = header_of(&symbol);
            header_text.extend(header);

            if self.is_bar(&strings) {
                let digits: String = header_text.chars().filter(char::is_ascii_digit).collect();
                if !digits.is_empty() {
                    self.tokens.push_back(Token::RepetitionNumber(digits));
                }
                header_text.clear();
            } else if header.is_none() && self.is_separator(&strings) {
                return;
            } else if strings.contains(REPEAT_MARK) {
                self.tokens.push_back(Token::StartRepetition);
            } else {
                self.pending.push_front(column);
                return;
            }
        }
    }

    /// Merge the buffered columns into one Note, Rest or LongRest token.
    fn flush(&mut self) {
        if self.frets.is_empty() {
            return;
        }
        let frets = std::mem::take(&mut self.frets);
        let rows = frets[0].len();
        let cells: Vec<String> = (0..rows)
            .map(|row| {
                frets
                    .iter()
                    .filter_map(|column| column.get(row))
                    .filter(|c| **c != SEPARATOR && !c.is_whitespace())
                    .collect()
            })
            .collect();
        let duration: String = cells[0].chars().take(1).collect();

        let token = if frets.len() == 1 && frets[0][1..].iter().collect::<String>().contains(REST_WORD) {
            Token::Rest(duration)
        } else if cells.iter().any(|cell| cell == REST_WORD) {
            let count = cells
                .iter()
                .flat_map(|cell| cell.chars())
                .filter(char::is_ascii_digit)
                .collect();
            Token::LongRest(count)
        } else if cells.iter().any(|cell| cell == REST_MARKER) {
            Token::Rest(duration)
        } else {
            Token::Note {
                duration: cells[0].clone(),
                frets: cells[1..].to_vec(),
            }
        };
        self.tokens.push_back(token);
    }

    /// Read the digits buffered before a `::` column as numerator and
    /// denominator, one per row.
    fn time_signature(&mut self) {
        let frets = std::mem::take(&mut self.frets);
        let rows = frets.first().map_or(0, Vec::len);
        let parts: Vec<String> = (1..rows)
            .map(|row| {
                frets
                    .iter()
                    .filter_map(|column| column.get(row))
                    .filter(|c| **c != SEPARATOR && !c.is_whitespace())
                    .collect::<String>()
            })
            .filter(|part| !part.is_empty())
            .collect();

        match parts.as_slice() {
            [beats, beat_type] => match (beats.parse::<u32>(), beat_type.parse::<u32>()) {
                (Ok(beats), Ok(beat_type))
                    if (1..=MAX_TIME_SIGNATURE).contains(&beats)
                        && (1..=MAX_TIME_SIGNATURE).contains(&beat_type) =>
                {
                    self.tokens
                        .push_back(Token::TimeSignature(TimeSignature { beats, beat_type }));
                }
                _ => log::error!("Invalid time signature: {}", parts.join("/")),
            },
            _ => log::error!("Invalid time signature: {:?}", parts),
        }
    }

    fn next_column(&mut self) -> Option<String> {
        self.pending
            .pop_front()
            .or_else(|| self.source.next_symbol_column())
    }

    /// Header cell plus one cell per string, taken from the bottom of the
    /// column. Short columns are padded at the top.
    fn cells(&self, column: &str) -> Vec<char> {
        let chars: Vec<char> = column.chars().collect();
        let wanted = self.strings + 1;
        if chars.len() >= wanted {
            chars[chars.len() - wanted..].to_vec()
        } else {
            let mut cells = vec![' '; wanted - chars.len()];
            cells.extend(chars);
            cells
        }
    }

    fn is_separator(&self, strings: &str) -> bool {
        strings.chars().all(|c| c == SEPARATOR || c.is_whitespace())
    }

    /// Bar lines are drawn as `||||`, `+||+` or `-|||` (for four strings).
    fn is_bar(&self, strings: &str) -> bool {
        let n = self.strings;
        if n < 2 {
            return strings.chars().all(|c| c == STRING_DELIMITER) && !strings.is_empty();
        }
        let inner = STRING_DELIMITER.to_string().repeat(n - 2);
        let closed = format!("{d}{inner}{d}", d = STRING_DELIMITER);
        let crossed = format!("{t}{inner}{t}", t = TIE_MARKER);
        let open = format!("{}{}{}", SEPARATOR, inner, STRING_DELIMITER);
        strings == closed || strings == crossed || strings == open
    }
}

fn header_of(symbol: &[char]) -> Option<char> {
    symbol.first().copied().filter(|c| !c.is_whitespace())
}

fn transition(strings: &str) -> Option<Token> {
    TRANSITIONS
        .iter()
        .find(|(symbol, _)| strings.contains(*symbol))
        .map(|(_, token)| token.clone())
}

impl<S: LineSource> Iterator for Tokenizer<S> {
    type Item = Token;

    /// Yields every token up to and including `End`.
    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let token = self.next_token();
        if token == Token::End {
            self.done = true;
        }
        Some(token)
    }
}
