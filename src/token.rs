use crate::ast::TimeSignature;
use std::fmt;

/// Token types produced by the tab tokenizer
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Text above the first staff
    HeaderLine(String),
    Title(String),
    Copyright(String),
    NbStrings(usize), // count of '|' in the first bar column

    // Structure
    MeasureBar,
    StartRepetition,          // ** after a bar
    EndRepetition,            // ** before a bar
    RepetitionNumber(String), // digits written above a bar, e.g. "5" for 5x
    TimeSignature(TimeSignature),

    // Events
    Note {
        duration: String,   // merged header cell
        frets: Vec<String>, // one cell per string, highest first, "" if unused
    },
    TiedNote(char), // duration code above an all-dash column
    Rest(String),
    LongRest(String), // measure count of a multi-measure rest

    // Modifiers
    Triolet, // ³ below the staff
    Tie,     // _ below the staff
    GlissDown,
    GlissUp,
    Bend,
    HammerOn,
    PullOff,

    End,
}

impl Token {
    /// Tokens emitted before the staff starts
    pub fn is_header(&self) -> bool {
        matches!(
            self,
            Token::HeaderLine(_) | Token::Title(_) | Token::Copyright(_)
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::HeaderLine(text) => write!(f, "HEADER_LINE({})", text),
            Token::Title(text) => write!(f, "TITLE({})", text),
            Token::Copyright(text) => write!(f, "COPYRIGHT({})", text),
            Token::NbStrings(n) => write!(f, "NB_STRINGS({})", n),
            Token::MeasureBar => write!(f, "MEASURE_BAR"),
            Token::StartRepetition => write!(f, "START_REPETITION"),
            Token::EndRepetition => write!(f, "END_REPETITION"),
            Token::RepetitionNumber(n) => write!(f, "REPETITION_NUMBER({})", n),
            Token::TimeSignature(ts) => write!(f, "TIME_SIGNATURE({})", ts),
            Token::Note { duration, frets } => write!(f, "NOTE({}, {:?})", duration, frets),
            Token::TiedNote(code) => write!(f, "TIED_NOTE({})", code),
            Token::Rest(code) => write!(f, "REST({})", code),
            Token::LongRest(count) => write!(f, "LONG_REST({})", count),
            Token::Triolet => write!(f, "TRIOLET"),
            Token::Tie => write!(f, "TIE"),
            Token::GlissDown => write!(f, "GLISS_DOWN"),
            Token::GlissUp => write!(f, "GLISS_UP"),
            Token::Bend => write!(f, "BEND"),
            Token::HammerOn => write!(f, "HAMMER_ON"),
            Token::PullOff => write!(f, "PULL_OFF"),
            Token::End => write!(f, "END"),
        }
    }
}
