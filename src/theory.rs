//! Duration and pitch lookups shared by the tokenizer and the parser.
//!
//! Duration codes are single letters written in the header row of a tab.
//! Uppercase means dotted, except for `t` which only exists undotted:
//!
//! | code | value        | 32nds |
//! |------|--------------|-------|
//! | `W`  | dotted whole | 48    |
//! | `w`  | whole        | 32    |
//! | `H`  | dotted half  | 24    |
//! | `h`  | half         | 16    |
//! | `Q`  | dotted qtr   | 12    |
//! | `q`  | quarter      | 8     |
//! | `E`  | dotted 8th   | 6     |
//! | `e`  | eighth       | 4     |
//! | `S`  | dotted 16th  | 3     |
//! | `s`  | sixteenth    | 2     |
//! | `t`  | 32nd         | 1     |

use crate::ast::{Duration, NoteValue, Pitch};
use crate::error::TheoryError;
use num_rational::Ratio;

/// Duration codes with their length in 32nd notes, longest first.
pub const DURATION_CODES: [(char, u32); 11] = [
    ('W', 48),
    ('w', 32),
    ('H', 24),
    ('h', 16),
    ('Q', 12),
    ('q', 8),
    ('E', 6),
    ('e', 4),
    ('S', 3),
    ('s', 2),
    ('t', 1),
];

/// Open-string pitches, highest string first. Four-string basses use the first
/// four entries; a fifth string adds the low B.
pub const OPEN_STRINGS: [u8; 5] = [55, 50, 45, 40, 35];

/// Pitch used when a fret cannot be resolved, so the event keeps its place.
pub const FALLBACK_PITCH: Pitch = Pitch {
    midi: 60,
    ghost: false,
};

/// Fret symbol for a muted (ghost) note
pub const GHOST_MARKER: &str = "x";

pub fn is_duration_code(code: char) -> bool {
    code_units(code).is_some()
}

/// Length of a duration code in 32nd notes
pub fn code_units(code: char) -> Option<u32> {
    DURATION_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, units)| *units)
}

pub fn parse_duration(code: char) -> Result<Duration, TheoryError> {
    let (value, dotted) = match code {
        'W' => (NoteValue::Whole, true),
        'w' => (NoteValue::Whole, false),
        'H' => (NoteValue::Half, true),
        'h' => (NoteValue::Half, false),
        'Q' => (NoteValue::Quarter, true),
        'q' => (NoteValue::Quarter, false),
        'E' => (NoteValue::Eighth, true),
        'e' => (NoteValue::Eighth, false),
        'S' => (NoteValue::Sixteenth, true),
        's' => (NoteValue::Sixteenth, false),
        't' => (NoteValue::ThirtySecond, false),
        _ => return Err(TheoryError::InvalidDuration(code.to_string())),
    };
    Ok(Duration::new(value, dotted))
}

/// Parse the first character of a header cell. Merged header cells can hold
/// trailing characters from neighbouring columns; only the first one counts.
pub fn parse_duration_code(code: &str) -> Result<Duration, TheoryError> {
    code.chars()
        .next()
        .ok_or_else(|| TheoryError::InvalidDuration(String::new()))
        .and_then(parse_duration)
}

/// Split a measure budget into the fewest rest codes, taking the longest
/// value that still fits at each step.
pub fn decompose_measure(budget: Ratio<u32>) -> Vec<char> {
    let mut remaining = budget;
    let mut codes = Vec::new();
    for (code, units) in DURATION_CODES {
        let units = Ratio::from_integer(units);
        while remaining >= units {
            codes.push(code);
            remaining -= units;
        }
    }
    if remaining != Ratio::from_integer(0) {
        log::warn!("Measure length {} cannot be filled with whole 32nd notes", budget);
    }
    codes
}

/// Open pitch of string `index` (0 = highest) on a bass with `strings` strings
pub fn open_string(strings: usize, index: usize) -> Option<u8> {
    if index < strings {
        OPEN_STRINGS.get(index).copied()
    } else {
        None
    }
}

/// Names of the open strings from lowest to highest, as exported with the part.
pub fn tuning(strings: usize) -> Vec<&'static str> {
    let mut names = vec!["E1", "A1", "D2", "G2"];
    if strings == 5 {
        names.insert(0, "B0");
    }
    names
}

/// Resolve the fret symbol found on string `index`.
///
/// `x` gives the open-string pitch flagged as ghost. Anything else must be a
/// (possibly signed) semitone offset. Parenthesized frets are grace notes,
/// which are not supported.
pub fn resolve_pitch(strings: usize, index: usize, symbol: &str) -> Result<Pitch, TheoryError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(TheoryError::InvalidPitch(String::new()));
    }
    let open = open_string(strings, index)
        .ok_or_else(|| TheoryError::InvalidPitch(symbol.to_string()))?;

    if symbol.contains('(') {
        return Err(TheoryError::UnsupportedGraceNote(symbol.to_string()));
    }
    if symbol == GHOST_MARKER {
        return Ok(Pitch::ghost(open));
    }

    let offset: i32 = symbol
        .parse()
        .map_err(|_| TheoryError::InvalidPitch(symbol.to_string()))?;
    u8::try_from(i32::from(open) + offset)
        .ok()
        .filter(|midi| *midi <= 127)
        .map(Pitch::new)
        .ok_or_else(|| TheoryError::InvalidPitch(symbol.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_code_parses_to_its_weight() {
        for (code, units) in DURATION_CODES {
            let duration = parse_duration(code).unwrap();
            assert_eq!(duration.units(), Ratio::from_integer(units), "code {}", code);
        }
    }

    #[test]
    fn test_single_code_budget_decomposes_to_itself() {
        for (code, units) in DURATION_CODES {
            assert_eq!(decompose_measure(Ratio::from_integer(units)), vec![code]);
        }
    }

    #[test]
    fn test_decompose_common_signatures() {
        assert_eq!(decompose_measure(Ratio::from_integer(32)), vec!['w']);
        // 3/4
        assert_eq!(decompose_measure(Ratio::from_integer(24)), vec!['H']);
        // 13/8 = 52
        let codes = decompose_measure(Ratio::from_integer(52));
        assert_eq!(codes, vec!['W', 'e']);
        let total: u32 = codes.iter().map(|c| code_units(*c).unwrap()).sum();
        assert_eq!(total, 52);
    }

    #[test]
    fn test_unknown_codes_are_invalid() {
        assert!(matches!(parse_duration('T'), Err(TheoryError::InvalidDuration(_))));
        assert!(matches!(parse_duration('x'), Err(TheoryError::InvalidDuration(_))));
        assert!(matches!(parse_duration_code(""), Err(TheoryError::InvalidDuration(_))));
        assert!(!is_duration_code('+'));
        assert!(is_duration_code('t'));
    }

    #[test]
    fn test_merged_header_uses_first_character() {
        let duration = parse_duration_code("h ").unwrap();
        assert_eq!(duration, Duration::new(NoteValue::Half, false));
    }

    #[test]
    fn test_resolve_fretted_pitch() {
        assert_eq!(resolve_pitch(4, 2, "0").unwrap(), Pitch::new(45));
        assert_eq!(resolve_pitch(4, 1, "7").unwrap(), Pitch::new(57));
        assert_eq!(resolve_pitch(4, 3, "12").unwrap(), Pitch::new(52));
        assert_eq!(resolve_pitch(5, 4, "0").unwrap(), Pitch::new(35));
    }

    #[test]
    fn test_ghost_note_has_no_offset() {
        for index in 0..4 {
            let pitch = resolve_pitch(4, index, "x").unwrap();
            assert!(pitch.ghost);
            assert_eq!(pitch.midi, OPEN_STRINGS[index]);
        }
    }

    #[test]
    fn test_resolution_is_pure() {
        let first = resolve_pitch(5, 3, "5");
        let second = resolve_pitch(5, 3, "5");
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_pitches() {
        assert!(matches!(resolve_pitch(4, 0, "(3)"), Err(TheoryError::UnsupportedGraceNote(_))));
        assert!(matches!(resolve_pitch(4, 0, "a"), Err(TheoryError::InvalidPitch(_))));
        assert!(matches!(resolve_pitch(4, 0, ""), Err(TheoryError::InvalidPitch(_))));
        // No fifth string on a four-string bass
        assert!(matches!(resolve_pitch(4, 4, "0"), Err(TheoryError::InvalidPitch(_))));
    }

    #[test]
    fn test_tuning_names() {
        assert_eq!(tuning(4), vec!["E1", "A1", "D2", "G2"]);
        assert_eq!(tuning(5), vec!["B0", "E1", "A1", "D2", "G2"]);
    }
}
