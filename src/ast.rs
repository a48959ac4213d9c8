//! # Document Types
//!
//! This module defines the symbolic music document built from a bass tab.
//!
//! ## Type Hierarchy
//! ```text
//! Document
//!   ├── title / copyright: Option<String>
//!   ├── strings: Option<usize> (4 or 5)
//!   └── Vec<Measure>
//!         ├── number (1-based, no gaps)
//!         ├── time_signature: Option<TimeSignature>
//!         ├── left_barline / right_barline: Barline
//!         ├── Vec<Event>
//!         │     ├── kind: Note(Pitch) | Chord(Vec<Pitch>) | Rest
//!         │     ├── duration: Duration (value, dotted, scale)
//!         │     └── tie / slide / slur / technique flags
//!         └── Vec<Direction> (text above the staff at an offset)
//! ```
//!
//! ## Key Concepts
//!
//! ### Durations are counted in 32nd notes
//! A whole note is 32 units, a dotted quarter 12, a 32nd note 1. Lengths are
//! exact rationals so that a triplet (scale 2/3) never loses precision:
//! a triplet eighth is `4 * 2/3 = 8/3` units.
//!
//! ### Pitches are MIDI numbers
//! A fret is a semitone offset from the open string. Index 0 is the highest
//! string (G). A ghost note (`x`) keeps the open-string pitch and is drawn with
//! a cross notehead.
//!
//! ### Ties are two events
//! A tied note is represented by the first event (`tie_start`) followed by a
//! second event with the same pitches (`tie_stop`), possibly in the next measure.

use num_rational::Ratio;
use std::fmt;

/// Time signature (e.g., 4/4, 13/8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    pub beats: u32,
    pub beat_type: u32,
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

impl TimeSignature {
    /// Length of a full measure in 32nd notes.
    pub fn measure_units(&self) -> Ratio<u32> {
        Ratio::new(32u32.saturating_mul(self.beats), self.beat_type.max(1))
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats, self.beat_type)
    }
}

/// Base note value, without dot or tuplet scaling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteValue {
    Whole,
    Half,
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
}

impl NoteValue {
    /// Length in 32nd notes
    pub fn units(&self) -> u32 {
        match self {
            NoteValue::Whole => 32,
            NoteValue::Half => 16,
            NoteValue::Quarter => 8,
            NoteValue::Eighth => 4,
            NoteValue::Sixteenth => 2,
            NoteValue::ThirtySecond => 1,
        }
    }

    /// MusicXML type name
    pub fn musicxml_type(&self) -> &'static str {
        match self {
            NoteValue::Whole => "whole",
            NoteValue::Half => "half",
            NoteValue::Quarter => "quarter",
            NoteValue::Eighth => "eighth",
            NoteValue::Sixteenth => "16th",
            NoteValue::ThirtySecond => "32nd",
        }
    }
}

/// Duration of an event: base value, optional dot, and a scale factor that
/// stays 1 unless a triplet marker shortened the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    pub value: NoteValue,
    pub dotted: bool,
    pub scale: Ratio<u32>,
}

impl Duration {
    pub fn new(value: NoteValue, dotted: bool) -> Self {
        Self {
            value,
            dotted,
            scale: Ratio::from_integer(1),
        }
    }

    /// Exact length in 32nd notes, including dot and scale.
    pub fn units(&self) -> Ratio<u32> {
        let base = Ratio::from_integer(self.value.units());
        let with_dot = if self.dotted {
            base * Ratio::new(3, 2)
        } else {
            base
        };
        with_dot * self.scale
    }

    /// Multiply the scale by `factor`. A product too large for `u32` leaves
    /// the scale unchanged.
    pub fn scale_by(&mut self, factor: Ratio<u32>) {
        let numer = u64::from(*self.scale.numer()) * u64::from(*factor.numer());
        let denom = u64::from(*self.scale.denom()) * u64::from(*factor.denom());
        let reduced = Ratio::new(numer, denom);
        match (
            u32::try_from(*reduced.numer()),
            u32::try_from(*reduced.denom()),
        ) {
            (Ok(numer), Ok(denom)) => self.scale = Ratio::new(numer, denom),
            _ => log::warn!("Duration scale {} * {} overflows, ignored", self.scale, factor),
        }
    }

    pub fn is_scaled(&self) -> bool {
        self.scale != Ratio::from_integer(1)
    }
}

/// A resolved pitch. `midi` follows the written bass range (open E string = 40).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pitch {
    pub midi: u8,
    pub ghost: bool,
}

impl Pitch {
    pub fn new(midi: u8) -> Self {
        Self { midi, ghost: false }
    }

    pub fn ghost(midi: u8) -> Self {
        Self { midi, ghost: true }
    }

    /// Step, alteration and octave, spelled with sharps (C4 = 60).
    pub fn spelling(&self) -> (&'static str, i8, i8) {
        let (step, alter) = match self.midi % 12 {
            0 => ("C", 0),
            1 => ("C", 1),
            2 => ("D", 0),
            3 => ("D", 1),
            4 => ("E", 0),
            5 => ("F", 0),
            6 => ("F", 1),
            7 => ("G", 0),
            8 => ("G", 1),
            9 => ("A", 0),
            10 => ("A", 1),
            _ => ("B", 0),
        };
        let octave = (self.midi / 12) as i8 - 1;
        (step, alter, octave)
    }
}

/// Fretting-hand articulation between two notes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Technique {
    HammerOn,
    PullOff,
}

impl Technique {
    /// Letter shown above the staff
    pub fn marker(&self) -> &'static str {
        match self {
            Technique::HammerOn => "h",
            Technique::PullOff => "p",
        }
    }
}

/// What sounds during an event
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    Note(Pitch),
    Chord(Vec<Pitch>),
    Rest,
}

/// A note, chord or rest placed in a measure
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub duration: Duration,
    pub tie_start: bool,   // Tied to the next event
    pub tie_stop: bool,    // Continues the previous event
    pub slide_start: bool, // Glissando leaves this event
    pub slide_stop: bool,  // Glissando lands on this event
    pub slur_start: bool,
    pub slur_stop: bool,
    /// Hammer-on / pull-off leaving this event
    pub technique_start: Option<Technique>,
    /// Hammer-on / pull-off landing on this event
    pub technique: Option<Technique>,
}

impl Event {
    pub fn new(kind: EventKind, duration: Duration) -> Self {
        Self {
            kind,
            duration,
            tie_start: false,
            tie_stop: false,
            slide_start: false,
            slide_stop: false,
            slur_start: false,
            slur_stop: false,
            technique_start: None,
            technique: None,
        }
    }

    pub fn rest(duration: Duration) -> Self {
        Self::new(EventKind::Rest, duration)
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, EventKind::Rest)
    }

    /// Pitches sounding in this event (empty for a rest)
    pub fn pitches(&self) -> &[Pitch] {
        match &self.kind {
            EventKind::Note(pitch) => std::slice::from_ref(pitch),
            EventKind::Chord(pitches) => pitches,
            EventKind::Rest => &[],
        }
    }
}

/// Barline decoration on one side of a measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Barline {
    #[default]
    Regular,
    RepeatStart,
    RepeatEnd,
}

/// How a direction's text is laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    /// Plain marker (bends)
    Plain,
    /// Centered above the staff (repeat counts)
    Centered,
    /// Small italic letter over a hammer-on / pull-off
    Technique,
}

/// Text placed above the staff at an offset (in 32nd notes) from the measure start
#[derive(Debug, Clone, PartialEq)]
pub struct Direction {
    pub offset: Ratio<u32>,
    pub text: String,
    pub style: TextStyle,
}

/// A single measure
#[derive(Debug, Clone, PartialEq)]
pub struct Measure {
    pub number: usize,
    pub time_signature: Option<TimeSignature>,
    pub left_barline: Barline,
    pub right_barline: Barline,
    pub events: Vec<Event>,
    pub directions: Vec<Direction>,
}

impl Measure {
    pub fn new(number: usize) -> Self {
        Self {
            number,
            time_signature: None,
            left_barline: Barline::Regular,
            right_barline: Barline::Regular,
            events: Vec::new(),
            directions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sum of event durations in 32nd notes
    pub fn total_units(&self) -> Ratio<u32> {
        self.events
            .iter()
            .fold(Ratio::from_integer(0), |sum, e| sum + e.duration.units())
    }

    /// Start of the event at `index`, in 32nd notes from the measure start
    pub fn offset_of(&self, index: usize) -> Ratio<u32> {
        self.events
            .iter()
            .take(index)
            .fold(Ratio::from_integer(0), |sum, e| sum + e.duration.units())
    }

    pub fn add_direction(&mut self, offset: Ratio<u32>, text: impl Into<String>, style: TextStyle) {
        self.directions.push(Direction {
            offset,
            text: text.into(),
            style,
        });
    }
}

/// A converted tab
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub title: Option<String>,
    pub copyright: Option<String>,
    pub strings: Option<usize>,
    pub measures: Vec<Measure>,
}

impl Document {
    /// Time signature in force in the measure at `index`: its own, else the
    /// closest earlier one, else 4/4.
    pub fn effective_time_signature(&self, index: usize) -> TimeSignature {
        self.measures
            .iter()
            .take(index + 1)
            .rev()
            .find_map(|m| m.time_signature)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_units() {
        assert_eq!(Duration::new(NoteValue::Quarter, false).units(), Ratio::from_integer(8));
        assert_eq!(Duration::new(NoteValue::Quarter, true).units(), Ratio::from_integer(12));
        assert_eq!(Duration::new(NoteValue::Whole, true).units(), Ratio::from_integer(48));
        assert_eq!(Duration::new(NoteValue::Sixteenth, true).units(), Ratio::from_integer(3));
    }

    #[test]
    fn test_triplet_scale_is_exact() {
        let mut duration = Duration::new(NoteValue::Eighth, false);
        duration.scale_by(Ratio::new(2, 3));
        assert!(duration.is_scaled());
        assert_eq!(duration.units(), Ratio::new(8, 3));
        // Three triplet eighths fill a quarter
        assert_eq!(duration.units() * Ratio::from_integer(3), Ratio::from_integer(8));
    }

    #[test]
    fn test_time_signature_measure_units() {
        assert_eq!(TimeSignature::default().measure_units(), Ratio::from_integer(32));
        let ts = TimeSignature { beats: 13, beat_type: 8 };
        assert_eq!(ts.measure_units(), Ratio::from_integer(52));
        assert_eq!(ts.to_string(), "13/8");
    }

    #[test]
    fn test_huge_time_signature_does_not_overflow() {
        let ts = TimeSignature { beats: 999_999_999, beat_type: 4 };
        assert_eq!(ts.measure_units(), Ratio::new(u32::MAX, 4));
    }

    #[test]
    fn test_stacked_triplets_stop_scaling_on_overflow() {
        let mut duration = Duration::new(NoteValue::Eighth, false);
        for _ in 0..40 {
            duration.scale_by(Ratio::new(2, 3));
        }
        // 3^20 is the last power of three that fits in u32
        assert_eq!(*duration.scale.denom(), 3u32.pow(20));
        assert_eq!(*duration.scale.numer(), 2u32.pow(20));
    }

    #[test]
    fn test_pitch_spelling() {
        assert_eq!(Pitch::new(40).spelling(), ("E", 0, 2));
        assert_eq!(Pitch::new(57).spelling(), ("A", 0, 3));
        assert_eq!(Pitch::new(60).spelling(), ("C", 0, 4));
        assert_eq!(Pitch::new(54).spelling(), ("F", 1, 3));
    }

    #[test]
    fn test_measure_offsets() {
        let mut measure = Measure::new(1);
        measure.events.push(Event::rest(Duration::new(NoteValue::Half, false)));
        measure.events.push(Event::rest(Duration::new(NoteValue::Quarter, true)));
        measure.events.push(Event::rest(Duration::new(NoteValue::Eighth, false)));
        assert_eq!(measure.offset_of(0), Ratio::from_integer(0));
        assert_eq!(measure.offset_of(2), Ratio::from_integer(28));
        assert_eq!(measure.total_units(), Ratio::from_integer(32));
    }

    #[test]
    fn test_effective_time_signature_inherits() {
        let three_four = TimeSignature { beats: 3, beat_type: 4 };
        let mut first = Measure::new(1);
        first.time_signature = Some(three_four);
        let document = Document {
            measures: vec![first, Measure::new(2)],
            ..Document::default()
        };
        assert_eq!(document.effective_time_signature(1), three_four);
        assert_eq!(Document::default().effective_time_signature(0), TimeSignature::default());
    }
}
