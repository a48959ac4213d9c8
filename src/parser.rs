//! # Parser Module
//!
//! Builds a [`Document`] from the token stream of the tokenizer.
//!
//! ## Purpose
//! The parser is the second stage of the pipeline. Tokens arrive one at a
//! time and are applied to the running state: the measure being filled, the
//! last event placed, and anchors waiting for the next note (glissando,
//! hammer-on/pull-off) or for a repeat count.
//!
//! ## Anchors
//! Anchors are [`EventRef`] handles (measure number + event index), never
//! references. A tie or a slide may start in a measure that has already been
//! appended to the document, so a handle resolves either to the open measure
//! or to `document.measures[number - 1]`.
//!
//! ## Measures
//! A measure is appended when a bar arrives and it holds at least one event.
//! Empty measures are kept open and reused, which absorbs double bars. The
//! measure left open after the last bar is not appended; it stays reachable
//! through [`Parser::open_measure`].
//!
//! ## Related Modules
//! - `tokenizer` - Provides tokens to parse
//! - `theory` - Duration codes and pitch resolution
//! - `diagnostics` - Receives recoverable problems

use crate::ast::*;
use crate::config::Config;
use crate::diagnostics::{Diagnostics, LogDiagnostics};
use crate::error::{Diagnostic, TheoryError};
use crate::theory::{self, FALLBACK_PITCH, OPEN_STRINGS};
use crate::token::Token;
use num_rational::Ratio;

/// Handle to an event already placed in a measure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRef {
    pub measure: usize,
    pub index: usize,
}

/// Marker written above a bent note
const BEND_MARKER: &str = "~";

pub struct Parser<I, D = LogDiagnostics> {
    tokens: I,
    diagnostics: D,
    title_trailer: String,
    copyright_label: String,
    document: Document,
    measure: Option<Measure>,
    measure_number: usize,
    time_signature: Option<TimeSignature>,
    current: Option<EventRef>,
    glissando: Option<EventRef>,
    ornament: Option<(EventRef, Technique)>,
    repeated_measure: Option<usize>,
    last_header: String,
}

impl<I: Iterator<Item = Token>> Parser<I, LogDiagnostics> {
    pub fn new(tokens: I, config: &Config) -> Self {
        Self::with_diagnostics(tokens, config, LogDiagnostics)
    }
}

impl<I: Iterator<Item = Token>, D: Diagnostics> Parser<I, D> {
    pub fn with_diagnostics(tokens: I, config: &Config, diagnostics: D) -> Self {
        Self {
            tokens,
            diagnostics,
            title_trailer: config.title_trailer.clone(),
            copyright_label: config.copyright_label.clone(),
            document: Document::default(),
            measure: None,
            measure_number: 1,
            time_signature: None,
            current: None,
            glissando: None,
            ornament: None,
            repeated_measure: None,
            last_header: String::new(),
        }
    }

    /// Consume every token and return the document.
    pub fn parse(mut self) -> Document {
        self.run();
        self.document
    }

    /// Like [`Parser::parse`], also handing back the diagnostics sink.
    pub fn finish(mut self) -> (Document, D) {
        self.run();
        (self.document, self.diagnostics)
    }

    /// Consume tokens until `End`. The parser stays inspectable afterwards.
    pub fn run(&mut self) {
        let mut token = self.next_token();
        while token.is_header() {
            self.header(token);
            token = self.next_token();
        }
        while !matches!(token, Token::NbStrings(_) | Token::End) {
            token = self.next_token();
        }
        while token != Token::End {
            self.handle(token);
            token = self.next_token();
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Measure still being filled (never appended to the document)
    pub fn open_measure(&self) -> Option<&Measure> {
        self.measure.as_ref()
    }

    fn next_token(&mut self) -> Token {
        self.tokens.next().unwrap_or(Token::End)
    }

    fn header(&mut self, token: Token) {
        match token {
            Token::Copyright(text) => {
                if self.document.copyright.is_none() {
                    self.document.copyright = Some(format!("{}{}", self.copyright_label, text));
                }
            }
            Token::Title(text) => {
                if self.document.title.is_none() {
                    self.document.title = Some(text);
                }
            }
            Token::HeaderLine(text) => {
                if text == self.title_trailer && !self.last_header.is_empty() {
                    if self.document.title.is_none() {
                        self.document.title = Some(self.last_header.trim().to_string());
                    }
                } else {
                    self.last_header = text;
                }
            }
            _ => {}
        }
    }

    fn handle(&mut self, token: Token) {
        match token {
            Token::NbStrings(count) => {
                log::debug!("Tuning: {}", theory::tuning(count).join(" "));
                self.document.strings = Some(count);
            }
            Token::MeasureBar => self.measure_bar(),
            Token::StartRepetition => {
                self.current_measure().left_barline = Barline::RepeatStart;
            }
            Token::EndRepetition => {
                let measure = self.current_measure();
                measure.right_barline = Barline::RepeatEnd;
                let number = measure.number;
                self.repeated_measure = Some(number);
            }
            Token::RepetitionNumber(value) => self.repetition_number(value),
            Token::TimeSignature(time_signature) => {
                self.time_signature = Some(time_signature);
                self.current_measure().time_signature = Some(time_signature);
            }
            Token::Note { duration, frets } => self.note(duration, frets),
            Token::Tie => {
                if let Some(event) = self.current.and_then(|r| self.event_mut(r)) {
                    event.tie_start = true;
                }
            }
            Token::TiedNote(code) => self.tied_note(code),
            Token::Rest(code) => match theory::parse_duration_code(&code) {
                Ok(duration) => {
                    self.push_event(Event::rest(duration));
                }
                Err(_) => self.report(Diagnostic::InvalidDuration {
                    measure: self.measure_number,
                    symbols: vec![code],
                }),
            },
            Token::LongRest(count) => self.long_rest(count),
            Token::Triolet => match self.current.and_then(|r| self.event_mut(r)) {
                Some(event) => event.duration.scale_by(Ratio::new(2, 3)),
                None => self.report(Diagnostic::MissingAnchor {
                    measure: self.measure_number,
                    ornament: "Triolet",
                }),
            },
            Token::GlissDown | Token::GlissUp => self.glissando = self.current,
            Token::Bend => self.bend(),
            Token::HammerOn => self.anchor_ornament(Technique::HammerOn),
            Token::PullOff => self.anchor_ornament(Technique::PullOff),
            Token::HeaderLine(_) | Token::Title(_) | Token::Copyright(_) | Token::End => {}
        }
    }

    fn measure_bar(&mut self) {
        let next = match self.measure.take() {
            Some(measure) if !measure.is_empty() => {
                self.close_measure(measure);
                Measure::new(self.measure_number)
            }
            // Double bars and bars before any event keep the same measure
            Some(measure) => measure,
            None => Measure::new(self.measure_number),
        };
        self.measure = Some(next);
    }

    /// Check the duration and append the measure to the document.
    fn close_measure(&mut self, mut measure: Measure) {
        let time_signature = match self.time_signature {
            Some(time_signature) => time_signature,
            None => {
                let default = TimeSignature::default();
                self.time_signature = Some(default);
                measure.time_signature = Some(default);
                default
            }
        };

        let actual = measure.total_units();
        if actual != time_signature.measure_units() {
            self.report(Diagnostic::MeasureDurationMismatch {
                measure: measure.number,
                actual,
                time_signature,
            });
        }

        log::debug!("Adding measure {}", measure.number);
        self.document.measures.push(measure);
        self.measure_number += 1;
    }

    fn repetition_number(&mut self, value: String) {
        let target = self
            .repeated_measure
            .take()
            .and_then(|number| self.measure_by_number(number));
        match target {
            Some(measure) => {
                let end = measure.total_units();
                measure.add_direction(end, format!("{}x", value), TextStyle::Centered);
            }
            None => self.report(Diagnostic::DanglingRepetitionNumber {
                measure: self.measure_number,
                value,
            }),
        }
    }

    fn note(&mut self, code: String, frets: Vec<String>) {
        let duration = match theory::parse_duration_code(&code) {
            Ok(duration) => duration,
            Err(_) => {
                let symbols = std::iter::once(code).chain(frets).collect();
                self.report(Diagnostic::InvalidDuration {
                    measure: self.measure_number,
                    symbols,
                });
                return;
            }
        };

        let strings = self.document.strings.unwrap_or(OPEN_STRINGS.len());
        let played: Vec<(usize, &str)> = frets
            .iter()
            .enumerate()
            .filter(|(_, fret)| !fret.is_empty())
            .map(|(index, fret)| (index, fret.as_str()))
            .collect();

        let resolved: Vec<Result<Pitch, TheoryError>> = played
            .iter()
            .map(|(index, fret)| theory::resolve_pitch(strings, *index, fret))
            .collect();
        let mut invalid = resolved.is_empty();
        let mut pitches = Vec::with_capacity(resolved.len().max(1));
        for result in resolved {
            match result {
                Ok(pitch) => pitches.push(pitch),
                Err(error) => {
                    if let TheoryError::UnsupportedGraceNote(symbol) = &error {
                        log::info!("Appoggiatura not supported: {}", symbol);
                    }
                    invalid = true;
                    pitches.push(FALLBACK_PITCH);
                }
            }
        }
        if pitches.is_empty() {
            pitches.push(FALLBACK_PITCH);
        }
        if invalid {
            let symbols = std::iter::once(code).chain(frets.iter().cloned()).collect();
            self.report(Diagnostic::InvalidPitch {
                measure: self.measure_number,
                symbols,
            });
        }

        let kind = if pitches.len() > 1 {
            EventKind::Chord(pitches)
        } else {
            EventKind::Note(pitches[0])
        };
        let target = self.push_event(Event::new(kind, duration));

        if let Some(from) = self.glissando.take() {
            if let Some(event) = self.event_mut(from) {
                event.slide_start = true;
            }
            if let Some(event) = self.event_mut(target) {
                event.slide_stop = true;
            }
        }

        if let Some((from, technique)) = self.ornament.take() {
            if let Some(event) = self.event_mut(from) {
                event.slur_start = true;
                event.technique_start = Some(technique);
            }
            if let Some(measure) = self.measure_by_number(target.measure) {
                let offset = measure.offset_of(target.index);
                if let Some(event) = measure.events.get_mut(target.index) {
                    event.slur_stop = true;
                    event.technique = Some(technique);
                }
                measure.add_direction(offset, technique.marker(), TextStyle::Technique);
            }
        }
    }

    fn tied_note(&mut self, code: char) {
        let kind = self
            .current
            .and_then(|r| self.event(r))
            .filter(|event| event.tie_start)
            .map(|event| event.kind.clone());
        let Some(kind) = kind else {
            self.report(Diagnostic::DanglingTie {
                measure: self.measure_number,
                code,
            });
            return;
        };

        match theory::parse_duration(code) {
            Ok(duration) => {
                let mut event = Event::new(kind, duration);
                event.tie_stop = true;
                self.push_event(event);
            }
            Err(_) => self.report(Diagnostic::InvalidDuration {
                measure: self.measure_number,
                symbols: vec![code.to_string()],
            }),
        }
    }

    /// Fill a whole measure with rests and mark it as repeated `count` times.
    fn long_rest(&mut self, count: String) {
        let budget = self.time_signature.unwrap_or_default().measure_units();
        let number = self.measure_number;
        let mut measure = self.measure.take().unwrap_or_else(|| Measure::new(number));

        measure.left_barline = Barline::RepeatStart;
        for code in theory::decompose_measure(budget) {
            if let Ok(duration) = theory::parse_duration(code) {
                measure.events.push(Event::rest(duration));
            }
        }
        let end = measure.total_units();
        measure.add_direction(end, format!("{}x", count), TextStyle::Centered);
        measure.right_barline = Barline::RepeatEnd;

        self.close_measure(measure);
        self.measure = Some(Measure::new(self.measure_number));
    }

    fn bend(&mut self) {
        let anchor = self.current;
        let target = anchor.and_then(|r| self.measure_by_number(r.measure).map(|m| (m, r.index)));
        match target {
            Some((measure, index)) => {
                let offset = measure.offset_of(index);
                measure.add_direction(offset, BEND_MARKER, TextStyle::Plain);
            }
            None => self.report(Diagnostic::MissingAnchor {
                measure: self.measure_number,
                ornament: "Bend",
            }),
        }
    }

    fn anchor_ornament(&mut self, technique: Technique) {
        if let Some(current) = self.current {
            self.ornament = Some((current, technique));
        }
    }

    /// Open measure, created on first use
    fn current_measure(&mut self) -> &mut Measure {
        let number = self.measure_number;
        self.measure.get_or_insert_with(|| Measure::new(number))
    }

    fn push_event(&mut self, event: Event) -> EventRef {
        let measure = self.current_measure();
        measure.events.push(event);
        let handle = EventRef {
            measure: measure.number,
            index: measure.events.len() - 1,
        };
        self.current = Some(handle);
        handle
    }

    fn measure_by_number(&mut self, number: usize) -> Option<&mut Measure> {
        if let Some(measure) = self.measure.as_mut().filter(|m| m.number == number) {
            return Some(measure);
        }
        self.document.measures.get_mut(number.checked_sub(1)?)
    }

    fn event(&self, handle: EventRef) -> Option<&Event> {
        let measure = match &self.measure {
            Some(measure) if measure.number == handle.measure => measure,
            _ => self.document.measures.get(handle.measure.checked_sub(1)?)?,
        };
        measure.events.get(handle.index)
    }

    fn event_mut(&mut self, handle: EventRef) -> Option<&mut Event> {
        self.measure_by_number(handle.measure)?
            .events
            .get_mut(handle.index)
    }

    fn report(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.report(diagnostic);
    }
}
