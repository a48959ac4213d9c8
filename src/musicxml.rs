use crate::ast::*;
use crate::theory;
use num_rational::Ratio;
use quick_xml::escape::escape;

/// Divisions per 32nd note. 24 per quarter keeps dots and triplets integral.
const DIVISIONS_PER_UNIT: u32 = 3;

/// Convert a Document to MusicXML format
pub fn to_musicxml(document: &Document) -> String {
    if document.title.is_none() {
        log::warn!("Title not found");
    }
    if document.copyright.is_none() {
        log::warn!("Score has no copyright");
    }

    let mut xml = String::new();

    // XML declaration and doctype
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    xml.push_str(r#"<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">"#);
    xml.push('\n');

    xml.push_str(r#"<score-partwise version="4.0">"#);
    xml.push('\n');

    if let Some(title) = &document.title {
        xml.push_str("  <work>\n");
        xml.push_str(&format!("    <work-title>{}</work-title>\n", escape(title.as_str())));
        xml.push_str("  </work>\n");
    }

    if let Some(copyright) = &document.copyright {
        xml.push_str("  <identification>\n");
        xml.push_str(&format!("    <rights>{}</rights>\n", escape(copyright.as_str())));
        xml.push_str("  </identification>\n");
    }

    // Part list
    xml.push_str("  <part-list>\n");
    xml.push_str("    <score-part id=\"P1\">\n");
    xml.push_str("      <part-name>Bass</part-name>\n");
    xml.push_str("      <score-instrument id=\"P1-I1\">\n");
    xml.push_str("        <instrument-name>Electric Bass</instrument-name>\n");
    xml.push_str("      </score-instrument>\n");
    xml.push_str("    </score-part>\n");
    xml.push_str("  </part-list>\n");

    xml.push_str("  <part id=\"P1\">\n");
    let strings = document.strings.unwrap_or(4);
    for (i, measure) in document.measures.iter().enumerate() {
        // The first measure always states a time signature
        let time_signature = if i == 0 {
            Some(document.effective_time_signature(0))
        } else {
            measure.time_signature
        };
        xml.push_str(&measure_to_xml(measure, time_signature, (i == 0).then_some(strings)));
    }
    xml.push_str("  </part>\n");
    xml.push_str("</score-partwise>\n");

    xml
}

/// `strings` is set for the first measure only, which carries clef and tuning.
fn measure_to_xml(
    measure: &Measure,
    time_signature: Option<TimeSignature>,
    strings: Option<usize>,
) -> String {
    let mut xml = String::new();

    xml.push_str(&format!("    <measure number=\"{}\">\n", measure.number));

    if strings.is_some() || time_signature.is_some() {
        xml.push_str("      <attributes>\n");
        if strings.is_some() {
            xml.push_str(&format!("        <divisions>{}</divisions>\n", 8 * DIVISIONS_PER_UNIT));
            xml.push_str("        <key>\n");
            xml.push_str("          <fifths>0</fifths>\n");
            xml.push_str("        </key>\n");
        }
        if let Some(ts) = time_signature {
            xml.push_str("        <time>\n");
            xml.push_str(&format!("          <beats>{}</beats>\n", ts.beats));
            xml.push_str(&format!("          <beat-type>{}</beat-type>\n", ts.beat_type));
            xml.push_str("        </time>\n");
        }
        if let Some(strings) = strings {
            xml.push_str("        <clef>\n");
            xml.push_str("          <sign>F</sign>\n");
            xml.push_str("          <line>4</line>\n");
            xml.push_str("        </clef>\n");
            xml.push_str(&staff_tuning_to_xml(strings));
            // Bass sounds an octave below the written pitch
            xml.push_str("        <transpose>\n");
            xml.push_str("          <diatonic>0</diatonic>\n");
            xml.push_str("          <chromatic>0</chromatic>\n");
            xml.push_str("          <octave-change>-1</octave-change>\n");
            xml.push_str("        </transpose>\n");
        }
        xml.push_str("      </attributes>\n");
    }

    if measure.left_barline == Barline::RepeatStart {
        xml.push_str("      <barline location=\"left\">\n");
        xml.push_str("        <bar-style>heavy-light</bar-style>\n");
        xml.push_str("        <repeat direction=\"forward\"/>\n");
        xml.push_str("      </barline>\n");
    }

    let mut directions: Vec<&Direction> = measure.directions.iter().collect();
    directions.sort_by(|a, b| a.offset.cmp(&b.offset));
    let mut pending = directions.into_iter().peekable();

    let mut position = Ratio::from_integer(0);
    for event in &measure.events {
        let end = position + event.duration.units();
        // Directions starting inside this event come right before it
        while let Some(direction) = pending.next_if(|d| d.offset < end) {
            xml.push_str(&direction_to_xml(direction, position));
        }
        xml.push_str(&event_to_xml(event));
        position = end;
    }
    for direction in pending {
        xml.push_str(&direction_to_xml(direction, position));
    }

    if measure.right_barline == Barline::RepeatEnd {
        xml.push_str("      <barline location=\"right\">\n");
        xml.push_str("        <bar-style>light-heavy</bar-style>\n");
        xml.push_str("        <repeat direction=\"backward\"/>\n");
        xml.push_str("      </barline>\n");
    }

    xml.push_str("    </measure>\n");
    xml
}

fn staff_tuning_to_xml(strings: usize) -> String {
    let mut xml = String::from("        <staff-details>\n");
    for (line, name) in theory::tuning(strings).iter().enumerate() {
        let (step, octave) = name.split_at(1);
        xml.push_str(&format!("          <staff-tuning line=\"{}\">\n", line + 1));
        xml.push_str(&format!("            <tuning-step>{}</tuning-step>\n", step));
        xml.push_str(&format!("            <tuning-octave>{}</tuning-octave>\n", octave));
        xml.push_str("          </staff-tuning>\n");
    }
    xml.push_str("        </staff-details>\n");
    xml
}

/// `position` is where the next note starts; the direction is shifted from
/// there with `<offset>` when it does not line up.
fn direction_to_xml(direction: &Direction, position: Ratio<u32>) -> String {
    let mut xml = String::new();
    let words = match direction.style {
        TextStyle::Plain => format!("<words>{}</words>", escape(direction.text.as_str())),
        TextStyle::Centered => format!(
            "<words halign=\"center\">{}</words>",
            escape(direction.text.as_str())
        ),
        TextStyle::Technique => format!(
            "<words halign=\"center\" default-y=\"100\" font-size=\"8\" font-style=\"italic\">{}</words>",
            escape(direction.text.as_str())
        ),
    };

    xml.push_str("      <direction placement=\"above\">\n");
    xml.push_str("        <direction-type>\n");
    xml.push_str(&format!("          {}\n", words));
    xml.push_str("        </direction-type>\n");
    if direction.offset > position {
        let shift = to_divisions(direction.offset - position);
        if shift > 0 {
            xml.push_str(&format!("        <offset>{}</offset>\n", shift));
        }
    }
    xml.push_str("      </direction>\n");
    xml
}

fn event_to_xml(event: &Event) -> String {
    if event.is_rest() {
        return note_to_xml(event, None, false);
    }
    event
        .pitches()
        .iter()
        .enumerate()
        .map(|(i, pitch)| note_to_xml(event, Some(pitch), i > 0))
        .collect()
}

fn note_to_xml(event: &Event, pitch: Option<&Pitch>, chord_member: bool) -> String {
    let mut xml = String::new();
    let duration = &event.duration;

    xml.push_str("      <note>\n");
    if chord_member {
        xml.push_str("        <chord/>\n");
    }

    match pitch {
        Some(pitch) => {
            let (step, alter, octave) = pitch.spelling();
            xml.push_str("        <pitch>\n");
            xml.push_str(&format!("          <step>{}</step>\n", step));
            if alter != 0 {
                xml.push_str(&format!("          <alter>{}</alter>\n", alter));
            }
            xml.push_str(&format!("          <octave>{}</octave>\n", octave));
            xml.push_str("        </pitch>\n");
        }
        None => xml.push_str("        <rest/>\n"),
    }

    xml.push_str(&format!("        <duration>{}</duration>\n", to_divisions(duration.units())));

    // Tie elements (for playback)
    if event.tie_stop {
        xml.push_str("        <tie type=\"stop\"/>\n");
    }
    if event.tie_start {
        xml.push_str("        <tie type=\"start\"/>\n");
    }

    xml.push_str(&format!("        <type>{}</type>\n", duration.value.musicxml_type()));
    if duration.dotted {
        xml.push_str("        <dot/>\n");
    }

    if duration.is_scaled() {
        // A 2/3 scale is 3 notes in the time of 2
        xml.push_str("        <time-modification>\n");
        xml.push_str(&format!(
            "          <actual-notes>{}</actual-notes>\n",
            duration.scale.denom()
        ));
        xml.push_str(&format!(
            "          <normal-notes>{}</normal-notes>\n",
            duration.scale.numer()
        ));
        xml.push_str("        </time-modification>\n");
    }

    if pitch.is_some_and(|p| p.ghost) {
        xml.push_str("        <notehead>x</notehead>\n");
    }

    let notations = notations_to_xml(event);
    if !notations.is_empty() {
        xml.push_str("        <notations>\n");
        xml.push_str(&notations);
        xml.push_str("        </notations>\n");
    }

    xml.push_str("      </note>\n");
    xml
}

fn notations_to_xml(event: &Event) -> String {
    let mut xml = String::new();

    if event.tie_stop {
        xml.push_str("          <tied type=\"stop\"/>\n");
    }
    if event.tie_start {
        xml.push_str("          <tied type=\"start\"/>\n");
    }
    if event.slide_stop {
        xml.push_str("          <slide type=\"stop\" line-type=\"solid\"/>\n");
    }
    if event.slide_start {
        xml.push_str("          <slide type=\"start\" line-type=\"solid\"/>\n");
    }
    if event.slur_stop {
        xml.push_str("          <slur type=\"stop\"/>\n");
    }
    if event.slur_start {
        xml.push_str("          <slur type=\"start\"/>\n");
    }

    let mut technical = String::new();
    if let Some(technique) = event.technique {
        technical.push_str(&technique_to_xml(technique, "stop"));
    }
    if let Some(technique) = event.technique_start {
        technical.push_str(&technique_to_xml(technique, "start"));
    }
    if !technical.is_empty() {
        xml.push_str("          <technical>\n");
        xml.push_str(&technical);
        xml.push_str("          </technical>\n");
    }

    xml
}

fn technique_to_xml(technique: Technique, kind: &str) -> String {
    let (element, letter) = match technique {
        Technique::HammerOn => ("hammer-on", "H"),
        Technique::PullOff => ("pull-off", "P"),
    };
    format!(
        "            <{element} type=\"{kind}\">{letter}</{element}>\n",
        element = element,
        kind = kind,
        letter = letter
    )
}

/// Convert a length in 32nd notes to MusicXML divisions, rounding lengths
/// that fall between two divisions.
fn to_divisions(units: Ratio<u32>) -> u32 {
    let divisions = units * Ratio::from_integer(DIVISIONS_PER_UNIT);
    if !divisions.is_integer() {
        log::warn!(
            "Duration of {} 32nd notes is not a whole number of divisions",
            units
        );
    }
    divisions.round().to_integer()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::events::Event as XmlEvent;
    use quick_xml::Reader;

    fn assert_well_formed(xml: &str) {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(XmlEvent::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("Malformed XML at {}: {}", reader.buffer_position(), e),
            }
        }
    }

    fn quarter(midi: u8) -> Event {
        Event::new(EventKind::Note(Pitch::new(midi)), Duration::new(NoteValue::Quarter, false))
    }

    fn document_with(measure: Measure) -> Document {
        Document {
            title: Some("Limelight & Co".to_string()),
            copyright: Some("Translation copyright: Someone".to_string()),
            strings: Some(4),
            measures: vec![measure],
        }
    }

    #[test]
    fn test_header_and_attributes() {
        let mut measure = Measure::new(1);
        measure.events.push(Event::rest(Duration::new(NoteValue::Whole, false)));
        let xml = to_musicxml(&document_with(measure));

        assert_well_formed(&xml);
        assert!(xml.contains("<work-title>Limelight &amp; Co</work-title>"));
        assert!(xml.contains("<rights>Translation copyright: Someone</rights>"));
        assert!(xml.contains("<divisions>24</divisions>"));
        assert!(xml.contains("<beats>4</beats>"));
        assert!(xml.contains("<sign>F</sign>"));
        assert!(xml.contains("<tuning-step>E</tuning-step>"));
        assert!(xml.contains("<rest/>"));
        assert!(xml.contains("<duration>96</duration>"));
    }

    #[test]
    fn test_pitch_spelling_and_durations() {
        let mut measure = Measure::new(1);
        measure.events.push(quarter(42));
        measure.events.push(Event::new(
            EventKind::Note(Pitch::new(40)),
            Duration::new(NoteValue::Half, true),
        ));
        let xml = to_musicxml(&document_with(measure));

        assert!(xml.contains("<step>F</step>"));
        assert!(xml.contains("<alter>1</alter>"));
        assert!(xml.contains("<octave>2</octave>"));
        assert!(xml.contains("<duration>72</duration>"));
        assert!(xml.contains("<dot/>"));
    }

    #[test]
    fn test_chord_and_ghost_note() {
        let mut measure = Measure::new(1);
        measure.events.push(Event::new(
            EventKind::Chord(vec![Pitch::new(57), Pitch::ghost(45)]),
            Duration::new(NoteValue::Whole, false),
        ));
        let xml = to_musicxml(&document_with(measure));

        assert_well_formed(&xml);
        assert_eq!(xml.matches("<chord/>").count(), 1);
        assert_eq!(xml.matches("<notehead>x</notehead>").count(), 1);
    }

    #[test]
    fn test_triplet_tie_and_slide() {
        let mut measure = Measure::new(1);
        let mut first = quarter(40);
        first.tie_start = true;
        first.slide_start = true;
        first.duration.scale_by(Ratio::new(2, 3));
        let mut second = quarter(40);
        second.tie_stop = true;
        second.slide_stop = true;
        measure.events.push(first);
        measure.events.push(second);
        let xml = to_musicxml(&document_with(measure));

        assert_well_formed(&xml);
        assert!(xml.contains("<actual-notes>3</actual-notes>"));
        assert!(xml.contains("<normal-notes>2</normal-notes>"));
        assert!(xml.contains("<duration>16</duration>"));
        assert!(xml.contains("<tie type=\"start\"/>"));
        assert!(xml.contains("<tied type=\"stop\"/>"));
        assert!(xml.contains("<slide type=\"start\" line-type=\"solid\"/>"));
    }

    #[test]
    fn test_repeat_barlines_and_count() {
        let mut measure = Measure::new(1);
        measure.left_barline = Barline::RepeatStart;
        measure.right_barline = Barline::RepeatEnd;
        measure.events.push(Event::rest(Duration::new(NoteValue::Whole, false)));
        measure.add_direction(Ratio::from_integer(32), "5x", TextStyle::Centered);
        let xml = to_musicxml(&document_with(measure));

        assert_well_formed(&xml);
        assert!(xml.contains("<repeat direction=\"forward\"/>"));
        assert!(xml.contains("<repeat direction=\"backward\"/>"));
        assert!(xml.contains("<words halign=\"center\">5x</words>"));
        // The count comes after the rest
        assert!(xml.find("<rest/>") < xml.find("5x"));
    }

    #[test]
    fn test_hammer_on_marker_precedes_target_note() {
        let mut measure = Measure::new(1);
        let mut from = quarter(45);
        from.slur_start = true;
        from.technique_start = Some(Technique::HammerOn);
        let mut to = quarter(47);
        to.slur_stop = true;
        to.technique = Some(Technique::HammerOn);
        measure.events.push(from);
        measure.events.push(to);
        measure.add_direction(Ratio::from_integer(8), "h", TextStyle::Technique);
        let xml = to_musicxml(&document_with(measure));

        assert_well_formed(&xml);
        assert!(xml.contains("<hammer-on type=\"start\">H</hammer-on>"));
        assert!(xml.contains("<hammer-on type=\"stop\">H</hammer-on>"));
        let marker = xml.find("font-style=\"italic\">h</words>").unwrap();
        let target = xml.find("<step>B</step>").unwrap();
        let source = xml.find("<step>A</step>").unwrap();
        assert!(source < marker && marker < target);
    }

    #[test]
    fn test_time_signature_only_when_changed() {
        let mut first = Measure::new(1);
        first.time_signature = Some(TimeSignature { beats: 3, beat_type: 4 });
        first.events.push(Event::rest(Duration::new(NoteValue::Half, true)));
        let mut second = Measure::new(2);
        second.events.push(Event::rest(Duration::new(NoteValue::Half, true)));
        let document = Document {
            measures: vec![first, second],
            ..Document::default()
        };
        let xml = to_musicxml(&document);

        assert_well_formed(&xml);
        assert_eq!(xml.matches("<time>").count(), 1);
        assert_eq!(xml.matches("<attributes>").count(), 1);
        assert!(!xml.contains("<work>"));
    }

    #[test]
    fn test_divisions_round_stacked_triplets() {
        assert_eq!(to_divisions(Ratio::new(8, 3)), 8);
        // An eighth scaled twice by 2/3 lasts 16/9 of a 32nd note
        assert_eq!(to_divisions(Ratio::new(16, 9)), 5);
    }
}
