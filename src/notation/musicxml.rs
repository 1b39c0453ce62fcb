use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{PracticeError, Result};
use crate::rhythm::duration::{validate_resolution, DurationValue};
use crate::rhythm::time_signature::TimeSignature;
use crate::rhythm::types::{DiscreteMeasure, DiscretePassage, ElementKind, MeasureElement};
use crate::tuning::parse_pitch_name;

const DOCTYPE: &str = r#"score-partwise PUBLIC "-//Recordare//DTD MusicXML 4.0 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd""#;
const PART_ID: &str = "P1";

type XmlWriter = Writer<Vec<u8>>;

/// Divisions per quarter note for a grid of `1/resolution` notes.
fn divisions_for(resolution: u32) -> u32 {
    (resolution / 4).max(1)
}

fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn start(writer: &mut XmlWriter, name: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn end(writer: &mut XmlWriter, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn tie(writer: &mut XmlWriter, name: &str, kind: &str) -> Result<()> {
    let mut element = BytesStart::new(name);
    element.push_attribute(("type", kind));
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

/// Render `passage` as a single-part `score-partwise` document.
pub fn passage_to_musicxml(
    passage: &DiscretePassage,
    time_signature: TimeSignature,
) -> Result<String> {
    // divisions come from the finest grid so every measure's values are whole
    let mut resolution: u32 = 4;
    for measure in &passage.measures {
        validate_resolution(measure.subdivision_denominator)?;
        resolution = resolution.max(measure.subdivision_denominator);
    }

    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::DocType(BytesText::from_escaped(DOCTYPE)))?;

    let mut root = BytesStart::new("score-partwise");
    root.push_attribute(("version", "4.0"));
    writer.write_event(Event::Start(root))?;

    start(&mut writer, "part-list")?;
    let mut score_part = BytesStart::new("score-part");
    score_part.push_attribute(("id", PART_ID));
    writer.write_event(Event::Start(score_part))?;
    text_element(&mut writer, "part-name", "Rhythm")?;
    end(&mut writer, "score-part")?;
    end(&mut writer, "part-list")?;

    let mut part = BytesStart::new("part");
    part.push_attribute(("id", PART_ID));
    writer.write_event(Event::Start(part))?;

    for (index, measure) in passage.measures.iter().enumerate() {
        let next_is_tie = passage
            .measures
            .get(index + 1)
            .and_then(|m| m.elements.first())
            .map(|e| e.tied_from_previous && !e.is_rest())
            .unwrap_or(false);
        write_measure(
            &mut writer,
            index,
            measure,
            time_signature,
            divisions_for(resolution),
            next_is_tie,
        )?;
    }

    end(&mut writer, "part")?;
    end(&mut writer, "score-partwise")?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_measure(
    writer: &mut XmlWriter,
    index: usize,
    measure: &DiscreteMeasure,
    time_signature: TimeSignature,
    divisions: u32,
    next_is_tie: bool,
) -> Result<()> {
    let number = (index + 1).to_string();
    let mut element = BytesStart::new("measure");
    element.push_attribute(("number", number.as_str()));
    writer.write_event(Event::Start(element))?;

    if index == 0 {
        start(writer, "attributes")?;
        text_element(writer, "divisions", &divisions.to_string())?;
        start(writer, "time")?;
        text_element(writer, "beats", &time_signature.numerator.to_string())?;
        text_element(writer, "beat-type", &time_signature.denominator.to_string())?;
        end(writer, "time")?;
        start(writer, "clef")?;
        text_element(writer, "sign", "G")?;
        text_element(writer, "line", "2")?;
        end(writer, "clef")?;
        end(writer, "attributes")?;
    }

    let last = measure.elements.len().saturating_sub(1);
    for (i, element) in measure.elements.iter().enumerate() {
        let continues = i == last && next_is_tie;
        write_element(
            writer,
            element,
            measure.subdivision_denominator,
            divisions,
            continues,
        )?;
    }

    end(writer, "measure")
}

/// One `<note>` per duration. Consecutive durations of a note are tied, as
/// are the first and last of a note crossing a barline.
fn write_element(
    writer: &mut XmlWriter,
    element: &MeasureElement,
    resolution: u32,
    divisions: u32,
    continues: bool,
) -> Result<()> {
    let units_per_subdivision = 4 * divisions / resolution;
    let pitch = match &element.kind {
        ElementKind::Note(note) => Some(parse_pitch_name(&note.pitch_name)?),
        ElementKind::Rest(_) => None,
    };
    let durations = element.durations();
    let last = durations.len().saturating_sub(1);

    for (i, value) in durations.iter().enumerate() {
        if !value.is_valid(resolution) {
            return Err(PracticeError::InvalidDuration {
                denominator: value.denominator,
                dots: value.dots,
            });
        }
        let (tie_stop, tie_start) = match pitch {
            Some(_) => (
                i > 0 || element.tied_from_previous,
                i < last || continues,
            ),
            None => (false, false),
        };

        start(writer, "note")?;
        match pitch {
            Some((step, alter, octave)) => {
                start(writer, "pitch")?;
                text_element(writer, "step", &step.to_string())?;
                if alter != 0 {
                    text_element(writer, "alter", &alter.to_string())?;
                }
                text_element(writer, "octave", &octave.to_string())?;
                end(writer, "pitch")?;
            }
            None => writer.write_event(Event::Empty(BytesStart::new("rest")))?,
        }
        let units = value.subdivision_duration(resolution) * units_per_subdivision;
        text_element(writer, "duration", &units.to_string())?;
        if tie_stop {
            tie(writer, "tie", "stop")?;
        }
        if tie_start {
            tie(writer, "tie", "start")?;
        }
        write_type(writer, value)?;
        if tie_stop || tie_start {
            start(writer, "notations")?;
            if tie_stop {
                tie(writer, "tied", "stop")?;
            }
            if tie_start {
                tie(writer, "tied", "start")?;
            }
            end(writer, "notations")?;
        }
        end(writer, "note")?;
    }
    Ok(())
}

fn write_type(writer: &mut XmlWriter, value: &DurationValue) -> Result<()> {
    let name = value.type_name().ok_or(PracticeError::InvalidDuration {
        denominator: value.denominator,
        dots: value.dots,
    })?;
    text_element(writer, "type", name)?;
    for _ in 0..value.dots {
        writer.write_event(Event::Empty(BytesStart::new("dot")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::Reader;

    /// Per measure: total `<duration>` and number of `<note>` elements.
    fn read_back(xml: &str) -> (Vec<(u32, usize)>, usize, usize) {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);
        let mut buf = Vec::new();
        let mut measures = Vec::new();
        let mut in_duration = false;
        let mut ties = 0;
        let mut rests = 0;
        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => match e.name().as_ref() {
                    b"measure" => measures.push((0u32, 0usize)),
                    b"note" => measures.last_mut().unwrap().1 += 1,
                    b"duration" => in_duration = true,
                    _ => {}
                },
                Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                    b"tie" => ties += 1,
                    b"rest" => rests += 1,
                    _ => {}
                },
                Ok(Event::Text(e)) if in_duration => {
                    let value: u32 = e.unescape().unwrap().parse().unwrap();
                    measures.last_mut().unwrap().0 += value;
                    in_duration = false;
                }
                Ok(Event::Eof) => break,
                Err(e) => panic!("invalid XML: {}", e),
                _ => {}
            }
            buf.clear();
        }
        (measures, ties, rests)
    }

    #[test]
    fn test_export_tied_passage() {
        let passage = DiscretePassage::new(vec![
            DiscreteMeasure::new(
                4,
                vec![
                    MeasureElement::rest(vec![DurationValue::new(2, 1)], 0),
                    MeasureElement::note("B4", vec![DurationValue::plain(4)], 3, false),
                ],
            ),
            DiscreteMeasure::new(
                4,
                vec![
                    MeasureElement::note("B4", vec![DurationValue::plain(4)], 0, true),
                    MeasureElement::note(
                        "F#4",
                        vec![DurationValue::plain(4), DurationValue::plain(2)],
                        1,
                        false,
                    ),
                ],
            ),
        ]);
        let xml = passage_to_musicxml(&passage, TimeSignature::default()).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<divisions>1</divisions>"));
        assert!(xml.contains("<beat-type>4</beat-type>"));
        assert!(xml.contains("<alter>1</alter>"));
        assert!(xml.contains("<dot/>"));

        let (measures, ties, rests) = read_back(&xml);
        // quarter = 1 division, so each 4/4 measure holds 4
        assert_eq!(measures, vec![(4, 2), (4, 3)]);
        // barline tie (start + stop) and the F#4 quarter-half tie (start + stop)
        assert_eq!(ties, 4);
        assert_eq!(rests, 1);
    }

    #[test]
    fn test_divisions_follow_resolution() {
        let passage = DiscretePassage::new(vec![DiscreteMeasure::new(
            16,
            vec![
                MeasureElement::note("C5", vec![DurationValue::plain(16)], 0, false),
                MeasureElement::rest(
                    vec![
                        DurationValue::plain(16),
                        DurationValue::plain(8),
                        DurationValue::new(2, 1),
                    ],
                    1,
                ),
            ],
        )]);
        let xml = passage_to_musicxml(&passage, "4/4".parse().unwrap()).unwrap();
        assert!(xml.contains("<divisions>4</divisions>"));
        assert!(xml.contains("<type>16th</type>"));
        let (measures, ties, _) = read_back(&xml);
        assert_eq!(measures, vec![(16, 4)]);
        assert_eq!(ties, 0);

        assert_eq!(divisions_for(1), 1);
        assert_eq!(divisions_for(32), 8);
    }

    #[test]
    fn test_whole_note_grid() {
        let passage = DiscretePassage::new(vec![DiscreteMeasure::new(
            2,
            vec![MeasureElement::note("A4", vec![DurationValue::plain(2)], 0, false)],
        )]);
        let xml = passage_to_musicxml(&passage, "2/4".parse().unwrap()).unwrap();
        // a half note is 2 quarters = 2 divisions
        assert!(xml.contains("<duration>2</duration>"));
    }

    #[test]
    fn test_mixed_grids_share_divisions() {
        let passage = DiscretePassage::new(vec![
            DiscreteMeasure::new(
                4,
                vec![MeasureElement::note("B4", vec![DurationValue::plain(1)], 0, false)],
            ),
            DiscreteMeasure::new(
                16,
                vec![
                    MeasureElement::note("B4", vec![DurationValue::plain(16)], 0, false),
                    MeasureElement::rest(
                        vec![
                            DurationValue::plain(16),
                            DurationValue::plain(8),
                            DurationValue::new(2, 1),
                        ],
                        1,
                    ),
                ],
            ),
        ]);
        let xml = passage_to_musicxml(&passage, TimeSignature::default()).unwrap();
        assert!(xml.contains("<divisions>4</divisions>"));
        let (measures, _, _) = read_back(&xml);
        assert_eq!(measures, vec![(16, 1), (16, 4)]);
    }

    #[test]
    fn test_rejects_values_off_the_grid() {
        let finer_than_grid = DiscretePassage::new(vec![DiscreteMeasure::new(
            4,
            vec![MeasureElement::note("B4", vec![DurationValue::plain(8)], 0, false)],
        )]);
        assert!(matches!(
            passage_to_musicxml(&finer_than_grid, TimeSignature::default()),
            Err(PracticeError::InvalidDuration { denominator: 8, .. })
        ));

        let zero = DiscretePassage::new(vec![DiscreteMeasure::new(
            4,
            vec![MeasureElement::rest(vec![DurationValue::plain(0)], 0)],
        )]);
        assert!(matches!(
            passage_to_musicxml(&zero, TimeSignature::default()),
            Err(PracticeError::InvalidDuration { denominator: 0, .. })
        ));

        let bad_grid = DiscretePassage::new(vec![DiscreteMeasure::new(0, Vec::new())]);
        assert!(matches!(
            passage_to_musicxml(&bad_grid, TimeSignature::default()),
            Err(PracticeError::UnsupportedResolution(0))
        ));
    }

    #[test]
    fn test_bad_pitch_name() {
        let passage = DiscretePassage::new(vec![DiscreteMeasure::new(
            4,
            vec![MeasureElement::note("X9", vec![DurationValue::plain(1)], 0, false)],
        )]);
        assert!(matches!(
            passage_to_musicxml(&passage, TimeSignature::default()),
            Err(PracticeError::InvalidPitchName(_))
        ));
    }
}
