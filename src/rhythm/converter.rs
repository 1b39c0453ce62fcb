use log::debug;

use crate::error::{PracticeError, Result};
use crate::rhythm::duration::fit_durations;
use crate::rhythm::snapper::{SnapperConfig, SubdivisionSnapper};
use crate::rhythm::types::{DiscreteMeasure, DiscretePassage, MeasureElement, RawPassage};
use crate::tuning::{pitch_name_from_deci_hz, RHYTHM_PITCH_NAME};

/// A note's extent in absolute subdivisions, `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
struct NoteSpan {
    start: u32,
    end: u32,
    pitch_name: String,
}

pub struct RawToDiscreteConverter {
    snapper: SubdivisionSnapper,
}

impl RawToDiscreteConverter {
    pub fn new(config: SnapperConfig) -> Result<Self> {
        Ok(Self::from_snapper(SubdivisionSnapper::new(config)?))
    }

    pub fn from_snapper(snapper: SubdivisionSnapper) -> Self {
        RawToDiscreteConverter { snapper }
    }

    pub fn snapper(&self) -> &SubdivisionSnapper {
        &self.snapper
    }

    /// Measures needed to hold every note of `raw`, at least one.
    pub fn measures_needed(&self, raw: &RawPassage) -> u32 {
        let spm = self.snapper.subdivisions_per_measure();
        let last_end = raw
            .notes()
            .iter()
            .map(|n| {
                self.snapper
                    .snap_offset(n.start_offset_ms)
                    .saturating_add(self.snapper.snap_duration(n.note.duration_ms, false))
            })
            .max()
            .unwrap_or(0);
        last_end.div_ceil(spm).max(1)
    }

    /// Quantize `raw` into exactly `measure_count` measures. Notes that
    /// run past the last measure are cut; silence becomes rests.
    pub fn convert(&self, raw: &RawPassage, measure_count: u32) -> Result<DiscretePassage> {
        if measure_count == 0 {
            return Err(PracticeError::ZeroMeasureCount);
        }
        let spm = self.snapper.subdivisions_per_measure();
        let resolution = self.snapper.resolution();
        let total = spm
            .checked_mul(measure_count)
            .ok_or(PracticeError::PassageTooLong(measure_count))?;

        let mut measures: Vec<Vec<MeasureElement>> = vec![Vec::new(); measure_count as usize];
        for span in self.note_spans(raw, total) {
            let mut position = span.start;
            let mut tied = false;
            while position < span.end {
                let index = position / spm;
                let local = position % spm;
                let slice_end = span.end.min((index + 1) * spm);
                let durations = fit_durations(local, slice_end - position, resolution);
                measures[index as usize].push(MeasureElement::note(
                    span.pitch_name.clone(),
                    durations,
                    local,
                    tied,
                ));
                tied = true;
                position = slice_end;
            }
        }

        let measures = measures
            .into_iter()
            .map(|notes| fill_rests(notes, spm, resolution))
            .collect();
        Ok(DiscretePassage::new(measures))
    }

    /// Convert with as many measures as the performance needs.
    pub fn convert_all(&self, raw: &RawPassage) -> Result<DiscretePassage> {
        self.convert(raw, self.measures_needed(raw))
    }

    /// Snap every raw note and make the result monophonic: a later onset
    /// cuts the sounding note short, and a second note on the same onset
    /// is dropped.
    fn note_spans(&self, raw: &RawPassage, total: u32) -> Vec<NoteSpan> {
        let mut spans: Vec<NoteSpan> = Vec::with_capacity(raw.len());
        for note in raw.notes() {
            let start = self.snapper.snap_offset(note.start_offset_ms);
            if start >= total {
                debug!(
                    "dropping note at {} ms: past the last measure",
                    note.start_offset_ms
                );
                continue;
            }
            let length = self.snapper.snap_duration(note.note.duration_ms, false);
            let end = start.saturating_add(length).min(total);

            if let Some(previous) = spans.last_mut() {
                if previous.start == start {
                    debug!(
                        "dropping note at {} ms: shares its onset with the previous note",
                        note.start_offset_ms
                    );
                    continue;
                }
                if previous.end > start {
                    debug!(
                        "truncating note at subdivision {} to {} subdivisions",
                        previous.start,
                        start - previous.start
                    );
                    previous.end = start;
                }
            }

            let pitch_name = pitch_name_from_deci_hz(note.note.pitch_deci_hz)
                .unwrap_or_else(|| RHYTHM_PITCH_NAME.to_string());
            spans.push(NoteSpan {
                start,
                end,
                pitch_name,
            });
        }
        spans
    }
}

/// Fill every gap between `notes` with rests so the measure tiles.
fn fill_rests(notes: Vec<MeasureElement>, spm: u32, resolution: u32) -> DiscreteMeasure {
    let mut elements = Vec::with_capacity(notes.len() * 2 + 1);
    let mut cursor = 0;
    for note in notes {
        if note.start_subdivision > cursor {
            let gap = note.start_subdivision - cursor;
            elements.push(MeasureElement::rest(fit_durations(cursor, gap, resolution), cursor));
        }
        cursor = note.end_subdivision(resolution);
        elements.push(note);
    }
    if cursor < spm {
        elements.push(MeasureElement::rest(
            fit_durations(cursor, spm - cursor, resolution),
            cursor,
        ));
    }
    DiscreteMeasure::new(resolution, elements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhythm::duration::DurationValue;
    use crate::rhythm::types::RawPassageNote;

    /// 120 BPM, quarter-note grid in 4/4: one subdivision is 500 ms.
    fn converter() -> RawToDiscreteConverter {
        RawToDiscreteConverter::new(SnapperConfig {
            tempo: 120.0,
            tempo_subdivision: 4,
            subdivision_resolution: 4,
            time_signature: "4/4".parse().unwrap(),
        })
        .unwrap()
    }

    fn raw(notes: &[(u32, u32, u32)]) -> RawPassage {
        RawPassage::from_notes(
            notes
                .iter()
                .map(|&(pitch, start, duration)| RawPassageNote::new(pitch, start, duration)),
        )
    }

    #[test]
    fn test_notes_and_rests_in_one_measure() {
        let passage = converter()
            .convert(&raw(&[(0, 0, 480), (4400, 1010, 990)]), 1)
            .unwrap();
        let measure = &passage.measures[0];
        assert!(measure.is_tiled(4));
        assert_eq!(measure.elements.len(), 3);

        assert_eq!(measure.elements[0].pitch_name(), Some("B4"));
        assert_eq!(measure.elements[0].durations(), &[DurationValue::plain(4)]);
        assert!(measure.elements[1].is_rest());
        assert_eq!(measure.elements[1].start_subdivision, 1);
        assert_eq!(measure.elements[2].pitch_name(), Some("A4"));
        assert_eq!(measure.elements[2].durations(), &[DurationValue::plain(2)]);
    }

    #[test]
    fn test_note_tied_across_barline() {
        let passage = converter().convert(&raw(&[(0, 1500, 1000)]), 2).unwrap();
        let (first, second) = (&passage.measures[0], &passage.measures[1]);
        assert!(first.is_tiled(4) && second.is_tiled(4));

        assert!(first.elements[0].is_rest());
        assert_eq!(first.elements[0].durations(), &[DurationValue::new(2, 1)]);
        let head = &first.elements[1];
        assert_eq!((head.start_subdivision, head.tied_from_previous), (3, false));

        let tail = &second.elements[0];
        assert_eq!(tail.pitch_name(), Some("B4"));
        assert_eq!((tail.start_subdivision, tail.tied_from_previous), (0, true));
        assert_eq!(
            second.elements[1].durations(),
            &[DurationValue::plain(4), DurationValue::plain(2)]
        );
        assert_eq!(passage.onset_count(), 1);
    }

    #[test]
    fn test_overlaps_become_monophonic() {
        let passage = converter()
            .convert(&raw(&[(0, 0, 2000), (2200, 0, 500), (0, 1000, 500)]), 1)
            .unwrap();
        let measure = &passage.measures[0];
        assert!(measure.is_tiled(4));
        let notes: Vec<&MeasureElement> = measure.notes().collect();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].pitch_name(), Some("B4"));
        assert_eq!(notes[0].durations(), &[DurationValue::plain(2)]);
        assert_eq!(notes[1].start_subdivision, 2);
    }

    #[test]
    fn test_notes_past_the_end_are_cut() {
        let passage = converter()
            .convert(&raw(&[(0, 1500, 5000), (0, 9000, 500)]), 1)
            .unwrap();
        assert_eq!(passage.measures.len(), 1);
        let measure = &passage.measures[0];
        assert!(measure.is_tiled(4));
        assert_eq!(measure.notes().count(), 1);
        assert_eq!(measure.elements.last().unwrap().end_subdivision(4), 4);
    }

    #[test]
    fn test_empty_capture_is_whole_rests() {
        let passage = converter().convert(&RawPassage::new(), 3).unwrap();
        assert_eq!(passage.measures.len(), 3);
        for measure in &passage.measures {
            assert_eq!(measure.elements.len(), 1);
            assert!(measure.is_all_rests());
            assert_eq!(measure.elements[0].durations(), &[DurationValue::plain(1)]);
        }
    }

    #[test]
    fn test_zero_measures_is_an_error() {
        assert!(matches!(
            converter().convert(&RawPassage::new(), 0),
            Err(PracticeError::ZeroMeasureCount)
        ));
    }

    #[test]
    fn test_convert_all_sizes_to_performance() {
        let c = converter();
        assert_eq!(c.measures_needed(&RawPassage::new()), 1);
        let performance = raw(&[(0, 0, 500), (0, 4000, 2000)]);
        assert_eq!(c.measures_needed(&performance), 3);
        let passage = c.convert_all(&performance).unwrap();
        assert_eq!(passage.measures.len(), 3);
        assert!(passage.measures.iter().all(|m| m.is_tiled(4)));
    }

    #[test]
    fn test_oversized_passages_are_rejected() {
        assert!(matches!(
            converter().convert(&RawPassage::new(), u32::MAX),
            Err(PracticeError::PassageTooLong(u32::MAX))
        ));

        // sub-microsecond subdivisions push every snapped value to u32::MAX
        let fast = RawToDiscreteConverter::new(SnapperConfig {
            tempo: 1e9,
            ..Default::default()
        })
        .unwrap();
        let performance = raw(&[(0, u32::MAX, u32::MAX)]);
        assert_eq!(fast.measures_needed(&performance), u32::MAX.div_ceil(4));
        assert!(matches!(
            fast.convert_all(&performance),
            Err(PracticeError::PassageTooLong(_))
        ));
    }
}
