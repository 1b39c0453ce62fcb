use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rhythm::snapper::{SnapperConfig, SubdivisionSnapper};
use crate::rhythm::types::{DiscretePassage, RawPassage};
use crate::scoring::types::*;

/// Share of a subdivision the average offset must exceed to count as a tendency.
const TENDENCY_FRACTION: f64 = 0.25;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluatorConfig {
    /// Played notes starting within this window of a chord's first note
    /// belong to that chord.
    pub chord_tolerance_ms: f64,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            chord_tolerance_ms: 50.0,
        }
    }
}

/// A chord or single note: every member onset, sorted, the first being the
/// entity's start.
#[derive(Clone, Debug, PartialEq)]
pub struct RhythmEntity {
    pub members: Vec<f64>,
}

impl RhythmEntity {
    pub fn start_ms(&self) -> f64 {
        self.members[0]
    }
}

/// Group sorted onsets into entities. A note joins the current entity when
/// it starts within `tolerance_ms` of the entity's first note.
pub fn group_entities(starts: &[f64], tolerance_ms: f64) -> Vec<RhythmEntity> {
    let mut sorted = starts.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut entities: Vec<RhythmEntity> = Vec::new();
    for start in sorted {
        match entities.last_mut() {
            Some(entity) if start - entity.start_ms() <= tolerance_ms => entity.members.push(start),
            _ => entities.push(RhythmEntity {
                members: vec![start],
            }),
        }
    }
    entities
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Severity {
    None,
    Slight,
    Moderate,
    Severe,
}

impl Severity {
    fn classify(distance_ms: f64, subdivision_ms: f64) -> Self {
        if distance_ms < 0.5 * subdivision_ms {
            Severity::None
        } else if distance_ms < subdivision_ms {
            Severity::Slight
        } else if distance_ms < 2.0 * subdivision_ms {
            Severity::Moderate
        } else {
            Severity::Severe
        }
    }

    fn penalty(self) -> f64 {
        self.with_direction(1.0).penalty()
    }

    fn with_direction(self, offset_ms: f64) -> TimingAccuracy {
        let early = offset_ms < 0.0;
        match (self, early) {
            (Severity::None, _) => TimingAccuracy::OnTime,
            (Severity::Slight, true) => TimingAccuracy::SlightlyEarly,
            (Severity::Slight, false) => TimingAccuracy::SlightlyLate,
            (Severity::Moderate, true) => TimingAccuracy::ModeratelyEarly,
            (Severity::Moderate, false) => TimingAccuracy::ModeratelyLate,
            (Severity::Severe, true) => TimingAccuracy::SeverelyEarly,
            (Severity::Severe, false) => TimingAccuracy::SeverelyLate,
        }
    }
}

/// Scores played onsets against expected onsets, both in milliseconds.
pub struct StartTimeEvaluator {
    subdivision_ms: f64,
    config: EvaluatorConfig,
}

impl StartTimeEvaluator {
    pub fn new(subdivision_ms: f64, config: EvaluatorConfig) -> Self {
        StartTimeEvaluator {
            subdivision_ms,
            config,
        }
    }

    pub fn evaluate(&self, expected_starts: &[f64], actual_starts: &[f64]) -> PassageEvaluation {
        let expected = group_entities(expected_starts, 0.0);
        let actual = group_entities(actual_starts, self.config.chord_tolerance_ms);
        let (expected_count, actual_count) = (expected.len(), actual.len());

        let count_mismatch = if actual_count < expected_count {
            Some(CountMismatch::MissedNotes)
        } else if actual_count > expected_count {
            Some(CountMismatch::ExtraNotes)
        } else {
            None
        };
        let measure_penalty = if expected_count == actual_count {
            1.0
        } else {
            expected_count.min(actual_count) as f64 / expected_count.max(actual_count) as f64
        };
        if let Some(mismatch) = count_mismatch {
            debug!(
                "{}: expected {} entities, played {}",
                mismatch, expected_count, actual_count
            );
        }

        let mut entities = Vec::with_capacity(expected_count.min(actual_count));
        for (exp, act) in expected.iter().zip(&actual) {
            let expected_start_ms = exp.start_ms();
            let actual_start_ms = act.start_ms();
            let distance_ms = (actual_start_ms - expected_start_ms).abs();
            let severity = Severity::classify(distance_ms, self.subdivision_ms);
            let notes = act
                .members
                .iter()
                .map(|&start| {
                    let offset_ms = start - expected_start_ms;
                    NoteTiming {
                        actual_start_ms: start,
                        offset_ms,
                        accuracy: severity.with_direction(offset_ms),
                    }
                })
                .collect();
            entities.push(EntityEvaluation {
                expected_start_ms,
                actual_start_ms,
                distance_ms,
                penalty: severity.penalty(),
                notes,
            });
        }

        let score = if expected_count == 0 {
            if actual_count == 0 {
                1.0
            } else {
                0.0
            }
        } else {
            let per_entity = 1.0 / expected_count as f64;
            measure_penalty * entities.iter().map(|e| per_entity * (1.0 - e.penalty)).sum::<f64>()
        };

        let offsets: Vec<f64> = entities
            .iter()
            .flat_map(|e| e.notes.iter().map(|n| n.offset_ms))
            .collect();
        let average_offset_ms = if offsets.is_empty() {
            0.0
        } else {
            offsets.iter().sum::<f64>() / offsets.len() as f64
        };
        let threshold = TENDENCY_FRACTION * self.subdivision_ms;
        let timing_tendency = if average_offset_ms > threshold {
            TimingTendency::Late
        } else if average_offset_ms < -threshold {
            TimingTendency::Early
        } else {
            TimingTendency::OnTime
        };

        let mut evaluation = PassageEvaluation {
            score,
            measure_penalty,
            count_mismatch,
            expected_entities: expected_count,
            actual_entities: actual_count,
            entities,
            average_offset_ms,
            timing_tendency,
            feedback: Vec::new(),
        };
        evaluation.feedback = feedback(&evaluation);
        evaluation
    }
}

fn feedback(evaluation: &PassageEvaluation) -> Vec<String> {
    let mut feedback = Vec::new();
    if evaluation.expected_entities == 0 && evaluation.actual_entities == 0 {
        return vec!["Nothing to play in this passage.".to_string()];
    }

    let pct = evaluation.score * 100.0;
    if pct >= 90.0 {
        feedback.push(format!("Excellent! Your rhythm scored {:.0}%.", pct));
    } else if pct >= 70.0 {
        feedback.push(format!("Good job! Your rhythm scored {:.0}%.", pct));
    } else if pct >= 50.0 {
        feedback.push(format!("Keep practicing! Your rhythm scored {:.0}%.", pct));
    } else {
        feedback.push(format!(
            "This one's tough! You scored {:.0}%. Try slowing down the tempo.",
            pct
        ));
    }

    let difference = evaluation.expected_entities.abs_diff(evaluation.actual_entities);
    match evaluation.count_mismatch {
        Some(CountMismatch::MissedNotes) => feedback.push(format!(
            "You missed {} note{}. Make sure to play through the whole passage.",
            difference,
            if difference == 1 { "" } else { "s" }
        )),
        Some(CountMismatch::ExtraNotes) => feedback.push(format!(
            "You played {} extra note{}. Count the rests carefully.",
            difference,
            if difference == 1 { "" } else { "s" }
        )),
        None => {}
    }

    match evaluation.timing_tendency {
        TimingTendency::Late => feedback.push(
            "You tend to come in late. Try anticipating the beat.".to_string(),
        ),
        TimingTendency::Early => feedback.push(
            "You tend to rush ahead. Try listening to the beat and holding back slightly."
                .to_string(),
        ),
        TimingTendency::OnTime => {}
    }
    feedback
}

/// Scores a captured performance against a quantized passage on the same grid.
pub struct PassageEvaluator {
    snapper: SubdivisionSnapper,
    start_times: StartTimeEvaluator,
}

impl PassageEvaluator {
    pub fn new(snapper_config: SnapperConfig, config: EvaluatorConfig) -> Result<Self> {
        let snapper = SubdivisionSnapper::new(snapper_config)?;
        let start_times = StartTimeEvaluator::new(snapper.subdivision_ms(), config);
        Ok(PassageEvaluator {
            snapper,
            start_times,
        })
    }

    /// Onset times of every note in `passage`, tied continuations excluded.
    pub fn expected_onsets(&self, passage: &DiscretePassage) -> Vec<f64> {
        let spm = self.snapper.subdivisions_per_measure();
        passage
            .measures
            .iter()
            .enumerate()
            .flat_map(|(index, measure)| {
                let measure_start = (index as u32).saturating_mul(spm);
                measure
                    .notes()
                    .filter(|e| !e.tied_from_previous)
                    .map(move |e| measure_start.saturating_add(e.start_subdivision))
            })
            .map(|subdivision| self.snapper.subdivision_to_ms(subdivision))
            .collect()
    }

    pub fn evaluate(&self, expected: &DiscretePassage, actual: &RawPassage) -> PassageEvaluation {
        let expected_starts = self.expected_onsets(expected);
        let actual_starts: Vec<f64> = actual
            .notes()
            .iter()
            .map(|n| n.start_offset_ms as f64)
            .collect();
        self.start_times.evaluate(&expected_starts, &actual_starts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rhythm::duration::DurationValue;
    use crate::rhythm::types::{DiscreteMeasure, MeasureElement, RawPassageNote};
    use approx::assert_abs_diff_eq;

    /// 120 BPM with four subdivisions per beat: 125 ms each.
    fn evaluator() -> StartTimeEvaluator {
        StartTimeEvaluator::new(125.0, EvaluatorConfig::default())
    }

    #[test]
    fn test_both_empty_is_perfect() {
        let result = evaluator().evaluate(&[], &[]);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.count_mismatch, None);
    }

    #[test]
    fn test_nothing_expected_but_played() {
        let result = evaluator().evaluate(&[], &[0.0, 500.0]);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.count_mismatch, Some(CountMismatch::ExtraNotes));
    }

    #[test]
    fn test_chord_within_tolerance_merges() {
        let result = evaluator().evaluate(&[0.0, 0.0], &[0.0, 10.0]);
        assert_eq!(result.actual_entities, 1);
        assert_eq!(result.score, 1.0);
        assert!(result.note_timings().all(|n| n.accuracy == TimingAccuracy::OnTime));
    }

    #[test]
    fn test_notes_outside_tolerance_are_extra() {
        let result = evaluator().evaluate(&[0.0, 0.0], &[0.0, 51.0]);
        assert_eq!(result.actual_entities, 2);
        assert_eq!(result.count_mismatch, Some(CountMismatch::ExtraNotes));
        assert_eq!(result.count_mismatch.unwrap().to_string(), "Extra notes");
        assert!(result.score < 1.0);
    }

    #[test]
    fn test_late_chord_is_slightly_late() {
        let result = evaluator().evaluate(&[0.0, 0.0, 0.0], &[85.0, 88.0, 90.0]);
        assert_eq!(result.entities.len(), 1);
        let notes = &result.entities[0].notes;
        assert_eq!(notes.len(), 3);
        assert!(notes.iter().all(|n| n.accuracy == TimingAccuracy::SlightlyLate));
        assert!(notes.iter().all(|n| n.accuracy.is_late() && !n.accuracy.is_early()));
        assert!(result.score > 0.6 && result.score < 1.0, "score {}", result.score);
        assert_eq!(result.timing_tendency, TimingTendency::Late);
    }

    #[test]
    fn test_late_chord_through_default_grid() {
        let config = SnapperConfig {
            tempo: 120.0,
            subdivision_resolution: 4,
            ..Default::default()
        };
        let snapper = SubdivisionSnapper::new(config.clone()).unwrap();
        assert_abs_diff_eq!(snapper.subdivision_ms(), 125.0);

        let evaluator = PassageEvaluator::new(config, EvaluatorConfig::default()).unwrap();
        let expected = DiscretePassage::new(vec![DiscreteMeasure::new(
            4,
            vec![MeasureElement::note("B4", vec![DurationValue::plain(1)], 0, false)],
        )]);
        let played = RawPassage::from_notes([
            RawPassageNote::new(4400, 85, 400),
            RawPassageNote::new(5540, 88, 400),
            RawPassageNote::new(6600, 90, 400),
        ]);
        let result = evaluator.evaluate(&expected, &played);
        assert_eq!(result.actual_entities, 1);
        assert!(result
            .note_timings()
            .all(|n| n.accuracy == TimingAccuracy::SlightlyLate));
        assert!(result.score > 0.6 && result.score < 1.0, "score {}", result.score);
    }

    #[test]
    fn test_severity_classes() {
        let expected = [0.0, 500.0, 1000.0, 1500.0];
        let actual = [-30.0, 430.0, 1150.0, 1240.0];
        let result = evaluator().evaluate(&expected, &actual);
        let accuracy: Vec<TimingAccuracy> =
            result.note_timings().map(|n| n.accuracy).collect();
        assert_eq!(
            accuracy,
            vec![
                TimingAccuracy::OnTime,
                TimingAccuracy::SlightlyEarly,
                TimingAccuracy::ModeratelyLate,
                TimingAccuracy::SeverelyEarly,
            ]
        );
        // (1 + 0.8 + 0.5 + 0) / 4
        assert_abs_diff_eq!(result.score, 0.575, epsilon = 1e-12);
    }

    #[test]
    fn test_missed_notes_penalty() {
        let result = evaluator().evaluate(&[0.0, 500.0, 1000.0, 1500.0], &[0.0, 500.0]);
        assert_eq!(result.count_mismatch, Some(CountMismatch::MissedNotes));
        assert_abs_diff_eq!(result.measure_penalty, 0.5);
        // 0.5 * (0.25 + 0.25)
        assert_abs_diff_eq!(result.score, 0.25);
        assert!(result.feedback.iter().any(|f| f.contains("missed 2 notes")));
    }

    #[test]
    fn test_group_entities() {
        let entities = group_entities(&[100.0, 0.0, 40.0, 60.0], 50.0);
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].members, vec![0.0, 40.0]);
        assert_eq!(entities[1].start_ms(), 60.0);
        assert_eq!(group_entities(&[0.0, 0.0, 1.0], 0.0).len(), 2);
    }

    #[test]
    fn test_passage_evaluator_against_discrete_passage() {
        let config = SnapperConfig {
            tempo: 120.0,
            tempo_subdivision: 4,
            subdivision_resolution: 4,
            time_signature: "4/4".parse().unwrap(),
        };
        let evaluator = PassageEvaluator::new(config, EvaluatorConfig::default()).unwrap();
        let passage = DiscretePassage::new(vec![
            DiscreteMeasure::new(
                4,
                vec![
                    MeasureElement::note("B4", vec![DurationValue::plain(2)], 0, false),
                    MeasureElement::note("B4", vec![DurationValue::plain(2)], 2, false),
                ],
            ),
            DiscreteMeasure::new(
                4,
                vec![
                    MeasureElement::note("B4", vec![DurationValue::plain(4)], 0, true),
                    MeasureElement::rest(vec![DurationValue::new(2, 1)], 1),
                ],
            ),
        ]);
        assert_eq!(evaluator.expected_onsets(&passage), vec![0.0, 1000.0]);

        let played = RawPassage::from_notes([
            RawPassageNote::new(0, 10, 900),
            RawPassageNote::new(0, 1020, 1400),
        ]);
        let result = evaluator.evaluate(&passage, &played);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.timing_tendency, TimingTendency::OnTime);
    }

    #[test]
    fn test_passage_evaluator_rejects_bad_tempo() {
        let config = SnapperConfig {
            tempo: -1.0,
            ..Default::default()
        };
        assert!(PassageEvaluator::new(config, EvaluatorConfig::default()).is_err());
    }
}
