use std::fmt;

use serde::{Deserialize, Serialize};

/// How far a played onset is from the expected one, and in which direction.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimingAccuracy {
    OnTime,
    SlightlyEarly,
    SlightlyLate,
    ModeratelyEarly,
    ModeratelyLate,
    SeverelyEarly,
    SeverelyLate,
}

impl TimingAccuracy {
    pub fn penalty(&self) -> f64 {
        match self {
            TimingAccuracy::OnTime => 0.0,
            TimingAccuracy::SlightlyEarly | TimingAccuracy::SlightlyLate => 0.2,
            TimingAccuracy::ModeratelyEarly | TimingAccuracy::ModeratelyLate => 0.5,
            TimingAccuracy::SeverelyEarly | TimingAccuracy::SeverelyLate => 1.0,
        }
    }

    pub fn is_early(&self) -> bool {
        matches!(
            self,
            TimingAccuracy::SlightlyEarly
                | TimingAccuracy::ModeratelyEarly
                | TimingAccuracy::SeverelyEarly
        )
    }

    pub fn is_late(&self) -> bool {
        matches!(
            self,
            TimingAccuracy::SlightlyLate
                | TimingAccuracy::ModeratelyLate
                | TimingAccuracy::SeverelyLate
        )
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CountMismatch {
    MissedNotes,
    ExtraNotes,
}

impl fmt::Display for CountMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountMismatch::MissedNotes => write!(f, "Missed notes"),
            CountMismatch::ExtraNotes => write!(f, "Extra notes"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimingTendency {
    Early,
    Late,
    OnTime,
}

/// One played note of a matched entity.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NoteTiming {
    pub actual_start_ms: f64,
    /// Signed, positive when late.
    pub offset_ms: f64,
    pub accuracy: TimingAccuracy,
}

/// An expected chord or single note paired with the played one at the same index.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntityEvaluation {
    pub expected_start_ms: f64,
    pub actual_start_ms: f64,
    pub distance_ms: f64,
    pub penalty: f64,
    pub notes: Vec<NoteTiming>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PassageEvaluation {
    /// In `[0, 1]`.
    pub score: f64,
    pub measure_penalty: f64,
    pub count_mismatch: Option<CountMismatch>,
    pub expected_entities: usize,
    pub actual_entities: usize,
    pub entities: Vec<EntityEvaluation>,
    pub average_offset_ms: f64,
    pub timing_tendency: TimingTendency,
    pub feedback: Vec<String>,
}

impl PassageEvaluation {
    pub fn note_timings(&self) -> impl Iterator<Item = &NoteTiming> {
        self.entities.iter().flat_map(|e| e.notes.iter())
    }
}
