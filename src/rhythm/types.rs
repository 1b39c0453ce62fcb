use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rhythm::duration::{total_subdivisions, DurationValue};

// Quantized passage model

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscreteNote {
    pub pitch_name: String,
    pub durations: Vec<DurationValue>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscreteRest {
    pub durations: Vec<DurationValue>,
}

/// Tagged as `"type": "note"` or `"type": "rest"` on the wire.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ElementKind {
    Note(DiscreteNote),
    Rest(DiscreteRest),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MeasureElement {
    #[serde(flatten)]
    pub kind: ElementKind,
    pub start_subdivision: u32,
    /// Set only on the continuation of a note begun in an earlier measure.
    pub tied_from_previous: bool,
}

impl MeasureElement {
    pub fn note(
        pitch_name: impl Into<String>,
        durations: Vec<DurationValue>,
        start_subdivision: u32,
        tied_from_previous: bool,
    ) -> Self {
        MeasureElement {
            kind: ElementKind::Note(DiscreteNote {
                pitch_name: pitch_name.into(),
                durations,
            }),
            start_subdivision,
            tied_from_previous,
        }
    }

    pub fn rest(durations: Vec<DurationValue>, start_subdivision: u32) -> Self {
        MeasureElement {
            kind: ElementKind::Rest(DiscreteRest { durations }),
            start_subdivision,
            tied_from_previous: false,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self.kind, ElementKind::Rest(_))
    }

    pub fn pitch_name(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Note(note) => Some(&note.pitch_name),
            ElementKind::Rest(_) => None,
        }
    }

    pub fn durations(&self) -> &[DurationValue] {
        match &self.kind {
            ElementKind::Note(note) => &note.durations,
            ElementKind::Rest(rest) => &rest.durations,
        }
    }

    pub fn subdivision_count(&self, resolution: u32) -> u32 {
        total_subdivisions(self.durations(), resolution)
    }

    pub fn end_subdivision(&self, resolution: u32) -> u32 {
        self.start_subdivision
            .saturating_add(self.subdivision_count(resolution))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiscreteMeasure {
    /// Grid resolution the element durations are expressed in.
    pub subdivision_denominator: u32,
    pub elements: Vec<MeasureElement>,
}

impl DiscreteMeasure {
    /// Elements are ordered by start position.
    pub fn new(subdivision_denominator: u32, mut elements: Vec<MeasureElement>) -> Self {
        elements.sort_by_key(|e| e.start_subdivision);
        DiscreteMeasure {
            subdivision_denominator,
            elements,
        }
    }

    /// True when the elements cover `[0, subdivisions_per_measure)` with
    /// no gap or overlap.
    pub fn is_tiled(&self, subdivisions_per_measure: u32) -> bool {
        let mut cursor = 0;
        for element in &self.elements {
            if element.start_subdivision != cursor || element.durations().is_empty() {
                return false;
            }
            cursor = element.end_subdivision(self.subdivision_denominator);
        }
        cursor == subdivisions_per_measure
    }

    pub fn is_all_rests(&self) -> bool {
        self.elements.iter().all(MeasureElement::is_rest)
    }

    pub fn notes(&self) -> impl Iterator<Item = &MeasureElement> {
        self.elements.iter().filter(|e| !e.is_rest())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DiscretePassage {
    pub measures: Vec<DiscreteMeasure>,
}

impl DiscretePassage {
    pub fn new(measures: Vec<DiscreteMeasure>) -> Self {
        DiscretePassage { measures }
    }

    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }

    /// Number of note onsets, not counting tied continuations.
    pub fn onset_count(&self) -> usize {
        self.measures
            .iter()
            .flat_map(|m| m.notes())
            .filter(|e| !e.tied_from_previous)
            .count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

// Raw capture model

/// One completed note as captured. Pitch is in tenths of a Hertz, 0 when
/// the input carries no pitch.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawNote {
    pub pitch_deci_hz: u32,
    pub duration_ms: u32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawPassageNote {
    pub note: RawNote,
    pub start_offset_ms: u32,
}

impl RawPassageNote {
    pub fn new(pitch_deci_hz: u32, start_offset_ms: u32, duration_ms: u32) -> Self {
        RawPassageNote {
            note: RawNote {
                pitch_deci_hz,
                duration_ms,
            },
            start_offset_ms,
        }
    }

    pub fn end_offset_ms(&self) -> u32 {
        self.start_offset_ms.saturating_add(self.note.duration_ms)
    }
}

/// A performance as played. Notes stay ordered by start offset.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase", from = "RawPassageData")]
pub struct RawPassage {
    notes: Vec<RawPassageNote>,
}

#[derive(Deserialize)]
struct RawPassageData {
    notes: Vec<RawPassageNote>,
}

impl From<RawPassageData> for RawPassage {
    fn from(data: RawPassageData) -> Self {
        RawPassage::from_notes(data.notes)
    }
}

impl RawPassage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_notes(notes: impl IntoIterator<Item = RawPassageNote>) -> Self {
        let mut passage = RawPassage::new();
        for note in notes {
            passage.insert(note);
        }
        passage
    }

    /// Insert after every note starting at or before it, so equal start
    /// offsets keep arrival order.
    pub fn insert(&mut self, note: RawPassageNote) {
        let index = self
            .notes
            .partition_point(|n| n.start_offset_ms <= note.start_offset_ms);
        self.notes.insert(index, note);
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    pub fn notes(&self) -> &[RawPassageNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
