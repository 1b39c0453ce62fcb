use serde::{Deserialize, Serialize};

use crate::error::{PracticeError, Result};
use crate::rhythm::time_signature::TimeSignature;

/// Tempo and grid used to map milliseconds onto subdivisions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SnapperConfig {
    /// Beats per minute.
    pub tempo: f64,
    /// Scales the beat length: `subdivision_ms = beat_ms * tempo_subdivision / resolution`.
    /// With 1 the resolution counts subdivisions per beat, so 120 BPM at
    /// resolution 4 gives 125 ms. Set it to the beat's note value (4 for a
    /// quarter) to read the resolution as a note value instead.
    pub tempo_subdivision: u32,
    pub subdivision_resolution: u32,
    pub time_signature: TimeSignature,
}

impl Default for SnapperConfig {
    fn default() -> Self {
        SnapperConfig {
            tempo: 120.0,
            tempo_subdivision: 1,
            subdivision_resolution: 4,
            time_signature: TimeSignature::default(),
        }
    }
}

impl SnapperConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.tempo.is_finite() && self.tempo > 0.0) {
            return Err(PracticeError::InvalidTempo(self.tempo));
        }
        if self.tempo_subdivision == 0 {
            return Err(PracticeError::InvalidTempoSubdivision(self.tempo_subdivision));
        }
        self.time_signature
            .subdivisions_per_measure(self.subdivision_resolution)
            .map(|_| ())
    }
}

#[derive(Clone, Debug)]
pub struct SubdivisionSnapper {
    config: SnapperConfig,
    subdivisions_per_measure: u32,
}

impl SubdivisionSnapper {
    pub fn new(config: SnapperConfig) -> Result<Self> {
        config.validate()?;
        let subdivisions_per_measure = config
            .time_signature
            .subdivisions_per_measure(config.subdivision_resolution)?;
        Ok(SubdivisionSnapper {
            config,
            subdivisions_per_measure,
        })
    }

    pub fn config(&self) -> &SnapperConfig {
        &self.config
    }

    pub fn resolution(&self) -> u32 {
        self.config.subdivision_resolution
    }

    pub fn subdivisions_per_measure(&self) -> u32 {
        self.subdivisions_per_measure
    }

    pub fn beat_ms(&self) -> f64 {
        60_000.0 / self.config.tempo
    }

    pub fn subdivision_ms(&self) -> f64 {
        self.beat_ms() * self.config.tempo_subdivision as f64
            / self.config.subdivision_resolution as f64
    }

    /// Rounded length in subdivisions; at least 1 unless `allow_zero`.
    pub fn snap_duration(&self, duration_ms: u32, allow_zero: bool) -> u32 {
        let count = (duration_ms as f64 / self.subdivision_ms()).round() as u32;
        if allow_zero {
            count
        } else {
            count.max(1)
        }
    }

    /// Nearest grid position for a start offset.
    pub fn snap_offset(&self, offset_ms: u32) -> u32 {
        (offset_ms as f64 / self.subdivision_ms()).round() as u32
    }

    pub fn subdivision_to_ms(&self, subdivision: u32) -> f64 {
        subdivision as f64 * self.subdivision_ms()
    }
}
