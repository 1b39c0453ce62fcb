use serde::{Deserialize, Serialize};

use crate::error::{PracticeError, Result};

/// Note values from whole (1) to thirty-second (32).
pub const SUPPORTED_DENOMINATORS: [u32; 6] = [1, 2, 4, 8, 16, 32];

pub fn validate_resolution(resolution: u32) -> Result<()> {
    if SUPPORTED_DENOMINATORS.contains(&resolution) {
        Ok(())
    } else {
        Err(PracticeError::UnsupportedResolution(resolution))
    }
}

/// A note value with up to two dots.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(try_from = "RawDurationValue")]
pub struct DurationValue {
    pub denominator: u32,
    pub dots: u8,
}

#[derive(Deserialize)]
struct RawDurationValue {
    denominator: u32,
    #[serde(default)]
    dots: u8,
}

impl TryFrom<RawDurationValue> for DurationValue {
    type Error = PracticeError;

    fn try_from(raw: RawDurationValue) -> Result<Self> {
        if !SUPPORTED_DENOMINATORS.contains(&raw.denominator) || raw.dots > 2 {
            return Err(PracticeError::InvalidDuration {
                denominator: raw.denominator,
                dots: raw.dots,
            });
        }
        Ok(DurationValue::new(raw.denominator, raw.dots))
    }
}

impl DurationValue {
    pub fn new(denominator: u32, dots: u8) -> Self {
        DurationValue { denominator, dots }
    }

    pub fn plain(denominator: u32) -> Self {
        DurationValue::new(denominator, 0)
    }

    /// Length of the undotted value in subdivisions.
    pub fn base(&self, resolution: u32) -> u32 {
        resolution.checked_div(self.denominator).unwrap_or(0)
    }

    pub fn subdivision_duration(&self, resolution: u32) -> u32 {
        let base = self.base(resolution);
        let mut total = base;
        if self.dots >= 1 {
            total = total.saturating_add(base / 2);
        }
        if self.dots >= 2 {
            total = total.saturating_add(base / 4);
        }
        total
    }

    /// A dot must add a whole number of subdivisions.
    pub fn is_valid(&self, resolution: u32) -> bool {
        if !SUPPORTED_DENOMINATORS.contains(&self.denominator) || self.denominator > resolution {
            return false;
        }
        let base = self.base(resolution);
        match self.dots {
            0 => true,
            1 => base >= 2,
            2 => base >= 4,
            _ => false,
        }
    }

    /// MusicXML `<type>` name.
    pub fn type_name(&self) -> Option<&'static str> {
        match self.denominator {
            1 => Some("whole"),
            2 => Some("half"),
            4 => Some("quarter"),
            8 => Some("eighth"),
            16 => Some("16th"),
            32 => Some("32nd"),
            _ => None,
        }
    }
}

pub fn total_subdivisions(durations: &[DurationValue], resolution: u32) -> u32 {
    durations
        .iter()
        .map(|d| d.subdivision_duration(resolution))
        .fold(0, u32::saturating_add)
}

/// A value starting at `position` must stay inside its parent cell, the
/// aligned span of twice its base length.
fn fits_own_cell(position: u32, count: u32, base: u32) -> bool {
    position % (2 * base) + count <= 2 * base
}

fn largest_fit(position: u32, remaining: u32, resolution: u32) -> DurationValue {
    for &denominator in SUPPORTED_DENOMINATORS.iter().filter(|&&d| d <= resolution) {
        let base = resolution / denominator;
        if position % base != 0 {
            continue;
        }
        for dots in [2, 1, 0] {
            let value = DurationValue::new(denominator, dots);
            if !value.is_valid(resolution) {
                continue;
            }
            let count = value.subdivision_duration(resolution);
            if count <= remaining && fits_own_cell(position, count, base) {
                return value;
            }
        }
    }
    DurationValue::plain(resolution)
}

/// Decompose `span` subdivisions starting at measure position `position`
/// into note values, largest first. `resolution` must be supported.
pub fn fit_durations(position: u32, span: u32, resolution: u32) -> Vec<DurationValue> {
    let mut durations = Vec::new();
    let mut position = position;
    let mut remaining = span;
    while remaining > 0 {
        let value = largest_fit(position, remaining, resolution);
        let count = value.subdivision_duration(resolution);
        durations.push(value);
        position += count;
        remaining -= count;
    }
    durations
}
