use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PracticeError, Result};
use crate::rhythm::duration::{validate_resolution, SUPPORTED_DENOMINATORS};

/// Largest accepted numerator.
pub const MAX_NUMERATOR: u32 = 64;

/// Meter such as 4/4 or 6/8. Serialized as the string form.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSignature {
    pub numerator: u32,
    pub denominator: u32,
}

impl TimeSignature {
    pub fn new(numerator: u32, denominator: u32) -> Result<Self> {
        if numerator == 0
            || numerator > MAX_NUMERATOR
            || !SUPPORTED_DENOMINATORS.contains(&denominator)
        {
            return Err(PracticeError::InvalidTimeSignature(format!(
                "{}/{}",
                numerator, denominator
            )));
        }
        Ok(TimeSignature {
            numerator,
            denominator,
        })
    }

    /// `numerator * resolution / denominator`, which must be whole.
    pub fn subdivisions_per_measure(&self, resolution: u32) -> Result<u32> {
        validate_resolution(resolution)?;
        let incompatible = || PracticeError::IncompatibleResolution {
            numerator: self.numerator,
            denominator: self.denominator,
            resolution,
        };
        if self.denominator == 0 {
            return Err(PracticeError::InvalidTimeSignature(self.to_string()));
        }
        let total = self
            .numerator
            .checked_mul(resolution)
            .ok_or_else(incompatible)?;
        if total % self.denominator != 0 {
            return Err(incompatible());
        }
        Ok(total / self.denominator)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl FromStr for TimeSignature {
    type Err = PracticeError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PracticeError::InvalidTimeSignature(s.to_string());
        let (num, den) = s.trim().split_once('/').ok_or_else(invalid)?;
        let numerator = num.trim().parse().map_err(|_| invalid())?;
        let denominator = den.trim().parse().map_err(|_| invalid())?;
        TimeSignature::new(numerator, denominator).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = PracticeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<TimeSignature> for String {
    fn from(ts: TimeSignature) -> Self {
        ts.to_string()
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}
