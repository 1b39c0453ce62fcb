use std::fmt;

use serde::{Deserialize, Serialize};

pub mod aggregate;
pub mod autocorrelation;
pub mod correlation;
pub mod hps;
pub mod mcleod;
pub mod spectrum;
pub mod yaapt;
pub mod yin;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Autocorrelation,
    Yin,
    McLeod,
    Hps,
    Yaapt,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 5] = [
        DetectorKind::Autocorrelation,
        DetectorKind::Yin,
        DetectorKind::McLeod,
        DetectorKind::Hps,
        DetectorKind::Yaapt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DetectorKind::Autocorrelation => "autocorrelation",
            DetectorKind::Yin => "yin",
            DetectorKind::McLeod => "mcleod",
            DetectorKind::Hps => "hps",
            DetectorKind::Yaapt => "yaapt",
        }
    }

    /// Build the detector for this kind with its default thresholds.
    pub fn detector(self) -> Box<dyn PitchDetectionAlgorithm> {
        match self {
            DetectorKind::Autocorrelation => {
                Box::new(autocorrelation::AutocorrelationDetector::default())
            }
            DetectorKind::Yin => Box::new(yin::YinDetector::default()),
            DetectorKind::McLeod => Box::new(mcleod::McLeodDetector::default()),
            DetectorKind::Hps => Box::new(hps::HpsDetector::default()),
            DetectorKind::Yaapt => Box::new(yaapt::YaaptDetector::default()),
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PitchEstimate {
    pub frequency: f32,
    pub confidence: f32,
    pub algorithm: DetectorKind,
}

impl PitchEstimate {
    pub fn new(frequency: f32, confidence: f32, algorithm: DetectorKind) -> Self {
        PitchEstimate {
            frequency,
            confidence: confidence.clamp(0.0, 1.0),
            algorithm,
        }
    }

    /// Fractional MIDI note number.
    pub fn midi_note(&self) -> f32 {
        69.0 + 12.0 * (self.frequency / 440.0).log2()
    }

    /// Distance from the nearest equal-tempered note, in cents.
    pub fn cents_deviation(&self) -> f32 {
        let midi = self.midi_note();
        (midi - midi.round()) * 100.0
    }
}

/// A single pitch detection method.
pub trait PitchDetectionAlgorithm: Send + Sync {
    fn kind(&self) -> DetectorKind;

    fn detect(
        &self,
        samples: &[f32],
        sample_rate: f32,
        min_freq: f32,
        max_freq: f32,
    ) -> Option<PitchEstimate>;
}

/// Capture-side settings for pitch tracking.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct PitchDetectorConfig {
    pub sample_rate: f32,
    pub buffer_size: usize,
    pub min_frequency: f32,
    pub max_frequency: f32,
    /// Buffers quieter than this RMS level are treated as silence.
    pub silence_rms: f32,
}

impl Default for PitchDetectorConfig {
    fn default() -> Self {
        PitchDetectorConfig {
            sample_rate: 44100.0,
            buffer_size: 4096,
            min_frequency: 50.0,
            max_frequency: 2000.0,
            silence_rms: 0.01,
        }
    }
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum();
    (energy / samples.len() as f32).sqrt()
}

/// Lag search bounds `(min_lag, max_lag)` for a frequency range.
///
/// `None` when the range is degenerate or the longest period does not fit
/// inside the buffer.
pub(crate) fn lag_range(
    len: usize,
    sample_rate: f32,
    min_freq: f32,
    max_freq: f32,
) -> Option<(usize, usize)> {
    if !(sample_rate > 0.0) || !(min_freq > 0.0) || !(max_freq > min_freq) {
        return None;
    }
    let min_lag = ((sample_rate / max_freq).floor() as usize).max(1);
    let max_lag = (sample_rate / min_freq).ceil() as usize;
    if max_lag >= len || min_lag >= max_lag {
        return None;
    }
    Some((min_lag, max_lag))
}

/// Vertex offset of the parabola through three equally spaced points,
/// relative to the centre point. Works for peaks and troughs alike.
pub(crate) fn parabolic_offset(left: f32, center: f32, right: f32) -> f32 {
    let denom = left - 2.0 * center + right;
    if denom.abs() < 1e-12 {
        return 0.0;
    }
    let offset = 0.5 * (left - right) / denom;
    if offset.is_finite() {
        offset.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Height of the parabola at its vertex.
pub(crate) fn parabolic_value(left: f32, center: f32, right: f32, offset: f32) -> f32 {
    center - 0.25 * (left - right) * offset
}
