use crate::pitch::correlation::normalized_autocorrelation;
use crate::pitch::{
    lag_range, parabolic_offset, DetectorKind, PitchDetectionAlgorithm, PitchEstimate,
};

const CORRELATION_THRESHOLD: f32 = 0.8;

/// A later lag has to beat the earliest qualifying peak by more than this
/// ratio to win; otherwise multiples of the period would compete with the
/// period itself whenever it is not a whole number of samples.
const OCTAVE_TOLERANCE: f32 = 0.97;

/// Pitch detection from the normalized autocorrelation of the buffer.
pub struct AutocorrelationDetector {
    threshold: f32,
}

impl AutocorrelationDetector {
    pub fn new(threshold: f32) -> Self {
        AutocorrelationDetector { threshold }
    }
}

impl Default for AutocorrelationDetector {
    fn default() -> Self {
        AutocorrelationDetector::new(CORRELATION_THRESHOLD)
    }
}

impl PitchDetectionAlgorithm for AutocorrelationDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Autocorrelation
    }

    fn detect(
        &self,
        samples: &[f32],
        sample_rate: f32,
        min_freq: f32,
        max_freq: f32,
    ) -> Option<PitchEstimate> {
        let (min_lag, max_lag) = lag_range(samples.len(), sample_rate, min_freq, max_freq)?;
        let corr = normalized_autocorrelation(samples);
        let value = |lag: usize| corr.get(lag).copied().unwrap_or(0.0);

        let (best_lag, best_value) = (min_lag..=max_lag)
            .map(|lag| (lag, value(lag)))
            .fold((min_lag, f32::MIN), |acc, cur| if cur.1 > acc.1 { cur } else { acc });

        if best_value < self.threshold {
            return None;
        }

        let is_peak = |lag: usize| value(lag) >= value(lag - 1) && value(lag) >= value(lag + 1);
        let lag = (min_lag..=max_lag)
            .find(|&lag| is_peak(lag) && value(lag) >= OCTAVE_TOLERANCE * best_value)
            .unwrap_or(best_lag);

        let offset = parabolic_offset(value(lag - 1), value(lag), value(lag + 1));
        let period = lag as f32 + offset;
        let frequency = sample_rate / period;
        if !frequency.is_finite() || frequency <= 0.0 {
            return None;
        }

        Some(PitchEstimate::new(frequency, value(lag), self.kind()))
    }
}
