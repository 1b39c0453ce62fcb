use crate::pitch::correlation::normalized_square_difference;
use crate::pitch::{
    lag_range, parabolic_offset, parabolic_value, DetectorKind, PitchDetectionAlgorithm,
    PitchEstimate,
};

const DEFAULT_CUTOFF: f32 = 0.93;
const SMALL_CUTOFF: f32 = 0.5;

/// McLeod Pitch Method: the first NSDF key maximum within `cutoff` of the
/// tallest one marks the period.
pub struct McLeodDetector {
    cutoff: f32,
    small_cutoff: f32,
}

impl McLeodDetector {
    pub fn new(cutoff: f32, small_cutoff: f32) -> Self {
        McLeodDetector {
            cutoff,
            small_cutoff,
        }
    }
}

impl Default for McLeodDetector {
    fn default() -> Self {
        McLeodDetector::new(DEFAULT_CUTOFF, SMALL_CUTOFF)
    }
}

/// Highest NSDF value inside each positive region that follows a zero
/// crossing. The lobe around lag 0 is skipped.
fn key_maxima(nsdf: &[f32], last_lag: usize) -> Vec<(usize, f32)> {
    let last_lag = last_lag.min(nsdf.len().saturating_sub(1));
    let mut maxima = Vec::new();

    let mut lag = 1;
    while lag <= last_lag && nsdf[lag] > 0.0 {
        lag += 1;
    }

    let mut current: Option<(usize, f32)> = None;
    while lag <= last_lag {
        let value = nsdf[lag];
        if value > 0.0 {
            match current {
                Some((_, best)) if best >= value => {}
                _ => current = Some((lag, value)),
            }
        } else if let Some(peak) = current.take() {
            maxima.push(peak);
        }
        lag += 1;
    }
    if let Some(peak) = current {
        maxima.push(peak);
    }
    maxima
}

impl PitchDetectionAlgorithm for McLeodDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::McLeod
    }

    fn detect(
        &self,
        samples: &[f32],
        sample_rate: f32,
        min_freq: f32,
        max_freq: f32,
    ) -> Option<PitchEstimate> {
        let (min_lag, max_lag) = lag_range(samples.len(), sample_rate, min_freq, max_freq)?;
        let nsdf = normalized_square_difference(samples);

        let candidates: Vec<(usize, f32)> = key_maxima(&nsdf, max_lag + 1)
            .into_iter()
            .filter(|&(lag, _)| lag >= min_lag && lag <= max_lag)
            .collect();

        let global_max = candidates.iter().map(|&(_, v)| v).fold(f32::MIN, f32::max);
        if candidates.is_empty() || global_max < self.small_cutoff {
            return None;
        }

        let threshold = self.cutoff * global_max;
        let (lag, _) = candidates.into_iter().find(|&(_, v)| v >= threshold)?;

        let value = |l: usize| nsdf.get(l).copied().unwrap_or(0.0);
        let (left, center, right) = (value(lag - 1), value(lag), value(lag + 1));
        let offset = parabolic_offset(left, center, right);
        let clarity = parabolic_value(left, center, right, offset);

        let frequency = sample_rate / (lag as f32 + offset);
        if !frequency.is_finite() || frequency <= 0.0 {
            return None;
        }
        Some(PitchEstimate::new(frequency, clarity, self.kind()))
    }
}
