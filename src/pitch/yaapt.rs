use crate::pitch::correlation::normalized_autocorrelation;
use crate::pitch::spectrum::{fft_size_for, magnitude_spectrum, Spectrum, MIN_FFT_SIZE};
use crate::pitch::{
    lag_range, parabolic_offset, DetectorKind, PitchDetectionAlgorithm, PitchEstimate,
};

const NLFER_CUTOFF_HZ: f32 = 1500.0;
const VOICING_THRESHOLD: f32 = 0.4;
const SHC_THRESHOLD: f32 = 0.2;
const NUM_HARMONICS: usize = 5;
const REFINE_RANGE: f32 = 0.1;

/// NLFER voicing check, spectral harmonic correlation over a 1 Hz grid,
/// then autocorrelation refinement within 10% of the winner.
pub struct YaaptDetector {
    voicing_threshold: f32,
    shc_threshold: f32,
}

impl YaaptDetector {
    pub fn new(voicing_threshold: f32, shc_threshold: f32) -> Self {
        YaaptDetector {
            voicing_threshold,
            shc_threshold,
        }
    }
}

impl Default for YaaptDetector {
    fn default() -> Self {
        YaaptDetector::new(VOICING_THRESHOLD, SHC_THRESHOLD)
    }
}

/// Share of spectral energy below the NLFER cutoff. DC is excluded.
pub(crate) fn nlfer(spectrum: &Spectrum) -> f32 {
    let mut low = 0.0f32;
    let mut total = 0.0f32;
    for (k, m) in spectrum.magnitudes.iter().enumerate().skip(1) {
        let power = m * m;
        total += power;
        if k as f32 * spectrum.bin_hz < NLFER_CUTOFF_HZ {
            low += power;
        }
    }
    if total > 0.0 {
        low / total
    } else {
        0.0
    }
}

/// SHC of one candidate against a peak-normalized spectrum, scaled to `[0, 1]`.
fn harmonic_correlation(spectrum: &Spectrum, peak: f32, f0: f32, nyquist: f32) -> f32 {
    let mut score = 0.0f32;
    let mut weight = 0.0f32;
    for h in 1..=NUM_HARMONICS {
        let freq = f0 * h as f32;
        if freq >= nyquist {
            break;
        }
        let w = 1.0 / h as f32;
        score += w * spectrum.magnitude_at(freq) / peak;
        weight += w;
    }
    if weight > 0.0 {
        score / weight
    } else {
        0.0
    }
}

/// Best normalized-autocorrelation lag within ±`REFINE_RANGE` of `f0`.
fn refine_with_autocorrelation(samples: &[f32], sample_rate: f32, f0: f32) -> Option<f32> {
    let corr = normalized_autocorrelation(samples);
    let lo = ((sample_rate / (f0 * (1.0 + REFINE_RANGE))).floor() as usize).max(2);
    let last_interior = corr.len().checked_sub(2)?;
    let hi = ((sample_rate / (f0 * (1.0 - REFINE_RANGE))).ceil() as usize).min(last_interior);
    if lo > hi {
        return None;
    }
    let lag = (lo..=hi).max_by(|&a, &b| corr[a].total_cmp(&corr[b]))?;
    if corr[lag] <= 0.0 {
        return None;
    }
    let period = lag as f32 + parabolic_offset(corr[lag - 1], corr[lag], corr[lag + 1]);
    let frequency = sample_rate / period;
    frequency.is_finite().then_some(frequency)
}

impl PitchDetectionAlgorithm for YaaptDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Yaapt
    }

    fn detect(
        &self,
        samples: &[f32],
        sample_rate: f32,
        min_freq: f32,
        max_freq: f32,
    ) -> Option<PitchEstimate> {
        lag_range(samples.len(), sample_rate, min_freq, max_freq)?;
        let fft_size = fft_size_for(samples.len());
        if fft_size < MIN_FFT_SIZE {
            return None;
        }

        let spectrum = magnitude_spectrum(samples, sample_rate, fft_size);
        let peak = spectrum.peak();
        if !(peak > 0.0) {
            return None;
        }

        let voicing = nlfer(&spectrum);
        if voicing < self.voicing_threshold {
            return None;
        }

        let nyquist = sample_rate / 2.0;
        let first = min_freq.ceil() as u32;
        let last = max_freq.min(nyquist).floor() as u32;
        let (f0, shc) = (first..=last)
            .map(|f| {
                let f = f as f32;
                (f, harmonic_correlation(&spectrum, peak, f, nyquist))
            })
            .fold((0.0f32, f32::MIN), |acc, cur| if cur.1 > acc.1 { cur } else { acc });

        if f0 <= 0.0 || shc < self.shc_threshold {
            return None;
        }

        let frequency = refine_with_autocorrelation(samples, sample_rate, f0).unwrap_or(f0);
        let confidence = (shc * voicing).min(1.0);
        Some(PitchEstimate::new(frequency, confidence, self.kind()))
    }
}
