use crate::pitch::spectrum::{fft_size_for, magnitude_spectrum, MIN_FFT_SIZE};
use crate::pitch::{
    lag_range, parabolic_offset, DetectorKind, PitchDetectionAlgorithm, PitchEstimate,
};

const NUM_HARMONICS: usize = 5;

/// Required ratio of the winning product to the mean product in range.
const PEAK_TO_MEAN_THRESHOLD: f32 = 5.0;

/// Normalized magnitudes are floored here so that empty bins do not send
/// the log product to minus infinity.
const MAGNITUDE_FLOOR: f32 = 1e-4;

/// Candidate fundamentals need at least this much of the spectrum peak in
/// their own bin.
const FUNDAMENTAL_PRESENCE: f32 = 0.05;

/// Harmonic product spectrum, summed in the log domain.
pub struct HpsDetector {
    harmonics: usize,
    threshold: f32,
}

impl HpsDetector {
    pub fn new(harmonics: usize, threshold: f32) -> Self {
        HpsDetector {
            harmonics: harmonics.max(1),
            threshold,
        }
    }
}

impl Default for HpsDetector {
    fn default() -> Self {
        HpsDetector::new(NUM_HARMONICS, PEAK_TO_MEAN_THRESHOLD)
    }
}

impl PitchDetectionAlgorithm for HpsDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Hps
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
        let normalized: Vec<f32> = spectrum.magnitudes.iter().map(|m| m / peak).collect();
        let log_mag: Vec<f32> = normalized
            .iter()
            .map(|m| m.max(MAGNITUDE_FLOOR).ln())
            .collect();
        let floor_ln = MAGNITUDE_FLOOR.ln();

        let bins = log_mag.len();
        let k_min = ((min_freq / spectrum.bin_hz).floor() as usize).max(1);
        let k_max =
            ((max_freq / spectrum.bin_hz).ceil() as usize).min((bins - 1) / self.harmonics);
        if k_min + 1 >= k_max {
            return None;
        }

        let log_product = |k: usize| -> f32 {
            (1..=self.harmonics)
                .map(|h| log_mag.get(k * h).copied().unwrap_or(floor_ln))
                .sum()
        };
        let log_hps: Vec<f32> = (0..=k_max + 1).map(log_product).collect();

        let best = (k_min..=k_max)
            .filter(|&k| normalized[k] >= FUNDAMENTAL_PRESENCE)
            .max_by(|&a, &b| log_hps[a].total_cmp(&log_hps[b]))?;

        let mean = (k_min..=k_max).map(|k| log_hps[k].exp()).sum::<f32>()
            / (k_max - k_min + 1) as f32;
        let ratio = log_hps[best].exp() / mean;
        if !(ratio > self.threshold) {
            return None;
        }

        let offset = parabolic_offset(log_hps[best - 1], log_hps[best], log_hps[best + 1]);
        let frequency = (best as f32 + offset) * spectrum.bin_hz;
        if !frequency.is_finite() || frequency <= 0.0 {
            return None;
        }

        let confidence = 1.0 - self.threshold / ratio;
        Some(PitchEstimate::new(frequency, confidence, self.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::test_signals::{cents_off, harmonic_tone, sine};

    #[test]
    fn test_hps_a440() {
        let samples = sine(440.0, 44100.0, 4096);
        let result = HpsDetector::default()
            .detect(&samples, 44100.0, 50.0, 2000.0)
            .expect("should detect A4");
        assert!(cents_off(result.frequency, 440.0) < 50.0, "got {}", result.frequency);
        assert!(result.confidence > 0.0);
    }

    #[test]
    fn test_hps_harmonic_tone() {
        let samples = harmonic_tone(220.0, 44100.0, 4096);
        let result = HpsDetector::default()
            .detect(&samples, 44100.0, 50.0, 2000.0)
            .unwrap();
        assert!(cents_off(result.frequency, 220.0) < 50.0, "got {}", result.frequency);
    }

    #[test]
    fn test_hps_short_frame_and_silence() {
        let detector = HpsDetector::default();
        // 400 samples pad to a 1024-point FFT
        let short = sine(440.0, 44100.0, 400);
        assert!(detector.detect(&short, 44100.0, 200.0, 2000.0).is_none());
        assert!(detector.detect(&vec![0.0; 4096], 44100.0, 50.0, 2000.0).is_none());
    }
}
