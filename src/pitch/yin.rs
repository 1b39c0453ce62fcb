use crate::pitch::{
    lag_range, parabolic_offset, DetectorKind, PitchDetectionAlgorithm, PitchEstimate,
};

const YIN_THRESHOLD: f32 = 0.15;

/// Global minima above this are treated as unpitched.
const YIN_FALLBACK_LIMIT: f32 = 0.5;

/// Pitch detection using the YIN algorithm.
pub struct YinDetector {
    threshold: f32,
}

impl YinDetector {
    pub fn new(threshold: f32) -> Self {
        YinDetector { threshold }
    }
}

impl Default for YinDetector {
    fn default() -> Self {
        YinDetector::new(YIN_THRESHOLD)
    }
}

impl PitchDetectionAlgorithm for YinDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Yin
    }

    fn detect(
        &self,
        samples: &[f32],
        sample_rate: f32,
        min_freq: f32,
        max_freq: f32,
    ) -> Option<PitchEstimate> {
        let (min_lag, max_lag) = lag_range(samples.len(), sample_rate, min_freq, max_freq)?;

        // The comparison window shrinks below half the buffer only when the
        // longest period needs the room.
        let window = (samples.len() / 2).min(samples.len() - max_lag);

        // Step 1: Difference function
        let mut diff = vec![0.0f32; max_lag + 1];
        for tau in 1..=max_lag {
            let mut sum = 0.0f32;
            for j in 0..window {
                let d = samples[j] - samples[j + tau];
                sum += d * d;
            }
            diff[tau] = sum;
        }

        // Step 2: Cumulative mean normalized difference function
        let mut cmnd = vec![0.0f32; max_lag + 1];
        cmnd[0] = 1.0;
        let mut running_sum = 0.0f32;
        for tau in 1..=max_lag {
            running_sum += diff[tau];
            if running_sum > 0.0 {
                cmnd[tau] = diff[tau] * tau as f32 / running_sum;
            } else {
                cmnd[tau] = 1.0;
            }
        }

        // Step 3: Absolute threshold -- first dip below threshold, walked
        // forward to the bottom of its valley
        let mut best_tau = None;
        for tau in min_lag..=max_lag {
            if cmnd[tau] < self.threshold {
                let mut t = tau;
                while t < max_lag && cmnd[t + 1] < cmnd[t] {
                    t += 1;
                }
                best_tau = Some(t);
                break;
            }
        }

        let best_tau = match best_tau {
            Some(tau) => tau,
            None => {
                let (tau, min_val) = (min_lag..=max_lag)
                    .map(|tau| (tau, cmnd[tau]))
                    .fold((min_lag, f32::MAX), |acc, cur| if cur.1 < acc.1 { cur } else { acc });
                if min_val >= YIN_FALLBACK_LIMIT {
                    return None;
                }
                tau
            }
        };

        // Step 4: Parabolic interpolation for sub-sample accuracy
        let tau_refined = if best_tau > 1 && best_tau < max_lag {
            best_tau as f32
                + parabolic_offset(cmnd[best_tau - 1], cmnd[best_tau], cmnd[best_tau + 1])
        } else {
            best_tau as f32
        };

        if tau_refined <= 0.0 {
            return None;
        }

        let frequency = sample_rate / tau_refined;
        let confidence = 1.0 - cmnd[best_tau].min(1.0);
        Some(PitchEstimate::new(frequency, confidence, self.kind()))
    }
}
