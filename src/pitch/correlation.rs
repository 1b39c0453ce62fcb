use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Linear autocorrelation `r(t)` for `t` in `0..samples.len()`.
pub fn autocorrelation(samples: &[f32]) -> Vec<f32> {
    let n = samples.len();
    if n == 0 {
        return Vec::new();
    }
    let fft_size = (2 * n).next_power_of_two();

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    let inv_fft = planner.plan_fft_inverse(fft_size);

    let mut buffer = vec![Complex { re: 0.0f32, im: 0.0 }; fft_size];
    for (slot, &s) in buffer.iter_mut().zip(samples) {
        slot.re = s;
    }
    fft.process(&mut buffer);
    buffer.iter_mut().for_each(|c| *c = Complex::new(c.norm_sqr(), 0.0));
    inv_fft.process(&mut buffer);

    // rustfft does not normalise; forward + inverse scales by `fft_size`.
    let scale = 1.0 / fft_size as f32;
    buffer[..n].iter().map(|c| c.re * scale).collect()
}

/// Prefix sums of squared samples.
pub struct EnergyProfile {
    prefix: Vec<f64>,
}

impl EnergyProfile {
    pub fn new(samples: &[f32]) -> Self {
        let mut prefix = Vec::with_capacity(samples.len() + 1);
        prefix.push(0.0);
        let mut acc = 0.0f64;
        for &s in samples {
            acc += (s as f64) * (s as f64);
            prefix.push(acc);
        }
        EnergyProfile { prefix }
    }

    fn len(&self) -> usize {
        self.prefix.len() - 1
    }

    /// Energy of `x[0..n-lag]`.
    pub fn head(&self, lag: usize) -> f64 {
        let n = self.len();
        self.prefix[n.saturating_sub(lag)]
    }

    /// Energy of `x[lag..n]`.
    pub fn tail(&self, lag: usize) -> f64 {
        let n = self.len();
        self.prefix[n] - self.prefix[lag.min(n)]
    }
}

/// Correlation coefficient between the signal and its lagged copy,
/// `r(t) / sqrt(E_head(t) * E_tail(t))`. Close to 1 at the period.
pub fn normalized_autocorrelation(samples: &[f32]) -> Vec<f32> {
    let acf = autocorrelation(samples);
    let energy = EnergyProfile::new(samples);
    acf.iter()
        .enumerate()
        .map(|(lag, &r)| {
            let denom = (energy.head(lag) * energy.tail(lag)).sqrt();
            if denom > 1e-12 {
                (r as f64 / denom) as f32
            } else {
                0.0
            }
        })
        .collect()
}

/// McLeod's normalized square difference function,
/// `2 r(t) / (E_head(t) + E_tail(t))`, bounded to `[-1, 1]`.
pub fn normalized_square_difference(samples: &[f32]) -> Vec<f32> {
    let acf = autocorrelation(samples);
    let energy = EnergyProfile::new(samples);
    acf.iter()
        .enumerate()
        .map(|(lag, &r)| {
            let m = energy.head(lag) + energy.tail(lag);
            if m > 1e-12 {
                (2.0 * r as f64 / m) as f32
            } else {
                0.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autocorrelation_matches_direct_sum() {
        let signal: Vec<f32> = vec![0., 1., 2., 0., -1., -2.];
        let direct: Vec<f32> = (0..signal.len())
            .map(|t| {
                signal[..signal.len() - t]
                    .iter()
                    .zip(&signal[t..])
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect();

        let computed = autocorrelation(&signal);
        assert_eq!(computed.len(), direct.len());
        for (c, d) in computed.iter().zip(&direct) {
            assert!((c - d).abs() < 1e-4, "{} vs {}", c, d);
        }
    }

    #[test]
    fn energy_profile_windows() {
        let energy = EnergyProfile::new(&[1.0, 2.0, 3.0]);
        assert_eq!(energy.head(0), 14.0);
        assert_eq!(energy.head(1), 5.0);
        assert_eq!(energy.tail(1), 13.0);
        assert_eq!(energy.tail(3), 0.0);
    }

    #[test]
    fn normalized_functions_peak_at_zero_lag() {
        let signal: Vec<f32> = (0..256).map(|i| (i as f32 * 0.3).sin()).collect();
        let corr = normalized_autocorrelation(&signal);
        let nsdf = normalized_square_difference(&signal);
        assert!((corr[0] - 1.0).abs() < 1e-3);
        assert!((nsdf[0] - 1.0).abs() < 1e-3);
        assert!(nsdf.iter().all(|v| *v <= 1.0 + 1e-3 && *v >= -1.0 - 1e-3));
    }

    #[test]
    fn silence_does_not_produce_nan() {
        let silent = vec![0.0f32; 128];
        assert!(normalized_autocorrelation(&silent).iter().all(|v| *v == 0.0));
        assert!(normalized_square_difference(&silent).iter().all(|v| *v == 0.0));
    }
}
