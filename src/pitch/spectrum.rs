use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Frames whose padded FFT would be smaller than this are not analysed.
pub const MIN_FFT_SIZE: usize = 2048;

/// Magnitude spectrum covering bins `0..=fft_size/2`.
pub struct Spectrum {
    pub magnitudes: Vec<f32>,
    pub bin_hz: f32,
}

impl Spectrum {
    pub fn peak(&self) -> f32 {
        self.magnitudes.iter().cloned().fold(0.0f32, f32::max)
    }

    /// Linearly interpolated magnitude at an arbitrary frequency.
    pub fn magnitude_at(&self, freq_hz: f32) -> f32 {
        let pos = freq_hz / self.bin_hz;
        if !(pos >= 0.0) {
            return 0.0;
        }
        let lower = pos.floor() as usize;
        let frac = pos - lower as f32;
        match (self.magnitudes.get(lower), self.magnitudes.get(lower + 1)) {
            (Some(&a), Some(&b)) => a + (b - a) * frac,
            (Some(&a), None) => a,
            _ => 0.0,
        }
    }
}

/// Zero-padded FFT length used for a frame: twice the frame, rounded up.
pub fn fft_size_for(frame_len: usize) -> usize {
    (frame_len * 2).next_power_of_two()
}

pub fn hann_window(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    let denom = (len - 1) as f32;
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / denom).cos())
        .collect()
}

/// Mean-removed, Hann-windowed magnitude spectrum of `samples`.
pub fn magnitude_spectrum(samples: &[f32], sample_rate: f32, fft_size: usize) -> Spectrum {
    let len = samples.len().min(fft_size);
    let mean = if len > 0 {
        samples[..len].iter().sum::<f32>() / len as f32
    } else {
        0.0
    };
    let window = hann_window(len);

    let mut buffer = vec![Complex { re: 0.0f32, im: 0.0 }; fft_size];
    for ((slot, &s), &w) in buffer.iter_mut().zip(samples).zip(&window) {
        slot.re = (s - mean) * w;
    }

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(fft_size);
    fft.process(&mut buffer);

    let magnitudes = buffer[..fft_size / 2 + 1].iter().map(|c| c.norm()).collect();
    Spectrum {
        magnitudes,
        bin_hz: sample_rate / fft_size as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pitch::test_signals::sine;

    #[test]
    fn test_fft_size_for() {
        assert_eq!(fft_size_for(4096), 8192);
        assert_eq!(fft_size_for(3000), 8192);
        assert_eq!(fft_size_for(512), 1024);
    }

    #[test]
    fn test_hann_window_shape() {
        let w = hann_window(5);
        assert!(w[0].abs() < 1e-6);
        assert!((w[2] - 1.0).abs() < 1e-6);
        assert!(w[4].abs() < 1e-6);
        assert_eq!(hann_window(1), vec![1.0]);
    }

    #[test]
    fn test_sine_peak_lands_on_its_bin() {
        let samples = sine(1000.0, 44100.0, 4096);
        let spectrum = magnitude_spectrum(&samples, 44100.0, 8192);
        assert_eq!(spectrum.magnitudes.len(), 4097);
        let peak_bin = spectrum
            .magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        let peak_hz = peak_bin as f32 * spectrum.bin_hz;
        assert!((peak_hz - 1000.0).abs() <= spectrum.bin_hz);
        assert!(spectrum.magnitude_at(1000.0) > 0.5 * spectrum.peak());
    }

    #[test]
    fn test_silence_has_empty_spectrum() {
        let spectrum = magnitude_spectrum(&vec![0.0; 2048], 44100.0, 4096);
        assert_eq!(spectrum.peak(), 0.0);
    }
}
