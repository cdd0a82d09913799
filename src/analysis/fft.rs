//! FFT helpers shared by the pitch tracker and the resampler.

use rustfft::{num_complex::Complex, FftPlanner};

/// Caches FFT plans across the frames of one analysis.
pub struct Spectral {
    planner: FftPlanner<f64>,
}

impl Spectral {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }

    /// Linear (non-circular) autocorrelation for lags `0..input.len()`.
    ///
    /// The input is zero-padded to at least twice its length so the circular
    /// result of the inverse transform does not wrap around.
    pub fn autocorrelation(&mut self, input: &[f64]) -> Vec<f64> {
        let n = input.len();
        if n == 0 {
            return Vec::new();
        }

        let size = (2 * n).next_power_of_two();
        let mut buffer = to_complex(input, size);
        self.planner.plan_fft_forward(size).process(&mut buffer);

        for bin in buffer.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }
        self.planner.plan_fft_inverse(size).process(&mut buffer);

        let scale = 1.0 / size as f64;
        buffer[..n].iter().map(|c| c.re * scale).collect()
    }

    /// Brick-wall low-pass filter keeping the lowest `keep_fraction` of the
    /// spectrum (`0 < keep_fraction < 1`, relative to Nyquist).
    ///
    /// The signal is padded on both sides before transforming so energy from
    /// the end of the clip does not leak into its start.
    pub fn lowpass(&mut self, samples: &[f64], keep_fraction: f64) -> Vec<f64> {
        const PADDING: usize = 1000;

        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }

        let size = (n + 2 * PADDING).next_power_of_two();
        let mut buffer = vec![Complex::new(0.0, 0.0); size];
        for (slot, &sample) in buffer[PADDING..PADDING + n].iter_mut().zip(samples) {
            *slot = Complex::new(sample, 0.0);
        }

        self.planner.plan_fft_forward(size).process(&mut buffer);

        // bins k and size - k mirror each other for a real signal
        let cutoff = ((keep_fraction * (size / 2) as f64).floor() as usize).min(size / 2);
        for k in cutoff..=size / 2 {
            buffer[k] = Complex::new(0.0, 0.0);
            if k != 0 && k != size - k {
                buffer[size - k] = Complex::new(0.0, 0.0);
            }
        }

        self.planner.plan_fft_inverse(size).process(&mut buffer);

        let scale = 1.0 / size as f64;
        buffer[PADDING..PADDING + n]
            .iter()
            .map(|c| c.re * scale)
            .collect()
    }
}

impl Default for Spectral {
    fn default() -> Self {
        Self::new()
    }
}

fn to_complex(input: &[f64], size: usize) -> Vec<Complex<f64>> {
    input
        .iter()
        .map(|&x| Complex::new(x, 0.0))
        .chain(std::iter::repeat(Complex::new(0.0, 0.0)))
        .take(size)
        .collect()
}
