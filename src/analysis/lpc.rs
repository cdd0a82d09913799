//! Linear prediction by Burg's method and conversion of the predictor
//! polynomial's roots into resonances.

use rustfft::num_complex::Complex;
use std::f64::consts::PI;

/// Root candidates closer than this to 0 Hz or Nyquist are discarded.
const EDGE_MARGIN_HZ: f64 = 50.0;
const ROOT_ITERATIONS: usize = 500;
const ROOT_TOLERANCE: f64 = 1e-12;
const POLISH_ITERATIONS: usize = 20;

/// A pole of the all-pole model expressed as a resonance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resonance {
    pub frequency: f64,
    pub bandwidth: f64,
}

/// Burg LPC of the given order.
///
/// Returns `a[0..order]` such that the prediction polynomial is
/// `z^m - a[0] z^(m-1) - ... - a[m-1]`. Silent or too-short input gives all
/// zeros, which has no resonances.
pub fn burg(samples: &[f64], order: usize) -> Vec<f64> {
    let n = samples.len();
    let mut a = vec![0.0; order];
    if order == 0 || n <= order + 1 {
        return a;
    }

    let power: f64 = samples.iter().map(|s| s * s).sum();
    if power <= 0.0 {
        return a;
    }

    // forward and backward prediction errors
    let mut forward = samples[..n - 1].to_vec();
    let mut backward = samples[1..].to_vec();
    let mut previous = vec![0.0; order];

    for i in 0..order {
        let span = n - i - 1;
        let (mut numerator, mut denominator) = (0.0, 0.0);
        for j in 0..span {
            numerator += forward[j] * backward[j];
            denominator += forward[j] * forward[j] + backward[j] * backward[j];
        }
        if denominator <= 0.0 {
            break;
        }

        a[i] = 2.0 * numerator / denominator;
        for j in 0..i {
            a[j] = previous[j] - a[i] * previous[i - j - 1];
        }

        if i + 1 < order {
            previous[..=i].copy_from_slice(&a[..=i]);
            for j in 0..span - 1 {
                forward[j] -= previous[i] * backward[j];
                backward[j] = backward[j + 1] - previous[i] * forward[j + 1];
            }
        }
    }

    a
}

/// Resonances of the predictor, sorted by frequency.
///
/// Roots outside the unit circle are reflected inside (`z / |z|²`) so every
/// pole is stable; only the upper half-plane is kept since poles come in
/// conjugate pairs.
pub fn resonances(coefficients: &[f64], sample_rate: f64) -> Vec<Resonance> {
    if coefficients.iter().all(|&c| c == 0.0) {
        return Vec::new();
    }

    let m = coefficients.len();
    let nyquist = 0.5 * sample_rate;

    // ascending powers, monic
    let mut polynomial = vec![0.0; m + 1];
    for (k, &a) in coefficients.iter().enumerate() {
        polynomial[m - 1 - k] = -a;
    }
    polynomial[m] = 1.0;

    let mut found: Vec<Resonance> = polynomial_roots(&polynomial)
        .into_iter()
        .map(|root| {
            let norm = root.norm_sqr();
            if norm > 1.0 {
                root / norm
            } else {
                root
            }
        })
        .filter(|root| root.im >= 0.0)
        .filter_map(|root| {
            let frequency = root.im.atan2(root.re).abs() * nyquist / PI;
            if frequency < EDGE_MARGIN_HZ || frequency > nyquist - EDGE_MARGIN_HZ {
                return None;
            }
            // |z| = exp(-pi * B / fs), so B = -ln(|z|^2) * nyquist / pi
            let power = root.norm_sqr();
            let bandwidth = if power > 0.0 {
                -power.ln() * nyquist / PI
            } else {
                nyquist
            };
            Some(Resonance {
                frequency,
                bandwidth,
            })
        })
        .collect();

    found.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
    found
}

/// All complex roots of a monic polynomial given in ascending powers
/// (Durand–Kerner iteration followed by a Newton polish).
pub fn polynomial_roots(polynomial: &[f64]) -> Vec<Complex<f64>> {
    let degree = polynomial.len().saturating_sub(1);
    if degree == 0 {
        return Vec::new();
    }

    let seed = Complex::new(0.4, 0.9);
    let mut roots: Vec<Complex<f64>> = (0..degree).map(|k| seed.powu(k as u32 + 1)).collect();

    for _ in 0..ROOT_ITERATIONS {
        let mut largest_step: f64 = 0.0;
        for k in 0..degree {
            let z = roots[k];
            let mut denominator = Complex::new(1.0, 0.0);
            for (j, &other) in roots.iter().enumerate() {
                if j != k {
                    denominator *= z - other;
                }
            }
            if denominator.norm_sqr() == 0.0 {
                continue;
            }
            let step = evaluate(polynomial, z) / denominator;
            roots[k] = z - step;
            largest_step = largest_step.max(step.norm());
        }
        if largest_step < ROOT_TOLERANCE {
            break;
        }
    }

    for root in roots.iter_mut() {
        polish(polynomial, root);
    }
    roots
}

fn evaluate(polynomial: &[f64], z: Complex<f64>) -> Complex<f64> {
    polynomial
        .iter()
        .rev()
        .fold(Complex::new(0.0, 0.0), |acc, &c| acc * z + c)
}

fn polish(polynomial: &[f64], root: &mut Complex<f64>) {
    for _ in 0..POLISH_ITERATIONS {
        let mut value = Complex::new(0.0, 0.0);
        let mut derivative = Complex::new(0.0, 0.0);
        for &c in polynomial.iter().rev() {
            derivative = derivative * *root + value;
            value = value * *root + c;
        }
        if derivative.norm_sqr() == 0.0 {
            return;
        }
        let step = value / derivative;
        if !step.re.is_finite() || !step.im.is_finite() {
            return;
        }
        *root -= step;
        if step.norm() < ROOT_TOLERANCE {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_of_quadratic() {
        // z^2 - 3z + 2 = (z - 1)(z - 2)
        let mut roots: Vec<f64> = polynomial_roots(&[2.0, -3.0, 1.0]).iter().map(|r| r.re).collect();
        roots.sort_by(f64::total_cmp);
        assert!((roots[0] - 1.0).abs() < 1e-9);
        assert!((roots[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_complex_conjugate_roots() {
        // z^2 + 1
        let roots = polynomial_roots(&[1.0, 0.0, 1.0]);
        assert!(roots.iter().all(|r| r.re.abs() < 1e-9 && (r.im.abs() - 1.0).abs() < 1e-9));
    }

    #[test]
    fn test_burg_recovers_single_resonance() {
        let rate = 11000.0;
        let (frequency, bandwidth) = (1000.0, 100.0);
        let r = (-PI * bandwidth / rate).exp();
        let c = 2.0 * r * (2.0 * PI * frequency / rate).cos();

        // xorshift white noise driving the resonator, so the process is stationary
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut noise = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
        };

        let mut signal = vec![0.0; 41000];
        for i in 2..signal.len() {
            signal[i] = noise() + c * signal[i - 1] - r * r * signal[i - 2];
        }
        // skip the start-up transient
        let signal = &signal[1000..];

        let found = resonances(&burg(signal, 2), rate);
        assert_eq!(found.len(), 1);
        assert!((found[0].frequency - frequency).abs() < 15.0, "{:?}", found);
        assert!((found[0].bandwidth - bandwidth).abs() < 30.0, "{:?}", found);
    }

    #[test]
    fn test_silence_has_no_resonances() {
        let coefficients = burg(&[0.0; 200], 10);
        assert!(coefficients.iter().all(|&c| c == 0.0));
        assert!(resonances(&coefficients, 11000.0).is_empty());
    }
}
