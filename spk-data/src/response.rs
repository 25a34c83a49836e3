//! Poles-and-zeros instrument responses.

use num_complex::Complex64;
use spk_core::station::PazResponse;
use std::f64::consts::PI;

/// Standard Wood-Anderson torsion seismometer response.
pub fn wood_anderson() -> PazResponse {
    PazResponse {
        gain: 1.0,
        sensitivity: 2800.0,
        poles: vec![Complex64::new(-6.283, 4.7124), Complex64::new(-6.283, -4.7124)],
        zeros: vec![Complex64::new(0.0, 0.0)],
    }
}

/// Amplitude of the response at `frequency` Hz, excluding sensitivity:
/// `gain * |prod(jw - z) / prod(jw - p)|`.
pub fn amplitude_response(paz: &PazResponse, frequency: f64) -> f64 {
    let jw = Complex64::new(0.0, 2.0 * PI * frequency);
    let one = Complex64::new(1.0, 0.0);
    let numerator = paz.zeros.iter().fold(one, |acc, z| acc * (jw - z));
    let denominator = paz.poles.iter().fold(one, |acc, p| acc * (jw - p));
    paz.gain * (numerator / denominator).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wood_anderson_flat_at_high_frequency() {
        // two poles, one zero: |H| ~ 1/w well above the corner
        let paz = wood_anderson();
        let f = 1000.0;
        let w = 2.0 * PI * f;
        assert!((amplitude_response(&paz, f) * w - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_at_origin_kills_dc() {
        assert_eq!(amplitude_response(&wood_anderson(), 0.0), 0.0);
    }

    #[test]
    fn test_gain_scales_response() {
        let mut paz = wood_anderson();
        let base = amplitude_response(&paz, 2.0);
        paz.gain = 4.0;
        assert!((amplitude_response(&paz, 2.0) - 4.0 * base).abs() < 1e-12);
    }
}
