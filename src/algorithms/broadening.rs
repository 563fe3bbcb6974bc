//! Gaussian broadening of discrete spectra and small helpers on frequency grids.

use crate::error::{FtlmError, FtlmErrorKind};
use std::f64::consts::PI;

/// Unit-width Gaussian `exp(−x²/2) / √(2π)`, normalised to unit area.
pub fn gaussian(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Broadens `(poles, weights)` onto `omegas` with a Gaussian of width `eta`:
///
/// ```text
///     spectrum[i] = Σ_j weights[j] · G((omegas[i] − poles[j]) / η) / η
/// ```
pub fn broaden(poles: &[f64], weights: &[f64], omegas: &[f64], eta: f64) -> Result<Vec<f64>, FtlmError> {
    if poles.len() != weights.len() {
        return Err(FtlmErrorKind::InvalidParameter(format!(
            "{} poles but {} weights",
            poles.len(),
            weights.len()
        ))
        .into());
    }
    if !(eta.is_finite() && eta > 0.0) {
        return Err(FtlmErrorKind::InvalidParameter(format!(
            "broadening width must be positive, got {eta}"
        ))
        .into());
    }

    Ok(omegas
        .iter()
        .map(|&omega| {
            poles
                .iter()
                .zip(weights)
                .map(|(&pole, &weight)| weight * gaussian((omega - pole) / eta))
                .sum::<f64>()
                / eta
        })
        .collect())
}

/// `n` evenly spaced points from `min` to `max`, both included.
pub fn linspace(min: f64, max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![min],
        _ => {
            let step = (max - min) / (n - 1) as f64;
            (0..n).map(|i| min + step * i as f64).collect()
        }
    }
}

/// Trapezoid-rule integral of the samples `ys` taken at `xs`.
pub fn trapezoid(xs: &[f64], ys: &[f64]) -> f64 {
    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (x[1] - x[0]) * (y[0] + y[1]))
        .sum()
}

/// Running sum of `weights`; with poles sorted this is the integrated spectrum.
pub fn cumulative_weight(weights: &[f64]) -> Vec<f64> {
    weights
        .iter()
        .scan(0.0, |acc, w| {
            *acc += w;
            Some(*acc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pole_has_unit_area() {
        let omegas = linspace(-2.0, 2.0, 4001);
        let spectrum = broaden(&[0.0], &[1.0], &omegas, 0.1).unwrap();
        let area = trapezoid(&omegas, &spectrum);
        assert!((area - 1.0).abs() < 0.01, "area = {area}");
    }

    #[test]
    fn test_peak_position_and_height() {
        let omegas = linspace(-1.0, 1.0, 201);
        let spectrum = broaden(&[0.5], &[2.0], &omegas, 0.05).unwrap();
        let (argmax, _) = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert!((omegas[argmax] - 0.5).abs() < 1e-9);
        assert!((spectrum[argmax] - 2.0 * gaussian(0.0) / 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(broaden(&[0.0, 1.0], &[1.0], &[0.0], 0.1).is_err());
        assert!(broaden(&[0.0], &[1.0], &[0.0], 0.0).is_err());
    }

    #[test]
    fn test_linspace() {
        assert_eq!(linspace(0.0, 1.0, 5), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_cumulative_weight() {
        assert_eq!(cumulative_weight(&[1.0, 2.0, -0.5]), vec![1.0, 3.0, 2.5]);
    }
}
