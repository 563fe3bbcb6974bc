//! Finite-temperature poles and spectral weights.
//!
//! Every block carries two Lanczos recursions started from the same random vector
//! `r`: the T-recursion of the Hamiltonian `H` on `r` and the S-recursion of `H` on
//! `O r` for the measured operator `O`. Together with the matrix `A` of `O` between
//! the two Krylov bases they give the Lehmann representation of the dynamical
//! correlator
//!
//! ```text
//!     S(ω) = Σ_{a,b,c} w_abc δ(ω − p_abc)
//! ```
//!
//! For ground-shifted tridiagonal matrices `T` (eigenpairs `d_a`, `Q`) and `S`
//! (eigenpairs `e_b`, `R`) and inverse temperature β:
//!
//! ```text
//!     b       = exp(−β T / 2) e_1          Z     = Σ_blocks deg · dim · bᵀb
//!     b̃       = Qᵀ b                       Ã     = Rᵀ A Q
//!     w_abc   = 2π · deg · dim / Z · conj(b̃_a) conj(Ã_ba) Ã_bc b̃_c
//!     p_abc   = e_b − (d_a + d_c) / 2
//! ```
//!
//! where `deg` is the block degeneracy and `dim` the optional Hilbert-space
//! dimension of the block (the stochastic-trace normalisation).

use crate::{
    block_array::BlockArray,
    ensemble::{BlockLabel, Ensemble},
    error::{FtlmError, FtlmErrorKind},
    tridiagonal::TriDiagonal,
};
use faer::{Mat, c64};
use std::f64::consts::PI;

/// Relative size of the imaginary residue above which a warning is logged.
const IMAGINARY_RESIDUE_WARNING: f64 = 1e-8;

/// Settings of one assembly run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblyOptions {
    /// Inverse temperature β.
    pub beta: f64,
    /// Entries with `|weight| <= cutoff` are dropped. `None` keeps everything.
    pub cutoff: Option<f64>,
}

impl AssemblyOptions {
    pub fn at_temperature(temperature: f64) -> Self {
        Self {
            beta: 1.0 / temperature,
            cutoff: None,
        }
    }

    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }
}

/// Index-aligned poles and weights of a dynamical correlator.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralWeights {
    pub poles: Vec<f64>,
    pub weights: Vec<c64>,
    /// Partition function used to normalise the weights.
    pub partition: f64,
    /// Global ground-state energy the recursions were shifted by.
    pub e0: f64,
}

impl SpectralWeights {
    pub fn len(&self) -> usize {
        self.poles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poles.is_empty()
    }

    /// Drops every entry whose weight magnitude does not exceed `cutoff`.
    ///
    /// Such weights are numerically indistinguishable from zero.
    pub fn truncate(&mut self, cutoff: f64) {
        (self.poles, self.weights) = self
            .poles
            .iter()
            .zip(&self.weights)
            .filter(|(_, w)| w.norm() > cutoff)
            .map(|(p, w)| (*p, *w))
            .unzip();
    }

    /// Sorts the entries by ascending pole position.
    pub fn sort_by_pole(&mut self) {
        let mut order: Vec<usize> = (0..self.poles.len()).collect();
        order.sort_by(|&a, &b| self.poles[a].total_cmp(&self.poles[b]));
        self.poles = order.iter().map(|&i| self.poles[i]).collect();
        self.weights = order.iter().map(|&i| self.weights[i]).collect();
    }

    pub fn is_sorted(&self) -> bool {
        self.poles.windows(2).all(|w| w[0] <= w[1])
    }

    /// Real parts of the weights.
    ///
    /// Complex weights occur in conjugate pairs, so the imaginary parts cancel in
    /// every physical quantity and are discarded here.
    pub fn real_weights(&self) -> Vec<f64> {
        self.weights.iter().map(|w| w.re).collect()
    }

    /// Euclidean norm of the imaginary parts of all weights.
    pub fn imaginary_residue(&self) -> f64 {
        self.weights.iter().map(|w| w.im * w.im).sum::<f64>().sqrt()
    }

    pub fn total_weight(&self) -> c64 {
        self.weights.iter().fold(c64::new(0.0, 0.0), |acc, w| acc + *w)
    }
}

/// Per-block ingredients of the assembly.
struct BlockFactors {
    b_tilde: Vec<f64>,
    a_tilde: Mat<c64>,
    d: Vec<f64>,
    e: Vec<f64>,
}

/// Assembles the poles and weights of all blocks.
///
/// `t_model` and `s_model` are the raw (unshifted) recursions, `operator` holds for
/// every block the `len(S) x len(T)` matrix of the measured operator between the two
/// Krylov bases, and `dims` optionally the Hilbert-space dimension of every block.
/// The result is truncated at `options.cutoff` and sorted by pole.
pub fn assemble_spectral_weights(
    ensemble: &Ensemble,
    t_model: &TriDiagonal,
    s_model: &TriDiagonal,
    operator: &BlockArray<Mat<c64>>,
    dims: Option<&BlockArray<f64>>,
    options: &AssemblyOptions,
) -> Result<SpectralWeights, FtlmError> {
    validate_beta(options.beta)?;
    t_model.diag().check_ensemble(ensemble)?;
    t_model.diag().check_same_blocks(s_model.diag())?;
    t_model.diag().check_same_blocks(operator)?;

    let e0 = t_model.e0()?;
    log::info!("e0: {e0}");

    // Shifting by the global ground energy keeps exp(-βT/2) bounded by one.
    let t_shifted = t_model.shifted(e0);
    let s_shifted = s_model.shifted(e0);

    let (d, q) = t_shifted.eig()?;
    let (e, r) = s_shifted.eig()?;

    log::debug!("computing boltzmann vectors");
    let b = t_shifted.dense().expm_symmetric(-options.beta / 2.0)?.column(0)?;
    let b_tilde = q.transpose().apply(&b)?;

    let norms = b.dot(&b)?;
    let norms = match dims {
        Some(dims) => norms.try_scale(dims)?,
        None => norms,
    };
    let partition = norms.degeneracy_sum(ensemble)?;
    log::info!("partition: {partition}");
    if !(partition > 0.0) {
        return Err(FtlmErrorKind::InvalidParameter(format!(
            "partition function must be positive, got {partition}"
        ))
        .into());
    }

    log::debug!("computing A_tilde");
    check_operator_shapes(operator, &q, &r)?;
    let a_tilde = r.transpose().to_complex().matmul(operator)?.matmul(&q.to_complex())?;

    let mut block_weights = Vec::with_capacity(ensemble.len());
    let mut block_poles = Vec::with_capacity(ensemble.len());
    for (block, deg) in ensemble.iter() {
        let factors = BlockFactors {
            b_tilde: block_value(&b_tilde, block)?.clone(),
            a_tilde: block_value(&a_tilde, block)?.clone(),
            d: block_value(&d, block)?.clone(),
            e: block_value(&e, block)?.clone(),
        };
        let dim = match dims {
            Some(dims) => *block_value(dims, block)?,
            None => 1.0,
        };
        let prefactor = 2.0 * PI * deg as f64 * dim / partition;
        let w = weight_tensor(&factors, prefactor);
        let p = pole_tensor(&factors);
        if w.len() != p.len() {
            return Err(FtlmErrorKind::InternalInconsistency {
                block: block.clone(),
                weights: w.len(),
                poles: p.len(),
            }
            .into());
        }
        block_weights.push((block.clone(), w));
        block_poles.push((block.clone(), p));
    }

    // Degeneracies are already part of the weights, so blocks are not repeated.
    let weights = BlockArray::from_blocks(block_weights).concatenate(ensemble, false)?;
    let poles = BlockArray::from_blocks(block_poles).concatenate(ensemble, false)?;

    let mut spectral = SpectralWeights {
        poles,
        weights,
        partition,
        e0,
    };
    log::info!("npoles: {}", spectral.len());

    if let Some(cutoff) = options.cutoff {
        spectral.truncate(cutoff);
        log::info!("npoles ({cutoff:.1e}): {}", spectral.len());
    }
    spectral.sort_by_pole();

    let residue = spectral.imaginary_residue();
    let scale = spectral.total_weight().norm().max(f64::MIN_POSITIVE);
    if residue / scale > IMAGINARY_RESIDUE_WARNING {
        log::warn!("imaginary part norm of weights is {residue:.3e}");
    } else {
        log::debug!("imaginary part norm: {residue:.3e}");
    }
    Ok(spectral)
}

fn validate_beta(beta: f64) -> Result<(), FtlmError> {
    if beta.is_finite() && beta > 0.0 {
        Ok(())
    } else {
        Err(FtlmErrorKind::InvalidParameter(format!(
            "inverse temperature must be positive and finite, got {beta}"
        ))
        .into())
    }
}

fn block_value<'a, V>(array: &'a BlockArray<V>, block: &BlockLabel) -> Result<&'a V, FtlmError> {
    array.get(block).ok_or_else(|| {
        FtlmErrorKind::BlockMismatch {
            left: array.labels().cloned().collect(),
            right: vec![block.clone()],
        }
        .into()
    })
}

/// The operator matrix of every block must map the T-basis onto the S-basis.
fn check_operator_shapes(
    operator: &BlockArray<Mat<c64>>,
    q: &BlockArray<Mat<f64>>,
    r: &BlockArray<Mat<f64>>,
) -> Result<(), FtlmError> {
    for (block, a) in operator.iter() {
        let expected = (block_value(r, block)?.nrows(), block_value(q, block)?.nrows());
        let actual = (a.nrows(), a.ncols());
        if expected != actual {
            return Err(FtlmErrorKind::ShapeMismatch {
                block: block.clone(),
                expected,
                actual,
            }
            .into());
        }
    }
    Ok(())
}

/// Flattened `prefactor · conj(b̃_a) conj(Ã_ba) Ã_bc b̃_c`, index `(a, b, c)` row-major.
fn weight_tensor(f: &BlockFactors, prefactor: f64) -> Vec<c64> {
    let (n_s, n_t) = (f.a_tilde.nrows(), f.a_tilde.ncols());
    let mut out = Vec::with_capacity(n_t * n_s * n_t);
    for a in 0..n_t {
        // b̃ is real, so its conjugate is itself.
        let left = f.b_tilde[a] * prefactor;
        for b in 0..n_s {
            let left_ab = f.a_tilde[(b, a)].conj() * left;
            for c in 0..n_t {
                out.push(left_ab * f.a_tilde[(b, c)] * f.b_tilde[c]);
            }
        }
    }
    out
}

/// Flattened `e_b − (d_a + d_c)/2`, aligned with [`weight_tensor`].
fn pole_tensor(f: &BlockFactors) -> Vec<f64> {
    let mut out = Vec::with_capacity(f.d.len() * f.e.len() * f.d.len());
    for &d_a in &f.d {
        for &e_b in &f.e {
            for &d_c in &f.d {
                out.push(e_b - 0.5 * (d_a + d_c));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_block_models() -> (Ensemble, TriDiagonal, TriDiagonal) {
        let ensemble = Ensemble::from_blocks([("a", 2), ("b", 1)]).unwrap();
        let t = TriDiagonal::new(
            BlockArray::from_blocks([("a", vec![0.0, 1.0]), ("b", vec![0.5])]),
            BlockArray::from_blocks([("a", vec![0.3]), ("b", vec![])]),
        )
        .unwrap();
        let s = TriDiagonal::new(
            BlockArray::from_blocks([("a", vec![0.2, 0.9]), ("b", vec![1.5])]),
            BlockArray::from_blocks([("a", vec![0.4]), ("b", vec![])]),
        )
        .unwrap();
        (ensemble, t, s)
    }

    fn identity_operator() -> BlockArray<Mat<c64>> {
        let eye = |n: usize| {
            Mat::from_fn(n, n, |i, j| c64::new(if i == j { 1.0 } else { 0.0 }, 0.0))
        };
        BlockArray::from_blocks([("a", eye(2)), ("b", eye(1))])
    }

    #[test]
    fn test_pole_and_weight_counts() {
        let (ensemble, t, s) = two_block_models();
        let result = assemble_spectral_weights(
            &ensemble,
            &t,
            &s,
            &identity_operator(),
            None,
            &AssemblyOptions::at_temperature(1.0),
        )
        .unwrap();
        // 2 * 2 * 2 for block a, 1 for block b.
        assert_eq!(result.len(), 9);
        assert_eq!(result.weights.len(), result.poles.len());
        assert!(result.is_sorted());
    }

    #[test]
    fn test_trivial_block_pole_and_weight() {
        let ensemble = Ensemble::from_blocks([("b", 3)]).unwrap();
        let t = TriDiagonal::new(
            BlockArray::from_blocks([("b", vec![0.5])]),
            BlockArray::from_blocks([("b", vec![])]),
        )
        .unwrap();
        let s = TriDiagonal::new(
            BlockArray::from_blocks([("b", vec![2.0])]),
            BlockArray::from_blocks([("b", vec![])]),
        )
        .unwrap();
        let operator = BlockArray::from_blocks([("b", Mat::from_fn(1, 1, |_, _| c64::new(0.0, 2.0)))]);
        let result = assemble_spectral_weights(
            &ensemble,
            &t,
            &s,
            &operator,
            None,
            &AssemblyOptions::at_temperature(0.5),
        )
        .unwrap();
        // e0 = 0.5: b = 1, Z = 3, pole = 2.0 - 0.5, weight = 2π · 3 · |2i|² / 3.
        assert!((result.partition - 3.0).abs() < 1e-12);
        assert!((result.poles[0] - 1.5).abs() < 1e-12);
        assert!((result.weights[0].re - 8.0 * PI).abs() < 1e-10);
        assert!(result.weights[0].im.abs() < 1e-12);
    }

    #[test]
    fn test_dimension_weighting() {
        let (ensemble, t, s) = two_block_models();
        let options = AssemblyOptions::at_temperature(1.0);
        let plain =
            assemble_spectral_weights(&ensemble, &t, &s, &identity_operator(), None, &options).unwrap();
        let ones = BlockArray::from_blocks([("a", 1.0), ("b", 1.0)]);
        let unit =
            assemble_spectral_weights(&ensemble, &t, &s, &identity_operator(), Some(&ones), &options)
                .unwrap();
        assert_eq!(plain, unit);

        // Uniform dimensions rescale the partition but not the normalised weights.
        let tens = BlockArray::from_blocks([("a", 10.0), ("b", 10.0)]);
        let scaled =
            assemble_spectral_weights(&ensemble, &t, &s, &identity_operator(), Some(&tens), &options)
                .unwrap();
        assert!((scaled.partition - 10.0 * plain.partition).abs() < 1e-10);
        for (x, y) in scaled.weights.iter().zip(&plain.weights) {
            assert!((x - y).norm() < 1e-12);
        }
    }

    #[test]
    fn test_operator_shape_checked() {
        let (ensemble, t, s) = two_block_models();
        let operator = BlockArray::from_blocks([
            ("a", Mat::<c64>::zeros(2, 3)),
            ("b", Mat::<c64>::zeros(1, 1)),
        ]);
        let err = assemble_spectral_weights(
            &ensemble,
            &t,
            &s,
            &operator,
            None,
            &AssemblyOptions::at_temperature(1.0),
        )
        .unwrap_err();
        assert!(matches!(err.kind(), FtlmErrorKind::ShapeMismatch { .. }));
    }

    #[test]
    fn test_mismatched_recursions_rejected() {
        let (ensemble, t, _) = two_block_models();
        let s = TriDiagonal::new(
            BlockArray::from_blocks([("a", vec![0.2])]),
            BlockArray::from_blocks([("a", vec![])]),
        )
        .unwrap();
        let err = assemble_spectral_weights(
            &ensemble,
            &t,
            &s,
            &identity_operator(),
            None,
            &AssemblyOptions::at_temperature(1.0),
        )
        .unwrap_err();
        assert!(matches!(err.kind(), FtlmErrorKind::BlockMismatch { .. }));
    }

    #[test]
    fn test_invalid_temperature() {
        let (ensemble, t, s) = two_block_models();
        let options = AssemblyOptions {
            beta: -1.0,
            cutoff: None,
        };
        let err = assemble_spectral_weights(&ensemble, &t, &s, &identity_operator(), None, &options)
            .unwrap_err();
        assert!(matches!(err.kind(), FtlmErrorKind::InvalidParameter(_)));
    }

    #[test]
    fn test_truncate_and_sort() {
        let mut weights = SpectralWeights {
            poles: vec![3.0, -1.0, 2.0, 0.5],
            weights: vec![
                c64::new(0.1, 0.0),
                c64::new(1e-14, 0.0),
                c64::new(0.0, 0.3),
                c64::new(0.2, 0.0),
            ],
            partition: 1.0,
            e0: 0.0,
        };
        weights.truncate(1e-10);
        assert_eq!(weights.poles, [3.0, 2.0, 0.5]);
        weights.sort_by_pole();
        assert_eq!(weights.poles, [0.5, 2.0, 3.0]);
        assert_eq!(weights.real_weights(), [0.2, 0.0, 0.1]);
        assert!((weights.imaginary_residue() - 0.3).abs() < 1e-15);
    }
}
