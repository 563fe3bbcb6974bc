//! Thermodynamic moments from the T-recursion alone.
//!
//! For the Boltzmann vector `b = exp(−β (T − e0) / 2) e_1` of every block, the
//! degeneracy-weighted sums
//!
//! ```text
//!     Z  = Σ deg · dim · bᵀb
//!     E  = Σ deg · dim · bᵀ T b
//!     E2 = Σ deg · dim · bᵀ T² b
//! ```
//!
//! are the partition function and the unnormalised first and second energy moments
//! at temperature `1/β`. `T` is unshifted in `E` and `E2`, so `E/Z` is an absolute
//! energy while `Z` carries the factor `exp(β e0)`.

use crate::{
    block_array::BlockArray,
    ensemble::Ensemble,
    error::{FtlmError, FtlmErrorKind},
    tridiagonal::TriDiagonal,
};
use faer::Mat;
use serde::{Deserialize, Serialize};

/// Unnormalised moments at one temperature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawMoments {
    pub temperature: f64,
    /// Ground-state energy the Boltzmann factors are measured from.
    pub e0: f64,
    pub partition: f64,
    pub energy: f64,
    pub energy2: f64,
}

/// One row of the moments table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentsRow {
    pub temperature: f64,
    pub partition: f64,
    pub energy: f64,
    pub energy2: f64,
    pub specific_heat: f64,
}

impl RawMoments {
    /// Intensive expectation values `⟨E⟩ = E/Z`, `⟨E²⟩ = E2/Z` and the specific heat
    /// `C = β² (⟨E²⟩ − ⟨E⟩²)`.
    pub fn normalized(&self) -> MomentsRow {
        let beta = 1.0 / self.temperature;
        let energy = self.energy / self.partition;
        let energy2 = self.energy2 / self.partition;
        MomentsRow {
            temperature: self.temperature,
            partition: self.partition,
            energy,
            energy2,
            specific_heat: beta * beta * (energy2 - energy * energy),
        }
    }

    /// Moments re-expressed relative to a lower ground-state energy `e0`.
    fn rebased(&self, e0: f64) -> Self {
        let factor = (-(self.e0 - e0) / self.temperature).exp();
        Self {
            temperature: self.temperature,
            e0,
            partition: self.partition * factor,
            energy: self.energy * factor,
            energy2: self.energy2 * factor,
        }
    }
}

/// `exp(−β Λ / 2)` applied to `e_1` in the eigenbasis `(values, vectors)` of every block.
pub(crate) fn boltzmann_vectors(
    values: &BlockArray<Vec<f64>>,
    vectors: &BlockArray<Mat<f64>>,
    beta: f64,
) -> Result<BlockArray<Vec<f64>>, FtlmError> {
    values.zip_with(vectors, |_, d, q| {
        let n = d.len();
        let weights: Vec<f64> = (0..n).map(|k| (-0.5 * beta * d[k]).exp() * q[(0, k)]).collect();
        Ok((0..n)
            .map(|i| (0..n).map(|k| q[(i, k)] * weights[k]).sum())
            .collect())
    })
}

/// Computes [`RawMoments`] at every temperature of `temperatures`.
pub fn thermodynamic_moments(
    ensemble: &Ensemble,
    t_model: &TriDiagonal,
    dims: Option<&BlockArray<f64>>,
    temperatures: &[f64],
) -> Result<Vec<RawMoments>, FtlmError> {
    if let Some(&t) = temperatures.iter().find(|t| !(t.is_finite() && **t > 0.0)) {
        return Err(FtlmErrorKind::InvalidParameter(format!(
            "temperatures must be positive and finite, got {t}"
        ))
        .into());
    }
    t_model.diag().check_ensemble(ensemble)?;

    let e0 = t_model.e0()?;
    log::info!("e0: {e0}");
    let t = t_model.dense();
    let (d, q) = t_model.shifted(e0).eig()?;

    let weighted_sum = |values: BlockArray<f64>| -> Result<f64, FtlmError> {
        match dims {
            Some(dims) => values.try_scale(dims)?.degeneracy_sum(ensemble),
            None => values.degeneracy_sum(ensemble),
        }
    };

    temperatures
        .iter()
        .map(|&temperature| {
            let b = boltzmann_vectors(&d, &q, 1.0 / temperature)?;
            let tb = t.apply(&b)?;
            let moments = RawMoments {
                temperature,
                e0,
                partition: weighted_sum(b.dot(&b)?)?,
                energy: weighted_sum(b.dot(&tb)?)?,
                // T is symmetric: bᵀT²b = (Tb)ᵀ(Tb).
                energy2: weighted_sum(tb.dot(&tb)?)?,
            };
            log::debug!("{moments:?}");
            Ok(moments)
        })
        .collect()
}

/// Averages the moments of independent random starting vectors.
///
/// Every run must cover the same temperatures. Runs are first brought to the
/// lowest ground-state energy among them, since their Boltzmann factors are
/// measured from their own `e0`.
pub fn average_over_seeds(runs: &[Vec<RawMoments>]) -> Result<Vec<RawMoments>, FtlmError> {
    let Some(first) = runs.first() else {
        return Err(FtlmErrorKind::InvalidParameter("no runs to average".into()).into());
    };
    for run in runs {
        let same_grid = run.len() == first.len()
            && run.iter().zip(first).all(|(a, b)| a.temperature == b.temperature);
        if !same_grid {
            return Err(FtlmErrorKind::InvalidParameter(
                "runs cover different temperature grids".into(),
            )
            .into());
        }
    }

    let n_runs = runs.len() as f64;
    Ok((0..first.len())
        .map(|i| {
            let e0 = runs.iter().map(|run| run[i].e0).fold(f64::INFINITY, f64::min);
            let sum = runs.iter().map(|run| run[i].rebased(e0)).fold(
                RawMoments {
                    temperature: first[i].temperature,
                    e0,
                    partition: 0.0,
                    energy: 0.0,
                    energy2: 0.0,
                },
                |acc, m| RawMoments {
                    partition: acc.partition + m.partition,
                    energy: acc.energy + m.energy,
                    energy2: acc.energy2 + m.energy2,
                    ..acc
                },
            );
            RawMoments {
                partition: sum.partition / n_runs,
                energy: sum.energy / n_runs,
                energy2: sum.energy2 / n_runs,
                ..sum
            }
        })
        .collect())
}
