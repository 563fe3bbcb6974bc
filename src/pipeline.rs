//! High-level API: loads the per-block Lanczos data of an ensemble from a
//! [`SectorDataSource`] and runs the assembler or the moments computation on it.

use crate::{
    algorithms::{
        moments::{RawMoments, thermodynamic_moments},
        spectral::{AssemblyOptions, SpectralWeights, assemble_spectral_weights},
    },
    block_array::BlockArray,
    ensemble::Ensemble,
    error::{FtlmError, FtlmErrorKind},
    tridiagonal::TriDiagonal,
    utils::data_source::SectorDataSource,
};
use faer::{Mat, c64};
use serde::{Deserialize, Serialize};

/// Names under which the arrays of a block are stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecursionTags {
    pub t_diag: String,
    pub t_offdiag: String,
    pub s_diag: String,
    pub s_offdiag: String,
    pub operator: String,
    /// Hilbert-space dimension of every block. `None` disables dimension weighting.
    pub dims: Option<String>,
}

impl Default for RecursionTags {
    fn default() -> Self {
        Self {
            t_diag: "AlphasT".into(),
            t_offdiag: "BetasT".into(),
            s_diag: "AlphasS".into(),
            s_offdiag: "BetasS".into(),
            operator: "A".into(),
            dims: Some("DimK".into()),
        }
    }
}

fn load_dims(
    ensemble: &Ensemble,
    source: &impl SectorDataSource,
    tags: &RecursionTags,
) -> Result<Option<BlockArray<f64>>, FtlmError> {
    tags.dims
        .as_deref()
        .map(|tag| BlockArray::<f64>::load(ensemble, source, tag))
        .transpose()
}

/// Everything the spectral assembler needs for one random starting vector.
#[derive(Debug, Clone)]
pub struct FtlmInput {
    pub ensemble: Ensemble,
    pub t_model: TriDiagonal,
    pub s_model: TriDiagonal,
    pub operator: BlockArray<Mat<c64>>,
    pub dims: Option<BlockArray<f64>>,
}

impl FtlmInput {
    pub fn load(
        ensemble: &Ensemble,
        source: &impl SectorDataSource,
        tags: &RecursionTags,
    ) -> Result<Self, FtlmError> {
        let t_model = TriDiagonal::load(ensemble, source, &tags.t_diag, &tags.t_offdiag)?;
        let s_model = TriDiagonal::load(ensemble, source, &tags.s_diag, &tags.s_offdiag)?;
        let operator = BlockArray::<Mat<c64>>::load(ensemble, source, &tags.operator)?;
        let dims = load_dims(ensemble, source, tags)?;
        log::info!(
            "loaded {} blocks, recursion lengths T: {:?}",
            ensemble.len(),
            t_model.sizes().iter().map(|(_, n)| *n).collect::<Vec<_>>()
        );
        Ok(Self {
            ensemble: ensemble.clone(),
            t_model,
            s_model,
            operator,
            dims,
        })
    }

    /// Copy of the input restricted to the first `len` recursion steps of both
    /// recursions, with the operator matrix cut to match.
    pub fn with_recursion_length(&self, len: usize) -> Result<Self, FtlmError> {
        let t_model = self.t_model.truncated(len)?;
        let s_model = self.s_model.truncated(len)?;
        let operator = self.operator.truncated(len, len);
        Ok(Self {
            ensemble: self.ensemble.clone(),
            t_model,
            s_model,
            operator,
            dims: self.dims.clone(),
        })
    }

    pub fn spectral_weights(&self, options: &AssemblyOptions) -> Result<SpectralWeights, FtlmError> {
        assemble_spectral_weights(
            &self.ensemble,
            &self.t_model,
            &self.s_model,
            &self.operator,
            self.dims.as_ref(),
            options,
        )
    }
}

/// Input of the moments computation: only the T-recursion is needed.
#[derive(Debug, Clone)]
pub struct ThermodynamicsInput {
    pub ensemble: Ensemble,
    pub t_model: TriDiagonal,
    pub dims: Option<BlockArray<f64>>,
}

impl ThermodynamicsInput {
    pub fn load(
        ensemble: &Ensemble,
        source: &impl SectorDataSource,
        tags: &RecursionTags,
    ) -> Result<Self, FtlmError> {
        Ok(Self {
            ensemble: ensemble.clone(),
            t_model: TriDiagonal::load(ensemble, source, &tags.t_diag, &tags.t_offdiag)?,
            dims: load_dims(ensemble, source, tags)?,
        })
    }

    pub fn moments(&self, temperatures: &[f64]) -> Result<Vec<RawMoments>, FtlmError> {
        if temperatures.is_empty() {
            return Err(FtlmErrorKind::InvalidParameter("empty temperature grid".into()).into());
        }
        thermodynamic_moments(&self.ensemble, &self.t_model, self.dims.as_ref(), temperatures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::data_source::{MemorySource, SectorArray};
    use faer::mat;

    fn source() -> MemorySource {
        MemorySource::new()
            .with("a", "AlphasT", SectorArray::Vector(vec![0.0, 1.0, 2.0]))
            .with("a", "BetasT", SectorArray::Vector(vec![0.5, 0.5]))
            .with("a", "AlphasS", SectorArray::Vector(vec![0.5, 1.5]))
            .with("a", "BetasS", SectorArray::Vector(vec![0.2, 0.0]))
            .with(
                "a",
                "A",
                SectorArray::Matrix(mat![[1.0, 0.1, 0.0], [0.0, 0.3, 0.2]]),
            )
            .with("a", "DimK", SectorArray::Scalar(4.0))
    }

    #[test]
    fn test_load_full_input() {
        let ensemble = Ensemble::from_blocks([("a", 2)]).unwrap();
        let input = FtlmInput::load(&ensemble, &source(), &RecursionTags::default()).unwrap();
        assert_eq!(input.s_model.offdiag().get(&"a".into()), Some(&vec![0.2]));
        assert_eq!(input.dims.unwrap().get(&"a".into()), Some(&4.0));
    }

    #[test]
    fn test_missing_tag_is_reported() {
        let ensemble = Ensemble::from_blocks([("a", 1), ("b", 1)]).unwrap();
        let err = FtlmInput::load(&ensemble, &source(), &RecursionTags::default()).unwrap_err();
        assert!(matches!(err.kind(), FtlmErrorKind::MissingData { tag, .. } if tag == "AlphasT"));
    }

    #[test]
    fn test_without_dimension_tag() {
        let ensemble = Ensemble::from_blocks([("a", 1)]).unwrap();
        let tags = RecursionTags {
            dims: None,
            ..RecursionTags::default()
        };
        let input = ThermodynamicsInput::load(&ensemble, &source(), &tags).unwrap();
        assert!(input.dims.is_none());
        assert!(input.moments(&[]).is_err());
        assert_eq!(input.moments(&[1.0]).unwrap().len(), 1);
    }

    #[test]
    fn test_resized_input_assembles() {
        let ensemble = Ensemble::from_blocks([("a", 1)]).unwrap();
        let input = FtlmInput::load(&ensemble, &source(), &RecursionTags::default()).unwrap();
        let full = input.spectral_weights(&AssemblyOptions::at_temperature(1.0)).unwrap();
        assert_eq!(full.len(), 3 * 2 * 3);

        let short = input.with_recursion_length(1).unwrap();
        assert_eq!(short.operator.get(&"a".into()).unwrap().shape(), (1, 1));
        let weights = short.spectral_weights(&AssemblyOptions::at_temperature(1.0)).unwrap();
        assert_eq!(weights.len(), 1);
        // The original input is untouched.
        assert_eq!(input.t_model.sizes().get(&"a".into()), Some(&3));
    }
}
