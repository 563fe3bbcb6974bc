//! Per-block tridiagonal matrices produced by a Lanczos recursion.
//!
//! The symmetric Lanczos process generates, for every block, two sequences of
//! scalars `alphas` (α_j) and `betas` (β_j) defining the real symmetric
//! tridiagonal matrix
//!
//! ```text
//!     T = | α_1 β_1  0  ... |
//!         | β_1 α_2 β_2 ... |
//!         |  0  β_2 α_3 ... |
//!         | ... ... ... ... |
//! ```
//!
//! A [`TriDiagonal`] holds these coefficients for all blocks of an ensemble and
//! derives dense matrices and eigendecompositions on demand. Nothing derived is
//! cached: every call recomputes from the coefficients, and [`TriDiagonal::truncated`]
//! and [`TriDiagonal::shifted`] return fresh instances, so repeated truncation
//! experiments on the same data never share state.

use crate::{
    block_array::{BlockArray, eigh},
    ensemble::Ensemble,
    error::{FtlmError, FtlmErrorKind},
    utils::data_source::SectorDataSource,
};
use faer::Mat;

/// Lanczos coefficients of every block.
#[derive(Debug, Clone, PartialEq)]
pub struct TriDiagonal {
    diag: BlockArray<Vec<f64>>,
    offdiag: BlockArray<Vec<f64>>,
}

/// Assembles the dense symmetric tridiagonal matrix from its coefficients.
pub fn assemble_tridiagonal(alphas: &[f64], betas: &[f64]) -> Mat<f64> {
    let steps = alphas.len();
    let mut t_k = Mat::zeros(steps, steps);
    for (i, &alpha) in alphas.iter().enumerate() {
        t_k[(i, i)] = alpha;
    }
    for (i, &beta) in betas.iter().enumerate().take(steps.saturating_sub(1)) {
        t_k[(i, i + 1)] = beta;
        t_k[(i + 1, i)] = beta;
    }
    t_k
}

impl TriDiagonal {
    /// Builds the model from diagonal and off-diagonal coefficients.
    ///
    /// Both arrays must cover the same blocks; in every block the diagonal must be
    /// non-empty and the off-diagonal exactly one entry shorter.
    pub fn new(diag: BlockArray<Vec<f64>>, offdiag: BlockArray<Vec<f64>>) -> Result<Self, FtlmError> {
        diag.zip_with(&offdiag, |block, d, o| {
            if d.is_empty() || o.len() + 1 != d.len() {
                return Err(FtlmErrorKind::InvalidTridiagonal {
                    block: block.clone(),
                    diag: d.len(),
                    offdiag: o.len(),
                }
                .into());
            }
            Ok(())
        })?;
        Ok(Self { diag, offdiag })
    }

    /// Reads the coefficients of every block of `ensemble` from `source`.
    ///
    /// Lanczos codes commonly store the residual norm of the last step as a final
    /// beta; an off-diagonal as long as the diagonal is therefore cut by one.
    pub fn load(
        ensemble: &Ensemble,
        source: &impl SectorDataSource,
        diag_tag: &str,
        offdiag_tag: &str,
    ) -> Result<Self, FtlmError> {
        let diag = BlockArray::<Vec<f64>>::load(ensemble, source, diag_tag)?;
        let offdiag = BlockArray::<Vec<f64>>::load(ensemble, source, offdiag_tag)?;
        let offdiag = diag.zip_with(&offdiag, |block, d, o| {
            if !d.is_empty() && o.len() == d.len() {
                log::debug!("dropping trailing residual '{offdiag_tag}' entry of block {block}");
                Ok(o[..o.len() - 1].to_vec())
            } else {
                Ok(o.clone())
            }
        })?;
        Self::new(diag, offdiag)
    }

    pub fn diag(&self) -> &BlockArray<Vec<f64>> {
        &self.diag
    }

    pub fn offdiag(&self) -> &BlockArray<Vec<f64>> {
        &self.offdiag
    }

    /// Recursion length of every block.
    pub fn sizes(&self) -> BlockArray<usize> {
        self.diag.map(Vec::len)
    }

    /// Dense tridiagonal matrix of every block.
    pub fn dense(&self) -> BlockArray<Mat<f64>> {
        // `new` checked that both arrays cover the same blocks.
        BlockArray::from_blocks(
            self.diag
                .iter()
                .zip(self.offdiag.iter())
                .map(|((block, d), (_, o))| (block.clone(), assemble_tridiagonal(d, o))),
        )
    }

    /// Full eigendecomposition of every block.
    ///
    /// Returns the ascending eigenvalues and the matrix whose columns are the
    /// corresponding eigenvectors.
    pub fn eig(&self) -> Result<(BlockArray<Vec<f64>>, BlockArray<Mat<f64>>), FtlmError> {
        let pairs = self.dense().try_map(|block, t| eigh(block, t))?;
        let values = pairs.map(|(values, _)| values.clone());
        let vectors = pairs.map(|(_, vectors)| vectors.clone());
        Ok((values, vectors))
    }

    /// Lowest eigenvalue of every block.
    pub fn ground(&self) -> Result<BlockArray<f64>, FtlmError> {
        self.dense().try_map(|block, t| {
            let (values, _) = eigh(block, t)?;
            Ok(values[0])
        })
    }

    /// Global ground-state energy: the minimum of [`TriDiagonal::ground`] over blocks.
    pub fn e0(&self) -> Result<f64, FtlmError> {
        self.ground()?
            .iter()
            .map(|(_, &e)| e)
            .min_by(f64::total_cmp)
            .ok_or_else(|| FtlmErrorKind::InvalidParameter("tridiagonal model has no blocks".into()).into())
    }

    /// New model with every block cut to the first `len` recursion steps.
    ///
    /// Blocks whose recursion is already shorter are kept whole.
    pub fn truncated(&self, len: usize) -> Result<Self, FtlmError> {
        if len == 0 {
            return Err(FtlmErrorKind::InvalidParameter(
                "recursion length must be at least 1".into(),
            )
            .into());
        }
        Self::new(self.diag.truncated(len), self.offdiag.truncated(len - 1))
    }

    /// New model representing `T - shift * 1`.
    pub fn shifted(&self, shift: f64) -> Self {
        Self {
            diag: self.diag.shifted(shift),
            offdiag: self.offdiag.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::BlockLabel;
    use faer::mat;

    fn single(diag: Vec<f64>, offdiag: Vec<f64>) -> TriDiagonal {
        TriDiagonal::new(
            BlockArray::from_blocks([("a", diag)]),
            BlockArray::from_blocks([("a", offdiag)]),
        )
        .unwrap()
    }

    #[test]
    fn test_dense_matrix() {
        let t = single(vec![1.0, 2.0, 3.0], vec![0.5, 0.5]);
        let dense = t.dense();
        let expected: Mat<f64> = mat![[1.0, 0.5, 0.0], [0.5, 2.0, 0.5], [0.0, 0.5, 3.0]];
        assert_eq!(dense.get(&BlockLabel::from("a")), Some(&expected));
    }

    #[test]
    fn test_two_by_two_eigenvalues() {
        // [[a, b], [b, c]] has eigenvalues (a + c)/2 -+ sqrt(((a - c)/2)^2 + b^2).
        let t = single(vec![0.0, 1.0], vec![0.3]);
        let (values, vectors) = t.eig().unwrap();
        let values = values.get(&"a".into()).unwrap();
        let r = (0.25f64 + 0.09).sqrt();
        assert!((values[0] - (0.5 - r)).abs() < 1e-12);
        assert!((values[1] - (0.5 + r)).abs() < 1e-12);

        // Eigenvectors are orthonormal.
        let q = vectors.get(&"a".into()).unwrap();
        let qtq = q.transpose() * q;
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((qtq[(i, j)] - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_ground_and_global_e0() {
        let t = TriDiagonal::new(
            BlockArray::from_blocks([("a", vec![0.0, 1.0]), ("b", vec![0.2])]),
            BlockArray::from_blocks([("a", vec![0.3]), ("b", vec![])]),
        )
        .unwrap();
        let ground = t.ground().unwrap();
        assert_eq!(ground.get(&"b".into()), Some(&0.2));
        // Block a dips below block b.
        assert!((ground.get(&"a".into()).copied().unwrap() - (0.5 - 0.34f64.sqrt())).abs() < 1e-12);
        let e0_a = 0.5 - (0.25f64 + 0.09).sqrt();
        assert!((t.e0().unwrap() - e0_a).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_lengths_rejected() {
        let err = TriDiagonal::new(
            BlockArray::from_blocks([("a", vec![1.0, 2.0])]),
            BlockArray::from_blocks([("a", vec![0.1, 0.2])]),
        )
        .unwrap_err();
        assert!(matches!(err.kind(), FtlmErrorKind::InvalidTridiagonal { diag: 2, offdiag: 2, .. }));

        let err = TriDiagonal::new(
            BlockArray::from_blocks([("a", vec![])]),
            BlockArray::from_blocks([("a", vec![])]),
        )
        .unwrap_err();
        assert!(matches!(err.kind(), FtlmErrorKind::InvalidTridiagonal { diag: 0, .. }));
    }

    #[test]
    fn test_mismatched_blocks_rejected() {
        let err = TriDiagonal::new(
            BlockArray::from_blocks([("a", vec![1.0])]),
            BlockArray::from_blocks([("b", vec![])]),
        )
        .unwrap_err();
        assert!(matches!(err.kind(), FtlmErrorKind::BlockMismatch { .. }));
    }

    #[test]
    fn test_truncation_is_independent() {
        let t = single(vec![1.0, 2.0, 3.0, 4.0], vec![0.5, 0.6, 0.7]);
        let short = t.truncated(2).unwrap();
        assert_eq!(short.diag().get(&"a".into()), Some(&vec![1.0, 2.0]));
        assert_eq!(short.offdiag().get(&"a".into()), Some(&vec![0.5]));

        // The original keeps its full eigen-spectrum.
        let (full, _) = t.eig().unwrap();
        let (cut, _) = short.eig().unwrap();
        assert_eq!(full.get(&"a".into()).unwrap().len(), 4);
        assert_eq!(cut.get(&"a".into()).unwrap().len(), 2);

        // Longer than the recursion: unchanged.
        assert_eq!(t.truncated(10).unwrap(), t);
        assert!(t.truncated(0).is_err());
    }

    #[test]
    fn test_shift_moves_spectrum() {
        let t = single(vec![1.0, 2.0, 3.0], vec![0.5, 0.5]);
        let (values, _) = t.eig().unwrap();
        let (shifted, _) = t.shifted(1.5).eig().unwrap();
        for (a, b) in values.get(&"a".into()).unwrap().iter().zip(shifted.get(&"a".into()).unwrap()) {
            assert!((a - 1.5 - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_load_drops_residual_beta() {
        use crate::utils::data_source::{MemorySource, SectorArray};
        let ensemble = Ensemble::from_blocks([("a", 1)]).unwrap();
        let source = MemorySource::new()
            .with("a", "AlphasT", SectorArray::Vector(vec![1.0, 2.0]))
            .with("a", "BetasT", SectorArray::Vector(vec![0.5, 1e-3]));
        let t = TriDiagonal::load(&ensemble, &source, "AlphasT", "BetasT").unwrap();
        assert_eq!(t.offdiag().get(&"a".into()), Some(&vec![0.5]));
    }
}
