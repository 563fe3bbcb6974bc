//! Block-structured numeric arrays.
//!
//! A [`BlockArray<V>`] maps every block of an [`Ensemble`] to a value of type `V`:
//! a scalar (`f64`, `c64`), a vector (`Vec<f64>`) or a matrix (`Mat<f64>`,
//! `Mat<c64>`). Shapes may differ from block to block, the element type may not.
//!
//! Operations act block by block. Binary operations require both operands to cover
//! exactly the same blocks and fail with [`FtlmErrorKind::BlockMismatch`] otherwise.
//! Blocks are combined with each other only through the two explicit reductions,
//! [`BlockArray::degeneracy_sum`] and [`BlockArray::concatenate`].

use crate::{
    ensemble::{BlockLabel, Ensemble},
    error::{FtlmError, FtlmErrorKind},
    utils::data_source::{SectorArray, SectorDataSource},
};
use faer::{Mat, Side, c64};
use std::{
    collections::BTreeMap,
    ops::{Add, Mul},
};

/// Mapping from block label to a per-block value.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockArray<V> {
    blocks: BTreeMap<BlockLabel, V>,
}

/// Conversion from a stored sector array into a typed block value.
///
/// This is where rank and element type are enforced: a tag expected to hold a
/// vector that turns out to hold a matrix is rejected here, once, rather than at
/// every later use.
pub trait FromSectorArray: Sized {
    /// Human-readable name of the expected kind.
    const EXPECTED: &'static str;

    /// Returns `None` if `array` has the wrong rank or element type.
    fn from_sector_array(array: SectorArray) -> Option<Self>;
}

impl FromSectorArray for f64 {
    const EXPECTED: &'static str = "real scalar";

    fn from_sector_array(array: SectorArray) -> Option<Self> {
        match array {
            SectorArray::Scalar(x) => Some(x),
            _ => None,
        }
    }
}

impl FromSectorArray for Vec<f64> {
    const EXPECTED: &'static str = "real vector";

    fn from_sector_array(array: SectorArray) -> Option<Self> {
        match array {
            SectorArray::Vector(v) => Some(v),
            _ => None,
        }
    }
}

impl FromSectorArray for Mat<f64> {
    const EXPECTED: &'static str = "real matrix";

    fn from_sector_array(array: SectorArray) -> Option<Self> {
        match array {
            SectorArray::Matrix(m) => Some(m),
            _ => None,
        }
    }
}

impl FromSectorArray for Mat<c64> {
    const EXPECTED: &'static str = "matrix";

    // Real matrices are promoted.
    fn from_sector_array(array: SectorArray) -> Option<Self> {
        match array {
            SectorArray::Matrix(m) => Some(to_complex(&m)),
            SectorArray::ComplexMatrix(m) => Some(m),
            _ => None,
        }
    }
}

impl<V> BlockArray<V> {
    /// Builds a block array from `(label, value)` pairs. Later duplicates win.
    pub fn from_blocks<I, L>(blocks: I) -> Self
    where
        I: IntoIterator<Item = (L, V)>,
        L: Into<BlockLabel>,
    {
        Self {
            blocks: blocks.into_iter().map(|(l, v)| (l.into(), v)).collect(),
        }
    }

    /// Reads the array tagged `tag` for every block of `ensemble`.
    ///
    /// Fails with [`FtlmErrorKind::MissingData`] if any block lacks the tag and with
    /// [`FtlmErrorKind::TypeMismatch`] if a stored array has the wrong rank.
    pub fn load(
        ensemble: &Ensemble,
        source: &impl SectorDataSource,
        tag: &str,
    ) -> Result<Self, FtlmError>
    where
        V: FromSectorArray,
    {
        let mut blocks = BTreeMap::new();
        for (block, _) in ensemble.iter() {
            let array = source
                .fetch(block, tag)
                .map_err(|e| FtlmErrorKind::DataSource(e.to_string()))?
                .ok_or_else(|| FtlmErrorKind::MissingData {
                    block: block.clone(),
                    tag: tag.to_string(),
                })?;
            let found = array.kind_name();
            let value = V::from_sector_array(array).ok_or_else(|| FtlmErrorKind::TypeMismatch {
                block: block.clone(),
                tag: tag.to_string(),
                expected: V::EXPECTED,
                found,
            })?;
            blocks.insert(block.clone(), value);
        }
        log::debug!("loaded '{tag}' for {} blocks", blocks.len());
        Ok(Self { blocks })
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, block: &BlockLabel) -> Option<&V> {
        self.blocks.get(block)
    }

    /// Labels in sorted order.
    pub fn labels(&self) -> impl Iterator<Item = &BlockLabel> + '_ {
        self.blocks.keys()
    }

    /// Iterates over `(label, value)` in sorted label order.
    pub fn iter(&self) -> impl Iterator<Item = (&BlockLabel, &V)> + '_ {
        self.blocks.iter()
    }

    /// Applies `f` to every block independently.
    pub fn map<W>(&self, mut f: impl FnMut(&V) -> W) -> BlockArray<W> {
        BlockArray {
            blocks: self.blocks.iter().map(|(l, v)| (l.clone(), f(v))).collect(),
        }
    }

    /// Fallible variant of [`BlockArray::map`]; the closure also sees the label.
    pub fn try_map<W>(
        &self,
        mut f: impl FnMut(&BlockLabel, &V) -> Result<W, FtlmError>,
    ) -> Result<BlockArray<W>, FtlmError> {
        let blocks = self
            .blocks
            .iter()
            .map(|(l, v)| Ok((l.clone(), f(l, v)?)))
            .collect::<Result<_, FtlmError>>()?;
        Ok(BlockArray { blocks })
    }

    /// Combines two arrays covering the same blocks, block by block.
    pub fn zip_with<U, W>(
        &self,
        other: &BlockArray<U>,
        mut f: impl FnMut(&BlockLabel, &V, &U) -> Result<W, FtlmError>,
    ) -> Result<BlockArray<W>, FtlmError> {
        self.check_same_blocks(other)?;
        let blocks = self
            .blocks
            .iter()
            .zip(other.blocks.values())
            .map(|((l, a), b)| Ok((l.clone(), f(l, a, b)?)))
            .collect::<Result<_, FtlmError>>()?;
        Ok(BlockArray { blocks })
    }

    /// Fails with [`FtlmErrorKind::BlockMismatch`] unless both arrays cover the same blocks.
    pub fn check_same_blocks<U>(&self, other: &BlockArray<U>) -> Result<(), FtlmError> {
        if self.blocks.keys().eq(other.blocks.keys()) {
            Ok(())
        } else {
            Err(FtlmErrorKind::BlockMismatch {
                left: self.blocks.keys().cloned().collect(),
                right: other.blocks.keys().cloned().collect(),
            }
            .into())
        }
    }

    /// Fails with [`FtlmErrorKind::BlockMismatch`] unless the array covers exactly
    /// the blocks of `ensemble`.
    pub fn check_ensemble(&self, ensemble: &Ensemble) -> Result<(), FtlmError> {
        let covers = self.blocks.len() == ensemble.len()
            && self.blocks.keys().all(|l| ensemble.contains(l));
        if covers {
            Ok(())
        } else {
            let mut expected: Vec<BlockLabel> = ensemble.labels().cloned().collect();
            expected.sort();
            Err(FtlmErrorKind::BlockMismatch {
                left: self.blocks.keys().cloned().collect(),
                right: expected,
            }
            .into())
        }
    }

    /// Block values in the iteration order of `ensemble`, paired with their degeneracy.
    pub fn in_ensemble_order<'a>(
        &'a self,
        ensemble: &'a Ensemble,
    ) -> Result<Vec<(&'a BlockLabel, u64, &'a V)>, FtlmError> {
        self.check_ensemble(ensemble)?;
        Ok(ensemble
            .iter()
            .filter_map(|(label, deg)| self.blocks.get(label).map(|v| (label, deg, v)))
            .collect())
    }
}

impl<V> BlockArray<V>
where
    V: Copy + Default + Add<Output = V> + Mul<f64, Output = V>,
{
    /// Block-wise sum.
    pub fn try_add(&self, other: &Self) -> Result<Self, FtlmError> {
        self.zip_with(other, |_, a, b| Ok(*a + *b))
    }

    /// Multiplies every block by the real scalar of `other`'s matching block.
    pub fn try_scale(&self, other: &BlockArray<f64>) -> Result<Self, FtlmError> {
        self.zip_with(other, |_, a, b| Ok(*a * *b))
    }

    /// Degeneracy-weighted sum across blocks: `Σ_block deg(block) * value(block)`.
    ///
    /// Symmetry-equivalent blocks are stored once, so every extensive quantity must
    /// be summed with the multiplicities of the ensemble.
    pub fn degeneracy_sum(&self, ensemble: &Ensemble) -> Result<V, FtlmError> {
        Ok(self
            .in_ensemble_order(ensemble)?
            .into_iter()
            .fold(V::default(), |acc, (_, deg, v)| acc + *v * deg as f64))
    }
}

impl<T: Clone> BlockArray<Vec<T>> {
    /// Flattens all blocks into one array, in the order of `ensemble`.
    ///
    /// With `repeat_degenerate` set, each block's values appear `deg` times.
    pub fn concatenate(&self, ensemble: &Ensemble, repeat_degenerate: bool) -> Result<Vec<T>, FtlmError> {
        let mut flat = Vec::new();
        for (_, deg, values) in self.in_ensemble_order(ensemble)? {
            let copies = if repeat_degenerate { deg } else { 1 };
            for _ in 0..copies {
                flat.extend_from_slice(values);
            }
        }
        Ok(flat)
    }

    /// Keeps the first `len` entries of every block; shorter blocks are kept whole.
    pub fn truncated(&self, len: usize) -> Self {
        self.map(|v| v[..len.min(v.len())].to_vec())
    }
}

impl BlockArray<Vec<f64>> {
    /// Block-wise dot product.
    pub fn dot(&self, other: &Self) -> Result<BlockArray<f64>, FtlmError> {
        self.zip_with(other, |block, a, b| {
            if a.len() != b.len() {
                return Err(FtlmErrorKind::ShapeMismatch {
                    block: block.clone(),
                    expected: (a.len(), 1),
                    actual: (b.len(), 1),
                }
                .into());
            }
            Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
        })
    }

    /// Block-wise outer combination `out[i, j] = f(self[i], other[j])`.
    pub fn outer_with(
        &self,
        other: &Self,
        f: impl Fn(f64, f64) -> f64,
    ) -> Result<BlockArray<Mat<f64>>, FtlmError> {
        self.zip_with(other, |_, a, b| {
            Ok(Mat::from_fn(a.len(), b.len(), |i, j| f(a[i], b[j])))
        })
    }

    /// Outer sum `out[i, j] = self[i] + other[j]`.
    pub fn add_outer(&self, other: &Self) -> Result<BlockArray<Mat<f64>>, FtlmError> {
        self.outer_with(other, |x, y| x + y)
    }

    /// Outer difference `out[i, j] = self[i] - other[j]`.
    pub fn sub_outer(&self, other: &Self) -> Result<BlockArray<Mat<f64>>, FtlmError> {
        self.outer_with(other, |x, y| x - y)
    }

    /// Subtracts `shift` from every entry.
    pub fn shifted(&self, shift: f64) -> Self {
        self.map(|v| v.iter().map(|x| x - shift).collect())
    }
}

impl BlockArray<Mat<f64>> {
    pub fn transpose(&self) -> Self {
        self.map(|m| Mat::from_fn(m.ncols(), m.nrows(), |i, j| m[(j, i)]))
    }

    /// Extracts column `j` of every block.
    pub fn column(&self, j: usize) -> Result<BlockArray<Vec<f64>>, FtlmError> {
        self.try_map(|block, m| {
            if j >= m.ncols() {
                return Err(FtlmErrorKind::ShapeMismatch {
                    block: block.clone(),
                    expected: (m.nrows(), j + 1),
                    actual: (m.nrows(), m.ncols()),
                }
                .into());
            }
            Ok((0..m.nrows()).map(|i| m[(i, j)]).collect())
        })
    }

    /// Block-wise matrix-vector product.
    pub fn apply(&self, vectors: &BlockArray<Vec<f64>>) -> Result<BlockArray<Vec<f64>>, FtlmError> {
        self.zip_with(vectors, |block, m, v| {
            if m.ncols() != v.len() {
                return Err(FtlmErrorKind::ShapeMismatch {
                    block: block.clone(),
                    expected: (m.ncols(), 1),
                    actual: (v.len(), 1),
                }
                .into());
            }
            Ok((0..m.nrows())
                .map(|i| (0..m.ncols()).map(|j| m[(i, j)] * v[j]).sum())
                .collect())
        })
    }

    /// Block-wise `exp(scale * M)` of symmetric matrices, via their eigendecomposition.
    pub fn expm_symmetric(&self, scale: f64) -> Result<Self, FtlmError> {
        self.try_map(|block, m| {
            let (values, vectors) = eigh(block, m)?;
            let n = values.len();
            let f_d = Mat::from_fn(n, n, |i, j| {
                if i == j { (scale * values[i]).exp() } else { 0.0 }
            });
            Ok(&vectors * &f_d * vectors.transpose())
        })
    }

    /// Keeps the leading `rows x cols` corner of every block, clamped to the block shape.
    pub fn truncated(&self, rows: usize, cols: usize) -> Self {
        self.map(|m| {
            let (r, c) = (rows.min(m.nrows()), cols.min(m.ncols()));
            Mat::from_fn(r, c, |i, j| m[(i, j)])
        })
    }

    pub fn to_complex(&self) -> BlockArray<Mat<c64>> {
        self.map(to_complex)
    }
}

impl BlockArray<Mat<c64>> {
    pub fn transpose(&self) -> Self {
        self.map(|m| Mat::from_fn(m.ncols(), m.nrows(), |i, j| m[(j, i)]))
    }

    pub fn conj(&self) -> Self {
        self.map(|m| Mat::from_fn(m.nrows(), m.ncols(), |i, j| m[(i, j)].conj()))
    }

    /// Block-wise matrix product `self * other`.
    pub fn matmul(&self, other: &Self) -> Result<Self, FtlmError> {
        self.zip_with(other, |block, a, b| {
            if a.ncols() != b.nrows() {
                return Err(FtlmErrorKind::ShapeMismatch {
                    block: block.clone(),
                    expected: (a.ncols(), b.ncols()),
                    actual: (b.nrows(), b.ncols()),
                }
                .into());
            }
            Ok(a * b)
        })
    }

    /// Keeps the leading `rows x cols` corner of every block, clamped to the block shape.
    pub fn truncated(&self, rows: usize, cols: usize) -> Self {
        self.map(|m| {
            let (r, c) = (rows.min(m.nrows()), cols.min(m.ncols()));
            Mat::from_fn(r, c, |i, j| m[(i, j)])
        })
    }
}

pub(crate) fn to_complex(m: &Mat<f64>) -> Mat<c64> {
    Mat::from_fn(m.nrows(), m.ncols(), |i, j| c64::new(m[(i, j)], 0.0))
}

/// Dense symmetric eigendecomposition with eigenvalues in ascending order.
///
/// Eigenvectors are the columns of the returned matrix, in the same order.
pub(crate) fn eigh(block: &BlockLabel, m: &Mat<f64>) -> Result<(Vec<f64>, Mat<f64>), FtlmError> {
    let n = m.nrows();
    if n == 0 {
        return Ok((Vec::new(), Mat::zeros(0, 0)));
    }
    let evd = m
        .as_ref()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|cause| FtlmErrorKind::Evd {
            block: block.clone(),
            cause,
        })?;
    let s = evd.S();
    let u = evd.U();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| s[a].total_cmp(&s[b]));
    let values = order.iter().map(|&k| s[k]).collect();
    let vectors = Mat::from_fn(n, n, |i, j| u[(i, order[j])]);
    Ok((values, vectors))
}
