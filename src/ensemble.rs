//! Decomposition of a Hilbert space into symmetry blocks.
//!
//! An [`Ensemble`] maps each [`BlockLabel`] (a tuple of quantum numbers such as
//! particle number, momentum and point-group irrep) to the multiplicity with which
//! that block contributes to extensive sums. Blocks related by an unbroken symmetry
//! are enumerated once and carry the multiplicity instead.
//!
//! Ensembles are built once per computation from an explicit [`EnsembleSpec`] and
//! are immutable afterwards.

use crate::error::{FtlmError, FtlmErrorKind};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Identifies one symmetry sector, e.g. `("8", "M.C1.A")`.
///
/// Labels compare and hash by their parts, so they can be used as map keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockLabel(Vec<String>);

impl BlockLabel {
    /// Builds a label from its quantum-number parts.
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// The quantum-number parts, in axis order.
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for BlockLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})", self.0.join(", "))
    }
}

impl From<&str> for BlockLabel {
    fn from(part: &str) -> Self {
        Self(vec![part.to_string()])
    }
}

impl<const N: usize> From<[&str; N]> for BlockLabel {
    fn from(parts: [&str; N]) -> Self {
        Self::new(parts)
    }
}

impl From<Vec<String>> for BlockLabel {
    fn from(parts: Vec<String>) -> Self {
        Self(parts)
    }
}

/// The full decomposition of a system into blocks with their degeneracies.
///
/// Iteration order is insertion order; lookups go through a hash index.
#[derive(Debug, Clone, PartialEq)]
pub struct Ensemble {
    blocks: Vec<(BlockLabel, u64)>,
    index: HashMap<BlockLabel, usize>,
}

impl Ensemble {
    /// Builds an ensemble from a flat sequence of `(label, degeneracy)` pairs.
    ///
    /// A label listed twice with the same degeneracy is kept once; listed twice
    /// with different degeneracies it is a configuration error, as is any
    /// degeneracy below one.
    pub fn from_blocks<I, L>(blocks: I) -> Result<Self, FtlmError>
    where
        I: IntoIterator<Item = (L, i64)>,
        L: Into<BlockLabel>,
    {
        let mut ensemble = Self {
            blocks: Vec::new(),
            index: HashMap::new(),
        };
        for (label, degeneracy) in blocks {
            let label = label.into();
            let degeneracy = validate_degeneracy(&label.to_string(), degeneracy)?;
            match ensemble.index.get(&label) {
                Some(&i) if ensemble.blocks[i].1 == degeneracy => continue,
                Some(&i) => {
                    return Err(FtlmErrorKind::Configuration(format!(
                        "block {label} listed with conflicting degeneracies {} and {degeneracy}",
                        ensemble.blocks[i].1
                    ))
                    .into());
                }
                None => {
                    ensemble.index.insert(label.clone(), ensemble.blocks.len());
                    ensemble.blocks.push((label, degeneracy));
                }
            }
        }
        Ok(ensemble)
    }

    /// Builds the Cartesian product of two decomposition axes.
    ///
    /// The block `(a, b)` carries degeneracy `d_a * d_b`. Blocks are ordered with
    /// the first axis varying slowest.
    pub fn from_axes<A, B>(first: &[(A, i64)], second: &[(B, i64)]) -> Result<Self, FtlmError>
    where
        A: fmt::Display,
        B: fmt::Display,
    {
        let first = validate_axis(first)?;
        let second = validate_axis(second)?;
        let product = first.iter().flat_map(|(a, da)| {
            second.iter().map(move |(b, db)| {
                (BlockLabel::new([a.clone(), b.clone()]), (da * db) as i64)
            })
        });
        Self::from_blocks(product)
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterates over `(label, degeneracy)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&BlockLabel, u64)> + '_ {
        self.blocks.iter().map(|(label, deg)| (label, *deg))
    }

    /// Block labels in insertion order.
    pub fn labels(&self) -> impl Iterator<Item = &BlockLabel> + '_ {
        self.blocks.iter().map(|(label, _)| label)
    }

    pub fn degeneracy(&self, label: &BlockLabel) -> Option<u64> {
        self.index.get(label).map(|&i| self.blocks[i].1)
    }

    pub fn contains(&self, label: &BlockLabel) -> bool {
        self.index.contains_key(label)
    }

    /// Sum of all degeneracies, i.e. the number of blocks after symmetry unfolding.
    pub fn total_degeneracy(&self) -> u64 {
        self.blocks.iter().map(|(_, deg)| deg).sum()
    }
}

fn validate_degeneracy(label: &str, degeneracy: i64) -> Result<u64, FtlmError> {
    if degeneracy < 1 {
        return Err(FtlmErrorKind::Configuration(format!(
            "degeneracy of block {label} must be positive, got {degeneracy}"
        ))
        .into());
    }
    Ok(degeneracy as u64)
}

fn validate_axis<Q: fmt::Display>(axis: &[(Q, i64)]) -> Result<Vec<(String, u64)>, FtlmError> {
    let mut entries: Vec<(String, u64)> = Vec::with_capacity(axis.len());
    for (qn, degeneracy) in axis {
        let qn = qn.to_string();
        let degeneracy = validate_degeneracy(&qn, *degeneracy)?;
        match entries.iter().find(|(existing, _)| *existing == qn) {
            Some((_, d)) if *d == degeneracy => {}
            Some((_, d)) => {
                return Err(FtlmErrorKind::Configuration(format!(
                    "quantum number {qn} listed with conflicting degeneracies {d} and {degeneracy}"
                ))
                .into());
            }
            None => entries.push((qn, degeneracy)),
        }
    }
    Ok(entries)
}

fn unit_degeneracy() -> i64 {
    1
}

/// One quantum number along a decomposition axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisEntry {
    pub label: String,
    #[serde(default = "unit_degeneracy")]
    pub degeneracy: i64,
}

impl AxisEntry {
    pub fn new(label: impl Into<String>, degeneracy: i64) -> Self {
        Self {
            label: label.into(),
            degeneracy,
        }
    }
}

/// One explicitly listed block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub label: Vec<String>,
    #[serde(default = "unit_degeneracy")]
    pub degeneracy: i64,
}

/// Configuration value describing how to build an [`Ensemble`].
///
/// The same description must be used for the T- and S-recursions of a run; passing it
/// around explicitly keeps the two from drifting apart.
///
/// Serialized with a `kind` tag, for example
/// `{"kind": "spin_half", "n_sites": 16, "irreps": ["Gamma.C1.A", "M.C1.A"]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnsembleSpec {
    /// Cartesian product of two axes.
    Product {
        first: Vec<AxisEntry>,
        second: Vec<AxisEntry>,
    },
    /// Spin-1/2 magnetization sectors crossed with space-group irreps.
    SpinHalf { n_sites: usize, irreps: Vec<String> },
    /// Explicit list of blocks.
    Blocks { blocks: Vec<BlockEntry> },
}

impl EnsembleSpec {
    /// Builds the ensemble it describes.
    pub fn build(&self) -> Result<Ensemble, FtlmError> {
        match self {
            EnsembleSpec::Product { first, second } => Ensemble::from_axes(
                &axis_pairs(first),
                &axis_pairs(second),
            ),
            EnsembleSpec::SpinHalf { n_sites, irreps } => {
                let irreps: Vec<_> = irreps.iter().map(|k| (k.as_str(), 1_i64)).collect();
                Ensemble::from_axes(&axis_pairs(&spin_half_magnetization(*n_sites)), &irreps)
            }
            EnsembleSpec::Blocks { blocks } => Ensemble::from_blocks(
                blocks
                    .iter()
                    .map(|b| (BlockLabel::new(b.label.iter().cloned()), b.degeneracy)),
            ),
        }
    }
}

fn axis_pairs(axis: &[AxisEntry]) -> Vec<(&str, i64)> {
    axis.iter()
        .map(|e| (e.label.as_str(), e.degeneracy))
        .collect()
}

/// Number-of-up-spins sectors `0..=n_sites/2`.
///
/// Spin-flip symmetry maps `nup` onto `n_sites - nup`, so every sector below half
/// filling stands for two and carries degeneracy 2. The half-filled sector of an
/// even lattice maps onto itself and carries degeneracy 1.
pub fn spin_half_magnetization(n_sites: usize) -> Vec<AxisEntry> {
    (0..=n_sites / 2)
        .map(|nup| {
            let degeneracy = if 2 * nup == n_sites { 1 } else { 2 };
            AxisEntry::new(nup.to_string(), degeneracy)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_law() {
        let nups = [(0, 2), (1, 2), (2, 1)];
        let ks = [("Gamma", 1), ("M", 3)];
        let ensemble = Ensemble::from_axes(&nups, &ks).unwrap();
        assert_eq!(ensemble.len(), 6);
        for (nup, dn) in nups {
            for (k, dk) in ks {
                let label = BlockLabel::new([nup.to_string(), k.to_string()]);
                assert_eq!(ensemble.degeneracy(&label), Some((dn * dk) as u64));
            }
        }
    }

    #[test]
    fn test_iteration_order_is_insertion_order() {
        let ensemble = Ensemble::from_axes(&[("b", 1), ("a", 1)], &[("y", 1), ("x", 1)]).unwrap();
        let labels: Vec<String> = ensemble.labels().map(|l| l.to_string()).collect();
        assert_eq!(labels, ["(b, y)", "(b, x)", "(a, y)", "(a, x)"]);
    }

    #[test]
    fn test_non_positive_degeneracy_rejected() {
        let err = Ensemble::from_blocks([("a", 1), ("b", 0)]).unwrap_err();
        assert!(matches!(err.kind(), FtlmErrorKind::Configuration(_)));

        let err = Ensemble::from_axes(&[("0", -2)], &[("k", 1)]).unwrap_err();
        assert!(matches!(err.kind(), FtlmErrorKind::Configuration(_)));
    }

    #[test]
    fn test_conflicting_labels_rejected() {
        let err = Ensemble::from_blocks([("a", 1), ("a", 2)]).unwrap_err();
        assert!(matches!(err.kind(), FtlmErrorKind::Configuration(_)));

        let err = Ensemble::from_axes(&[("0", 1), ("0", 2)], &[("k", 1)]).unwrap_err();
        assert!(matches!(err.kind(), FtlmErrorKind::Configuration(_)));
    }

    #[test]
    fn test_repeated_identical_label_is_kept_once() {
        let ensemble = Ensemble::from_blocks([("a", 2), ("a", 2), ("b", 1)]).unwrap();
        assert_eq!(ensemble.len(), 2);
        assert_eq!(ensemble.total_degeneracy(), 3);
    }

    #[test]
    fn test_spin_half_magnetization() {
        let even: Vec<i64> = spin_half_magnetization(4).iter().map(|e| e.degeneracy).collect();
        assert_eq!(even, [2, 2, 1]);
        let odd: Vec<i64> = spin_half_magnetization(5).iter().map(|e| e.degeneracy).collect();
        assert_eq!(odd, [2, 2, 2]);
    }

    #[test]
    fn test_spec_from_json() {
        let json = r#"{"kind": "spin_half", "n_sites": 4, "irreps": ["Gamma.C1.A", "M.C1.A"]}"#;
        let spec: EnsembleSpec = serde_json::from_str(json).unwrap();
        let ensemble = spec.build().unwrap();
        assert_eq!(ensemble.len(), 6);
        assert_eq!(
            ensemble.degeneracy(&BlockLabel::from(["2", "M.C1.A"])),
            Some(1)
        );

        let json = r#"{"kind": "product", "first": [{"label": "0", "degeneracy": 2}], "second": [{"label": "k"}]}"#;
        let spec: EnsembleSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.build().unwrap().total_degeneracy(), 2);

        let json = r#"{"kind": "blocks", "blocks": [{"label": ["a", "b"], "degeneracy": 3}]}"#;
        let spec: EnsembleSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.build().unwrap().degeneracy(&BlockLabel::from(["a", "b"])), Some(3));
    }
}
