//! Rarefaction: subsample every sample, without replacement, to a common depth.
//!
//! # Algorithm
//!
//! 1. Drop samples whose library size is below the target depth
//! 2. For each remaining sample, in column order, draw `depth` distinct read
//!    positions uniformly from `0..library_size` and map each position to the
//!    taxon whose cumulative count range contains it (taxa in row order)
//! 3. Drop taxa that no longer have any reads
//!
//! One `StdRng` seeded from the caller's seed drives every draw, so the same
//! dataset, depth and seed always give the same matrix.

pub mod curve;

pub use curve::{rarefaction_curve, RarefactionCurve};

use crate::data::Dataset;
use crate::error::{PrepError, Result};
use crate::filter::drop_zero_sum_taxa;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Non-fatal conditions raised while rarefying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RarefyWarning {
    /// Samples dropped because their library size is below the target depth.
    SampleBelowDepth { depth: u64, samples: Vec<String> },
}

impl std::fmt::Display for RarefyWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RarefyWarning::SampleBelowDepth { depth, samples } => write!(
                f,
                "{} samples below depth {} were dropped: {}",
                samples.len(),
                depth,
                samples.join(", ")
            ),
        }
    }
}

/// A rarefied dataset and any warnings raised on the way.
#[derive(Debug, Clone)]
pub struct Rarefied {
    pub dataset: Dataset,
    pub depth: u64,
    pub seed: u64,
    pub warning: Option<RarefyWarning>,
}

/// Smallest non-empty library size, the usual default rarefaction depth.
///
/// Samples with no reads are ignored; `None` when every sample is empty.
pub fn min_library_size(ds: &Dataset) -> Option<u64> {
    ds.counts().col_sums().into_iter().filter(|&s| s > 0).min()
}

/// Draw `depth` reads without replacement from one sample's counts.
///
/// `counts` is indexed by taxon. `depth` must not exceed the sample total.
pub fn subsample_counts<R: Rng + ?Sized>(counts: &[u64], depth: u64, rng: &mut R) -> Vec<u64> {
    let total: u64 = counts.iter().sum();
    debug_assert!(depth <= total);
    if depth == total {
        return counts.to_vec();
    }

    let mut positions = rand::seq::index::sample(rng, total as usize, depth as usize).into_vec();
    positions.sort_unstable();

    let mut result = vec![0u64; counts.len()];
    let mut taxon = 0;
    let mut upper = counts.first().copied().unwrap_or(0);
    for pos in positions {
        let pos = pos as u64;
        while pos >= upper {
            taxon += 1;
            upper += counts[taxon];
        }
        result[taxon] += 1;
    }
    result
}

/// Rarefy every sample to exactly `depth` reads.
///
/// Samples below `depth` are dropped and reported in
/// `RarefyWarning::SampleBelowDepth`; taxa left without reads are dropped.
///
/// # Errors
/// `InvalidParameter` for a zero depth; `EmptyData` when no sample reaches `depth`.
pub fn rarefy(ds: &Dataset, depth: u64, seed: u64) -> Result<Rarefied> {
    if depth == 0 {
        return Err(PrepError::InvalidParameter(
            "Rarefaction depth must be positive".to_string(),
        ));
    }
    let library_sizes = ds.counts().col_sums();

    let (keep, below): (Vec<usize>, Vec<usize>) =
        (0..ds.n_samples()).partition(|&i| library_sizes[i] >= depth);

    if keep.is_empty() {
        return Err(PrepError::EmptyData(format!(
            "No sample has at least {} reads",
            depth
        )));
    }

    let warning = if below.is_empty() {
        None
    } else {
        let w = RarefyWarning::SampleBelowDepth {
            depth,
            samples: below.iter().map(|&i| ds.sample_ids()[i].clone()).collect(),
        };
        warn!("{}", w);
        Some(w)
    };

    let retained = ds.subset_samples(&keep)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let columns: Vec<Vec<u64>> = (0..retained.n_samples())
        .map(|col| subsample_counts(&retained.counts().col_dense(col), depth, &mut rng))
        .collect();

    let subsampled = retained.with_counts(retained.counts().with_columns(&columns)?)?;
    let dataset = drop_zero_sum_taxa(&subsampled)?;

    info!(
        "Rarefied {} samples to {} reads (seed {}): {} taxa remain",
        dataset.n_samples(),
        depth,
        seed,
        dataset.n_taxa()
    );

    Ok(Rarefied {
        dataset,
        depth,
        seed,
        warning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::toy_dataset;

    #[test]
    fn test_subsample_exact_depth() {
        let mut rng = StdRng::seed_from_u64(1);
        let counts = vec![500, 0, 300, 200];
        let sub = subsample_counts(&counts, 100, &mut rng);
        assert_eq!(sub.iter().sum::<u64>(), 100);
        assert_eq!(sub[1], 0);
        for (s, c) in sub.iter().zip(&counts) {
            assert!(s <= c);
        }
    }

    #[test]
    fn test_subsample_full_depth_is_identity() {
        let mut rng = StdRng::seed_from_u64(1);
        let counts = vec![3, 0, 7];
        assert_eq!(subsample_counts(&counts, 10, &mut rng), counts);
    }

    #[test]
    fn test_subsample_leading_zeros() {
        let mut rng = StdRng::seed_from_u64(9);
        let counts = vec![0, 0, 4];
        assert_eq!(subsample_counts(&counts, 2, &mut rng), vec![0, 0, 2]);
    }

    #[test]
    fn test_rarefy_depth_contract() {
        let ds = toy_dataset();
        let rarefied = rarefy(&ds, 60, 711).unwrap();
        assert!(rarefied.warning.is_none());
        assert_eq!(rarefied.dataset.n_samples(), 5);
        assert!(rarefied.dataset.counts().col_sums().iter().all(|&s| s == 60));
        rarefied.dataset.validate().unwrap();
    }

    #[test]
    fn test_rarefy_deterministic() {
        let ds = toy_dataset();
        let a = rarefy(&ds, 37, 42).unwrap();
        let b = rarefy(&ds, 37, 42).unwrap();
        assert_eq!(a.dataset, b.dataset);
    }

    #[test]
    fn test_rarefy_drops_shallow_samples() {
        let ds = toy_dataset();
        // NC1 has 100 reads like the rest; trim it to make it shallow
        let shallow = ds
            .with_counts(
                ds.counts()
                    .with_columns(&[
                        ds.counts().col_dense(0),
                        ds.counts().col_dense(1),
                        ds.counts().col_dense(2),
                        ds.counts().col_dense(3),
                        vec![0, 10, 0, 5],
                    ])
                    .unwrap(),
            )
            .unwrap();
        let rarefied = rarefy(&shallow, 50, 3).unwrap();
        assert_eq!(
            rarefied.warning,
            Some(RarefyWarning::SampleBelowDepth {
                depth: 50,
                samples: vec!["NC1".to_string()]
            })
        );
        assert_eq!(rarefied.dataset.n_samples(), 4);
    }

    #[test]
    fn test_rarefy_nothing_reaches_depth() {
        let ds = toy_dataset();
        assert!(matches!(rarefy(&ds, 1000, 1), Err(PrepError::EmptyData(_))));
    }

    #[test]
    fn test_min_library_size() {
        let ds = toy_dataset();
        assert_eq!(min_library_size(&ds), Some(100));
    }

    #[test]
    fn test_rarefy_rejects_zero_depth() {
        let ds = toy_dataset();
        assert!(matches!(
            rarefy(&ds, 0, 1),
            Err(PrepError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_min_library_size_ignores_empty_samples() {
        let ds = toy_dataset();
        let mut columns: Vec<Vec<u64>> = (0..4).map(|c| ds.counts().col_dense(c)).collect();
        columns.push(vec![0; 4]);
        let with_empty = ds
            .with_counts(ds.counts().with_columns(&columns).unwrap())
            .unwrap();
        assert_eq!(min_library_size(&with_empty), Some(100));

        let all_empty = ds
            .with_counts(ds.counts().with_columns(&vec![vec![0; 4]; 5]).unwrap())
            .unwrap();
        assert_eq!(min_library_size(&all_empty), None);
    }
}
