//! Rarefaction curves: observed richness per sample across several depths.

use crate::data::io::open_writer;
use crate::data::Dataset;
use crate::error::{PrepError, Result};
use crate::rarefy::subsample_counts;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Observed richness of every sample at every requested depth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarefactionCurve {
    pub sample_ids: Vec<String>,
    pub depths: Vec<u64>,
    /// `richness[d][s]`: taxa observed in sample `s` at `depths[d]`,
    /// `None` where the sample has fewer reads than the depth.
    pub richness: Vec<Vec<Option<usize>>>,
}

impl RarefactionCurve {
    /// Richness series for one sample.
    pub fn sample(&self, sample_id: &str) -> Option<Vec<Option<usize>>> {
        let s = self.sample_ids.iter().position(|id| id == sample_id)?;
        Some(self.richness.iter().map(|row| row[s]).collect())
    }

    /// Write long-format `sample_id,depth,observed`; unreachable depths are omitted.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = open_writer(path)?;
        writer.write_record(["sample_id", "depth", "observed"])?;
        for (s, sample_id) in self.sample_ids.iter().enumerate() {
            for (d, depth) in self.depths.iter().enumerate() {
                if let Some(observed) = self.richness[d][s] {
                    writer.write_record([
                        sample_id.clone(),
                        depth.to_string(),
                        observed.to_string(),
                    ])?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }
}

/// Rarefy independently at each depth and count the taxa observed.
///
/// Each depth gets its own generator seeded with `seed + depth index`, so
/// depths can run in parallel and the result does not depend on scheduling.
pub fn rarefaction_curve(ds: &Dataset, depths: &[u64], seed: u64) -> Result<RarefactionCurve> {
    if depths.is_empty() {
        return Err(PrepError::InvalidParameter(
            "At least one depth is required".to_string(),
        ));
    }

    let library_sizes = ds.counts().col_sums();
    let columns: Vec<Vec<u64>> = (0..ds.n_samples())
        .map(|col| ds.counts().col_dense(col))
        .collect();

    let richness: Vec<Vec<Option<usize>>> = depths
        .par_iter()
        .enumerate()
        .map(|(d, &depth)| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(d as u64));
            columns
                .iter()
                .zip(&library_sizes)
                .map(|(column, &size)| {
                    if size < depth {
                        None
                    } else {
                        let sub = subsample_counts(column, depth, &mut rng);
                        Some(sub.iter().filter(|&&c| c > 0).count())
                    }
                })
                .collect()
        })
        .collect();

    Ok(RarefactionCurve {
        sample_ids: ds.sample_ids().to_vec(),
        depths: depths.to_vec(),
        richness,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::toy_dataset;

    #[test]
    fn test_curve_shape_and_bounds() {
        let ds = toy_dataset();
        let curve = rarefaction_curve(&ds, &[1, 20, 100, 150], 5).unwrap();

        assert_eq!(curve.richness.len(), 4);
        // one read is always one taxon
        assert!(curve.richness[0].iter().all(|r| *r == Some(1)));
        // full depth recovers the observed richness: S1 has asv1, asv2, asv4
        assert_eq!(curve.sample("S1").unwrap()[2], Some(3));
        // nobody reaches 150
        assert!(curve.richness[3].iter().all(Option::is_none));
    }

    #[test]
    fn test_curve_monotone_cap() {
        let ds = toy_dataset();
        let curve = rarefaction_curve(&ds, &[10, 50, 100], 11).unwrap();
        let full = curve.richness[2].clone();
        for row in &curve.richness {
            for (r, f) in row.iter().zip(&full) {
                assert!(r.unwrap() <= f.unwrap());
            }
        }
    }

    #[test]
    fn test_curve_deterministic() {
        let ds = toy_dataset();
        let a = rarefaction_curve(&ds, &[10, 30, 70], 99).unwrap();
        let b = rarefaction_curve(&ds, &[10, 30, 70], 99).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_curve_csv() {
        let ds = toy_dataset();
        let curve = rarefaction_curve(&ds, &[50, 500], 1).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.csv");
        curve.to_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        // header + 5 samples at depth 50; depth 500 is unreachable
        assert_eq!(text.lines().count(), 6);
    }

    #[test]
    fn test_curve_requires_depths() {
        let ds = toy_dataset();
        assert!(rarefaction_curve(&ds, &[], 1).is_err());
    }
}
