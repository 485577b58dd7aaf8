use crate::data::io::open_writer;
use crate::data::Dataset;
use crate::error::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of taxa with at least one read.
pub fn observed(counts: &[u64]) -> usize {
    counts.iter().filter(|&&c| c > 0).count()
}

/// Shannon entropy, H = -Σ p ln p. Zero for an empty sample.
pub fn shannon(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.ln()
        })
        .sum()
}

/// Simpson's diversity, 1 - Σ p². Zero for an empty sample.
pub fn simpson(counts: &[u64]) -> f64 {
    let total: u64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

/// Bias-corrected Chao1: S_obs + F1(F1 - 1) / (2(F2 + 1)).
pub fn chao1(counts: &[u64]) -> f64 {
    let s_obs = observed(counts) as f64;
    let f1 = counts.iter().filter(|&&c| c == 1).count() as f64;
    let f2 = counts.iter().filter(|&&c| c == 2).count() as f64;
    s_obs + f1 * (f1 - 1.0) / (2.0 * (f2 + 1.0))
}

/// Alpha diversity summary for a single sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaDiversity {
    pub sample_id: String,
    pub reads: u64,
    pub observed: usize,
    pub shannon: f64,
    pub simpson: f64,
    pub chao1: f64,
}

impl AlphaDiversity {
    pub fn from_counts(sample_id: &str, counts: &[u64]) -> Self {
        AlphaDiversity {
            sample_id: sample_id.to_string(),
            reads: counts.iter().sum(),
            observed: observed(counts),
            shannon: shannon(counts),
            simpson: simpson(counts),
            chao1: chao1(counts),
        }
    }
}

/// Alpha diversity of every sample, in column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlphaTable {
    pub rows: Vec<AlphaDiversity>,
}

impl AlphaTable {
    pub fn get(&self, sample_id: &str) -> Option<&AlphaDiversity> {
        self.rows.iter().find(|r| r.sample_id == sample_id)
    }

    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = open_writer(path)?;
        writer.write_record(["sample_id", "reads", "observed", "shannon", "simpson", "chao1"])?;
        for row in &self.rows {
            writer.write_record([
                row.sample_id.clone(),
                row.reads.to_string(),
                row.observed.to_string(),
                format!("{:.6}", row.shannon),
                format!("{:.6}", row.simpson),
                format!("{:.6}", row.chao1),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Compute alpha diversity for every sample of a dataset.
pub fn alpha_diversity(ds: &Dataset) -> AlphaTable {
    let rows = (0..ds.n_samples())
        .into_par_iter()
        .map(|col| AlphaDiversity::from_counts(&ds.sample_ids()[col], &ds.counts().col_dense(col)))
        .collect();
    AlphaTable { rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::toy_dataset;
    use approx::assert_relative_eq;

    #[test]
    fn test_shannon_uniform() {
        assert_relative_eq!(shannon(&[25, 25, 25, 25]), 4f64.ln(), epsilon = 1e-12);
        assert_eq!(shannon(&[100, 0, 0]), 0.0);
        assert_eq!(shannon(&[0, 0]), 0.0);
    }

    #[test]
    fn test_simpson() {
        assert_relative_eq!(simpson(&[25, 25, 25, 25]), 0.75, epsilon = 1e-12);
        assert_relative_eq!(simpson(&[100, 0, 0]), 0.0);
    }

    #[test]
    fn test_chao1() {
        // no singletons: richness is observed
        assert_relative_eq!(chao1(&[5, 4, 3]), 3.0);
        // f1 = 2, f2 = 1: 4 + 2 / 4
        assert_relative_eq!(chao1(&[1, 1, 2, 10]), 4.5);
        // f1 = 3, f2 = 0: 3 + 6 / 2
        assert_relative_eq!(chao1(&[1, 1, 1]), 6.0);
    }

    #[test]
    fn test_alpha_table() {
        let ds = toy_dataset();
        let table = alpha_diversity(&ds);
        assert_eq!(table.rows.len(), 5);

        let s2 = table.get("S2").unwrap();
        // S2 is 40/60 over two taxa
        assert_eq!(s2.observed, 2);
        assert_eq!(s2.reads, 100);
        assert_relative_eq!(s2.simpson, 1.0 - (0.16 + 0.36), epsilon = 1e-12);
        assert_relative_eq!(
            s2.shannon,
            -(0.4f64 * 0.4f64.ln() + 0.6 * 0.6f64.ln()),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_alpha_csv() {
        let ds = toy_dataset();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alpha.csv");
        alpha_diversity(&ds).to_csv(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("sample_id,reads,observed,shannon,simpson,chao1"));
        assert_eq!(text.lines().count(), 6);
    }
}
