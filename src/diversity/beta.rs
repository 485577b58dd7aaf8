use crate::data::io::open_writer;
use crate::data::Dataset;
use crate::error::Result;
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::path::Path;

/// Bray-Curtis dissimilarity, Σ|a - b| / Σ(a + b).
///
/// Ranges over [0, 1]; two empty samples are treated as identical.
pub fn bray_curtis(a: &[u64], b: &[u64]) -> f64 {
    let (num, den) = a
        .iter()
        .zip(b)
        .fold((0u64, 0u64), |(num, den), (&x, &y)| (num + x.abs_diff(y), den + x + y));
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Symmetric sample × sample distance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    sample_ids: Vec<String>,
    matrix: DMatrix<f64>,
}

impl DistanceMatrix {
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Distance between two samples by identifier.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.sample_ids.iter().position(|s| s == a)?;
        let j = self.sample_ids.iter().position(|s| s == b)?;
        Some(self.matrix[(i, j)])
    }

    /// Write as a square CSV with sample IDs on both axes.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = open_writer(path)?;
        let mut header = vec!["sample_id".to_string()];
        header.extend(self.sample_ids.iter().cloned());
        writer.write_record(&header)?;
        for (i, sample_id) in self.sample_ids.iter().enumerate() {
            let mut record = vec![sample_id.clone()];
            record.extend(self.matrix.row(i).iter().map(|d| format!("{:.6}", d)));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Pairwise Bray-Curtis dissimilarity between all samples of a dataset.
pub fn bray_curtis_matrix(ds: &Dataset) -> DistanceMatrix {
    let n = ds.n_samples();
    let columns: Vec<Vec<u64>> = (0..n).map(|col| ds.counts().col_dense(col)).collect();

    let rows: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| (0..n).map(|j| bray_curtis(&columns[i], &columns[j])).collect())
        .collect();

    DistanceMatrix {
        sample_ids: ds.sample_ids().to_vec(),
        matrix: DMatrix::from_fn(n, n, |i, j| rows[i][j]),
    }
}
