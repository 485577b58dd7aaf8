//! Sparsity profiling for count matrices.

use crate::data::CountMatrix;
use serde::{Deserialize, Serialize};

/// Proportion of zero cells, overall and per taxon/sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SparsityProfile {
    /// Total number of cells (taxa × samples).
    pub total_entries: usize,
    pub nonzero_entries: usize,
    /// Overall sparsity (proportion of zeros).
    pub sparsity: f64,
    /// Sparsity per taxon (row).
    pub taxon_sparsity: Vec<f64>,
    /// Sparsity per sample (column).
    pub sample_sparsity: Vec<f64>,
    /// Taxa observed in exactly one sample.
    pub n_singleton_taxa: usize,
}

impl SparsityProfile {
    /// Check if the data is highly sparse (> 50% zeros).
    pub fn is_highly_sparse(&self) -> bool {
        self.sparsity > 0.5
    }

    pub fn mean_taxon_sparsity(&self) -> f64 {
        mean(&self.taxon_sparsity)
    }

    pub fn mean_sample_sparsity(&self) -> f64 {
        mean(&self.sample_sparsity)
    }
}

impl std::fmt::Display for SparsityProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Sparsity Profile")?;
        writeln!(f, "  Total entries:     {}", self.total_entries)?;
        writeln!(f, "  Non-zero entries:  {}", self.nonzero_entries)?;
        writeln!(f, "  Overall sparsity:  {:.2}%", self.sparsity * 100.0)?;
        writeln!(f, "  Mean taxon sparsity:  {:.2}%", self.mean_taxon_sparsity() * 100.0)?;
        writeln!(f, "  Mean sample sparsity: {:.2}%", self.mean_sample_sparsity() * 100.0)?;
        writeln!(f, "  Single-sample taxa:   {}", self.n_singleton_taxa)?;
        Ok(())
    }
}

/// Profile sparsity characteristics of a count matrix.
pub fn profile_sparsity(counts: &CountMatrix) -> SparsityProfile {
    let n_taxa = counts.n_taxa();
    let n_samples = counts.n_samples();
    let total_entries = n_taxa * n_samples;
    let nonzero_entries = counts.nnz();
    let sparsity = if total_entries > 0 {
        (total_entries - nonzero_entries) as f64 / total_entries as f64
    } else {
        0.0
    };

    let row_nnz: Vec<usize> = (0..n_taxa)
        .map(|row| counts.data().outer_view(row).map(|v| v.nnz()).unwrap_or(0))
        .collect();
    let taxon_sparsity: Vec<f64> = row_nnz
        .iter()
        .map(|&nnz| (n_samples - nnz) as f64 / n_samples.max(1) as f64)
        .collect();
    let n_singleton_taxa = row_nnz.iter().filter(|&&nnz| nnz == 1).count();

    let mut sample_nnz = vec![0usize; n_samples];
    for row_vec in counts.data().outer_iterator() {
        for (col, _) in row_vec.iter() {
            sample_nnz[col] += 1;
        }
    }
    let sample_sparsity: Vec<f64> = sample_nnz
        .iter()
        .map(|&nnz| (n_taxa - nnz) as f64 / n_taxa.max(1) as f64)
        .collect();

    SparsityProfile {
        total_entries,
        nonzero_entries,
        sparsity,
        taxon_sparsity,
        sample_sparsity,
        n_singleton_taxa,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
