//! Library size profiling, used to pick a rarefaction depth.

use crate::data::CountMatrix;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Library size characteristics of a count matrix.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySizeProfile {
    /// Sample identifiers, in column order.
    pub sample_ids: Vec<String>,
    /// Total reads per sample.
    pub library_sizes: Vec<u64>,
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation of library sizes.
    pub std_dev: f64,
    pub min: u64,
    pub max: u64,
    /// Coefficient of variation (std_dev / mean).
    pub cv: f64,
}

impl LibrarySizeProfile {
    pub fn n_samples(&self) -> usize {
        self.library_sizes.len()
    }

    /// Samples with fewer than `depth` reads, i.e. those rarefying at `depth` would drop.
    pub fn samples_below(&self, depth: u64) -> Vec<&str> {
        self.sample_ids
            .iter()
            .zip(&self.library_sizes)
            .filter(|(_, &s)| s < depth)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// Fraction of all reads kept when every retained sample is cut to `depth`.
    pub fn reads_retained_at(&self, depth: u64) -> f64 {
        let total: u64 = self.library_sizes.iter().sum();
        if total == 0 {
            return 0.0;
        }
        let kept = self.library_sizes.iter().filter(|&&s| s >= depth).count() as u64 * depth;
        kept as f64 / total as f64
    }

    /// Check if library sizes are highly variable (CV > 0.5).
    pub fn is_highly_variable(&self) -> bool {
        self.cv > 0.5
    }
}

impl std::fmt::Display for LibrarySizeProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Library Size Profile")?;
        writeln!(f, "  Samples: {}", self.n_samples())?;
        writeln!(f, "  Mean:    {:.0}", self.mean)?;
        writeln!(f, "  Median:  {:.0}", self.median)?;
        writeln!(f, "  Std Dev: {:.0}", self.std_dev)?;
        writeln!(f, "  Min:     {}", self.min)?;
        writeln!(f, "  Max:     {}", self.max)?;
        writeln!(f, "  CV:      {:.2}", self.cv)?;
        Ok(())
    }
}

/// Profile library sizes of a count matrix.
pub fn profile_library_size(counts: &CountMatrix) -> LibrarySizeProfile {
    let library_sizes = counts.col_sums();

    if library_sizes.is_empty() {
        return LibrarySizeProfile {
            sample_ids: vec![],
            library_sizes: vec![],
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
            min: 0,
            max: 0,
            cv: 0.0,
        };
    }

    let values: Vec<f64> = library_sizes.iter().map(|&x| x as f64).collect();
    let mean = values.iter().mean();
    let std_dev = values.iter().population_std_dev();
    let median = median_u64(&library_sizes);
    let min = library_sizes.iter().copied().min().unwrap_or(0);
    let max = library_sizes.iter().copied().max().unwrap_or(0);
    let cv = if mean > 0.0 { std_dev / mean } else { 0.0 };

    LibrarySizeProfile {
        sample_ids: counts.sample_ids().to_vec(),
        library_sizes,
        mean,
        median,
        std_dev,
        min,
        max,
        cv,
    }
}

fn median_u64(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0
    } else {
        sorted[n / 2] as f64
    }
}
