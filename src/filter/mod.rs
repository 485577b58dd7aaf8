//! Filtering primitives for datasets.
//!
//! Every filter takes a `&Dataset` and returns a new, never larger, `Dataset`
//! whose taxonomy, metadata and tree are realigned to the surviving rows and
//! columns. Applying a filter twice gives the same result as applying it once.

pub mod abundance;
pub mod lineage;
pub mod samples;
pub mod zero_sum;

pub use abundance::filter_relative_abundance;
pub use lineage::{filter_lineage, LineageRule};
pub use samples::{exclude_samples, filter_samples, SampleSelector};
pub use zero_sum::{drop_zero_sum_taxa, remove_taxa};

use crate::data::Dataset;
use serde::{Deserialize, Serialize};

/// Before/after sizes of one filtering stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterReport {
    /// Stage name.
    pub stage: String,
    pub taxa_before: usize,
    pub taxa_after: usize,
    pub samples_before: usize,
    pub samples_after: usize,
    pub reads_before: u64,
    pub reads_after: u64,
}

impl FilterReport {
    /// Compare two snapshots of a dataset.
    pub fn between(stage: &str, before: &Dataset, after: &Dataset) -> Self {
        Self {
            stage: stage.to_string(),
            taxa_before: before.n_taxa(),
            taxa_after: after.n_taxa(),
            samples_before: before.n_samples(),
            samples_after: after.n_samples(),
            reads_before: before.counts().total(),
            reads_after: after.counts().total(),
        }
    }

    pub fn taxa_removed(&self) -> usize {
        self.taxa_before.saturating_sub(self.taxa_after)
    }

    pub fn samples_removed(&self) -> usize {
        self.samples_before.saturating_sub(self.samples_after)
    }

    /// Proportion of reads retained.
    pub fn reads_retained(&self) -> f64 {
        if self.reads_before > 0 {
            self.reads_after as f64 / self.reads_before as f64
        } else {
            0.0
        }
    }
}

impl std::fmt::Display for FilterReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: taxa {} -> {}, samples {} -> {}, reads retained {:.1}%",
            self.stage,
            self.taxa_before,
            self.taxa_after,
            self.samples_before,
            self.samples_after,
            self.reads_retained() * 100.0
        )
    }
}
