//! Removal of taxa by total count or by explicit identifier.

use crate::data::Dataset;
use crate::error::Result;
use log::{info, warn};
use std::collections::HashSet;

/// Drop taxa whose total count across the remaining samples is zero.
///
/// Re-apply after every stage that removes samples or subsamples reads.
pub fn drop_zero_sum_taxa(ds: &Dataset) -> Result<Dataset> {
    let keep: Vec<usize> = ds
        .counts()
        .row_sums()
        .iter()
        .enumerate()
        .filter(|(_, &total)| total > 0)
        .map(|(i, _)| i)
        .collect();

    if keep.len() == ds.n_taxa() {
        return Ok(ds.clone());
    }
    info!(
        "Zero-sum filter: removed {} of {} taxa",
        ds.n_taxa() - keep.len(),
        ds.n_taxa()
    );
    ds.subset_taxa(&keep)
}

/// Drop the listed taxa. Identifiers not in the dataset are logged and ignored.
pub fn remove_taxa(ds: &Dataset, ids: &HashSet<String>) -> Result<Dataset> {
    let present: HashSet<&str> = ds.taxon_ids().iter().map(String::as_str).collect();
    let mut unknown: Vec<&str> = ids
        .iter()
        .map(String::as_str)
        .filter(|id| !present.contains(id))
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        warn!("Taxa to remove not present in dataset: {}", unknown.join(", "));
    }

    let keep: Vec<usize> = ds
        .taxon_ids()
        .iter()
        .enumerate()
        .filter(|(_, id)| !ids.contains(*id))
        .map(|(i, _)| i)
        .collect();
    info!("Removed {} listed taxa", ds.n_taxa() - keep.len());
    ds.subset_taxa(&keep)
}
