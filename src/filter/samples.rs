//! Sample selection and exclusion.

use crate::data::{Dataset, Metadata};
use crate::error::{PrepError, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A predicate over samples, evaluated against the metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum SampleSelector {
    /// Samples listed by identifier.
    Ids { ids: Vec<String> },
    /// Samples whose `column` value equals one of `values`.
    Column { column: String, values: Vec<String> },
}

impl SampleSelector {
    /// Select samples whose `column` equals `value`.
    pub fn column_equals(column: &str, value: &str) -> Self {
        SampleSelector::Column {
            column: column.to_string(),
            values: vec![value.to_string()],
        }
    }

    /// Select samples by identifier.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SampleSelector::Ids {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Column indices of the selected samples, in metadata order.
    pub fn select(&self, metadata: &Metadata) -> Result<Vec<usize>> {
        match self {
            SampleSelector::Ids { ids } => {
                let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
                Ok(metadata
                    .sample_ids()
                    .iter()
                    .enumerate()
                    .filter(|(_, sid)| wanted.contains(sid.as_str()))
                    .map(|(i, _)| i)
                    .collect())
            }
            SampleSelector::Column { column, values } => {
                let column_values = metadata.column(column)?;
                Ok(column_values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| values.iter().any(|level| v.matches(level)))
                    .map(|(i, _)| i)
                    .collect())
            }
        }
    }
}

impl fmt::Display for SampleSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleSelector::Ids { ids } => write!(f, "sample ids [{}]", ids.join(", ")),
            SampleSelector::Column { column, values } => {
                write!(f, "{} in [{}]", column, values.join(", "))
            }
        }
    }
}

/// Keep (`keep = true`) or drop (`keep = false`) the samples a selector matches.
pub fn filter_samples(ds: &Dataset, selector: &SampleSelector, keep: bool) -> Result<Dataset> {
    let selected: HashSet<usize> = selector.select(ds.metadata())?.into_iter().collect();
    let indices: Vec<usize> = (0..ds.n_samples())
        .filter(|i| selected.contains(i) == keep)
        .collect();
    info!(
        "Sample filter ({}{}): {} of {} samples retained",
        if keep { "keep " } else { "drop " },
        selector,
        indices.len(),
        ds.n_samples()
    );
    ds.subset_samples(&indices)
}

/// Drop samples listed in `ids`. Identifiers not in the dataset are logged and ignored.
pub fn exclude_samples(ds: &Dataset, ids: &HashSet<String>) -> Result<Dataset> {
    let present: HashSet<&str> = ds.sample_ids().iter().map(String::as_str).collect();
    let mut unknown: Vec<&str> = ids
        .iter()
        .map(String::as_str)
        .filter(|id| !present.contains(id))
        .collect();
    if !unknown.is_empty() {
        unknown.sort_unstable();
        warn!("Excluded samples not present in dataset: {}", unknown.join(", "));
    }

    let indices: Vec<usize> = ds
        .sample_ids()
        .iter()
        .enumerate()
        .filter(|(_, sid)| !ids.contains(*sid))
        .map(|(i, _)| i)
        .collect();
    if indices.is_empty() {
        return Err(PrepError::EmptyData(
            "Sample exclusion removed every sample".to_string(),
        ));
    }
    ds.subset_samples(&indices)
}
