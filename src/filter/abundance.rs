//! Abundance-based filtering of taxa.

use crate::data::Dataset;
use crate::error::{PrepError, Result};
use log::info;
use rayon::prelude::*;

/// Drop taxa whose share of all reads in the dataset is below `min_fraction`.
///
/// The share is the taxon total divided by the dataset total. Rare taxa add
/// variance to distance and differential-abundance tests without signal.
///
/// # Arguments
/// * `ds` - The dataset to filter
/// * `min_fraction` - Minimum relative abundance (0.0 to 1.0), e.g. `1e-5`
pub fn filter_relative_abundance(ds: &Dataset, min_fraction: f64) -> Result<Dataset> {
    if !(0.0..=1.0).contains(&min_fraction) {
        return Err(PrepError::InvalidParameter(
            "min_fraction must be between 0 and 1".to_string(),
        ));
    }

    let total_reads = ds.counts().total();
    if total_reads == 0 {
        return Err(PrepError::EmptyData("All counts are zero".to_string()));
    }

    let row_sums = ds.counts().row_sums();
    let keep: Vec<usize> = (0..ds.n_taxa())
        .into_par_iter()
        .filter(|&row| row_sums[row] as f64 / total_reads as f64 >= min_fraction)
        .collect();

    if keep.is_empty() {
        return Err(PrepError::EmptyData(format!(
            "No taxa have relative abundance >= {:.2e}",
            min_fraction
        )));
    }

    info!(
        "Abundance filter (>= {:.2e}): removed {} of {} taxa",
        min_fraction,
        ds.n_taxa() - keep.len(),
        ds.n_taxa()
    );
    ds.subset_taxa(&keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CountMatrix, Dataset, Lineage, Metadata, TaxonomyTable};

    fn create_test_dataset() -> Dataset {
        // 5 taxa × 4 samples, 1000 reads in total
        let rows = vec![
            vec![100, 100, 100, 100], // 40%
            vec![75, 75, 75, 75],     // 30%
            vec![50, 50, 50, 50],     // 20%
            vec![30, 30, 30, 0],      // 9%
            vec![10, 0, 0, 0],        // 1%
        ];
        let taxon_ids: Vec<String> = (0..5).map(|i| format!("asv_{}", i)).collect();
        let sample_ids: Vec<String> = (0..4).map(|i| format!("S{}", i)).collect();
        let counts = CountMatrix::from_rows(&rows, taxon_ids.clone(), sample_ids.clone()).unwrap();
        let taxonomy = TaxonomyTable::new(taxon_ids, vec![Lineage::default(); 5]).unwrap();
        let metadata = Metadata::from_rows(
            vec!["group".to_string()],
            sample_ids.into_iter().map(|s| (s, vec!["a".to_string()])).collect(),
        )
        .unwrap();
        Dataset::new(counts, taxonomy, metadata, None).unwrap()
    }

    #[test]
    fn test_filter_relative_abundance() {
        let ds = create_test_dataset();

        let filtered = filter_relative_abundance(&ds, 0.10).unwrap();
        assert_eq!(filtered.taxon_ids(), &["asv_0", "asv_1", "asv_2"]);

        // The boundary is inclusive: exactly 1% survives a 1% cut
        let filtered = filter_relative_abundance(&ds, 0.01).unwrap();
        assert_eq!(filtered.n_taxa(), 5);
    }

    #[test]
    fn test_idempotent_on_filtered_data() {
        let ds = create_test_dataset();
        let once = filter_relative_abundance(&ds, 0.05).unwrap();
        // Re-normalising over fewer reads can only raise shares, so nothing more goes
        let twice = filter_relative_abundance(&once, 0.05).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_invalid_parameters() {
        let ds = create_test_dataset();
        assert!(filter_relative_abundance(&ds, -0.1).is_err());
        assert!(filter_relative_abundance(&ds, 1.1).is_err());
        assert!(matches!(
            filter_relative_abundance(&ds, 0.5),
            Err(PrepError::EmptyData(_))
        ));
    }
}
