use crate::data::io::open_writer;
use crate::data::{Dataset, Rank};
use crate::error::{PrepError, Result};
use crate::filter::{drop_zero_sum_taxa, SampleSelector};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// Control-versus-biological abundance comparison for one taxon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminantRecord {
    pub taxon_id: String,
    /// Deepest assigned rank, e.g. `Genus:Ralstonia`.
    pub label: String,
    pub mean_control: f64,
    pub mean_biological: f64,
    /// Fraction of control samples where the taxon is present.
    pub prevalence_control: f64,
    /// Fraction of biological samples where the taxon is present.
    pub prevalence_biological: f64,
    pub disproportion: f64,
    pub flagged: bool,
}

/// Result of contaminant detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContaminantReport {
    /// Disproportion threshold used.
    pub threshold: f64,
    pub control_samples: Vec<String>,
    pub n_biological: usize,
    /// One record per taxon present in the controls, in dataset row order.
    pub records: Vec<ContaminantRecord>,
}

impl ContaminantReport {
    /// Identifiers of flagged taxa.
    pub fn flagged(&self) -> BTreeSet<String> {
        self.records
            .iter()
            .filter(|r| r.flagged)
            .map(|r| r.taxon_id.clone())
            .collect()
    }

    pub fn n_flagged(&self) -> usize {
        self.records.iter().filter(|r| r.flagged).count()
    }

    /// Export the comparison table for manual review.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = open_writer(path)?;
        writer.write_record([
            "taxon_id",
            "label",
            "mean_control",
            "mean_biological",
            "prevalence_control",
            "prevalence_biological",
            "disproportion",
            "flagged",
        ])?;
        for r in &self.records {
            writer.write_record([
                r.taxon_id.clone(),
                r.label.clone(),
                format!("{:.6e}", r.mean_control),
                format!("{:.6e}", r.mean_biological),
                format!("{:.4}", r.prevalence_control),
                format!("{:.4}", r.prevalence_biological),
                format!("{:.4}", r.disproportion),
                r.flagged.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Display for ContaminantReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Contaminant Report")?;
        writeln!(f, "  Control samples:    {}", self.control_samples.len())?;
        writeln!(f, "  Biological samples: {}", self.n_biological)?;
        writeln!(f, "  Taxa in controls:   {}", self.records.len())?;
        writeln!(
            f,
            "  Flagged (> {:.0}%):   {}",
            self.threshold * 100.0,
            self.n_flagged()
        )?;
        for r in self.records.iter().filter(|r| r.flagged) {
            writeln!(
                f,
                "    {} {} control {:.3e} vs biological {:.3e}",
                r.taxon_id, r.label, r.mean_control, r.mean_biological
            )?;
        }
        Ok(())
    }
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        values.sum::<f64>() / n as f64
    }
}

/// Compare each control-present taxon's abundance in controls and biological samples.
///
/// # Arguments
/// * `ds` - Dataset including both control and biological samples
/// * `controls` - Selects the negative-control samples
/// * `threshold` - Disproportion above which a control-enriched taxon is flagged (0.0 to 1.0)
///
/// # Errors
/// `EmptyControlSet` when the selector matches no sample.
pub fn detect_contaminants(
    ds: &Dataset,
    controls: &SampleSelector,
    threshold: f64,
) -> Result<ContaminantReport> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(PrepError::InvalidParameter(
            "Contaminant threshold must be between 0 and 1".to_string(),
        ));
    }

    let control_idx = controls.select(ds.metadata())?;
    if control_idx.is_empty() {
        return Err(PrepError::EmptyControlSet {
            selector: controls.to_string(),
        });
    }
    let control_set: HashSet<usize> = control_idx.iter().copied().collect();
    let biological_idx: Vec<usize> = (0..ds.n_samples())
        .filter(|i| !control_set.contains(i))
        .collect();

    // Taxa present in the controls
    let control_ds = drop_zero_sum_taxa(&ds.subset_samples(&control_idx)?)?;
    let in_controls: HashSet<&str> = control_ds.taxon_ids().iter().map(String::as_str).collect();

    let counts = ds.counts();
    let sample_totals = counts.col_sums();
    let relative = |row: &[u64], col: usize| -> f64 {
        if sample_totals[col] == 0 {
            0.0
        } else {
            row[col] as f64 / sample_totals[col] as f64
        }
    };

    let mut records = Vec::with_capacity(in_controls.len());
    for (row, taxon_id) in ds.taxon_ids().iter().enumerate() {
        if !in_controls.contains(taxon_id.as_str()) {
            continue;
        }
        let dense = counts.row_dense(row);

        let mean_control = mean(
            control_idx.iter().map(|&c| relative(&dense, c)),
            control_idx.len(),
        );
        let mean_biological = mean(
            biological_idx.iter().map(|&c| relative(&dense, c)),
            biological_idx.len(),
        );
        let present = |idx: &[usize]| -> f64 {
            if idx.is_empty() {
                0.0
            } else {
                idx.iter().filter(|&&c| dense[c] > 0).count() as f64 / idx.len() as f64
            }
        };

        let larger = mean_control.max(mean_biological);
        let disproportion = if larger > 0.0 {
            (mean_control - mean_biological).abs() / larger
        } else {
            0.0
        };
        let flagged = disproportion > threshold && mean_control > mean_biological;

        let label = ds
            .lineage_at(row)
            .deepest()
            .map(|(rank, value)| format!("{}:{}", rank, value))
            .unwrap_or_else(|| format!("{}:unassigned", Rank::Domain));

        debug!(
            "{} ({}): control {:.3e}, biological {:.3e}, disproportion {:.3}{}",
            taxon_id,
            label,
            mean_control,
            mean_biological,
            disproportion,
            if flagged { " [flagged]" } else { "" }
        );

        records.push(ContaminantRecord {
            taxon_id: taxon_id.clone(),
            label,
            mean_control,
            mean_biological,
            prevalence_control: present(&control_idx),
            prevalence_biological: present(&biological_idx),
            disproportion,
            flagged,
        });
    }

    let report = ContaminantReport {
        threshold,
        control_samples: control_idx
            .iter()
            .map(|&i| ds.sample_ids()[i].clone())
            .collect(),
        n_biological: biological_idx.len(),
        records,
    };
    info!(
        "Contaminant detection: {} control samples, {} taxa present in controls, {} flagged",
        report.control_samples.len(),
        report.records.len(),
        report.n_flagged()
    );
    Ok(report)
}
