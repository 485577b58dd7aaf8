//! Writing pipeline results to an output directory.

use crate::diversity::{alpha_diversity, bray_curtis_matrix};
use crate::error::Result;
use crate::filter::FilterReport;
use crate::pipeline::{PipelineOutput, PipelineWarning};
use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Machine-readable record of a pipeline run, written as `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub pipeline: String,
    pub version: String,
    /// RFC 3339 UTC timestamp.
    pub generated_at: String,
    pub n_taxa: usize,
    pub n_samples: usize,
    pub total_reads: u64,
    pub stages: Vec<FilterReport>,
    pub warnings: Vec<PipelineWarning>,
    /// Taxa flagged by the last decontamination step.
    pub flagged_contaminants: Vec<String>,
    pub rarefaction_depth: Option<u64>,
    pub rarefaction_seed: Option<u64>,
}

impl RunSummary {
    pub fn from_output(output: &PipelineOutput) -> Self {
        Self {
            pipeline: output.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now().to_rfc3339(),
            n_taxa: output.dataset.n_taxa(),
            n_samples: output.dataset.n_samples(),
            total_reads: output.dataset.counts().total(),
            stages: output.reports.clone(),
            warnings: output.warnings.clone(),
            flagged_contaminants: output
                .contaminants
                .as_ref()
                .map(|r| r.flagged().into_iter().collect())
                .unwrap_or_default(),
            rarefaction_depth: output.rarefaction.map(|(depth, _)| depth),
            rarefaction_seed: output.rarefaction.map(|(_, seed)| seed),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Write every result file of a run into `dir`, creating it if needed.
///
/// Writes the final tables (`counts.csv`, `taxonomy.csv`, `metadata.csv`,
/// `tree.nwk`), `contaminants.csv` when decontamination ran,
/// `alpha_diversity.csv`, `bray_curtis.csv` and `summary.json`.
pub fn write_outputs<P: AsRef<Path>>(output: &PipelineOutput, dir: P) -> Result<RunSummary> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    output.dataset.write_tables(dir)?;
    if let Some(report) = &output.contaminants {
        report.to_csv(dir.join("contaminants.csv"))?;
    }
    alpha_diversity(&output.dataset).to_csv(dir.join("alpha_diversity.csv"))?;
    bray_curtis_matrix(&output.dataset).to_csv(dir.join("bray_curtis.csv"))?;

    let summary = RunSummary::from_output(output);
    fs::write(dir.join("summary.json"), summary.to_json()?)?;
    info!("Wrote results to {}", dir.display());
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::test_support::toy_dataset;
    use crate::filter::SampleSelector;
    use crate::pipeline::Pipeline;

    #[test]
    fn test_write_outputs() {
        let ds = toy_dataset();
        let output = Pipeline::new()
            .name("toy")
            .decontaminate(SampleSelector::column_equals("SampleType", "NegCtrl"), 0.4, true)
            .rarefy(Some(50), 7)
            .run(&ds)
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let summary = write_outputs(&output, dir.path()).unwrap();

        for name in [
            "counts.csv",
            "taxonomy.csv",
            "metadata.csv",
            "tree.nwk",
            "contaminants.csv",
            "alpha_diversity.csv",
            "bray_curtis.csv",
            "summary.json",
        ] {
            assert!(dir.path().join(name).exists(), "missing {}", name);
        }

        assert_eq!(summary.pipeline, "toy");
        assert_eq!(summary.flagged_contaminants, vec!["asv2".to_string()]);
        assert_eq!(summary.rarefaction_depth, Some(50));
        assert_eq!(summary.stages.len(), 2);

        let json = fs::read_to_string(dir.path().join("summary.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["rarefaction_seed"], 7);
    }
}
