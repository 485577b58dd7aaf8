//! Pipeline runner for composing and executing preprocessing steps.

use crate::data::Dataset;
use crate::decontam::{detect_contaminants, ContaminantReport};
use crate::error::{PrepError, Result};
use crate::filter::{
    drop_zero_sum_taxa, exclude_samples, filter_lineage, filter_relative_abundance,
    filter_samples, remove_taxa, FilterReport, LineageRule, SampleSelector,
};
use crate::rarefy::{min_library_size, rarefy, RarefyWarning};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Default disproportion threshold for contaminant detection.
pub const DEFAULT_CONTAMINANT_THRESHOLD: f64 = 0.4;

/// Default rarefaction seed.
pub const DEFAULT_SEED: u64 = 711;

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    DEFAULT_CONTAMINANT_THRESHOLD
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

/// A step in the preprocessing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PipelineStep {
    // === Taxon Filtering ===
    /// Drop taxa whose lineage matches any rule.
    FilterLineage { rules: Vec<LineageRule> },
    /// Drop taxa with no reads in any sample.
    DropZeroSum,
    /// Drop taxa below a fraction of all reads.
    FilterAbundance { min_fraction: f64 },
    /// Drop taxa by identifier (e.g. a reviewed contaminant list).
    RemoveTaxa { ids: Vec<String> },

    // === Sample Filtering ===
    /// Drop samples by identifier.
    ExcludeSamples { ids: Vec<String> },
    /// Keep or drop the samples a selector matches.
    FilterSamples {
        selector: SampleSelector,
        #[serde(default = "default_true")]
        keep: bool,
    },

    // === Contaminants ===
    /// Detect control-enriched taxa. Flagged taxa are only removed with `apply`.
    Decontaminate {
        controls: SampleSelector,
        #[serde(default = "default_threshold")]
        threshold: f64,
        #[serde(default)]
        apply: bool,
        /// Fail instead of skipping when no control sample is selected.
        #[serde(default)]
        required: bool,
    },

    // === Normalization ===
    /// Rarefy to `depth` reads, or to the smallest library when unset.
    Rarefy {
        #[serde(default)]
        depth: Option<u64>,
        #[serde(default = "default_seed")]
        seed: u64,
    },
}

impl PipelineStep {
    /// Stage name used in reports and logs.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStep::FilterLineage { .. } => "filter_lineage",
            PipelineStep::DropZeroSum => "drop_zero_sum",
            PipelineStep::FilterAbundance { .. } => "filter_abundance",
            PipelineStep::RemoveTaxa { .. } => "remove_taxa",
            PipelineStep::ExcludeSamples { .. } => "exclude_samples",
            PipelineStep::FilterSamples { .. } => "filter_samples",
            PipelineStep::Decontaminate { .. } => "decontaminate",
            PipelineStep::Rarefy { .. } => "rarefy",
        }
    }
}

/// Non-fatal conditions collected during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// Samples dropped by rarefaction.
    SampleBelowDepth { depth: u64, samples: Vec<String> },
    /// Decontamination was skipped because no control sample was selected.
    DecontaminationSkipped { selector: String },
}

impl From<RarefyWarning> for PipelineWarning {
    fn from(w: RarefyWarning) -> Self {
        match w {
            RarefyWarning::SampleBelowDepth { depth, samples } => {
                PipelineWarning::SampleBelowDepth { depth, samples }
            }
        }
    }
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineWarning::SampleBelowDepth { depth, samples } => write!(
                f,
                "{} samples below depth {} were dropped: {}",
                samples.len(),
                depth,
                samples.join(", ")
            ),
            PipelineWarning::DecontaminationSkipped { selector } => {
                write!(f, "Decontamination skipped: no control samples selected by {}", selector)
            }
        }
    }
}

/// Pipeline configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Name of the pipeline.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Steps to execute.
    pub steps: Vec<PipelineStep>,
}

impl PipelineConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(PrepError::from)
    }

    /// Load from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(PrepError::from)
    }
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Pipeline name.
    pub name: String,
    /// The processed dataset.
    pub dataset: Dataset,
    /// One report per executed step, in order.
    pub reports: Vec<FilterReport>,
    /// Report of the last decontamination step, if one ran.
    pub contaminants: Option<ContaminantReport>,
    /// Depth and seed of the last rarefaction step, if one ran.
    pub rarefaction: Option<(u64, u64)>,
    pub warnings: Vec<PipelineWarning>,
}

/// Builder for constructing and running preprocessing pipelines.
#[derive(Debug, Clone)]
pub struct Pipeline {
    steps: Vec<PipelineStep>,
    name: String,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create a new empty pipeline.
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            name: "unnamed".to_string(),
        }
    }

    /// Create from a config.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            steps: config.steps.clone(),
            name: config.name.clone(),
        }
    }

    /// Set the pipeline name.
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    /// Append an arbitrary step.
    pub fn step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Drop taxa matching any lineage rule.
    pub fn filter_lineage(self, rules: Vec<LineageRule>) -> Self {
        self.step(PipelineStep::FilterLineage { rules })
    }

    /// Drop mitochondria and chloroplasts.
    pub fn filter_organelles(self) -> Self {
        self.filter_lineage(LineageRule::organelles())
    }

    pub fn drop_zero_sum(self) -> Self {
        self.step(PipelineStep::DropZeroSum)
    }

    /// Drop taxa holding less than `min_fraction` of all reads.
    pub fn filter_abundance(self, min_fraction: f64) -> Self {
        self.step(PipelineStep::FilterAbundance { min_fraction })
    }

    pub fn remove_taxa<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.step(PipelineStep::RemoveTaxa {
            ids: ids.into_iter().map(Into::into).collect(),
        })
    }

    pub fn exclude_samples<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.step(PipelineStep::ExcludeSamples {
            ids: ids.into_iter().map(Into::into).collect(),
        })
    }

    /// Keep (`keep = true`) or drop the samples `selector` matches.
    pub fn filter_samples(self, selector: SampleSelector, keep: bool) -> Self {
        self.step(PipelineStep::FilterSamples { selector, keep })
    }

    /// Detect contaminants against `controls`; remove them only when `apply` is set.
    pub fn decontaminate(self, controls: SampleSelector, threshold: f64, apply: bool) -> Self {
        self.step(PipelineStep::Decontaminate {
            controls,
            threshold,
            apply,
            required: false,
        })
    }

    /// Rarefy to `depth`, or to the smallest non-empty library size when `None`.
    pub fn rarefy(self, depth: Option<u64>, seed: u64) -> Self {
        self.step(PipelineStep::Rarefy { depth, seed })
    }

    /// Convert to config for serialization.
    pub fn to_config(&self, description: Option<&str>) -> PipelineConfig {
        PipelineConfig {
            name: self.name.clone(),
            description: description.map(String::from),
            steps: self.steps.clone(),
        }
    }

    /// Check step parameters and ordering without touching any data.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(PrepError::Pipeline("Pipeline has no steps".to_string()));
        }

        let mut rarefied = false;
        for (i, step) in self.steps.iter().enumerate() {
            let invalid = |msg: String| {
                PrepError::Pipeline(format!("Step {} ({}): {}", i + 1, step.name(), msg))
            };
            match step {
                PipelineStep::FilterAbundance { min_fraction } => {
                    if !(0.0..=1.0).contains(min_fraction) {
                        return Err(invalid(format!(
                            "min_fraction {} is not between 0 and 1",
                            min_fraction
                        )));
                    }
                }
                PipelineStep::Decontaminate { threshold, .. } => {
                    if !(0.0..=1.0).contains(threshold) {
                        return Err(invalid(format!(
                            "threshold {} is not between 0 and 1",
                            threshold
                        )));
                    }
                    if rarefied {
                        return Err(invalid(
                            "decontamination must run before rarefaction".to_string(),
                        ));
                    }
                }
                PipelineStep::Rarefy { depth, .. } => {
                    if *depth == Some(0) {
                        return Err(invalid("depth must be positive".to_string()));
                    }
                    rarefied = true;
                }
                PipelineStep::FilterLineage { rules } => {
                    if rules.is_empty() {
                        return Err(invalid("no lineage rules given".to_string()));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Run the pipeline on a dataset.
    ///
    /// Steps run in order, each on the previous step's output. The input is
    /// never modified.
    pub fn run(&self, dataset: &Dataset) -> Result<PipelineOutput> {
        self.validate()?;
        info!(
            "Running pipeline '{}' ({} steps) on {} taxa x {} samples",
            self.name,
            self.steps.len(),
            dataset.n_taxa(),
            dataset.n_samples()
        );

        let mut state = PipelineState::new(dataset.clone());
        for (i, step) in self.steps.iter().enumerate() {
            state = state.apply(step).map_err(|e| {
                error!("Step {} ({}) failed: {}", i + 1, step.name(), e);
                e
            })?;
        }

        Ok(state.finalize(&self.name))
    }
}

/// Internal state during pipeline execution.
struct PipelineState {
    dataset: Dataset,
    reports: Vec<FilterReport>,
    contaminants: Option<ContaminantReport>,
    rarefaction: Option<(u64, u64)>,
    warnings: Vec<PipelineWarning>,
}

impl PipelineState {
    fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            reports: Vec::new(),
            contaminants: None,
            rarefaction: None,
            warnings: Vec::new(),
        }
    }

    fn apply(mut self, step: &PipelineStep) -> Result<Self> {
        let next = match step {
            PipelineStep::FilterLineage { rules } => filter_lineage(&self.dataset, rules)?,
            PipelineStep::DropZeroSum => drop_zero_sum_taxa(&self.dataset)?,
            PipelineStep::FilterAbundance { min_fraction } => {
                filter_relative_abundance(&self.dataset, *min_fraction)?
            }
            PipelineStep::RemoveTaxa { ids } => {
                let ids: HashSet<String> = ids.iter().cloned().collect();
                remove_taxa(&self.dataset, &ids)?
            }
            PipelineStep::ExcludeSamples { ids } => {
                let ids: HashSet<String> = ids.iter().cloned().collect();
                exclude_samples(&self.dataset, &ids)?
            }
            PipelineStep::FilterSamples { selector, keep } => {
                filter_samples(&self.dataset, selector, *keep)?
            }
            PipelineStep::Decontaminate {
                controls,
                threshold,
                apply,
                required,
            } => match detect_contaminants(&self.dataset, controls, *threshold) {
                Ok(report) => {
                    let next = if *apply {
                        remove_taxa(&self.dataset, &report.flagged().into_iter().collect())?
                    } else {
                        self.dataset.clone()
                    };
                    self.contaminants = Some(report);
                    next
                }
                Err(PrepError::EmptyControlSet { selector }) if !*required => {
                    warn!(
                        "No control samples selected by {}; skipping decontamination",
                        selector
                    );
                    self.warnings
                        .push(PipelineWarning::DecontaminationSkipped { selector });
                    self.dataset.clone()
                }
                Err(e) => return Err(e),
            },
            PipelineStep::Rarefy { depth, seed } => {
                let depth = match depth {
                    Some(d) => *d,
                    None => min_library_size(&self.dataset).ok_or_else(|| {
                        PrepError::EmptyData("No sample has any reads to rarefy".to_string())
                    })?,
                };
                if depth == 0 {
                    return Err(PrepError::InvalidParameter(
                        "Rarefaction depth must be positive".to_string(),
                    ));
                }
                let rarefied = rarefy(&self.dataset, depth, *seed)?;
                if let Some(w) = rarefied.warning {
                    self.warnings.push(w.into());
                }
                self.rarefaction = Some((rarefied.depth, rarefied.seed));
                rarefied.dataset
            }
        };

        let report = FilterReport::between(step.name(), &self.dataset, &next);
        info!("{}", report);
        self.reports.push(report);
        self.dataset = next;
        Ok(self)
    }

    fn finalize(self, name: &str) -> PipelineOutput {
        PipelineOutput {
            name: name.to_string(),
            dataset: self.dataset,
            reports: self.reports,
            contaminants: self.contaminants,
            rarefaction: self.rarefaction,
            warnings: self.warnings,
        }
    }
}

/// Convenience function for the common amplicon preprocessing chain.
///
/// Drops organelle lineages, flags contaminants found in `controls`, drops the
/// controls themselves, then rarefies. Flagged taxa are removed only when
/// `apply_contaminants` is set; otherwise they stay in the dataset and the
/// table is returned in `PipelineOutput::contaminants` for review.
pub fn run_standard(
    dataset: &Dataset,
    controls: &SampleSelector,
    contaminant_threshold: f64,
    apply_contaminants: bool,
    depth: Option<u64>,
    seed: u64,
) -> Result<PipelineOutput> {
    Pipeline::new()
        .name("standard")
        .filter_organelles()
        .drop_zero_sum()
        .decontaminate(controls.clone(), contaminant_threshold, apply_contaminants)
        .filter_samples(controls.clone(), false)
        .drop_zero_sum()
        .rarefy(depth, seed)
        .run(dataset)
}
