//! Pipeline composition and execution for amplicon preprocessing.

mod runner;
mod summary;

pub use runner::{
    run_standard, Pipeline, PipelineConfig, PipelineOutput, PipelineStep, PipelineWarning,
    DEFAULT_CONTAMINANT_THRESHOLD, DEFAULT_SEED,
};
pub use summary::{write_outputs, RunSummary};
