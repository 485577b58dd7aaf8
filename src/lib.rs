//! Amplicon Preprocessing Library
//!
//! This library turns raw 16S amplicon tables into an analysis-ready dataset:
//! it loads and cross-checks the count, taxonomy, metadata and tree inputs,
//! removes unwanted lineages and samples, flags reagent contaminants found in
//! negative controls, and rarefies every sample to a common depth.
//!
//! # Overview
//!
//! The library is organized into composable modules:
//!
//! - **data**: Core data structures (CountMatrix, TaxonomyTable, Metadata, PhyloTree, Dataset)
//! - **filter**: Lineage, sample, zero-sum and relative-abundance filters
//! - **decontam**: Contaminant detection from negative controls
//! - **rarefy**: Seeded subsampling to an even depth, and rarefaction curves
//! - **diversity**: Alpha diversity and Bray-Curtis dissimilarity
//! - **profile**: Data profiling (library size, sparsity)
//! - **pipeline**: Pipeline composition and execution
//!
//! # Example
//!
//! ```no_run
//! use amplicon_prep::prelude::*;
//!
//! let dataset = Dataset::load(&DatasetPaths {
//!     counts: "counts.tsv".into(),
//!     taxonomy: "taxonomy.tsv".into(),
//!     metadata: "metadata.tsv".into(),
//!     tree: None,
//! })
//! .unwrap();
//!
//! let output = Pipeline::new()
//!     .filter_organelles()
//!     .drop_zero_sum()
//!     .decontaminate(SampleSelector::column_equals("SampleType", "NegCtrl"), 0.4, true)
//!     .rarefy(Some(1000), 711)
//!     .run(&dataset)
//!     .unwrap();
//!
//! write_outputs(&output, "results").unwrap();
//! ```

pub mod data;
pub mod decontam;
pub mod diversity;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod profile;
pub mod rarefy;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::data::{
        CountMatrix, Dataset, DatasetPaths, Lineage, Metadata, PhyloTree, Rank, TaxonomyTable,
        Variable, VariableType,
    };
    pub use crate::decontam::{detect_contaminants, ContaminantRecord, ContaminantReport};
    pub use crate::diversity::{
        alpha_diversity, bray_curtis, bray_curtis_matrix, AlphaDiversity, AlphaTable,
        DistanceMatrix,
    };
    pub use crate::error::{PrepError, Result};
    pub use crate::filter::{
        drop_zero_sum_taxa, exclude_samples, filter_lineage, filter_relative_abundance,
        filter_samples, remove_taxa, FilterReport, LineageRule, SampleSelector,
    };
    pub use crate::pipeline::{
        run_standard, write_outputs, Pipeline, PipelineConfig, PipelineOutput, PipelineStep,
        PipelineWarning, RunSummary,
    };
    pub use crate::profile::{
        profile_library_size, profile_sparsity, LibrarySizeProfile, SparsityProfile,
    };
    pub use crate::rarefy::{
        min_library_size, rarefaction_curve, rarefy, RarefactionCurve, Rarefied, RarefyWarning,
    };
}
