//! Core data structures: count matrix, taxonomy, metadata, tree and the joined dataset.

mod count_matrix;
mod dataset;
pub mod io;
mod metadata;
mod taxonomy;
mod tree;

pub use count_matrix::CountMatrix;
pub use dataset::{Dataset, DatasetPaths};
pub use metadata::{Metadata, Variable, VariableType};
pub use taxonomy::{Lineage, Rank, TaxonomyTable};
pub use tree::PhyloTree;
