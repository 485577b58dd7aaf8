//! The joined count/taxonomy/metadata/tree unit every stage operates on.

use crate::data::{CountMatrix, Lineage, Metadata, PhyloTree, TaxonomyTable};
use crate::error::{PrepError, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Locations of the input tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetPaths {
    pub counts: PathBuf,
    pub taxonomy: PathBuf,
    pub metadata: PathBuf,
    pub tree: Option<PathBuf>,
}

/// A consistency-checked dataset.
///
/// The count matrix defines the order of taxa and samples. The taxonomy rows
/// follow the matrix rows, the metadata rows follow the matrix columns, and
/// the tree (when present) has exactly the matrix taxa as tips. Every
/// constructor and subset re-checks this.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    counts: CountMatrix,
    taxonomy: TaxonomyTable,
    metadata: Metadata,
    tree: Option<PhyloTree>,
}

impl Dataset {
    /// Assemble a dataset from already-aligned parts.
    pub fn new(
        counts: CountMatrix,
        taxonomy: TaxonomyTable,
        metadata: Metadata,
        tree: Option<PhyloTree>,
    ) -> Result<Self> {
        let ds = Self {
            counts,
            taxonomy,
            metadata,
            tree,
        };
        ds.validate()?;
        Ok(ds)
    }

    /// Assemble a dataset, aligning taxonomy, metadata and tree to the matrix.
    ///
    /// Matrix taxa absent from the taxonomy, matrix samples absent from the
    /// metadata, and matrix taxa absent from the tree are `SchemaMismatch`.
    /// Surplus taxonomy rows, metadata rows and tree tips are dropped.
    pub fn align(
        counts: CountMatrix,
        taxonomy: TaxonomyTable,
        metadata: Metadata,
        tree: Option<PhyloTree>,
    ) -> Result<Self> {
        let missing_taxa: Vec<&String> = counts
            .taxon_ids()
            .iter()
            .filter(|id| !taxonomy.contains(id))
            .collect();
        if !missing_taxa.is_empty() {
            return Err(PrepError::schema_mismatch(
                "taxa in count matrix missing from taxonomy",
                missing_taxa.into_iter().cloned(),
            ));
        }

        let missing_samples: Vec<&String> = counts
            .sample_ids()
            .iter()
            .filter(|id| !metadata.has_sample(id))
            .collect();
        if !missing_samples.is_empty() {
            return Err(PrepError::schema_mismatch(
                "samples in count matrix missing from metadata",
                missing_samples.into_iter().cloned(),
            ));
        }

        if taxonomy.n_taxa() > counts.n_taxa() {
            warn!(
                "Dropping {} taxonomy rows with no counts",
                taxonomy.n_taxa() - counts.n_taxa()
            );
        }
        if metadata.n_samples() > counts.n_samples() {
            warn!(
                "Dropping {} metadata rows with no counts",
                metadata.n_samples() - counts.n_samples()
            );
        }
        let taxonomy = taxonomy.subset(counts.taxon_ids())?;
        let metadata = metadata.subset_samples(counts.sample_ids())?;

        let tree = match tree {
            None => None,
            Some(tree) => {
                let tips: HashSet<&str> = tree.tip_labels().into_iter().collect();
                let missing_tips: Vec<&String> = counts
                    .taxon_ids()
                    .iter()
                    .filter(|id| !tips.contains(id.as_str()))
                    .collect();
                if !missing_tips.is_empty() {
                    return Err(PrepError::schema_mismatch(
                        "taxa in count matrix missing from tree",
                        missing_tips.into_iter().cloned(),
                    ));
                }
                if tips.len() > counts.n_taxa() {
                    warn!(
                        "Pruning {} tree tips with no counts",
                        tips.len() - counts.n_taxa()
                    );
                }
                let keep: HashSet<&str> = counts.taxon_ids().iter().map(String::as_str).collect();
                tree.prune(&keep)
            }
        };

        Self::new(counts, taxonomy, metadata, tree)
    }

    /// Load and align the input tables.
    pub fn load(paths: &DatasetPaths) -> Result<Self> {
        let counts = CountMatrix::from_path(&paths.counts)?;
        let taxonomy = TaxonomyTable::from_path(&paths.taxonomy)?;
        let metadata = Metadata::from_path(&paths.metadata)?;
        let tree = paths.tree.as_ref().map(PhyloTree::from_path).transpose()?;

        let ds = Self::align(counts, taxonomy, metadata, tree)?;
        info!(
            "Loaded dataset: {} taxa x {} samples, {} reads{}",
            ds.n_taxa(),
            ds.n_samples(),
            ds.counts.total(),
            if ds.tree.is_some() { ", with tree" } else { "" }
        );
        Ok(ds)
    }

    /// Check the tri-table invariant.
    pub fn validate(&self) -> Result<()> {
        if self.counts.taxon_ids() != self.taxonomy.taxon_ids() {
            let taxonomy: HashSet<&String> = self.taxonomy.taxon_ids().iter().collect();
            let counts: HashSet<&String> = self.counts.taxon_ids().iter().collect();
            let mut diff: Vec<String> = counts
                .symmetric_difference(&taxonomy)
                .map(|s| s.to_string())
                .collect();
            diff.sort();
            return Err(PrepError::schema_mismatch(
                "count matrix and taxonomy disagree on taxa",
                diff,
            ));
        }
        if self.counts.sample_ids() != self.metadata.sample_ids() {
            let metadata: HashSet<&String> = self.metadata.sample_ids().iter().collect();
            let counts: HashSet<&String> = self.counts.sample_ids().iter().collect();
            let mut diff: Vec<String> = counts
                .symmetric_difference(&metadata)
                .map(|s| s.to_string())
                .collect();
            diff.sort();
            return Err(PrepError::schema_mismatch(
                "count matrix and metadata disagree on samples",
                diff,
            ));
        }
        if let Some(tree) = &self.tree {
            let tips: HashSet<&str> = tree.tip_labels().into_iter().collect();
            let taxa: HashSet<&str> = self.counts.taxon_ids().iter().map(String::as_str).collect();
            if tips != taxa {
                let mut diff: Vec<String> =
                    tips.symmetric_difference(&taxa).map(|s| s.to_string()).collect();
                diff.sort();
                return Err(PrepError::schema_mismatch(
                    "tree tips and count matrix disagree on taxa",
                    diff,
                ));
            }
        }
        Ok(())
    }

    pub fn counts(&self) -> &CountMatrix {
        &self.counts
    }

    pub fn taxonomy(&self) -> &TaxonomyTable {
        &self.taxonomy
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn tree(&self) -> Option<&PhyloTree> {
        self.tree.as_ref()
    }

    pub fn n_taxa(&self) -> usize {
        self.counts.n_taxa()
    }

    pub fn n_samples(&self) -> usize {
        self.counts.n_samples()
    }

    pub fn taxon_ids(&self) -> &[String] {
        self.counts.taxon_ids()
    }

    pub fn sample_ids(&self) -> &[String] {
        self.counts.sample_ids()
    }

    /// Lineage of the taxon at row `row`.
    pub fn lineage_at(&self, row: usize) -> &Lineage {
        &self.taxonomy.lineages()[row]
    }

    /// Keep only the taxa at the given row indices, pruning the tree to match.
    pub fn subset_taxa(&self, indices: &[usize]) -> Result<Self> {
        let counts = self.counts.subset_taxa(indices)?;
        let taxonomy = self.taxonomy.subset(counts.taxon_ids())?;
        let tree = self.tree.as_ref().and_then(|tree| {
            let keep: HashSet<&str> = counts.taxon_ids().iter().map(String::as_str).collect();
            tree.prune(&keep)
        });
        Self::new(counts, taxonomy, self.metadata.clone(), tree)
    }

    /// Keep only the samples at the given column indices.
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let counts = self.counts.subset_samples(indices)?;
        let metadata = self.metadata.subset_samples(counts.sample_ids())?;
        Self::new(counts, self.taxonomy.clone(), metadata, self.tree.clone())
    }

    /// Swap in a count matrix with the same identifiers (e.g. after subsampling).
    pub fn with_counts(&self, counts: CountMatrix) -> Result<Self> {
        Self::new(
            counts,
            self.taxonomy.clone(),
            self.metadata.clone(),
            self.tree.clone(),
        )
    }

    /// Write `counts.csv`, `taxonomy.csv`, `metadata.csv` and `tree.nwk` into `dir`.
    pub fn write_tables<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        self.counts.to_csv(dir.join("counts.csv"))?;
        self.taxonomy.to_csv(dir.join("taxonomy.csv"))?;
        self.metadata.to_csv(dir.join("metadata.csv"))?;
        if let Some(tree) = &self.tree {
            tree.to_file(dir.join("tree.nwk"))?;
        }
        Ok(())
    }
}
