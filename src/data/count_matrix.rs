//! Count matrix with sparse storage for amplicon abundance data.

use crate::data::io::{open_reader, open_writer};
use crate::error::{PrepError, Result};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};
use std::collections::HashMap;
use std::path::Path;

/// A sparse count matrix storing taxon abundances across samples.
///
/// Rows represent taxa (ASVs/OTUs), columns represent samples.
/// Uses CSR (Compressed Sparse Row) format for efficient row-wise operations.
#[derive(Debug, Clone)]
pub struct CountMatrix {
    /// Sparse matrix in CSR format (taxa × samples)
    data: CsMat<u64>,
    /// Taxon identifiers (row names)
    taxon_ids: Vec<String>,
    /// Sample identifiers (column names)
    sample_ids: Vec<String>,
}

impl CountMatrix {
    /// Create a new CountMatrix from a sparse matrix and identifiers.
    pub fn new(data: CsMat<u64>, taxon_ids: Vec<String>, sample_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != taxon_ids.len() {
            return Err(PrepError::DimensionMismatch {
                expected: nrows,
                actual: taxon_ids.len(),
            });
        }
        if ncols != sample_ids.len() {
            return Err(PrepError::DimensionMismatch {
                expected: ncols,
                actual: sample_ids.len(),
            });
        }
        let dup_taxa = duplicates(&taxon_ids);
        if !dup_taxa.is_empty() {
            return Err(PrepError::schema_mismatch(
                "duplicate taxon identifiers in count table",
                dup_taxa,
            ));
        }
        let dup_samples = duplicates(&sample_ids);
        if !dup_samples.is_empty() {
            return Err(PrepError::schema_mismatch(
                "duplicate sample identifiers in count table",
                dup_samples,
            ));
        }
        Ok(Self {
            data,
            taxon_ids,
            sample_ids,
        })
    }

    /// Build from dense rows, one `Vec` per taxon.
    pub fn from_rows(
        rows: &[Vec<u64>],
        taxon_ids: Vec<String>,
        sample_ids: Vec<String>,
    ) -> Result<Self> {
        let n_samples = sample_ids.len();
        let mut tri_mat = TriMat::new((rows.len(), n_samples));
        for (row, values) in rows.iter().enumerate() {
            if values.len() != n_samples {
                return Err(PrepError::DimensionMismatch {
                    expected: n_samples,
                    actual: values.len(),
                });
            }
            for (col, &val) in values.iter().enumerate() {
                if val > 0 {
                    tri_mat.add_triplet(row, col, val);
                }
            }
        }
        Self::new(tri_mat.to_csr(), taxon_ids, sample_ids)
    }

    /// Load a count matrix from a delimited file (tab, or comma for `.csv`).
    ///
    /// Expected format:
    /// - First row: header with sample IDs (first column is the taxon ID header)
    /// - Subsequent rows: taxon ID followed by counts
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = open_reader(path)?;
        let mut records = reader.records();

        let header = records
            .next()
            .ok_or_else(|| PrepError::EmptyData("Empty count table".to_string()))??;
        if header.len() < 2 {
            return Err(PrepError::EmptyData(
                "Count table must have at least one sample".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header.iter().skip(1).map(str::to_string).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, u64)> = Vec::new();
        let mut taxon_ids: Vec<String> = Vec::new();

        for record in records {
            let record = record?;
            let Some(taxon_id) = record.get(0) else {
                continue;
            };
            if taxon_id.is_empty() {
                continue;
            }
            if record.len() != n_samples + 1 {
                return Err(PrepError::RaggedRow {
                    taxon: taxon_id.to_string(),
                    expected: n_samples,
                    actual: record.len() - 1,
                });
            }
            let row_idx = taxon_ids.len();
            taxon_ids.push(taxon_id.to_string());

            for (col_idx, value_str) in record.iter().skip(1).enumerate() {
                let value: u64 = value_str.parse().map_err(|_| PrepError::InvalidCount {
                    value: value_str.to_string(),
                    row: row_idx,
                    col: col_idx,
                })?;
                if value > 0 {
                    triplets.push((row_idx, col_idx, value));
                }
            }
        }

        let n_taxa = taxon_ids.len();
        if n_taxa == 0 {
            return Err(PrepError::EmptyData("No taxa in count table".to_string()));
        }

        let mut tri_mat = TriMat::new((n_taxa, n_samples));
        for (row, col, val) in triplets {
            tri_mat.add_triplet(row, col, val);
        }

        Self::new(tri_mat.to_csr(), taxon_ids, sample_ids)
    }

    /// Write the count matrix as comma-delimited text.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = open_writer(path)?;

        let mut header = Vec::with_capacity(self.n_samples() + 1);
        header.push("taxon_id".to_string());
        header.extend(self.sample_ids.iter().cloned());
        writer.write_record(&header)?;

        for (row_idx, taxon_id) in self.taxon_ids.iter().enumerate() {
            let mut record = Vec::with_capacity(self.n_samples() + 1);
            record.push(taxon_id.clone());
            record.extend(self.row_dense(row_idx).iter().map(u64::to_string));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Get the value at (row, col), returning 0 for missing entries.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u64 {
        self.data.get(row, col).copied().unwrap_or(0)
    }

    /// Number of taxa (rows).
    #[inline]
    pub fn n_taxa(&self) -> usize {
        self.data.rows()
    }

    /// Number of samples (columns).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.cols()
    }

    /// Total number of non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.nnz()
    }

    /// Taxon identifiers.
    #[inline]
    pub fn taxon_ids(&self) -> &[String] {
        &self.taxon_ids
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get the underlying sparse matrix.
    #[inline]
    pub fn data(&self) -> &CsMat<u64> {
        &self.data
    }

    /// Get a dense vector for a specific row (taxon).
    pub fn row_dense(&self, row: usize) -> Vec<u64> {
        let mut dense = vec![0u64; self.n_samples()];
        if let Some(row_vec) = self.data.outer_view(row) {
            for (col, &val) in row_vec.iter() {
                dense[col] = val;
            }
        }
        dense
    }

    /// Get a dense vector for a specific column (sample).
    pub fn col_dense(&self, col: usize) -> Vec<u64> {
        (0..self.n_taxa()).map(|row| self.get(row, col)).collect()
    }

    /// Compute row sums (total counts per taxon).
    pub fn row_sums(&self) -> Vec<u64> {
        (0..self.n_taxa())
            .into_par_iter()
            .map(|row| {
                self.data
                    .outer_view(row)
                    .map(|v| v.iter().map(|(_, &val)| val).sum())
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Compute column sums (library sizes per sample).
    pub fn col_sums(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.n_samples()];
        for row_vec in self.data.outer_iterator() {
            for (col, &val) in row_vec.iter() {
                sums[col] += val;
            }
        }
        sums
    }

    /// Sum of every count in the matrix.
    pub fn total(&self) -> u64 {
        self.data.data().iter().sum()
    }

    /// Subset the matrix to include only specified taxa (by index).
    pub fn subset_taxa(&self, indices: &[usize]) -> Result<Self> {
        let n_taxa = indices.len();
        let n_samples = self.n_samples();

        let mut tri_mat = TriMat::new((n_taxa, n_samples));
        let mut new_taxon_ids = Vec::with_capacity(n_taxa);

        for (new_row, &old_row) in indices.iter().enumerate() {
            if old_row >= self.n_taxa() {
                return Err(PrepError::InvalidParameter(format!(
                    "Taxon index {} out of bounds",
                    old_row
                )));
            }
            new_taxon_ids.push(self.taxon_ids[old_row].clone());

            if let Some(row_vec) = self.data.outer_view(old_row) {
                for (col, &val) in row_vec.iter() {
                    tri_mat.add_triplet(new_row, col, val);
                }
            }
        }

        Self::new(tri_mat.to_csr(), new_taxon_ids, self.sample_ids.clone())
    }

    /// Subset the matrix to include only specified samples (by index).
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let n_taxa = self.n_taxa();
        let n_samples = indices.len();

        let col_map: HashMap<usize, usize> = indices
            .iter()
            .enumerate()
            .map(|(new_idx, &old_idx)| (old_idx, new_idx))
            .collect();

        let mut new_sample_ids = Vec::with_capacity(n_samples);
        for &old_col in indices {
            if old_col >= self.n_samples() {
                return Err(PrepError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    old_col
                )));
            }
            new_sample_ids.push(self.sample_ids[old_col].clone());
        }

        let mut tri_mat = TriMat::new((n_taxa, n_samples));
        for (row, row_vec) in self.data.outer_iterator().enumerate() {
            for (old_col, &val) in row_vec.iter() {
                if let Some(&new_col) = col_map.get(&old_col) {
                    tri_mat.add_triplet(row, new_col, val);
                }
            }
        }

        Self::new(tri_mat.to_csr(), self.taxon_ids.clone(), new_sample_ids)
    }

    /// Replace every sample column with new dense counts, keeping identifiers.
    ///
    /// `columns[j]` holds the per-taxon counts of sample `j`.
    pub fn with_columns(&self, columns: &[Vec<u64>]) -> Result<Self> {
        if columns.len() != self.n_samples() {
            return Err(PrepError::DimensionMismatch {
                expected: self.n_samples(),
                actual: columns.len(),
            });
        }
        let mut tri_mat = TriMat::new((self.n_taxa(), self.n_samples()));
        for (col, values) in columns.iter().enumerate() {
            if values.len() != self.n_taxa() {
                return Err(PrepError::DimensionMismatch {
                    expected: self.n_taxa(),
                    actual: values.len(),
                });
            }
            for (row, &val) in values.iter().enumerate() {
                if val > 0 {
                    tri_mat.add_triplet(row, col, val);
                }
            }
        }
        Self::new(
            tri_mat.to_csr(),
            self.taxon_ids.clone(),
            self.sample_ids.clone(),
        )
    }
}

/// Identifiers occurring more than once, each reported once in first-seen order.
fn duplicates(ids: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(ids.len());
    let mut dups = Vec::new();
    for id in ids {
        let count = seen.entry(id.as_str()).or_insert(0);
        *count += 1;
        if *count == 2 {
            dups.push(id.clone());
        }
    }
    dups
}

impl PartialEq for CountMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.taxon_ids == other.taxon_ids
            && self.sample_ids == other.sample_ids
            && (0..self.n_taxa()).all(|row| self.row_dense(row) == other.row_dense(row))
    }
}
