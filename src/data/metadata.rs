//! Sample metadata keyed by sample identifier.

use crate::data::io::{is_missing, open_reader, open_writer};
use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

/// A metadata value: categorical, continuous, or missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variable {
    /// Categorical variable with string levels.
    Categorical(String),
    /// Continuous numeric variable.
    Continuous(f64),
    /// Missing value.
    Missing,
}

impl Variable {
    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Variable::Missing)
    }

    /// Try to get as categorical string.
    pub fn as_categorical(&self) -> Option<&str> {
        match self {
            Variable::Categorical(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as continuous f64.
    pub fn as_continuous(&self) -> Option<f64> {
        match self {
            Variable::Continuous(v) => Some(*v),
            _ => None,
        }
    }

    /// Compare against a textual level.
    ///
    /// Continuous values match when the level parses to the same number, so
    /// `"2"` matches `Continuous(2.0)`.
    pub fn matches(&self, level: &str) -> bool {
        match self {
            Variable::Categorical(s) => s == level,
            Variable::Continuous(v) => level.trim().parse::<f64>().is_ok_and(|l| l == *v),
            Variable::Missing => is_missing(level),
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Categorical(s) => f.write_str(s),
            Variable::Continuous(v) => write!(f, "{}", v),
            Variable::Missing => f.write_str("NA"),
        }
    }
}

/// Inferred type of a metadata column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableType {
    Categorical,
    Continuous,
}

/// Sample metadata containing variables for each sample.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    /// Sample IDs in order.
    sample_ids: Vec<String>,
    /// Column names.
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> Variable.
    data: HashMap<String, HashMap<String, Variable>>,
    /// Type of each column.
    column_types: HashMap<String, VariableType>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build metadata from raw string rows, inferring column types.
    ///
    /// Columns are continuous if every non-missing value parses as a number,
    /// otherwise categorical.
    pub fn from_rows(column_names: Vec<String>, rows: Vec<(String, Vec<String>)>) -> Result<Self> {
        let mut column_types = HashMap::new();
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let all_numeric = rows.iter().all(|(_, values)| match values.get(col_idx) {
                None => true,
                Some(v) => is_missing(v) || v.trim().parse::<f64>().is_ok(),
            });
            let var_type = if all_numeric {
                VariableType::Continuous
            } else {
                VariableType::Categorical
            };
            column_types.insert(col_name.clone(), var_type);
        }

        let mut sample_ids = Vec::with_capacity(rows.len());
        let mut data = HashMap::with_capacity(rows.len());
        let mut duplicates = Vec::new();

        for (sample_id, values) in rows {
            let mut sample_data = HashMap::new();
            for (col_idx, col_name) in column_names.iter().enumerate() {
                let var = match values.get(col_idx).map(|v| v.trim()) {
                    None => Variable::Missing,
                    Some(raw) if is_missing(raw) => Variable::Missing,
                    Some(raw) => match column_types.get(col_name) {
                        Some(VariableType::Continuous) => raw
                            .parse::<f64>()
                            .map(Variable::Continuous)
                            .unwrap_or(Variable::Missing),
                        _ => Variable::Categorical(raw.to_string()),
                    },
                };
                sample_data.insert(col_name.clone(), var);
            }
            if data.insert(sample_id.clone(), sample_data).is_some() {
                duplicates.push(sample_id);
            } else {
                sample_ids.push(sample_id);
            }
        }

        if !duplicates.is_empty() {
            return Err(PrepError::schema_mismatch(
                "duplicate sample identifiers in metadata",
                duplicates,
            ));
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
            column_types,
        })
    }

    /// Load metadata from a delimited file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is sample ID)
    /// - Subsequent rows: sample ID followed by variable values
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut reader = open_reader(path)?;
        let mut records = reader.records();

        let header = records
            .next()
            .ok_or_else(|| PrepError::EmptyData("Empty metadata file".to_string()))??;
        if header.len() < 2 {
            return Err(PrepError::EmptyData(
                "Metadata must have at least one variable column".to_string(),
            ));
        }
        let column_names: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in records {
            let record = record?;
            let Some(sample_id) = record.get(0) else {
                continue;
            };
            if sample_id.is_empty() {
                continue;
            }
            let values = record.iter().skip(1).map(str::to_string).collect();
            rows.push((sample_id.to_string(), values));
        }

        if rows.is_empty() {
            return Err(PrepError::EmptyData("No samples in metadata".to_string()));
        }
        Self::from_rows(column_names, rows)
    }

    /// Write metadata as comma-delimited text.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = open_writer(path)?;
        let mut header = vec!["sample_id".to_string()];
        header.extend(self.column_names.iter().cloned());
        writer.write_record(&header)?;

        for sid in &self.sample_ids {
            let mut record = vec![sid.clone()];
            for col in &self.column_names {
                let value = self
                    .get(sid, col)
                    .map(|v| match v {
                        Variable::Missing => String::new(),
                        other => other.to_string(),
                    })
                    .unwrap_or_default();
                record.push(value);
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Sample IDs in order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Number of columns (variables).
    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Get a variable value for a specific sample and column.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&Variable> {
        self.data.get(sample_id).and_then(|m| m.get(column))
    }

    /// Get all values for a column, in sample order.
    pub fn column(&self, column: &str) -> Result<Vec<&Variable>> {
        if !self.has_column(column) {
            return Err(PrepError::MissingColumn(column.to_string()));
        }
        Ok(self
            .sample_ids
            .iter()
            .map(|sid| {
                self.data
                    .get(sid)
                    .and_then(|m| m.get(column))
                    .unwrap_or(&Variable::Missing)
            })
            .collect())
    }

    /// Get the type of a column.
    pub fn column_type(&self, column: &str) -> Option<VariableType> {
        self.column_types.get(column).copied()
    }

    /// Distinct non-missing levels of a column, sorted.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        let values = self.column(column)?;
        let levels: BTreeSet<String> = values
            .iter()
            .filter(|v| !v.is_missing())
            .map(|v| v.to_string())
            .collect();
        Ok(levels.into_iter().collect())
    }

    /// Subset metadata to exactly the given samples, in the given order.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let mut new_data = HashMap::with_capacity(sample_ids.len());
        let mut missing = Vec::new();

        for sid in sample_ids {
            match self.data.get(sid) {
                Some(sample_data) => {
                    new_data.insert(sid.clone(), sample_data.clone());
                }
                None => missing.push(sid.clone()),
            }
        }

        if !missing.is_empty() {
            return Err(PrepError::schema_mismatch(
                "samples missing from metadata",
                missing,
            ));
        }

        Ok(Self {
            sample_ids: sample_ids.to_vec(),
            column_names: self.column_names.clone(),
            data: new_data,
            column_types: self.column_types.clone(),
        })
    }

    /// Check if a sample exists.
    pub fn has_sample(&self, sample_id: &str) -> bool {
        self.data.contains_key(sample_id)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_tsv() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".tsv").tempfile().unwrap();
        writeln!(file, "sample_id\tSampleType\tStage\tDepth").unwrap();
        writeln!(file, "S1\tCoral\tpre\t12").unwrap();
        writeln!(file, "S2\tNegCtrl\tNA\t").unwrap();
        writeln!(file, "S3\tCoral\tpost\t15").unwrap();
        writeln!(file, "S4\tMock\tNA\t0").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_metadata() {
        let file = create_test_tsv();
        let meta = Metadata::from_path(file.path()).unwrap();

        assert_eq!(meta.n_samples(), 4);
        assert_eq!(meta.n_columns(), 3);
        assert_eq!(meta.sample_ids(), &["S1", "S2", "S3", "S4"]);
        assert_eq!(meta.column_names(), &["SampleType", "Stage", "Depth"]);
    }

    #[test]
    fn test_column_type_inference() {
        let file = create_test_tsv();
        let meta = Metadata::from_path(file.path()).unwrap();

        assert_eq!(meta.column_type("SampleType"), Some(VariableType::Categorical));
        assert_eq!(meta.column_type("Depth"), Some(VariableType::Continuous));
        assert_eq!(meta.get("S3", "Depth").unwrap().as_continuous(), Some(15.0));
        assert!(meta.get("S2", "Depth").unwrap().is_missing());
        assert!(meta.get("S2", "Stage").unwrap().is_missing());
    }

    #[test]
    fn test_matches() {
        assert!(Variable::Categorical("NegCtrl".into()).matches("NegCtrl"));
        assert!(!Variable::Categorical("NegCtrl".into()).matches("negctrl"));
        assert!(Variable::Continuous(2.0).matches("2"));
        assert!(!Variable::Continuous(2.0).matches("two"));
        assert!(Variable::Missing.matches("NA"));
    }

    #[test]
    fn test_levels() {
        let file = create_test_tsv();
        let meta = Metadata::from_path(file.path()).unwrap();

        let levels = meta.levels("SampleType").unwrap();
        assert_eq!(levels, vec!["Coral", "Mock", "NegCtrl"]);
        assert!(matches!(meta.levels("nope"), Err(PrepError::MissingColumn(_))));
    }

    #[test]
    fn test_subset_samples() {
        let file = create_test_tsv();
        let meta = Metadata::from_path(file.path()).unwrap();

        let subset = meta
            .subset_samples(&["S3".to_string(), "S1".to_string()])
            .unwrap();
        assert_eq!(subset.sample_ids(), &["S3", "S1"]);

        let err = meta.subset_samples(&["S9".to_string()]);
        assert!(matches!(err, Err(PrepError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_duplicate_samples_rejected() {
        let rows = vec![
            ("S1".to_string(), vec!["a".to_string()]),
            ("S1".to_string(), vec!["b".to_string()]),
        ];
        let err = Metadata::from_rows(vec!["g".to_string()], rows);
        assert!(matches!(err, Err(PrepError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_csv_roundtrip() {
        let file = create_test_tsv();
        let meta = Metadata::from_path(file.path()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.csv");
        meta.to_csv(&path).unwrap();

        let loaded = Metadata::from_path(&path).unwrap();
        assert_eq!(loaded, meta);
    }
}
