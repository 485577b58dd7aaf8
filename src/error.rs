//! Error types for the amplicon-prep library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum PrepError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid count value '{value}' at row {row}, column {col}")]
    InvalidCount {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Row '{taxon}' has {actual} count cells, expected {expected}")]
    RaggedRow {
        taxon: String,
        expected: usize,
        actual: usize,
    },

    /// Input tables disagree on identifiers.
    #[error("Schema mismatch: {what}: {}", format_ids(.ids))]
    SchemaMismatch { what: String, ids: Vec<String> },

    /// The control-sample selector matched nothing.
    #[error("No control samples selected by {selector}")]
    EmptyControlSet { selector: String },

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("Newick parse error: {0}")]
    TreeParse(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PrepError {
    /// Build a `SchemaMismatch` from any iterator of identifiers.
    pub fn schema_mismatch<I, S>(what: &str, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PrepError::SchemaMismatch {
            what: what.to_string(),
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }
}

/// Show at most five identifiers, then a count of the rest.
fn format_ids(ids: &[String]) -> String {
    const SHOWN: usize = 5;
    let head = ids.iter().take(SHOWN).cloned().collect::<Vec<_>>().join(", ");
    if ids.len() > SHOWN {
        format!("{} (and {} more)", head, ids.len() - SHOWN)
    } else {
        head
    }
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, PrepError>;
