//! Dataset Module - Tabular Flow Records
//!
//! Loads labelled flow tables from CSV, subsamples them per class and
//! produces the quick exploratory summary printed by `pratiraksha analyze`.
//! `writer` produces labelled CSVs from simulated flows.

pub mod table;
pub mod summary;
pub mod writer;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

pub use summary::DatasetSummary;
pub use table::FlowTable;
pub use writer::DatasetWriter;

/// Default label column
pub const LABEL_COLUMN: &str = "Label";

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug)]
pub enum DatasetError {
    Io(std::io::Error),
    Csv(csv::Error),
    MissingLabel(String),
    Parse { row: usize, column: String, value: String },
    Empty(PathBuf),
    Shape(String),
}

impl std::fmt::Display for DatasetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetError::Io(e) => write!(f, "DatasetError: io: {}", e),
            DatasetError::Csv(e) => write!(f, "DatasetError: csv: {}", e),
            DatasetError::MissingLabel(col) => write!(f, "DatasetError: label column '{}' not found", col),
            DatasetError::Parse { row, column, value } => write!(
                f,
                "DatasetError: row {} column '{}': '{}' is not numeric",
                row, column, value
            ),
            DatasetError::Empty(path) => write!(f, "DatasetError: {} has no data rows", path.display()),
            DatasetError::Shape(msg) => write!(f, "DatasetError: {}", msg),
        }
    }
}

impl std::error::Error for DatasetError {}

impl From<std::io::Error> for DatasetError {
    fn from(e: std::io::Error) -> Self {
        DatasetError::Io(e)
    }
}

impl From<csv::Error> for DatasetError {
    fn from(e: csv::Error) -> Self {
        DatasetError::Csv(e)
    }
}

/// Load `primary`, or `fallback` when the primary file does not exist
pub fn load_with_fallback(
    primary: &Path,
    fallback: Option<&Path>,
    label_column: &str,
    nrows: Option<usize>,
) -> Result<FlowTable, DatasetError> {
    log::info!("Loading dataset from {}...", primary.display());

    let table = match (primary.exists(), fallback) {
        (false, Some(alt)) => {
            log::warn!(
                "Dataset not found at {}, trying alternative path {}...",
                primary.display(),
                alt.display()
            );
            FlowTable::from_csv(alt, label_column, nrows)?
        }
        _ => FlowTable::from_csv(primary, label_column, nrows)?,
    };

    log::info!("Loaded dataset: {} samples, {} features", table.len(), table.n_features());
    for (label, count) in table.class_counts() {
        log::info!("   {:<15} {}", label, count);
    }

    Ok(table)
}
