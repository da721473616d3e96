use std::fs::{self, File};
use std::path::Path;

use crate::logic::features::{FlowRecord, FLOW_FEATURE_LAYOUT};
use crate::logic::threat::ThreatClass;
use super::{DatasetError, LABEL_COLUMN};

/// Labelled CSV in the runtime feature layout
///
/// Rows are the *encoded* flow features, so a model trained on the output
/// sees exactly what the detector feeds it at runtime.
pub struct DatasetWriter {
    writer: csv::Writer<File>,
    rows: usize,
}

impl DatasetWriter {
    pub fn create(path: &Path) -> Result<Self, DatasetError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(path)?;
        let header = FLOW_FEATURE_LAYOUT.iter().copied().chain(std::iter::once(LABEL_COLUMN));
        writer.write_record(header)?;

        Ok(Self { writer, rows: 0 })
    }

    pub fn append(&mut self, flow: &FlowRecord, label: ThreatClass) -> Result<(), DatasetError> {
        let mut record: Vec<String> = flow.features().iter().map(|v| v.to_string()).collect();
        record.push(label.as_str().to_string());

        self.writer.write_record(&record)?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and return the number of data rows written
    pub fn finish(mut self) -> Result<usize, DatasetError> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}
