//! Labelled tabular view over the event matrix.

use super::channels::ChannelMapping;
use crate::error::{AppResult, CytoError};
use ndarray::{ArrayView1, ArrayView2};
use std::path::Path;
use tracing::info;

/// Event data with `"{channel}_{marker}"` column names, borrowed from an [`FcsFile`].
///
/// [`FcsFile`]: super::FcsFile
#[derive(Debug, Clone)]
pub struct EventTable<'a> {
    columns: Vec<String>,
    data: ArrayView2<'a, f32>,
}

impl<'a> EventTable<'a> {
    /// Build the view; column names follow the mapping order.
    pub fn new(mappings: &[ChannelMapping], data: ArrayView2<'a, f32>) -> Self {
        Self {
            columns: mappings.iter().map(ChannelMapping::column_name).collect(),
            data,
        }
    }

    /// Column names.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows (events).
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    /// Whether the table holds no events.
    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// Values of one column by name.
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f32>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(self.data.column(index))
    }

    /// The underlying matrix.
    pub fn data(&self) -> ArrayView2<'a, f32> {
        self.data
    }

    /// Write the table as CSV with a header row.
    #[cfg(feature = "storage_csv")]
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let path = path.as_ref();
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.columns)?;
        for row in self.data.rows() {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush().map_err(CytoError::Io)?;
        info!(path = %path.display(), events = self.len(), "Wrote event table");
        Ok(())
    }

    /// Write the table as CSV with a header row.
    #[cfg(not(feature = "storage_csv"))]
    pub fn write_csv<P: AsRef<Path>>(&self, _path: P) -> AppResult<()> {
        Err(CytoError::FeatureNotEnabled("storage_csv".to_string()))
    }
}
