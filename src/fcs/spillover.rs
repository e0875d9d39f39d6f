//! Spillover (compensation) matrix recovery.
//!
//! The embedded form is a single comma separated string
//! `n,<label_1>,...,<label_n>,<v_11>,...,<v_nn>` with values in row-major order.
//! An external matrix is a CSV table whose header row holds the channel labels.

use crate::error::{AppResult, CytoError};
use nalgebra::DMatrix;
use std::path::Path;
use tracing::debug;

/// TEXT keywords that may carry the embedded matrix, in lookup order.
pub const SPILLOVER_KEYS: [&str; 2] = ["spill", "spillover"];

/// Square matrix labelled by channel on both axes.
#[derive(Debug, Clone, PartialEq)]
pub struct SpilloverMatrix {
    labels: Vec<String>,
    values: DMatrix<f64>,
}

impl SpilloverMatrix {
    /// Build a matrix from labels and row-major values.
    pub fn new(labels: Vec<String>, row_major: Vec<f64>) -> AppResult<Self> {
        let n = labels.len();
        if row_major.len() != n * n {
            return Err(CytoError::Spillover(format!(
                "expected {} values for a {n}x{n} matrix, found {}",
                n * n,
                row_major.len()
            )));
        }
        Ok(Self {
            labels,
            values: DMatrix::from_row_slice(n, n, &row_major),
        })
    }

    /// Decode the embedded FCS string form.
    pub fn decode(matrix_string: &str) -> AppResult<Self> {
        let tokens: Vec<&str> = matrix_string.split(',').collect();
        let first = tokens.first().map(|t| clean_token(t)).unwrap_or_default();
        let n = first.parse::<usize>().map_err(|_| {
            CytoError::Spillover(format!("leading dimension '{first}' is not an integer"))
        })?;

        let available = tokens.len() - 1;
        if available < n {
            return Err(CytoError::Spillover(format!(
                "declares {n} channels but only {available} labels follow"
            )));
        }
        let labels: Vec<String> = tokens[1..=n].iter().map(|t| clean_token(t)).collect();

        let values = tokens[n + 1..]
            .iter()
            .map(|t| {
                let t = clean_token(t);
                t.parse::<f64>()
                    .map_err(|_| CytoError::Spillover(format!("value '{t}' is not a number")))
            })
            .collect::<AppResult<Vec<f64>>>()?;

        debug!(dimension = n, "Decoded embedded spillover matrix");
        Self::new(labels, values)
    }

    /// Encode back into the embedded FCS string form.
    pub fn encode(&self) -> String {
        let n = self.dimension();
        let mut parts = Vec::with_capacity(1 + n + n * n);
        parts.push(n.to_string());
        parts.extend(self.labels.iter().cloned());
        for row in 0..n {
            for col in 0..n {
                parts.push(self.values[(row, col)].to_string());
            }
        }
        parts.join(",")
    }

    /// Load an external CSV matrix.
    ///
    /// The header row holds the labels. When the first header cell is empty the first
    /// column is treated as a row index and skipped.
    #[cfg(feature = "storage_csv")]
    pub fn from_csv<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        let skip_index = header.get(0).is_some_and(str::is_empty);
        let labels: Vec<String> = header
            .iter()
            .skip(usize::from(skip_index))
            .map(|h| h.replace('\n', ""))
            .collect();

        let mut values = Vec::with_capacity(labels.len() * labels.len());
        let mut rows = 0;
        for record in reader.records() {
            let record = record?;
            rows += 1;
            for field in record.iter().skip(usize::from(skip_index)) {
                values.push(field.parse::<f64>().map_err(|_| {
                    CytoError::Spillover(format!(
                        "{}: value '{field}' on row {rows} is not a number",
                        path.display()
                    ))
                })?);
            }
        }
        if rows != labels.len() {
            return Err(CytoError::Spillover(format!(
                "{}: {rows} rows for {} labelled columns; matrix must be square",
                path.display(),
                labels.len()
            )));
        }

        debug!(path = %path.display(), dimension = rows, "Loaded external spillover matrix");
        Self::new(labels, values)
    }

    /// Load an external CSV matrix.
    #[cfg(not(feature = "storage_csv"))]
    pub fn from_csv<P: AsRef<Path>>(_path: P) -> AppResult<Self> {
        Err(CytoError::FeatureNotEnabled("storage_csv".to_string()))
    }

    /// Number of channels.
    pub fn dimension(&self) -> usize {
        self.labels.len()
    }

    /// Channel labels shared by rows and columns.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Numeric values.
    pub fn values(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// Spillover from `row` into `col`, by label.
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let r = self.labels.iter().position(|l| l == row)?;
        let c = self.labels.iter().position(|l| l == col)?;
        Some(self.values[(r, c)])
    }
}

fn clean_token(token: &str) -> String {
    token.replace('\n', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_labels_and_values() {
        let spill = SpilloverMatrix::decode("2, FL1-A ,FL2-A\n,1,0.1,0.02,1").unwrap();
        assert_eq!(spill.labels(), ["FL1-A", "FL2-A"]);
        assert_eq!(spill.get("FL1-A", "FL2-A"), Some(0.1));
        assert_eq!(spill.get("FL2-A", "FL1-A"), Some(0.02));
        assert_eq!(spill.get("FL3-A", "FL1-A"), None);
    }

    #[test]
    fn round_trips_through_encode() {
        let source = "3,A,B,C,1,0.25,0,0.125,1,0.5,0,0.0625,1";
        let spill = SpilloverMatrix::decode(source).unwrap();
        let again = SpilloverMatrix::decode(&spill.encode()).unwrap();
        assert_eq!(spill, again);
        assert_eq!(spill.encode(), source);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(SpilloverMatrix::decode("").is_err());
        assert!(SpilloverMatrix::decode("two,A,B,1,0,0,1").is_err());
        assert!(SpilloverMatrix::decode("2,A,B,1,0,0").is_err());
        assert!(SpilloverMatrix::decode("2,A,B,1,0,0,1,5").is_err());
        assert!(SpilloverMatrix::decode("2,A,B,1,x,0,1").is_err());
        assert!(SpilloverMatrix::decode("3,A").is_err());
    }

    #[test]
    fn oversized_dimension_is_an_error() {
        let huge = format!("{},A", usize::MAX);
        assert!(matches!(
            SpilloverMatrix::decode(&huge),
            Err(CytoError::Spillover(_))
        ));
    }
}
