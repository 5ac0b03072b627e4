//! Feature/label panels

use super::DataError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of a panel: the column values for a (date, instrument) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    /// Trading date
    pub date: NaiveDate,
    /// Instrument identifier
    pub instrument: String,
    /// Values, one per panel column
    pub values: Vec<f64>,
}

/// Columnar table keyed by (date, instrument)
///
/// Rows are sorted by (date, instrument) with unique keys; every row carries
/// one value per column. Label panels put the label in the first column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    columns: Vec<String>,
    rows: Vec<PanelRow>,
}

impl Panel {
    /// Build a panel from unordered rows
    ///
    /// Fails on duplicate (date, instrument) keys or rows whose value count
    /// does not match the column count.
    pub fn new(columns: Vec<String>, mut rows: Vec<PanelRow>) -> Result<Self, DataError> {
        for row in &rows {
            if row.values.len() != columns.len() {
                return Err(DataError::ColumnMismatch {
                    date: row.date,
                    instrument: row.instrument.clone(),
                    expected: columns.len(),
                    got: row.values.len(),
                });
            }
        }
        rows.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.instrument.cmp(&b.instrument))
        });
        for pair in rows.windows(2) {
            if pair[0].date == pair[1].date && pair[0].instrument == pair[1].instrument {
                return Err(DataError::DuplicateKey {
                    date: pair[0].date,
                    instrument: pair[0].instrument.clone(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    /// Column names
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All rows in (date, instrument) order
    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    /// Whether the panel has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The slice of rows for a single date
    pub fn on_date(&self, date: NaiveDate) -> &[PanelRow] {
        let start = self.rows.partition_point(|r| r.date < date);
        let end = self.rows.partition_point(|r| r.date <= date);
        &self.rows[start..end]
    }
}
