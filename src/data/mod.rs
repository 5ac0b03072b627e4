//! Time-indexed data tables
//!
//! Signal and feature/label panels keyed by (date, instrument)

mod panel;
mod signal;

pub use panel::{Panel, PanelRow};
pub use signal::{Signal, SignalRow};

use chrono::NaiveDate;
use thiserror::Error;

/// Data errors
#[derive(Debug, Error)]
pub enum DataError {
    /// Two rows share the same (date, instrument) key
    #[error("duplicate key ({date}, {instrument})")]
    DuplicateKey {
        date: NaiveDate,
        instrument: String,
    },
    /// Row value count does not match the column count
    #[error("row ({date}, {instrument}) has {got} values, expected {expected}")]
    ColumnMismatch {
        date: NaiveDate,
        instrument: String,
        expected: usize,
        got: usize,
    },
    /// A dataset segment yielded no rows
    #[error("segment {0:?} produced no rows")]
    EmptySegment(Segment),
}

/// Named dataset split
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Train,
    Valid,
    Test,
}

impl Segment {
    /// Segment name as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Segment::Train => "train",
            Segment::Valid => "valid",
            Segment::Test => "test",
        }
    }
}

/// Feature/label source
///
/// Segments are disjoint, non-overlapping time windows configured by the
/// caller. Labels are the first column of the label panel.
pub trait Dataset {
    /// Feature panel for a segment
    fn features(&self, segment: Segment) -> Result<Panel, DataError>;
    /// Label panel for a segment
    fn labels(&self, segment: Segment) -> Result<Panel, DataError>;
}
