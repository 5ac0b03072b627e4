//! Predicted score table

use super::DataError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One predicted score for a (date, instrument) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRow {
    /// Trading date
    pub date: NaiveDate,
    /// Instrument identifier
    pub instrument: String,
    /// Predicted score
    pub score: f64,
}

/// Ordered table of predicted scores, one row per (date, instrument)
///
/// Rows are sorted by (date, instrument) and keys are unique. Immutable after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    rows: Vec<SignalRow>,
}

impl Signal {
    /// Build a signal from unordered rows, sorting by (date, instrument)
    ///
    /// Fails on duplicate (date, instrument) keys.
    pub fn from_rows(mut rows: Vec<SignalRow>) -> Result<Self, DataError> {
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
        Ok(Self { rows })
    }

    /// All rows in (date, instrument) order
    pub fn rows(&self) -> &[SignalRow] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the signal has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Unique trading dates in ascending order
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = Vec::new();
        for row in &self.rows {
            if dates.last() != Some(&row.date) {
                dates.push(row.date);
            }
        }
        dates
    }

    /// The slice of rows for a single date
    pub fn on_date(&self, date: NaiveDate) -> &[SignalRow] {
        let start = self.rows.partition_point(|r| r.date < date);
        let end = self.rows.partition_point(|r| r.date <= date);
        &self.rows[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn row(day: u32, instrument: &str, score: f64) -> SignalRow {
        SignalRow {
            date: d(day),
            instrument: instrument.to_string(),
            score,
        }
    }

    #[test]
    fn test_from_rows_sorts() {
        let signal = Signal::from_rows(vec![
            row(2, "B", 0.2),
            row(1, "B", 0.1),
            row(1, "A", 0.3),
        ])
        .unwrap();

        let keys: Vec<_> = signal
            .rows()
            .iter()
            .map(|r| (r.date, r.instrument.as_str()))
            .collect();
        assert_eq!(keys, vec![(d(1), "A"), (d(1), "B"), (d(2), "B")]);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let result = Signal::from_rows(vec![row(1, "A", 0.1), row(1, "A", 0.2)]);
        assert!(matches!(result, Err(DataError::DuplicateKey { .. })));
    }

    #[test]
    fn test_dates_unique_ascending() {
        let signal = Signal::from_rows(vec![
            row(3, "A", 0.1),
            row(1, "A", 0.1),
            row(1, "B", 0.2),
            row(3, "B", 0.3),
        ])
        .unwrap();
        assert_eq!(signal.dates(), vec![d(1), d(3)]);
    }

    #[test]
    fn test_on_date_slice() {
        let signal = Signal::from_rows(vec![
            row(1, "A", 0.1),
            row(2, "A", 0.2),
            row(2, "B", 0.3),
            row(3, "A", 0.4),
        ])
        .unwrap();

        let day2 = signal.on_date(d(2));
        assert_eq!(day2.len(), 2);
        assert_eq!(day2[0].instrument, "A");
        assert_eq!(day2[1].instrument, "B");
        assert!(signal.on_date(d(4)).is_empty());
    }

    #[test]
    fn test_serde_round_trip() {
        let signal = Signal::from_rows(vec![row(1, "A", 0.5), row(2, "B", -0.25)]).unwrap();
        let json = serde_json::to_vec(&signal).unwrap();
        let back: Signal = serde_json::from_slice(&json).unwrap();
        assert_eq!(signal, back);
    }
}
