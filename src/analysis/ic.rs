//! Information coefficient
//!
//! Per-date cross-sectional correlation between predicted score and realized
//! label.

use super::AnalysisError;
use crate::data::{Panel, Signal};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::collections::HashMap;

/// A scalar statistic per trading date
pub type DailySeries = BTreeMap<NaiveDate, f64>;

/// Compute the daily IC (Pearson) and rank IC (Spearman) series
///
/// Scores and labels are joined on (date, instrument). Dates with fewer than
/// two paired observations or a degenerate (zero variance) cross-section are
/// skipped; an empty join is an error.
pub fn information_coefficient(
    signal: &Signal,
    labels: &Panel,
) -> Result<(DailySeries, DailySeries), AnalysisError> {
    if signal.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "signal has no rows".to_string(),
        ));
    }
    if labels.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "label panel has no rows".to_string(),
        ));
    }

    let mut ic = DailySeries::new();
    let mut ric = DailySeries::new();
    for date in signal.dates() {
        let label_by_instrument: HashMap<&str, f64> = labels
            .on_date(date)
            .iter()
            .map(|row| (row.instrument.as_str(), row.values[0]))
            .collect();

        let mut scores = Vec::new();
        let mut realized = Vec::new();
        for row in signal.on_date(date) {
            if let Some(&label) = label_by_instrument.get(row.instrument.as_str()) {
                scores.push(row.score);
                realized.push(label);
            }
        }
        if scores.len() < 2 {
            continue;
        }
        if let Some(value) = pearson(&scores, &realized) {
            ic.insert(date, value);
        }
        if let Some(value) = pearson(&ranks(&scores), &ranks(&realized)) {
            ric.insert(date, value);
        }
    }

    if ic.is_empty() {
        return Err(AnalysisError::InsufficientData(
            "signal and labels share no dates with a usable cross-section".to_string(),
        ));
    }
    Ok((ic, ric))
}

/// Pearson correlation; None for degenerate inputs
fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len();
    if n < 2 || n != y.len() {
        return None;
    }
    let nf = n as f64;
    let mean_x = x.iter().sum::<f64>() / nf;
    let mean_y = y.iter().sum::<f64>() / nf;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x * var_y).sqrt())
}

/// 1-based ranks with ties averaged
fn ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut out = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Average rank across the tie group
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &index in &order[i..=j] {
            out[index] = rank;
        }
        i = j + 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{PanelRow, SignalRow};

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn signal(rows: &[(u32, &str, f64)]) -> Signal {
        Signal::from_rows(
            rows.iter()
                .map(|(day, name, score)| SignalRow {
                    date: d(*day),
                    instrument: name.to_string(),
                    score: *score,
                })
                .collect(),
        )
        .unwrap()
    }

    fn labels(rows: &[(u32, &str, f64)]) -> Panel {
        Panel::new(
            vec!["label".to_string()],
            rows.iter()
                .map(|(day, name, value)| PanelRow {
                    date: d(*day),
                    instrument: name.to_string(),
                    values: vec![*value],
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_perfect_signal_has_unit_ic() {
        let signal = signal(&[(1, "A", 0.1), (1, "B", 0.2), (1, "C", 0.3)]);
        let labels = labels(&[(1, "A", 0.1), (1, "B", 0.2), (1, "C", 0.3)]);

        let (ic, ric) = information_coefficient(&signal, &labels).unwrap();
        assert!((ic[&d(1)] - 1.0).abs() < 1e-12);
        assert!((ric[&d(1)] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverted_signal_has_negative_ic() {
        let signal = signal(&[(1, "A", 0.3), (1, "B", 0.2), (1, "C", 0.1)]);
        let labels = labels(&[(1, "A", 0.1), (1, "B", 0.2), (1, "C", 0.3)]);

        let (ic, ric) = information_coefficient(&signal, &labels).unwrap();
        assert!((ic[&d(1)] + 1.0).abs() < 1e-12);
        assert!((ric[&d(1)] + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_rank_ic_ignores_monotone_distortion() {
        // Labels are a squashed but order-preserving transform of the scores
        let signal = signal(&[(1, "A", 1.0), (1, "B", 2.0), (1, "C", 10.0)]);
        let labels = labels(&[(1, "A", 0.01), (1, "B", 0.02), (1, "C", 0.03)]);

        let (ic, ric) = information_coefficient(&signal, &labels).unwrap();
        assert!((ric[&d(1)] - 1.0).abs() < 1e-12);
        assert!(ic[&d(1)] < 1.0);
    }

    #[test]
    fn test_disjoint_dates_is_insufficient_data() {
        let signal = signal(&[(1, "A", 0.1), (1, "B", 0.2)]);
        let labels = labels(&[(2, "A", 0.1), (2, "B", 0.2)]);

        let result = information_coefficient(&signal, &labels);
        assert!(matches!(result, Err(AnalysisError::InsufficientData(_))));
    }

    #[test]
    fn test_single_pair_dates_skipped() {
        let signal = signal(&[
            (1, "A", 0.1),
            (1, "B", 0.2),
            (2, "A", 0.1), // only one overlapping name on day 2
        ]);
        let labels = labels(&[(1, "A", 0.2), (1, "B", 0.4), (2, "A", 0.1)]);

        let (ic, _) = information_coefficient(&signal, &labels).unwrap();
        assert_eq!(ic.len(), 1);
        assert!(ic.contains_key(&d(1)));
    }

    #[test]
    fn test_degenerate_cross_section_skipped() {
        // Constant labels on day 1: zero variance, no defined correlation
        let signal = signal(&[(1, "A", 0.1), (1, "B", 0.2), (2, "A", 0.1), (2, "B", 0.2)]);
        let labels = labels(&[(1, "A", 0.5), (1, "B", 0.5), (2, "A", 0.1), (2, "B", 0.3)]);

        let (ic, _) = information_coefficient(&signal, &labels).unwrap();
        assert!(!ic.contains_key(&d(1)));
        assert!(ic.contains_key(&d(2)));
    }

    #[test]
    fn test_ranks_average_ties() {
        assert_eq!(ranks(&[10.0, 20.0, 20.0, 30.0]), vec![1.0, 2.5, 2.5, 4.0]);
        assert_eq!(ranks(&[3.0, 1.0, 2.0]), vec![3.0, 1.0, 2.0]);
    }
}
