use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{debug, warn};
use serde::Serialize;
use std::cmp::Ordering;

/// A point where the value dropped compared to the previous point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecreaseDiagnostic {
    pub index: usize,
    pub date: String,
    pub previous_value: f64,
    pub current_value: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSeries {
    pub dates: Vec<String>,
    pub values: Vec<f64>,
    pub decreases: Vec<DecreaseDiagnostic>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SeriesOutcome<'a> {
    Normalized(NormalizedSeries),
    /// Input could not be paired up; handed back untouched.
    Unnormalized {
        dates: Option<&'a [String]>,
        values: Option<&'a [f64]>,
    },
}

impl SeriesOutcome<'_> {
    pub fn is_normalized(&self) -> bool {
        matches!(self, SeriesOutcome::Normalized(_))
    }

    pub fn normalized(&self) -> Option<&NormalizedSeries> {
        match self {
            SeriesOutcome::Normalized(series) => Some(series),
            SeriesOutcome::Unnormalized { .. } => None,
        }
    }

    /// Number of plottable points. Unnormalized input plots nothing.
    pub fn display_len(&self) -> usize {
        self.normalized().map(|series| series.values.len()).unwrap_or(0)
    }
}

/// Parse the date formats the backtest engine emits.
pub fn parse_series_date(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.naive_utc());
    }
    if let Ok(parsed) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(parsed.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

// Parsed dates ascending; unparseable dates after all parsed ones.
fn compare_keys(a: &Option<NaiveDateTime>, b: &Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort a dated series chronologically, keeping each value paired with its date.
///
/// Missing input or mismatched lengths return the input unchanged as
/// [`SeriesOutcome::Unnormalized`]. Sorting is stable, so equal dates keep their order.
pub fn normalize_series<'a>(
    dates: Option<&'a [String]>,
    values: Option<&'a [f64]>,
) -> SeriesOutcome<'a> {
    let (Some(date_slice), Some(value_slice)) = (dates, values) else {
        return SeriesOutcome::Unnormalized { dates, values };
    };
    if date_slice.len() != value_slice.len() {
        warn!(
            "Series has {} dates but {} values; leaving it unnormalized",
            date_slice.len(),
            value_slice.len()
        );
        return SeriesOutcome::Unnormalized { dates, values };
    }

    let keys: Vec<Option<NaiveDateTime>> =
        date_slice.iter().map(|date| parse_series_date(date)).collect();
    let unparsed = keys.iter().filter(|key| key.is_none()).count();
    if unparsed > 0 {
        warn!(
            "{} of {} series dates could not be parsed and were placed last",
            unparsed,
            keys.len()
        );
    }

    let mut order: Vec<usize> = (0..date_slice.len()).collect();
    order.sort_by(|&a, &b| compare_keys(&keys[a], &keys[b]));

    let dates: Vec<String> = order.iter().map(|&i| date_slice[i].clone()).collect();
    let values: Vec<f64> = order.iter().map(|&i| value_slice[i]).collect();
    let decreases = detect_decreases(&dates, &values);

    SeriesOutcome::Normalized(NormalizedSeries {
        dates,
        values,
        decreases,
    })
}

/// Every index whose value is strictly below its predecessor.
pub fn detect_decreases<L: AsRef<str>>(labels: &[L], values: &[f64]) -> Vec<DecreaseDiagnostic> {
    let decreases: Vec<DecreaseDiagnostic> = values
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| pair[1] < pair[0])
        .map(|(offset, pair)| {
            let index = offset + 1;
            DecreaseDiagnostic {
                index,
                date: labels
                    .get(index)
                    .map(|label| label.as_ref().to_string())
                    .unwrap_or_else(|| index.to_string()),
                previous_value: pair[0],
                current_value: pair[1],
                delta: pair[1] - pair[0],
            }
        })
        .collect();

    for decrease in &decreases {
        debug!(
            "Series decrease at {} ({}): {:.2} -> {:.2} ({:+.2})",
            decrease.index,
            decrease.date,
            decrease.previous_value,
            decrease.current_value,
            decrease.delta
        );
    }
    if !decreases.is_empty() {
        debug!("Series has {} decreasing points", decreases.len());
    }
    decreases
}

/// Largest peak-to-trough decline, in percent of the running peak.
pub fn max_drawdown_pct(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_drawdown = 0.0_f64;
    for &value in values {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            max_drawdown = max_drawdown.max((peak - value) / peak * 100.0);
        }
    }
    max_drawdown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn sorted_input_is_returned_unchanged() {
        let dates = strings(&["2024-01-01", "2024-01-02", "2024-01-03"]);
        let values = vec![100.0, 101.0, 102.0];

        let outcome = normalize_series(Some(dates.as_slice()), Some(values.as_slice()));
        let series = outcome.normalized().unwrap();
        assert_eq!(series.dates, dates);
        assert_eq!(series.values, values);
        assert!(series.decreases.is_empty());
    }

    #[test]
    fn out_of_order_input_is_sorted_with_pairs_intact() {
        let dates = strings(&["2024-01-03", "2024-01-01", "2024-01-02"]);
        let values = vec![103.0, 101.0, 102.0];

        let outcome = normalize_series(Some(dates.as_slice()), Some(values.as_slice()));
        let series = outcome.normalized().unwrap();
        assert_eq!(
            series.dates,
            strings(&["2024-01-01", "2024-01-02", "2024-01-03"])
        );
        assert_eq!(series.values, vec![101.0, 102.0, 103.0]);
    }

    #[test]
    fn normalizing_twice_is_stable() {
        let dates = strings(&["2024-01-02", "garbage", "2024-01-01T00:00:00", "2024-01-02"]);
        let values = vec![2.0, 9.0, 1.0, 3.0];

        let first = normalize_series(Some(dates.as_slice()), Some(values.as_slice()));
        let first = first.normalized().unwrap().clone();
        let second = normalize_series(Some(first.dates.as_slice()), Some(first.values.as_slice()));
        assert_eq!(second.normalized().unwrap(), &first);
        assert_eq!(first.values, vec![1.0, 2.0, 3.0, 9.0]);
        assert_eq!(first.dates.last().map(String::as_str), Some("garbage"));
    }

    #[test]
    fn decreases_are_reported_at_the_dropping_index() {
        let dates = strings(&["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04"]);
        let values = vec![100.0, 110.0, 105.0, 120.0];

        let outcome = normalize_series(Some(dates.as_slice()), Some(values.as_slice()));
        let decreases = &outcome.normalized().unwrap().decreases;
        assert_eq!(decreases.len(), 1);
        assert_eq!(decreases[0].index, 2);
        assert_eq!(decreases[0].date, "2024-01-03");
        assert_eq!(decreases[0].delta, -5.0);
    }

    #[test]
    fn missing_or_mismatched_input_is_unnormalized() {
        let dates = strings(&["2024-01-01", "2024-01-02"]);
        let values = vec![1.0];

        let outcome = normalize_series(Some(dates.as_slice()), Some(values.as_slice()));
        assert!(!outcome.is_normalized());
        assert_eq!(outcome.display_len(), 0);

        let outcome = normalize_series(None, Some(values.as_slice()));
        assert_eq!(
            outcome,
            SeriesOutcome::Unnormalized {
                dates: None,
                values: Some(&values[..]),
            }
        );
    }

    #[test]
    fn engine_timestamp_formats_parse() {
        assert!(parse_series_date("2024-01-02 00:00:00-05:00").is_some());
        assert!(parse_series_date("2024-01-02T00:00:00Z").is_some());
        assert!(parse_series_date("2024-01-02 09:30:00").is_some());
        assert!(parse_series_date("Jan 2").is_none());
    }

    #[test]
    fn drawdown_uses_running_peak() {
        assert_eq!(max_drawdown_pct(&[100.0, 120.0, 90.0, 130.0]), 25.0);
        assert_eq!(max_drawdown_pct(&[]), 0.0);
    }
}
