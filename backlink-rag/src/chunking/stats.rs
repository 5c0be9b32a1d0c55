//! Descriptive statistics for numeric columns.

use serde::{Deserialize, Serialize};

/// Summary statistics of one numeric column.
///
/// Quartiles use sorted-array indexing: `Q1 = sorted[floor(n * 0.25)]`,
/// `Q3 = sorted[floor(n * 0.75)]`. The median averages the two middle values
/// when `n` is even.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub range: f64,
}

impl ColumnStatistics {
    /// Compute statistics, or `None` for an empty column.
    pub fn compute(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let min = sorted[0];
        let max = sorted[n - 1];
        let mean = sorted.iter().sum::<f64>() / n as f64;
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };
        let q1 = sorted[(n as f64 * 0.25).floor() as usize];
        let q3 = sorted[(n as f64 * 0.75).floor() as usize];

        Some(Self { count: n, min, max, mean, median, q1, q3, range: max - min })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn even_count_median_is_mean_of_middle_pair() {
        let stats = ColumnStatistics::compute(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert_eq!(stats.median, 2.5);
        assert_eq!(stats.mean, 2.5);
        assert_eq!(stats.q1, 2.0);
        assert_eq!(stats.q3, 4.0);
        assert_eq!(stats.range, 3.0);
    }

    #[test]
    fn odd_count_median_is_middle_value() {
        let stats = ColumnStatistics::compute(&[10.0, 30.0, 20.0, 50.0, 40.0]).unwrap();
        assert_eq!(stats.median, 30.0);
        assert_eq!(stats.q1, 20.0);
        assert_eq!(stats.q3, 40.0);
    }

    #[test]
    fn single_value() {
        let stats = ColumnStatistics::compute(&[7.0]).unwrap();
        assert_eq!(stats.median, 7.0);
        assert_eq!(stats.q1, 7.0);
        assert_eq!(stats.q3, 7.0);
        assert_eq!(stats.range, 0.0);
    }

    #[test]
    fn empty_has_no_statistics() {
        assert!(ColumnStatistics::compute(&[]).is_none());
    }
}
