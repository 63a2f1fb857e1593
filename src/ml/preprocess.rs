//! Column preprocessing

use super::Matrix;
use std::collections::BTreeSet;

/// Replaces missing numeric values with the per-column median
#[derive(Debug, Clone, PartialEq)]
pub struct MedianImputer {
    medians: Vec<Option<f64>>,
}

impl MedianImputer {
    /// Learn the median of the present values in each column
    pub fn fit(rows: &[Vec<Option<f64>>], width: usize) -> Self {
        let medians = (0..width)
            .map(|c| {
                let values: Vec<f64> = rows
                    .iter()
                    .filter_map(|row| row.get(c).copied().flatten())
                    .collect();
                median(values)
            })
            .collect();
        Self { medians }
    }

    /// Fill columns that had no values with another imputer's medians
    pub fn or_fallback(mut self, fallback: &MedianImputer) -> Self {
        for (mine, theirs) in self.medians.iter_mut().zip(&fallback.medians) {
            if mine.is_none() {
                *mine = *theirs;
            }
        }
        self
    }

    pub fn medians(&self) -> &[Option<f64>] {
        &self.medians
    }

    /// Columns with no learned median become 0
    pub fn transform(&self, rows: &[Vec<Option<f64>>]) -> Matrix {
        rows.iter()
            .map(|row| {
                self.medians
                    .iter()
                    .enumerate()
                    .map(|(c, m)| {
                        row.get(c)
                            .copied()
                            .flatten()
                            .or(*m)
                            .unwrap_or(0.0)
                    })
                    .collect()
            })
            .collect()
    }
}

/// Median; the mean of the two middle values for an even count
pub fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Centers each column and scales it to unit population variance
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl StandardScaler {
    pub fn fit(rows: &[Vec<f64>], width: usize) -> Self {
        let n = rows.len().max(1) as f64;
        let mut means = vec![0.0; width];
        let mut scales = vec![1.0; width];

        for c in 0..width {
            let mean = rows.iter().map(|r| r[c]).sum::<f64>() / n;
            let variance = rows.iter().map(|r| (r[c] - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();
            means[c] = mean;
            // constant columns keep their centered value of 0
            scales[c] = if std > 0.0 { std } else { 1.0 };
        }

        Self { means, scales }
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Matrix {
        rows.iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(v, (mean, scale))| (v - mean) / scale)
                    .collect()
            })
            .collect()
    }
}

/// One-hot encoder over sorted category levels.
///
/// Values never seen during fit encode as all zeros. With `drop_first` the
/// lowest level is dropped and also encodes as all zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct OneHotEncoder {
    prefix: String,
    levels: Vec<String>,
}

impl OneHotEncoder {
    pub fn fit<'a>(
        prefix: &str,
        values: impl IntoIterator<Item = &'a str>,
        drop_first: bool,
    ) -> Self {
        let sorted: BTreeSet<&str> = values.into_iter().collect();
        let levels = sorted
            .into_iter()
            .skip(usize::from(drop_first))
            .map(str::to_string)
            .collect();
        Self {
            prefix: prefix.to_string(),
            levels,
        }
    }

    pub fn width(&self) -> usize {
        self.levels.len()
    }

    /// Column names, `{prefix}_{level}`
    pub fn feature_names(&self) -> Vec<String> {
        self.levels
            .iter()
            .map(|level| format!("{}_{}", self.prefix, level))
            .collect()
    }

    pub fn encode(&self, value: Option<&str>) -> Vec<f64> {
        self.levels
            .iter()
            .map(|level| if Some(level.as_str()) == value { 1.0 } else { 0.0 })
            .collect()
    }
}

/// Named feature columns, built column by column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    rows: usize,
}

impl FeatureFrame {
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            ..Default::default()
        }
    }

    pub fn push_numeric(&mut self, name: &str, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.rows);
        self.names.push(name.to_string());
        self.columns.push(values);
    }

    /// Append dummy columns for a categorical, levels taken from `values`;
    /// missing values get no column and encode as all zeros
    pub fn push_dummies(&mut self, prefix: &str, values: &[Option<&str>], drop_first: bool) {
        let encoder = OneHotEncoder::fit(prefix, values.iter().flatten().copied(), drop_first);
        let encoded: Vec<Vec<f64>> = values.iter().map(|v| encoder.encode(*v)).collect();

        for (c, name) in encoder.feature_names().into_iter().enumerate() {
            self.names.push(name);
            self.columns.push(encoded.iter().map(|row| row[c]).collect());
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn to_rows(&self) -> Matrix {
        (0..self.rows)
            .map(|r| self.columns.iter().map(|col| col[r]).collect())
            .collect()
    }

    /// Rows laid out in `names` order; absent columns are zero and columns
    /// not listed are dropped
    pub fn aligned_rows(&self, names: &[String]) -> Matrix {
        let lookup: Vec<Option<usize>> = names
            .iter()
            .map(|name| self.names.iter().position(|n| n == name))
            .collect();

        (0..self.rows)
            .map(|r| {
                lookup
                    .iter()
                    .map(|idx| idx.map_or(0.0, |c| self.columns[c][r]))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(vec![]), None);
    }

    #[test]
    fn test_imputer_fills_missing() {
        let rows = vec![
            vec![Some(1.0), None],
            vec![None, None],
            vec![Some(3.0), None],
        ];
        let imputer = MedianImputer::fit(&rows, 2);
        assert_eq!(imputer.medians(), &[Some(2.0), None]);

        let fallback = MedianImputer::fit(&[vec![Some(0.0), Some(9.0)]], 2);
        let imputer = imputer.or_fallback(&fallback);
        assert_eq!(imputer.medians(), &[Some(2.0), Some(9.0)]);

        assert_eq!(
            imputer.transform(&rows),
            vec![vec![1.0, 9.0], vec![2.0, 9.0], vec![3.0, 9.0]]
        );
    }

    #[test]
    fn test_scaler_population_std() {
        let rows = vec![vec![1.0, 5.0], vec![3.0, 5.0]];
        let scaler = StandardScaler::fit(&rows, 2);
        assert_eq!(scaler.transform(&rows), vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);
    }

    #[test]
    fn test_one_hot_unknown_is_all_zero() {
        let encoder = OneHotEncoder::fit("Movement", ["Walking", "Sitting", "Walking"], false);
        assert_eq!(
            encoder.feature_names(),
            vec!["Movement_Sitting".to_string(), "Movement_Walking".to_string()]
        );
        assert_eq!(encoder.encode(Some("Walking")), vec![0.0, 1.0]);
        assert_eq!(encoder.encode(Some("Running")), vec![0.0, 0.0]);
        assert_eq!(encoder.encode(None), vec![0.0, 0.0]);
    }

    #[test]
    fn test_one_hot_drop_first() {
        let encoder = OneHotEncoder::fit("Location", ["Kitchen", "Bathroom", "Bedroom"], true);
        assert_eq!(
            encoder.feature_names(),
            vec!["Location_Bedroom".to_string(), "Location_Kitchen".to_string()]
        );
        assert_eq!(encoder.encode(Some("Bathroom")), vec![0.0, 0.0]);
    }

    #[test]
    fn test_frame_alignment() {
        let mut frame = FeatureFrame::new(2);
        frame.push_numeric("Hour", vec![8.0, 20.0]);
        frame.push_dummies("Location", &[Some("Bathroom"), Some("Kitchen")], true);
        assert_eq!(frame.names(), &["Hour".to_string(), "Location_Kitchen".to_string()]);

        let trained = vec![
            "Location_Kitchen".to_string(),
            "Location_Bedroom".to_string(),
            "Hour".to_string(),
        ];
        assert_eq!(
            frame.aligned_rows(&trained),
            vec![vec![0.0, 0.0, 8.0], vec![1.0, 0.0, 20.0]]
        );
    }
}
