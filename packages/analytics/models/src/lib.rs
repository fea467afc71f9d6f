#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Option and result types for the statistics branch.
//!
//! Options deserialize from the `[gap_fill]` and `[temporal]` sections of
//! the analysis TOML; results serialize to the JSON report handed to the
//! presentation layer.

use chrono::NaiveDate;
use deforest_map_observation_models::Field;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// How missing values between known control points are estimated.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InterpolationMethod {
    /// Straight line between the neighboring known values.
    #[default]
    Linear,
    /// Value of the closest known point (earlier point on ties).
    Nearest,
    /// Carry the previous known value forward.
    ForwardFill,
    /// Carry the next known value backward.
    BackwardFill,
    /// Local polynomial through the `order + 1` nearest known points.
    Polynomial,
    /// Single polynomial through every known point, barycentric form.
    Barycentric,
    /// Monotone piecewise cubic Hermite (Fritsch-Carlson slopes).
    Pchip,
    /// Natural cubic spline.
    Spline,
}

/// Which edge gaps may be filled.
///
/// Interior gaps are always interpolated. Leading gaps take the first known
/// value when filling backward; trailing gaps take the last known value
/// when filling forward.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LimitDirection {
    /// Fill trailing gaps only.
    Forward,
    /// Fill leading gaps only.
    Backward,
    /// Fill both ends.
    #[default]
    Both,
}

impl LimitDirection {
    /// Whether leading gaps are filled.
    #[must_use]
    pub const fn fills_leading(self) -> bool {
        matches!(self, Self::Backward | Self::Both)
    }

    /// Whether trailing gaps are filled.
    #[must_use]
    pub const fn fills_trailing(self) -> bool {
        matches!(self, Self::Forward | Self::Both)
    }
}

/// The x axis used to place control points.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FillIndex {
    /// Row position (0, 1, 2, ...).
    #[default]
    Position,
    /// Timestamp, measured in days.
    Timestamp,
}

/// Gap filling configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapFillOptions {
    /// Interpolation method for interior gaps.
    pub method: InterpolationMethod,
    /// Polynomial order, used by [`InterpolationMethod::Polynomial`].
    pub order: usize,
    /// Which edge gaps are filled.
    pub limit_direction: LimitDirection,
    /// Control point axis.
    pub index: FillIndex,
    /// Columns to fill. `None` means every numeric column in the schema.
    pub columns: Option<Vec<Field>>,
}

impl Default for GapFillOptions {
    fn default() -> Self {
        Self {
            method: InterpolationMethod::Linear,
            order: 2,
            limit_direction: LimitDirection::Both,
            index: FillIndex::Position,
            columns: None,
        }
    }
}

impl GapFillOptions {
    /// Options using `method` and defaults for everything else.
    #[must_use]
    pub fn with_method(method: InterpolationMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }
}

/// Bucket width for temporal aggregation.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimeGranularity {
    /// Calendar days.
    Daily,
    /// ISO weeks starting on Monday.
    Weekly,
    /// Calendar months.
    Monthly,
    /// Calendar years.
    #[default]
    Yearly,
}

/// How values inside one bucket are combined.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Aggregation {
    /// Sum; empty buckets are `0`.
    #[default]
    Sum,
    /// Arithmetic mean; empty buckets are undefined.
    Mean,
}

/// Temporal aggregation configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalOptions {
    /// Numeric field to aggregate.
    pub column: Field,
    /// Bucket width.
    pub granularity: TimeGranularity,
    /// Combination rule.
    pub aggregation: Aggregation,
}

impl Default for TemporalOptions {
    fn default() -> Self {
        Self {
            column: Field::DeforestedArea,
            granularity: TimeGranularity::Yearly,
            aggregation: Aggregation::Sum,
        }
    }
}

/// One bucket of a temporal aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    /// First day covered by the bucket.
    pub start: NaiveDate,
    /// Aggregated value; `None` when undefined (mean of nothing).
    pub value: Option<f64>,
    /// Number of rows that fell in this bucket.
    pub count: usize,
}

/// Pairwise Pearson correlations between numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationMatrix {
    /// Column names, in the order requested.
    pub columns: Vec<String>,
    /// `values[i][j]`: correlation of column `i` with column `j`; `None` when
    /// one side has zero variance.
    pub values: Vec<Vec<Option<f64>>>,
    /// `observations[i][j]`: number of pairwise-complete rows used.
    pub observations: Vec<Vec<usize>>,
}

impl CorrelationMatrix {
    /// Correlation between two named columns.
    #[must_use]
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }

    /// Correlations of every other column against `target`, strongest
    /// (by absolute value) first. Undefined correlations are skipped.
    #[must_use]
    pub fn ranked_against(&self, target: &str) -> Vec<(String, f64)> {
        let Some(t) = self.columns.iter().position(|c| c == target) else {
            return Vec::new();
        };
        let mut ranked: Vec<(String, f64)> = self
            .columns
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != t)
            .filter_map(|(i, name)| self.values[t][i].map(|r| (name.clone(), r)))
            .collect();
        ranked.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
        ranked
    }
}

/// Descriptive statistics for one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    /// Column header.
    pub column: String,
    /// Non-missing values.
    pub count: usize,
    /// Missing values.
    pub missing: usize,
    /// Arithmetic mean.
    pub mean: Option<f64>,
    /// Sample standard deviation (n - 1).
    pub std_dev: Option<f64>,
    /// Smallest value.
    pub min: Option<f64>,
    /// Largest value.
    pub max: Option<f64>,
}

/// Number of rows in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    /// Category label.
    pub category: String,
    /// Number of rows.
    pub count: usize,
}

/// Distribution of one categorical column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryProfile {
    /// Column header.
    pub column: String,
    /// Counts per category, most frequent first.
    pub categories: Vec<CategoryCount>,
    /// Rows with no category.
    pub missing: usize,
}

/// Headline figures plus per-column profiles of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeforestationSummary {
    /// Number of rows.
    pub rows: usize,
    /// Sum of the deforested area column.
    pub total_deforested_area: Option<f64>,
    /// Mean of the deforestation rate column.
    pub mean_deforestation_rate: Option<f64>,
    /// Profiles of numeric columns, in schema order.
    pub numeric: Vec<ColumnProfile>,
    /// Profiles of categorical columns, in schema order.
    pub categorical: Vec<CategoryProfile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_fill_defaults_fill_both_edges() {
        let options = GapFillOptions::default();
        assert_eq!(options.method, InterpolationMethod::Linear);
        assert!(options.limit_direction.fills_leading());
        assert!(options.limit_direction.fills_trailing());
        assert!(!LimitDirection::Forward.fills_leading());
        assert!(!LimitDirection::Backward.fills_trailing());
    }

    #[test]
    fn methods_parse_from_cli_text() {
        assert_eq!(
            "forward_fill".parse::<InterpolationMethod>().unwrap(),
            InterpolationMethod::ForwardFill
        );
        assert_eq!(InterpolationMethod::Pchip.to_string(), "pchip");
        assert!("cubic".parse::<InterpolationMethod>().is_err());
    }

    #[test]
    fn options_deserialize_partially_from_toml() {
        let options: GapFillOptions = toml::from_str(
            r#"
            method = "polynomial"
            order = 3
            "#,
        )
        .unwrap();
        assert_eq!(options.method, InterpolationMethod::Polynomial);
        assert_eq!(options.order, 3);
        assert_eq!(options.limit_direction, LimitDirection::Both);

        let temporal: TemporalOptions = toml::from_str(r#"aggregation = "mean""#).unwrap();
        assert_eq!(temporal.column, Field::DeforestedArea);
        assert_eq!(temporal.aggregation, Aggregation::Mean);
    }

    #[test]
    fn ranks_correlations_by_strength() {
        let matrix = CorrelationMatrix {
            columns: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            values: vec![
                vec![Some(1.0), Some(0.2), Some(-0.9), None],
                vec![Some(0.2), Some(1.0), Some(0.0), None],
                vec![Some(-0.9), Some(0.0), Some(1.0), None],
                vec![None, None, None, Some(1.0)],
            ],
            observations: vec![vec![3; 4]; 4],
        };
        let ranked = matrix.ranked_against("a");
        assert_eq!(ranked, vec![("c".to_string(), -0.9), ("b".to_string(), 0.2)]);
        assert_eq!(matrix.get("b", "a"), Some(0.2));
        assert!(matrix.ranked_against("z").is_empty());
    }

    #[test]
    fn time_bucket_serializes_camel_case() {
        let bucket = TimeBucket {
            start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            value: None,
            count: 0,
        };
        let json = serde_json::to_value(&bucket).unwrap();
        assert_eq!(json["start"], "2020-01-01");
        assert!(json["value"].is_null());
    }
}
