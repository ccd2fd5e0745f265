//! Data types produced by the aggregation engine.

use serde::Serialize;

use crate::catalog::SegmentLabel;
use crate::record::Column;

/// How the groups of an [`AggregationResult`] are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrder {
    /// The grouping key's own order (age buckets, seasons).
    Natural,
    /// Largest measure first; ties by ascending key.
    Descending,
}

/// One group of a grouped aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupValue {
    /// One entry per grouping dimension.
    pub key: Vec<String>,
    pub value: f64,
    /// Rows that fell into this group.
    pub rows: usize,
    /// `value` as a percentage of the total over all groups.
    pub percent: f64,
}

/// Result of a grouped aggregate over a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub dimensions: Vec<String>,
    pub measure: String,
    pub order: GroupOrder,
    pub groups: Vec<GroupValue>,
    pub total: f64,
    /// Largest group; ties go to the lexicographically smallest key.
    pub top: Option<GroupValue>,
    /// Rows excluded from a segment-conditioned aggregate for lack of a label.
    pub unlabeled: usize,
    /// Rows excluded because another grouping value was missing.
    pub missing: usize,
}

impl AggregationResult {
    /// Value of the group with this exact key.
    pub fn get(&self, key: &[&str]) -> Option<f64> {
        self.find(key).map(|g| g.value)
    }

    /// Percentage-of-total of the group with this exact key.
    pub fn percent(&self, key: &[&str]) -> Option<f64> {
        self.find(key).map(|g| g.percent)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// The `n` largest groups, ties broken by ascending key.
    pub fn top_n(&self, n: usize) -> Vec<GroupValue> {
        let mut ranked = self.groups.clone();
        ranked.sort_by(by_value_desc);
        ranked.truncate(n);
        ranked
    }

    /// Keeps only the `n` largest groups, in descending order.
    pub fn into_top_n(mut self, n: usize) -> Self {
        self.groups = self.top_n(n);
        self.order = GroupOrder::Descending;
        self
    }

    fn find(&self, key: &[&str]) -> Option<&GroupValue> {
        self.groups
            .iter()
            .find(|g| g.key.len() == key.len() && g.key.iter().zip(key).all(|(a, b)| a == b))
    }
}

pub(crate) fn by_value_desc(a: &GroupValue, b: &GroupValue) -> std::cmp::Ordering {
    b.value.total_cmp(&a.value).then_with(|| a.key.cmp(&b.key))
}

/// Count matrix over two categorical dimensions, reindexed onto fixed axes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossTab {
    pub row_dimension: String,
    pub column_dimension: String,
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `counts[r][c]` for `rows[r]` × `columns[c]`; absent combinations are 0.
    pub counts: Vec<Vec<u64>>,
    /// Rows whose values were not on the requested axes.
    pub outside_axes: usize,
    pub unlabeled: usize,
    pub missing: usize,
}

impl CrossTab {
    pub fn get(&self, row: &str, column: &str) -> Option<u64> {
        let r = self.rows.iter().position(|v| v == row)?;
        let c = self.columns.iter().position(|v| v == column)?;
        Some(self.counts[r][c])
    }

    pub fn row_totals(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    pub fn column_totals(&self) -> Vec<u64> {
        (0..self.columns.len())
            .map(|c| self.counts.iter().map(|row| row[c]).sum())
            .collect()
    }

    pub fn total(&self) -> u64 {
        self.row_totals().iter().sum()
    }
}

/// Descriptive statistics of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: Column,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Equal-width distribution of a numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub column: Column,
    /// `counts.len() + 1` bin edges, ascending.
    pub edges: Vec<f64>,
    pub counts: Vec<u64>,
    pub missing: usize,
}

/// Mean of each numeric column for one segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentMeans {
    pub label: SegmentLabel,
    pub rows: usize,
    pub means: Vec<f64>,
}

/// Per-segment feature means, segments ascending by label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentProfile {
    pub columns: Vec<Column>,
    pub segments: Vec<SegmentMeans>,
    pub unlabeled: usize,
}

impl SegmentProfile {
    pub fn mean(&self, label: u8, column: Column) -> Option<f64> {
        let c = self.columns.iter().position(|&col| col == column)?;
        self.segments
            .iter()
            .find(|s| s.label.value() == label)
            .map(|s| s.means[c])
    }
}
