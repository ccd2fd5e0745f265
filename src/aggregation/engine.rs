use std::collections::BTreeMap;

use crate::aggregation::binning::AgeBucket;
use crate::aggregation::types::{AggregationResult, CrossTab, GroupOrder, GroupValue, by_value_desc};
use crate::aggregation::utility::percent_of_total;
use crate::error::AggregationError;
use crate::record::{Column, Season};
use crate::store::{Dataset, Row};

/// A grouping dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    /// Raw values of a column.
    Column(Column),
    /// [`AgeBucket`] of the age column.
    AgeBucket,
    /// Segment label; unlabelled rows are excluded and counted separately.
    Segment,
}

impl GroupKey {
    pub fn name(self) -> String {
        match self {
            GroupKey::Column(column) => column.header().to_string(),
            GroupKey::AgeBucket => "Age Group".to_string(),
            GroupKey::Segment => Column::Cluster.header().to_string(),
        }
    }

    fn source(self) -> Column {
        match self {
            GroupKey::Column(column) => column,
            GroupKey::AgeBucket => Column::Age,
            GroupKey::Segment => Column::Cluster,
        }
    }

    fn has_natural_order(self) -> bool {
        matches!(
            self,
            GroupKey::AgeBucket | GroupKey::Column(Column::Season)
        )
    }

    fn rank(self, value: &str) -> usize {
        let rank = match self {
            GroupKey::AgeBucket => AgeBucket::from_label(value).map(AgeBucket::rank),
            GroupKey::Column(Column::Season) => Season::parse(value).map(|s| s as usize),
            _ => None,
        };
        rank.unwrap_or(usize::MAX)
    }

    fn extract(self, row: &Row) -> Extracted {
        let value = match self {
            GroupKey::Segment | GroupKey::Column(Column::Cluster) => {
                return match row.label {
                    Some(label) => Extracted::Value(label.to_string()),
                    None => Extracted::Unlabeled,
                };
            }
            GroupKey::AgeBucket => row
                .numeric(Column::Age)
                .and_then(AgeBucket::of)
                .map(|b| b.label().to_string()),
            GroupKey::Column(column) if column.is_numeric() => {
                row.numeric(column).map(|v| v.to_string())
            }
            GroupKey::Column(column) => row.text(column).map(str::to_string),
        };
        value.map_or(Extracted::Missing, Extracted::Value)
    }
}

enum Extracted {
    Value(String),
    Missing,
    Unlabeled,
}

/// What to compute per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    Count,
    Sum(Column),
    Mean(Column),
}

impl Measure {
    pub fn name(self) -> String {
        match self {
            Measure::Count => "count".to_string(),
            Measure::Sum(column) => format!("sum({})", column.header()),
            Measure::Mean(column) => format!("mean({})", column.header()),
        }
    }

    fn column(self) -> Option<Column> {
        match self {
            Measure::Count => None,
            Measure::Sum(column) | Measure::Mean(column) => Some(column),
        }
    }
}

#[derive(Default)]
struct Accumulator {
    rows: usize,
    observed: usize,
    sum: f64,
}

enum KeyOutcome {
    Key(Vec<String>),
    Missing,
    Unlabeled,
}

fn key_of(row: &Row, keys: &[GroupKey]) -> KeyOutcome {
    let mut parts = Vec::with_capacity(keys.len());
    let mut missing = false;
    for key in keys {
        match key.extract(row) {
            Extracted::Value(value) => parts.push(value),
            Extracted::Unlabeled => return KeyOutcome::Unlabeled,
            Extracted::Missing => missing = true,
        }
    }
    if missing {
        KeyOutcome::Missing
    } else {
        KeyOutcome::Key(parts)
    }
}

fn require_keys(dataset: &Dataset, keys: &[GroupKey]) -> Result<(), AggregationError> {
    keys.iter().try_for_each(|key| dataset.require(key.source()))
}

/// Groups `dataset` by `keys` and computes `measure` per group.
///
/// Groups are in natural order when every key has one, otherwise by
/// descending value with ties broken by ascending key.
pub fn aggregate(
    dataset: &Dataset,
    keys: &[GroupKey],
    measure: Measure,
) -> Result<AggregationResult, AggregationError> {
    require_keys(dataset, keys)?;
    if let Some(column) = measure.column() {
        if !column.is_numeric() {
            return Err(AggregationError::NotNumeric(column));
        }
        dataset.require(column)?;
    }

    let mut groups: BTreeMap<Vec<String>, Accumulator> = BTreeMap::new();
    let mut unlabeled = 0;
    let mut missing = 0;

    for row in dataset.rows() {
        let key = match key_of(row, keys) {
            KeyOutcome::Key(key) => key,
            KeyOutcome::Missing => {
                missing += 1;
                continue;
            }
            KeyOutcome::Unlabeled => {
                unlabeled += 1;
                continue;
            }
        };

        let acc = groups.entry(key).or_default();
        acc.rows += 1;
        if let Some(value) = measure.column().and_then(|c| row.numeric(c)) {
            acc.observed += 1;
            acc.sum += value;
        }
    }

    let values: Vec<(Vec<String>, f64, usize)> = groups
        .into_iter()
        .map(|(key, acc)| {
            let value = match measure {
                Measure::Count => acc.rows as f64,
                Measure::Sum(_) => acc.sum,
                Measure::Mean(_) if acc.observed == 0 => 0.0,
                Measure::Mean(_) => acc.sum / acc.observed as f64,
            };
            (key, value, acc.rows)
        })
        .collect();

    let total: f64 = values.iter().map(|(_, value, _)| value).sum();
    let mut groups: Vec<GroupValue> = values
        .into_iter()
        .map(|(key, value, rows)| GroupValue {
            key,
            value,
            rows,
            percent: percent_of_total(value, total),
        })
        .collect();

    let top = groups.iter().min_by(|a, b| by_value_desc(a, b)).cloned();

    let natural = !keys.is_empty() && keys.iter().all(|k| k.has_natural_order());
    let order = if natural {
        groups.sort_by(|a, b| {
            let rank = |g: &GroupValue| -> Vec<usize> {
                keys.iter().zip(&g.key).map(|(k, v)| k.rank(v)).collect()
            };
            rank(a).cmp(&rank(b)).then_with(|| a.key.cmp(&b.key))
        });
        GroupOrder::Natural
    } else {
        groups.sort_by(by_value_desc);
        GroupOrder::Descending
    };

    Ok(AggregationResult {
        dimensions: keys.iter().map(|k| k.name()).collect(),
        measure: measure.name(),
        order,
        groups,
        total,
        top,
        unlabeled,
        missing,
    })
}

pub fn count_by(dataset: &Dataset, key: GroupKey) -> Result<AggregationResult, AggregationError> {
    aggregate(dataset, &[key], Measure::Count)
}

pub fn sum_by(
    dataset: &Dataset,
    key: GroupKey,
    column: Column,
) -> Result<AggregationResult, AggregationError> {
    aggregate(dataset, &[key], Measure::Sum(column))
}

pub fn mean_by(
    dataset: &Dataset,
    key: GroupKey,
    column: Column,
) -> Result<AggregationResult, AggregationError> {
    aggregate(dataset, &[key], Measure::Mean(column))
}

/// The `n` largest groups of `key` by `measure`.
pub fn top_n(
    dataset: &Dataset,
    key: GroupKey,
    measure: Measure,
    n: usize,
) -> Result<AggregationResult, AggregationError> {
    aggregate(dataset, &[key], measure).map(|result| result.into_top_n(n))
}

/// Counts rows per `(row, column)` combination, reindexed onto the given axes.
pub fn cross_tab(
    dataset: &Dataset,
    row_key: GroupKey,
    column_key: GroupKey,
    row_axis: &[&str],
    column_axis: &[&str],
) -> Result<CrossTab, AggregationError> {
    require_keys(dataset, &[row_key, column_key])?;

    let mut counts = vec![vec![0u64; column_axis.len()]; row_axis.len()];
    let mut outside_axes = 0;
    let mut unlabeled = 0;
    let mut missing = 0;

    for row in dataset.rows() {
        let key = match key_of(row, &[row_key, column_key]) {
            KeyOutcome::Key(key) => key,
            KeyOutcome::Missing => {
                missing += 1;
                continue;
            }
            KeyOutcome::Unlabeled => {
                unlabeled += 1;
                continue;
            }
        };

        let r = row_axis.iter().position(|v| *v == key[0]);
        let c = column_axis.iter().position(|v| *v == key[1]);
        match (r, c) {
            (Some(r), Some(c)) => counts[r][c] += 1,
            _ => outside_axes += 1,
        }
    }

    Ok(CrossTab {
        row_dimension: row_key.name(),
        column_dimension: column_key.name(),
        rows: row_axis.iter().map(|v| v.to_string()).collect(),
        columns: column_axis.iter().map(|v| v.to_string()).collect(),
        counts,
        outside_axes,
        unlabeled,
        missing,
    })
}
