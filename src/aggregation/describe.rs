use std::collections::BTreeMap;

use crate::aggregation::types::{ColumnSummary, Histogram, SegmentMeans, SegmentProfile};
use crate::aggregation::utility::{mean, quantile, stddev};
use crate::catalog::SegmentLabel;
use crate::error::AggregationError;
use crate::record::Column;
use crate::store::Dataset;

fn numeric_values(dataset: &Dataset, column: Column) -> Result<Vec<f64>, AggregationError> {
    if !column.is_numeric() {
        return Err(AggregationError::NotNumeric(column));
    }
    dataset.require(column)?;
    Ok(dataset
        .rows()
        .iter()
        .filter_map(|row| row.numeric(column))
        .collect())
}

/// Summary statistics of one numeric column, ignoring missing cells.
pub fn describe_column(dataset: &Dataset, column: Column) -> Result<ColumnSummary, AggregationError> {
    let mut values = numeric_values(dataset, column)?;
    values.sort_by(f64::total_cmp);

    let m = mean(&values);
    Ok(ColumnSummary {
        column,
        count: values.len(),
        mean: m,
        std: stddev(&values, m),
        min: values.first().copied().unwrap_or(0.0),
        q25: quantile(&values, 0.25),
        median: quantile(&values, 0.5),
        q75: quantile(&values, 0.75),
        max: values.last().copied().unwrap_or(0.0),
    })
}

/// [`describe_column`] for every numeric column the dataset carries.
pub fn describe(dataset: &Dataset) -> Vec<ColumnSummary> {
    Column::NUMERIC
        .into_iter()
        .filter_map(|column| describe_column(dataset, column).ok())
        .collect()
}

/// Equal-width histogram over `[min, max]`.
///
/// Bins are half-open `[low, high)` except the last, which also includes
/// `max`. A constant column yields a single bin.
pub fn histogram(
    dataset: &Dataset,
    column: Column,
    bins: usize,
) -> Result<Histogram, AggregationError> {
    if bins == 0 {
        return Err(AggregationError::InvalidBins);
    }
    let values = numeric_values(dataset, column)?;
    let missing = dataset.len() - values.len();

    let (Some(min), Some(max)) = (
        values.iter().copied().min_by(f64::total_cmp),
        values.iter().copied().max_by(f64::total_cmp),
    ) else {
        return Ok(Histogram {
            column,
            edges: Vec::new(),
            counts: Vec::new(),
            missing,
        });
    };

    if min == max {
        return Ok(Histogram {
            column,
            edges: vec![min, max],
            counts: vec![values.len() as u64],
            missing,
        });
    }

    let width = (max - min) / bins as f64;
    let mut edges: Vec<f64> = (0..bins).map(|i| min + width * i as f64).collect();
    edges.push(max);

    let mut counts = vec![0u64; bins];
    for value in values {
        let bin = (((value - min) / width).floor() as usize).min(bins - 1);
        counts[bin] += 1;
    }

    Ok(Histogram {
        column,
        edges,
        counts,
        missing,
    })
}

/// Mean of every numeric column per segment, labels ascending.
pub fn segment_profile(dataset: &Dataset) -> Result<SegmentProfile, AggregationError> {
    dataset.require(Column::Cluster)?;
    let columns: Vec<Column> = Column::NUMERIC
        .into_iter()
        .filter(|&c| dataset.has_column(c))
        .collect();

    let mut segments: BTreeMap<SegmentLabel, (usize, Vec<Vec<f64>>)> = BTreeMap::new();
    let mut unlabeled = 0;

    for row in dataset.rows() {
        let Some(label) = row.label else {
            unlabeled += 1;
            continue;
        };
        let (rows, values) = segments
            .entry(label)
            .or_insert_with(|| (0, vec![Vec::new(); columns.len()]));
        *rows += 1;
        for (slot, &column) in values.iter_mut().zip(&columns) {
            if let Some(value) = row.numeric(column) {
                slot.push(value);
            }
        }
    }

    Ok(SegmentProfile {
        segments: segments
            .into_iter()
            .map(|(label, (rows, values))| SegmentMeans {
                label,
                rows,
                means: values.iter().map(|v| mean(v)).collect(),
            })
            .collect(),
        columns,
        unlabeled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::engine::tests::{dataset, row};
    use crate::store::Row;

    fn amounts(values: &[Option<f64>]) -> Dataset {
        dataset(
            values
                .iter()
                .map(|&amount| Row {
                    purchase_amount: amount,
                    ..row()
                })
                .collect(),
        )
    }

    #[test]
    fn test_describe_column() {
        let data = amounts(&[Some(1.0), Some(2.0), None, Some(3.0), Some(4.0)]);
        let summary = describe_column(&data, Column::PurchaseAmount).unwrap();

        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, 2.5);
        assert!((summary.std - 1.290_994_45).abs() < 1e-6);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.q25, 1.75);
        assert_eq!(summary.median, 2.5);
        assert_eq!(summary.q75, 3.25);
        assert_eq!(summary.max, 4.0);
    }

    #[test]
    fn test_describe_skips_absent_columns() {
        let data = Dataset::new(vec![Column::Age, Column::Gender], vec![]);
        let summaries = describe(&data);

        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].column, Column::Age);
        assert_eq!(summaries[0].count, 0);
        assert_eq!(summaries[0].mean, 0.0);
    }

    #[test]
    fn test_histogram_bins_are_half_open() {
        let data = amounts(&[Some(0.0), Some(5.0), Some(9.9), Some(10.0), Some(20.0), None]);
        let hist = histogram(&data, Column::PurchaseAmount, 2).unwrap();

        assert_eq!(hist.edges, vec![0.0, 10.0, 20.0]);
        assert_eq!(hist.counts, vec![3, 2]);
        assert_eq!(hist.missing, 1);
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let values: Vec<_> = (0..97).map(|v| Some(v as f64 * 1.3)).collect();
        let hist = histogram(&amounts(&values), Column::PurchaseAmount, 10).unwrap();

        assert_eq!(hist.counts.len(), 10);
        assert_eq!(hist.edges.len(), 11);
        assert_eq!(hist.counts.iter().sum::<u64>(), 97);
    }

    #[test]
    fn test_constant_column_yields_single_bin() {
        let data = amounts(&[Some(7.0), Some(7.0), Some(7.0)]);
        let hist = histogram(&data, Column::PurchaseAmount, 10).unwrap();

        assert_eq!(hist.counts, vec![3]);
        assert_eq!(hist.edges, vec![7.0, 7.0]);
    }

    #[test]
    fn test_histogram_rejects_zero_bins() {
        let data = amounts(&[Some(1.0)]);
        assert_eq!(
            histogram(&data, Column::PurchaseAmount, 0),
            Err(AggregationError::InvalidBins)
        );
        assert_eq!(
            histogram(&data, Column::Color, 5),
            Err(AggregationError::NotNumeric(Column::Color))
        );
    }

    #[test]
    fn test_empty_histogram() {
        let hist = histogram(&amounts(&[]), Column::PurchaseAmount, 4).unwrap();
        assert!(hist.counts.is_empty());
        assert!(hist.edges.is_empty());
    }

    #[test]
    fn test_segment_profile() {
        let labelled = |label: u8, age: u32, purchases: u32| Row {
            label: Some(SegmentLabel::new(label)),
            age: Some(age),
            previous_purchases: Some(purchases),
            ..row()
        };
        let data = dataset(vec![
            labelled(2, 60, 40),
            labelled(0, 20, 10),
            labelled(0, 30, 20),
            Row {
                age: Some(99),
                ..row()
            },
        ]);

        let profile = segment_profile(&data).unwrap();
        let labels: Vec<_> = profile.segments.iter().map(|s| s.label.value()).collect();
        assert_eq!(labels, vec![0, 2]);
        assert_eq!(profile.mean(0, Column::Age), Some(25.0));
        assert_eq!(profile.mean(2, Column::PreviousPurchases), Some(40.0));
        assert_eq!(profile.mean(0, Column::PurchaseAmount), Some(0.0));
        assert_eq!(profile.unlabeled, 1);
    }

    #[test]
    fn test_segment_profile_requires_cluster_column() {
        let data = Dataset::new(vec![Column::Age], vec![]);
        assert_eq!(
            segment_profile(&data),
            Err(AggregationError::MissingColumn(Column::Cluster))
        );
    }
}
