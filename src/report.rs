//! Named report sections assembled from aggregation results.
//!
//! The orchestrator does no computation of its own: each section is a fixed
//! list of aggregation calls, and the first failing call fails the section.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::aggregation::describe::{describe, histogram, segment_profile};
use crate::aggregation::engine::{GroupKey, Measure, count_by, cross_tab, mean_by, sum_by, top_n};
use crate::aggregation::types::{AggregationResult, ColumnSummary, CrossTab, Histogram, SegmentProfile};
use crate::catalog::SegmentCatalog;
use crate::error::{AggregationError, ReportError};
use crate::record::Column;
use crate::store::{Dataset, DatasetStore};

const TOP_LOCATIONS: usize = 10;
const TOP_ITEMS: usize = 10;
const AMOUNT_BINS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReportSection {
    CustomerProfile,
    Sales,
    Segment,
}

impl ReportSection {
    pub const ALL: [ReportSection; 3] = [
        ReportSection::CustomerProfile,
        ReportSection::Sales,
        ReportSection::Segment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReportSection::CustomerProfile => "customer-profile",
            ReportSection::Sales => "sales",
            ReportSection::Segment => "segment",
        }
    }
}

impl fmt::Display for ReportSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ReportValue {
    Grouped(AggregationResult),
    CrossTab(CrossTab),
    Summary(Vec<ColumnSummary>),
    Histogram(Histogram),
    Profile(SegmentProfile),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportEntry {
    pub name: &'static str,
    pub value: ReportValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub section: ReportSection,
    pub generated_at: DateTime<Utc>,
    /// Rows the dataset held when the report was built.
    pub rows: usize,
    /// Rows skipped as malformed while loading.
    pub skipped_rows: usize,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    pub fn entry(&self, name: &str) -> Option<&ReportValue> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.value)
    }

    /// The grouped result named `name`, if that entry is one.
    pub fn grouped(&self, name: &str) -> Option<&AggregationResult> {
        match self.entry(name)? {
            ReportValue::Grouped(result) => Some(result),
            _ => None,
        }
    }

    pub fn cross_tab(&self, name: &str) -> Option<&CrossTab> {
        match self.entry(name)? {
            ReportValue::CrossTab(table) => Some(table),
            _ => None,
        }
    }
}

/// Builds report sections against one segment catalog.
#[derive(Debug, Clone, Copy)]
pub struct ReportOrchestrator {
    catalog: SegmentCatalog,
}

impl ReportOrchestrator {
    pub fn new(catalog: SegmentCatalog) -> Self {
        Self { catalog }
    }

    /// Loads a fresh snapshot from `store` and builds `section` over it.
    pub fn load_and_build(
        &self,
        store: &DatasetStore,
        section: ReportSection,
    ) -> Result<Report, ReportError> {
        let dataset = store.load()?;
        Ok(self.build(&dataset, section)?)
    }

    #[tracing::instrument(skip(self, dataset), fields(rows = dataset.len()))]
    pub fn build(&self, dataset: &Dataset, section: ReportSection) -> Result<Report, AggregationError> {
        let entries = match section {
            ReportSection::CustomerProfile => customer_profile(dataset)?,
            ReportSection::Sales => sales(dataset)?,
            ReportSection::Segment => self.segment(dataset)?,
        };
        debug!(entries = entries.len(), "Report section built");

        Ok(Report {
            section,
            generated_at: Utc::now(),
            rows: dataset.len(),
            skipped_rows: dataset.warnings().len(),
            entries,
        })
    }

    fn segment(&self, dataset: &Dataset) -> Result<Vec<ReportEntry>, AggregationError> {
        let labels: Vec<String> = self.catalog.labels().map(|l| l.to_string()).collect();
        let labels: Vec<&str> = labels.iter().map(String::as_str).collect();

        Ok(vec![
            grouped("customers_per_segment", count_by(dataset, GroupKey::Segment)?),
            grouped(
                "mean_previous_purchases_by_segment",
                mean_by(dataset, GroupKey::Segment, Column::PreviousPurchases)?,
            ),
            ReportEntry {
                name: "segment_by_category",
                value: ReportValue::CrossTab(cross_tab(
                    dataset,
                    GroupKey::Segment,
                    GroupKey::Column(Column::Category),
                    &labels,
                    &axis(Column::Category),
                )?),
            },
            ReportEntry {
                name: "segment_profile",
                value: ReportValue::Profile(segment_profile(dataset)?),
            },
            ReportEntry {
                name: "numeric_summary",
                value: ReportValue::Summary(describe(dataset)),
            },
        ])
    }
}

/// Fixed category ordering of an enum-backed column.
fn axis(column: Column) -> Vec<&'static str> {
    column.domain().unwrap_or_default()
}

fn grouped(name: &'static str, result: AggregationResult) -> ReportEntry {
    ReportEntry {
        name,
        value: ReportValue::Grouped(result),
    }
}

fn customer_profile(dataset: &Dataset) -> Result<Vec<ReportEntry>, AggregationError> {
    let gender = GroupKey::Column(Column::Gender);
    Ok(vec![
        grouped("gender", count_by(dataset, gender)?),
        grouped("age_group", count_by(dataset, GroupKey::AgeBucket)?),
        grouped(
            "top_locations",
            top_n(dataset, GroupKey::Column(Column::Location), Measure::Count, TOP_LOCATIONS)?,
        ),
        grouped(
            "payment_method",
            count_by(dataset, GroupKey::Column(Column::PreferredPaymentMethod))?,
        ),
        grouped(
            "purchase_frequency",
            count_by(dataset, GroupKey::Column(Column::Frequency))?,
        ),
    ])
}

fn sales(dataset: &Dataset) -> Result<Vec<ReportEntry>, AggregationError> {
    let category = GroupKey::Column(Column::Category);
    Ok(vec![
        grouped(
            "amount_by_category",
            sum_by(dataset, category, Column::PurchaseAmount)?,
        ),
        grouped(
            "mean_amount_by_category",
            mean_by(dataset, category, Column::PurchaseAmount)?,
        ),
        grouped(
            "amount_by_season",
            sum_by(dataset, GroupKey::Column(Column::Season), Column::PurchaseAmount)?,
        ),
        grouped(
            "amount_by_age_group",
            sum_by(dataset, GroupKey::AgeBucket, Column::PurchaseAmount)?,
        ),
        grouped(
            "top_items",
            top_n(dataset, GroupKey::Column(Column::ItemPurchased), Measure::Count, TOP_ITEMS)?,
        ),
        grouped(
            "mean_rating_by_category",
            mean_by(dataset, category, Column::ReviewRating)?,
        ),
        ReportEntry {
            name: "season_by_category",
            value: ReportValue::CrossTab(cross_tab(
                dataset,
                GroupKey::Column(Column::Season),
                category,
                &axis(Column::Season),
                &axis(Column::Category),
            )?),
        },
        ReportEntry {
            name: "amount_distribution",
            value: ReportValue::Histogram(histogram(dataset, Column::PurchaseAmount, AMOUNT_BINS)?),
        },
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::engine::tests::{dataset, row};
    use crate::catalog::{CatalogVersion, SegmentLabel};
    use crate::store::Row;

    fn orchestrator() -> ReportOrchestrator {
        ReportOrchestrator::new(SegmentCatalog::new(CatalogVersion::Five))
    }

    fn sample() -> Dataset {
        let customer = |gender: &str, age: u32, category: &str, season: &str, amount: f64, label: Option<u8>| Row {
            age: Some(age),
            gender: Some(gender.to_string()),
            item_purchased: Some("Blouse".to_string()),
            category: Some(category.to_string()),
            purchase_amount: Some(amount),
            location: Some("Kentucky".to_string()),
            color: Some("Gray".to_string()),
            season: Some(season.to_string()),
            review_rating: Some(4.0),
            previous_purchases: Some(age / 2),
            preferred_payment_method: Some("Venmo".to_string()),
            frequency: Some("Weekly".to_string()),
            label: label.map(SegmentLabel::new),
            ..row()
        };
        dataset(vec![
            customer("Male", 15, "Clothing", "Spring", 20.0, Some(0)),
            customer("Male", 25, "Clothing", "Spring", 30.0, Some(1)),
            customer("Female", 35, "Footwear", "Summer", 50.0, Some(1)),
            customer("Female", 65, "Accessories", "Winter", 100.0, None),
            customer("Female", 45, "Clothing", "Fall", 0.0, Some(4)),
        ])
    }

    #[test]
    fn test_customer_profile_section() {
        let report = orchestrator()
            .build(&sample(), ReportSection::CustomerProfile)
            .unwrap();

        assert_eq!(report.section, ReportSection::CustomerProfile);
        assert_eq!(report.rows, 5);

        let gender = report.grouped("gender").unwrap();
        assert_eq!(gender.get(&["Female"]), Some(3.0));
        assert_eq!(gender.percent(&["Male"]), Some(40.0));

        let ages = report.grouped("age_group").unwrap();
        assert_eq!(ages.get(&["60+"]), Some(1.0));
        assert!(report.grouped("top_locations").unwrap().len() <= TOP_LOCATIONS);
    }

    #[test]
    fn test_sales_section() {
        let report = orchestrator().build(&sample(), ReportSection::Sales).unwrap();

        let by_category = report.grouped("amount_by_category").unwrap();
        assert_eq!(by_category.get(&["Accessories"]), Some(100.0));
        assert_eq!(by_category.top.as_ref().unwrap().key, vec!["Accessories"]);

        let seasons: Vec<_> = report
            .grouped("amount_by_season")
            .unwrap()
            .groups
            .iter()
            .map(|g| g.key[0].clone())
            .collect();
        assert_eq!(seasons, vec!["Spring", "Summer", "Fall", "Winter"]);

        let table = report.cross_tab("season_by_category").unwrap();
        assert_eq!(table.get("Spring", "Clothing"), Some(2));
        assert_eq!(table.get("Winter", "Outerwear"), Some(0));

        match report.entry("amount_distribution") {
            Some(ReportValue::Histogram(hist)) => {
                assert_eq!(hist.counts.iter().sum::<u64>(), 5)
            }
            other => panic!("unexpected entry: {other:?}"),
        }
    }

    #[test]
    fn test_segment_section_reports_unlabeled_rows() {
        let report = orchestrator().build(&sample(), ReportSection::Segment).unwrap();

        let counts = report.grouped("customers_per_segment").unwrap();
        assert_eq!(counts.get(&["1"]), Some(2.0));
        assert_eq!(counts.unlabeled, 1);

        let table = report.cross_tab("segment_by_category").unwrap();
        assert_eq!(table.rows, vec!["0", "1", "2", "3", "4"]);
        assert_eq!(table.get("2", "Clothing"), Some(0));
        assert_eq!(table.unlabeled, 1);
    }

    #[test]
    fn test_missing_column_fails_the_section() {
        let data = Dataset::new(vec![Column::Age, Column::Category], vec![]);
        let err = orchestrator()
            .build(&data, ReportSection::CustomerProfile)
            .unwrap_err();
        assert_eq!(err, AggregationError::MissingColumn(Column::Gender));
    }

    #[test]
    fn test_report_serializes_section_name() {
        let report = orchestrator().build(&sample(), ReportSection::Sales).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["section"], "sales");
        assert_eq!(json["entries"][0]["value"]["kind"], "grouped");
    }
}
