//! Request-level entry points composing encoder, classifier, catalog and store.

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::{SegmentDefinition, SegmentLabel};
use crate::classifier::SegmentClassifier;
use crate::encoder::{FeatureEncoder, FeatureVector};
use crate::error::{ClassifyError, ReportError};
use crate::record::RawCustomerInput;
use crate::report::{Report, ReportOrchestrator, ReportSection};
use crate::store::DatasetStore;

/// Outcome of one successful classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub label: SegmentLabel,
    pub segment: SegmentDefinition,
}

/// Long-lived service holding the immutable classifier and the single store writer.
///
/// Safe to share across threads: classification only reads the classifier,
/// and the store serializes its own appends.
#[derive(Debug)]
pub struct SegmentationService {
    classifier: SegmentClassifier,
    store: DatasetStore,
    reports: ReportOrchestrator,
}

impl SegmentationService {
    pub fn new(classifier: SegmentClassifier, store: DatasetStore) -> Self {
        let reports = ReportOrchestrator::new(*classifier.catalog());
        Self {
            classifier,
            store,
            reports,
        }
    }

    pub fn classifier(&self) -> &SegmentClassifier {
        &self.classifier
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    /// Validates, scores and records one customer.
    ///
    /// Nothing is appended unless validation and scoring both succeed. A
    /// [`ClassifyError::Persistence`] means the label was computed but the
    /// record was not stored.
    #[tracing::instrument(skip_all)]
    pub fn classify(&self, raw: &RawCustomerInput) -> Result<Classification, ClassifyError> {
        let record = FeatureEncoder::validate(raw).inspect_err(|err| {
            warn!(field = err.field, reason = %err.reason, "Rejected customer input");
        })?;
        let label = self.classifier.classify(&FeatureVector::from(&record))?;
        let segment = self.classifier.catalog().describe(label);

        self.store.append(&record, label)?;
        info!(label = label.value(), segment = segment.name, "Customer classified");

        Ok(Classification { label, segment })
    }

    /// Builds one report section over a fresh snapshot of the store.
    pub fn report(&self, section: ReportSection) -> Result<Report, ReportError> {
        self.reports.load_and_build(&self.store, section)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogVersion, SegmentCatalog};
    use crate::encoder::tests::sample_input;
    use crate::error::{InferenceError, ValidationError};
    use tempfile::TempDir;

    const ARTIFACT: &str = r#"{
        "catalog_version": "five",
        "numeric": [{"feature": "Previous Purchases", "mean": 0.0, "scale": 10.0}],
        "categorical": [],
        "decision": {"kind": "nearest_centroid", "centroids": [[0.0], [1.0], [2.0], [3.0], [4.0]]}
    }"#;

    fn service(dir: &TempDir) -> SegmentationService {
        let classifier =
            SegmentClassifier::from_json(ARTIFACT, SegmentCatalog::new(CatalogVersion::Five))
                .unwrap();
        SegmentationService::new(classifier, DatasetStore::new(dir.path().join("customers.csv")))
    }

    #[test]
    fn test_classify_appends_labelled_record() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let outcome = service.classify(&sample_input()).unwrap();
        assert_eq!(outcome.label.value(), 1);
        assert_eq!(outcome.segment.label, outcome.label);

        let dataset = service.store().load().unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.rows()[0].label, Some(outcome.label));
    }

    #[test]
    fn test_out_of_domain_category_is_not_appended() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let raw = RawCustomerInput {
            category: "Shoes".to_string(),
            ..sample_input()
        };

        let err = service.classify(&raw).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::Validation(ValidationError { field: "Category", .. })
        ));
        assert!(!service.store().path().exists());
    }

    #[test]
    fn test_report_after_classification() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        service.classify(&sample_input()).unwrap();
        service.classify(&sample_input()).unwrap();

        let report = service.report(ReportSection::Segment).unwrap();
        let counts = report.grouped("customers_per_segment").unwrap();
        assert_eq!(counts.get(&["1"]), Some(2.0));
    }

    #[test]
    fn test_report_without_dataset_is_a_load_error() {
        let dir = TempDir::new().unwrap();
        let err = service(&dir).report(ReportSection::Sales).unwrap_err();
        assert!(matches!(err, ReportError::Load(_)));
    }

    #[test]
    fn test_inference_failure_is_not_appended() {
        let dir = TempDir::new().unwrap();
        let overflowing = r#"{
            "catalog_version": "five",
            "numeric": [{"feature": "Age", "mean": 0.0, "scale": 1e-308}],
            "decision": {"kind": "nearest_centroid", "centroids": [[0.0], [1.0], [2.0], [3.0], [4.0]]}
        }"#;
        let classifier =
            SegmentClassifier::from_json(overflowing, SegmentCatalog::new(CatalogVersion::Five))
                .unwrap();
        let service =
            SegmentationService::new(classifier, DatasetStore::new(dir.path().join("customers.csv")));

        let err = service.classify(&sample_input()).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::Inference(InferenceError::NonFiniteFeature(0))
        ));
        assert!(!service.store().path().exists());
    }

    #[test]
    fn test_persistence_failure_reports_record_as_not_stored() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("data");
        std::fs::write(&blocker, "not a directory").unwrap();
        let classifier =
            SegmentClassifier::from_json(ARTIFACT, SegmentCatalog::new(CatalogVersion::Five))
                .unwrap();
        let service =
            SegmentationService::new(classifier, DatasetStore::new(blocker.join("customers.csv")));

        let err = service.classify(&sample_input()).unwrap_err();
        assert!(matches!(err, ClassifyError::Persistence(_)));
        assert_eq!(std::fs::read_to_string(&blocker).unwrap(), "not a directory");
        assert!(service.store().load().is_err());
    }
}
