pub mod aggregation;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod output;
pub mod record;
pub mod report;
pub mod service;
pub mod store;

pub use catalog::{CatalogVersion, SegmentCatalog, SegmentDefinition, SegmentLabel};
pub use classifier::SegmentClassifier;
pub use encoder::{FeatureEncoder, FeatureVector};
pub use record::{CustomerRecord, RawCustomerInput};
pub use report::{Report, ReportOrchestrator, ReportSection};
pub use service::{Classification, SegmentationService};
pub use store::{Dataset, DatasetStore};
