//! Segment inference over a pre-trained pipeline artifact.
//!
//! The artifact is fit offline and shipped as JSON: a preprocessing stage
//! (standard scaling of numeric features, one-hot encoding of categorical
//! features) followed by a decision function. The classifier is loaded once,
//! never mutated afterwards, and is safe to share across threads.

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::catalog::{CatalogVersion, SegmentCatalog, SegmentLabel};
use crate::encoder::{FeatureVector, MODEL_INPUTS};
use crate::error::{InferenceError, ModelUnavailableError};
use crate::record::Column;

#[derive(Debug, Deserialize)]
struct PipelineArtifact {
    catalog_version: CatalogVersion,
    #[serde(default)]
    numeric: Vec<NumericStep>,
    #[serde(default)]
    categorical: Vec<CategoricalStep>,
    decision: Decision,
}

#[derive(Debug, Deserialize)]
struct NumericStep {
    feature: String,
    mean: f64,
    scale: f64,
}

#[derive(Debug, Deserialize)]
struct CategoricalStep {
    feature: String,
    categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Decision {
    NearestCentroid {
        centroids: Vec<Vec<f64>>,
    },
    Linear {
        weights: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
    },
    Tree {
        nodes: Vec<TreeNode>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        label: u8,
    },
}

#[derive(Debug)]
struct Scaler {
    column: Column,
    mean: f64,
    scale: f64,
}

#[derive(Debug)]
struct OneHot {
    column: Column,
    categories: Vec<String>,
}

/// Immutable, validated inference pipeline bound to one catalog version.
#[derive(Debug)]
pub struct SegmentClassifier {
    catalog: SegmentCatalog,
    scalers: Vec<Scaler>,
    encoders: Vec<OneHot>,
    decision: Decision,
    width: usize,
}

impl SegmentClassifier {
    /// Loads and validates the artifact at `path`.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal for classification: there is no degraded mode.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display(), catalog = %catalog.version()))]
    pub fn load(
        path: impl AsRef<Path>,
        catalog: SegmentCatalog,
    ) -> Result<Self, ModelUnavailableError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ModelUnavailableError::Missing(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let classifier = Self::from_json(&content, catalog)?;

        info!(
            width = classifier.width,
            segments = classifier.catalog.len(),
            "Segment classifier loaded"
        );
        Ok(classifier)
    }

    /// Parses and validates an artifact from its JSON text.
    pub fn from_json(json: &str, catalog: SegmentCatalog) -> Result<Self, ModelUnavailableError> {
        let artifact: PipelineArtifact = serde_json::from_str(json)?;

        if artifact.catalog_version != catalog.version() {
            return Err(ModelUnavailableError::CatalogMismatch {
                artifact: artifact.catalog_version.as_str(),
                configured: catalog.version().as_str(),
            });
        }

        let mut scalers = Vec::with_capacity(artifact.numeric.len());
        for step in artifact.numeric {
            let column = model_input(&step.feature, true)?;
            if !step.mean.is_finite() || !step.scale.is_finite() || step.scale <= 0.0 {
                return Err(invalid(format!(
                    "scaler for `{}` needs a finite mean and a positive scale",
                    step.feature
                )));
            }
            scalers.push(Scaler {
                column,
                mean: step.mean,
                scale: step.scale,
            });
        }

        let mut encoders = Vec::with_capacity(artifact.categorical.len());
        for step in artifact.categorical {
            let column = model_input(&step.feature, false)?;
            if step.categories.is_empty() {
                return Err(invalid(format!(
                    "encoder for `{}` has no categories",
                    step.feature
                )));
            }
            encoders.push(OneHot {
                column,
                categories: step.categories,
            });
        }

        let width = scalers.len() + encoders.iter().map(|e| e.categories.len()).sum::<usize>();
        if width == 0 {
            return Err(invalid("pipeline has no input features".to_string()));
        }

        validate_decision(&artifact.decision, width, catalog.len())?;

        Ok(Self {
            catalog,
            scalers,
            encoders,
            decision: artifact.decision,
            width,
        })
    }

    pub fn catalog(&self) -> &SegmentCatalog {
        &self.catalog
    }

    /// Length of the preprocessed vector the decision function consumes.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Applies the preprocessing stage: scaled numerics, then one-hot blocks.
    /// Categories unseen at fit time encode as an all-zero block.
    pub fn preprocess(&self, features: &FeatureVector) -> Vec<f64> {
        let mut dense = Vec::with_capacity(self.width);

        for scaler in &self.scalers {
            let raw = features.numeric(scaler.column).unwrap_or_default();
            dense.push((raw - scaler.mean) / scaler.scale);
        }

        for encoder in &self.encoders {
            let value = features.categorical(encoder.column).unwrap_or_default();
            dense.extend(
                encoder
                    .categories
                    .iter()
                    .map(|c| if c == value { 1.0 } else { 0.0 }),
            );
        }

        dense
    }

    /// Scores `features` and returns the segment label.
    #[tracing::instrument(skip_all)]
    pub fn classify(&self, features: &FeatureVector) -> Result<SegmentLabel, InferenceError> {
        let dense = self.preprocess(features);
        if let Some(index) = dense.iter().position(|v| !v.is_finite()) {
            return Err(InferenceError::NonFiniteFeature(index));
        }

        let index = match &self.decision {
            Decision::NearestCentroid { centroids } => {
                let distances = centroids
                    .iter()
                    .map(|c| squared_distance(&dense, c))
                    .collect::<Vec<_>>();
                arg_best(&distances, |candidate, best| candidate < best)?
            }
            Decision::Linear {
                weights,
                intercepts,
            } => {
                let scores = weights
                    .iter()
                    .zip(intercepts)
                    .map(|(w, b)| b + dot(&dense, w))
                    .collect::<Vec<_>>();
                arg_best(&scores, |candidate, best| candidate > best)?
            }
            Decision::Tree { nodes } => walk_tree(nodes, &dense)?,
        };

        let label = SegmentLabel::new(index as u8);
        debug!(label = label.value(), "Customer classified");
        Ok(label)
    }
}

fn invalid(reason: String) -> ModelUnavailableError {
    ModelUnavailableError::Invalid(reason)
}

fn model_input(name: &str, numeric: bool) -> Result<Column, ModelUnavailableError> {
    let column = Column::from_header(name)
        .filter(|c| MODEL_INPUTS.contains(c))
        .ok_or_else(|| invalid(format!("`{name}` is not a model input feature")))?;

    if column.is_numeric() != numeric {
        let expected = if numeric { "numeric" } else { "categorical" };
        return Err(invalid(format!("`{name}` is not a {expected} feature")));
    }
    Ok(column)
}

fn validate_matrix(
    name: &str,
    rows: &[Vec<f64>],
    width: usize,
    segments: usize,
) -> Result<(), ModelUnavailableError> {
    if rows.len() != segments {
        return Err(invalid(format!(
            "{name} has {} rows but the catalog has {segments} segments",
            rows.len()
        )));
    }
    for row in rows {
        if row.len() != width {
            return Err(invalid(format!(
                "{name} row has {} values but the pipeline produces {width}",
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(invalid(format!("{name} contains non-finite values")));
        }
    }
    Ok(())
}

fn validate_decision(
    decision: &Decision,
    width: usize,
    segments: usize,
) -> Result<(), ModelUnavailableError> {
    match decision {
        Decision::NearestCentroid { centroids } => {
            validate_matrix("centroids", centroids, width, segments)
        }
        Decision::Linear {
            weights,
            intercepts,
        } => {
            validate_matrix("weights", weights, width, segments)?;
            if intercepts.len() != segments || intercepts.iter().any(|v| !v.is_finite()) {
                return Err(invalid(format!(
                    "linear decision needs {segments} finite intercepts"
                )));
            }
            Ok(())
        }
        Decision::Tree { nodes } => {
            if nodes.is_empty() {
                return Err(invalid("decision tree has no nodes".to_string()));
            }
            for (i, node) in nodes.iter().enumerate() {
                match *node {
                    TreeNode::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        if feature >= width || !threshold.is_finite() {
                            return Err(invalid(format!("tree node {i} has a bad split")));
                        }
                        // Children point strictly forward so every walk terminates.
                        if left <= i || right <= i || left >= nodes.len() || right >= nodes.len() {
                            return Err(invalid(format!("tree node {i} has bad children")));
                        }
                    }
                    TreeNode::Leaf { label } => {
                        if label as usize >= segments {
                            return Err(invalid(format!(
                                "tree leaf {i} predicts label {label} outside the catalog"
                            )));
                        }
                    }
                }
            }
            Ok(())
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Index of the best score; ties resolve to the lowest index.
fn arg_best(scores: &[f64], better: impl Fn(f64, f64) -> bool) -> Result<usize, InferenceError> {
    let mut best = 0;
    for (i, &score) in scores.iter().enumerate() {
        if !score.is_finite() {
            return Err(InferenceError::NonFinite(i));
        }
        if better(score, scores[best]) {
            best = i;
        }
    }
    Ok(best)
}

fn walk_tree(nodes: &[TreeNode], dense: &[f64]) -> Result<usize, InferenceError> {
    let mut index = 0;
    loop {
        match nodes.get(index) {
            Some(TreeNode::Leaf { label }) => return Ok(*label as usize),
            Some(TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            }) => {
                let value = dense.get(*feature).copied().unwrap_or_default();
                index = if value <= *threshold { *left } else { *right };
            }
            None => return Err(InferenceError::BrokenTree(index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::FeatureEncoder;
    use crate::encoder::tests::sample_input;
    use serde_json::json;

    fn five() -> SegmentCatalog {
        SegmentCatalog::new(CatalogVersion::Five)
    }

    fn centroid_artifact() -> serde_json::Value {
        json!({
            "catalog_version": "five",
            "numeric": [
                {"feature": "Age", "mean": 44.0, "scale": 15.0},
                {"feature": "Purchase Amount (USD)", "mean": 60.0, "scale": 23.0}
            ],
            "categorical": [
                {"feature": "Season", "categories": ["Fall", "Spring", "Summer", "Winter"]}
            ],
            "decision": {
                "kind": "nearest_centroid",
                "centroids": [
                    [1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                    [-1.5, -0.5, 0.0, 0.0, 0.0, 0.0],
                    [0.0, -1.5, 0.0, 0.0, 0.0, 0.0],
                    [0.0, 1.5, 0.0, 0.0, 0.0, 0.0],
                    [1.5, -0.5, 0.0, 0.0, 0.0, 1.0]
                ]
            }
        })
    }

    fn classifier(artifact: serde_json::Value) -> SegmentClassifier {
        SegmentClassifier::from_json(&artifact.to_string(), five()).unwrap()
    }

    fn features(age: i64, amount: f64, season: &str) -> FeatureVector {
        let mut input = sample_input();
        input.age = age;
        input.purchase_amount = amount;
        input.season = season.to_string();
        FeatureEncoder::encode(&input).unwrap()
    }

    #[test]
    fn test_preprocess_scales_and_one_hot_encodes() {
        let model = classifier(centroid_artifact());
        let dense = model.preprocess(&features(59, 83.0, "Summer"));

        assert_eq!(model.width(), 6);
        assert_eq!(dense, vec![1.0, 1.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_nearest_centroid_classification() {
        let model = classifier(centroid_artifact());

        let young = model.classify(&features(21, 48.5, "Spring")).unwrap();
        assert_eq!(young.value(), 1);

        let big_spender = model.classify(&features(44, 95.0, "Spring")).unwrap();
        assert_eq!(big_spender.value(), 3);
    }

    #[test]
    fn test_labels_always_belong_to_catalog() {
        let model = classifier(centroid_artifact());
        for age in [0, 18, 35, 60, 120] {
            for amount in [0.0, 20.0, 100.0, 5000.0] {
                let label = model.classify(&features(age, amount, "Winter")).unwrap();
                assert!(model.catalog().contains(label));
            }
        }
    }

    #[test]
    fn test_linear_decision_breaks_ties_to_lowest_label() {
        let artifact = json!({
            "catalog_version": "five",
            "numeric": [{"feature": "Review Rating", "mean": 3.0, "scale": 1.0}],
            "decision": {
                "kind": "linear",
                "weights": [[0.0], [1.0], [1.0], [-1.0], [0.0]],
                "intercepts": [0.0, 0.0, 0.0, 0.0, 0.0]
            }
        });
        let model = classifier(artifact);

        let mut input = sample_input();
        input.review_rating = 4.0;
        let label = model.classify(&FeatureEncoder::encode(&input).unwrap()).unwrap();
        assert_eq!(label.value(), 1);

        input.review_rating = 3.0;
        let label = model.classify(&FeatureEncoder::encode(&input).unwrap()).unwrap();
        assert_eq!(label.value(), 0);
    }

    #[test]
    fn test_tree_decision() {
        let artifact = json!({
            "catalog_version": "five",
            "numeric": [{"feature": "Previous Purchases", "mean": 0.0, "scale": 1.0}],
            "categorical": [{"feature": "Category", "categories": ["Accessories", "Clothing"]}],
            "decision": {
                "kind": "tree",
                "nodes": [
                    {"split": {"feature": 0, "threshold": 10.0, "left": 1, "right": 2}},
                    {"leaf": {"label": 1}},
                    {"split": {"feature": 2, "threshold": 0.5, "left": 3, "right": 4}},
                    {"leaf": {"label": 0}},
                    {"leaf": {"label": 4}}
                ]
            }
        });
        let model = classifier(artifact);

        let mut input = sample_input();
        input.previous_purchases = 3;
        assert_eq!(model.classify(&FeatureEncoder::encode(&input).unwrap()).unwrap().value(), 1);

        input.previous_purchases = 30;
        input.category = "Clothing".to_string();
        assert_eq!(model.classify(&FeatureEncoder::encode(&input).unwrap()).unwrap().value(), 4);

        input.category = "Footwear".to_string();
        assert_eq!(model.classify(&FeatureEncoder::encode(&input).unwrap()).unwrap().value(), 0);
    }

    #[test]
    fn test_catalog_mismatch_is_fatal() {
        let err = SegmentClassifier::from_json(
            &centroid_artifact().to_string(),
            SegmentCatalog::new(CatalogVersion::Six),
        )
        .unwrap_err();

        assert!(matches!(err, ModelUnavailableError::CatalogMismatch { .. }));
    }

    #[test]
    fn test_wrong_centroid_count_is_rejected() {
        let mut artifact = centroid_artifact();
        artifact["decision"]["centroids"]
            .as_array_mut()
            .unwrap()
            .pop();

        let err = SegmentClassifier::from_json(&artifact.to_string(), five()).unwrap_err();
        assert!(matches!(err, ModelUnavailableError::Invalid(_)));
    }

    #[test]
    fn test_unknown_feature_is_rejected() {
        let mut artifact = centroid_artifact();
        artifact["numeric"][0]["feature"] = json!("Gender");

        let err = SegmentClassifier::from_json(&artifact.to_string(), five()).unwrap_err();
        assert!(matches!(err, ModelUnavailableError::Invalid(_)));
    }

    #[test]
    fn test_backward_tree_edge_is_rejected() {
        let artifact = json!({
            "catalog_version": "five",
            "numeric": [{"feature": "Age", "mean": 0.0, "scale": 1.0}],
            "decision": {
                "kind": "tree",
                "nodes": [
                    {"split": {"feature": 0, "threshold": 1.0, "left": 0, "right": 1}},
                    {"leaf": {"label": 0}}
                ]
            }
        });

        let err = SegmentClassifier::from_json(&artifact.to_string(), five()).unwrap_err();
        assert!(matches!(err, ModelUnavailableError::Invalid(_)));
    }

    #[test]
    fn test_corrupt_and_missing_artifacts() {
        let err = SegmentClassifier::from_json("{not json", five()).unwrap_err();
        assert!(matches!(err, ModelUnavailableError::Corrupt(_)));

        let err = SegmentClassifier::load("/nonexistent/pipeline.json", five()).unwrap_err();
        assert!(matches!(err, ModelUnavailableError::Missing(_)));
    }

    #[test]
    fn test_overflowing_score_is_an_inference_error() {
        let artifact = json!({
            "catalog_version": "five",
            "numeric": [{"feature": "Purchase Amount (USD)", "mean": 0.0, "scale": 1e-300}],
            "decision": {
                "kind": "linear",
                "weights": [[1.0], [1.0], [1.0], [1.0], [1.0]],
                "intercepts": [0.0, 0.0, 0.0, 0.0, 0.0]
            }
        });
        let model = classifier(artifact);

        let mut input = sample_input();
        input.purchase_amount = 1e300;
        let err = model
            .classify(&FeatureEncoder::encode(&input).unwrap())
            .unwrap_err();
        assert_eq!(err, InferenceError::NonFiniteFeature(0));
    }
}
