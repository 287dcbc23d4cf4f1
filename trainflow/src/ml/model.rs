//! A fitted preprocessor and classifier persisted as one artifact.

use serde::{Deserialize, Serialize};

use super::forest::RandomForestClassifier;
use super::metrics::ClassificationMetrics;
use super::preprocess::Preprocessor;
use crate::data::Table;
use crate::errors::FailureCause;

/// The deployable model: raw table rows in, class predictions out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    preprocessor: Preprocessor,
    classifier: RandomForestClassifier,
}

impl TrainedModel {
    /// Pairs a fitted preprocessor with a classifier trained on its output.
    #[must_use]
    pub fn new(preprocessor: Preprocessor, classifier: RandomForestClassifier) -> Self {
        Self {
            preprocessor,
            classifier,
        }
    }

    /// Predicts class indices for the rows of a raw table.
    pub fn predict(&self, table: &Table) -> Result<Vec<usize>, FailureCause> {
        let x = self.preprocessor.transform_features(table)?;
        Ok(self.classifier.predict(x.view())?.to_vec())
    }

    /// Scores the model on a raw table that includes the target column.
    pub fn evaluate(&self, table: &Table) -> Result<ClassificationMetrics, FailureCause> {
        let truth = self.preprocessor.encode_labels(table)?;
        let predicted = self.predict(table)?;
        Ok(ClassificationMetrics::compute(&truth.to_vec(), &predicted))
    }

    /// The fitted preprocessor.
    #[must_use]
    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// The classifier.
    #[must_use]
    pub fn classifier(&self) -> &RandomForestClassifier {
        &self.classifier
    }

    /// Serializes the model as JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a model; `origin` names the source in the error.
    pub fn from_bytes(bytes: &[u8], origin: &str) -> Result<Self, FailureCause> {
        serde_json::from_slice(bytes).map_err(|source| FailureCause::CorruptModel {
            origin: origin.to_string(),
            source,
        })
    }
}
