//! Model index.
//!
//! Owns every model registered with one engine together with the similarity
//! registry that clusters their elements. The map is ordered by submission id
//! so that all whole-corpus scans are deterministic.

use std::collections::BTreeMap;

use crate::model::{Model, SubmissionId};
use crate::similarity::{assign_similarity, SimilarityRegistry};

#[derive(Debug, Default)]
pub struct ModelIndex {
    models: BTreeMap<SubmissionId, Model>,
    registry: SimilarityRegistry,
}

impl ModelIndex {
    pub fn contains(&self, submission_id: SubmissionId) -> bool {
        self.models.contains_key(&submission_id)
    }

    pub fn get(&self, submission_id: SubmissionId) -> Option<&Model> {
        self.models.get(&submission_id)
    }

    pub fn get_mut(&mut self, submission_id: SubmissionId) -> Option<&mut Model> {
        self.models.get_mut(&submission_id)
    }

    /// Register a model, clustering its elements into similarity classes.
    /// Replaces any previous model for the same submission.
    pub fn insert(&mut self, mut model: Model, threshold: f64) {
        assign_similarity(&mut model, &mut self.registry, threshold);
        self.models.insert(model.submission_id, model);
    }

    /// All models in ascending submission-id order.
    pub fn models(&self) -> impl Iterator<Item = &Model> {
        self.models.values()
    }

    pub fn models_mut(&mut self) -> impl Iterator<Item = &mut Model> {
        self.models.values_mut()
    }

    pub fn submission_ids(&self) -> Vec<SubmissionId> {
        self.models.keys().copied().collect()
    }

    /// Number of distinct similarity classes seen across all models.
    pub fn unique_element_count(&self) -> usize {
        self.registry.len()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
