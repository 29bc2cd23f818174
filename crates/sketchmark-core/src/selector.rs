//! Next-submission selection.
//!
//! Picks the submission whose manual assessment would teach the engine the
//! most: candidates are scored by how many other unassessed submissions
//! share their not-yet-assessed similarity classes. Selected submissions
//! move to a waiting queue until a grader picks them up or releases them;
//! once the queue is full no further selection happens.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::assessment::AssessmentIndex;
use crate::index::ModelIndex;
use crate::model::{Context, SimilarityClass, SubmissionId};

#[derive(Debug)]
pub struct ModelSelector {
    waiting: VecDeque<SubmissionId>,
    assessed: BTreeSet<SubmissionId>,
    queue_target: usize,
}

impl ModelSelector {
    pub fn new(queue_target: usize) -> Self {
        Self {
            waiting: VecDeque::new(),
            assessed: BTreeSet::new(),
            queue_target,
        }
    }

    /// Pick the most informative unassessed submission and move it to the
    /// waiting queue. Returns `None` when the queue is already full or no
    /// candidate remains.
    pub fn select_next(
        &mut self,
        index: &ModelIndex,
        assessments: &AssessmentIndex,
    ) -> Option<SubmissionId> {
        if self.waiting.len() >= self.queue_target {
            return None;
        }

        let candidates: Vec<SubmissionId> = index
            .submission_ids()
            .into_iter()
            .filter(|id| !self.assessed.contains(id) && !self.waiting.contains(id))
            .collect();
        if candidates.is_empty() {
            return None;
        }

        // how many candidates carry each not-yet-assessed similarity class
        let mut spread: HashMap<SimilarityClass, usize> = HashMap::new();
        for id in &candidates {
            let Some(model) = index.get(*id) else { continue };
            let mut seen = HashSet::new();
            for element in model.elements() {
                let Some(class) = element.similarity_class else { continue };
                if self.is_assessed_class(assessments, class, element.context) {
                    continue;
                }
                if seen.insert(class) {
                    *spread.entry(class).or_insert(0) += 1;
                }
            }
        }

        let mut best: Option<(usize, SubmissionId)> = None;
        for id in &candidates {
            let Some(model) = index.get(*id) else { continue };
            let mut seen = HashSet::new();
            let mut gain = 0;
            for element in model.elements() {
                let Some(class) = element.similarity_class else { continue };
                if seen.insert(class) {
                    gain += spread.get(&class).copied().unwrap_or(0);
                }
            }
            // strict comparison keeps the lowest submission id on ties
            if best.is_none_or(|(best_gain, _)| gain > best_gain) {
                best = Some((gain, *id));
            }
        }

        let (_, winner) = best?;
        self.waiting.push_back(winner);
        Some(winner)
    }

    fn is_assessed_class(
        &self,
        assessments: &AssessmentIndex,
        class: SimilarityClass,
        context: Context,
    ) -> bool {
        assessments
            .assessment(class)
            .map(|assessment| !assessment.feedback_for(context).is_empty())
            .unwrap_or(false)
    }

    /// Drop a submission from the waiting queue, optionally marking it as
    /// assessed on the way out.
    pub fn remove_waiting(&mut self, submission_id: SubmissionId, assessed: bool) {
        self.waiting.retain(|id| *id != submission_id);
        if assessed {
            self.assessed.insert(submission_id);
        }
    }

    /// Record a manual assessment. Waiting and assessed are exclusive.
    pub fn add_assessed(&mut self, submission_id: SubmissionId) {
        self.waiting.retain(|id| *id != submission_id);
        self.assessed.insert(submission_id);
    }

    pub fn remove_assessed(&mut self, submission_id: SubmissionId) {
        self.assessed.remove(&submission_id);
    }

    pub fn is_assessed(&self, submission_id: SubmissionId) -> bool {
        self.assessed.contains(&submission_id)
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }
}
