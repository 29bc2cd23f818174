//! Per-assignment calculation engine.
//!
//! One engine instance holds everything needed to assess the submissions of
//! a single assignment: the model index, the accumulated assessments and
//! the selector. The [`CalculationEngine`] trait is the seam the
//! orchestration layer programs against, so tests can substitute a scripted
//! double.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::assessment::{AssessmentIndex, Feedback};
use crate::error::EngineError;
use crate::grading::{self, Grade};
use crate::index::ModelIndex;
use crate::model::SubmissionId;
use crate::parser::parse_submission;
use crate::selector::ModelSelector;

/// Tunables of one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Minimum similarity for two elements to share an equivalence class.
    pub similarity_threshold: f64,
    /// Minimum assessment confidence for a score to enter a grade.
    pub confidence_threshold: f64,
    /// Two point values within this distance count as the same verdict.
    pub score_equality_tolerance: f64,
    /// Selection stops once this many submissions wait for a grader.
    pub waiting_queue_target: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.8,
            confidence_threshold: 0.75,
            score_equality_tolerance: 1e-4,
            waiting_queue_target: 10,
        }
    }
}

/// Operations the orchestration layer needs from an engine.
pub trait CalculationEngine: Send {
    /// Register a submission document. Parse failures are logged and leave
    /// the engine unchanged; re-registering an already known submission is
    /// a no-op.
    fn notify_new_model(&mut self, document: &str, submission_id: SubmissionId);

    /// Fold a manual assessment in and rescore every model.
    fn notify_new_assessment(
        &mut self,
        submission_id: SubmissionId,
        feedback: &[Feedback],
    ) -> Result<(), EngineError>;

    /// Fold a manual assessment in without rescoring. Used during replay,
    /// where one rescore at the end suffices.
    fn fold_assessment(
        &mut self,
        submission_id: SubmissionId,
        feedback: &[Feedback],
    ) -> Result<(), EngineError>;

    /// Recompute the grade of every registered model.
    fn assess_all(&mut self);

    /// Pick the submission a human should assess next, if any.
    fn next_optimal_model(&mut self) -> Option<SubmissionId>;

    /// The most recently computed grade for a submission.
    fn grade_for(&mut self, submission_id: SubmissionId) -> Option<Grade>;

    /// The current grade rendered as per-element feedback, sorted by
    /// element id. `None` when the submission is unknown.
    fn automatic_feedback(&mut self, submission_id: SubmissionId) -> Option<Vec<Feedback>>;

    /// Per-element lists of prior feedback that disagrees with `incoming`
    /// beyond the score tolerance. Elements without disagreement are absent.
    fn conflicting_feedback(
        &mut self,
        submission_id: SubmissionId,
        incoming: &[Feedback],
    ) -> Result<HashMap<String, Vec<Feedback>>, EngineError>;

    /// Forget that a submission was manually assessed, e.g. when its
    /// assessment is cancelled. Collected feedback stays.
    fn mark_unassessed(&mut self, submission_id: SubmissionId);

    /// Take a submission off the waiting queue.
    fn remove_waiting(&mut self, submission_id: SubmissionId, assessed: bool);

    fn is_manually_assessed(&mut self, submission_id: SubmissionId) -> bool;

    /// Ids of all registered submissions, ascending.
    fn submission_ids(&mut self) -> Vec<SubmissionId>;

    /// Instant of the last call into this engine, for idle eviction.
    fn last_used_at(&self) -> DateTime<Utc>;
}

/// The engine for UML class diagrams.
pub struct ClassDiagramEngine {
    config: EngineConfig,
    models: ModelIndex,
    assessments: AssessmentIndex,
    selector: ModelSelector,
    last_used_at: DateTime<Utc>,
}

impl ClassDiagramEngine {
    pub fn new(config: EngineConfig) -> Self {
        let selector = ModelSelector::new(config.waiting_queue_target);
        Self {
            config,
            models: ModelIndex::default(),
            assessments: AssessmentIndex::default(),
            selector,
            last_used_at: Utc::now(),
        }
    }

    fn touch(&mut self) {
        self.last_used_at = Utc::now();
    }
}

impl CalculationEngine for ClassDiagramEngine {
    fn notify_new_model(&mut self, document: &str, submission_id: SubmissionId) {
        self.touch();
        if self.models.contains(submission_id) {
            tracing::debug!(submission_id, "submission already registered");
            return;
        }
        let model = match parse_submission(document, submission_id) {
            Ok(model) => model,
            Err(error) => {
                tracing::warn!(submission_id, %error, "dropping unparsable submission");
                return;
            }
        };
        self.models.insert(model, self.config.similarity_threshold);
        if let Some(model) = self.models.get_mut(submission_id) {
            let grade = grading::compute_grade(model, &self.assessments, &self.config);
            model.last_grade = Some(grade);
        }
        tracing::debug!(
            submission_id,
            models = self.models.len(),
            classes = self.models.unique_element_count(),
            "registered submission"
        );
    }

    fn notify_new_assessment(
        &mut self,
        submission_id: SubmissionId,
        feedback: &[Feedback],
    ) -> Result<(), EngineError> {
        self.fold_assessment(submission_id, feedback)?;
        self.assess_all();
        Ok(())
    }

    fn fold_assessment(
        &mut self,
        submission_id: SubmissionId,
        feedback: &[Feedback],
    ) -> Result<(), EngineError> {
        self.touch();
        let model = self
            .models
            .get(submission_id)
            .ok_or(EngineError::UnknownSubmission(submission_id))?;
        grading::add_feedback(&mut self.assessments, feedback, model)?;
        self.selector.add_assessed(submission_id);
        Ok(())
    }

    fn assess_all(&mut self) {
        self.touch();
        grading::assess_all(&mut self.models, &self.assessments, &self.config);
    }

    fn next_optimal_model(&mut self) -> Option<SubmissionId> {
        self.touch();
        self.selector.select_next(&self.models, &self.assessments)
    }

    fn grade_for(&mut self, submission_id: SubmissionId) -> Option<Grade> {
        self.touch();
        self.models.get(submission_id)?.last_grade.clone()
    }

    fn automatic_feedback(&mut self, submission_id: SubmissionId) -> Option<Vec<Feedback>> {
        self.touch();
        let model = self.models.get(submission_id)?;
        let grade = model.last_grade.as_ref()?;
        let mut feedback: Vec<Feedback> = grade
            .points
            .iter()
            .map(|(element_id, points)| Feedback {
                element_id: element_id.clone(),
                points: *points,
                comment: grade.comments.get(element_id).cloned().unwrap_or_default(),
                source_submission: submission_id,
            })
            .collect();
        feedback.sort_by(|a, b| a.element_id.cmp(&b.element_id));
        Some(feedback)
    }

    fn conflicting_feedback(
        &mut self,
        submission_id: SubmissionId,
        incoming: &[Feedback],
    ) -> Result<HashMap<String, Vec<Feedback>>, EngineError> {
        self.touch();
        let model = self
            .models
            .get(submission_id)
            .ok_or(EngineError::UnknownSubmission(submission_id))?;

        let mut conflicts = HashMap::new();
        for entry in incoming {
            let element = model.element(&entry.element_id).ok_or_else(|| {
                EngineError::StaleElementReference {
                    submission_id,
                    element_id: entry.element_id.clone(),
                }
            })?;
            let Some(class) = element.similarity_class else {
                continue;
            };
            let Some(assessment) = self.assessments.assessment(class) else {
                continue;
            };
            let disagreeing: Vec<Feedback> = assessment
                .feedback_for(element.context)
                .iter()
                .filter(|prior| {
                    (prior.points - entry.points).abs() >= self.config.score_equality_tolerance
                })
                .cloned()
                .collect();
            if !disagreeing.is_empty() {
                conflicts.insert(entry.element_id.clone(), disagreeing);
            }
        }
        Ok(conflicts)
    }

    fn mark_unassessed(&mut self, submission_id: SubmissionId) {
        self.touch();
        self.selector.remove_assessed(submission_id);
    }

    fn remove_waiting(&mut self, submission_id: SubmissionId, assessed: bool) {
        self.touch();
        self.selector.remove_waiting(submission_id, assessed);
    }

    fn is_manually_assessed(&mut self, submission_id: SubmissionId) -> bool {
        self.touch();
        self.selector.is_assessed(submission_id)
    }

    fn submission_ids(&mut self) -> Vec<SubmissionId> {
        self.touch();
        self.models.submission_ids()
    }

    fn last_used_at(&self) -> DateTime<Utc> {
        self.last_used_at
    }
}
