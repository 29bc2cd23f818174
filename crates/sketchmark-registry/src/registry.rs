//! Engine registry.
//!
//! One registry per process. Engines are built lazily on first reference by
//! replaying the assignment's persisted submissions and manual results,
//! then kept in memory behind a per-engine mutex until an idle sweep evicts
//! them. Losing an engine never loses data; the next reference rebuilds it
//! from the store.
//!
//! Lock discipline: the engine mutex is always taken first, the provisional
//! and locked-submission maps after it, and no guard is ever held across an
//! await point.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Context as _;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use sketchmark_core::assessment::Feedback;
use sketchmark_core::engine::{CalculationEngine, ClassDiagramEngine, EngineConfig};
use sketchmark_core::model::SubmissionId;

use crate::error::RegistryError;
use crate::result::{AssessmentType, ProvisionalResult};
use crate::rounding::round_credits;
use crate::store::{AssignmentId, SubmissionStore};

/// Registry-wide tunables.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub engine: EngineConfig,
    /// Engines untouched for this long are eligible for eviction.
    pub engine_idle_ttl: chrono::Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            engine_idle_ttl: chrono::Duration::days(1),
        }
    }
}

type SharedEngine = Arc<Mutex<dyn CalculationEngine>>;

/// Process-wide map of assignment id to calculation engine, plus the cache
/// of provisional automatic results awaiting a grader.
pub struct EngineRegistry {
    store: Arc<dyn SubmissionStore>,
    config: RegistryConfig,
    engines: RwLock<HashMap<AssignmentId, SharedEngine>>,
    provisional: RwLock<HashMap<SubmissionId, ProvisionalResult>>,
    locked_submissions: RwLock<HashSet<SubmissionId>>,
}

impl EngineRegistry {
    pub fn new(store: Arc<dyn SubmissionStore>, config: RegistryConfig) -> Self {
        Self {
            store,
            config,
            engines: RwLock::new(HashMap::new()),
            provisional: RwLock::new(HashMap::new()),
            locked_submissions: RwLock::new(HashSet::new()),
        }
    }

    /// Eagerly build the engine for an assignment, e.g. when grading opens.
    pub async fn build(&self, assignment_id: AssignmentId) -> Result<(), RegistryError> {
        self.engine_for(assignment_id).await.map(|_| ())
    }

    /// Fetch the engine for an assignment, building it from the store if it
    /// is not loaded. When two callers race on the build, the first insert
    /// wins and the loser's engine is discarded.
    async fn engine_for(&self, assignment_id: AssignmentId) -> Result<SharedEngine, RegistryError> {
        if let Some(engine) = self.engines.read().get(&assignment_id) {
            return Ok(engine.clone());
        }

        let kind = self
            .store
            .diagram_kind(assignment_id)
            .await
            .with_context(|| format!("loading diagram kind of assignment {assignment_id}"))?;
        if !kind.is_supported() {
            return Err(RegistryError::Unsupported {
                assignment_id,
                kind,
            });
        }

        let submissions = self
            .store
            .submissions(assignment_id)
            .await
            .with_context(|| format!("loading submissions of assignment {assignment_id}"))?;
        tracing::info!(
            assignment_id,
            submissions = submissions.len(),
            "building assessment engine"
        );

        let mut engine = ClassDiagramEngine::new(self.config.engine.clone());
        for submission in &submissions {
            engine.notify_new_model(&submission.document, submission.submission_id);
        }
        for submission in &submissions {
            let Some(stored) = &submission.manual_feedback else {
                continue;
            };
            let feedback: Vec<Feedback> = stored
                .iter()
                .map(|entry| Feedback {
                    element_id: entry.element_id.clone(),
                    points: entry.points,
                    comment: entry.comment.clone(),
                    source_submission: submission.submission_id,
                })
                .collect();
            if let Err(error) = engine.fold_assessment(submission.submission_id, &feedback) {
                tracing::error!(
                    assignment_id,
                    submission_id = submission.submission_id,
                    %error,
                    "skipping stored assessment during replay"
                );
            }
        }
        engine.assess_all();

        let engine: SharedEngine = {
            let shared: SharedEngine = Arc::new(Mutex::new(engine));
            let mut engines = self.engines.write();
            engines.entry(assignment_id).or_insert(shared).clone()
        };

        {
            let mut guard = engine.lock();
            self.refresh_all_provisional(&mut *guard);
        }
        Ok(engine)
    }

    /// Fold a completed manual assessment into the engine and refresh every
    /// provisional result the new knowledge may have changed.
    pub async fn add_assessment(
        &self,
        assignment_id: AssignmentId,
        submission_id: SubmissionId,
        feedback: &[Feedback],
    ) -> Result<(), RegistryError> {
        let engine = self.engine_for(assignment_id).await?;
        let mut guard = engine.lock();
        guard.notify_new_assessment(submission_id, feedback)?;

        // the manually assessed submission no longer needs a suggestion
        self.provisional.write().remove(&submission_id);
        self.locked_submissions.write().remove(&submission_id);

        self.refresh_all_provisional(&mut *guard);
        Ok(())
    }

    /// The current automatic suggestion for a submission, if one exists.
    pub fn provisional_result(&self, submission_id: SubmissionId) -> Option<ProvisionalResult> {
        self.provisional.read().get(&submission_id).cloned()
    }

    /// Ask the engine which submission a grader should take next.
    pub async fn next_optimal_submission(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Option<SubmissionId>, RegistryError> {
        let engine = self.engine_for(assignment_id).await?;
        let picked = engine.lock().next_optimal_model();
        Ok(picked)
    }

    /// Prior feedback disagreeing with `incoming`, per element id.
    pub async fn conflicting_feedback(
        &self,
        assignment_id: AssignmentId,
        submission_id: SubmissionId,
        incoming: &[Feedback],
    ) -> Result<HashMap<String, Vec<Feedback>>, RegistryError> {
        let engine = self.engine_for(assignment_id).await?;
        let conflicts = engine.lock().conflicting_feedback(submission_id, incoming)?;
        Ok(conflicts)
    }

    /// A grader takes over a submission: freeze its suggestion, take it off
    /// the waiting queue and hand the frozen suggestion back as a starting
    /// point.
    pub async fn lock_submission(
        &self,
        assignment_id: AssignmentId,
        submission_id: SubmissionId,
    ) -> Result<Option<ProvisionalResult>, RegistryError> {
        let engine = self.engine_for(assignment_id).await?;
        engine.lock().remove_waiting(submission_id, false);
        self.locked_submissions.write().insert(submission_id);
        Ok(self.provisional.read().get(&submission_id).cloned())
    }

    /// A grader gives a submission back without finishing it.
    pub async fn release_submission(
        &self,
        assignment_id: AssignmentId,
        submission_id: SubmissionId,
        was_assessed: bool,
    ) -> Result<(), RegistryError> {
        let engine = self.engine_for(assignment_id).await?;
        let mut guard = engine.lock();
        guard.remove_waiting(submission_id, was_assessed);
        self.locked_submissions.write().remove(&submission_id);
        if !was_assessed {
            self.refresh_provisional(&mut *guard, submission_id);
        }
        Ok(())
    }

    /// Undo a manual assessment: the submission becomes automatic material
    /// again. Feedback already folded into the engine stays.
    pub async fn cancel_assessment(
        &self,
        assignment_id: AssignmentId,
        submission_id: SubmissionId,
    ) -> Result<(), RegistryError> {
        let engine = self.engine_for(assignment_id).await?;
        let mut guard = engine.lock();
        guard.mark_unassessed(submission_id);
        self.locked_submissions.write().remove(&submission_id);
        self.refresh_provisional(&mut *guard, submission_id);
        Ok(())
    }

    /// Evict every engine idle longer than the configured ttl. Returns the
    /// number of engines dropped. Busy engines are skipped.
    pub fn evict_idle(&self) -> usize {
        let cutoff = Utc::now() - self.config.engine_idle_ttl;
        let mut evicted_submissions = Vec::new();
        let mut evicted = 0;

        {
            let mut engines = self.engines.write();
            engines.retain(|assignment_id, engine| {
                // a locked engine is in use, which counts as recent
                let Some(mut guard) = engine.try_lock() else {
                    return true;
                };
                if guard.last_used_at() >= cutoff {
                    return true;
                }
                tracing::info!(assignment_id, "evicting idle engine");
                evicted_submissions.extend(guard.submission_ids());
                evicted += 1;
                false
            });
        }

        if !evicted_submissions.is_empty() {
            let mut provisional = self.provisional.write();
            for submission_id in evicted_submissions {
                provisional.remove(&submission_id);
            }
        }
        evicted
    }

    /// Run [`evict_idle`](Self::evict_idle) on a fixed interval.
    pub fn spawn_eviction_sweep(self: Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle();
                if evicted > 0 {
                    tracing::debug!(evicted, "eviction sweep finished");
                }
            }
        })
    }

    pub fn loaded_engines(&self) -> usize {
        self.engines.read().len()
    }

    fn refresh_all_provisional(&self, engine: &mut dyn CalculationEngine) {
        for submission_id in engine.submission_ids() {
            self.refresh_provisional(engine, submission_id);
        }
    }

    /// Recompute the provisional result of one submission from the engine's
    /// cached grade. Manually assessed and grader-locked submissions are
    /// never overwritten.
    fn refresh_provisional(&self, engine: &mut dyn CalculationEngine, submission_id: SubmissionId) {
        if engine.is_manually_assessed(submission_id)
            || self.locked_submissions.read().contains(&submission_id)
        {
            return;
        }

        let grade = engine.grade_for(submission_id);
        let feedback = engine.automatic_feedback(submission_id);
        let (Some(grade), Some(feedback)) = (grade, feedback) else {
            self.provisional.write().remove(&submission_id);
            return;
        };
        if feedback.is_empty() {
            self.provisional.write().remove(&submission_id);
            return;
        }

        let feedback: Vec<Feedback> = feedback
            .into_iter()
            .map(|entry| Feedback {
                points: round_credits(entry.points),
                ..entry
            })
            .collect();
        let total_points = feedback.iter().map(|entry| entry.points).sum();

        self.provisional.write().insert(
            submission_id,
            ProvisionalResult {
                id: Uuid::new_v4(),
                submission_id,
                total_points,
                coverage: grade.coverage,
                confidence: grade.confidence,
                assessment_type: AssessmentType::Automatic,
                feedback,
                computed_at: Utc::now(),
            },
        );
    }
}
