use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use sketchmark_core::assessment::Feedback;
use sketchmark_core::model::{DiagramKind, SubmissionId};
use sketchmark_registry::{
    AssessmentType, AssignmentId, EngineRegistry, RegistryConfig, RegistryError, StoredFeedback,
    StoredSubmission, SubmissionStore,
};

struct InMemoryStore {
    assignments: HashMap<AssignmentId, (DiagramKind, Vec<StoredSubmission>)>,
    loads: AtomicUsize,
}

impl InMemoryStore {
    fn new(assignments: HashMap<AssignmentId, (DiagramKind, Vec<StoredSubmission>)>) -> Self {
        Self {
            assignments,
            loads: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SubmissionStore for InMemoryStore {
    async fn diagram_kind(&self, assignment_id: AssignmentId) -> anyhow::Result<DiagramKind> {
        self.assignments
            .get(&assignment_id)
            .map(|(kind, _)| *kind)
            .ok_or_else(|| anyhow::anyhow!("unknown assignment {assignment_id}"))
    }

    async fn submissions(
        &self,
        assignment_id: AssignmentId,
    ) -> anyhow::Result<Vec<StoredSubmission>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.assignments
            .get(&assignment_id)
            .map(|(_, submissions)| submissions.clone())
            .ok_or_else(|| anyhow::anyhow!("unknown assignment {assignment_id}"))
    }
}

fn animal_document() -> String {
    serde_json::json!({
        "type": "ClassDiagram",
        "elements": [
            { "id": "c1", "type": "Class", "name": "Animal",
              "attributes": [], "methods": [] }
        ],
        "relationships": []
    })
    .to_string()
}

fn submission(id: SubmissionId, graded: Option<f64>) -> StoredSubmission {
    StoredSubmission {
        submission_id: id,
        document: animal_document(),
        manual_feedback: graded.map(|points| {
            vec![StoredFeedback {
                element_id: "c1".to_owned(),
                points,
                comment: "well drawn".to_owned(),
            }]
        }),
    }
}

fn registry_with(
    assignments: HashMap<AssignmentId, (DiagramKind, Vec<StoredSubmission>)>,
    config: RegistryConfig,
) -> Arc<EngineRegistry> {
    Arc::new(EngineRegistry::new(
        Arc::new(InMemoryStore::new(assignments)),
        config,
    ))
}

fn class_assignment(submissions: Vec<StoredSubmission>) -> (DiagramKind, Vec<StoredSubmission>) {
    (DiagramKind::ClassDiagram, submissions)
}

#[tokio::test]
async fn lazy_build_replays_stored_assessments() {
    let registry = registry_with(
        HashMap::from([(
            7,
            class_assignment(vec![
                submission(1, Some(1.6)),
                submission(2, None),
                submission(3, None),
            ]),
        )]),
        RegistryConfig::default(),
    );

    registry.build(7).await.unwrap();
    assert_eq!(registry.loaded_engines(), 1);

    // submission 1 is manually graded and must not carry a suggestion
    assert!(registry.provisional_result(1).is_none());

    for id in [2, 3] {
        let result = registry.provisional_result(id).unwrap();
        assert_eq!(result.assessment_type, AssessmentType::Automatic);
        assert_eq!(result.feedback.len(), 1);
        // 1.6 raw credits round up to 2.0 on the grading scale
        assert_eq!(result.feedback[0].points, 2.0);
        assert_eq!(result.total_points, 2.0);
        assert!(result.coverage > 0.0);
    }
}

#[tokio::test]
async fn racing_builds_leave_one_engine() {
    let registry = registry_with(
        HashMap::from([(7, class_assignment(vec![submission(1, None)]))]),
        RegistryConfig::default(),
    );

    let (a, b) = tokio::join!(registry.build(7), registry.build(7));
    a.unwrap();
    b.unwrap();
    assert_eq!(registry.loaded_engines(), 1);
}

#[tokio::test]
async fn unsupported_diagram_types_are_rejected() {
    let registry = registry_with(
        HashMap::from([(7, (DiagramKind::PetriNet, vec![]))]),
        RegistryConfig::default(),
    );

    let error = registry.build(7).await.unwrap_err();
    assert!(matches!(
        error,
        RegistryError::Unsupported {
            assignment_id: 7,
            kind: DiagramKind::PetriNet,
        }
    ));
    assert_eq!(registry.loaded_engines(), 0);
}

#[tokio::test]
async fn add_assessment_refreshes_suggestions() {
    let registry = registry_with(
        HashMap::from([(
            7,
            class_assignment(vec![submission(1, None), submission(2, None)]),
        )]),
        RegistryConfig::default(),
    );

    registry.build(7).await.unwrap();
    assert!(registry.provisional_result(2).is_none());

    registry
        .add_assessment(
            7,
            1,
            &[Feedback {
                element_id: "c1".to_owned(),
                points: 1.3,
                comment: String::new(),
                source_submission: 1,
            }],
        )
        .await
        .unwrap();

    assert!(registry.provisional_result(1).is_none());
    let result = registry.provisional_result(2).unwrap();
    // 1.3 rounds to the half point
    assert_eq!(result.total_points, 1.5);
}

#[tokio::test]
async fn locked_submissions_are_never_overwritten() {
    let registry = registry_with(
        HashMap::from([(
            7,
            class_assignment(vec![
                submission(1, Some(2.0)),
                submission(2, None),
                submission(3, None),
            ]),
        )]),
        RegistryConfig::default(),
    );

    registry.build(7).await.unwrap();
    let frozen = registry.lock_submission(7, 2).await.unwrap().unwrap();

    // new knowledge arrives while submission 2 is being graded
    registry
        .add_assessment(
            7,
            3,
            &[Feedback {
                element_id: "c1".to_owned(),
                points: 4.0,
                comment: String::new(),
                source_submission: 3,
            }],
        )
        .await
        .unwrap();

    let still_frozen = registry.provisional_result(2).unwrap();
    assert_eq!(still_frozen.id, frozen.id);
    assert_eq!(still_frozen.total_points, frozen.total_points);

    // releasing without an assessment recomputes: the disagreement dropped
    // confidence below the threshold, so the suggestion is withdrawn
    registry.release_submission(7, 2, false).await.unwrap();
    assert!(registry.provisional_result(2).is_none());
}

#[tokio::test]
async fn cancelled_assessments_restore_suggestions() {
    let registry = registry_with(
        HashMap::from([(
            7,
            class_assignment(vec![submission(1, Some(2.0)), submission(2, None)]),
        )]),
        RegistryConfig::default(),
    );

    registry.build(7).await.unwrap();
    assert!(registry.provisional_result(1).is_none());

    registry.cancel_assessment(7, 1).await.unwrap();
    // the already-folded feedback keeps grading submission 1 automatically
    let result = registry.provisional_result(1).unwrap();
    assert_eq!(result.total_points, 2.0);
}

#[tokio::test]
async fn conflicts_surface_across_submissions() {
    let registry = registry_with(
        HashMap::from([(
            7,
            class_assignment(vec![submission(1, Some(1.0)), submission(2, None)]),
        )]),
        RegistryConfig::default(),
    );

    registry.build(7).await.unwrap();
    let conflicts = registry
        .conflicting_feedback(
            7,
            2,
            &[Feedback {
                element_id: "c1".to_owned(),
                points: 3.0,
                comment: String::new(),
                source_submission: 2,
            }],
        )
        .await
        .unwrap();

    assert_eq!(conflicts["c1"].len(), 1);
    assert_eq!(conflicts["c1"][0].points, 1.0);
}

#[tokio::test]
async fn idle_engines_are_evicted_and_rebuilt() {
    let config = RegistryConfig {
        engine_idle_ttl: chrono::Duration::zero(),
        ..RegistryConfig::default()
    };
    let registry = registry_with(
        HashMap::from([(
            7,
            class_assignment(vec![submission(1, Some(2.0)), submission(2, None)]),
        )]),
        config,
    );

    registry.build(7).await.unwrap();
    assert!(registry.provisional_result(2).is_some());

    std::thread::sleep(std::time::Duration::from_millis(5));
    assert_eq!(registry.evict_idle(), 1);
    assert_eq!(registry.loaded_engines(), 0);
    assert!(registry.provisional_result(2).is_none());

    // next reference rebuilds the engine and its suggestions from the store
    let picked = registry.next_optimal_submission(7).await.unwrap();
    assert_eq!(picked, Some(2));
    assert_eq!(registry.loaded_engines(), 1);
    assert!(registry.provisional_result(2).is_some());
}
