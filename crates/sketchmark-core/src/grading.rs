//! Grade derivation.
//!
//! A grade projects the collective assessments onto one model: each element
//! whose similarity class has confident feedback receives that feedback's
//! points and comment; coverage and mean confidence summarize how much of
//! the model was reachable that way.

use std::collections::HashMap;

use serde::Serialize;

use crate::assessment::{AssessmentIndex, Feedback};
use crate::engine::EngineConfig;
use crate::error::EngineError;
use crate::index::ModelIndex;
use crate::model::{Model, SubmissionId};

/// Automatic grade computed for one model.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Grade {
    /// Fraction of the model's elements with a confident suggestion.
    pub coverage: f64,
    /// Mean confidence over the covered elements.
    pub confidence: f64,
    pub total_points: f64,
    /// Suggested points per local element id.
    pub points: HashMap<String, f64>,
    /// Carried-over comments per local element id, non-empty only.
    pub comments: HashMap<String, String>,
}

/// Compute a grade for `model` from the current assessments.
///
/// Elements without a similarity class, without feedback, or whose score
/// falls below the confidence threshold stay uncovered.
pub fn compute_grade(model: &Model, assessments: &AssessmentIndex, config: &EngineConfig) -> Grade {
    let mut grade = Grade::default();
    let mut confidence_sum = 0.0;

    for element in model.elements() {
        let Some(class) = element.similarity_class else {
            continue;
        };
        let Some(score) =
            assessments.score_for(class, element.context, config.score_equality_tolerance)
        else {
            continue;
        };
        if score.confidence < config.confidence_threshold {
            continue;
        }

        grade.total_points += score.points;
        confidence_sum += score.confidence;
        grade.points.insert(element.local_id.clone(), score.points);
        if !score.comment.is_empty() {
            grade.comments.insert(element.local_id.clone(), score.comment);
        }
    }

    let covered = grade.points.len();
    if !model.is_empty() {
        grade.coverage = covered as f64 / model.len() as f64;
    }
    if covered > 0 {
        grade.confidence = confidence_sum / covered as f64;
    }
    grade
}

/// Recompute and store the grade of every model in the index.
pub fn assess_all(index: &mut ModelIndex, assessments: &AssessmentIndex, config: &EngineConfig) {
    // split borrow: scores are read-only, grades are written per model
    let mut grades: Vec<(SubmissionId, Grade)> = Vec::with_capacity(index.len());
    for model in index.models() {
        grades.push((model.submission_id, compute_grade(model, assessments, config)));
    }
    for (submission_id, grade) in grades {
        if let Some(model) = index.get_mut(submission_id) {
            model.last_grade = Some(grade);
        }
    }
}

/// Fold one batch of human feedback into the assessments.
///
/// The whole batch is validated against `model` before any entry is
/// recorded, so a stale element reference leaves the assessments untouched.
pub fn add_feedback(
    assessments: &mut AssessmentIndex,
    feedback: &[Feedback],
    model: &Model,
) -> Result<(), EngineError> {
    for entry in feedback {
        if model.element(&entry.element_id).is_none() {
            return Err(EngineError::StaleElementReference {
                submission_id: model.submission_id,
                element_id: entry.element_id.clone(),
            });
        }
    }

    for entry in feedback {
        let element = model
            .element(&entry.element_id)
            .ok_or_else(|| EngineError::StaleElementReference {
                submission_id: model.submission_id,
                element_id: entry.element_id.clone(),
            })?;
        let Some(class) = element.similarity_class else {
            tracing::warn!(
                submission_id = model.submission_id,
                element_id = %entry.element_id,
                "feedback targets unclustered element, dropping entry"
            );
            continue;
        };
        assessments.record(class, element.context, entry.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_submission;

    fn two_class_model(id: SubmissionId) -> Model {
        let document = r#"{
            "type": "ClassDiagram",
            "elements": [
                { "id": "c1", "type": "Class", "name": "Animal" },
                { "id": "c2", "type": "Class", "name": "Plant" }
            ],
            "relationships": []
        }"#;
        parse_submission(document, id).unwrap()
    }

    fn setup() -> (ModelIndex, AssessmentIndex, EngineConfig) {
        let config = EngineConfig::default();
        let mut index = ModelIndex::default();
        index.insert(two_class_model(1), config.similarity_threshold);
        index.insert(two_class_model(2), config.similarity_threshold);
        (index, AssessmentIndex::default(), config)
    }

    fn feedback(element_id: &str, points: f64, source: SubmissionId) -> Feedback {
        Feedback {
            element_id: element_id.to_owned(),
            points,
            comment: String::new(),
            source_submission: source,
        }
    }

    #[test]
    fn grades_propagate_between_matching_models() {
        let (mut index, mut assessments, config) = setup();

        add_feedback(
            &mut assessments,
            &[feedback("c1", 2.0, 1), feedback("c2", 1.0, 1)],
            index.get(1).unwrap(),
        )
        .unwrap();
        assess_all(&mut index, &assessments, &config);

        let grade = index.get(2).unwrap().last_grade.as_ref().unwrap();
        assert_eq!(grade.coverage, 1.0);
        assert_eq!(grade.confidence, 1.0);
        assert_eq!(grade.total_points, 3.0);
        assert_eq!(grade.points["c1"], 2.0);
        assert_eq!(grade.points["c2"], 1.0);
    }

    #[test]
    fn low_confidence_scores_are_excluded() {
        let (mut index, mut assessments, config) = setup();

        // two assessors disagree, 0.5 confidence falls below the threshold
        add_feedback(&mut assessments, &[feedback("c1", 2.0, 1)], index.get(1).unwrap()).unwrap();
        add_feedback(&mut assessments, &[feedback("c1", 4.0, 2)], index.get(2).unwrap()).unwrap();
        assess_all(&mut index, &assessments, &config);

        let grade = index.get(1).unwrap().last_grade.as_ref().unwrap();
        assert_eq!(grade.coverage, 0.0);
        assert_eq!(grade.total_points, 0.0);
        assert!(grade.points.is_empty());
    }

    #[test]
    fn empty_model_grades_to_zero_coverage() {
        let config = EngineConfig::default();
        let document = r#"{ "type": "ClassDiagram", "elements": [], "relationships": [] }"#;
        let model = parse_submission(document, 1).unwrap();
        let grade = compute_grade(&model, &AssessmentIndex::default(), &config);
        assert_eq!(grade.coverage, 0.0);
        assert_eq!(grade.confidence, 0.0);
    }

    #[test]
    fn stale_reference_rejects_the_whole_batch() {
        let (mut index, mut assessments, config) = setup();

        let error = add_feedback(
            &mut assessments,
            &[feedback("c1", 2.0, 1), feedback("ghost", 1.0, 1)],
            index.get(1).unwrap(),
        )
        .unwrap_err();
        assert!(matches!(error, EngineError::StaleElementReference { .. }));

        // nothing from the batch was recorded
        assert!(assessments.is_empty());
        assess_all(&mut index, &assessments, &config);
        assert_eq!(
            index.get(1).unwrap().last_grade.as_ref().unwrap().coverage,
            0.0
        );
    }
}
