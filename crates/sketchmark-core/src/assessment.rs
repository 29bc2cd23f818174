//! Feedback aggregation per similarity class.
//!
//! Human feedback is keyed twice: by the similarity class of the element it
//! was attached to, and within that by the element's [`Context`], so grades
//! for `name` inside `Animal` never bleed into `name` inside `Invoice`.
//!
//! Scoring groups feedback entries whose points agree within the configured
//! tolerance; the largest group wins, its anchor value becomes the suggested
//! points and its share of all entries becomes the confidence.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Context, SimilarityClass, SubmissionId};

/// One unit of human feedback, attached to a single element of a single
/// submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Element id local to the source submission's document.
    pub element_id: String,
    pub points: f64,
    #[serde(default)]
    pub comment: String,
    pub source_submission: SubmissionId,
}

impl Feedback {
    pub fn is_positive(&self) -> bool {
        self.points >= 0.0
    }
}

/// Aggregated verdict for one similarity class in one context.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementScore {
    pub points: f64,
    /// Share of collected feedback that agrees with `points`, in `(0, 1]`.
    pub confidence: f64,
    pub comment: String,
}

/// All feedback ever collected for one similarity class, partitioned by
/// context.
#[derive(Debug, Clone, Default)]
pub struct Assessment {
    by_context: HashMap<Context, Vec<Feedback>>,
}

impl Assessment {
    pub fn add(&mut self, context: Context, feedback: Feedback) {
        self.by_context.entry(context).or_default().push(feedback);
    }

    pub fn feedback_for(&self, context: Context) -> &[Feedback] {
        self.by_context
            .get(&context)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Aggregate the feedback collected for `context` into a single score,
    /// or `None` when no feedback exists there.
    ///
    /// Entries are grouped by point value within `tolerance` of a group
    /// anchor (the first entry opening the group). The largest group wins,
    /// earliest anchor on ties; its anchor is the suggested point value and
    /// the longest comment in the group is carried along.
    pub fn score_for(&self, context: Context, tolerance: f64) -> Option<ElementScore> {
        let entries = self.feedback_for(context);
        if entries.is_empty() {
            return None;
        }

        let mut groups: Vec<(f64, Vec<&Feedback>)> = Vec::new();
        for entry in entries {
            match groups
                .iter_mut()
                .find(|(anchor, _)| (entry.points - *anchor).abs() <= tolerance)
            {
                Some((_, members)) => members.push(entry),
                None => groups.push((entry.points, vec![entry])),
            }
        }

        let mut winner = &groups[0];
        for group in &groups[1..] {
            if group.1.len() > winner.1.len() {
                winner = group;
            }
        }

        let (points, members) = winner;
        let mut comment = "";
        for member in members {
            if member.comment.len() > comment.len() {
                comment = member.comment.as_str();
            }
        }
        Some(ElementScore {
            points: *points,
            confidence: members.len() as f64 / entries.len() as f64,
            comment: comment.to_owned(),
        })
    }
}

/// Assessments for every similarity class an engine has collected feedback
/// on.
#[derive(Debug, Default)]
pub struct AssessmentIndex {
    assessments: HashMap<SimilarityClass, Assessment>,
}

impl AssessmentIndex {
    pub fn assessment(&self, class: SimilarityClass) -> Option<&Assessment> {
        self.assessments.get(&class)
    }

    pub fn record(&mut self, class: SimilarityClass, context: Context, feedback: Feedback) {
        self.assessments
            .entry(class)
            .or_default()
            .add(context, feedback);
    }

    pub fn score_for(
        &self,
        class: SimilarityClass,
        context: Context,
        tolerance: f64,
    ) -> Option<ElementScore> {
        self.assessments
            .get(&class)?
            .score_for(context, tolerance)
    }

    pub fn len(&self) -> usize {
        self.assessments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assessments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-4;

    fn entry(points: f64, comment: &str) -> Feedback {
        Feedback {
            element_id: "e".to_owned(),
            points,
            comment: comment.to_owned(),
            source_submission: 1,
        }
    }

    #[test]
    fn unanimous_feedback_is_fully_confident() {
        let mut assessment = Assessment::default();
        assessment.add(Context::None, entry(2.0, "good"));
        assessment.add(Context::None, entry(2.0, ""));

        let score = assessment.score_for(Context::None, TOLERANCE).unwrap();
        assert_eq!(score.points, 2.0);
        assert_eq!(score.confidence, 1.0);
        assert_eq!(score.comment, "good");
    }

    #[test]
    fn majority_group_wins() {
        let mut assessment = Assessment::default();
        assessment.add(Context::None, entry(1.0, ""));
        assessment.add(Context::None, entry(2.0, "missing multiplicity"));
        assessment.add(Context::None, entry(2.0, ""));

        let score = assessment.score_for(Context::None, TOLERANCE).unwrap();
        assert_eq!(score.points, 2.0);
        assert!((score.confidence - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(score.comment, "missing multiplicity");
    }

    #[test]
    fn near_equal_points_fold_into_one_group() {
        let mut assessment = Assessment::default();
        assessment.add(Context::None, entry(1.0, ""));
        assessment.add(Context::None, entry(1.0 + 1e-5, ""));

        let score = assessment.score_for(Context::None, TOLERANCE).unwrap();
        assert_eq!(score.points, 1.0);
        assert_eq!(score.confidence, 1.0);
    }

    #[test]
    fn tied_groups_fall_to_the_earliest() {
        let mut assessment = Assessment::default();
        assessment.add(Context::None, entry(3.0, ""));
        assessment.add(Context::None, entry(1.0, ""));

        let score = assessment.score_for(Context::None, TOLERANCE).unwrap();
        assert_eq!(score.points, 3.0);
        assert_eq!(score.confidence, 0.5);
    }

    #[test]
    fn confidence_is_monotonic_in_agreement() {
        let mut assessment = Assessment::default();
        assessment.add(Context::None, entry(2.0, ""));
        assessment.add(Context::None, entry(4.0, ""));
        let before = assessment
            .score_for(Context::None, TOLERANCE)
            .unwrap()
            .confidence;

        // an agreeing entry never lowers confidence
        assessment.add(Context::None, entry(2.0, ""));
        let after_agreement = assessment
            .score_for(Context::None, TOLERANCE)
            .unwrap()
            .confidence;
        assert!(after_agreement >= before);

        // a disagreeing entry never raises it
        assessment.add(Context::None, entry(7.0, ""));
        let after_disagreement = assessment
            .score_for(Context::None, TOLERANCE)
            .unwrap()
            .confidence;
        assert!(after_disagreement <= after_agreement);
    }

    #[test]
    fn contexts_are_scored_independently() {
        let owner_a = Context::Owner(SimilarityClass(1));
        let owner_b = Context::Owner(SimilarityClass(2));
        let mut index = AssessmentIndex::default();
        let class = SimilarityClass(9);
        index.record(class, owner_a, entry(1.0, ""));
        index.record(class, owner_b, entry(4.0, ""));

        assert_eq!(index.score_for(class, owner_a, TOLERANCE).unwrap().points, 1.0);
        assert_eq!(index.score_for(class, owner_b, TOLERANCE).unwrap().points, 4.0);
        assert!(index.score_for(class, Context::None, TOLERANCE).is_none());
    }
}
