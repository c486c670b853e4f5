use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::identity::Identity;
use crate::scoring::{category_scores, incorrect_questions, overall_score, CategoryScore};
use crate::session::{AnswerRecord, SessionState};

/// Summary record of one completed attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub id: Uuid,
    pub certification_id: String,
    pub quiz_id: Uuid,
    pub overall_score_percent: f64,
    pub incorrect_question_ids: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Detailed record: the summary plus the full answer trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizSession {
    #[serde(flatten)]
    pub result: QuizResult,
    pub session_id: Uuid,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub answers: Vec<AnswerRecord>,
    pub category_scores: BTreeMap<String, CategoryScore>,
}

impl QuizSession {
    /// Summary projection
    pub fn summary(&self) -> &QuizResult {
        &self.result
    }
}

/// Both records built at completion; `session` needs a signed-in user
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedQuiz {
    pub result: QuizResult,
    pub session: Option<QuizSession>,
}

pub struct ResultBuilder<'a> {
    certification_id: &'a str,
    categories: &'a [String],
}

impl<'a> ResultBuilder<'a> {
    pub fn new(certification_id: &'a str, categories: &'a [String]) -> Self {
        Self {
            certification_id,
            categories,
        }
    }

    /// Snapshot a completed session. Returns `None` if it has not completed.
    pub fn build(&self, state: &SessionState, identity: Option<&Identity>) -> Option<CompletedQuiz> {
        let completed_at = state.completed_at()?;

        let result = QuizResult {
            id: Uuid::new_v4(),
            certification_id: self.certification_id.to_string(),
            quiz_id: Uuid::new_v4(),
            overall_score_percent: overall_score(state),
            incorrect_question_ids: incorrect_questions(state)
                .iter()
                .map(|q| q.question.id.to_string())
                .collect(),
            completed_at,
        };

        let session = identity.map(|user| QuizSession {
            result: result.clone(),
            session_id: Uuid::new_v4(),
            user_id: user.user_id.clone(),
            started_at: session_start(state, completed_at),
            ended_at: completed_at,
            answers: state.answer_records(),
            category_scores: category_scores(state, self.categories),
        });

        Some(CompletedQuiz { result, session })
    }
}

// Prefer the recorded creation time; fall back to counting back the ticked seconds.
fn session_start(state: &SessionState, completed_at: DateTime<Utc>) -> DateTime<Utc> {
    let started = state.started_at();
    if started <= completed_at {
        started
    } else {
        completed_at - Duration::seconds(state.elapsed_seconds() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::three_questions;

    fn completed(options: &[usize]) -> SessionState {
        let mut state = SessionState::with_order(three_questions());
        for (i, &option) in options.iter().enumerate() {
            state.select_answer(i, option).unwrap();
            state.advance().unwrap();
        }
        state
    }

    fn categories() -> Vec<String> {
        vec!["Category1".to_string(), "Category2".to_string()]
    }

    #[test]
    fn test_not_built_before_completion() {
        let state = SessionState::with_order(three_questions());
        let cats = categories();
        let builder = ResultBuilder::new("aws", &cats);
        assert!(builder.build(&state, None).is_none());
    }

    #[test]
    fn test_build_summary_without_identity() {
        let state = completed(&[2, 1, 3]);
        let cats = categories();
        let built = ResultBuilder::new("aws", &cats).build(&state, None).unwrap();

        assert!(built.session.is_none());
        assert_eq!(built.result.certification_id, "aws");
        assert!((built.result.overall_score_percent - 66.67).abs() < 0.01);
        assert_eq!(built.result.incorrect_question_ids, vec!["3".to_string()]);
        assert_ne!(built.result.id, built.result.quiz_id);
        assert_eq!(Some(built.result.completed_at), state.completed_at());
    }

    #[test]
    fn test_build_session_with_identity() {
        let state = completed(&[2, 1, 3]);
        let cats = categories();
        let user = Identity::new("test-uid");
        let built = ResultBuilder::new("aws", &cats)
            .build(&state, Some(&user))
            .unwrap();

        let session = built.session.unwrap();
        assert_eq!(session.summary(), &built.result);
        assert_eq!(session.user_id, "test-uid");
        assert_eq!(session.answers.len(), 3);
        assert_eq!(session.category_scores["Category1"].correct_count, 2);
        assert_eq!(session.category_scores["Category2"].total_answered, 1);
        assert!(session.started_at <= session.ended_at);
        assert_ne!(session.session_id, session.result.id);
    }

    #[test]
    fn test_session_json_is_flat() {
        let state = completed(&[2, 1, 0]);
        let cats = categories();
        let user = Identity::new("u1");
        let session = ResultBuilder::new("ml", &cats)
            .build(&state, Some(&user))
            .unwrap()
            .session
            .unwrap();

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["certificationId"], "ml");
        assert_eq!(json["overallScorePercent"], 100.0);
        assert_eq!(json["userId"], "u1");
        assert!(json["answers"].is_array());

        let back: QuizSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }

    #[test]
    fn test_result_roundtrip_keeps_score_and_ids() {
        let state = completed(&[0, 0, 0]);
        let cats = categories();
        let result = ResultBuilder::new("node", &cats)
            .build(&state, None)
            .unwrap()
            .result;

        let text = serde_json::to_string(&result).unwrap();
        let back: QuizResult = serde_json::from_str(&text).unwrap();
        assert_eq!(back.overall_score_percent, result.overall_score_percent);
        assert_eq!(back.incorrect_question_ids, result.incorrect_question_ids);
    }
}
