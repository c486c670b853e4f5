use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::QuizError;
use crate::question_bank::{Question, QuestionSet};
use crate::shuffle::shuffle;

/// The authoritative (first) answer given to a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_id: u32,
    pub selected_option_index: usize,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

/// Outcome of a successful `advance`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved on to the question at this index
    Next(usize),
    /// The last question was just passed; fires exactly once per session
    Completed,
    /// Session was already completed, nothing changed
    AlreadyCompleted,
}

/// In-progress state of one quiz attempt.
///
/// The question order is fixed at construction. Mutation only happens through
/// `select_answer`, `advance` and `on_tick`; once completed the state is frozen.
#[derive(Debug, Clone)]
pub struct SessionState {
    shuffled_order: Vec<Question>,
    current_index: usize,
    answers: Vec<Option<AnswerRecord>>,
    elapsed_seconds: u64,
    completed: bool,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Start a session over a freshly shuffled copy of the set's questions
    pub fn new<R: Rng + ?Sized>(set: &QuestionSet, rng: &mut R) -> Self {
        Self::with_order(shuffle(&set.questions, rng))
    }

    /// Start a session with a pre-decided question order
    pub fn with_order(order: Vec<Question>) -> Self {
        let n = order.len();
        Self {
            shuffled_order: order,
            current_index: 0,
            answers: vec![None; n],
            elapsed_seconds: 0,
            completed: false,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn select_answer(
        &mut self,
        index: usize,
        option: usize,
    ) -> Result<&AnswerRecord, QuizError> {
        self.select_answer_at(index, option, Utc::now())
    }

    pub fn select_answer_at(
        &mut self,
        index: usize,
        option: usize,
        at: DateTime<Utc>,
    ) -> Result<&AnswerRecord, QuizError> {
        if self.completed {
            return Err(QuizError::SessionCompleted);
        }
        if index != self.current_index {
            return Err(QuizError::NotCurrentQuestion {
                index,
                current: self.current_index,
            });
        }
        if self.answers[index].is_some() {
            return Err(QuizError::AlreadyAnswered { index });
        }

        let question = &self.shuffled_order[index];
        if option >= question.options.len() {
            return Err(QuizError::OptionOutOfRange {
                option,
                len: question.options.len(),
            });
        }

        let record = AnswerRecord {
            question_id: question.id,
            selected_option_index: option,
            is_correct: question.is_correct(option),
            answered_at: at,
        };

        Ok(self.answers[index].insert(record))
    }

    pub fn advance(&mut self) -> Result<Advance, QuizError> {
        self.advance_at(Utc::now())
    }

    pub fn advance_at(&mut self, at: DateTime<Utc>) -> Result<Advance, QuizError> {
        if self.completed {
            return Ok(Advance::AlreadyCompleted);
        }

        let last = self.shuffled_order.len().saturating_sub(1);
        if !self.shuffled_order.is_empty() && self.answers[self.current_index].is_none() {
            return Err(QuizError::NotAnswered);
        }

        if self.current_index < last {
            self.current_index += 1;
            Ok(Advance::Next(self.current_index))
        } else {
            self.completed = true;
            self.completed_at = Some(at);
            Ok(Advance::Completed)
        }
    }

    /// One clock unit; ignored after completion
    pub fn on_tick(&mut self) {
        if !self.completed {
            self.elapsed_seconds += 1;
        }
    }

    pub fn questions(&self) -> &[Question] {
        &self.shuffled_order
    }

    pub fn len(&self) -> usize {
        self.shuffled_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shuffled_order.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.shuffled_order.get(self.current_index)
    }

    pub fn current_answer(&self) -> Option<&AnswerRecord> {
        self.answer(self.current_index)
    }

    pub fn answer(&self, index: usize) -> Option<&AnswerRecord> {
        self.answers.get(index).and_then(Option::as_ref)
    }

    /// Questions in presentation order paired with their answer, if any
    pub fn entries(&self) -> impl Iterator<Item = (&Question, Option<&AnswerRecord>)> {
        self.shuffled_order
            .iter()
            .zip(self.answers.iter().map(Option::as_ref))
    }

    pub fn answer_records(&self) -> Vec<AnswerRecord> {
        self.answers.iter().flatten().cloned().collect()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.iter().filter(|a| a.is_some()).count()
    }

    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 >= self.shuffled_order.len()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    pub(crate) fn question(id: u32, category: &str, correct: usize) -> Question {
        Question {
            id,
            category: category.to_string(),
            prompt: format!("Question {id}?"),
            options: vec![
                "Option1".to_string(),
                "Option2".to_string(),
                "Option3".to_string(),
                "Option4".to_string(),
            ],
            correct_option_index: correct,
            explanation: format!("Explanation {id}"),
        }
    }

    pub(crate) fn three_questions() -> Vec<Question> {
        vec![
            question(1, "Category1", 2),
            question(2, "Category1", 1),
            question(3, "Category2", 0),
        ]
    }

    #[test]
    fn test_initial_state() {
        let state = SessionState::with_order(three_questions());

        assert_eq!(state.len(), 3);
        assert_eq!(state.current_index(), 0);
        assert_eq!(state.answered_count(), 0);
        assert_eq!(state.elapsed_seconds(), 0);
        assert!(!state.is_completed());
        assert!(state.completed_at().is_none());
        assert_eq!(state.current_question().map(|q| q.id), Some(1));
    }

    #[test]
    fn test_new_shuffles_all_questions() {
        let set = QuestionSet {
            title: "t".into(),
            categories: vec!["Category1".into(), "Category2".into()],
            questions: three_questions(),
        };
        let mut rng = StdRng::seed_from_u64(5);
        let state = SessionState::new(&set, &mut rng);

        let mut ids: Vec<u32> = state.questions().iter().map(|q| q.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(set.questions, three_questions());
    }

    #[test]
    fn test_select_answer_records_correctness() {
        let mut state = SessionState::with_order(three_questions());

        let record = state.select_answer(0, 2).unwrap().clone();
        assert_eq!(record.question_id, 1);
        assert_eq!(record.selected_option_index, 2);
        assert!(record.is_correct);
        assert_eq!(state.current_index(), 0, "selecting must not advance");

        state.advance().unwrap();
        let record = state.select_answer(1, 3).unwrap();
        assert!(!record.is_correct);
    }

    #[test]
    fn test_second_answer_is_rejected() {
        let mut state = SessionState::with_order(three_questions());
        state.select_answer(0, 1).unwrap();
        let before = state.answer(0).cloned();

        assert_matches!(
            state.select_answer(0, 2),
            Err(QuizError::AlreadyAnswered { index: 0 })
        );
        assert_eq!(state.answer(0).cloned(), before);
    }

    #[test]
    fn test_select_answer_validation() {
        let mut state = SessionState::with_order(three_questions());

        assert_matches!(
            state.select_answer(0, 4),
            Err(QuizError::OptionOutOfRange { option: 4, len: 4 })
        );
        assert_matches!(
            state.select_answer(1, 0),
            Err(QuizError::NotCurrentQuestion {
                index: 1,
                current: 0
            })
        );
        assert_eq!(state.answered_count(), 0);
    }

    #[test]
    fn test_advance_requires_answer() {
        let mut state = SessionState::with_order(three_questions());
        assert_matches!(state.advance(), Err(QuizError::NotAnswered));
        assert_eq!(state.current_index(), 0);
    }

    #[test]
    fn test_advance_through_to_completion() {
        let mut state = SessionState::with_order(three_questions());

        state.select_answer(0, 2).unwrap();
        assert_eq!(state.advance().unwrap(), Advance::Next(1));
        state.select_answer(1, 1).unwrap();
        assert_eq!(state.advance().unwrap(), Advance::Next(2));
        assert!(state.is_last_question());
        state.select_answer(2, 3).unwrap();
        assert_eq!(state.advance().unwrap(), Advance::Completed);

        assert!(state.is_completed());
        assert!(state.completed_at().is_some());
        assert_eq!(state.current_index(), 2);
    }

    #[test]
    fn test_advance_after_completion_is_noop() {
        let mut state = SessionState::with_order(vec![question(1, "Category1", 0)]);
        state.select_answer(0, 0).unwrap();
        assert_eq!(state.advance().unwrap(), Advance::Completed);
        let completed_at = state.completed_at();

        for _ in 0..3 {
            assert_eq!(state.advance().unwrap(), Advance::AlreadyCompleted);
        }
        assert_eq!(state.completed_at(), completed_at);
        assert_matches!(state.select_answer(0, 1), Err(QuizError::SessionCompleted));
    }

    #[test]
    fn test_tick_stops_at_completion() {
        let mut state = SessionState::with_order(vec![question(1, "Category1", 0)]);
        state.on_tick();
        state.on_tick();
        assert_eq!(state.elapsed_seconds(), 2);

        state.select_answer(0, 0).unwrap();
        state.on_tick();
        state.advance().unwrap();
        state.on_tick();
        assert_eq!(state.elapsed_seconds(), 3);
    }

    #[test]
    fn test_answer_records_in_presentation_order() {
        let mut state = SessionState::with_order(three_questions());
        for (i, option) in [2usize, 0, 0].into_iter().enumerate() {
            state.select_answer(i, option).unwrap();
            state.advance().unwrap();
        }
        let ids: Vec<u32> = state.answer_records().iter().map(|a| a.question_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let answered_at: Vec<_> = state.answer_records().iter().map(|a| a.answered_at).collect();
        assert!(answered_at.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_empty_session_completes_on_advance() {
        let mut state = SessionState::with_order(vec![]);
        assert!(state.is_empty());
        assert!(state.current_question().is_none());
        assert_eq!(state.advance().unwrap(), Advance::Completed);
    }
}
