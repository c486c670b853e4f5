use rand::Rng;
use std::collections::BTreeMap;

use crate::error::QuizError;
use crate::identity::Identity;
use crate::persistence::{HistoryStore, PersistenceCommand, PersistenceHandle};
use crate::question_bank::QuestionSet;
use crate::result::{CompletedQuiz, ResultBuilder};
use crate::scoring::{self, CategoryScore, IncorrectQuestion};
use crate::session::{Advance, AnswerRecord, SessionState};

/// Drives one quiz attempt: validates transitions on the session state,
/// notifies the persistence side channel, and hands off the result records
/// exactly once when the last question is passed.
#[derive(Debug)]
pub struct QuizEngine {
    certification_id: String,
    categories: Vec<String>,
    state: SessionState,
    identity: Option<Identity>,
    persistence: Option<PersistenceHandle>,
    history: Option<HistoryStore>,
    completion: Option<Completion>,
}

/// What was built and stored when the session completed
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub records: CompletedQuiz,
    /// Whether the local history append succeeded
    pub saved_locally: bool,
}

impl QuizEngine {
    pub fn start<R: Rng + ?Sized>(
        certification_id: &str,
        set: &QuestionSet,
        identity: Option<Identity>,
        rng: &mut R,
    ) -> Self {
        Self::with_state(
            certification_id,
            set.categories.clone(),
            SessionState::new(set, rng),
            identity,
        )
    }

    pub fn with_state(
        certification_id: &str,
        categories: Vec<String>,
        state: SessionState,
        identity: Option<Identity>,
    ) -> Self {
        log::info!(
            "starting '{}' quiz with {} questions",
            certification_id,
            state.len()
        );
        Self {
            certification_id: certification_id.to_string(),
            categories,
            state,
            identity,
            persistence: None,
            history: None,
            completion: None,
        }
    }

    pub fn with_persistence(mut self, handle: PersistenceHandle) -> Self {
        self.persistence = Some(handle);
        self
    }

    pub fn with_history(mut self, history: HistoryStore) -> Self {
        self.history = Some(history);
        self
    }

    pub fn select_answer(&mut self, index: usize, option: usize) -> Result<AnswerRecord, QuizError> {
        let record = self.state.select_answer(index, option)?.clone();
        log::debug!(
            "question {} answered with option {} ({})",
            record.question_id,
            option,
            if record.is_correct { "correct" } else { "incorrect" }
        );
        self.notify_answer(&record);
        Ok(record)
    }

    /// Answer whatever question is current
    pub fn answer_current(&mut self, option: usize) -> Result<AnswerRecord, QuizError> {
        self.select_answer(self.state.current_index(), option)
    }

    pub fn advance(&mut self) -> Result<Advance, QuizError> {
        let advance = self.state.advance()?;
        if advance == Advance::Completed {
            self.complete();
        }
        Ok(advance)
    }

    pub fn on_tick(&mut self) {
        self.state.on_tick();
    }

    // Progress and answer log are separate commands so one failing never affects the other.
    fn notify_answer(&self, record: &AnswerRecord) {
        let (Some(user), Some(persistence)) = (&self.identity, &self.persistence) else {
            return;
        };

        persistence.dispatch(PersistenceCommand::RecordProgress {
            user_id: user.user_id.clone(),
            certification_id: self.certification_id.clone(),
            question_id: record.question_id.to_string(),
            is_correct: record.is_correct,
        });
        persistence.dispatch(PersistenceCommand::RecordAnswer {
            user_id: user.user_id.clone(),
            certification_id: self.certification_id.clone(),
            answer: record.clone(),
        });
    }

    fn complete(&mut self) {
        if self.completion.is_some() {
            return;
        }

        let builder = ResultBuilder::new(&self.certification_id, &self.categories);
        let Some(records) = builder.build(&self.state, self.identity.as_ref()) else {
            log::error!("completion triggered on an unfinished session");
            return;
        };

        log::info!(
            "quiz '{}' completed: {:.1}% with {} incorrect",
            self.certification_id,
            records.result.overall_score_percent,
            records.result.incorrect_question_ids.len()
        );

        let saved_locally = match &self.history {
            Some(history) => history.append_to_history(&records.result),
            None => false,
        };

        if let (Some(user), Some(persistence)) = (&self.identity, &self.persistence) {
            persistence.dispatch(PersistenceCommand::SaveResult {
                user_id: user.user_id.clone(),
                result: records.result.clone(),
            });
            if let Some(session) = &records.session {
                persistence.dispatch(PersistenceCommand::SaveSession(Box::new(session.clone())));
            }
        }

        self.completion = Some(Completion {
            records,
            saved_locally,
        });
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn certification_id(&self) -> &str {
        &self.certification_id
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_completed(&self) -> bool {
        self.state.is_completed()
    }

    pub fn completion(&self) -> Option<&Completion> {
        self.completion.as_ref()
    }

    pub fn overall_score(&self) -> f64 {
        scoring::overall_score(&self.state)
    }

    pub fn category_scores(&self) -> BTreeMap<String, CategoryScore> {
        scoring::category_scores(&self.state, &self.categories)
    }

    pub fn incorrect_questions(&self) -> Vec<IncorrectQuestion> {
        scoring::incorrect_questions(&self.state)
    }
}
