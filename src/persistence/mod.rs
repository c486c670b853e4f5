//! Storage collaborators of the quiz engine.
//!
//! `SqliteStore` is the user-scoped store (answer log, per-question progress,
//! results and detailed sessions). `HistoryStore` is the local durable history
//! file. `PersistenceWorker` runs a gateway on its own thread so engine
//! transitions never wait on I/O.

pub mod history;
pub mod sqlite;
pub mod worker;

pub use history::HistoryStore;
pub use sqlite::SqliteStore;
pub use worker::{PersistenceCommand, PersistenceHandle, PersistenceWorker, Reply};

use crate::error::PersistenceError;
use crate::result::{QuizResult, QuizSession};
use crate::session::AnswerRecord;

pub trait PersistenceGateway: Send {
    fn record_answer(
        &mut self,
        user_id: &str,
        certification_id: &str,
        answer: &AnswerRecord,
    ) -> Result<(), PersistenceError>;

    fn record_progress(
        &mut self,
        user_id: &str,
        certification_id: &str,
        question_id: &str,
        is_correct: bool,
    ) -> Result<(), PersistenceError>;

    fn save_result(&mut self, user_id: &str, result: &QuizResult) -> Result<(), PersistenceError>;

    fn save_session(&mut self, session: &QuizSession) -> Result<(), PersistenceError>;

    /// Question ids whose latest recorded outcome for this user was incorrect
    fn list_questions_to_review(
        &self,
        user_id: &str,
        certification_id: &str,
    ) -> Result<Vec<String>, PersistenceError>;

    /// Detailed sessions of a user, most recent first
    fn list_sessions(&self, user_id: &str) -> Result<Vec<QuizSession>, PersistenceError>;
}
