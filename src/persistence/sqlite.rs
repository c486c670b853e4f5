use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use super::PersistenceGateway;
use crate::app_dirs::AppDirs;
use crate::error::PersistenceError;
use crate::result::{QuizResult, QuizSession};
use crate::session::AnswerRecord;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS answers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    certification_id TEXT NOT NULL,
    question_id TEXT NOT NULL,
    selected_option INTEGER NOT NULL,
    is_correct BOOLEAN NOT NULL,
    answered_at TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_answers_user ON answers(user_id, certification_id);

CREATE TABLE IF NOT EXISTS question_progress (
    user_id TEXT NOT NULL,
    certification_id TEXT NOT NULL,
    question_id TEXT NOT NULL,
    is_correct BOOLEAN NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (user_id, certification_id, question_id)
);

CREATE TABLE IF NOT EXISTS quiz_results (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    certification_id TEXT NOT NULL,
    quiz_id TEXT NOT NULL,
    overall_score REAL NOT NULL,
    incorrect_question_ids TEXT NOT NULL,
    completed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_quiz_results_user ON quiz_results(user_id, completed_at);

CREATE TABLE IF NOT EXISTS quiz_sessions (
    session_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    certification_id TEXT NOT NULL,
    ended_at TEXT NOT NULL,
    body TEXT NOT NULL
);
"#;

/// User-scoped progress store backed by SQLite
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the store at the default state location
    pub fn open_default() -> Result<Self, PersistenceError> {
        let path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("certquiz_progress.db"));
        Self::open(path)
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PersistenceError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, PersistenceError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Results for a user, most recent first
    pub fn results_for_user(&self, user_id: &str) -> Result<Vec<QuizResult>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, certification_id, quiz_id, overall_score, incorrect_question_ids, completed_at
            FROM quiz_results
            WHERE user_id = ?1
            ORDER BY completed_at DESC
            "#,
        )?;

        let rows = stmt.query_map([user_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, f64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, certification_id, quiz_id, score, incorrect, completed_at) = row?;
            results.push(QuizResult {
                id: parse_uuid(&id, 0)?,
                certification_id,
                quiz_id: parse_uuid(&quiz_id, 2)?,
                overall_score_percent: score,
                incorrect_question_ids: serde_json::from_str(&incorrect)?,
                completed_at: parse_timestamp(&completed_at, 5)?,
            });
        }

        Ok(results)
    }

    pub fn sessions_for_user(&self, user_id: &str) -> Result<Vec<QuizSession>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT body FROM quiz_sessions WHERE user_id = ?1 ORDER BY ended_at DESC",
        )?;
        let bodies = stmt.query_map([user_id], |row| row.get::<_, String>(0))?;

        let mut sessions = Vec::new();
        for body in bodies {
            sessions.push(serde_json::from_str(&body?)?);
        }
        Ok(sessions)
    }

    pub fn answer_count(&self, user_id: &str) -> Result<i64, PersistenceError> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM answers WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?)
    }

    pub fn progress(
        &self,
        user_id: &str,
        certification_id: &str,
        question_id: &str,
    ) -> Result<Option<bool>, PersistenceError> {
        Ok(self
            .conn
            .query_row(
                r#"
                SELECT is_correct FROM question_progress
                WHERE user_id = ?1 AND certification_id = ?2 AND question_id = ?3
                "#,
                params![user_id, certification_id, question_id],
                |row| row.get(0),
            )
            .optional()?)
    }
}

fn parse_uuid(s: &str, col: usize) -> Result<uuid::Uuid, rusqlite::Error> {
    uuid::Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(s: &str, col: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
        })
}

impl PersistenceGateway for SqliteStore {
    fn record_answer(
        &mut self,
        user_id: &str,
        certification_id: &str,
        answer: &AnswerRecord,
    ) -> Result<(), PersistenceError> {
        self.conn.execute(
            r#"
            INSERT INTO answers
            (user_id, certification_id, question_id, selected_option, is_correct, answered_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                user_id,
                certification_id,
                answer.question_id.to_string(),
                answer.selected_option_index as i64,
                answer.is_correct,
                answer.answered_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn record_progress(
        &mut self,
        user_id: &str,
        certification_id: &str,
        question_id: &str,
        is_correct: bool,
    ) -> Result<(), PersistenceError> {
        self.conn.execute(
            r#"
            INSERT INTO question_progress (user_id, certification_id, question_id, is_correct, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, certification_id, question_id)
            DO UPDATE SET is_correct = excluded.is_correct, updated_at = excluded.updated_at
            "#,
            params![
                user_id,
                certification_id,
                question_id,
                is_correct,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn save_result(&mut self, user_id: &str, result: &QuizResult) -> Result<(), PersistenceError> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO quiz_results
            (id, user_id, certification_id, quiz_id, overall_score, incorrect_question_ids, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                result.id.to_string(),
                user_id,
                result.certification_id,
                result.quiz_id.to_string(),
                result.overall_score_percent,
                serde_json::to_string(&result.incorrect_question_ids)?,
                result.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn save_session(&mut self, session: &QuizSession) -> Result<(), PersistenceError> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO quiz_sessions (session_id, user_id, certification_id, ended_at, body)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                session.session_id.to_string(),
                session.user_id,
                session.result.certification_id,
                session.ended_at.to_rfc3339(),
                serde_json::to_string(session)?,
            ],
        )?;
        Ok(())
    }

    fn list_questions_to_review(
        &self,
        user_id: &str,
        certification_id: &str,
    ) -> Result<Vec<String>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT question_id FROM question_progress
            WHERE user_id = ?1 AND certification_id = ?2 AND is_correct = 0
            ORDER BY CAST(question_id AS INTEGER), question_id
            "#,
        )?;

        let ids = stmt.query_map(params![user_id, certification_id], |row| {
            row.get::<_, String>(0)
        })?;

        let mut review = Vec::new();
        for id in ids {
            review.push(id?);
        }
        Ok(review)
    }

    fn list_sessions(&self, user_id: &str) -> Result<Vec<QuizSession>, PersistenceError> {
        self.sessions_for_user(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn answer(question_id: u32, option: usize, is_correct: bool) -> AnswerRecord {
        AnswerRecord {
            question_id,
            selected_option_index: option,
            is_correct,
            answered_at: Utc::now(),
        }
    }

    fn result(cert: &str, score: f64, incorrect: &[&str]) -> QuizResult {
        QuizResult {
            id: Uuid::new_v4(),
            certification_id: cert.to_string(),
            quiz_id: Uuid::new_v4(),
            overall_score_percent: score,
            incorrect_question_ids: incorrect.iter().map(|s| s.to_string()).collect(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_questions_to_review_after_one_miss() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.record_progress("u1", "aws", "1", true).unwrap();
        store.record_progress("u1", "aws", "2", true).unwrap();
        store.record_progress("u1", "aws", "3", false).unwrap();

        assert_eq!(
            store.list_questions_to_review("u1", "aws").unwrap(),
            vec!["3".to_string()]
        );
    }

    #[test]
    fn test_progress_is_upserted() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.record_progress("u1", "aws", "3", false).unwrap();
        store.record_progress("u1", "aws", "3", true).unwrap();

        assert_eq!(store.progress("u1", "aws", "3").unwrap(), Some(true));
        assert!(store.list_questions_to_review("u1", "aws").unwrap().is_empty());
    }

    #[test]
    fn test_review_is_scoped_by_user_and_certification() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.record_progress("u1", "aws", "3", false).unwrap();
        store.record_progress("u2", "aws", "4", false).unwrap();
        store.record_progress("u1", "node", "3", false).unwrap();

        assert_eq!(store.list_questions_to_review("u1", "aws").unwrap(), vec!["3"]);
        assert_eq!(store.list_questions_to_review("u2", "aws").unwrap(), vec!["4"]);
        assert!(store.list_questions_to_review("u3", "aws").unwrap().is_empty());
        assert_eq!(store.progress("u1", "ml", "3").unwrap(), None);
    }

    #[test]
    fn test_record_answer_appends() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.record_answer("u1", "aws", &answer(1, 2, true)).unwrap();
        store.record_answer("u1", "aws", &answer(1, 2, true)).unwrap();
        store.record_answer("u2", "aws", &answer(2, 0, false)).unwrap();

        assert_eq!(store.answer_count("u1").unwrap(), 2);
        assert_eq!(store.answer_count("u2").unwrap(), 1);
    }

    #[test]
    fn test_save_and_read_results() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut older = result("aws", 50.0, &["1", "7"]);
        older.completed_at = Utc::now() - Duration::hours(1);
        let newer = result("aws", 66.66666666666667, &["3"]);

        store.save_result("u1", &older).unwrap();
        store.save_result("u1", &newer).unwrap();

        let loaded = store.results_for_user("u1").unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, newer.id);
        assert_eq!(loaded[0].overall_score_percent, newer.overall_score_percent);
        assert_eq!(loaded[0].incorrect_question_ids, newer.incorrect_question_ids);
        assert_eq!(loaded[1].incorrect_question_ids, vec!["1", "7"]);
    }

    #[test]
    fn test_save_result_twice_merges() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let r = result("aws", 10.0, &[]);
        store.save_result("u1", &r).unwrap();
        store.save_result("u1", &r).unwrap();
        assert_eq!(store.results_for_user("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_save_session() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let session = QuizSession {
            result: result("ml", 100.0, &[]),
            session_id: Uuid::new_v4(),
            user_id: "u1".to_string(),
            started_at: Utc::now() - Duration::minutes(5),
            ended_at: Utc::now(),
            answers: vec![answer(1, 1, true)],
            category_scores: BTreeMap::new(),
        };

        store.save_session(&session).unwrap();
        let loaded = store.sessions_for_user("u1").unwrap();
        assert_eq!(loaded, vec![session]);
    }

    #[test]
    fn test_review_ids_in_numeric_order() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for id in ["10", "3", "21", "2"] {
            store.record_progress("u1", "aws", id, false).unwrap();
        }
        assert_eq!(
            store.list_questions_to_review("u1", "aws").unwrap(),
            vec!["2", "3", "10", "21"]
        );
    }

    #[test]
    fn test_list_sessions_most_recent_first() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let session = |minutes_ago: i64| QuizSession {
            result: result("aws", 50.0, &["1"]),
            session_id: Uuid::new_v4(),
            user_id: "u1".to_string(),
            started_at: Utc::now() - Duration::minutes(minutes_ago + 5),
            ended_at: Utc::now() - Duration::minutes(minutes_ago),
            answers: vec![answer(1, 0, false)],
            category_scores: BTreeMap::new(),
        };
        let older = session(60);
        let newer = session(1);
        store.save_session(&older).unwrap();
        store.save_session(&newer).unwrap();

        assert_eq!(store.list_sessions("u1").unwrap(), vec![newer, older]);
        assert!(store.list_sessions("u2").unwrap().is_empty());
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("progress.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.record_progress("u1", "aws", "5", false).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.list_questions_to_review("u1", "aws").unwrap(), vec!["5"]);
    }
}
