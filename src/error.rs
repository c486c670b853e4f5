use thiserror::Error;

/// Failures of the storage collaborators (user store, local history file)
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed record: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("persistence worker is no longer running")]
    WorkerGone,
}

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("question {index} has already been answered")]
    AlreadyAnswered { index: usize },
    #[error("question {index} is not the current question ({current})")]
    NotCurrentQuestion { index: usize, current: usize },
    #[error("option {option} is out of range for a question with {len} options")]
    OptionOutOfRange { option: usize, len: usize },
    #[error("the current question has not been answered yet")]
    NotAnswered,
    #[error("the session has already completed")]
    SessionCompleted,
    #[error("invalid question bank: {0}")]
    Configuration(String),
    #[error("no signed-in user")]
    IdentityUnavailable,
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl QuizError {
    /// Validation errors are reported back to the caller and leave the session untouched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            QuizError::AlreadyAnswered { .. }
                | QuizError::NotCurrentQuestion { .. }
                | QuizError::OptionOutOfRange { .. }
                | QuizError::NotAnswered
                | QuizError::SessionCompleted
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_classified() {
        assert!(QuizError::AlreadyAnswered { index: 0 }.is_validation());
        assert!(QuizError::OptionOutOfRange { option: 5, len: 4 }.is_validation());
        assert!(QuizError::NotAnswered.is_validation());
        assert!(!QuizError::IdentityUnavailable.is_validation());
        assert!(!QuizError::Configuration("bad".into()).is_validation());
    }

    #[test]
    fn persistence_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: QuizError = PersistenceError::from(io).into();
        assert!(err.to_string().contains("disk full"));
        assert!(!err.is_validation());
    }
}
