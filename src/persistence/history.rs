use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::error::PersistenceError;
use crate::result::QuizResult;

/// Local durable history of results, stored most-recent-first as a JSON array
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path =
            AppDirs::history_path().unwrap_or_else(|| PathBuf::from("certquiz_history.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty history
    pub fn try_load(&self) -> Result<Vec<QuizResult>, PersistenceError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Put `result` at the head of the history
    pub fn try_append(&self, result: &QuizResult) -> Result<(), PersistenceError> {
        let mut history = self.try_load()?;
        history.insert(0, result.clone());
        self.write(&history)
    }

    fn write(&self, history: &[QuizResult]) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(history)?;

        // write-then-rename so a crash never leaves a truncated history behind
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Never fails; unreadable history is logged and treated as empty
    pub fn load_history(&self) -> Vec<QuizResult> {
        self.try_load().unwrap_or_else(|e| {
            log::error!("could not read history {}: {e}", self.path.display());
            Vec::new()
        })
    }

    /// Never fails; returns whether the record was stored
    pub fn append_to_history(&self, result: &QuizResult) -> bool {
        match self.try_append(result) {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "could not append result {} to history {}: {e}",
                    result.id,
                    self.path.display()
                );
                false
            }
        }
    }
}
