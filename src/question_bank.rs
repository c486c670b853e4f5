use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::QuizError;

static BANK_DIR: Dir = include_dir!("src/data");

const CATALOG_FILE: &str = "certifications.json";

/// A single multiple-choice question as stored in a bank file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub category: String,
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    #[serde(rename = "correctAnswer")]
    pub correct_option_index: usize,
    pub explanation: String,
}

impl Question {
    pub fn is_correct(&self, option: usize) -> bool {
        option == self.correct_option_index
    }

    pub fn correct_option(&self) -> &str {
        &self.options[self.correct_option_index]
    }
}

/// The immutable question bank of one certification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub title: String,
    pub categories: Vec<String>,
    pub questions: Vec<Question>,
}

impl QuestionSet {
    pub fn from_json(data: &str) -> Result<Self, QuizError> {
        let set: QuestionSet = serde_json::from_str(data)
            .map_err(|e| QuizError::Configuration(format!("unreadable question bank: {e}")))?;
        set.validate()?;
        Ok(set)
    }

    /// Schema checks done once at load time; the engine trusts a validated set
    pub fn validate(&self) -> Result<(), QuizError> {
        if self.questions.is_empty() {
            return Err(QuizError::Configuration(format!(
                "'{}' has no questions",
                self.title
            )));
        }

        let categories: HashSet<&str> = self.categories.iter().map(String::as_str).collect();
        let mut seen_ids = HashSet::new();

        for q in &self.questions {
            if !seen_ids.insert(q.id) {
                return Err(QuizError::Configuration(format!(
                    "'{}': duplicate question id {}",
                    self.title, q.id
                )));
            }
            if !categories.contains(q.category.as_str()) {
                return Err(QuizError::Configuration(format!(
                    "'{}': question {} uses unknown category '{}'",
                    self.title, q.id, q.category
                )));
            }
            if q.options.len() < 2 {
                return Err(QuizError::Configuration(format!(
                    "'{}': question {} needs at least two options",
                    self.title, q.id
                )));
            }
            if q.correct_option_index >= q.options.len() {
                return Err(QuizError::Configuration(format!(
                    "'{}': question {} has correct answer {} but only {} options",
                    self.title,
                    q.id,
                    q.correct_option_index,
                    q.options.len()
                )));
            }
        }

        Ok(())
    }

    pub fn find(&self, id: u32) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certification {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub questions_file: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    certifications: Vec<Certification>,
}

/// Where bank files are read from
#[derive(Debug, Clone, PartialEq)]
pub enum BankSource {
    Bundled,
    Directory(PathBuf),
}

impl BankSource {
    fn read(&self, file_name: &str) -> Result<String, QuizError> {
        match self {
            BankSource::Bundled => BANK_DIR
                .get_file(file_name)
                .and_then(|f| f.contents_utf8())
                .map(str::to_owned)
                .ok_or_else(|| {
                    QuizError::Configuration(format!("bundled bank file '{file_name}' not found"))
                }),
            BankSource::Directory(dir) => fs::read_to_string(dir.join(file_name)).map_err(|e| {
                QuizError::Configuration(format!(
                    "cannot read '{}': {e}",
                    dir.join(file_name).display()
                ))
            }),
        }
    }
}

/// All certifications available to the user, each with its validated question set
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<(Certification, QuestionSet)>,
}

impl Catalog {
    pub fn bundled() -> Result<Self, QuizError> {
        Self::load(&BankSource::Bundled)
    }

    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, QuizError> {
        Self::load(&BankSource::Directory(dir.as_ref().to_path_buf()))
    }

    pub fn load(source: &BankSource) -> Result<Self, QuizError> {
        let catalog: CatalogFile = serde_json::from_str(&source.read(CATALOG_FILE)?)
            .map_err(|e| QuizError::Configuration(format!("unreadable {CATALOG_FILE}: {e}")))?;

        let mut entries = Vec::with_capacity(catalog.certifications.len());
        for cert in catalog.certifications {
            let set = QuestionSet::from_json(&source.read(&cert.questions_file)?)?;
            log::debug!(
                "loaded certification '{}' with {} questions",
                cert.id,
                set.questions.len()
            );
            entries.push((cert, set));
        }

        if entries.is_empty() {
            return Err(QuizError::Configuration(
                "no certifications in catalog".to_string(),
            ));
        }

        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<(Certification, QuestionSet)>) -> Self {
        Self { entries }
    }

    pub fn certifications(&self) -> impl Iterator<Item = &Certification> {
        self.entries.iter().map(|(c, _)| c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<(&Certification, &QuestionSet)> {
        self.entries.get(idx).map(|(c, s)| (c, s))
    }

    pub fn position(&self, certification_id: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(c, _)| c.id == certification_id)
    }

    pub fn question_set(&self, certification_id: &str) -> Option<&QuestionSet> {
        self.entries
            .iter()
            .find(|(c, _)| c.id == certification_id)
            .map(|(_, s)| s)
    }
}
