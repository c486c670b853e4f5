// Library surface for the engine, storage and headless integration tests.
// Terminal rendering stays in the binary.
pub mod app_dirs;
pub mod config;
pub mod engine;
pub mod error;
pub mod history_api;
pub mod identity;
pub mod logging;
pub mod persistence;
pub mod question_bank;
pub mod result;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod shuffle;
pub mod util;

pub use engine::QuizEngine;
pub use error::{PersistenceError, QuizError};
