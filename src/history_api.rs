//! Transport-neutral handlers for the history endpoints.
//!
//! `GET /api/history` lists stored results most-recent-first and
//! `POST /api/history` prepends one. Any HTTP front end only has to map
//! method, path and body onto [`HistoryApi::route`].

use serde_json::{json, Value};

use crate::persistence::HistoryStore;
use crate::result::QuizResult;

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_METHOD_NOT_ALLOWED: u16 = 405;
pub const STATUS_SERVER_ERROR: u16 = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    fn error(status: u16, message: &str) -> Self {
        Self::new(status, json!({ "error": message }))
    }
}

pub struct HistoryApi<'a> {
    store: &'a HistoryStore,
}

impl<'a> HistoryApi<'a> {
    pub fn new(store: &'a HistoryStore) -> Self {
        Self { store }
    }

    pub fn route(&self, method: &str, path: &str, body: &str) -> ApiResponse {
        match (method, path.trim_end_matches('/')) {
            ("GET", "/api") => ApiResponse::new(
                STATUS_OK,
                json!({ "message": "certquiz history api" }),
            ),
            ("GET", "/api/history") => self.get_history(),
            ("POST", "/api/history") => self.post_history(body),
            (_, "/api") | (_, "/api/history") => {
                ApiResponse::error(STATUS_METHOD_NOT_ALLOWED, "method not allowed")
            }
            _ => ApiResponse::error(STATUS_NOT_FOUND, "not found"),
        }
    }

    pub fn get_history(&self) -> ApiResponse {
        match self.store.try_load() {
            Ok(history) => ApiResponse::new(STATUS_OK, json!(history)),
            Err(e) => {
                log::error!("GET /history failed: {e}");
                ApiResponse::error(STATUS_SERVER_ERROR, "could not read history")
            }
        }
    }

    pub fn post_history(&self, body: &str) -> ApiResponse {
        let result: QuizResult = match serde_json::from_str(body) {
            Ok(r) => r,
            Err(e) => {
                log::warn!("POST /history rejected: {e}");
                return ApiResponse::error(STATUS_BAD_REQUEST, "malformed quiz result");
            }
        };

        match self.store.try_append(&result) {
            Ok(()) => ApiResponse::new(STATUS_CREATED, json!(result)),
            Err(e) => {
                log::error!("POST /history failed: {e}");
                ApiResponse::error(STATUS_SERVER_ERROR, "could not save result")
            }
        }
    }
}
