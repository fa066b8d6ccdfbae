//! API request and response types

use serde::{Deserialize, Serialize};

/// One inbound message submitted over HTTP
#[derive(Debug, Deserialize)]
pub struct EventRequest {
    pub conversation_id: i64,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Conversations with a form in memory
    pub active_sessions: usize,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
