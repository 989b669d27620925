//! Opaque keyset cursors for chat pagination.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::ChatMessage;

const MAX_CURSOR_TOKEN_LEN: usize = 256;

/// Position of the last message a client has seen: `(createdAt, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "t")]
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl Cursor {
    pub fn after(message: &ChatMessage) -> Self {
        Self {
            created_at: message.created_at,
            id: message.id.clone(),
        }
    }

    pub fn encode(&self) -> Result<String, AppError> {
        let payload = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(payload))
    }

    pub fn decode(token: &str) -> Result<Self, AppError> {
        if token.is_empty() || token.len() > MAX_CURSOR_TOKEN_LEN {
            return Err(invalid());
        }
        let bytes = URL_SAFE_NO_PAD.decode(token).map_err(|_| invalid())?;
        serde_json::from_slice(&bytes).map_err(|_| invalid())
    }

    pub fn key(&self) -> (DateTime<Utc>, &str) {
        (self.created_at, self.id.as_str())
    }
}

fn invalid() -> AppError {
    AppError::BadRequest("Invalid cursor".to_string())
}
