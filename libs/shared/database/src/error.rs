use thiserror::Error;

/// SQLSTATE raised by an exclusion constraint violation.
pub const EXCLUSION_VIOLATION: &str = "23P01";
/// SQLSTATE raised by a unique constraint violation.
pub const UNIQUE_VIOLATION: &str = "23505";
/// SQLSTATE raised when a row references a key that does not exist.
pub const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database unreachable: {0}")]
    Unreachable(String),

    #[error("Database request timed out")]
    Timeout,

    #[error("Conflict: {message}")]
    Conflict { code: Option<String>, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, code: Option<String>, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Client configuration error: {0}")]
    Configuration(String),
}

impl DatabaseError {
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DatabaseError::Timeout
        } else {
            DatabaseError::Unreachable(err.to_string())
        }
    }

    /// True when the store refused a write because it would overlap or duplicate an existing row.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            DatabaseError::Conflict { code, .. } => matches!(
                code.as_deref(),
                None | Some(EXCLUSION_VIOLATION) | Some(UNIQUE_VIOLATION)
            ),
            DatabaseError::Api { code, .. } => matches!(
                code.as_deref(),
                Some(EXCLUSION_VIOLATION) | Some(UNIQUE_VIOLATION)
            ),
            _ => false,
        }
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        match self {
            DatabaseError::Conflict { code, .. } | DatabaseError::Api { code, .. } => {
                code.as_deref() == Some(FOREIGN_KEY_VIOLATION)
            }
            _ => false,
        }
    }

    /// Transient failures the caller may retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, DatabaseError::Unreachable(_) | DatabaseError::Timeout)
    }
}
