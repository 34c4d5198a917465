//! Error classification for HTTP responses.
//!
//! # Responsibility
//! - Carry wire-visible failures as `ClassifiedError { status, message }`.
//! - Resolve every handler failure to exactly one classified value.
//!
//! # Invariants
//! - Classification never fails and is idempotent.
//! - Internal failures always classify to a fixed 500 message; their
//!   diagnostic text never reaches a response body.

use axum::http::StatusCode;
use contacts_core::ServiceError;
use std::error::Error;
use std::fmt::{Display, Formatter};

const CONFLICT_MESSAGE: &str = "Contact already exists";

/// A failure with an explicit wire status and message.
///
/// Immutable once built. An empty message is replaced by the status'
/// canonical reason phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedError {
    status: StatusCode,
    message: String,
}

impl ClassifiedError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            status.canonical_reason().unwrap_or_default().to_string()
        } else {
            message
        };
        Self { status, message }
    }

    /// Status with its canonical reason phrase as message.
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(status, String::new())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found() -> Self {
        Self::from_status(StatusCode::NOT_FOUND)
    }

    pub fn method_not_allowed() -> Self {
        Self::from_status(StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn internal() -> Self {
        Self::from_status(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ClassifiedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status.as_u16(), self.message)
    }
}

impl Error for ClassifiedError {}

/// Handler failure before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Application logic already chose the status and message.
    Classified(ClassifiedError),
    /// Anything else; the string is an operator-facing diagnostic.
    Internal(String),
}

impl ApiError {
    pub fn internal(diagnostic: impl Display) -> Self {
        Self::Internal(diagnostic.to_string())
    }
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Classified(err) => write!(f, "{err}"),
            Self::Internal(diagnostic) => write!(f, "internal error: {diagnostic}"),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Classified(err) => Some(err),
            Self::Internal(_) => None,
        }
    }
}

impl From<ClassifiedError> for ApiError {
    fn from(value: ClassifiedError) -> Self {
        Self::Classified(value)
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Conflict { .. } => {
                Self::Classified(ClassifiedError::conflict(CONFLICT_MESSAGE))
            }
            other => Self::internal(other),
        }
    }
}

/// Resolves a handler failure to its wire status and message.
pub fn classify(failure: ApiError) -> ClassifiedError {
    match failure {
        ApiError::Classified(err) => err,
        ApiError::Internal(_) => ClassifiedError::internal(),
    }
}
