//! Tri-state result shape returned and emitted by every core operation.
//!
//! Expected failures (bad credentials, network down, expired refresh token)
//! travel as `Outcome::Error` values instead of panics or early returns, so a
//! front end can render loading, data and error states from one match.

use serde::Serialize;
use thiserror::Error;

use crate::api::ApiError;

/// Broad category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected locally before any network call.
    Validation,
    /// Bad credentials or an unrecoverable session. The UI routes to login.
    Authentication,
    /// Connectivity or timeout.
    Network,
    /// The server answered with an error or `success: false`.
    Server,
    /// Malformed payload or local data.
    Data,
}

/// A failed operation: what kind, the technical cause, and an optional
/// message meant for the owner.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{cause}")]
pub struct Failure {
    pub kind: ErrorKind,
    pub cause: String,
    pub message: Option<String>,
}

impl Failure {
    pub fn new(kind: ErrorKind, cause: impl Into<String>) -> Self {
        Self {
            kind,
            cause: cause.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn validation(cause: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, cause).with_message(message)
    }

    /// Build a failure from an API error, preferring the server-supplied
    /// message and falling back to `fallback` for display.
    pub fn from_api(err: &ApiError, fallback: &str) -> Self {
        let message = match err.server_message() {
            Some(msg) => msg.to_string(),
            None if err.is_session_expired() => err.to_string(),
            None => format!("{}: {}", fallback, err),
        };
        Self::new(err.kind(), err.to_string()).with_message(message)
    }

    /// Text to show the owner.
    pub fn display_message(&self) -> &str {
        self.message.as_deref().unwrap_or(&self.cause)
    }

    /// True when the session was cleared and the owner must log in again.
    pub fn requires_login(&self) -> bool {
        self.kind == ErrorKind::Authentication
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Loading,
    Success(T),
    Error(Failure),
}

impl<T> Outcome<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Outcome::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Outcome::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Outcome::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Error(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Loading => Outcome::Loading,
            Outcome::Success(data) => Outcome::Success(f(data)),
            Outcome::Error(failure) => Outcome::Error(failure),
        }
    }
}

impl<T> From<Result<T, Failure>> for Outcome<T> {
    fn from(result: Result<T, Failure>) -> Self {
        match result {
            Ok(data) => Outcome::Success(data),
            Err(failure) => Outcome::Error(failure),
        }
    }
}
