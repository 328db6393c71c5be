//! Shared API types, auth workflow, and SQL builders for watcharr.
//!
//! Request/response shapes here are the JSON the web client sends and reads.
//! The framework-agnostic register/login logic lives in [`service`]; route
//! handlers in the server crate are thin adapters over it.

use serde::{Deserialize, Serialize};

#[cfg(feature = "backend")]
pub mod db;
pub mod service;

pub use watcharr_core::{EncodedCredential, SessionClaims};

// ─── Auth ────────────────────────────────────────────────────────────────────

/// Username + password body for both register and login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    pub username: String,
    pub password: String,
}

/// Returned on successful register / login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
}

/// Returned by `GET /api/auth/verify` — the claims of the presented token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    #[serde(rename = "userId")]
    pub user_id: u64,
    pub username: String,
}

impl From<SessionClaims> for VerifyResponse {
    fn from(claims: SessionClaims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
        }
    }
}

// ─── Health ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

// ─── Service Error ───────────────────────────────────────────────────────────

/// Framework-agnostic service error.
///
/// Each variant maps to an HTTP status code. Messages are safe to show to
/// clients; internal detail is logged where the error is created.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ServiceError {
    BadRequest(String),
    Unauthorized(String),
    Conflict(String),
    Internal(String),
}

impl ServiceError {
    /// HTTP status code as a `u16`.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Conflict(_) => 409,
            Self::Internal(_) => 500,
        }
    }

    /// The error message.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m) | Self::Unauthorized(m) | Self::Conflict(m) | Self::Internal(m) => {
                m
            }
        }
    }

    /// Build a closure that logs a storage error and returns a generic `Internal`.
    pub fn from_db<E: std::fmt::Display>(context: &str) -> impl FnOnce(E) -> Self + '_ {
        move |e| {
            tracing::error!("{context}: {e}");
            Self::Internal("internal server error".into())
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ServiceError {}

// ─── Error (JSON shape) ─────────────────────────────────────────────────────

/// JSON error shape `{ "error": "..." }` returned by all error responses.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl From<&ServiceError> for ApiError {
    fn from(e: &ServiceError) -> Self {
        Self {
            error: e.message().to_string(),
        }
    }
}
