//! Registration / login workflow — framework-agnostic pure functions.
//!
//! Handlers supply an [`AccountStore`], the configured [`CredentialHasher`]
//! and the process [`TokenIssuer`]. Everything here is synchronous and
//! CPU-bound (password hashing); async callers should run it on a blocking
//! thread.

use watcharr_core::{
    CredentialHasher, EncodedCredential, SessionClaims, TokenIssuer, credential,
};

use crate::{AuthRequest, AuthResponse, ServiceError};

/// Longest accepted username, in characters.
pub const MAX_USERNAME_CHARS: usize = 64;

/// Longest accepted password, in bytes. Bounds the work done per hash.
pub const MAX_PASSWORD_BYTES: usize = 1024;

// ─── Account store ──────────────────────────────────────────────────────────

/// A persisted account as read back for login.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub id: u64,
    pub username: String,
    pub password: EncodedCredential,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("username already exists")]
    UsernameTaken,
    #[error("account store error: {0}")]
    Backend(String),
}

/// Persistence used by [`register`] and [`login`].
///
/// Implementations report a uniqueness violation on username as
/// [`StoreError::UsernameTaken`], never as a backend message.
pub trait AccountStore {
    /// Insert a user and return the new id.
    fn insert_user(&self, username: &str, password: &EncodedCredential) -> Result<u64, StoreError>;

    fn find_user(&self, username: &str) -> Result<Option<StoredUser>, StoreError>;
}

// ─── Validation ─────────────────────────────────────────────────────────────

/// Validate and normalize a username. Returns the trimmed username.
pub fn validate_username(username: &str) -> Result<String, ServiceError> {
    let trimmed = username.trim();
    let chars = trimmed.chars().count();
    if chars == 0 || chars > MAX_USERNAME_CHARS {
        return Err(ServiceError::BadRequest(format!(
            "username must be 1-{MAX_USERNAME_CHARS} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    if password.is_empty() {
        return Err(ServiceError::BadRequest("password is required".into()));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(ServiceError::BadRequest(format!(
            "password must be at most {MAX_PASSWORD_BYTES} bytes"
        )));
    }
    Ok(())
}

// ─── Workflow ───────────────────────────────────────────────────────────────

fn incorrect_details() -> ServiceError {
    ServiceError::Unauthorized("incorrect details".into())
}

fn issue_token(
    issuer: &TokenIssuer,
    user_id: u64,
    username: String,
) -> Result<AuthResponse, ServiceError> {
    let claims = SessionClaims { user_id, username };
    let token = issuer.sign(&claims).map_err(|e| {
        tracing::error!(user_id, "failed to sign session token: {e}");
        ServiceError::Internal("failed to get auth token".into())
    })?;
    Ok(AuthResponse { token })
}

/// Create an account and return a session token for it.
pub fn register<S: AccountStore + ?Sized>(
    store: &S,
    hasher: &CredentialHasher,
    issuer: &TokenIssuer,
    req: &AuthRequest,
) -> Result<AuthResponse, ServiceError> {
    let username = validate_username(&req.username)?;
    validate_password(&req.password)?;
    tracing::info!(%username, "registering user");

    let password = hasher.hash(&req.password).map_err(|e| {
        tracing::error!(kind = ?e.kind(), "failed to hash password: {e}");
        ServiceError::Internal("failed to register".into())
    })?;

    let user_id = match store.insert_user(&username, &password) {
        Ok(id) => id,
        Err(StoreError::UsernameTaken) => {
            return Err(ServiceError::Conflict("User already exists".into()));
        }
        Err(e) => return Err(ServiceError::from_db("insert user")(e)),
    };

    if user_id == 0 {
        tracing::error!(%username, "store returned no id after insert");
        return Err(ServiceError::Internal(
            "failed to get user id, try login".into(),
        ));
    }

    issue_token(issuer, user_id, username)
}

/// Check credentials and return a session token.
///
/// Unknown usernames and wrong passwords produce the same error, and the
/// unknown-user path still spends one hash so the two take similar time.
pub fn login<S: AccountStore + ?Sized>(
    store: &S,
    hasher: &CredentialHasher,
    issuer: &TokenIssuer,
    req: &AuthRequest,
) -> Result<AuthResponse, ServiceError> {
    let username = req.username.trim();
    let Some(user) = store
        .find_user(username)
        .map_err(ServiceError::from_db("find user"))?
    else {
        let _ = hasher.hash(&req.password);
        tracing::info!(%username, "login rejected: unknown user");
        return Err(incorrect_details());
    };

    let matched = credential::verify(&req.password, &user.password).map_err(|e| {
        tracing::error!(user_id = user.id, kind = ?e.kind(), "stored credential unusable: {e}");
        ServiceError::Internal("failed to login".into())
    })?;
    if !matched {
        tracing::info!(user_id = user.id, "login rejected: wrong password");
        return Err(incorrect_details());
    }

    issue_token(issuer, user.id, user.username)
}

/// Resolve an `Authorization` header value into session claims.
///
/// Accepts `Bearer <token>` or the bare token.
pub fn authenticate(
    issuer: &TokenIssuer,
    authorization: Option<&str>,
) -> Result<SessionClaims, ServiceError> {
    let raw = authorization
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("missing Authorization header".into()))?;
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw).trim();

    issuer.verify(token).map_err(|e| {
        tracing::debug!(kind = ?e.kind(), "rejected session token: {e}");
        ServiceError::Unauthorized("invalid token".into())
    })
}
