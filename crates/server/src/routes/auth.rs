use axum::{
    Json,
    extract::{FromRef, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts},
};
use watcharr_api::{AuthRequest, AuthResponse, ServiceError, VerifyResponse, service};
use watcharr_core::{SessionClaims, TokenIssuer};

use crate::AppState;
use crate::error::ApiErr;

// ---------------------------------------------------------------------------
// Auth extractor
// ---------------------------------------------------------------------------

/// Claims of a valid session token from the `Authorization` header.
pub struct AuthUser(pub SessionClaims);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    TokenIssuer: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let issuer = TokenIssuer::from_ref(state);
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        Ok(AuthUser(service::authenticate(&issuer, header)?))
    }
}

/// Run CPU-heavy auth work (Argon2) off the async executor.
async fn blocking<T, F>(work: F) -> Result<T, ApiErr>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(ApiErr::from_db("auth task"))?
        .map_err(ApiErr::from)
}

// ---------------------------------------------------------------------------
// Register / login
// ---------------------------------------------------------------------------

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ApiErr> {
    let AppState { db, hasher, issuer } = state;
    blocking(move || service::register(&db, &hasher, &issuer, &req))
        .await
        .map(Json)
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<AuthRequest>,
) -> Result<Json<AuthResponse>, ApiErr> {
    let AppState { db, hasher, issuer } = state;
    blocking(move || service::login(&db, &hasher, &issuer, &req))
        .await
        .map(Json)
}

// ---------------------------------------------------------------------------
// Verify
// ---------------------------------------------------------------------------

/// GET /api/auth/verify — echo the claims of the presented token.
pub async fn verify(AuthUser(claims): AuthUser) -> Json<VerifyResponse> {
    Json(claims.into())
}
