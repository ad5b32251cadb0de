use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::session::Session;

/// Token from `Authorization: Bearer <token>`.
pub fn bearer_token(parts: &axum::http::HeaderMap) -> Option<&str> {
    parts
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Auth guard: restores the caller's session or rejects the request.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?
        .to_string();

    let session = state
        .sessions
        .restore(&token)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown session token".to_string()))?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

/// The session restored by [`require_session`].
pub struct CurrentSession(pub Session);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .map(CurrentSession)
            .ok_or_else(|| AppError::Unauthorized("No session on request".to_string()))
    }
}
