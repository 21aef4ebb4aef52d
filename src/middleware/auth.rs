use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::{
    AppState,
    error::AppError,
    utils::{Claims, OptionalClaims, verify_token},
};

fn claims_from_request(req: &Request<Body>, state: &AppState) -> Option<Claims> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))?;

    verify_token(token, &state.config).ok()
}

/// Decodes the bearer token when one is present and exposes the result as an
/// `OptionalClaims` extension. Never rejects; endpoints that require a login
/// extract `Claims` instead.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let claims = claims_from_request(&req, &state);
    req.extensions_mut().insert(OptionalClaims(claims));
    next.run(req).await
}

/// Extracting `Claims` directly enforces authentication: missing or invalid
/// tokens reject with 401 before the handler runs.
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<OptionalClaims>()
            .and_then(|identity| identity.0.clone())
            .ok_or(AppError::Unauthorized)
    }
}
