use axum::Extension;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use auditvault_core::{AppError, CallerIdentity};
use auditvault_domain::Role;

use crate::auth::bearer_token;
use crate::error::ApiResult;
use crate::state::AppState;

/// Role a route group requires; any one of the caller's roles matching
/// admits the request.
#[derive(Debug, Clone, Copy)]
pub struct RequiredRole(pub Role);

/// Verifies the bearer token and attaches the caller identity.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("authorization header is required".to_owned()))?;

    let claims = state.authenticator.verify(bearer_token(header_value)?)?;
    request
        .extensions_mut()
        .insert(CallerIdentity::from(claims));

    Ok(next.run(request).await)
}

/// Gates a route group on the role its router declares.
pub async fn require_role(
    Extension(RequiredRole(role)): Extension<RequiredRole>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    let caller = request
        .extensions()
        .get::<CallerIdentity>()
        .ok_or_else(|| AppError::Unauthorized("no authentication found".to_owned()))?;

    if !role.granted_by(caller.roles()) {
        return Err(AppError::Forbidden("insufficient permissions".to_owned()).into());
    }

    Ok(next.run(request).await)
}
