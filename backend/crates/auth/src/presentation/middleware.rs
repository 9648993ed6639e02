//! Auth Middleware
//!
//! Bearer-token checks for protected routes. On success the resolved
//! [`Principal`] is stored in the request extensions for handlers.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::domain::collaborator::{EmailSender, GeoLookup};
use crate::domain::repository::AuthStore;
use crate::domain::value_object::AccountRole;
use crate::error::AuthError;
use crate::presentation::handlers::{AuthAppState, bearer_token};

/// Owned copy of the bearer token; the request body is not `Sync`, so no
/// borrow of the request may live across an await
fn request_token(req: &Request) -> Result<String, AuthError> {
    bearer_token(req.headers())
        .map(str::to_string)
        .ok_or(AuthError::MissingToken)
}

/// Middleware that requires a live, fully verified session of any role
pub async fn require_session<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    let token = request_token(&req)?;
    let principal = state.service.authorize(&token, &AccountRole::ALL).await?;
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}

/// Middleware that requires a live session of an admin account
pub async fn require_admin<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    let token = request_token(&req)?;
    let principal = state.service.authorize(&token, &[AccountRole::Admin]).await?;
    tracing::debug!(account_id = %principal.account.id, "Admin request authorized");
    req.extensions_mut().insert(principal);
    Ok(next.run(req).await)
}
