//! HTTP Handlers

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::extract::{ConnectInfo, Extension, FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use platform::client::RequestOrigin;

use crate::application::{
    AccountChanges, AuthService, LoginOutput, Principal, SessionStatus, SignInInput, SignUpInput,
};
use crate::domain::collaborator::{EmailSender, GeoLookup};
use crate::domain::entity::{AccountView, SessionSummary};
use crate::domain::repository::AuthStore;
use crate::domain::value_object::AccountId;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    AssignRoleRequest, EmailRequest, LoginRequest, MessageResponse, RegisterRequest,
    RegisterResponse, ResetPasswordRequest, SecondFactorRequest, SessionsClosedResponse,
    UpdateAccountRequest,
};

/// Shared state for auth handlers
pub struct AuthAppState<R, M, G>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    pub service: Arc<AuthService<R, M, G>>,
}

// Manual impl: only the Arc is cloned
impl<R, M, G> Clone for AuthAppState<R, M, G>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// Token from `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(&parts.headers)
            .map(|token| BearerToken(token.to_string()))
            .ok_or(AuthError::MissingToken)
    }
}

/// Caller IP and User-Agent; the socket address is used when the server
/// was started with connect info
pub struct ClientOrigin(pub RequestOrigin);

impl<S> FromRequestParts<S> for ClientOrigin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let direct_ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip());
        Ok(ClientOrigin(RequestOrigin::from_headers(&parts.headers, direct_ip)))
    }
}

// ============================================================================
// Register / Login
// ============================================================================

/// POST /api/auth/register
pub async fn register<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    Json(req): Json<RegisterRequest>,
) -> AuthResult<impl IntoResponse>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    let account_id = state
        .service
        .register(SignUpInput {
            name: req.name,
            email: req.email,
            password: req.password,
            role: req.role,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { account_id })))
}

/// POST /api/auth/login
pub async fn login<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    ClientOrigin(origin): ClientOrigin,
    Json(req): Json<LoginRequest>,
) -> AuthResult<Json<LoginOutput>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    let output = state
        .service
        .login(
            SignInInput {
                email: req.email,
                password: req.password,
            },
            &origin,
        )
        .await?;

    Ok(Json(output))
}

/// POST /api/auth/second-factor
pub async fn second_factor<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    BearerToken(token): BearerToken,
    Json(req): Json<SecondFactorRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    state.service.verify_second_factor(&token, &req.code).await?;
    Ok(Json(MessageResponse::new("Second factor verified")))
}

// ============================================================================
// Session
// ============================================================================

/// POST /api/auth/logout
pub async fn logout<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    BearerToken(token): BearerToken,
) -> AuthResult<StatusCode>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    state.service.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/verify
///
/// Always 200 for a present token; the body says whether it is valid.
pub async fn verify<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    BearerToken(token): BearerToken,
) -> AuthResult<Json<SessionStatus>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    Ok(Json(state.service.verify_session(&token).await?))
}

/// POST /api/auth/refresh
pub async fn refresh<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    BearerToken(token): BearerToken,
) -> AuthResult<Json<SessionSummary>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    Ok(Json(state.service.refresh_session(&token).await?))
}

/// GET /api/auth/sessions (own sessions)
pub async fn my_sessions<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    Extension(principal): Extension<Principal>,
) -> AuthResult<Json<Vec<SessionSummary>>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    Ok(Json(
        state
            .service
            .get_active_sessions(principal.account.id)
            .await?,
    ))
}

// ============================================================================
// Recovery
// ============================================================================

/// POST /api/auth/recover-user
pub async fn recover_user<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    Json(req): Json<EmailRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    state.service.recover_user(&req.email).await?;
    Ok(Json(MessageResponse::new("Username sent to the registered email")))
}

/// POST /api/auth/recover-password
pub async fn recover_password<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    Json(req): Json<EmailRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    let message = state.service.recover_password(&req.email).await?;
    Ok(Json(MessageResponse::new(message)))
}

/// POST /api/auth/reset-password
pub async fn reset_password<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    Json(req): Json<ResetPasswordRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    state
        .service
        .reset_password(&req.token, &req.new_password)
        .await?;
    Ok(Json(MessageResponse::new("Password updated")))
}

// ============================================================================
// Administration (admin role enforced by middleware)
// ============================================================================

/// POST /api/auth/logout-all/{account_id}
pub async fn logout_all<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    Path(account_id): Path<i64>,
) -> AuthResult<Json<SessionsClosedResponse>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    let sessions_closed = state.service.logout_all(AccountId::new(account_id)).await?;
    Ok(Json(SessionsClosedResponse { sessions_closed }))
}

/// POST /api/auth/sessions/force-logout
pub async fn force_logout<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    Extension(principal): Extension<Principal>,
) -> AuthResult<Json<SessionsClosedResponse>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    tracing::warn!(account_id = %principal.account.id, "Force logout requested");
    let sessions_closed = state.service.force_logout_everyone().await?;
    Ok(Json(SessionsClosedResponse { sessions_closed }))
}

/// GET /api/auth/sessions/all
pub async fn all_sessions<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
) -> AuthResult<Json<Vec<SessionSummary>>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    Ok(Json(state.service.list_all_active_sessions().await?))
}

/// PUT /api/auth/roles
pub async fn assign_role<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    Json(req): Json<AssignRoleRequest>,
) -> AuthResult<Json<MessageResponse>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    state.service.assign_role(req.account_id, &req.role).await?;
    Ok(Json(MessageResponse::new("Role updated")))
}

/// GET /api/auth/accounts
pub async fn list_accounts<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
) -> AuthResult<Json<Vec<AccountView>>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    Ok(Json(state.service.list_accounts().await?))
}

/// GET /api/auth/accounts/{account_id}
pub async fn get_account<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    Path(account_id): Path<i64>,
) -> AuthResult<Json<AccountView>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    Ok(Json(state.service.get_account(AccountId::new(account_id)).await?))
}

/// PUT /api/auth/accounts/{account_id}
pub async fn update_account<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    Path(account_id): Path<i64>,
    Json(req): Json<UpdateAccountRequest>,
) -> AuthResult<Json<AccountView>>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    let changes = AccountChanges {
        name: req.name,
        email: req.email,
        password: req.password,
        role: req.role,
        two_factor_enabled: req.two_factor_enabled,
    };
    Ok(Json(
        state
            .service
            .update_account(AccountId::new(account_id), changes)
            .await?,
    ))
}

/// DELETE /api/auth/accounts/{account_id}
pub async fn delete_account<R, M, G>(
    State(state): State<AuthAppState<R, M, G>>,
    Path(account_id): Path<i64>,
) -> AuthResult<StatusCode>
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    state.service.delete_account(AccountId::new(account_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("bearer  xyz "));
        assert_eq!(bearer_token(&headers), Some("xyz"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
