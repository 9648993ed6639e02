//! Auth Router

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::application::AuthService;
use crate::domain::collaborator::{EmailSender, GeoLookup};
use crate::domain::repository::AuthStore;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::{require_admin, require_session};

/// Create the Auth router for any store and collaborator implementation
///
/// Mount under `/api/auth`. Serve with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the socket
/// address is available when no proxy header is present.
pub fn auth_router<R, M, G>(service: Arc<AuthService<R, M, G>>) -> Router
where
    R: AuthStore,
    M: EmailSender + Sync + 'static,
    G: GeoLookup + Sync + 'static,
{
    let state = AuthAppState { service };

    let public = Router::new()
        .route("/register", post(handlers::register::<R, M, G>))
        .route("/login", post(handlers::login::<R, M, G>))
        .route("/logout", post(handlers::logout::<R, M, G>))
        .route("/verify", get(handlers::verify::<R, M, G>))
        .route("/refresh", post(handlers::refresh::<R, M, G>))
        .route("/second-factor", post(handlers::second_factor::<R, M, G>))
        .route("/recover-user", post(handlers::recover_user::<R, M, G>))
        .route("/recover-password", post(handlers::recover_password::<R, M, G>))
        .route("/reset-password", post(handlers::reset_password::<R, M, G>));

    let authenticated = Router::new()
        .route("/sessions", get(handlers::my_sessions::<R, M, G>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session::<R, M, G>,
        ));

    let admin = Router::new()
        .route("/logout-all/{account_id}", post(handlers::logout_all::<R, M, G>))
        .route("/roles", put(handlers::assign_role::<R, M, G>))
        .route("/accounts", get(handlers::list_accounts::<R, M, G>))
        .route(
            "/accounts/{account_id}",
            get(handlers::get_account::<R, M, G>)
                .put(handlers::update_account::<R, M, G>)
                .delete(handlers::delete_account::<R, M, G>),
        )
        .route("/sessions/all", get(handlers::all_sessions::<R, M, G>))
        .route("/sessions/force-logout", post(handlers::force_logout::<R, M, G>))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_admin::<R, M, G>,
        ));

    public.merge(authenticated).merge(admin).with_state(state)
}
