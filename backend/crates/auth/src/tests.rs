//! Service-level and HTTP tests for the auth crate
//!
//! Everything runs against the in-memory store, recording mailer and a
//! static geolocation answer, with a manual clock.

mod support {
    use std::net::IpAddr;
    use std::sync::Arc;

    use chrono::Utc;
    use platform::client::RequestOrigin;

    use crate::application::{AuthConfig, AuthService, SignInInput, SignUpInput};
    use crate::domain::clock::ManualClock;
    use crate::domain::value_object::Location;
    use crate::infra::{InMemoryAuthStore, RecordingEmailSender, StaticGeoLookup};

    pub type TestService = AuthService<InMemoryAuthStore, RecordingEmailSender, StaticGeoLookup>;

    pub struct Harness {
        pub service: Arc<TestService>,
        pub store: Arc<InMemoryAuthStore>,
        pub mailer: Arc<RecordingEmailSender>,
        pub clock: Arc<ManualClock>,
    }

    pub fn harness_with(config: AuthConfig) -> Harness {
        let store = Arc::new(InMemoryAuthStore::new());
        let mailer = Arc::new(RecordingEmailSender::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let geo = Arc::new(StaticGeoLookup::new(Location {
            city: "Lisbon".to_string(),
            region: "Lisboa".to_string(),
            country: "PT".to_string(),
            latitude: Some(38.72),
            longitude: Some(-9.14),
            timezone: Some("Europe/Lisbon".to_string()),
        }));
        let service = Arc::new(AuthService::new(
            store.clone(),
            mailer.clone(),
            geo,
            Arc::new(config),
            clock.clone(),
        ));

        Harness {
            service,
            store,
            mailer,
            clock,
        }
    }

    pub fn harness() -> Harness {
        harness_with(AuthConfig {
            reset_link_base: "https://pos.example.com/reset-password".to_string(),
            ..AuthConfig::development()
        })
    }

    pub fn jane() -> SignUpInput {
        SignUpInput {
            name: "Jane".to_string(),
            email: "jane@x.com".to_string(),
            password: "Sup3r$ecret".to_string(),
            role: None,
        }
    }

    pub fn credentials(email: &str, password: &str) -> SignInInput {
        SignInInput {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    pub fn origin(ip: &str) -> RequestOrigin {
        RequestOrigin::new(
            Some(ip.parse::<IpAddr>().unwrap()),
            Some("PosTerminal/2.1".to_string()),
        )
    }
}

mod service_tests {
    use chrono::Duration;

    use super::support::*;
    use crate::application::{AccountChanges, SignUpInput, TokenError, TokenIssuer};
    use crate::domain::clock::Clock;
    use crate::domain::value_object::{AccountId, AccountRole};
    use crate::error::AuthError;

    #[tokio::test]
    async fn test_end_to_end_single_session_scenario() {
        let h = harness();
        h.service.register(jane()).await.unwrap();

        let first = h
            .service
            .login(credentials("jane@x.com", "Sup3r$ecret"), &origin("203.0.113.7"))
            .await
            .unwrap();
        assert!(!first.requires_second_factor);
        assert_eq!(first.session.location.city, "Lisbon");
        assert_eq!(first.session.ip_address.as_deref(), Some("203.0.113.7"));
        assert!(h.service.sessions().find_by_token(&first.token).await.unwrap().is_some());

        let blocked = h
            .service
            .login(credentials("jane@x.com", "Sup3r$ecret"), &origin("198.51.100.20"))
            .await
            .unwrap_err();
        match blocked {
            AuthError::SessionConflict(sessions) => {
                assert_eq!(sessions.len(), 1);
                assert_eq!(sessions[0].session_id, first.session.session_id);
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        h.service.logout(&first.token).await.unwrap();
        assert!(h.service.sessions().find_by_token(&first.token).await.unwrap().is_none());
        // the signature alone still verifies; only the session is gone
        let issuer = TokenIssuer::new(&h.service.config().token_secret);
        assert!(issuer.decode(&first.token, h.clock.now()).is_ok());

        let second = h
            .service
            .login(credentials("jane@x.com", "Sup3r$ecret"), &origin("198.51.100.20"))
            .await
            .unwrap();
        assert_ne!(second.token, first.token);
    }

    #[tokio::test]
    async fn test_register_twice_is_conflict() {
        let h = harness();
        h.service.register(jane()).await.unwrap();
        assert!(matches!(
            h.service.register(jane()).await,
            Err(AuthError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn test_register_reports_every_problem() {
        let h = harness();
        let err = h
            .service
            .register(SignUpInput {
                name: "J".to_string(),
                email: "not-an-email".to_string(),
                password: "password".to_string(),
                role: Some("superuser".to_string()),
            })
            .await
            .unwrap_err();

        match err {
            AuthError::Validation(errors) => {
                assert_eq!(errors.len(), 5, "{errors:?}");
                assert!(errors.iter().any(|e| e.contains("superuser")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_accepts_legacy_role_codes() {
        let h = harness();
        let id = h
            .service
            .register(SignUpInput {
                role: Some("visitante".to_string()),
                ..jane()
            })
            .await
            .unwrap();
        assert_eq!(h.service.get_account(id).await.unwrap().role, AccountRole::Viewer);
    }

    #[tokio::test]
    async fn test_unknown_email_and_wrong_password_look_identical() {
        let h = harness();
        h.service.register(jane()).await.unwrap();

        let wrong_password = h
            .service
            .login(credentials("jane@x.com", "Wr0ng$ecret"), &origin("203.0.113.7"))
            .await
            .unwrap_err();
        let unknown_email = h
            .service
            .login(credentials("ghost@x.com", "Sup3r$ecret"), &origin("203.0.113.7"))
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
        assert_eq!(wrong_password.kind(), unknown_email.kind());
    }

    #[tokio::test]
    async fn test_verify_session_warns_near_expiry() {
        let h = harness();
        h.service.register(jane()).await.unwrap();
        let login = h
            .service
            .login(credentials("jane@x.com", "Sup3r$ecret"), &origin("203.0.113.7"))
            .await
            .unwrap();

        let fresh = h.service.verify_session(&login.token).await.unwrap();
        assert!(fresh.valid);
        assert!(!fresh.expiring_soon);

        h.clock.advance(Duration::minutes(55));
        let soon = h.service.verify_session(&login.token).await.unwrap();
        assert!(soon.valid);
        assert!(soon.expiring_soon);
        assert_eq!(soon.remaining_seconds, Some(300));

        h.clock.advance(Duration::minutes(5));
        let expired = h.service.verify_session(&login.token).await.unwrap();
        assert!(!expired.valid);
        assert_eq!(expired.message, "Session is not active");

        let garbage = h.service.verify_session("garbage").await.unwrap();
        assert!(!garbage.valid);
        assert_ne!(garbage.message, expired.message);
    }

    #[tokio::test]
    async fn test_refresh_moves_expiry() {
        let h = harness();
        h.service.register(jane()).await.unwrap();
        let login = h
            .service
            .login(credentials("jane@x.com", "Sup3r$ecret"), &origin("203.0.113.7"))
            .await
            .unwrap();

        h.clock.advance(Duration::minutes(50));
        let refreshed = h.service.refresh_session(&login.token).await.unwrap();
        assert_eq!(refreshed.expires_at, h.clock.now() + Duration::hours(1));

        h.clock.advance(Duration::minutes(50));
        assert!(h.service.verify_session(&login.token).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_second_factor_stub() {
        let h = harness();
        let id = h.service.register(jane()).await.unwrap();
        h.service
            .update_account(
                id,
                AccountChanges {
                    two_factor_enabled: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let login = h
            .service
            .login(credentials("jane@x.com", "Sup3r$ecret"), &origin("203.0.113.7"))
            .await
            .unwrap();
        assert!(login.requires_second_factor);
        assert!(matches!(
            h.service.authorize(&login.token, &AccountRole::ALL).await,
            Err(AuthError::SecondFactorRequired)
        ));
        assert!(matches!(
            h.service.refresh_session(&login.token).await,
            Err(AuthError::SecondFactorRequired)
        ));

        assert!(matches!(
            h.service.verify_second_factor(&login.token, "000000").await,
            Err(AuthError::InvalidSecondFactorCode)
        ));
        h.service
            .verify_second_factor(&login.token, "123456")
            .await
            .unwrap();

        let principal = h
            .service
            .authorize(&login.token, &AccountRole::ALL)
            .await
            .unwrap();
        assert_eq!(principal.account.id, id);
    }

    #[tokio::test]
    async fn test_authorize_rereads_role() {
        let h = harness();
        let id = h.service.register(jane()).await.unwrap();
        let login = h
            .service
            .login(credentials("jane@x.com", "Sup3r$ecret"), &origin("203.0.113.7"))
            .await
            .unwrap();

        assert!(matches!(
            h.service.authorize(&login.token, &[AccountRole::Admin]).await,
            Err(AuthError::Forbidden)
        ));

        h.service.assign_role(id, "admin").await.unwrap();
        h.service
            .authorize(&login.token, &[AccountRole::Admin])
            .await
            .unwrap();

        assert!(matches!(
            h.service.assign_role(id, "owner").await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            h.service.assign_role(AccountId::new(999), "viewer").await,
            Err(AuthError::AccountNotFound)
        ));
    }

    #[tokio::test]
    async fn test_logout_all_and_force_logout() {
        let h = harness_with(crate::application::AuthConfig {
            allow_multiple_sessions: true,
            ..crate::application::AuthConfig::development()
        });
        let id = h.service.register(jane()).await.unwrap();
        for ip in ["203.0.113.7", "203.0.113.8"] {
            h.service
                .login(credentials("jane@x.com", "Sup3r$ecret"), &origin(ip))
                .await
                .unwrap();
        }
        assert_eq!(h.service.get_active_sessions(id).await.unwrap().len(), 2);

        assert_eq!(h.service.logout_all(id).await.unwrap(), 2);
        assert!(h.service.get_active_sessions(id).await.unwrap().is_empty());

        h.service
            .login(credentials("jane@x.com", "Sup3r$ecret"), &origin("203.0.113.9"))
            .await
            .unwrap();
        assert_eq!(h.service.list_all_active_sessions().await.unwrap().len(), 1);
        assert_eq!(h.service.force_logout_everyone().await.unwrap(), 1);
        assert!(h.service.list_all_active_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_account_validates_and_enforces_unique_email() {
        let h = harness();
        let jane_id = h.service.register(jane()).await.unwrap();
        h.service
            .register(SignUpInput {
                name: "John".to_string(),
                email: "john@x.com".to_string(),
                ..jane()
            })
            .await
            .unwrap();

        assert!(matches!(
            h.service
                .update_account(
                    jane_id,
                    AccountChanges {
                        name: Some("J".to_string()),
                        password: Some("short".to_string()),
                        ..Default::default()
                    },
                )
                .await,
            Err(AuthError::Validation(errors)) if errors.len() == 2
        ));

        assert!(matches!(
            h.service
                .update_account(
                    jane_id,
                    AccountChanges {
                        email: Some("john@x.com".to_string()),
                        ..Default::default()
                    },
                )
                .await,
            Err(AuthError::EmailTaken)
        ));

        let view = h
            .service
            .update_account(
                jane_id,
                AccountChanges {
                    name: Some("Jane Doe".to_string()),
                    password: Some("N3w$ecretPass".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(view.name, "Jane Doe");
        h.service
            .login(credentials("jane@x.com", "N3w$ecretPass"), &origin("203.0.113.7"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_account_closes_sessions() {
        let h = harness();
        let id = h.service.register(jane()).await.unwrap();
        let login = h
            .service
            .login(credentials("jane@x.com", "Sup3r$ecret"), &origin("203.0.113.7"))
            .await
            .unwrap();

        h.service.delete_account(id).await.unwrap();
        assert!(!h.service.verify_session(&login.token).await.unwrap().valid);
        assert!(matches!(
            h.service.delete_account(id).await,
            Err(AuthError::AccountNotFound)
        ));
        assert!(h.service.list_accounts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reset_token_single_use_and_expiry() {
        let h = harness();
        h.service.register(jane()).await.unwrap();

        h.service.recover_password("jane@x.com").await.unwrap();
        let token = h.mailer.sent()[0]
            .body
            .lines()
            .find_map(|l| l.strip_prefix("https://pos.example.com/reset-password/"))
            .unwrap()
            .to_string();

        h.service.reset_password(&token, "N3w$ecretPass").await.unwrap();
        assert!(matches!(
            h.service.reset_password(&token, "An0ther$ecret").await,
            Err(AuthError::ResetTokenNotFound)
        ));

        h.service.recover_password("jane@x.com").await.unwrap();
        let late = h.mailer.sent().last().unwrap().body.clone();
        let late = late
            .lines()
            .find_map(|l| l.strip_prefix("https://pos.example.com/reset-password/"))
            .unwrap()
            .to_string();
        h.clock.advance(Duration::minutes(31));
        assert!(matches!(
            h.service.reset_password(&late, "An0ther$ecret").await,
            Err(AuthError::Token(TokenError::Expired))
        ));

        h.service
            .login(credentials("jane@x.com", "N3w$ecretPass"), &origin("203.0.113.7"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_maintenance_sweeps_sessions_and_reset_tokens() {
        let h = harness();
        h.service.register(jane()).await.unwrap();
        h.service
            .login(credentials("jane@x.com", "Sup3r$ecret"), &origin("203.0.113.7"))
            .await
            .unwrap();
        h.service.recover_password("jane@x.com").await.unwrap();

        h.clock.advance(Duration::hours(2));
        let report = h.service.run_maintenance().await.unwrap();
        assert_eq!(report.sessions_closed, 1);
        assert_eq!(report.reset_tokens_deleted, 1);
        assert_eq!(h.store.reset_token_count(), 0);
        assert_eq!(h.store.session_count(), 1);
    }
}

mod race_tests {
    use std::sync::Arc;

    use tokio::sync::Barrier;

    use super::support::*;
    use crate::domain::repository::AccountRepository;
    use crate::domain::value_object::ClientContext;
    use crate::error::AuthError;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_logins_create_at_most_one_session() {
        let h = harness();
        let id = h.service.register(jane()).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let service = h.service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .login(
                        credentials("jane@x.com", "Sup3r$ecret"),
                        &origin(&format!("203.0.113.{}", i + 1)),
                    )
                    .await
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(AuthError::SessionConflict(sessions)) => assert!(!sessions.is_empty()),
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(h.service.get_active_sessions(id).await.unwrap().len(), 1);
    }

    // No pre-check here: the exclusive insert alone must hold the line
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registry_creates_keep_one_live_session() {
        let h = harness();
        let id = h.service.register(jane()).await.unwrap();
        let account = h.store.find_account_by_id(id).await.unwrap().unwrap();

        let barrier = Arc::new(Barrier::new(8));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = h.service.clone();
            let account = account.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                barrier.wait().await;
                service
                    .sessions()
                    .create(&account, ClientContext::default())
                    .await
            }));
        }

        let mut created = 0;
        let mut blocked = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(AuthError::SessionConflict(sessions)) => {
                    assert_eq!(sessions.len(), 1);
                    blocked += 1;
                }
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!((created, blocked), (1, 7));
        assert_eq!(h.store.session_count(), 1);
    }
}

mod http_tests {
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::support::*;
    use crate::presentation::auth_router;

    fn app(h: &Harness) -> Router {
        Router::new().nest("/api/auth", auth_router(h.service.clone()))
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn with_token(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_login_conflict_logout_over_http() {
        let h = harness();
        let app = app(&h);

        let (status, body) = call(
            &app,
            post_json(
                "/api/auth/register",
                json!({"name": "Jane", "email": "jane@x.com", "password": "Sup3r$ecret"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["accountId"], 1);

        let login = json!({"email": "jane@x.com", "password": "Sup3r$ecret"});
        let (status, body) = call(&app, post_json("/api/auth/login", login.clone())).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap().to_string();
        assert_eq!(body["session"]["ipAddress"], "203.0.113.7");

        let (status, body) = call(&app, post_json("/api/auth/login", login.clone())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["details"]["activeSessions"].as_array().unwrap().len(), 1);

        let (status, body) = call(&app, with_token("GET", "/api/auth/verify", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["valid"], true);

        let (status, body) = call(&app, with_token("GET", "/api/auth/sessions", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = call(&app, with_token("POST", "/api/auth/logout", &token)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = call(&app, with_token("POST", "/api/auth/logout", &token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, post_json("/api/auth/login", login)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_validation_errors_are_listed() {
        let h = harness();
        let app = app(&h);

        let (status, body) = call(
            &app,
            post_json(
                "/api/auth/register",
                json!({"name": "", "email": "bad", "password": "123"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["details"]["errors"].as_array().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn test_admin_routes_require_admin() {
        let h = harness();
        let app = app(&h);

        let (status, _) = call(
            &app,
            Request::get("/api/auth/accounts").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        for (name, email, role) in [("Ada", "ada@x.com", "admin"), ("Jane", "jane@x.com", "user")] {
            call(
                &app,
                post_json(
                    "/api/auth/register",
                    json!({"name": name, "email": email, "password": "Sup3r$ecret", "role": role}),
                ),
            )
            .await;
        }

        let (_, body) = call(
            &app,
            post_json(
                "/api/auth/login",
                json!({"email": "jane@x.com", "password": "Sup3r$ecret"}),
            ),
        )
        .await;
        let user_token = body["token"].as_str().unwrap().to_string();
        let (status, _) = call(&app, with_token("GET", "/api/auth/accounts", &user_token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = call(
            &app,
            post_json(
                "/api/auth/login",
                json!({"email": "ada@x.com", "password": "Sup3r$ecret"}),
            ),
        )
        .await;
        let admin_token = body["token"].as_str().unwrap().to_string();
        let (status, body) = call(&app, with_token("GET", "/api/auth/accounts", &admin_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert!(body[0].get("passwordHash").is_none());

        let (status, body) =
            call(&app, with_token("GET", "/api/auth/sessions/all", &admin_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let (status, body) = call(
            &app,
            with_token("POST", "/api/auth/sessions/force-logout", &admin_token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionsClosed"], 2);
    }

    #[tokio::test]
    async fn test_recover_password_is_generic() {
        let h = harness();
        h.service.register(jane()).await.unwrap();
        let app = app(&h);

        let (_, known) = call(
            &app,
            post_json("/api/auth/recover-password", json!({"email": "jane@x.com"})),
        )
        .await;
        let (status, unknown) = call(
            &app,
            post_json("/api/auth/recover-password", json!({"email": "ghost@x.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(known, unknown);
        assert_eq!(h.mailer.sent().len(), 1);
    }
}
