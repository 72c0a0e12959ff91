//! Login, logout and the cached user profile
//!
//! The token pair belongs to the gateway; this layer adds the user profile
//! returned at login, stored as JSON under `auth_user` so a later run can
//! tell who is logged in without a backend call.

use std::sync::Arc;

use common::Secret;
use guest_auth::{LoginRequest, USER_KEY};
use guest_gateway::{Gateway, SessionEvent, SessionSignal};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::AuthUser;

/// Authentication state on top of a [`Gateway`].
#[derive(Clone)]
pub struct AuthSession {
    gateway: Arc<Gateway>,
}

impl AuthSession {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Log in, store the token pair and cache the user profile.
    pub async fn login(&self, username: &str, password: &Secret<String>) -> Result<AuthUser> {
        let response = guest_auth::login(
            self.gateway.http_client(),
            self.gateway.base_url(),
            &LoginRequest {
                username,
                password: password.expose(),
            },
        )
        .await?;

        self.gateway
            .set_tokens(&response.token, &response.refresh)
            .await?;
        let user = response.user;
        let cached = serde_json::to_string(&user)
            .map_err(|e| Error::Decode(format!("serializing user profile: {e}")))?;
        self.gateway
            .store()
            .set(USER_KEY, cached)
            .await
            .map_err(guest_gateway::Error::from)?;
        info!(username = %user.username, role = ?user.role, "logged in");
        Ok(user)
    }

    /// Drop tokens and the cached profile.
    pub async fn logout(&self) -> Result<()> {
        self.gateway.clear_tokens().await?;
        self.gateway
            .store()
            .remove(USER_KEY)
            .await
            .map_err(guest_gateway::Error::from)?;
        info!("logged out");
        Ok(())
    }

    /// Restore the logged-in user from storage.
    ///
    /// `None` unless both an access token and a readable profile are stored.
    /// An unreadable profile wipes the session.
    pub async fn current_user(&self) -> Result<Option<AuthUser>> {
        let store = self.gateway.store();
        let (Some(_), Some(raw)) = (store.access_token().await, store.get(USER_KEY).await) else {
            return Ok(None);
        };
        match serde_json::from_str::<AuthUser>(&raw) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "cached user profile unreadable, clearing session");
                self.logout().await?;
                Ok(None)
            }
        }
    }

    /// Remove the cached profile whenever the gateway ends the session.
    ///
    /// The task exits once every sender of `signal` is dropped.
    pub fn watch_session_end(&self, signal: &SessionSignal) -> JoinHandle<()> {
        let mut events = signal.subscribe();
        let store = self.gateway.store().clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Ended) => {
                        debug!("session ended, dropping cached user");
                        if let Err(e) = store.remove(USER_KEY).await {
                            warn!(error = %e, "failed to drop cached user");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "session listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use guest_auth::{LOGIN_PATH, REFRESH_PATH, TokenStore, UserRole};
    use std::time::Duration;
    use tokio::net::TcpListener;

    async fn start_backend() -> String {
        let app = axum::Router::new()
            .route(
                LOGIN_PATH,
                post(|Json(body): Json<serde_json::Value>| async move {
                    if body["password"] != "secret" {
                        return (
                            StatusCode::BAD_REQUEST,
                            Json(serde_json::json!({"detail": "Invalid username or password."})),
                        )
                            .into_response();
                    }
                    Json(serde_json::json!({
                        "token": "A1",
                        "refresh": "R1",
                        "user": {"id": "s-1", "username": body["username"], "role": "SUPERUSER"}
                    }))
                    .into_response()
                }),
            )
            .route(
                REFRESH_PATH,
                post(|| async { (StatusCode::UNAUTHORIZED, "token_not_valid") }),
            )
            .route(
                "/api/qr-requests/all/",
                get(|| async { StatusCode::UNAUTHORIZED }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn session(base_url: &str) -> (AuthSession, Arc<Gateway>, SessionSignal) {
        let signal = SessionSignal::new();
        let gateway = Arc::new(Gateway::new(
            reqwest::Client::new(),
            base_url,
            Arc::new(TokenStore::in_memory()),
            signal.clone(),
        ));
        (AuthSession::new(gateway.clone()), gateway, signal)
    }

    #[tokio::test]
    async fn login_stores_tokens_and_profile() {
        let (session, gateway, _signal) = session(&start_backend().await);

        let user = session
            .login("root", &Secret::new("secret".into()))
            .await
            .unwrap();

        assert_eq!(user.role, UserRole::Superuser);
        assert_eq!(gateway.access_token().await.as_deref(), Some("A1"));
        assert_eq!(gateway.refresh_token().await.as_deref(), Some("R1"));
        assert_eq!(session.current_user().await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn wrong_password_leaves_session_empty() {
        let (session, gateway, _signal) = session(&start_backend().await);

        let err = session
            .login("root", &Secret::new("wrong".into()))
            .await
            .unwrap_err();

        assert_eq!(err.user_message(), "Invalid username or password.");
        assert!(gateway.access_token().await.is_none());
        assert!(session.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn logout_clears_everything() {
        let (session, gateway, _signal) = session(&start_backend().await);
        session
            .login("root", &Secret::new("secret".into()))
            .await
            .unwrap();

        session.logout().await.unwrap();

        assert!(gateway.access_token().await.is_none());
        assert!(gateway.refresh_token().await.is_none());
        assert!(gateway.store().get(USER_KEY).await.is_none());
        assert!(session.current_user().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unreadable_profile_wipes_session() {
        let (session, gateway, _signal) = session("http://unused");
        gateway.set_tokens("A1", "R1").await.unwrap();
        gateway
            .store()
            .set(USER_KEY, "{broken".into())
            .await
            .unwrap();

        assert!(session.current_user().await.unwrap().is_none());
        assert!(gateway.access_token().await.is_none());
    }

    #[tokio::test]
    async fn forced_logout_drops_cached_profile() {
        let (session, gateway, signal) = session(&start_backend().await);
        let watcher = session.watch_session_end(&signal);
        session
            .login("root", &Secret::new("secret".into()))
            .await
            .unwrap();

        // Refresh endpoint rejects everything, so this ends the session
        let err = crate::QrClient::new(gateway.clone())
            .all_requests(1)
            .await
            .unwrap_err();
        assert!(
            matches!(err, Error::Gateway(guest_gateway::Error::RefreshFailed(_))),
            "got {err:?}"
        );

        // Give the listener task a turn to process the event
        for _ in 0..50 {
            if gateway.store().get(USER_KEY).await.is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(gateway.store().get(USER_KEY).await.is_none());
        assert!(session.current_user().await.unwrap().is_none());
        watcher.abort();
    }
}
