//! Bearer attachment and coalesced token refresh
//!
//! Refresh state is one flag plus a queue of waiting callers, kept together
//! under a `std::sync::Mutex` that is never held across an `.await`. A caller
//! that sees 401 either becomes the leader (flag was clear) or parks a
//! oneshot sender in the queue (flag was set). The leader settles the episode
//! by draining the whole queue and clearing the flag in one critical section,
//! so no caller can enqueue behind a finished refresh.

use std::sync::{Arc, Mutex, PoisonError};

use guest_auth::TokenStore;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::request::{ApiRequest, ApiResponse};
use crate::session::SessionSignal;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// New access token, or the message of the refresh failure.
type RefreshOutcome = std::result::Result<String, String>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

/// What a 401'd caller does next.
enum Turn<'a> {
    Lead(Episode<'a>),
    Wait(oneshot::Receiver<RefreshOutcome>),
}

/// Leader's hold on the current expiry episode.
///
/// Dropping it unsettled (the leader's future was cancelled) fails every
/// queued caller instead of leaving them parked forever.
struct Episode<'a> {
    state: &'a Mutex<RefreshState>,
    settled: bool,
}

impl Episode<'_> {
    /// Release every waiter with `outcome`, then clear the flag.
    /// Returns how many waiters were released.
    fn settle(mut self, outcome: RefreshOutcome) -> usize {
        self.settled = true;
        release(self.state, outcome)
    }
}

impl Drop for Episode<'_> {
    fn drop(&mut self) {
        if !self.settled {
            let released = release(self.state, Err("refresh abandoned".into()));
            warn!(waiters = released, "refresh leader dropped before settling");
        }
    }
}

fn release(state: &Mutex<RefreshState>, outcome: RefreshOutcome) -> usize {
    let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
    let waiters = std::mem::take(&mut state.waiters);
    let released = waiters.len();
    for waiter in waiters {
        // A waiter whose caller went away is fine to skip
        let _ = waiter.send(outcome.clone());
    }
    state.refreshing = false;
    released
}

/// HTTP gateway that owns the `Authorization` header.
///
/// One instance per session owner. Share it behind an `Arc`; instances do not
/// share refresh state with each other.
pub struct Gateway {
    client: reqwest::Client,
    base_url: String,
    store: Arc<TokenStore>,
    signal: SessionSignal,
    refresh: Mutex<RefreshState>,
}

impl Gateway {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        store: Arc<TokenStore>,
        signal: SessionSignal,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            store,
            signal,
            refresh: Mutex::new(RefreshState::default()),
        }
    }

    /// Send `request`, refreshing the access token once if it is rejected.
    ///
    /// Any response other than 401 is returned as `Ok`, whatever its status.
    #[instrument(skip_all, fields(request_id = tracing::field::Empty, method = %request.method, path = %request.path))]
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        tracing::Span::current().record("request_id", request_id.as_str());

        let access = self.store.access_token().await;
        let response = self
            .transmit(&request, access.as_deref(), &request_id)
            .await?;
        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // From here on this request has used its one retry.
        let access = match self.join_episode() {
            Turn::Lead(episode) => self.lead(episode, access.as_deref(), response).await?,
            Turn::Wait(outcome) => {
                debug!("refresh already in flight, waiting");
                match outcome.await {
                    Ok(Ok(access)) => access,
                    Ok(Err(message)) => return Err(Error::RefreshFailed(message)),
                    Err(_) => return Err(Error::RefreshFailed("refresh abandoned".into())),
                }
            }
        };

        let retried = self
            .transmit(&request, Some(&access), &request_id)
            .await?;
        if retried.status == StatusCode::UNAUTHORIZED {
            warn!("request rejected again with a freshly refreshed token");
            return Err(Error::DoubleFailure(retried));
        }
        Ok(retried)
    }

    /// Overwrite the stored token pair (after login).
    pub async fn set_tokens(&self, access: &str, refresh: &str) -> Result<()> {
        Ok(self.store.set_tokens(access, refresh).await?)
    }

    /// Remove the stored token pair (logout). Does not fire the session signal.
    pub async fn clear_tokens(&self) -> Result<()> {
        Ok(self.store.clear_tokens().await?)
    }

    pub async fn access_token(&self) -> Option<String> {
        self.store.access_token().await
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.store.refresh_token().await
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Become the leader of a new expiry episode or queue behind the current one.
    fn join_episode(&self) -> Turn<'_> {
        let mut state = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);
        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.waiters.push(tx);
            Turn::Wait(rx)
        } else {
            state.refreshing = true;
            Turn::Lead(Episode {
                state: &self.refresh,
                settled: false,
            })
        }
    }

    /// Settle the episode this caller leads.
    ///
    /// The token pair is read only now that the flag is held: an episode that
    /// finished after this caller's first attempt has already rotated it. Its
    /// access token is reused, and a session it ended stays ended.
    async fn lead(
        &self,
        episode: Episode<'_>,
        sent: Option<&str>,
        rejected: ApiResponse,
    ) -> Result<String> {
        let stored = self.store.access_token().await;
        if stored.as_deref() != sent {
            return match stored {
                Some(access) => {
                    debug!("access token replaced since first attempt, resending");
                    episode.settle(Ok(access.clone()));
                    Ok(access)
                }
                None => {
                    debug!("session ended since first attempt");
                    episode.settle(Err("session ended".into()));
                    Err(Error::Unauthenticated(rejected))
                }
            };
        }

        let Some(refresh) = self.store.refresh_token().await else {
            warn!("access rejected and no refresh token stored, ending session");
            self.end_session().await;
            episode.settle(Err("no refresh token".into()));
            return Err(Error::Unauthenticated(rejected));
        };
        self.refresh(&refresh, episode).await
    }

    /// Run the episode's single refresh call and settle it.
    async fn refresh(&self, refresh: &str, episode: Episode<'_>) -> Result<String> {
        info!("access token rejected, refreshing");
        match guest_auth::refresh_token(&self.client, &self.base_url, refresh).await {
            Ok(tokens) => {
                // No rotation means the current refresh token stays valid
                let next_refresh = tokens.refresh.as_deref().unwrap_or(refresh);
                if let Err(e) = self.store.set_tokens(&tokens.access, next_refresh).await {
                    warn!(error = %e, "failed to persist refreshed tokens");
                }
                metrics::counter!("gateway_refresh_total", "outcome" => "success").increment(1);
                let released = episode.settle(Ok(tokens.access.clone()));
                info!(waiters = released, "token refresh succeeded");
                Ok(tokens.access)
            }
            Err(e) => {
                let message = e.to_string();
                metrics::counter!("gateway_refresh_total", "outcome" => "failure").increment(1);
                warn!(error = %message, "token refresh failed, ending session");
                self.end_session().await;
                let released = episode.settle(Err(message.clone()));
                debug!(waiters = released, "failed queued callers");
                Err(Error::RefreshFailed(message))
            }
        }
    }

    async fn end_session(&self) {
        if let Err(e) = self.store.clear_tokens().await {
            warn!(error = %e, "failed to clear tokens");
        }
        metrics::counter!("gateway_session_ended_total").increment(1);
        self.signal.end();
    }

    async fn transmit(
        &self,
        request: &ApiRequest,
        access: Option<&str>,
        request_id: &str,
    ) -> Result<ApiResponse> {
        let url = format!("{}{}", self.base_url, request.path);

        let mut headers = request.headers.clone();
        headers.remove(AUTHORIZATION);
        if let Some(token) = access {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| Error::InvalidRequest(format!("invalid token value: {e}")))?,
            );
        }
        headers.insert(
            HeaderName::from_static(REQUEST_ID_HEADER),
            HeaderValue::from_str(request_id)
                .map_err(|e| Error::InvalidRequest(format!("invalid request id: {e}")))?,
        );

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(format!("request failed: {e}")))?;
        let response = ApiResponse::read(response)
            .await
            .map_err(|e| Error::Transport(format!("reading response body: {e}")))?;
        debug!(status = response.status.as_u16(), "backend responded");
        Ok(response)
    }
}
