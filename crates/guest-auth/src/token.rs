//! Login and token refresh
//!
//! Both calls go straight to the backend without a bearer header: login
//! because there is no session yet, refresh because the access token is the
//! thing that just expired. The gateway owns every other request.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{LOGIN_PATH, REFRESH_PATH};
use crate::error::{Error, Result};

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Manager,
    Superuser,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// User summary returned alongside a fresh token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginUser {
    pub id: String,
    pub username: String,
    pub role: UserRole,
}

/// Response from the login endpoint. `token` is the access token.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub refresh: String,
    pub user: LoginUser,
}

#[derive(Debug, Serialize)]
pub struct TokenRefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Response from the refresh endpoint.
///
/// `refresh` is only present when the backend rotates refresh tokens; when it
/// is absent the existing refresh token stays valid.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct TokenRefreshResponse {
    pub access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Exchange username and password for a token pair.
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    request: &LoginRequest<'_>,
) -> Result<LoginResponse> {
    let response = client
        .post(endpoint(base_url, LOGIN_PATH))
        .json(request)
        .send()
        .await
        .map_err(|e| Error::Http(format!("login request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let login = response
        .json::<LoginResponse>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("invalid login response: {e}")))?;
    debug!(username = %login.user.username, "login succeeded");
    Ok(login)
}

/// Obtain a new access token using a refresh token.
///
/// Any non-2xx answer is a rejection, including an expired refresh token.
pub async fn refresh_token(
    client: &reqwest::Client,
    base_url: &str,
    refresh: &str,
) -> Result<TokenRefreshResponse> {
    let response = client
        .post(endpoint(base_url, REFRESH_PATH))
        .json(&TokenRefreshRequest { refresh })
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json::<TokenRefreshResponse>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("invalid refresh response: {e}")))
}
