//! Backend paths and persisted key names

/// Username/password login, returns `{token, refresh, user}`
pub const LOGIN_PATH: &str = "/api/auth/login/";

/// Access token refresh, body `{refresh}`, returns `{access, refresh?}`
pub const REFRESH_PATH: &str = "/api/auth/refresh/";

/// Store key holding the current access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Store key holding the current refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Store key holding the cached profile of the logged-in user (JSON)
pub const USER_KEY: &str = "auth_user";
