//! Guest pass backend authentication
//!
//! Wire types and calls for the two unauthenticated auth endpoints, plus the
//! durable key-value store that holds the current token pair between runs.
//!
//! Session flow:
//! 1. `token::login()` exchanges username/password for a token pair
//! 2. Pair stored via `TokenStore::set_tokens()`
//! 3. The gateway attaches the access token to every request
//! 4. On 401 the gateway calls `token::refresh_token()` once and stores the result
//! 5. `TokenStore::clear_tokens()` on logout or unrecoverable refresh failure

pub mod constants;
pub mod error;
pub mod store;
pub mod token;

pub use constants::*;
pub use error::{Error, Result};
pub use store::TokenStore;
pub use token::{
    LoginRequest, LoginResponse, LoginUser, TokenRefreshRequest, TokenRefreshResponse, UserRole,
    login, refresh_token,
};
