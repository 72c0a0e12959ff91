//! Authenticated API gateway for the guest pass backend
//!
//! Every backend call goes through [`Gateway::send`], which attaches the
//! stored bearer token and recovers from an expired access token by
//! refreshing it exactly once per expiry episode:
//!
//! 1. First 401 with no refresh in flight → this caller leads one refresh
//! 2. Later 401s while that refresh runs → callers queue behind it
//! 3. Refresh succeeds → new pair stored, every queued caller and the leader
//!    resend their request once with the new token
//! 4. Refresh fails → queued callers fail, tokens are cleared and
//!    [`SessionEvent::Ended`] is broadcast once
//!
//! A request is never resent more than once; a second 401 is returned to the
//! caller as [`Error::DoubleFailure`].

pub mod error;
pub mod gateway;
pub mod request;
pub mod session;

pub use error::{Error, Result};
pub use gateway::Gateway;
pub use request::{ApiRequest, ApiResponse};
pub use session::{SessionEvent, SessionSignal};
