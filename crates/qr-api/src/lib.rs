//! Typed client for the guest QR-request backend
//!
//! Managers submit guest QR-code requests and list their own; superusers list
//! everything, approve or reject pending requests. Every call goes through the
//! authenticated gateway, so expired access tokens are refreshed transparently.

pub mod client;
pub mod error;
pub mod session;
pub mod types;

pub use client::{QrClient, qr_file_name};
pub use error::{Error, Result, extract_error_message};
pub use session::AuthSession;
pub use types::*;
