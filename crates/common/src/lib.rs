//! Types shared by the guest pass crates

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
