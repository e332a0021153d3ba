// Common types shared between client and server
pub mod common;

// Client library for applications talking to a relay
mod client;
mod error;

pub use client::{authenticate, authenticate_from_config, RelayClient, RelayClientError, Settings};
pub use common::{CreateSessionResponse, PollResponse, RefreshRequest};
pub use error::AuthError;

// Server modules (public for binary, internal for library)
#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "server")]
pub mod testing;
