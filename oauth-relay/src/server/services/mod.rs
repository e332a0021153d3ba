pub mod clock;
pub mod oauth_client;
pub mod session_store;

pub use clock::{Clock, SystemClock};
pub use oauth_client::{OAuthClient, TokenExchangeError};
pub use session_store::{spawn_cleanup_task, InMemorySessionStore, SessionStore};
