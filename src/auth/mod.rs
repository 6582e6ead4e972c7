//! Authentication: environment credentials and the lazily established session

pub mod config;
pub mod credentials;
pub mod manager;
pub mod session;

pub use config::Config;
pub use credentials::Credentials;
pub use manager::AuthManager;
pub use session::{Session, SessionManager};

/// Default PDS used when BLUESKY_SERVICE_URL is not set
pub const DEFAULT_SERVICE: &str = "https://bsky.social";
