pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod session;
pub mod types;

pub use client::{ApiClient, TokenPair};
pub use config::ClientConfig;
pub use error::ClientError;
pub use session::{LogoutReason, Session, SessionObserver};
