//! Authentication module for managing owner sessions and credentials.
//!
//! This module provides:
//! - `SecureStore`: encrypted key/value file, key from the OS keyring or a passphrase
//! - `CredentialStore`: tokens and franchise selection on top of the secure store
//! - `AuthService`: login, logout and on-demand token refresh

pub mod credentials;
pub mod secure_store;
pub mod session;

pub use credentials::CredentialStore;
pub use secure_store::{KeySource, SecureStore};
pub use session::{AuthService, Session};
