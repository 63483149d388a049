#![doc = include_str!("../README.md")]

pub mod claims;
pub mod classify;
pub mod config;
pub mod directory;
pub mod error;
pub mod guard;
pub mod oauth;
pub mod profile;
pub mod session;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports for convenient access
pub use claims::{decode_id_token, ClaimsView, FederatedIdentity, IdentityClaims};
pub use classify::{IdentityClassifier, FLAG_FRESHNESS};
pub use config::PortalConfig;
pub use directory::{DirectoryClient, DirectoryError, NativeSession};
pub use error::Error;
pub use guard::{GuardState, RouteGuard};
pub use oauth::{OAuthConfig, OAuthExchangeClient};
pub use profile::{ProfileUpdateClient, ProfileUpdateRouter, UpdateOutcome};
pub use session::{Navigator, NoopNavigator, Session, SessionManager, SsoSession};
pub use store::{CredentialStore, MemoryStore, StorageBackend, StorageError};
pub use types::{CredentialBundle, ProfileAttribute, TokenSource, Username};
