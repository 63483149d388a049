//! Capability boundary over the identity-provider SDK.
//!
//! The provider ships callback-style primitives; implementations wrap each
//! one in a single-resolution future so the rest of the core is expressed
//! in direct, sequential, awaitable calls.

use std::future::Future;

use time::OffsetDateTime;

use crate::types::{ProfileAttribute, Username};

/// Rejection from the directory service.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DirectoryError {
    /// Wrong username/password, unknown user.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
    /// Account exists but the emailed confirmation step is outstanding.
    #[error("account not confirmed: {0}")]
    NotConfirmed(String),
    /// Any other provider rejection, with the provider's message.
    #[error("{0}")]
    Rejected(String),
    /// SDK/transport failure.
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// A directory-native session as issued by the identity SDK.
///
/// Unlike the synthetic SSO session, a native session can self-refresh, so
/// [`SessionManager`](crate::session::SessionManager) treats it as
/// authoritative when it is present and valid.
#[derive(Debug, Clone)]
pub struct NativeSession {
    pub username: Username,
    pub access_token: String,
    pub id_token: String,
    pub expires_at: OffsetDateTime,
}

impl NativeSession {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        OffsetDateTime::now_utc() < self.expires_at
    }
}

/// Consumer-provided identity-provider SDK surface.
///
/// The core treats these as capability interfaces, not concrete classes;
/// tests substitute in-memory fakes.
pub trait DirectoryClient: Send + Sync + 'static {
    /// Authenticate with username/password, producing a native session.
    fn authenticate(
        &self,
        username: &Username,
        password: &str,
    ) -> impl Future<Output = Result<NativeSession, DirectoryError>> + Send;

    /// The SDK's current user/session, if one exists for this page
    /// lifetime. `Ok(None)` means no user is known to the SDK at all.
    fn current_session(
        &self,
    ) -> impl Future<Output = Result<Option<NativeSession>, DirectoryError>> + Send;

    /// Directly mutate profile attributes against the directory. Federated
    /// tokens lack the scopes for this call; see
    /// [`ProfileUpdateRouter`](crate::profile::ProfileUpdateRouter).
    fn update_attributes(
        &self,
        attributes: &[ProfileAttribute],
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Invalidate the native session.
    fn sign_out(&self) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Create an account; the directory emails a confirmation code.
    fn sign_up(
        &self,
        username: &Username,
        password: &str,
        attributes: &[ProfileAttribute],
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Confirm a freshly registered account with the emailed code.
    fn confirm_registration(
        &self,
        username: &Username,
        code: &str,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Start the forgot-password flow; the directory emails a reset code.
    fn request_password_reset(
        &self,
        username: &Username,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Complete the forgot-password flow.
    fn confirm_password_reset(
        &self,
        username: &Username,
        code: &str,
        new_password: &str,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;
}
