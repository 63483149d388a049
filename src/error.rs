/// Errors surfaced by the authentication core.
///
/// Storage failures are deliberately absent: they are caught at the
/// [`CredentialStore`](crate::store::CredentialStore) boundary and degrade
/// to `None`/no-op there.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Direct sign-in rejected by the directory. Terminal and
    /// user-correctable; never retried.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    /// The SSO code exchange failed. Terminal for that code; the user must
    /// restart the SSO flow.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// The authorization code was already exchanged in this page lifetime.
    #[error("authorization code already exchanged")]
    CodeAlreadyUsed,

    /// No usable session could be resolved from the directory or the
    /// persisted credential bundle.
    #[error("no usable session")]
    NoSession,

    /// An operation that requires a session found none.
    #[error("authentication required")]
    AuthRequired,

    /// A profile-attribute write was rejected on every legal path.
    #[error("profile update failed: {0}")]
    AttributeUpdate(String),

    /// Registration or password-reset step rejected by the directory.
    #[error("registration failed: {0}")]
    Registration(String),

    /// An ID token that could not be decoded.
    #[error("malformed token: {0}")]
    Token(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Missing or invalid build-time configuration.
    #[error("configuration error: {0}")]
    Config(String),
}
