//! Session resolution and lifecycle — the single source of truth for
//! "is there a usable session".

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::classify;
use crate::directory::{DirectoryClient, NativeSession};
use crate::error::Error;
use crate::oauth::OAuthExchangeClient;
use crate::store::{
    CredentialStore, ACCESS_TOKEN_KEY, ID_TOKEN_KEY, REFRESH_TOKEN_KEY, TOKEN_SOURCE_KEY,
    TOKEN_TIMESTAMP_KEY,
};
use crate::types::{CredentialBundle, ProfileAttribute, TokenSource, Username};

/// Browser location capability. The OAuth callback lands with `?code=` in
/// the visible location bar; stripping it keeps back/forward navigation
/// from resubmitting a consumed code.
pub trait Navigator: Send + Sync + 'static {
    fn strip_authorization_code(&self);
}

/// Default navigator for headless use and tests.
#[derive(Debug, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn strip_authorization_code(&self) {}
}

/// A usable session, validated by [`SessionManager`] before exposure.
///
/// At most one variant is active per page lifecycle.
#[derive(Debug, Clone)]
pub enum Session {
    /// Directory-native session; authoritative because it can self-refresh.
    Native(NativeSession),
    /// Synthetic session reconstructed from the persisted SSO bundle.
    Sso(SsoSession),
}

/// Synthetic session wrapping a persisted credential bundle.
#[derive(Debug, Clone)]
pub struct SsoSession {
    pub access_token: String,
    pub id_token: String,
}

impl Session {
    /// Tokens present and, for native sessions, unexpired. Cryptographic
    /// validation of the tokens themselves is the provider's concern.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Native(native) => native.is_valid(),
            Self::Sso(sso) => !sso.access_token.is_empty() && !sso.id_token.is_empty(),
        }
    }

    #[must_use]
    pub fn access_token(&self) -> &str {
        match self {
            Self::Native(native) => &native.access_token,
            Self::Sso(sso) => &sso.access_token,
        }
    }

    #[must_use]
    pub fn id_token(&self) -> &str {
        match self {
            Self::Native(native) => &native.id_token,
            Self::Sso(sso) => &sso.id_token,
        }
    }
}

/// Composes the directory SDK, the OAuth exchange client and the
/// credential store into one session surface.
///
/// Resolution order makes the directory-native session authoritative when
/// available while tolerating SSO-only state where no native session
/// object exists.
pub struct SessionManager<D: DirectoryClient> {
    directory: Arc<D>,
    oauth: Arc<OAuthExchangeClient>,
    store: CredentialStore,
    navigator: Arc<dyn Navigator>,
}

impl<D: DirectoryClient> SessionManager<D> {
    #[must_use]
    pub fn new(directory: D, oauth: OAuthExchangeClient, store: CredentialStore) -> Self {
        Self {
            directory: Arc::new(directory),
            oauth: Arc::new(oauth),
            store,
            navigator: Arc::new(NoopNavigator),
        }
    }

    /// Install the platform's location capability.
    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    #[must_use]
    pub fn directory(&self) -> Arc<D> {
        Arc::clone(&self.directory)
    }

    #[must_use]
    pub fn oauth(&self) -> &OAuthExchangeClient {
        &self.oauth
    }

    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Username/password sign-in against the directory.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidCredentials`] carrying the provider's rejection
    /// reason (bad credentials, unconfirmed account, ...). Terminal and
    /// user-correctable; never retried here.
    pub async fn sign_in_direct(
        &self,
        username: impl Into<Username>,
        password: &str,
    ) -> Result<Session, Error> {
        let username = username.into();
        let native = self
            .directory
            .authenticate(&username, password)
            .await
            .map_err(|e| Error::InvalidCredentials(e.to_string()))?;

        self.store.set(ACCESS_TOKEN_KEY, &native.access_token);
        classify::write_flag(&self.store, TokenSource::Direct, time::OffsetDateTime::now_utc());
        tracing::info!(user = %username, "direct sign-in succeeded");

        Ok(Session::Native(native))
    }

    /// Complete the SSO callback: exchange the code, commit the bundle,
    /// and strip the code from the visible location bar.
    ///
    /// # Errors
    ///
    /// Propagates [`OAuthExchangeClient::exchange`] failures; a consumed
    /// code fails fast with [`Error::CodeAlreadyUsed`].
    pub async fn complete_sso_callback(&self, code: &str) -> Result<Session, Error> {
        let bundle = self.oauth.exchange(code).await?;
        self.persist_bundle(&bundle);
        self.navigator.strip_authorization_code();
        tracing::info!("SSO sign-in completed");

        Ok(Session::Sso(SsoSession {
            access_token: bundle.access_token,
            id_token: bundle.id_token,
        }))
    }

    /// Resolve the active session.
    ///
    /// (a) a valid directory-native session wins and its access token is
    /// opportunistically cached; (b) otherwise a persisted bundle with both
    /// access and ID tokens yields a synthetic session; (c) otherwise
    /// [`Error::NoSession`].
    pub async fn current_session(&self) -> Result<Session, Error> {
        match self.directory.current_session().await {
            Ok(Some(native)) if native.is_valid() => {
                self.store.set(ACCESS_TOKEN_KEY, &native.access_token);
                return Ok(Session::Native(native));
            }
            Ok(Some(_)) => tracing::debug!("native session present but expired"),
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "directory session lookup failed"),
        }

        match (self.store.get(ACCESS_TOKEN_KEY), self.store.get(ID_TOKEN_KEY)) {
            (Some(access_token), Some(id_token)) => Ok(Session::Sso(SsoSession {
                access_token,
                id_token,
            })),
            _ => Err(Error::NoSession),
        }
    }

    /// Bearer headers for outbound API calls.
    ///
    /// # Errors
    ///
    /// [`Error::AuthRequired`] when no session resolves.
    pub async fn auth_headers(&self) -> Result<HeaderMap, Error> {
        let session = self.current_session().await.map_err(|_| Error::AuthRequired)?;
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {}", session.access_token()))
            .map_err(|_| Error::Token("access token is not a valid header value".into()))?;
        headers.insert(AUTHORIZATION, value);
        Ok(headers)
    }

    /// Sign out of the directory and sweep every persisted credential.
    ///
    /// Always completes: directory and storage failures are logged and do
    /// not block the caller's navigation to the login page.
    pub async fn sign_out(&self) {
        if let Err(e) = self.directory.sign_out().await {
            tracing::warn!(error = %e, "directory sign-out failed");
        }

        for key in [
            ACCESS_TOKEN_KEY,
            ID_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            TOKEN_SOURCE_KEY,
            TOKEN_TIMESTAMP_KEY,
        ] {
            self.store.remove(key);
        }
        // The provider decides what it persists under its namespace, so
        // sweep by prefix instead of enumerating well-known keys.
        let prefix = self.store.native_prefix().to_owned();
        self.store.remove_by_prefix(&prefix);

        tracing::info!("signed out");
    }

    /// Create an account; the directory emails a confirmation code.
    ///
    /// # Errors
    ///
    /// [`Error::Registration`] with the provider's reason.
    pub async fn register(
        &self,
        username: impl Into<Username>,
        password: &str,
        attributes: &[ProfileAttribute],
    ) -> Result<(), Error> {
        self.directory
            .sign_up(&username.into(), password, attributes)
            .await
            .map_err(|e| Error::Registration(e.to_string()))
    }

    /// Confirm a registration with the emailed code.
    ///
    /// # Errors
    ///
    /// [`Error::Registration`] with the provider's reason.
    pub async fn confirm_registration(
        &self,
        username: impl Into<Username>,
        code: &str,
    ) -> Result<(), Error> {
        self.directory
            .confirm_registration(&username.into(), code)
            .await
            .map_err(|e| Error::Registration(e.to_string()))
    }

    /// Start the forgot-password flow.
    ///
    /// # Errors
    ///
    /// [`Error::Registration`] with the provider's reason.
    pub async fn request_password_reset(&self, username: impl Into<Username>) -> Result<(), Error> {
        self.directory
            .request_password_reset(&username.into())
            .await
            .map_err(|e| Error::Registration(e.to_string()))
    }

    /// Complete the forgot-password flow with the emailed code.
    ///
    /// # Errors
    ///
    /// [`Error::Registration`] with the provider's reason.
    pub async fn confirm_password_reset(
        &self,
        username: impl Into<Username>,
        code: &str,
        new_password: &str,
    ) -> Result<(), Error> {
        self.directory
            .confirm_password_reset(&username.into(), code, new_password)
            .await
            .map_err(|e| Error::Registration(e.to_string()))
    }

    fn persist_bundle(&self, bundle: &CredentialBundle) {
        self.store.set(ACCESS_TOKEN_KEY, &bundle.access_token);
        self.store.set(ID_TOKEN_KEY, &bundle.id_token);
        if let Some(refresh) = &bundle.refresh_token {
            self.store.set(REFRESH_TOKEN_KEY, refresh);
        }
        classify::write_flag(&self.store, bundle.source, bundle.issued_at);
    }
}
