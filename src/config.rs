use url::Url;

use crate::error::Error;
use crate::oauth::OAuthConfig;

/// Build-time portal configuration: the federated provider plus the
/// backend API base.
///
/// Use [`from_env()`](PortalConfig::from_env) for convention-based setup,
/// or [`new()`](PortalConfig::new) with `with_*` overrides on the inner
/// [`OAuthConfig`] for full control.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub oauth: OAuthConfig,
    pub api_base: Url,
    /// Third-party source preselected on the provider's hosted sign-in.
    pub identity_provider: Option<String>,
}

impl PortalConfig {
    #[must_use]
    pub fn new(oauth: OAuthConfig, api_base: Url) -> Self {
        Self {
            oauth,
            api_base,
            identity_provider: None,
        }
    }

    #[must_use]
    pub fn with_identity_provider(mut self, provider: impl Into<String>) -> Self {
        self.identity_provider = Some(provider.into());
        self
    }

    /// Create configuration from environment variables.
    ///
    /// # Required env vars
    /// - `PORTAL_AUTH_DOMAIN`: the provider's hosted domain
    /// - `PORTAL_CLIENT_ID`: `OAuth2` client ID
    /// - `PORTAL_REDIRECT_URI`: `OAuth2` callback URI
    /// - `PORTAL_API_BASE`: backend API base URL
    ///
    /// # Optional env vars
    /// - `PORTAL_AUTHORIZE_URL` / `PORTAL_TOKEN_URL`: endpoint overrides
    /// - `PORTAL_SCOPES`: comma-separated `OAuth2` scopes
    /// - `PORTAL_IDENTITY_PROVIDER`: preselected third-party source
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or URLs
    /// are invalid.
    pub fn from_env() -> Result<Self, Error> {
        let domain = required_url("PORTAL_AUTH_DOMAIN")?;
        let client_id = std::env::var("PORTAL_CLIENT_ID")
            .map_err(|_| Error::Config("PORTAL_CLIENT_ID is required".into()))?;
        let redirect_uri = required_url("PORTAL_REDIRECT_URI")?;
        let api_base = required_url("PORTAL_API_BASE")?;

        let mut oauth = OAuthConfig::new(domain, client_id, redirect_uri);

        if let Some(url) = optional_url("PORTAL_AUTHORIZE_URL")? {
            oauth = oauth.with_authorize_url(url);
        }
        if let Some(url) = optional_url("PORTAL_TOKEN_URL")? {
            oauth = oauth.with_token_url(url);
        }
        if let Ok(scopes) = std::env::var("PORTAL_SCOPES") {
            oauth = oauth.with_scopes(scopes.split(',').map(|s| s.trim().to_owned()).collect());
        }

        let mut config = Self::new(oauth, api_base);
        if let Ok(provider) = std::env::var("PORTAL_IDENTITY_PROVIDER") {
            config = config.with_identity_provider(provider);
        }
        Ok(config)
    }
}

fn required_url(var: &str) -> Result<Url, Error> {
    let value = std::env::var(var).map_err(|_| Error::Config(format!("{var} is required")))?;
    value.parse().map_err(|e| Error::Config(format!("{var}: {e}")))
}

fn optional_url(var: &str) -> Result<Option<Url>, Error> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("{var}: {e}"))),
        Err(_) => Ok(None),
    }
}
