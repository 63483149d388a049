use std::collections::HashSet;
use std::sync::Mutex;

use serde::Deserialize;
use time::OffsetDateTime;
use url::Url;

use crate::claims::{self, IdentityClaims};
use crate::error::Error;
use crate::types::{CredentialBundle, TokenSource};

/// Federated identity provider `OAuth2` configuration.
///
/// Required fields are constructor parameters — no runtime "missing field"
/// errors.
///
/// ```rust,ignore
/// use portal_auth::OAuthConfig;
///
/// let config = OAuthConfig::new(
///     "https://auth.portal.example.edu".parse()?,
///     "my-client-id",
///     "https://portal.example.edu/callback".parse()?,
/// );
/// // Optional overrides via chaining:
/// let config = config.with_scopes(vec!["openid".into()]);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct OAuthConfig {
    pub(crate) client_id: String,
    pub(crate) authorize_url: Url,
    pub(crate) token_url: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a configuration from the provider's hosted domain.
    ///
    /// The authorization and token endpoints default to
    /// `{domain}/oauth2/authorize` and `{domain}/oauth2/token`.
    #[must_use]
    pub fn new(domain: Url, client_id: impl Into<String>, redirect_uri: Url) -> Self {
        let endpoint = |path: &str| {
            let mut url = domain.clone();
            url.set_path(path);
            url
        };
        Self {
            client_id: client_id.into(),
            authorize_url: endpoint("/oauth2/authorize"),
            token_url: endpoint("/oauth2/token"),
            redirect_uri,
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
        }
    }

    /// Override the authorization endpoint.
    #[must_use]
    pub fn with_authorize_url(mut self, url: Url) -> Self {
        self.authorize_url = url;
        self
    }

    /// Override the token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    /// Override the `OAuth2` scopes (default: `["openid", "email", "profile"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// `OAuth2` client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Authorization endpoint URL.
    #[must_use]
    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    /// Token exchange endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// `OAuth2` redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }
}

/// Success body of the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenGrant {
    access_token: String,
    id_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Error body of the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenEndpointError {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Exchanges authorization codes for token bundles at the federated
/// provider's token endpoint.
///
/// Exchange is a single-use side-effecting operation: the remote endpoint
/// rejects replays, so codes are marked consumed here before the network
/// call, and a duplicate invocation within one page lifetime fails fast
/// without touching the network.
pub struct OAuthExchangeClient {
    config: OAuthConfig,
    http: reqwest::Client,
    consumed_codes: Mutex<HashSet<String>>,
}

impl OAuthExchangeClient {
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            consumed_codes: Mutex::new(HashSet::new()),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the full-page redirect URL that starts the SSO flow.
    ///
    /// `identity_provider` selects the third-party source on the provider's
    /// hosted sign-in; the response returns via redirect back to the
    /// callback route with `?code=`.
    #[must_use]
    pub fn authorization_url(&self, identity_provider: Option<&str>) -> String {
        let scope = self.config.scopes.join(" ");
        let mut url = self.config.authorize_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(provider) = identity_provider {
                pairs.append_pair("identity_provider", provider);
            }
            pairs
                .append_pair("redirect_uri", self.config.redirect_uri.as_str())
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.config.client_id)
                .append_pair("scope", &scope);
        }
        url.into()
    }

    /// Exchange an authorization code for a credential bundle.
    ///
    /// Persistence is the caller's responsibility — this performs the fetch
    /// only, keeping "fetch" separate from "commit".
    ///
    /// # Errors
    ///
    /// [`Error::CodeAlreadyUsed`] if `code` was already exchanged in this
    /// page lifetime, [`Error::Http`] on network failure,
    /// [`Error::TokenExchange`] if the endpoint rejects the code, and
    /// [`Error::Token`] if the returned ID token does not decode.
    pub async fn exchange(&self, code: &str) -> Result<CredentialBundle, Error> {
        self.mark_consumed(code)?;

        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let response = self
            .http
            .post(self.config.token_url.clone())
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<TokenEndpointError>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {desc}", err.error),
                    None => err.error,
                },
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or(status.as_str())
                    .to_owned(),
            };
            tracing::error!(status = status.as_u16(), %reason, "token exchange rejected");
            return Err(Error::TokenExchange(reason));
        }

        let grant = response.json::<TokenGrant>().await?;
        // Structural decode only; cryptographic validation is the provider's.
        let _claims: IdentityClaims = claims::decode_id_token(&grant.id_token)?;

        Ok(CredentialBundle {
            access_token: grant.access_token,
            id_token: grant.id_token,
            refresh_token: grant.refresh_token,
            source: TokenSource::Sso,
            issued_at: OffsetDateTime::now_utc(),
        })
    }

    /// Check-then-insert on the consumed-code record, synchronously before
    /// the first await point so concurrent duplicate invocations cannot
    /// race a second exchange.
    fn mark_consumed(&self, code: &str) -> Result<(), Error> {
        let mut consumed = self
            .consumed_codes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !consumed.insert(code.to_owned()) {
            tracing::warn!("duplicate exchange attempt for an already-consumed code");
            return Err(Error::CodeAlreadyUsed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for OAuthExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthExchangeClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(domain: &str) -> OAuthConfig {
        OAuthConfig::new(
            domain.parse().unwrap(),
            "test-client",
            "https://portal.example.edu/callback".parse().unwrap(),
        )
    }

    fn id_token(payload: &str) -> String {
        format!("hdr.{}.sig", URL_SAFE_NO_PAD.encode(payload))
    }

    #[test]
    fn authorization_url_carries_code_flow_params() {
        let client = OAuthExchangeClient::new(test_config("https://auth.example.edu"));
        let url = client.authorization_url(Some("AzureAD"));

        assert!(url.starts_with("https://auth.example.edu/oauth2/authorize?"));
        assert!(url.contains("identity_provider=AzureAD"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=test-client"));
        assert!(url.contains("scope=openid+email+profile"));
    }

    #[test]
    fn authorization_url_without_provider_hint() {
        let client = OAuthExchangeClient::new(test_config("https://auth.example.edu"));
        let url = client.authorization_url(None);
        assert!(!url.contains("identity_provider"));
        assert!(url.contains("redirect_uri="));
    }

    #[test]
    fn endpoints_derive_from_domain() {
        let config = test_config("https://auth.example.edu");
        assert_eq!(config.token_url().as_str(), "https://auth.example.edu/oauth2/token");
        assert_eq!(
            config.authorize_url().as_str(),
            "https://auth.example.edu/oauth2/authorize"
        );
    }

    #[tokio::test]
    async fn exchange_returns_sso_bundle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc123"))
            .and(body_string_contains("client_id=test-client"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "acc-1",
                "id_token": id_token(r#"{"sub":"u-1","email":"a@b.edu"}"#),
                "refresh_token": "ref-1",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuthExchangeClient::new(test_config(&server.uri()));
        let bundle = client.exchange("abc123").await.unwrap();

        assert_eq!(bundle.access_token, "acc-1");
        assert_eq!(bundle.refresh_token.as_deref(), Some("ref-1"));
        assert_eq!(bundle.source, TokenSource::Sso);
    }

    #[tokio::test]
    async fn exchange_parses_structured_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "code expired",
            })))
            .mount(&server)
            .await;

        let client = OAuthExchangeClient::new(test_config(&server.uri()));
        let err = client.exchange("stale").await.unwrap_err();
        match err {
            Error::TokenExchange(reason) => assert_eq!(reason, "invalid_grant: code expired"),
            other => panic!("expected TokenExchange, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exchange_falls_back_to_status_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream blew up"))
            .mount(&server)
            .await;

        let client = OAuthExchangeClient::new(test_config(&server.uri()));
        let err = client.exchange("abc123").await.unwrap_err();
        match err {
            Error::TokenExchange(reason) => assert_eq!(reason, "Bad Gateway"),
            other => panic!("expected TokenExchange, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_exchange_of_same_code_fails_without_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "acc-1",
                "id_token": id_token(r#"{"sub":"u-1"}"#),
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuthExchangeClient::new(test_config(&server.uri()));
        client.exchange("abc123").await.unwrap();

        let err = client.exchange("abc123").await.unwrap_err();
        assert!(matches!(err, Error::CodeAlreadyUsed));
        // The mock's expect(1) verifies on drop that no second call went out.
    }

    #[tokio::test]
    async fn code_is_consumed_even_when_exchange_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuthExchangeClient::new(test_config(&server.uri()));
        assert!(matches!(
            client.exchange("abc123").await.unwrap_err(),
            Error::TokenExchange(_)
        ));
        assert!(matches!(
            client.exchange("abc123").await.unwrap_err(),
            Error::CodeAlreadyUsed
        ));
    }

    #[tokio::test]
    async fn exchange_rejects_undecodable_id_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "acc-1",
                "id_token": "garbage",
            })))
            .mount(&server)
            .await;

        let client = OAuthExchangeClient::new(test_config(&server.uri()));
        assert!(matches!(client.exchange("abc123").await.unwrap_err(), Error::Token(_)));
    }
}
