//! Profile-attribute write routing.
//!
//! Federated tokens lack the scopes to mutate directory attributes
//! directly, so SSO sessions write through the backend-mediated endpoint.
//! Classification is heuristic and can be wrong in exactly that direction,
//! so a scope-denied direct write falls back to the backend path once.

use serde::Deserialize;
use url::Url;

use crate::directory::DirectoryClient;
use crate::error::Error;
use crate::session::SessionManager;
use crate::types::{ProfileAttribute, TokenSource};

/// Normalized result of a profile update. Both write paths are atomic per
/// call; an `Ok` outcome means every attribute was applied.
#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub message: String,
}

/// Error body of the backend profile endpoint.
#[derive(Debug, Deserialize)]
struct BackendError {
    error: String,
}

/// Client for the backend-mediated `PUT /profile` endpoint.
pub struct ProfileUpdateClient {
    http: reqwest::Client,
    api_base: Url,
}

impl ProfileUpdateClient {
    #[must_use]
    pub fn new(api_base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base,
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Bearer-authenticated attribute write through the backend.
    ///
    /// # Errors
    ///
    /// [`Error::Http`] on network failure, [`Error::AttributeUpdate`] with
    /// the endpoint's `error` body (or status text) on rejection.
    pub async fn put_profile(
        &self,
        bearer_token: &str,
        attributes: &[ProfileAttribute],
    ) -> Result<UpdateOutcome, Error> {
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config("API base URL cannot be a base".into()))?
            .pop_if_empty()
            .push("profile");

        let response = self
            .http
            .put(url)
            .bearer_auth(bearer_token)
            .json(&serde_json::json!({ "attributes": attributes }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<BackendError>(&body) {
                Ok(err) => err.error,
                Err(_) => format!("request failed with status {status}"),
            };
            tracing::error!(status = status.as_u16(), %message, "backend profile update rejected");
            return Err(Error::AttributeUpdate(message));
        }

        Ok(UpdateOutcome {
            message: "profile updated".into(),
        })
    }
}

/// Dispatches profile writes to the legal backend path for the session's
/// classification.
pub struct ProfileUpdateRouter<D: DirectoryClient> {
    directory: std::sync::Arc<D>,
    backend: ProfileUpdateClient,
}

impl<D: DirectoryClient> ProfileUpdateRouter<D> {
    #[must_use]
    pub fn new(directory: std::sync::Arc<D>, backend: ProfileUpdateClient) -> Self {
        Self { directory, backend }
    }

    /// Apply `attributes` via the path `classification` selects.
    ///
    /// A direct write that fails with a scope/permission message retries
    /// exactly once via the backend path; every other failure surfaces
    /// immediately.
    ///
    /// # Errors
    ///
    /// [`Error::AttributeUpdate`] with a normalized message, or
    /// [`Error::AuthRequired`] when the backend path finds no session.
    pub async fn update(
        &self,
        sessions: &SessionManager<D>,
        attributes: &[ProfileAttribute],
        classification: TokenSource,
    ) -> Result<UpdateOutcome, Error> {
        match classification {
            TokenSource::Sso => self.update_via_backend(sessions, attributes).await,
            TokenSource::Direct => match self.directory.update_attributes(attributes).await {
                Ok(()) => Ok(UpdateOutcome {
                    message: "profile updated".into(),
                }),
                Err(e) if is_scope_denial(&e.to_string()) => {
                    tracing::warn!(
                        error = %e,
                        "direct attribute update denied for scopes, falling back to backend"
                    );
                    self.update_via_backend(sessions, attributes).await
                }
                Err(e) => Err(Error::AttributeUpdate(e.to_string())),
            },
        }
    }

    async fn update_via_backend(
        &self,
        sessions: &SessionManager<D>,
        attributes: &[ProfileAttribute],
    ) -> Result<UpdateOutcome, Error> {
        let session = sessions
            .current_session()
            .await
            .map_err(|_| Error::AuthRequired)?;
        self.backend.put_profile(session.access_token(), attributes).await
    }
}

/// Whether a directory rejection reads like a scope/permission problem.
fn is_scope_denial(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("scope") || message.contains("not authorized") || message.contains("permission")
}
