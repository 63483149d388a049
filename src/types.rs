use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Which authentication mechanism produced a set of credentials.
///
/// This drives write-path routing only — it is never a security boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenSource {
    /// Username/password against the managed user directory.
    Direct,
    /// Federated single sign-on via authorization-code exchange.
    Sso,
}

impl TokenSource {
    /// Stable string form used for the persisted classification flag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Sso => "sso",
        }
    }

    /// Parse the persisted flag value. Unknown values are `None`, never an
    /// error — a corrupt flag must not break classification.
    #[must_use]
    pub fn from_flag(value: &str) -> Option<Self> {
        match value {
            "direct" => Some(Self::Direct),
            "sso" => Some(Self::Sso),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory username (the portal uses the email address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct Username(pub String);

impl Username {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// The token triple produced by either authentication path.
///
/// Owned by [`CredentialStore`](crate::store::CredentialStore) once
/// persisted; mutated only on (re)issuance and destroyed on logout.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CredentialBundle {
    pub access_token: String,
    pub id_token: String,
    /// Absent on grant shapes that do not return one; session resolution
    /// only requires the access and ID tokens.
    pub refresh_token: Option<String>,
    pub source: TokenSource,
    pub issued_at: OffsetDateTime,
}

/// A single profile attribute write, in the directory's `Name`/`Value`
/// wire shape (shared by the backend-mediated endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileAttribute {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl ProfileAttribute {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
