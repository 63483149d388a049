//! Decoded ID-token claims and the classifier-facing view of them.
//!
//! Claims are read-only and derived: they are decoded from the ID token on
//! demand and never persisted separately from the token itself.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;

use crate::error::Error;

/// Decoded payload of an ID token.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct IdentityClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    /// Federated identities that produced this token. The provider emits
    /// this either as a JSON array or as a JSON-encoded string holding one;
    /// both shapes decode here, and an unparseable value reads as absent.
    #[serde(default, deserialize_with = "identities_list")]
    pub identities: Option<Vec<FederatedIdentity>>,
}

/// One entry of the `identities` claim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[non_exhaustive]
pub struct FederatedIdentity {
    #[serde(rename = "providerName", default)]
    pub provider_name: String,
    #[serde(rename = "providerType", default)]
    pub provider_type: String,
}

impl FederatedIdentity {
    /// Whether this entry marks an external (non-password) identity source.
    #[must_use]
    pub fn is_external(&self) -> bool {
        !self.provider_type.is_empty() && !self.provider_type.eq_ignore_ascii_case("password")
    }
}

/// Classifier-facing view of the claims, parsed once at the boundary and
/// never inspected ad hoc downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimsView {
    /// Claims carried a parseable `identities` list.
    Present { identities: Vec<FederatedIdentity> },
    /// No claims available, or claims without an `identities` list.
    Absent,
}

impl ClaimsView {
    #[must_use]
    pub fn from_claims(claims: Option<&IdentityClaims>) -> Self {
        match claims.and_then(|c| c.identities.clone()) {
            Some(identities) => Self::Present { identities },
            None => Self::Absent,
        }
    }
}

/// Decodes the middle segment of an ID token as base64url JSON claims.
///
/// Signature and expiry validation are the identity provider's concern;
/// this is a structural decode only.
///
/// # Errors
///
/// Returns [`Error::Token`] if the token does not have three segments or
/// the payload is not valid base64url JSON.
pub fn decode_id_token(token: &str) -> Result<IdentityClaims, Error> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(Error::Token("expected three token segments".into()));
    };

    // Tolerate padded emitters.
    let payload = payload.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| Error::Token(format!("payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes).map_err(|e| Error::Token(format!("payload is not JSON: {e}")))
}

fn identities_list<'de, D>(deserializer: D) -> Result<Option<Vec<FederatedIdentity>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value.and_then(parse_identities))
}

fn parse_identities(value: JsonValue) -> Option<Vec<FederatedIdentity>> {
    match value {
        JsonValue::Array(_) => serde_json::from_value(value).ok(),
        // Nested JSON string, as emitted by the directory's token service.
        JsonValue::String(inner) => serde_json::from_str(&inner).ok(),
        _ => None,
    }
}
