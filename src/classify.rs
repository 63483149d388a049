//! Runtime detection of which authentication mechanism produced the
//! active session.
//!
//! Claims win when they carry an `identities` list; a time-bounded storage
//! flag covers the gap where claims have not yet propagated after a fresh
//! SSO login. This is routing policy, not a security boundary: a wrong
//! answer degrades into the profile router's cross-fallback.

use time::{Duration, OffsetDateTime};

use crate::claims::{ClaimsView, FederatedIdentity};
use crate::store::{CredentialStore, TOKEN_SOURCE_KEY, TOKEN_TIMESTAMP_KEY};
use crate::types::TokenSource;

/// How long a persisted SSO flag may be trusted. Older flags are
/// discarded, never used to classify.
pub const FLAG_FRESHNESS: Duration = Duration::hours(1);

/// Write the classification flag (source + observation time).
pub(crate) fn write_flag(store: &CredentialStore, source: TokenSource, observed_at: OffsetDateTime) {
    store.set(TOKEN_SOURCE_KEY, source.as_str());
    store.set(TOKEN_TIMESTAMP_KEY, &observed_at.unix_timestamp().to_string());
}

/// Read the flag. A flag with a missing or unparseable timestamp cannot be
/// freshness-bounded, so it reads as absent.
pub(crate) fn read_flag(store: &CredentialStore) -> Option<(TokenSource, OffsetDateTime)> {
    let source = TokenSource::from_flag(&store.get(TOKEN_SOURCE_KEY)?)?;
    let seconds = store.get(TOKEN_TIMESTAMP_KEY)?.parse::<i64>().ok()?;
    let observed_at = OffsetDateTime::from_unix_timestamp(seconds).ok()?;
    Some((source, observed_at))
}

pub(crate) fn discard_flag(store: &CredentialStore) {
    store.remove(TOKEN_SOURCE_KEY);
    store.remove(TOKEN_TIMESTAMP_KEY);
}

/// Decides whether the active session originated from direct login or SSO.
#[derive(Debug, Clone)]
pub struct IdentityClassifier {
    store: CredentialStore,
}

impl IdentityClassifier {
    #[must_use]
    pub fn new(store: CredentialStore) -> Self {
        Self { store }
    }

    /// Classify the active session from the claims view, falling back to
    /// the persisted flag.
    #[must_use]
    pub fn classify(&self, view: &ClaimsView) -> TokenSource {
        self.classify_at(view, OffsetDateTime::now_utc())
    }

    /// Deterministic given identical claims and flag-store state.
    #[must_use]
    pub fn classify_at(&self, view: &ClaimsView, now: OffsetDateTime) -> TokenSource {
        if let ClaimsView::Present { identities } = view {
            if identities.first().is_some_and(FederatedIdentity::is_external) {
                write_flag(&self.store, TokenSource::Sso, now);
                return TokenSource::Sso;
            }
        }

        match read_flag(&self.store) {
            Some((TokenSource::Sso, observed_at)) if now - observed_at <= FLAG_FRESHNESS => {
                return TokenSource::Sso;
            }
            Some((TokenSource::Sso, observed_at)) => {
                tracing::debug!(?observed_at, "discarding stale SSO classification flag");
                discard_flag(&self.store);
            }
            _ => {}
        }

        TokenSource::Direct
    }
}
