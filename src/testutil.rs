//! Shared in-memory fakes for the capability boundaries.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use time::{Duration, OffsetDateTime};

use crate::directory::{DirectoryClient, DirectoryError, NativeSession};
use crate::oauth::OAuthConfig;
use crate::session::Navigator;
use crate::types::{ProfileAttribute, Username};

pub(crate) const CONFIRMATION_CODE: &str = "123456";

pub(crate) fn test_oauth_config(domain: &str) -> OAuthConfig {
    OAuthConfig::new(
        domain.parse().unwrap(),
        "test-client",
        "https://portal.example.edu/callback".parse().unwrap(),
    )
}

pub(crate) fn encode_id_token(payload: &str) -> String {
    format!("hdr.{}.sig", URL_SAFE_NO_PAD.encode(payload))
}

/// Token-endpoint success body for an externally-federated user.
pub(crate) fn sso_grant_response() -> serde_json::Value {
    serde_json::json!({
        "access_token": "acc-1",
        "id_token": encode_id_token(
            r#"{"sub":"u-1","email":"a@b.edu","identities":[{"providerName":"Google","providerType":"Google"}]}"#,
        ),
        "refresh_token": "ref-1",
    })
}

/// In-memory directory SDK.
#[derive(Default)]
pub(crate) struct FakeDirectory {
    accounts: Mutex<HashMap<String, String>>,
    /// What `current_session` reports; `authenticate` fills it in.
    pub native: Mutex<Option<NativeSession>>,
    /// Forced rejection message for `update_attributes`.
    pub update_error: Mutex<Option<String>>,
    pub authentications: AtomicUsize,
    pub session_checks: AtomicUsize,
    pub updates: AtomicUsize,
    pub signed_out: AtomicBool,
}

impl FakeDirectory {
    pub(crate) fn with_account(username: &str, password: &str) -> Self {
        let fake = Self::default();
        fake.accounts
            .lock()
            .unwrap()
            .insert(username.to_owned(), password.to_owned());
        fake
    }

    pub(crate) fn with_native_session(session: NativeSession) -> Self {
        let fake = Self::default();
        *fake.native.lock().unwrap() = Some(session);
        fake
    }

    pub(crate) fn native_session_for(username: &str) -> NativeSession {
        NativeSession {
            username: Username::from(username),
            access_token: format!("native-acc-{username}"),
            id_token: encode_id_token(&format!(r#"{{"sub":"{username}","email":"{username}"}}"#)),
            expires_at: OffsetDateTime::now_utc() + Duration::hours(1),
        }
    }
}

impl DirectoryClient for FakeDirectory {
    async fn authenticate(
        &self,
        username: &Username,
        password: &str,
    ) -> Result<NativeSession, DirectoryError> {
        self.authentications.fetch_add(1, Ordering::SeqCst);
        let stored = self.accounts.lock().unwrap().get(username.as_str()).cloned();
        match stored {
            Some(expected) if expected == password => {
                let session = Self::native_session_for(username.as_str());
                *self.native.lock().unwrap() = Some(session.clone());
                Ok(session)
            }
            _ => Err(DirectoryError::InvalidCredentials(
                "incorrect username or password".into(),
            )),
        }
    }

    async fn current_session(&self) -> Result<Option<NativeSession>, DirectoryError> {
        self.session_checks.fetch_add(1, Ordering::SeqCst);
        Ok(self.native.lock().unwrap().clone())
    }

    async fn update_attributes(&self, _: &[ProfileAttribute]) -> Result<(), DirectoryError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        match self.update_error.lock().unwrap().clone() {
            Some(message) => Err(DirectoryError::Rejected(message)),
            None => Ok(()),
        }
    }

    async fn sign_out(&self) -> Result<(), DirectoryError> {
        self.signed_out.store(true, Ordering::SeqCst);
        *self.native.lock().unwrap() = None;
        Ok(())
    }

    async fn sign_up(
        &self,
        username: &Username,
        password: &str,
        _: &[ProfileAttribute],
    ) -> Result<(), DirectoryError> {
        self.accounts
            .lock()
            .unwrap()
            .insert(username.as_str().to_owned(), password.to_owned());
        Ok(())
    }

    async fn confirm_registration(&self, _: &Username, code: &str) -> Result<(), DirectoryError> {
        if code == CONFIRMATION_CODE {
            Ok(())
        } else {
            Err(DirectoryError::Rejected("invalid confirmation code".into()))
        }
    }

    async fn request_password_reset(&self, _: &Username) -> Result<(), DirectoryError> {
        Ok(())
    }

    async fn confirm_password_reset(
        &self,
        username: &Username,
        code: &str,
        new_password: &str,
    ) -> Result<(), DirectoryError> {
        if code != CONFIRMATION_CODE {
            return Err(DirectoryError::Rejected("invalid reset code".into()));
        }
        self.accounts
            .lock()
            .unwrap()
            .insert(username.as_str().to_owned(), new_password.to_owned());
        Ok(())
    }
}

/// Navigator that counts location-bar strips.
#[derive(Debug, Default)]
pub(crate) struct RecordingNavigator {
    pub strips: AtomicUsize,
}

impl Navigator for RecordingNavigator {
    fn strip_authorization_code(&self) {
        self.strips.fetch_add(1, Ordering::SeqCst);
    }
}
