//! Route protection without flicker.
//!
//! A guard starts in `Checking` (the view renders a loading placeholder),
//! resolves once, and is terminal for its mount: a fresh mount constructs
//! a fresh guard. Dropping the in-flight `resolve` future is a clean
//! cancellation — no state is written until resolution completes.

use crate::directory::DirectoryClient;
use crate::session::SessionManager;

/// Guard state for one mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// Session check in flight; render a loading placeholder.
    Checking,
    /// Render the guarded subtree.
    Authorized,
    /// Redirect to the login entry point.
    Unauthorized { redirect_to: String },
}

#[derive(Debug)]
pub struct RouteGuard {
    login_path: String,
    state: GuardState,
}

impl RouteGuard {
    #[must_use]
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
            state: GuardState::Checking,
        }
    }

    #[must_use]
    pub fn state(&self) -> &GuardState {
        &self.state
    }

    /// Run the session check once. Any resolution failure — no session,
    /// invalid session, storage error — lands in `Unauthorized`; there is
    /// no automatic retry.
    pub async fn resolve<D: DirectoryClient>(&mut self, sessions: &SessionManager<D>) -> &GuardState {
        if self.state != GuardState::Checking {
            return &self.state;
        }

        self.state = match sessions.current_session().await {
            Ok(_) => GuardState::Authorized,
            Err(e) => {
                tracing::debug!(error = %e, "route guard denying access");
                GuardState::Unauthorized {
                    redirect_to: self.login_path.clone(),
                }
            }
        };
        &self.state
    }
}
