//! Route guard: decides whether a protected page may render.
//!
//! States: `Checking` (initial) -> `Authorized` | `Redirecting`. Both outcomes
//! are terminal for a given (pathname, required codes) pair. Every failure is
//! handled fail-closed: the session is cleared and the user lands on login.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;

use super::evaluator::{evaluate, AccessDecision};
use super::principal::Principal;
use super::{no_permissions_location, RoutePermissionMap};
use crate::jwt;
use crate::navigator::{Navigator, LOGIN_PATH};
use crate::services::permissions::PermissionSource;
use crate::session::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    Checking,
    Authorized,
    /// Navigation was requested; children never render in this state
    Redirecting { to: String },
}

impl GuardState {
    pub fn renders_children(&self) -> bool {
        matches!(self, GuardState::Authorized)
    }
}

pub struct RouteGuard {
    permissions: Arc<dyn PermissionSource>,
    session: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    routes: RoutePermissionMap,
}

impl RouteGuard {
    pub fn new(
        permissions: Arc<dyn PermissionSource>,
        session: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            permissions,
            session,
            navigator,
            routes: RoutePermissionMap::erp_default(),
        }
    }

    pub fn with_routes(mut self, routes: RoutePermissionMap) -> Self {
        self.routes = routes;
        self
    }

    pub fn routes(&self) -> &RoutePermissionMap {
        &self.routes
    }

    /// Something the client can authenticate with: an unexpired access token,
    /// or a refresh token to renew an expired or missing one on the first 401.
    fn session_is_valid(&self) -> bool {
        if self.session.refresh_token().is_some() {
            return true;
        }
        match self.session.access_token() {
            Some(token) => jwt::inspect(&token, Utc::now()).is_usable(),
            None => false,
        }
    }

    /// A logout clears both tokens; a refresh only ever replaces them.
    fn session_survived(&self) -> bool {
        self.session.access_token().is_some() || self.session.refresh_token().is_some()
    }

    /// Computes the decision without side effects.
    pub async fn decide(&self, pathname: &str, required: &[String]) -> AccessDecision {
        if !self.session_is_valid() {
            tracing::debug!(pathname = %pathname, "no usable session");
            return AccessDecision::Unauthenticated;
        }

        let codes = match self.permissions.my_permission_codes().await {
            Ok(codes) => codes,
            Err(err) => {
                tracing::warn!(pathname = %pathname, error = %err, "permission check failed");
                return AccessDecision::Deny;
            }
        };

        // A logout elsewhere may have landed while the fetch was in flight.
        if !self.session_survived() {
            tracing::debug!(pathname = %pathname, "session ended during permission check");
            return AccessDecision::Unauthenticated;
        }

        evaluate(pathname, required, &Principal::from_codes(codes), &self.routes)
    }

    /// Performs the navigation and session side effects of `decision`.
    pub fn apply(&self, decision: AccessDecision) -> GuardState {
        match decision {
            AccessDecision::Grant => GuardState::Authorized,
            AccessDecision::Redirect(to) => {
                self.navigator.replace(&to);
                GuardState::Redirecting { to }
            }
            AccessDecision::Deny => self.end_session(no_permissions_location()),
            AccessDecision::Unauthenticated => self.end_session(LOGIN_PATH.to_string()),
        }
    }

    pub async fn check(&self, pathname: &str, required: &[String]) -> GuardState {
        let decision = self.decide(pathname, required).await;
        self.apply(decision)
    }

    fn end_session(&self, to: String) -> GuardState {
        if let Err(err) = self.session.clear() {
            tracing::warn!(error = %err, "failed to clear session store");
        }
        self.navigator.replace(&to);
        GuardState::Redirecting { to }
    }
}

/// One mounted instance of a protected page.
///
/// Checks are never cancelled. A result that arrives after [`unmount`] or
/// after a newer check has started is dropped without side effects.
///
/// [`unmount`]: ProtectedRoute::unmount
pub struct ProtectedRoute {
    guard: Arc<RouteGuard>,
    state: Mutex<GuardState>,
    last_key: Mutex<Option<(String, Vec<String>)>>,
    mounted: AtomicBool,
    generation: AtomicU64,
}

impl ProtectedRoute {
    pub fn mount(guard: Arc<RouteGuard>) -> Self {
        Self {
            guard,
            state: Mutex::new(GuardState::Checking),
            last_key: Mutex::new(None),
            mounted: AtomicBool::new(true),
            generation: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> GuardState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or(GuardState::Checking)
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub fn unmount(&self) {
        self.mounted.store(false, Ordering::SeqCst);
    }

    fn set_state(&self, state: GuardState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    /// Re-runs the check when `pathname` or `required` differ from the last call.
    pub async fn update(&self, pathname: &str, required: &[String]) -> GuardState {
        let key = (pathname.to_string(), required.to_vec());
        if let Ok(mut last) = self.last_key.lock() {
            if last.as_ref() == Some(&key) {
                return self.state();
            }
            *last = Some(key);
        }

        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(GuardState::Checking);

        let decision = self.guard.decide(pathname, required).await;

        if !self.is_mounted() || self.generation.load(Ordering::SeqCst) != ticket {
            tracing::debug!(pathname = %pathname, "discarding stale guard result");
            return self.state();
        }

        let state = self.guard.apply(decision);
        self.set_state(state.clone());
        state
    }
}
