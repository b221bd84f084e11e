//! Pre-navigation access control.

use crate::routes::{self, RouteMeta, RouteTable};
use crate::store::SessionStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Session flags the guard decides on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthFlags {
    pub is_authenticated: bool,
    pub is_monitoring_authenticated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "to", rename_all = "snake_case")]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

/// Decide whether navigation to `target` may proceed. First match wins.
pub fn decide(meta: RouteMeta, target: &str, flags: AuthFlags) -> GuardDecision {
    if meta.requires_auth && !flags.is_authenticated {
        return GuardDecision::Redirect(routes::LOGIN);
    }
    if meta.requires_monitoring_auth && !flags.is_monitoring_authenticated {
        return GuardDecision::Redirect(routes::MONITORING_LOGIN);
    }
    if flags.is_authenticated && (target == routes::LOGIN || target == routes::REGISTER) {
        return GuardDecision::Redirect(routes::DASHBOARD);
    }
    if flags.is_monitoring_authenticated && target == routes::MONITORING_LOGIN {
        return GuardDecision::Redirect(routes::MONITORING_DASHBOARD);
    }
    GuardDecision::Allow
}

/// Result of evaluating one navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub requested: String,
    /// Path after static redirects.
    pub resolved: String,
    pub decision: GuardDecision,
}

impl Navigation {
    /// Where the shell ends up.
    pub fn destination(&self) -> &str {
        match self.decision {
            GuardDecision::Allow => &self.resolved,
            GuardDecision::Redirect(to) => to,
        }
    }
}

/// Evaluates navigations against the session store.
pub struct RouteGuard {
    session: Arc<SessionStore>,
    routes: RouteTable,
}

impl RouteGuard {
    pub fn new(session: Arc<SessionStore>) -> Self {
        Self::with_routes(session, RouteTable::standard())
    }

    pub fn with_routes(session: Arc<SessionStore>, routes: RouteTable) -> Self {
        Self { session, routes }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Evaluate navigation to `path`. Paths without a route are allowed.
    pub fn before_each(&self, path: &str) -> Navigation {
        let flags = AuthFlags {
            is_authenticated: self.session.is_authenticated(),
            is_monitoring_authenticated: self.session.is_monitoring_authenticated(),
        };

        let (resolved, meta) = match self.routes.resolve(path) {
            Some(route) => (route.path, route.meta),
            None => (path.to_string(), RouteMeta::default()),
        };

        let decision = decide(meta, &resolved, flags);
        debug!(path, resolved = %resolved, decision = ?decision, "Route guard evaluated");
        Navigation {
            requested: path.to_string(),
            resolved,
            decision,
        }
    }
}
