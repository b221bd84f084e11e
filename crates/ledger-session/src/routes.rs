//! Application route table.

use std::collections::BTreeMap;

pub const ROOT: &str = "/";
pub const LOGIN: &str = "/login";
pub const REGISTER: &str = "/register";
pub const DASHBOARD: &str = "/dashboard";
pub const MONITORING_LOGIN: &str = "/monitoring/login";
pub const MONITORING_DASHBOARD: &str = "/monitoring/dashboard";

/// Access requirements attached to a route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    pub requires_auth: bool,
    pub requires_monitoring_auth: bool,
}

impl RouteMeta {
    pub const PUBLIC: RouteMeta = RouteMeta {
        requires_auth: false,
        requires_monitoring_auth: false,
    };
    pub const AUTH: RouteMeta = RouteMeta {
        requires_auth: true,
        requires_monitoring_auth: false,
    };
    pub const MONITORING: RouteMeta = RouteMeta {
        requires_auth: false,
        requires_monitoring_auth: true,
    };
}

/// One entry of the route table. Segments starting with `:` match any value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub pattern: &'static str,
    pub name: &'static str,
    pub meta: RouteMeta,
    pub redirect: Option<&'static str>,
}

impl Route {
    pub const fn page(pattern: &'static str, name: &'static str, meta: RouteMeta) -> Self {
        Self {
            pattern,
            name,
            meta,
            redirect: None,
        }
    }

    pub const fn redirect(pattern: &'static str, to: &'static str) -> Self {
        Self {
            pattern,
            name: "",
            meta: RouteMeta::PUBLIC,
            redirect: Some(to),
        }
    }

    fn match_path(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let pattern: Vec<&str> = segments(self.pattern).collect();
        let actual: Vec<&str> = segments(path).collect();
        if pattern.len() != actual.len() {
            return None;
        }

        let mut params = BTreeMap::new();
        for (expected, value) in pattern.iter().zip(&actual) {
            match expected.strip_prefix(':') {
                Some(param) => {
                    params.insert(param.to_string(), value.to_string());
                }
                None if expected == value => {}
                None => return None,
            }
        }
        Some(params)
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// A path resolved against the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// Path after following a static redirect.
    pub path: String,
    pub name: &'static str,
    pub meta: RouteMeta,
    pub params: BTreeMap<String, String>,
    pub redirected_from: Option<String>,
}

/// Ordered route table; the first matching entry wins.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The client's routes.
    pub fn standard() -> Self {
        use RouteMeta as M;
        Self::new(vec![
            Route::redirect(ROOT, DASHBOARD),
            Route::page(LOGIN, "Login", M::PUBLIC),
            Route::page(REGISTER, "Register", M::PUBLIC),
            Route::page(DASHBOARD, "Dashboard", M::AUTH),
            Route::page("/projects", "Projects", M::AUTH),
            Route::page("/projects/new", "ProjectCreate", M::AUTH),
            Route::page("/projects/:id", "ProjectDetail", M::AUTH),
            Route::page("/projects/:id/edit", "ProjectEdit", M::AUTH),
            Route::page("/transactions", "Transactions", M::AUTH),
            Route::page("/categories", "Categories", M::AUTH),
            Route::page("/reports", "Reports", M::AUTH),
            Route::page("/suppliers", "Suppliers", M::AUTH),
            Route::page("/settings", "Settings", M::AUTH),
            Route::page("/profile", "Profile", M::AUTH),
            Route::page(MONITORING_LOGIN, "MonitoringLogin", M::PUBLIC),
            Route::page(MONITORING_DASHBOARD, "MonitoringDashboard", M::MONITORING),
            Route::page("/monitoring/tenants", "MonitoringTenants", M::MONITORING),
            Route::page("/monitoring/logs", "MonitoringLogs", M::MONITORING),
            Route::page("/monitoring/health", "MonitoringHealth", M::MONITORING),
        ])
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Resolve `path`, ignoring any query string or fragment.
    ///
    /// A static redirect is followed once. Unknown paths return `None`.
    pub fn resolve(&self, path: &str) -> Option<ResolvedRoute> {
        let path = normalize(path);
        let (route, params) = self.find(&path)?;

        match route.redirect {
            Some(target) => {
                let (target_route, params) = self.find(target)?;
                Some(ResolvedRoute {
                    path: target.to_string(),
                    name: target_route.name,
                    meta: target_route.meta,
                    params,
                    redirected_from: Some(path),
                })
            }
            None => Some(ResolvedRoute {
                path,
                name: route.name,
                meta: route.meta,
                params,
                redirected_from: None,
            }),
        }
    }

    fn find(&self, path: &str) -> Option<(&Route, BTreeMap<String, String>)> {
        self.routes
            .iter()
            .find_map(|route| route.match_path(path).map(|params| (route, params)))
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        ROOT.to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
