//! High-level API for persisting session fields.

use crate::cookies::ancestor_domains;
use crate::{CookieJar, KeyValueStore, LocalDatabases, MemoryStorage, StorageKeys, StorageResult};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Primary session fields read back from the durable store.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSession {
    pub access_token: String,
    pub refresh_token: String,
    /// `None` when the stored record was unparsable (see `user_corrupt`).
    pub user: Option<Value>,
    pub user_corrupt: bool,
}

/// Monitoring session fields read back from the durable store.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedMonitoring {
    pub token: String,
    pub user: Option<Value>,
    pub user_corrupt: bool,
}

/// Everything restored on startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedState {
    pub session: Option<PersistedSession>,
    pub system_name: Option<String>,
    pub monitoring: Option<PersistedMonitoring>,
}

/// One storage surface that could not be cleaned.
#[derive(Debug, Clone, Serialize)]
pub struct SurfaceFailure {
    pub surface: &'static str,
    pub message: String,
}

/// What a logout wipe removed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub durable_keys_removed: Vec<String>,
    pub volatile_keys_removed: usize,
    pub cookies_expired: usize,
    pub databases_removed: Vec<String>,
    pub failures: Vec<SurfaceFailure>,
}

impl CleanupReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, surface: &'static str, message: impl ToString) {
        let message = message.to_string();
        warn!(surface, error = %message, "Session cleanup step failed");
        self.failures.push(SurfaceFailure { surface, message });
    }
}

/// Reads and writes session fields across every storage surface.
pub struct StorageSync {
    durable: Box<dyn KeyValueStore>,
    volatile: Box<dyn KeyValueStore>,
    cookies: Arc<CookieJar>,
    databases: Option<LocalDatabases>,
}

impl StorageSync {
    /// Create a sync layer over `durable` with an in-memory volatile store and cookie jar.
    pub fn new(durable: Box<dyn KeyValueStore>) -> Self {
        Self {
            durable,
            volatile: Box::new(MemoryStorage::new()),
            cookies: Arc::new(CookieJar::in_memory()),
            databases: None,
        }
    }

    /// Everything in memory; used by tests and ephemeral shells.
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    pub fn with_volatile(mut self, volatile: Box<dyn KeyValueStore>) -> Self {
        self.volatile = volatile;
        self
    }

    pub fn with_cookie_jar(mut self, cookies: Arc<CookieJar>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_databases(mut self, databases: LocalDatabases) -> Self {
        self.databases = Some(databases);
        self
    }

    pub fn durable(&self) -> &dyn KeyValueStore {
        self.durable.as_ref()
    }

    pub fn volatile(&self) -> &dyn KeyValueStore {
        self.volatile.as_ref()
    }

    /// Shared handle to the cookie jar, also used by the HTTP transport.
    pub fn cookie_jar(&self) -> Arc<CookieJar> {
        self.cookies.clone()
    }

    pub fn databases(&self) -> Option<&LocalDatabases> {
        self.databases.as_ref()
    }

    // ==========================================
    // Primary session
    // ==========================================

    /// Store all three primary session fields.
    pub fn persist_session(
        &self,
        access_token: &str,
        refresh_token: &str,
        user: &Value,
    ) -> StorageResult<()> {
        self.durable.set(StorageKeys::ACCESS_TOKEN, access_token)?;
        self.durable.set(StorageKeys::REFRESH_TOKEN, refresh_token)?;
        self.persist_user(user)
    }

    pub fn persist_access_token(&self, access_token: &str) -> StorageResult<()> {
        self.durable.set(StorageKeys::ACCESS_TOKEN, access_token)
    }

    pub fn persist_user(&self, user: &Value) -> StorageResult<()> {
        self.durable
            .set(StorageKeys::USER, &serde_json::to_string(user)?)
    }

    pub fn persist_system_name(&self, name: &str) -> StorageResult<()> {
        self.durable.set(StorageKeys::SYSTEM_NAME, name)
    }

    // ==========================================
    // Monitoring session
    // ==========================================

    pub fn persist_monitoring(&self, token: &str, user: &Value) -> StorageResult<()> {
        self.durable.set(StorageKeys::MONITORING_TOKEN, token)?;
        self.durable
            .set(StorageKeys::MONITORING_USER, &serde_json::to_string(user)?)
    }

    pub fn clear_monitoring(&self) -> StorageResult<()> {
        self.durable.delete(StorageKeys::MONITORING_TOKEN)?;
        self.durable.delete(StorageKeys::MONITORING_USER)?;
        Ok(())
    }

    // ==========================================
    // Restore
    // ==========================================

    /// Read back everything persisted.
    ///
    /// The primary session is restored only when token, refresh token and user
    /// are all present; the monitoring session when both of its keys are.
    /// Unparsable user records come back as `None` with the corrupt flag set.
    pub fn load(&self) -> StorageResult<PersistedState> {
        let token = self.durable.get(StorageKeys::ACCESS_TOKEN)?;
        let refresh = self.durable.get(StorageKeys::REFRESH_TOKEN)?;
        let user = self.durable.get(StorageKeys::USER)?;

        let session = match (token, refresh, user) {
            (Some(access_token), Some(refresh_token), Some(raw_user))
                if !access_token.is_empty() && !refresh_token.is_empty() && !raw_user.is_empty() =>
            {
                let (user, user_corrupt) = parse_record(StorageKeys::USER, &raw_user);
                Some(PersistedSession {
                    access_token,
                    refresh_token,
                    user,
                    user_corrupt,
                })
            }
            _ => None,
        };

        let monitoring = match (
            self.durable.get(StorageKeys::MONITORING_TOKEN)?,
            self.durable.get(StorageKeys::MONITORING_USER)?,
        ) {
            (Some(token), Some(raw_user)) if !token.is_empty() && !raw_user.is_empty() => {
                let (user, user_corrupt) = parse_record(StorageKeys::MONITORING_USER, &raw_user);
                Some(PersistedMonitoring {
                    token,
                    user,
                    user_corrupt,
                })
            }
            _ => None,
        };

        let system_name = self
            .durable
            .get(StorageKeys::SYSTEM_NAME)?
            .filter(|name| !name.is_empty());

        Ok(PersistedState {
            session,
            system_name,
            monitoring,
        })
    }

    // ==========================================
    // Logout cleanup
    // ==========================================

    /// Best-effort wipe of primary session state from every surface.
    ///
    /// `cookie_host` is the host whose cookies are expired; each cookie name is
    /// expired host-only, for the host itself, and for every ancestor domain.
    /// Failures are recorded in the report and never stop later steps.
    /// Monitoring keys are left alone.
    pub fn wipe_session(&self, cookie_host: Option<&str>) -> CleanupReport {
        let mut report = CleanupReport::default();

        for key in [
            StorageKeys::ACCESS_TOKEN,
            StorageKeys::REFRESH_TOKEN,
            StorageKeys::USER,
        ] {
            match self.durable.delete(key) {
                Ok(true) => report.durable_keys_removed.push(key.to_string()),
                Ok(false) => {}
                Err(e) => report.fail("durable", e),
            }
        }

        match self.volatile.clear() {
            Ok(removed) => report.volatile_keys_removed = removed,
            Err(e) => report.fail("volatile", e),
        }

        self.expire_cookies(cookie_host, &mut report);

        if let Some(databases) = &self.databases {
            match databases.delete_all() {
                Ok((deleted, failed)) => {
                    report.databases_removed = deleted;
                    for name in failed {
                        report.fail("databases", format!("could not delete {}", name));
                    }
                }
                Err(e) => report.fail("databases", e),
            }
        }

        self.scan_residual_keys(&mut report);

        info!(
            durable_keys = report.durable_keys_removed.len(),
            volatile_keys = report.volatile_keys_removed,
            cookies = report.cookies_expired,
            databases = report.databases_removed.len(),
            failures = report.failures.len(),
            "Session storage wiped"
        );
        report
    }

    fn expire_cookies(&self, cookie_host: Option<&str>, report: &mut CleanupReport) {
        let Some(host) = cookie_host else {
            match self.cookies.clear() {
                Ok(removed) => report.cookies_expired += removed,
                Err(e) => report.fail("cookies", e),
            }
            return;
        };

        let mut scopes: Vec<Option<String>> = vec![None, Some(host.to_string())];
        scopes.extend(ancestor_domains(host).into_iter().map(Some));

        for name in self.cookies.names_for(host) {
            for scope in &scopes {
                match self.cookies.expire(&name, host, scope.as_deref()) {
                    Ok(removed) => report.cookies_expired += removed,
                    Err(e) => report.fail("cookies", e),
                }
            }
        }
    }

    fn scan_residual_keys(&self, report: &mut CleanupReport) {
        let keys = match self.durable.keys() {
            Ok(keys) => keys,
            Err(e) => {
                report.fail("durable", e);
                return;
            }
        };

        for key in keys {
            if StorageKeys::MONITORING_KEYS.contains(&key.as_str()) {
                continue;
            }
            if !StorageKeys::LOGOUT_SCAN_FRAGMENTS
                .iter()
                .any(|fragment| key.contains(fragment))
            {
                continue;
            }
            match self.durable.delete(&key) {
                Ok(true) => {
                    debug!(key = %key, "Removed residual session key");
                    report.durable_keys_removed.push(key);
                }
                Ok(false) => {}
                Err(e) => report.fail("durable", e),
            }
        }
    }
}

fn parse_record(key: &str, raw: &str) -> (Option<Value>, bool) {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => (Some(value), false),
        Ok(Value::Null) => (None, false),
        Ok(_) => {
            warn!(key, "Persisted record is not an object, ignoring it");
            (None, true)
        }
        Err(e) => {
            warn!(key, error = %e, "Persisted record is corrupt, ignoring it");
            (None, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;
    use serde_json::json;
    use tempfile::tempdir;

    /// Durable store whose deletes always fail.
    struct FailingDeletes(MemoryStorage);

    impl KeyValueStore for FailingDeletes {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            self.0.set(key, value)
        }
        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.0.get(key)
        }
        fn delete(&self, _key: &str) -> StorageResult<bool> {
            Err(StorageError::Backend("read-only".to_string()))
        }
        fn keys(&self) -> StorageResult<Vec<String>> {
            self.0.keys()
        }
    }

    #[test]
    fn test_persist_session_writes_three_keys() {
        let sync = StorageSync::in_memory();
        sync.persist_session("A", "R", &json!({"id": 1, "name": "x"}))
            .unwrap();

        let durable = sync.durable();
        assert_eq!(durable.get("token").unwrap().as_deref(), Some("A"));
        assert_eq!(durable.get("refresh_token").unwrap().as_deref(), Some("R"));
        let user: Value = serde_json::from_str(&durable.get("user").unwrap().unwrap()).unwrap();
        assert_eq!(user, json!({"id": 1, "name": "x"}));
        assert_eq!(durable.keys().unwrap().len(), 3);
    }

    #[test]
    fn test_load_requires_all_primary_fields() {
        let sync = StorageSync::in_memory();
        sync.persist_access_token("A").unwrap();
        assert!(sync.load().unwrap().session.is_none());

        sync.persist_session("A", "R", &json!({"id": 1})).unwrap();
        let session = sync.load().unwrap().session.unwrap();
        assert_eq!(session.access_token, "A");
        assert_eq!(session.user, Some(json!({"id": 1})));
        assert!(!session.user_corrupt);
    }

    #[test]
    fn test_load_recovers_from_corrupt_user() {
        let sync = StorageSync::in_memory();
        sync.persist_access_token("A").unwrap();
        sync.durable().set("refresh_token", "R").unwrap();
        sync.durable().set("user", "{broken").unwrap();
        sync.durable().set("monitoring_token", "M").unwrap();
        sync.durable().set("monitoring_user", "[1,2]").unwrap();

        let state = sync.load().unwrap();
        let session = state.session.unwrap();
        assert_eq!(session.access_token, "A");
        assert!(session.user.is_none());
        assert!(session.user_corrupt);

        let monitoring = state.monitoring.unwrap();
        assert_eq!(monitoring.token, "M");
        assert!(monitoring.user_corrupt);
    }

    #[test]
    fn test_monitoring_round_trip_and_clear() {
        let sync = StorageSync::in_memory();
        sync.persist_monitoring("M", &json!({"id": "admin"})).unwrap();

        let monitoring = sync.load().unwrap().monitoring.unwrap();
        assert_eq!(monitoring.user, Some(json!({"id": "admin"})));

        sync.clear_monitoring().unwrap();
        assert!(sync.load().unwrap().monitoring.is_none());
    }

    #[test]
    fn test_wipe_removes_session_and_residual_keys_only() {
        let sync = StorageSync::in_memory();
        sync.persist_session("A", "R", &json!({"id": 1})).unwrap();
        sync.persist_system_name("Ledger").unwrap();
        sync.persist_monitoring("M", &json!({})).unwrap();
        sync.durable().set("auth_state", "x").unwrap();
        sync.durable().set("last_user_seen", "x").unwrap();
        sync.durable().set("theme", "dark").unwrap();
        sync.volatile().set("draft", "x").unwrap();

        let report = sync.wipe_session(None);
        assert!(report.is_complete());
        assert_eq!(report.volatile_keys_removed, 1);

        let mut remaining = sync.durable().keys().unwrap();
        remaining.sort();
        assert_eq!(
            remaining,
            vec!["monitoring_token", "monitoring_user", "systemName", "theme"]
        );
        assert!(report.durable_keys_removed.contains(&"auth_state".to_string()));
        assert!(report.durable_keys_removed.contains(&"last_user_seen".to_string()));
    }

    #[test]
    fn test_wipe_walks_cookie_domains() {
        let jar = Arc::new(CookieJar::in_memory());
        jar.store_set_cookie("app.ledger.example.com", "sid=1").unwrap();
        jar.store_set_cookie("app.ledger.example.com", "sid=2; Domain=.example.com")
            .unwrap();
        jar.store_set_cookie("app.ledger.example.com", "csrf=3; Domain=ledger.example.com")
            .unwrap();
        jar.store_set_cookie("other.org", "keep=1").unwrap();

        let sync = StorageSync::in_memory().with_cookie_jar(jar.clone());
        let report = sync.wipe_session(Some("app.ledger.example.com"));

        assert_eq!(report.cookies_expired, 3);
        let remaining: Vec<String> = jar.all().into_iter().map(|c| c.name).collect();
        assert_eq!(remaining, vec!["keep"]);
    }

    #[test]
    fn test_wipe_continues_after_surface_failure() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("offline.db"), b"x").unwrap();

        let durable = FailingDeletes(MemoryStorage::new());
        durable.set("token", "A").unwrap();
        let sync = StorageSync::new(Box::new(durable))
            .with_databases(LocalDatabases::new(dir.path()));
        sync.volatile().set("draft", "x").unwrap();
        sync.cookie_jar().store_set_cookie("localhost", "sid=1").unwrap();

        let report = sync.wipe_session(Some("localhost"));

        assert!(!report.is_complete());
        assert!(report.failures.iter().all(|f| f.surface == "durable"));
        assert_eq!(report.volatile_keys_removed, 1);
        assert_eq!(report.cookies_expired, 1);
        assert_eq!(report.databases_removed, vec!["offline.db"]);
    }

    #[test]
    fn test_volatile_failure_does_not_block_durable_wipe() {
        let volatile = FailingDeletes(MemoryStorage::new());
        volatile.set("draft", "x").unwrap();
        let sync = StorageSync::in_memory().with_volatile(Box::new(volatile));
        sync.persist_session("A", "R", &json!({"id": 1})).unwrap();

        let report = sync.wipe_session(None);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].surface, "volatile");
        assert_eq!(report.durable_keys_removed, vec!["token", "refresh_token", "user"]);
        assert!(sync.load().unwrap().session.is_none());
        assert!(sync.volatile().has("draft").unwrap());
    }
}
