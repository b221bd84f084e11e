//! Session store with single-flight token refresh and FSM-tracked phases.
//!
//! `SessionStore` owns both authentication domains: the primary session
//! (access token, refresh token, user) and the independent monitoring session.
//! Every mutation goes through [`StorageSync`] so the persisted copy always
//! matches memory once the call returns. The phase machine only tracks
//! transient states (logging in, refreshing, signing out) for observers.

use crate::api::AuthApi;
use crate::phase::{PhaseChanged, PhaseInput, PhaseMachine, SessionPhase};
use crate::user::{Credentials, LoginUser, UserRecord};
use crate::{SessionError, SessionResult};
use async_trait::async_trait;
use ledger_storage::{CleanupReport, StorageSync};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Application title used until a system name is stored.
pub const DEFAULT_SYSTEM_NAME: &str = "Project Ledger";

/// Callback type for phase change notifications.
pub type PhaseCallback = Box<dyn Fn(PhaseChanged) + Send + Sync>;

/// Startup check run against a restored access token.
///
/// Token expiry is not tracked client-side, so the default validator accepts
/// every token and validity is discovered by the server returning 401.
#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate(&self, access_token: &str) -> SessionResult<()>;
}

/// Validator that accepts every token.
pub struct AcceptAllTokens;

#[async_trait]
impl TokenValidator for AcceptAllTokens {
    async fn validate(&self, _access_token: &str) -> SessionResult<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SessionState {
    access_token: String,
    refresh_token: String,
    user: Option<UserRecord>,
    /// Login and register calls in flight.
    loading: u32,
    system_name: Option<String>,
    monitoring_token: String,
    monitoring_user: Option<UserRecord>,
    /// Bumped whenever the primary session is replaced or cleared.
    generation: u64,
}

/// What `initialize_from_persisted` found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RestoreReport {
    pub session_restored: bool,
    pub user_corrupt: bool,
    pub monitoring_restored: bool,
    pub monitoring_user_corrupt: bool,
    pub system_name_restored: bool,
    /// The restored session failed validation and was logged out.
    pub validation_failed: bool,
}

/// Serializable status view. Never carries tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub is_authenticated: bool,
    pub is_monitoring_authenticated: bool,
    pub is_loading: bool,
    pub username: String,
    pub user_id: String,
    pub tenant_id: String,
    pub app_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monitoring_user: Option<Value>,
}

/// Owner of the primary and monitoring sessions.
pub struct SessionStore {
    storage: StorageSync,
    api: Arc<dyn AuthApi>,
    cookie_host: Option<String>,
    state: Mutex<SessionState>,
    fsm: Mutex<PhaseMachine>,
    phase_callback: Mutex<Option<PhaseCallback>>,
    validator: Box<dyn TokenValidator>,
    /// Serializes refresh attempts.
    refresh_gate: tokio::sync::Mutex<()>,
    /// Incremented after every completed refresh.
    refresh_epoch: AtomicU64,
    last_refresh_ok: AtomicBool,
}

/// Decrements the loading counter when dropped.
struct LoadingGuard<'a>(&'a SessionStore);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        state.loading = state.loading.saturating_sub(1);
    }
}

impl SessionStore {
    /// Create a store over `storage` talking to `api`.
    ///
    /// State starts empty; call [`initialize_from_persisted`](Self::initialize_from_persisted)
    /// to restore a previous session.
    pub fn new(storage: StorageSync, api: Arc<dyn AuthApi>) -> Self {
        let cookie_host = api.cookie_host();
        Self {
            storage,
            api,
            cookie_host,
            state: Mutex::new(SessionState::default()),
            fsm: Mutex::new(PhaseMachine::new()),
            phase_callback: Mutex::new(None),
            validator: Box::new(AcceptAllTokens),
            refresh_gate: tokio::sync::Mutex::new(()),
            refresh_epoch: AtomicU64::new(0),
            last_refresh_ok: AtomicBool::new(false),
        }
    }

    pub fn with_validator(mut self, validator: Box<dyn TokenValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Set a callback to be notified of phase changes.
    pub fn set_phase_callback(&self, callback: PhaseCallback) {
        *self.phase_callback.lock() = Some(callback);
    }

    pub fn storage(&self) -> &StorageSync {
        &self.storage
    }

    pub fn phase(&self) -> SessionPhase {
        SessionPhase::from(self.fsm.lock().state())
    }

    /// Apply `input` to the phase machine and notify on change.
    ///
    /// Inputs that do not apply in the current phase are ignored.
    fn transition(&self, input: PhaseInput) {
        let mut fsm = self.fsm.lock();
        let previous = SessionPhase::from(fsm.state());
        if fsm.consume(&input).is_err() {
            debug!(input = ?input, phase = ?previous, "Ignoring phase input");
            return;
        }
        let phase = SessionPhase::from(fsm.state());
        drop(fsm);

        if previous != phase {
            debug!(previous = ?previous, phase = ?phase, "Session phase transition");
            if let Some(callback) = self.phase_callback.lock().as_ref() {
                let user_id = self.state.lock().user.as_ref().and_then(UserRecord::id);
                callback(PhaseChanged {
                    previous,
                    phase,
                    user_id,
                });
            }
        }
    }

    fn begin_loading(&self) -> LoadingGuard<'_> {
        self.state.lock().loading += 1;
        LoadingGuard(self)
    }

    // ==========================================
    // Primary session
    // ==========================================

    /// Log in with email and password.
    ///
    /// On success the three session keys are persisted and the resolved user
    /// is returned. A response without an access or refresh token fails with
    /// [`SessionError::InvalidResponse`] and leaves state untouched;
    /// collaborator errors propagate unchanged.
    pub async fn login(&self, credentials: &Credentials) -> SessionResult<LoginUser> {
        self.transition(PhaseInput::LoginAttempt);

        let result = {
            let _loading = self.begin_loading();
            debug!(email = %credentials.email, "Logging in");
            self.api.login(credentials).await.and_then(|response| {
                self.apply_login(
                    response.access_token,
                    response.refresh_token,
                    response.user,
                    &credentials.email,
                )
            })
        };

        match &result {
            Ok(user) => {
                self.transition(PhaseInput::LoginSuccess);
                info!(
                    user_id = ?user.record().id(),
                    fallback_user = user.is_fallback(),
                    "Login successful"
                );
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                if self.is_authenticated() {
                    self.transition(PhaseInput::LoginFailedWithSession);
                } else {
                    self.transition(PhaseInput::LoginFailed);
                }
            }
        }
        result
    }

    fn apply_login(
        &self,
        access_token: Option<String>,
        refresh_token: Option<String>,
        user: Option<Value>,
        email: &str,
    ) -> SessionResult<LoginUser> {
        let access_token = access_token.ok_or_else(|| {
            SessionError::InvalidResponse("response carries no access token".to_string())
        })?;
        // Restore requires all three keys.
        let refresh_token = refresh_token.ok_or_else(|| {
            SessionError::InvalidResponse("response carries no refresh token".to_string())
        })?;

        let login_user = LoginUser::resolve(user, email);
        if login_user.is_fallback() {
            warn!("Login response has no user record, using a placeholder");
        }
        let record = login_user.clone().into_record();

        let mut state = self.state.lock();
        self.storage
            .persist_session(&access_token, &refresh_token, &record.to_value())?;
        state.access_token = access_token;
        state.refresh_token = refresh_token;
        state.user = Some(record);
        state.generation += 1;
        Ok(login_user)
    }

    /// Register a new account. Session state is not touched.
    pub async fn register(&self, user_data: &Value) -> SessionResult<Value> {
        let _loading = self.begin_loading();
        match self.api.register(user_data).await {
            Ok(created) => {
                info!("Registration successful");
                Ok(created)
            }
            Err(e) => {
                warn!(error = %e, "Registration failed");
                Err(e)
            }
        }
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns false without side effects when no refresh token is held. Any
    /// other failure logs out. Callers arriving while a refresh is running wait
    /// for it and share its result. A refresh whose session was cleared or
    /// replaced while it ran discards its token and returns false.
    pub async fn refresh_access_token(&self) -> bool {
        let observed_epoch = self.refresh_epoch.load(Ordering::SeqCst);
        let _gate = self.refresh_gate.lock().await;

        if self.refresh_epoch.load(Ordering::SeqCst) != observed_epoch {
            let ok = self.last_refresh_ok.load(Ordering::SeqCst);
            debug!(ok, "Joined a refresh that completed while waiting");
            return ok;
        }

        let ok = self.run_refresh().await;
        self.last_refresh_ok.store(ok, Ordering::SeqCst);
        self.refresh_epoch.fetch_add(1, Ordering::SeqCst);
        ok
    }

    async fn run_refresh(&self) -> bool {
        let (refresh_token, generation) = match self.refresh_token_snapshot() {
            Ok(held) => held,
            Err(e) => {
                debug!(error = %e, "Skipping refresh");
                return false;
            }
        };

        self.transition(PhaseInput::RefreshStarted);
        debug!("Refreshing access token");

        let result = self.api.refresh(&refresh_token).await.and_then(|response| {
            response.access_token.ok_or_else(|| {
                SessionError::InvalidResponse("refresh response carries no access token".into())
            })
        });

        let access_token = match result {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                if self.state.lock().generation == generation {
                    self.logout();
                }
                return false;
            }
        };

        let persisted = {
            let mut state = self.state.lock();
            if state.generation != generation {
                info!("Session changed during refresh, discarding new token");
                return false;
            }
            match self.storage.persist_access_token(&access_token) {
                Ok(()) => {
                    state.access_token = access_token;
                    Ok(())
                }
                Err(e) => Err(e),
            }
        };

        match persisted {
            Ok(()) => {
                self.transition(PhaseInput::RefreshSuccess);
                info!("Access token refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to persist refreshed token");
                self.logout();
                false
            }
        }
    }

    fn refresh_token_snapshot(&self) -> SessionResult<(String, u64)> {
        let state = self.state.lock();
        if state.refresh_token.is_empty() {
            return Err(SessionError::NoRefreshToken);
        }
        Ok((state.refresh_token.clone(), state.generation))
    }

    /// Clear the primary session from memory and every storage surface.
    ///
    /// Cleanup is best effort; the report lists what was removed and which
    /// surfaces failed. The monitoring session is left alone.
    pub fn logout(&self) -> CleanupReport {
        self.transition(PhaseInput::LogoutRequested);

        {
            let mut state = self.state.lock();
            state.access_token.clear();
            state.refresh_token.clear();
            state.user = None;
            state.loading = 0;
            state.generation += 1;
        }

        let report = self.storage.wipe_session(self.cookie_host.as_deref());

        self.transition(PhaseInput::LogoutComplete);
        info!(complete = report.is_complete(), "Logged out");
        report
    }

    /// Merge `partial` into the user record and persist it.
    ///
    /// Non-object input is ignored.
    pub fn update_user_info(&self, partial: &Value) -> SessionResult<()> {
        let Some(fields) = partial.as_object() else {
            debug!("Ignoring non-object user update");
            return Ok(());
        };

        let mut state = self.state.lock();
        let mut user = state.user.clone().unwrap_or_default();
        user.merge(fields);
        self.storage.persist_user(&user.to_value())?;
        state.user = Some(user);
        debug!(fields = fields.len(), "User info updated");
        Ok(())
    }

    /// Store `name` trimmed. Returns false and changes nothing when the
    /// trimmed name is empty.
    pub fn update_system_name(&self, name: &str) -> SessionResult<bool> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(false);
        }

        let mut state = self.state.lock();
        self.storage.persist_system_name(name)?;
        state.system_name = Some(name.to_string());
        Ok(true)
    }

    // ==========================================
    // Monitoring session
    // ==========================================

    pub fn set_monitoring_auth(&self, token: &str, user: UserRecord) -> SessionResult<()> {
        let mut state = self.state.lock();
        self.storage.persist_monitoring(token, &user.to_value())?;
        state.monitoring_token = token.to_string();
        state.monitoring_user = Some(user);
        info!("Monitoring session set");
        Ok(())
    }

    pub fn clear_monitoring_auth(&self) -> SessionResult<()> {
        let mut state = self.state.lock();
        state.monitoring_token.clear();
        state.monitoring_user = None;
        self.storage.clear_monitoring()?;
        info!("Monitoring session cleared");
        Ok(())
    }

    // ==========================================
    // Startup
    // ==========================================

    /// Restore persisted state on startup.
    ///
    /// Never fails: unreadable storage yields an empty store and a corrupt user
    /// record is restored as an empty user. A restored session that fails
    /// validation is logged out.
    pub async fn initialize_from_persisted(&self) -> RestoreReport {
        let mut report = RestoreReport::default();

        let persisted = match self.storage.load() {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted session, starting empty");
                return report;
            }
        };

        let restored_token = {
            let mut state = self.state.lock();

            if let Some(name) = persisted.system_name {
                state.system_name = Some(name);
                report.system_name_restored = true;
            }

            if let Some(monitoring) = persisted.monitoring {
                if monitoring.user_corrupt {
                    warn!(
                        error = %SessionError::PersistedStateCorrupt("monitoring_user".into()),
                        "Restoring monitoring session with an empty user"
                    );
                }
                state.monitoring_token = monitoring.token;
                state.monitoring_user = Some(
                    monitoring
                        .user
                        .and_then(UserRecord::from_value)
                        .unwrap_or_default(),
                );
                report.monitoring_restored = true;
                report.monitoring_user_corrupt = monitoring.user_corrupt;
            }

            persisted.session.map(|session| {
                if session.user_corrupt {
                    warn!(
                        error = %SessionError::PersistedStateCorrupt("user".into()),
                        "Restoring session with an empty user"
                    );
                }
                state.access_token = session.access_token.clone();
                state.refresh_token = session.refresh_token;
                state.user = Some(
                    session
                        .user
                        .and_then(UserRecord::from_value)
                        .unwrap_or_default(),
                );
                state.generation += 1;
                report.session_restored = true;
                report.user_corrupt = session.user_corrupt;
                session.access_token
            })
        };

        if let Some(token) = restored_token {
            self.transition(PhaseInput::SessionRestored);
            if let Err(e) = self.validator.validate(&token).await {
                warn!(error = %e, "Restored session failed validation, logging out");
                self.logout();
                report.validation_failed = true;
            }
        }

        info!(
            session = report.session_restored,
            monitoring = report.monitoring_restored,
            "Persisted state restored"
        );
        report
    }

    // ==========================================
    // Read accessors
    // ==========================================

    pub fn is_authenticated(&self) -> bool {
        !self.state.lock().access_token.is_empty()
    }

    pub fn is_monitoring_authenticated(&self) -> bool {
        !self.state.lock().monitoring_token.is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().loading > 0
    }

    /// Current access token; empty when signed out.
    pub fn access_token(&self) -> String {
        self.state.lock().access_token.clone()
    }

    pub fn refresh_token(&self) -> String {
        self.state.lock().refresh_token.clone()
    }

    pub fn user(&self) -> Option<UserRecord> {
        self.state.lock().user.clone()
    }

    pub fn monitoring_token(&self) -> String {
        self.state.lock().monitoring_token.clone()
    }

    pub fn monitoring_user(&self) -> Option<UserRecord> {
        self.state.lock().monitoring_user.clone()
    }

    pub fn username(&self) -> String {
        self.state
            .lock()
            .user
            .as_ref()
            .map(UserRecord::display_name)
            .unwrap_or_else(|| crate::user::DEFAULT_USERNAME.to_string())
    }

    pub fn user_id(&self) -> String {
        self.state
            .lock()
            .user
            .as_ref()
            .and_then(UserRecord::id)
            .unwrap_or_default()
    }

    pub fn tenant_id(&self) -> String {
        self.state
            .lock()
            .user
            .as_ref()
            .and_then(UserRecord::tenant_id)
            .unwrap_or_default()
    }

    pub fn system_name(&self) -> String {
        self.state
            .lock()
            .system_name
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_NAME.to_string())
    }

    pub fn app_title(&self) -> String {
        self.system_name()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let phase = self.phase();
        let state = self.state.lock();
        let user = state.user.as_ref();
        SessionSnapshot {
            phase,
            is_authenticated: !state.access_token.is_empty(),
            is_monitoring_authenticated: !state.monitoring_token.is_empty(),
            is_loading: state.loading > 0,
            username: user
                .map(UserRecord::display_name)
                .unwrap_or_else(|| crate::user::DEFAULT_USERNAME.to_string()),
            user_id: user.and_then(UserRecord::id).unwrap_or_default(),
            tenant_id: user.and_then(UserRecord::tenant_id).unwrap_or_default(),
            app_title: state
                .system_name
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_NAME.to_string()),
            user: user.map(UserRecord::to_value),
            monitoring_user: state.monitoring_user.as_ref().map(UserRecord::to_value),
        }
    }
}
