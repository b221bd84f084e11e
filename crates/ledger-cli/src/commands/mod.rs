//! CLI command implementations.

mod api;
mod auth;
mod monitoring;
mod routes;

pub use api::{profile_update, request, system_name};
pub use auth::{login, logout, register, status, whoami};
pub use monitoring::{monitoring_clear, monitoring_set};
pub use routes::{route_check, routes_list};

use anyhow::{Context as _, Result};
use ledger_config::{Config, Paths};
use ledger_session::{
    HttpAuthApi, HttpTransport, RecordingNavigator, ReqwestTransport, RequestPipeline, RouteGuard,
    SessionStore, TracingNotifier,
};
use ledger_storage::create_storage_sync;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Everything a command needs, wired once per invocation.
pub struct Context {
    pub session: Arc<SessionStore>,
    pub pipeline: RequestPipeline,
    pub guard: RouteGuard,
    pub navigator: Arc<RecordingNavigator>,
}

impl Context {
    /// Build the session subsystem over `paths` and restore persisted state.
    pub async fn open(paths: &Paths, config: &Config) -> Result<Self> {
        let storage = create_storage_sync(paths).context("Failed to open client storage")?;

        let transport: Arc<dyn HttpTransport> = Arc::new(
            ReqwestTransport::new(config.api_base_url()?, config.request_timeout())?
                .with_cookie_jar(storage.cookie_jar()),
        );
        let api = Arc::new(HttpAuthApi::new(transport.clone()));
        let session = Arc::new(SessionStore::new(storage, api));
        session.set_phase_callback(Box::new(|change| {
            debug!(previous = ?change.previous, phase = ?change.phase, "Session phase changed");
        }));

        let report = session.initialize_from_persisted().await;
        debug!(
            session = report.session_restored,
            monitoring = report.monitoring_restored,
            "Client state restored"
        );

        let navigator = Arc::new(RecordingNavigator::new());
        let pipeline = RequestPipeline::new(
            transport,
            session.clone(),
            Arc::new(TracingNotifier),
            navigator.clone(),
        );
        let guard = RouteGuard::new(session.clone());

        Ok(Self {
            session,
            pipeline,
            guard,
            navigator,
        })
    }
}

/// Parse a JSON object argument.
fn parse_object(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("Expected a JSON object")?;
    if !value.is_object() {
        anyhow::bail!("Expected a JSON object");
    }
    Ok(value)
}

/// Build an object from `key=value` pairs. Values that parse as JSON keep
/// their type; anything else is a string.
fn parse_fields(fields: &[String]) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for field in fields {
        let Some((key, raw)) = field.split_once('=') else {
            anyhow::bail!("Expected key=value, got '{}'", field);
        };
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        map.insert(key.trim().to_string(), value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_parse_fields_keeps_json_types() {
        let fields = parse_fields(&[
            "name=Lin".to_string(),
            "tenant_id=4".to_string(),
            "profile={\"phone\":\"123\"}".to_string(),
        ])
        .unwrap();
        assert_eq!(
            Value::Object(fields),
            json!({"name": "Lin", "tenant_id": 4, "profile": {"phone": "123"}})
        );
        assert!(parse_fields(&["oops".to_string()]).is_err());
    }

    #[test]
    fn test_parse_object_rejects_non_objects() {
        assert!(parse_object(r#"{"a":1}"#).is_ok());
        assert!(parse_object("[1]").is_err());
        assert!(parse_object("nope").is_err());
    }

    #[tokio::test]
    async fn test_context_restores_persisted_session() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        {
            let storage = create_storage_sync(&paths).unwrap();
            storage
                .persist_session("A", "R", &json!({"id": 1, "name": "Lin"}))
                .unwrap();
        }

        let ctx = Context::open(&paths, &Config::default()).await.unwrap();

        assert!(ctx.session.is_authenticated());
        assert_eq!(ctx.session.username(), "Lin");
        assert_eq!(ctx.guard.before_each("/login").destination(), "/dashboard");
    }
}
