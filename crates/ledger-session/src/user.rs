//! User records and login credentials.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Fallback display name when the user record has none.
pub const DEFAULT_USERNAME: &str = "User";

/// Email/password pair sent to the login endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// A user record as returned by the API.
///
/// Known fields have accessors; everything else is kept verbatim so updates
/// can carry arbitrary fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(Map<String, Value>);

impl UserRecord {
    /// Accept only JSON objects.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Record used when the login response carries no usable user.
    pub fn placeholder(email: &str) -> Self {
        let mut map = Map::new();
        map.insert("id".into(), Value::String("unknown".into()));
        map.insert("name".into(), Value::String(DEFAULT_USERNAME.into()));
        map.insert("email".into(), Value::String(email.into()));
        map.insert("username".into(), Value::String(email.into()));
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// `id` rendered as text; numbers and strings are both accepted.
    pub fn id(&self) -> Option<String> {
        self.0.get("id").and_then(scalar_text)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    pub fn tenant_id(&self) -> Option<String> {
        self.0.get("tenant_id").and_then(scalar_text)
    }

    pub fn profile(&self) -> Option<&Map<String, Value>> {
        self.0.get("profile").and_then(Value::as_object)
    }

    /// `profile.name`, then `name`, then `username`, then [`DEFAULT_USERNAME`].
    pub fn display_name(&self) -> String {
        self.profile()
            .and_then(|p| p.get("name"))
            .and_then(Value::as_str)
            .or_else(|| self.name())
            .or_else(|| self.0.get("username").and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_USERNAME)
            .to_string()
    }

    /// Merge `partial` into this record.
    ///
    /// Top-level fields are overwritten. An object-valued `profile` is merged
    /// one level deep so sibling profile fields survive.
    pub fn merge(&mut self, partial: &Map<String, Value>) {
        for (key, value) in partial {
            match (key.as_str(), value) {
                ("profile", Value::Object(incoming)) => {
                    let mut profile = self.profile().cloned().unwrap_or_default();
                    for (field, field_value) in incoming {
                        profile.insert(field.clone(), field_value.clone());
                    }
                    self.0.insert(key.clone(), Value::Object(profile));
                }
                _ => {
                    self.0.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// User carried by a login response, decided once at the API boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginUser {
    /// The response carried a user object.
    Parsed(UserRecord),
    /// The user field was missing or not an object; a placeholder was built.
    Fallback(UserRecord),
}

impl LoginUser {
    pub fn resolve(user: Option<Value>, email: &str) -> Self {
        match user.and_then(UserRecord::from_value) {
            Some(record) => LoginUser::Parsed(record),
            None => LoginUser::Fallback(UserRecord::placeholder(email)),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, LoginUser::Fallback(_))
    }

    pub fn record(&self) -> &UserRecord {
        match self {
            LoginUser::Parsed(record) | LoginUser::Fallback(record) => record,
        }
    }

    pub fn into_record(self) -> UserRecord {
        match self {
            LoginUser::Parsed(record) | LoginUser::Fallback(record) => record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> UserRecord {
        UserRecord::from_value(value).unwrap()
    }

    #[test]
    fn test_accessors() {
        let user = record(json!({
            "id": 7,
            "name": "Wei",
            "email": "wei@example.com",
            "tenant_id": "t-1",
            "profile": {"name": "Wei Zhang"}
        }));

        assert_eq!(user.id().as_deref(), Some("7"));
        assert_eq!(user.email(), Some("wei@example.com"));
        assert_eq!(user.tenant_id().as_deref(), Some("t-1"));
        assert_eq!(user.display_name(), "Wei Zhang");
    }

    #[test]
    fn test_display_name_fallbacks() {
        assert_eq!(record(json!({"name": "Li"})).display_name(), "Li");
        assert_eq!(record(json!({"username": "li@x"})).display_name(), "li@x");
        assert_eq!(record(json!({})).display_name(), DEFAULT_USERNAME);
    }

    #[test]
    fn test_merge_keeps_sibling_profile_fields() {
        let mut user = record(json!({"id": 1, "profile": {"name": "X", "email": "e"}}));
        user.merge(json!({"profile": {"name": "Y"}}).as_object().unwrap());

        assert_eq!(
            user.to_value(),
            json!({"id": 1, "profile": {"name": "Y", "email": "e"}})
        );
    }

    #[test]
    fn test_merge_overwrites_other_fields_wholesale() {
        let mut user = record(json!({"name": "a", "settings": {"theme": "dark", "lang": "zh"}}));
        user.merge(json!({"name": "b", "settings": {"theme": "light"}}).as_object().unwrap());

        assert_eq!(user.name(), Some("b"));
        assert_eq!(user.get("settings"), Some(&json!({"theme": "light"})));
    }

    #[test]
    fn test_merge_non_object_profile_replaces() {
        let mut user = record(json!({"profile": {"name": "X"}}));
        user.merge(json!({"profile": null}).as_object().unwrap());
        assert_eq!(user.get("profile"), Some(&Value::Null));

        user.merge(json!({"profile": {"name": "Z"}}).as_object().unwrap());
        assert_eq!(user.profile().unwrap().get("name"), Some(&json!("Z")));
    }

    #[test]
    fn test_login_user_resolution() {
        let parsed = LoginUser::resolve(Some(json!({"id": 1, "name": "x"})), "a@b");
        assert!(!parsed.is_fallback());
        assert_eq!(parsed.into_record().name(), Some("x"));

        for user in [None, Some(json!("x")), Some(json!(42)), Some(Value::Null)] {
            let fallback = LoginUser::resolve(user, "a@b");
            assert!(fallback.is_fallback());
            let record = fallback.into_record();
            assert_eq!(record.id().as_deref(), Some("unknown"));
            assert_eq!(record.email(), Some("a@b"));
            assert_eq!(record.display_name(), DEFAULT_USERNAME);
        }
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("a@b", "hunter2"));
        assert!(debug.contains("a@b"));
        assert!(!debug.contains("hunter2"));
    }
}
