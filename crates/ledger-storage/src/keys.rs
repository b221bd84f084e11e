//! Storage key constants.

/// Keys of the persisted session surface.
pub struct StorageKeys;

impl StorageKeys {
    /// Primary access token
    pub const ACCESS_TOKEN: &'static str = "token";

    /// Primary refresh token
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Primary user record (JSON)
    pub const USER: &'static str = "user";

    /// Display name of the system
    pub const SYSTEM_NAME: &'static str = "systemName";

    /// Monitoring access token
    pub const MONITORING_TOKEN: &'static str = "monitoring_token";

    /// Monitoring user record (JSON)
    pub const MONITORING_USER: &'static str = "monitoring_user";

    /// Every key the session surface writes.
    pub const ALL: [&'static str; 6] = [
        Self::ACCESS_TOKEN,
        Self::REFRESH_TOKEN,
        Self::USER,
        Self::SYSTEM_NAME,
        Self::MONITORING_TOKEN,
        Self::MONITORING_USER,
    ];

    /// Name fragments that mark a durable key as session residue on logout.
    pub const LOGOUT_SCAN_FRAGMENTS: [&'static str; 3] = ["auth", "user", "token"];

    /// Keys owned by the monitoring domain; primary logout never touches them.
    pub const MONITORING_KEYS: [&'static str; 2] = [Self::MONITORING_TOKEN, Self::MONITORING_USER];
}
