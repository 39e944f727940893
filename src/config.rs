//! Application-level configuration loading: JSON file, then environment overrides.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::dao::room_code::{
    DEFAULT_CODE_ATTEMPTS, DEFAULT_CODE_MAX, DEFAULT_CODE_MIN, RoomCodeSpace,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SPOTLIGHT_BACK_CONFIG_PATH";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_MONGO_URI: &str = "mongodb://localhost:27017";
const DEFAULT_MAX_FILE_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_MAX_QUESTION_LENGTH: usize = 500;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SSE_KEEP_ALIVE_SECS: u64 = 15;

/// Which [`RoomStore`](crate::dao::room_store::RoomStore) implementation backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Mongo,
}

impl StorageBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageBackend::Memory => "memory",
            StorageBackend::Mongo => "mongo",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Some(StorageBackend::Memory),
            "mongo" | "mongodb" => Some(StorageBackend::Mongo),
            _ => None,
        }
    }
}

impl Default for StorageBackend {
    fn default() -> Self {
        if cfg!(feature = "mongo-store") {
            StorageBackend::Mongo
        } else {
            StorageBackend::Memory
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub mongo_uri: String,
    pub mongo_db: Option<String>,
    /// Upper bound on any single store call.
    pub timeout_ms: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            mongo_uri: DEFAULT_MONGO_URI.to_owned(),
            mongo_db: None,
            timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomSettings {
    pub code_min: u16,
    pub code_max: u16,
    pub code_attempts: u32,
    /// Reject room creation without an uploaded presentation file.
    pub require_file: bool,
    /// Largest accepted upload, also used as the request body limit.
    pub max_file_bytes: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            code_min: DEFAULT_CODE_MIN,
            code_max: DEFAULT_CODE_MAX,
            code_attempts: DEFAULT_CODE_ATTEMPTS,
            require_file: true,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuestionSettings {
    pub max_length: usize,
}

impl Default for QuestionSettings {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_QUESTION_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VisitorSettings {
    /// Mark the issued `visitor_id` cookie as `Secure`.
    pub cookie_secure: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    pub sse_keep_alive_secs: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            sse_keep_alive_secs: DEFAULT_SSE_KEEP_ALIVE_SECS,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub rooms: RoomSettings,
    pub questions: QuestionSettings,
    pub visitor: VisitorSettings,
    pub realtime: RealtimeSettings,
}

impl AppConfig {
    /// Load the configuration from disk and the process environment.
    ///
    /// Missing or unreadable files fall back to built-in defaults.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        config.apply_env(|key| env::var(key).ok());
        config
    }

    fn load_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json_str(&contents) {
                Ok(config) => {
                    info!(path = %path.display(), "loaded configuration file");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent sections and fields keep their defaults.
    pub fn from_json_str(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }

    /// Apply `PORT`/`SERVER_PORT`, `STORAGE_BACKEND`, `MONGO_URI` and `MONGO_DB`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("PORT").or_else(|| lookup("SERVER_PORT")) {
            match raw.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!(value = %raw, "ignoring invalid port override"),
            }
        }

        if let Some(raw) = lookup("STORAGE_BACKEND") {
            match StorageBackend::parse(&raw) {
                Some(backend) => self.storage.backend = backend,
                None => warn!(value = %raw, "ignoring unknown storage backend override"),
            }
        }

        if let Some(uri) = lookup("MONGO_URI").filter(|uri| !uri.is_empty()) {
            self.storage.mongo_uri = uri;
        }

        if let Some(db) = lookup("MONGO_DB").filter(|db| !db.is_empty()) {
            self.storage.mongo_db = Some(db);
        }
    }

    pub fn code_space(&self) -> RoomCodeSpace {
        RoomCodeSpace::new(
            self.rooms.code_min,
            self.rooms.code_max,
            self.rooms.code_attempts,
        )
    }

    /// `None` disables the store call timeout.
    pub fn store_timeout(&self) -> Option<Duration> {
        (self.storage.timeout_ms > 0).then(|| Duration::from_millis(self.storage.timeout_ms))
    }

    pub fn sse_keep_alive(&self) -> Duration {
        Duration::from_secs(self.realtime.sse_keep_alive_secs.max(1))
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::from_json_str(
            r#"{ "rooms": { "require_file": false }, "questions": { "max_length": 140 } }"#,
        )
        .unwrap();

        assert!(!config.rooms.require_file);
        assert_eq!(config.rooms.code_min, DEFAULT_CODE_MIN);
        assert_eq!(config.rooms.code_max, DEFAULT_CODE_MAX);
        assert_eq!(config.questions.max_length, 140);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(
            config.store_timeout(),
            Some(Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS))
        );
    }

    #[test]
    fn backend_is_parsed_from_file() {
        let config = AppConfig::from_json_str(r#"{ "storage": { "backend": "memory" } }"#).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(AppConfig::from_json_str(r#"{ "storage": { "backend": "postgres" } }"#).is_err());
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut config = AppConfig::default();
        config.apply_env(lookup(&[
            ("SERVER_PORT", "9090"),
            ("STORAGE_BACKEND", "Memory"),
            ("MONGO_URI", "mongodb://db:27017"),
            ("MONGO_DB", "qa"),
        ]));

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.mongo_uri, "mongodb://db:27017");
        assert_eq!(config.storage.mongo_db.as_deref(), Some("qa"));
    }

    #[test]
    fn port_prefers_port_over_server_port_and_ignores_garbage() {
        let mut config = AppConfig::default();
        config.apply_env(lookup(&[("PORT", "3000"), ("SERVER_PORT", "9090")]));
        assert_eq!(config.server.port, 3000);

        config.apply_env(lookup(&[("PORT", "not-a-port"), ("STORAGE_BACKEND", "postgres")]));
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.storage.backend, StorageBackend::default());
    }

    #[test]
    fn zero_timeout_disables_it() {
        let config = AppConfig::from_json_str(r#"{ "storage": { "timeout_ms": 0 } }"#).unwrap();
        assert_eq!(config.store_timeout(), None);
    }
}
