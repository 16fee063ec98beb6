//! Configuration management.
//!
//! Layered like the upstream agent's config: defaults, then an optional TOML
//! file on disk, then `WF_*` environment overrides applied on top.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KioskConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub staff: StaffConfig,
    #[serde(default)]
    pub sse: SseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            server: ServerConfig::default(),
            staff: StaffConfig::default(),
            sse: SseConfig::default(),
            store: StoreConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_consent_timeout_ms")]
    pub consent_timeout_ms: i64,
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: i64,
}

fn default_consent_timeout_ms() -> i64 {
    30_000
}

fn default_inactivity_timeout_ms() -> i64 {
    300_000
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            consent_timeout_ms: default_consent_timeout_ms(),
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./web")
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            static_dir: default_static_dir(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaffConfig {
    #[serde(default = "default_staff_session_ttl_ms")]
    pub session_ttl_ms: i64,
    #[serde(default)]
    pub cookie_secret: Option<String>,
}

fn default_staff_session_ttl_ms() -> i64 {
    180_000
}

impl Default for StaffConfig {
    fn default() -> Self {
        Self {
            session_ttl_ms: default_staff_session_ttl_ms(),
            cookie_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SseConfig {
    #[serde(default = "default_keepalive_interval_ms")]
    pub keepalive_interval_ms: u64,
}

fn default_keepalive_interval_ms() -> u64 {
    25_000
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_ms: default_keepalive_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./kiosk.sqlite3")
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_provider_base_url")]
    pub stt_base_url: String,
    #[serde(default = "default_provider_base_url")]
    pub llm_base_url: String,
    #[serde(default = "default_provider_base_url")]
    pub tts_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_provider_base_url() -> String {
    "http://127.0.0.1:9000".to_string()
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            stt_base_url: default_provider_base_url(),
            llm_base_url: default_provider_base_url(),
            tts_base_url: default_provider_base_url(),
            api_key: None,
        }
    }
}

impl KioskConfig {
    /// Load from `path` if present, else start from defaults; then apply
    /// `WF_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config file")?
        } else {
            KioskConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("failed to create config directory")?;
        }
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents).context("failed to write config file")?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_i64("WF_STAFF_SESSION_TTL_MS") {
            self.staff.session_ttl_ms = v.clamp(10_000, 86_400_000);
        }
        if let Some(v) = env_u64("WF_SSE_KEEPALIVE_INTERVAL_MS") {
            self.sse.keepalive_interval_ms = v;
        }
        if let Some(v) = env_u64("WF_TICK_INTERVAL_MS") {
            self.server.tick_interval_ms = v;
        }
        if let Some(v) = env_i64("WF_CONSENT_TIMEOUT_MS") {
            self.orchestrator.consent_timeout_ms = v;
        }
        if let Some(v) = env_i64("WF_INACTIVITY_TIMEOUT_MS") {
            self.orchestrator.inactivity_timeout_ms = v;
        }
        if let Ok(v) = std::env::var("WF_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Ok(v) = std::env::var("WF_DB_PATH") {
            self.store.db_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("WF_STAFF_COOKIE_SECRET") {
            self.staff.cookie_secret = Some(v);
        }
    }
}

fn env_i64(name: &str) -> Option<i64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}
