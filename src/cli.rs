//! CLI entry point (spec §4.13): parses startup flags and layers them over
//! `KioskConfig` the same way the config file's env overrides layer over
//! its defaults — flags win over env, which wins over the file.

use crate::config::KioskConfig;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kiosk-server")]
#[command(about = "LAN-only voice-interaction kiosk server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "./kiosk.toml")]
    pub config: PathBuf,

    /// Address to bind the HTTP server to, overriding `[server] bind_addr`.
    #[arg(long)]
    pub bind: Option<String>,

    /// Path to the SQLite database file, overriding `[store] db_path`.
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Shared secret used to sign staff session cookies. Falls back to
    /// `WF_STAFF_COOKIE_SECRET` via the config layer, then to a randomly
    /// generated secret for this process if neither is set.
    #[arg(long, env = "WF_STAFF_COOKIE_SECRET")]
    pub staff_cookie_secret: Option<String>,

    /// Shared API key forwarded to the STT/LLM/TTS provider gateway.
    #[arg(long, env = "WF_PROVIDER_API_KEY")]
    pub provider_api_key: Option<String>,
}

impl Cli {
    /// Loads the config file named by `--config`, then applies this CLI
    /// invocation's flag overrides on top.
    pub fn load_config(&self) -> anyhow::Result<KioskConfig> {
        let mut config = KioskConfig::load(&self.config)?;
        if let Some(bind) = &self.bind {
            config.server.bind_addr = bind.clone();
        }
        if let Some(db) = &self.db {
            config.store.db_path = db.clone();
        }
        if let Some(secret) = &self.staff_cookie_secret {
            config.staff.cookie_secret = Some(secret.clone());
        }
        if let Some(key) = &self.provider_api_key {
            config.providers.api_key = Some(key.clone());
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_flag_overrides_loaded_config() {
        let cli = Cli {
            config: PathBuf::from("/nonexistent/kiosk.toml"),
            bind: Some("127.0.0.1:9090".to_string()),
            db: None,
            staff_cookie_secret: None,
            provider_api_key: None,
        };
        let config = cli.load_config().unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:9090");
    }

    #[test]
    fn db_flag_overrides_loaded_config() {
        let cli = Cli {
            config: PathBuf::from("/nonexistent/kiosk.toml"),
            bind: None,
            db: Some(PathBuf::from("/tmp/override.sqlite3")),
            staff_cookie_secret: None,
            provider_api_key: None,
        };
        let config = cli.load_config().unwrap();
        assert_eq!(config.store.db_path, PathBuf::from("/tmp/override.sqlite3"));
    }
}
