use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const CONFIG_FILE_PATH: &str = "kb-client.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub http_proxy: String,
    #[serde(default)]
    pub https_proxy: String,
    #[serde(default)]
    pub http_proxy_auth: Option<ProxyAuth>,
    #[serde(default)]
    pub https_proxy_auth: Option<ProxyAuth>,
    /// Durable credential file. `None` keeps the session in memory only.
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub refresh_on_unauthorized: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

/// `~/.kb-client`, falling back to the temp dir when no home is known.
pub fn client_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".kb-client")
}

fn config_json_path() -> PathBuf {
    client_dir().join("config.json")
}

/// Default location of the durable credential file.
pub fn default_session_path() -> PathBuf {
    client_dir().join("session.json")
}

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            http_proxy: String::new(),
            https_proxy: String::new(),
            http_proxy_auth: None,
            https_proxy_auth: None,
            storage_path: None,
            refresh_on_unauthorized: true,
        }
    }
}

impl ClientConfig {
    /// Loads `~/.kb-client/config.json`, else `./kb-client.toml`, then applies
    /// environment overrides.
    pub fn load() -> Self {
        let mut config = ClientConfig::default();

        let mut loaded = false;
        let json_path = config_json_path();
        if json_path.exists() {
            match std::fs::read_to_string(&json_path)
                .map_err(|e| e.to_string())
                .and_then(|content| {
                    serde_json::from_str::<ClientConfig>(&content).map_err(|e| e.to_string())
                }) {
                Ok(file_config) => {
                    config = file_config;
                    loaded = true;
                }
                Err(err) => log::warn!("Ignoring {}: {}", json_path.display(), err),
            }
        }

        if !loaded && std::path::Path::new(CONFIG_FILE_PATH).exists() {
            if let Ok(content) = std::fs::read_to_string(CONFIG_FILE_PATH) {
                match toml::from_str::<ClientConfig>(&content) {
                    Ok(file_config) => config = file_config,
                    Err(err) => log::warn!("Ignoring {}: {}", CONFIG_FILE_PATH, err),
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = var("KB_API_BASE") {
            self.base_url = base_url;
        }
        if let Some(timeout) = var("KB_TIMEOUT_SECS") {
            match timeout.trim().parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => log::warn!("KB_TIMEOUT_SECS is not a number: {timeout:?}"),
            }
        }
        if let Some(http_proxy) = var("HTTP_PROXY") {
            self.http_proxy = http_proxy;
        }
        if let Some(https_proxy) = var("HTTPS_PROXY") {
            self.https_proxy = https_proxy;
        }
        if let Some(path) = var("KB_STORAGE_PATH") {
            self.storage_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = var("KB_REFRESH_ON_UNAUTHORIZED") {
            self.refresh_on_unauthorized = parse_bool_env(&flag);
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Joins `path` onto the base URL, tolerating slashes on either side.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
