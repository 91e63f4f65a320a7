//! Configuration for the device-link client (code > env > defaults).

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.linkstore.app/v1/";
const DEFAULT_LANGUAGE: &str = "en";
const DEFAULT_CALLBACK_PORT: u16 = 8080;
const DEFAULT_CALLBACK_WAIT: Duration = Duration::from_secs(90);

/// Settings shared by the remote client, profile fetcher, and the local
/// provisioning callback server.
///
/// # Example
/// ```no_run
/// use applink::config::LinkConfig;
///
/// let config = LinkConfig::new()
///     .with_endpoint("https://staging.linkstore.app/v1/")
///     .with_language("it");
/// ```
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub endpoint: String,
    pub language: String,
    pub callback_port: u16,
    pub callback_wait: Duration,
    pub storage_dir: PathBuf,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkConfig {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            callback_port: DEFAULT_CALLBACK_PORT,
            callback_wait: DEFAULT_CALLBACK_WAIT,
            storage_dir: default_storage_dir(),
        }
    }

    /// Load from environment variables (`APPLINK_ENDPOINT`, `APPLINK_LANG`,
    /// `APPLINK_CALLBACK_PORT`, `APPLINK_STORAGE_DIR`), falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::new();
        if let Ok(endpoint) = std::env::var("APPLINK_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(lang) = std::env::var("APPLINK_LANG") {
            config.language = lang;
        }
        if let Ok(port) = std::env::var("APPLINK_CALLBACK_PORT") {
            if let Ok(port) = port.parse() {
                config.callback_port = port;
            }
        }
        if let Ok(dir) = std::env::var("APPLINK_STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }
        config
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    pub fn with_callback_wait(mut self, wait: Duration) -> Self {
        self.callback_wait = wait;
        self
    }

    pub fn with_storage_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.storage_dir = dir.into();
        self
    }
}

fn default_storage_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".applink"))
        .unwrap_or_else(|| PathBuf::from(".applink"))
}
