use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LinkError;

const CREDENTIALS_FILE: &str = "credentials.toml";

/// The single persisted device-link record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceCredentials {
    /// Bearer credential identifying this device to the remote service.
    pub token: String,
    /// Short-lived code a second device uses to authorize linking.
    pub link_code: String,
}

/// Storage abstraction for the device credential record.
///
/// All mutation of the persisted token and link code goes through these two
/// setters; each call is one complete transaction, serialized against every
/// other writer.
pub trait CredentialStore: Send + Sync {
    fn credentials(&self) -> Result<DeviceCredentials, LinkError>;
    fn set_token(&self, token: &str) -> Result<(), LinkError>;
    fn set_link_code(&self, link_code: &str) -> Result<(), LinkError>;
}

/// File-backed credential store using a single versioned TOML record.
///
/// Writes go through a temp file + rename so a concurrent reader never
/// observes a partially written record, and a `Mutex` serializes writers.
///
/// # Example
/// ```no_run
/// use applink::link::store::{CredentialStore, FileCredentialStore};
///
/// let store = FileCredentialStore::new(std::path::PathBuf::from("/tmp/applink"));
/// store.initialize()?;
/// store.set_token("link-token")?;
/// # Ok::<(), applink::error::LinkError>(())
/// ```
#[derive(Debug)]
pub struct FileCredentialStore {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            write_lock: Mutex::new(()),
        }
    }

    /// Create the empty credential record if it does not exist yet. Called
    /// once during app initialization; the setters refuse to run without it.
    pub fn initialize(&self) -> Result<(), LinkError> {
        let _guard = self.lock()?;
        let path = self.record_path();
        if path.exists() {
            return Ok(());
        }
        Self::ensure_parent(&path)?;
        write_record(&path, &DeviceCredentials::default())
    }

    fn record_path(&self) -> PathBuf {
        self.base_dir.join(CREDENTIALS_FILE)
    }

    fn ensure_parent(path: &Path) -> Result<(), LinkError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>, LinkError> {
        self.write_lock
            .lock()
            .map_err(|_| LinkError::Store("credential store lock poisoned".to_string()))
    }

    /// Read-modify-write one field under the writer lock.
    fn update(
        &self,
        mutate: impl FnOnce(&mut DeviceCredentials),
    ) -> Result<(), LinkError> {
        let _guard = self.lock()?;
        let path = self.record_path();
        let mut current = read_record(&path)?;
        mutate(&mut current);
        write_record(&path, &current)
    }
}

impl CredentialStore for FileCredentialStore {
    fn credentials(&self) -> Result<DeviceCredentials, LinkError> {
        read_record(&self.record_path())
    }

    fn set_token(&self, token: &str) -> Result<(), LinkError> {
        if token.is_empty() {
            return Err(LinkError::Store(
                "refusing to persist an empty device token".to_string(),
            ));
        }
        self.update(|creds| creds.token = token.to_string())
    }

    fn set_link_code(&self, link_code: &str) -> Result<(), LinkError> {
        self.update(|creds| creds.link_code = link_code.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CredentialsFile {
    version: u32,
    credentials: DeviceCredentials,
    saved_at: DateTime<Utc>,
}

fn read_record(path: &Path) -> Result<DeviceCredentials, LinkError> {
    let raw = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(LinkError::Store("credentials record missing".to_string()));
        }
        Err(err) => return Err(LinkError::Store(err.to_string())),
    };
    let file: CredentialsFile = toml::from_str(&raw)?;
    Ok(file.credentials)
}

fn write_record(path: &Path, credentials: &DeviceCredentials) -> Result<(), LinkError> {
    let file = CredentialsFile {
        version: 1,
        credentials: credentials.clone(),
        saved_at: DateTime::<Utc>::from(std::time::SystemTime::now()),
    };
    let serialized = toml::to_string(&file)?;
    let tmp = path.with_extension("toml.tmp");
    fs::write(&tmp, serialized).map_err(|err| LinkError::Store(err.to_string()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o600))
            .map_err(|err| LinkError::Store(err.to_string()))?;
    }
    fs::rename(&tmp, path).map_err(|err| LinkError::Store(err.to_string()))
}
