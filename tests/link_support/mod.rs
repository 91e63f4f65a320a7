#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use applink::error::LinkError;
use applink::link::store::{CredentialStore, DeviceCredentials};
use applink::link::SessionProvider;

/// In-memory stand-in for the file-backed credential store.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    record: Mutex<Option<DeviceCredentials>>,
    fail_writes: AtomicBool,
}

impl InMemoryCredentialStore {
    /// Store with an initialized (empty) credential record.
    pub fn new() -> Self {
        Self {
            record: Mutex::new(Some(DeviceCredentials::default())),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Store whose record was never created during app init.
    pub fn uninitialized() -> Self {
        Self {
            record: Mutex::new(None),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write abort, simulating a failed transaction.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> Option<DeviceCredentials> {
        self.record.lock().expect("store lock poisoned").clone()
    }

    fn write(
        &self,
        mutate: impl FnOnce(&mut DeviceCredentials),
    ) -> Result<(), LinkError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(LinkError::Store("write transaction aborted".to_string()));
        }
        let mut guard = self.record.lock().expect("store lock poisoned");
        let record = guard
            .as_mut()
            .ok_or_else(|| LinkError::Store("credentials record missing".to_string()))?;
        mutate(record);
        Ok(())
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn credentials(&self) -> Result<DeviceCredentials, LinkError> {
        self.record
            .lock()
            .expect("store lock poisoned")
            .clone()
            .ok_or_else(|| LinkError::Store("credentials record missing".to_string()))
    }

    fn set_token(&self, token: &str) -> Result<(), LinkError> {
        if token.is_empty() {
            return Err(LinkError::Store(
                "refusing to persist an empty device token".to_string(),
            ));
        }
        self.write(|record| record.token = token.to_string())
    }

    fn set_link_code(&self, link_code: &str) -> Result<(), LinkError> {
        self.write(|record| record.link_code = link_code.to_string())
    }
}

/// Fixed-cookie session provider for session-authenticated calls.
pub struct StaticSession(pub String);

impl SessionProvider for StaticSession {
    fn cookie(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Pick a port that was free a moment ago. Good enough for tests that need
/// to hand a concrete port number to the callback server.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}
