use std::sync::Arc;

use tracing::debug;

use crate::config::LinkConfig;
use crate::error::LinkError;

use super::envelope::{data_as_string, data_field, RemoteEnvelope};

/// Supplies the session cookie for calls that are authenticated by the
/// device's current session rather than its link token.
pub trait SessionProvider: Send + Sync {
    fn cookie(&self) -> Option<String>;
}

/// Result of a successful new-device link call: the token plus the
/// profile-service descriptor. An empty `profile_service` URL means the
/// device is already authorized and no provisioning profile is needed.
#[derive(Debug, Clone)]
pub struct NewDeviceGrant {
    pub token: String,
    pub profile_service: String,
}

impl NewDeviceGrant {
    pub fn requires_provisioning(&self) -> bool {
        !self.profile_service.is_empty()
    }
}

/// Client for the remote device-link API. Each method performs exactly one
/// round trip and never persists anything; the orchestrator owns the store.
///
/// # Example
/// ```no_run
/// use applink::config::LinkConfig;
/// use applink::link::client::RemoteLinkClient;
///
/// # async fn example() -> applink::error::Result<()> {
/// let client = RemoteLinkClient::new(&LinkConfig::new());
/// let token = client.link_by_code("ABC123").await?;
/// # Ok(())
/// # }
/// ```
pub struct RemoteLinkClient {
    client: reqwest::Client,
    endpoint: String,
    language: String,
    session: Option<Arc<dyn SessionProvider>>,
}

impl RemoteLinkClient {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            language: config.language.clone(),
            session: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_session(mut self, session: Arc<dyn SessionProvider>) -> Self {
        self.session = Some(session);
        self
    }

    /// Ask the service for a fresh link code for this device. Requires the
    /// current session cookie, not the link token.
    pub async fn request_link_code(&self) -> Result<String, LinkError> {
        debug!("requesting new link code");
        let envelope = self
            .call(
                &[("action", "get_link_code"), ("lang", self.language.as_str())],
                true,
            )
            .await?;
        let data = envelope.into_data()?;
        data_as_string(&data)
    }

    /// Link this device using a code issued to an already-linked device.
    /// Returns the new link token.
    pub async fn link_by_code(&self, code: &str) -> Result<String, LinkError> {
        debug!(code, "linking device by code");
        let envelope = self
            .call(
                &[
                    ("action", "link"),
                    ("type", "control"),
                    ("link_code", code),
                    ("lang", self.language.as_str()),
                ],
                false,
            )
            .await?;
        let data = envelope.into_data()?;
        Ok(data_field(&data, "link_token"))
    }

    /// Link a brand new device by email. Returns the token and the
    /// profile-service descriptor; a blank token is rejected here, before
    /// any caller gets a chance to persist it.
    pub async fn link_by_email(&self, email: &str) -> Result<NewDeviceGrant, LinkError> {
        debug!(email, "linking new device by email");
        let envelope = self
            .call(
                &[
                    ("action", "link"),
                    ("type", "new"),
                    ("email", email),
                    ("lang", self.language.as_str()),
                ],
                false,
            )
            .await?;
        let data = envelope.into_data()?;
        let token = data_field(&data, "link_token");
        if token.is_empty() {
            return Err(LinkError::EmptyToken);
        }
        Ok(NewDeviceGrant {
            token,
            profile_service: data_field(&data, "profile_service"),
        })
    }

    async fn call(
        &self,
        params: &[(&str, &str)],
        with_cookie: bool,
    ) -> Result<RemoteEnvelope, LinkError> {
        let mut request = self.client.get(&self.endpoint).query(params);
        if with_cookie {
            if let Some(cookie) = self.session.as_ref().and_then(|s| s.cookie()) {
                request = request.header("Cookie", cookie);
            }
        }
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(LinkError::InvalidResponse(format!(
                "link request failed with status {}",
                resp.status()
            )));
        }
        let envelope: RemoteEnvelope = resp.json().await?;
        Ok(envelope)
    }
}
