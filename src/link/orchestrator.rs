use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::LinkConfig;
use crate::error::LinkError;

use super::client::RemoteLinkClient;
use super::profile::ProfileFetcher;
use super::server::ProvisioningServer;
use super::store::CredentialStore;

/// Input to [`LinkOrchestrator::link`].
#[derive(Debug, Clone)]
pub enum LinkRequest {
    /// Authorize with a code issued to an already-linked device.
    ByCode { code: String },
    /// Enroll a brand new device by email.
    ByEmail { email: String },
}

/// Sequences the remote client, credential store, profile fetcher, and the
/// local callback server into the two public link workflows. Each workflow
/// is one sequential async call resolving exactly once; the old
/// success/failure continuation pair is the returned `Result`.
///
/// Cancellation: grab [`LinkOrchestrator::cancellation_token`] and cancel it
/// to abandon an in-flight workflow. Every suspension point races the token,
/// so an in-flight download or callback server is dropped (port released)
/// and the workflow resolves with `Cancelled` without touching the store
/// again.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use applink::config::LinkConfig;
/// use applink::link::orchestrator::LinkOrchestrator;
/// use applink::link::store::FileCredentialStore;
///
/// # async fn example() -> applink::error::Result<()> {
/// let config = LinkConfig::from_env();
/// let store = Arc::new(FileCredentialStore::new(config.storage_dir.clone()));
/// store.initialize()?;
/// let orchestrator = LinkOrchestrator::new(&config, store);
/// orchestrator.link_device("ABC123").await?;
/// # Ok(())
/// # }
/// ```
pub struct LinkOrchestrator {
    client: RemoteLinkClient,
    store: Arc<dyn CredentialStore>,
    fetcher: ProfileFetcher,
    callback_port: u16,
    callback_wait: Duration,
    cancel: CancellationToken,
}

impl LinkOrchestrator {
    pub fn new(config: &LinkConfig, store: Arc<dyn CredentialStore>) -> Self {
        Self {
            client: RemoteLinkClient::new(config),
            store,
            fetcher: ProfileFetcher::new(config),
            callback_port: config.callback_port,
            callback_wait: config.callback_wait,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_client(mut self, client: RemoteLinkClient) -> Self {
        self.client = client;
        self
    }

    pub fn with_fetcher(mut self, fetcher: ProfileFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Token that cancels this orchestrator's in-flight workflow.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Dispatch on the request kind.
    pub async fn link(&self, request: LinkRequest) -> Result<(), LinkError> {
        match request {
            LinkRequest::ByCode { code } => self.link_device(&code).await,
            LinkRequest::ByEmail { email } => self.link_new_device(&email).await,
        }
    }

    /// Link this device using a code from an already-linked device, then
    /// refresh the stored link code.
    ///
    /// A failure while refreshing the link code leaves the freshly persisted
    /// token in place; the workflow still reports failure. That asymmetry
    /// matches the service's long-standing behavior.
    pub async fn link_device(&self, code: &str) -> Result<(), LinkError> {
        let token = self.step(self.client.link_by_code(code)).await?;
        self.ensure_active()?;
        self.store.set_token(&token)?;
        debug!("device token persisted, refreshing link code");
        self.refresh_link_code().await
    }

    /// Enroll a new device by email. Depending on the grant this either
    /// finishes like [`Self::link_device`] (device already authorized) or
    /// downloads the provisioning profile and waits for the OS confirmation
    /// callback on the local port.
    pub async fn link_new_device(&self, email: &str) -> Result<(), LinkError> {
        let grant = self.step(self.client.link_by_email(email)).await?;
        self.ensure_active()?;
        if let Err(err) = self.store.set_token(&grant.token) {
            warn!(error = %err, "token persistence failed, aborting enrollment");
            return Err(err);
        }
        if !grant.requires_provisioning() {
            debug!("no provisioning profile required, refreshing link code");
            return self.refresh_link_code().await;
        }
        let profile = self.step(self.fetcher.fetch(&grant.profile_service)).await?;
        let server = self
            .step(ProvisioningServer::bind(
                self.callback_port,
                profile,
                grant.token.clone(),
                self.store.clone(),
                self.callback_wait,
            ))
            .await?;
        debug!(url = %server.install_url(), "awaiting profile installation callback");
        self.step(server.run()).await
    }

    /// Fetch a fresh link code and persist it. Shared tail of both
    /// workflows.
    async fn refresh_link_code(&self) -> Result<(), LinkError> {
        let link_code = self.step(self.client.request_link_code()).await?;
        self.ensure_active()?;
        self.store.set_link_code(&link_code)
    }

    /// Race one workflow step against cancellation. Losing the race drops
    /// the step's future, aborting whatever I/O it owned.
    async fn step<T>(
        &self,
        fut: impl Future<Output = Result<T, LinkError>>,
    ) -> Result<T, LinkError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(LinkError::Cancelled),
            result = fut => result,
        }
    }

    /// Guard the synchronous store writes between suspension points.
    fn ensure_active(&self) -> Result<(), LinkError> {
        if self.cancel.is_cancelled() {
            Err(LinkError::Cancelled)
        } else {
            Ok(())
        }
    }
}
