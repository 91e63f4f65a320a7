//! Convenience re-exports for common use.

pub use crate::config::LinkConfig;
pub use crate::error::{LinkError, Result};
pub use crate::link::{
    CredentialStore, DeviceCredentials, FileCredentialStore, LinkOrchestrator, LinkRequest,
    NewDeviceGrant, ProfileFetcher, ProvisioningServer, RemoteLinkClient, SessionProvider,
};
