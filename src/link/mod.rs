//! Device-link provisioning: remote client, credential store, profile
//! download, local callback server, and the orchestrated workflows.

pub mod client;
pub mod envelope;
pub mod orchestrator;
pub mod profile;
pub mod server;
pub mod store;

pub use client::{NewDeviceGrant, RemoteLinkClient, SessionProvider};
pub use envelope::RemoteEnvelope;
pub use orchestrator::{LinkOrchestrator, LinkRequest};
pub use profile::{ProfileFetcher, PROFILE_FILENAME};
pub use server::ProvisioningServer;
pub use store::{CredentialStore, DeviceCredentials, FileCredentialStore};
