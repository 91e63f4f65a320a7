//! applink — device-link provisioning client
//!
//! Client-side implementation of the catalog service's device-link protocol:
//! exchanging a link code or email for an authorization token, optionally
//! downloading a provisioning profile and confirming its installation
//! through a short-lived local HTTP callback server, with the token and
//! current link code kept in a single persistent credential record.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use applink::prelude::*;
//!
//! # async fn example() -> applink::error::Result<()> {
//! let config = LinkConfig::from_env();
//! let store = Arc::new(FileCredentialStore::new(config.storage_dir.clone()));
//! store.initialize()?;
//!
//! let orchestrator = LinkOrchestrator::new(&config, store);
//! orchestrator.link_device("ABC123").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod link;
pub mod prelude;
pub mod util;
