use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::LinkConfig;
use crate::error::LinkError;

/// Fixed destination filename inside private document storage; every
/// provisioning attempt overwrites the previous download.
pub const PROFILE_FILENAME: &str = "enroll.mobileconfig";

/// Downloads the provisioning-profile payload handed out by the link API.
pub struct ProfileFetcher {
    client: reqwest::Client,
    dest_dir: PathBuf,
}

impl ProfileFetcher {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            dest_dir: config.storage_dir.clone(),
        }
    }

    pub fn with_dest_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dest_dir = dir.into();
        self
    }

    /// Path the profile lands at, whether or not a download has happened.
    pub fn destination(&self) -> PathBuf {
        self.dest_dir.join(PROFILE_FILENAME)
    }

    /// Stream the payload at `url` to the fixed destination, creating
    /// intermediate directories and truncating any previous file. The whole
    /// future is droppable, so an orchestrator-level cancel aborts the
    /// transfer mid-stream.
    pub async fn fetch(&self, url: &str) -> Result<PathBuf, LinkError> {
        let dest = self.destination();
        debug!(url, dest = %dest.display(), "downloading provisioning profile");
        self.fetch_to(url, &dest).await.map_err(|err| match err {
            LinkError::Download(_) => err,
            other => LinkError::Download(other.to_string()),
        })?;
        Ok(dest)
    }

    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<(), LinkError> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(LinkError::Download(format!(
                "profile download failed with status {}",
                resp.status()
            )));
        }
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}
