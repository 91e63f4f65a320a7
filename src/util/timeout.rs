//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::LinkError;

/// Wrap a future with a timeout. The inner future is dropped on expiry, so
/// any resource it owns (sockets, file handles) is released.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, LinkError>>,
) -> Result<T, LinkError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(LinkError::Timeout(duration.as_millis() as u64)),
    }
}
