use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::error::LinkError;
use crate::util::timeout::with_timeout;

use super::store::CredentialStore;

const PROFILE_CONTENT_TYPE: &str = "application/x-apple-aspen-config";
const MAX_REQUEST_HEAD: usize = 8 * 1024;

/// Outcome signalled by the OS in the confirmation request:
/// `GET /callback?result=installed` or `GET /callback?result=failed&reason=...`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CallbackSignal {
    Installed,
    Failed(String),
}

/// Short-lived local HTTP listener for one provisioning attempt.
///
/// Lifecycle is `Created -> Started -> Completed -> Stopped`, encoded in the
/// API: [`ProvisioningServer::bind`] starts listening (a second bind on a
/// busy port fails fast with `PortUnavailable`), and the consuming
/// [`ProvisioningServer::run`] resolves exactly once with the attempt's
/// outcome, then drops the listener and releases the port. Starting twice is
/// unrepresentable.
///
/// While running the server answers two routes: the downloaded profile at
/// `/enroll.mobileconfig` (repeatable, the OS may fetch it more than once)
/// and the confirmation callback at `/callback`. On a successful callback
/// the token passed at construction is written to the store as the final
/// confirmation step. If no callback arrives within the wait window the run
/// resolves with `Timeout` and the port is released either way.
pub struct ProvisioningServer {
    listener: TcpListener,
    port: u16,
    profile_path: PathBuf,
    token: String,
    store: Arc<dyn CredentialStore>,
    wait_window: Duration,
}

impl ProvisioningServer {
    /// Bind the local callback port and start listening.
    pub async fn bind(
        port: u16,
        profile_path: PathBuf,
        token: impl Into<String>,
        store: Arc<dyn CredentialStore>,
        wait_window: Duration,
    ) -> Result<Self, LinkError> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await.map_err(|err| {
            if err.kind() == std::io::ErrorKind::AddrInUse {
                LinkError::PortUnavailable(port)
            } else {
                LinkError::Io(err)
            }
        })?;
        let port = listener
            .local_addr()
            .map(|addr| addr.port())
            .unwrap_or(port);
        debug!(port, "provisioning callback server listening");
        Ok(Self {
            listener,
            port,
            profile_path,
            token: token.into(),
            store,
            wait_window,
        })
    }

    /// Actual bound port (useful when constructed with port 0).
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Local URL the UI hands to the OS to kick off profile installation.
    pub fn install_url(&self) -> String {
        format!("http://127.0.0.1:{}/enroll.mobileconfig", self.port)
    }

    /// Serve until the confirmation callback arrives or the wait window
    /// expires. Consumes the server; dropping the returned future before it
    /// resolves also stops the listener and releases the port.
    pub async fn run(self) -> Result<(), LinkError> {
        let wait_window = self.wait_window;
        with_timeout(wait_window, self.serve()).await
    }

    async fn serve(self) -> Result<(), LinkError> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            debug!(%peer, "provisioning server accepted connection");
            match self.handle_connection(stream).await {
                Ok(Some(CallbackSignal::Installed)) => {
                    debug!("profile installation confirmed, persisting token");
                    return self.store.set_token(&self.token);
                }
                Ok(Some(CallbackSignal::Failed(reason))) => {
                    return Err(LinkError::ProfileInstall(reason));
                }
                Ok(None) => continue,
                Err(err) => {
                    warn!(error = %err, "provisioning server connection error");
                    continue;
                }
            }
        }
    }

    /// Serve one connection. `Some(signal)` means the confirmation callback
    /// arrived and the run is over.
    async fn handle_connection(
        &self,
        mut stream: TcpStream,
    ) -> Result<Option<CallbackSignal>, LinkError> {
        let target = read_request_target(&mut stream).await?;
        let (path, query) = split_target(&target);
        match path {
            "/enroll.mobileconfig" => {
                let body = tokio::fs::read(&self.profile_path).await?;
                write_response(&mut stream, "200 OK", PROFILE_CONTENT_TYPE, &body).await?;
                Ok(None)
            }
            "/callback" => {
                let signal = parse_callback_signal(query);
                // The confirmation is already in hand; a peer that hangs up
                // before reading the response must not void it.
                if let Err(err) = write_response(&mut stream, "200 OK", "text/plain", b"OK").await {
                    warn!(error = %err, "failed to answer confirmation callback");
                }
                Ok(Some(signal))
            }
            _ => {
                write_response(&mut stream, "404 Not Found", "text/plain", b"not found").await?;
                Ok(None)
            }
        }
    }
}

/// Read the request head and return the target from the request line.
async fn read_request_target(stream: &mut TcpStream) -> Result<String, LinkError> {
    let mut head = Vec::with_capacity(512);
    let mut buf = [0u8; 512];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
        if head.windows(4).any(|w| w == b"\r\n\r\n") || head.len() > MAX_REQUEST_HEAD {
            break;
        }
    }
    let text = String::from_utf8_lossy(&head);
    let request_line = text
        .lines()
        .next()
        .ok_or_else(|| LinkError::InvalidResponse("empty HTTP request".to_string()))?;
    // "GET /path?query HTTP/1.1"
    let mut parts = request_line.split_whitespace();
    let _method = parts.next();
    parts
        .next()
        .map(str::to_string)
        .ok_or_else(|| LinkError::InvalidResponse("malformed HTTP request line".to_string()))
}

fn split_target(target: &str) -> (&str, &str) {
    match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    }
}

fn parse_callback_signal(query: &str) -> CallbackSignal {
    let mut result = "";
    let mut reason = String::new();
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "result" => result = value,
            "reason" => reason = percent_decode(value),
            _ => {}
        }
    }
    if result == "installed" {
        CallbackSignal::Installed
    } else {
        let reason = if reason.is_empty() {
            "profile installation was not completed".to_string()
        } else {
            reason
        };
        CallbackSignal::Failed(reason)
    }
}

/// Minimal decoder for the bits of query escaping the OS callback uses.
/// Decodes into raw bytes first so multi-byte UTF-8 sequences survive.
fn percent_decode(value: &str) -> String {
    let mut out = Vec::with_capacity(value.len());
    let mut bytes = value.bytes();
    while let Some(b) = bytes.next() {
        match b {
            b'+' => out.push(b' '),
            b'%' => {
                let hi = bytes.next();
                let lo = bytes.next();
                let decoded = match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        let hex = [hi, lo];
                        std::str::from_utf8(&hex)
                            .ok()
                            .and_then(|s| u8::from_str_radix(s, 16).ok())
                    }
                    _ => None,
                };
                match decoded {
                    Some(byte) => out.push(byte),
                    None => {
                        out.push(b'%');
                        if let Some(hi) = hi {
                            out.push(hi);
                        }
                        if let Some(lo) = lo {
                            out.push(lo);
                        }
                    }
                }
            }
            other => out.push(other),
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

async fn write_response(
    stream: &mut TcpStream,
    status: &str,
    content_type: &str,
    body: &[u8],
) -> Result<(), LinkError> {
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await?;
    Ok(())
}
