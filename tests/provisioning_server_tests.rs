mod link_support;

use std::sync::Arc;
use std::time::Duration;

use applink::error::LinkError;
use applink::link::ProvisioningServer;
use tempfile::TempDir;

use link_support::InMemoryCredentialStore;

const PROFILE_BYTES: &[u8] = b"test-profile-payload";

struct Fixture {
    _dir: TempDir,
    store: Arc<InMemoryCredentialStore>,
    server: ProvisioningServer,
    port: u16,
}

async fn bound_server(wait: Duration) -> Fixture {
    let dir = TempDir::new().unwrap();
    let profile_path = dir.path().join("enroll.mobileconfig");
    std::fs::write(&profile_path, PROFILE_BYTES).unwrap();
    let store = Arc::new(InMemoryCredentialStore::new());
    let server = ProvisioningServer::bind(0, profile_path, "TOK1", store.clone(), wait)
        .await
        .unwrap();
    let port = server.port();
    Fixture {
        _dir: dir,
        store,
        server,
        port,
    }
}

#[tokio::test]
async fn binding_a_busy_port_fails_fast() {
    let holder = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = holder.local_addr().unwrap().port();

    let dir = TempDir::new().unwrap();
    let store = Arc::new(InMemoryCredentialStore::new());
    let result = ProvisioningServer::bind(
        port,
        dir.path().join("enroll.mobileconfig"),
        "TOK1",
        store,
        Duration::from_secs(60),
    )
    .await;

    match result {
        Err(LinkError::PortUnavailable(p)) => assert_eq!(p, port),
        Err(other) => panic!("expected PortUnavailable, got {other:?}"),
        Ok(_) => panic!("bind unexpectedly succeeded on a busy port"),
    }
}

#[tokio::test]
async fn serves_profile_then_completes_on_install_callback() {
    let fx = bound_server(Duration::from_secs(10)).await;
    let install_url = fx.server.install_url();
    assert!(install_url.ends_with("/enroll.mobileconfig"));
    let port = fx.port;
    let run = tokio::spawn(fx.server.run());

    let resp = reqwest::get(&install_url).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()["content-type"].to_str().unwrap(),
        "application/x-apple-aspen-config"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), PROFILE_BYTES);

    let callback = format!("http://127.0.0.1:{port}/callback?result=installed");
    assert_eq!(reqwest::get(&callback).await.unwrap().status(), 200);

    run.await.unwrap().unwrap();
    // Successful confirmation writes the construction-time token.
    assert_eq!(fx.store.snapshot().unwrap().token, "TOK1");
}

#[tokio::test]
async fn failed_install_callback_resolves_with_error() {
    let fx = bound_server(Duration::from_secs(10)).await;
    let port = fx.port;
    let run = tokio::spawn(fx.server.run());

    let callback = format!("http://127.0.0.1:{port}/callback?result=failed&reason=declined");
    reqwest::get(&callback).await.unwrap();

    match run.await.unwrap() {
        Err(LinkError::ProfileInstall(reason)) => assert_eq!(reason, "declined"),
        other => panic!("expected ProfileInstall, got {other:?}"),
    }
    // No token write on failure.
    assert_eq!(fx.store.snapshot().unwrap().token, "");
}

#[tokio::test]
async fn unknown_paths_get_404_and_server_keeps_listening() {
    let fx = bound_server(Duration::from_secs(10)).await;
    let port = fx.port;
    let run = tokio::spawn(fx.server.run());

    let resp = reqwest::get(format!("http://127.0.0.1:{port}/nope")).await.unwrap();
    assert_eq!(resp.status(), 404);

    let callback = format!("http://127.0.0.1:{port}/callback?result=installed");
    reqwest::get(&callback).await.unwrap();
    run.await.unwrap().unwrap();
}

#[tokio::test]
async fn no_callback_within_window_times_out_and_releases_port() {
    let fx = bound_server(Duration::from_millis(300)).await;
    let port = fx.port;

    let result = fx.server.run().await;
    assert!(matches!(result, Err(LinkError::Timeout(300))));

    std::net::TcpListener::bind(("127.0.0.1", port)).expect("port released after timeout");
    // Timeout means no confirmation: the token must not have been written.
    assert_eq!(fx.store.snapshot().unwrap().token, "");
}

#[tokio::test]
async fn failed_install_reason_preserves_non_ascii_text() {
    let fx = bound_server(Duration::from_secs(10)).await;
    let port = fx.port;
    let run = tokio::spawn(fx.server.run());

    let callback = format!("http://127.0.0.1:{port}/callback?result=failed&reason=%C3%A9");
    reqwest::get(&callback).await.unwrap();

    match run.await.unwrap() {
        Err(LinkError::ProfileInstall(reason)) => assert_eq!(reason, "é"),
        other => panic!("expected ProfileInstall, got {other:?}"),
    }
}

#[tokio::test]
async fn confirmation_survives_peer_that_never_reads_the_response() {
    use tokio::io::AsyncWriteExt;

    let fx = bound_server(Duration::from_secs(5)).await;
    let port = fx.port;
    let run = tokio::spawn(fx.server.run());

    let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port))
        .await
        .unwrap();
    // Reset on close so the server sees a dead peer instead of a clean FIN.
    stream.set_linger(Some(Duration::from_secs(0))).unwrap();
    stream
        .write_all(b"GET /callback?result=installed HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(stream);

    run.await.unwrap().unwrap();
    assert_eq!(fx.store.snapshot().unwrap().token, "TOK1");
}

#[tokio::test]
async fn store_write_failure_on_confirmation_surfaces() {
    let fx = bound_server(Duration::from_secs(10)).await;
    fx.store.set_fail_writes(true);
    let port = fx.port;
    let run = tokio::spawn(fx.server.run());

    let callback = format!("http://127.0.0.1:{port}/callback?result=installed");
    reqwest::get(&callback).await.unwrap();

    assert!(matches!(run.await.unwrap(), Err(LinkError::Store(_))));
}
