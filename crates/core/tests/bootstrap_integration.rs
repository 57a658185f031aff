//! Integration tests for the session bootstrap facade.
//!
//! A tiny in-process WebSocket responder stands in for a running browser:
//! it answers the attach handshake and echoes every later request.

use ffx::runtime::{BrowserServer, Error, LaunchFuture, LaunchOptions, Launcher, Result};
use ffx::{ConnectOptions, ErrorKind, Firefox};
use futures_util::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;

/// Starts a responder that greets each connection's first message and then
/// echoes, returning its `ws://` URL.
async fn spawn_fake_browser() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                let mut greeted = false;
                while let Some(Ok(frame)) = ws.next().await {
                    if !frame.is_text() {
                        continue;
                    }
                    let reply = if greeted {
                        frame
                    } else {
                        greeted = true;
                        tokio_tungstenite::tungstenite::Message::Text(
                            serde_json::json!({"id": 0, "result": {}}).to_string(),
                        )
                    };
                    if ws.send(reply).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    format!("ws://{addr}")
}

/// Launcher double: hands out detached server handles for a fixed endpoint,
/// or fails provisioning.
struct FakeLauncher {
    ws_endpoint: Option<String>,
}

impl FakeLauncher {
    fn serving(ws_endpoint: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            ws_endpoint: Some(ws_endpoint.into()),
        })
    }

    fn broken() -> Arc<Self> {
        Arc::new(Self { ws_endpoint: None })
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, _options: LaunchOptions) -> LaunchFuture<'_> {
        Box::pin(async move {
            match &self.ws_endpoint {
                Some(endpoint) => Ok(BrowserServer::detached(endpoint.clone())),
                None => Err(Error::Provisioning(
                    "no build available for revision".to_string(),
                )),
            }
        })
    }

    fn executable_path(&self) -> Result<PathBuf> {
        Err(Error::Provisioning("not downloaded".to_string()))
    }

    fn default_args(&self, _options: &LaunchOptions) -> Result<Vec<String>> {
        Ok(vec!["-no-remote".to_string()])
    }
}

fn firefox_with(launcher: Arc<dyn Launcher>) -> Firefox {
    Firefox::with_launcher("/tmp/ffx-tests", "1028", launcher)
}

#[tokio::test]
async fn connect_rejects_an_empty_endpoint_without_dialing() {
    let firefox = firefox_with(FakeLauncher::broken());
    let err = firefox
        .connect(ConnectOptions::new(""))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn connect_reports_an_unreachable_endpoint() {
    let firefox = firefox_with(FakeLauncher::broken());
    let err = firefox
        .connect(ConnectOptions::new("ws://127.0.0.1:9").timeout(2_000))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connect);
}

#[tokio::test]
async fn connect_attaches_and_round_trips() {
    let url = spawn_fake_browser().await;
    let firefox = firefox_with(FakeLauncher::broken());

    let browser = firefox.connect(ConnectOptions::new(&url)).await.unwrap();
    let id = browser
        .send("session.status", serde_json::json!({}))
        .await
        .unwrap();
    let echoed = browser.next_message().await.unwrap();
    assert_eq!(echoed["id"], id);

    browser.close().await.unwrap();
}

#[tokio::test]
async fn connect_with_slow_mo_still_attaches() {
    let url = spawn_fake_browser().await;
    let firefox = firefox_with(FakeLauncher::broken());

    let browser = firefox
        .connect(ConnectOptions::new(&url).slow_mo(25))
        .await
        .unwrap();
    browser.close().await.unwrap();
}

#[tokio::test]
async fn launch_attaches_through_the_orchestrator() {
    let url = spawn_fake_browser().await;
    let firefox = firefox_with(FakeLauncher::serving(&url));

    let browser = firefox.launch(LaunchOptions::new()).await.unwrap();
    let id = browser
        .send("session.status", serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(browser.next_message().await.unwrap()["id"], id);
    browser.close().await.unwrap();
}

#[tokio::test]
async fn launch_reports_a_dead_server_endpoint_as_an_attach_failure() {
    let firefox = firefox_with(FakeLauncher::serving("ws://127.0.0.1:9"));
    let err = firefox.launch(LaunchOptions::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Attach);
}

#[tokio::test]
async fn launch_surfaces_provisioning_failures_without_a_handle() {
    let firefox = firefox_with(FakeLauncher::broken());
    let err = firefox.launch(LaunchOptions::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provisioning);
}

#[tokio::test]
async fn launch_server_exposes_the_endpoint_without_attaching() {
    let firefox = firefox_with(FakeLauncher::serving("ws://127.0.0.1:4242/session"));
    let server = firefox.launch_server(LaunchOptions::new()).await.unwrap();
    assert_eq!(server.ws_endpoint(), "ws://127.0.0.1:4242/session");
    server.close().await.unwrap();
}

#[tokio::test]
async fn concurrent_launch_and_connect_are_independent() {
    let url = spawn_fake_browser().await;
    let firefox = firefox_with(FakeLauncher::serving(&url));

    let (launched, connected) = tokio::join!(
        firefox.launch(LaunchOptions::new()),
        firefox.connect(ConnectOptions::new(&url)),
    );
    let launched = launched.unwrap();
    let connected = connected.unwrap();

    let id_a = launched
        .send("session.status", serde_json::json!({"from": "launched"}))
        .await
        .unwrap();
    let id_b = connected
        .send("session.status", serde_json::json!({"from": "connected"}))
        .await
        .unwrap();
    assert_eq!(launched.next_message().await.unwrap()["id"], id_a);
    assert_eq!(connected.next_message().await.unwrap()["id"], id_b);

    launched.close().await.unwrap();
    connected.close().await.unwrap();
}

#[tokio::test]
async fn executable_path_fails_before_any_download() {
    let dir = tempfile::tempdir().unwrap();
    let firefox = Firefox::new(dir.path(), "1028");
    let err = firefox.executable_path().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Provisioning);
}

#[test]
fn default_args_delegate_to_the_orchestrator() {
    let dir = tempfile::tempdir().unwrap();
    let firefox = Firefox::new(dir.path(), "1028");

    let args = firefox.default_args(&LaunchOptions::new()).unwrap();
    assert!(args.contains(&"-no-remote".to_string()));

    let err = firefox
        .default_args(&LaunchOptions::new().args(vec!["--remote-debugging-port=1".into()]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn devices_and_errors_are_always_available() {
    let firefox = firefox_with(FakeLauncher::broken());

    let devices = firefox.devices();
    assert!(!devices.is_empty());
    let first = &devices[0];
    assert_eq!(&devices[first.name], first);

    let errors = firefox.errors();
    assert_eq!(errors.len(), 5);
    assert!(errors.iter().any(|info| info.name == "ConnectError"));
}

#[test]
fn create_browser_fetcher_performs_no_io() {
    let firefox = firefox_with(FakeLauncher::broken());
    let fetcher = firefox.create_browser_fetcher(Default::default());
    let info = fetcher.revision_info("1028");
    assert_eq!(info.revision, "1028");
    assert!(!info.local);
}
