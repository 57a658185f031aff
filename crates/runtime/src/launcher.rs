//! Browser launch orchestration.
//!
//! [`FirefoxLauncher`] resolves the provisioned executable for its bound
//! revision, spawns it, and waits for the process to advertise its remote
//! endpoint on stdout/stderr. Process supervision beyond "spawn, wait for
//! the endpoint, kill on teardown" is out of scope.

use crate::error::{Error, Result};
use crate::fetcher::{BrowserFetcher, FetcherOptions};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

/// Default time to wait for a spawned browser to announce its endpoint.
pub const DEFAULT_LAUNCH_TIMEOUT_MS: u64 = 30_000;

/// Boxed future returned by [`Launcher::launch`].
pub type LaunchFuture<'a> = Pin<Box<dyn Future<Output = Result<BrowserServer>> + Send + 'a>>;

/// Options controlling a browser process launch.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Executable override; defaults to the provisioned revision binary.
    pub executable: Option<PathBuf>,
    /// Extra arguments appended after the managed ones.
    pub args: Option<Vec<String>>,
    /// Extra environment variables for the child process.
    pub env: Option<HashMap<String, String>>,
    /// Headless mode; defaults to true.
    pub headless: Option<bool>,
    /// Launch timeout in milliseconds; defaults to [`DEFAULT_LAUNCH_TIMEOUT_MS`].
    pub timeout: Option<u64>,
}

impl LaunchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the executable override.
    pub fn executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.executable = Some(path.into());
        self
    }

    /// Sets extra launch arguments.
    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = Some(args);
        self
    }

    /// Sets extra environment variables.
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Sets headless mode.
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = Some(headless);
        self
    }

    /// Sets the launch timeout in milliseconds.
    pub fn timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }
}

/// A spawned, not-yet-attached browser process.
///
/// The handle owns the child process until it is either consumed by an
/// attach or closed. Dropping the handle kills the process.
#[derive(Debug)]
pub struct BrowserServer {
    process: Option<Child>,
    ws_endpoint: String,
}

impl BrowserServer {
    pub(crate) fn new(process: Child, ws_endpoint: String) -> Self {
        Self {
            process: Some(process),
            ws_endpoint,
        }
    }

    /// Wraps an endpoint that is managed externally; closing a detached
    /// handle releases nothing.
    pub fn detached(ws_endpoint: impl Into<String>) -> Self {
        Self {
            process: None,
            ws_endpoint: ws_endpoint.into(),
        }
    }

    /// The WebSocket endpoint the browser listens on.
    pub fn ws_endpoint(&self) -> &str {
        &self.ws_endpoint
    }

    /// Kills the browser process and reaps it.
    pub async fn close(mut self) -> Result<()> {
        if let Some(mut process) = self.process.take() {
            #[cfg(windows)]
            {
                // Close stdio pipes before killing to avoid hangs on Windows.
                drop(process.stdin.take());
                drop(process.stdout.take());
                drop(process.stderr.take());
            }
            process
                .kill()
                .await
                .map_err(|e| Error::Launch(format!("failed to kill browser process: {e}")))?;
            let _ = process.wait().await;
        }
        Ok(())
    }
}

/// Contract for a launch orchestrator.
///
/// The default implementation is [`FirefoxLauncher`]; tests substitute their
/// own to exercise the bootstrap paths without spawning real processes.
pub trait Launcher: Send + Sync {
    /// Spawns a browser process and returns its server handle.
    fn launch(&self, options: LaunchOptions) -> LaunchFuture<'_>;

    /// Resolved executable path for the bound revision.
    fn executable_path(&self) -> Result<PathBuf>;

    /// Argument list that `launch` would use, without launching.
    fn default_args(&self, options: &LaunchOptions) -> Result<Vec<String>>;
}

/// Launches provisioned Firefox builds.
#[derive(Debug, Clone)]
pub struct FirefoxLauncher {
    project_root: PathBuf,
    revision: String,
}

impl FirefoxLauncher {
    pub fn new(project_root: impl Into<PathBuf>, revision: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            revision: revision.into(),
        }
    }
}

impl Launcher for FirefoxLauncher {
    fn launch(&self, options: LaunchOptions) -> LaunchFuture<'_> {
        Box::pin(async move {
            let executable = match &options.executable {
                Some(path) => path.clone(),
                None => self.executable_path()?,
            };
            let args = self.default_args(&options)?;
            let timeout =
                Duration::from_millis(options.timeout.unwrap_or(DEFAULT_LAUNCH_TIMEOUT_MS));

            tracing::debug!(executable = %executable.display(), ?args, "launching browser");
            let mut cmd = Command::new(&executable);
            cmd.args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);
            if let Some(env) = &options.env {
                cmd.envs(env);
            }

            let mut child = cmd.spawn().map_err(|e| {
                Error::Launch(format!("failed to spawn {}: {e}", executable.display()))
            })?;

            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| Error::Launch("failed to capture browser stdout".to_string()))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| Error::Launch("failed to capture browser stderr".to_string()))?;

            let endpoint =
                match tokio::time::timeout(timeout, wait_for_ws_endpoint(stdout, stderr, &mut child))
                    .await
                {
                    Ok(Ok(endpoint)) => endpoint,
                    Ok(Err(e)) => {
                        let _ = child.start_kill();
                        return Err(e);
                    }
                    Err(_) => {
                        let _ = child.start_kill();
                        return Err(Error::Launch(format!(
                            "timed out after {}ms waiting for the remote endpoint",
                            timeout.as_millis()
                        )));
                    }
                };

            tracing::debug!(%endpoint, "browser announced its endpoint");
            Ok(BrowserServer::new(child, endpoint))
        })
    }

    fn executable_path(&self) -> Result<PathBuf> {
        let fetcher = BrowserFetcher::new(&self.project_root, FetcherOptions::default());
        let info = fetcher.revision_info(&self.revision);
        if info.local {
            Ok(info.executable_path)
        } else {
            Err(Error::Provisioning(format!(
                "revision {} is not downloaded; download the browser first",
                self.revision
            )))
        }
    }

    fn default_args(&self, options: &LaunchOptions) -> Result<Vec<String>> {
        let mut args = vec!["-no-remote".to_string()];
        if cfg!(target_os = "macos") {
            args.push("-foreground".to_string());
        }
        if options.headless.unwrap_or(true) {
            args.push("-headless".to_string());
        }
        args.push("--remote-debugging-port=0".to_string());

        if let Some(extra) = &options.args {
            for arg in extra {
                if arg.trim().is_empty() {
                    return Err(Error::InvalidArgument(
                        "launch arguments must not be empty".to_string(),
                    ));
                }
                if arg.starts_with("--remote-debugging-port") {
                    return Err(Error::InvalidArgument(
                        "--remote-debugging-port is managed by the launcher".to_string(),
                    ));
                }
                args.push(arg.clone());
            }
        }
        Ok(args)
    }
}

/// Scans merged stdout/stderr lines for the advertised `ws://` endpoint.
async fn wait_for_ws_endpoint(
    stdout: impl AsyncRead + Unpin + Send + 'static,
    stderr: impl AsyncRead + Unpin + Send + 'static,
    child: &mut Child,
) -> Result<String> {
    let (line_tx, mut line_rx) = mpsc::unbounded_channel();
    let stderr_tx = line_tx.clone();
    tokio::spawn(pump_lines(stdout, line_tx));
    tokio::spawn(pump_lines(stderr, stderr_tx));

    loop {
        tokio::select! {
            line = line_rx.recv() => match line {
                Some(line) => {
                    tracing::trace!(%line, "browser output");
                    if let Some(endpoint) = extract_ws_endpoint(&line) {
                        return Ok(endpoint.to_string());
                    }
                }
                None => {
                    return Err(Error::Launch(
                        "browser output ended before the remote endpoint was announced".to_string(),
                    ));
                }
            },
            status = child.wait() => {
                let status = status
                    .map_err(|e| Error::Launch(format!("failed to wait for browser process: {e}")))?;
                return Err(Error::Launch(format!(
                    "browser process exited with {status} before the remote endpoint was announced"
                )));
            }
        }
    }
}

async fn pump_lines(reader: impl AsyncRead + Unpin, tx: mpsc::UnboundedSender<String>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(line).is_err() {
            break;
        }
    }
}

fn extract_ws_endpoint(line: &str) -> Option<&str> {
    let start = line.find("ws://").or_else(|| line.find("wss://"))?;
    let tail = &line[start..];
    let end = tail.find(char::is_whitespace).unwrap_or(tail.len());
    Some(&tail[..end])
}
