// Copyright 2024 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Firefox - session bootstrap entry point
//
// Reference:
// - upstream entry facade: firefox/ffPlaywright (launch / connect / devices / errors)

use crate::Browser;
use crate::devices::{DEVICE_DESCRIPTORS, DeviceCatalog};
use ffx_runtime::fetcher::OnProgress;
use ffx_runtime::{
    BrowserFetcher, BrowserServer, ERROR_KINDS, Error, ErrorKindInfo, FetcherOptions,
    FirefoxLauncher, LaunchOptions, Launcher, Platform, Result, RevisionInfo, SlowMoTransport,
    WebSocketTransport,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default dial timeout for [`Firefox::connect`], in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 30_000;

/// Options for [`Firefox::connect`].
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// WebSocket endpoint of the running browser. Required.
    pub ws_endpoint: String,
    /// Artificial delay applied to every outbound message, in milliseconds.
    /// Zero or absent means no decoration.
    pub slow_mo: Option<u64>,
    /// Dial timeout in milliseconds; defaults to [`DEFAULT_CONNECT_TIMEOUT_MS`].
    pub timeout: Option<u64>,
}

impl ConnectOptions {
    pub fn new(ws_endpoint: impl Into<String>) -> Self {
        Self {
            ws_endpoint: ws_endpoint.into(),
            ..Self::default()
        }
    }

    /// Sets the artificial per-message delay.
    pub fn slow_mo(mut self, delay_ms: u64) -> Self {
        self.slow_mo = Some(delay_ms);
        self
    }

    /// Sets the dial timeout in milliseconds.
    pub fn timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }
}

/// Options for [`Firefox::download_browser`].
#[derive(Default)]
pub struct DownloadOptions {
    /// Download host override.
    pub host: Option<String>,
    /// Platform override.
    pub platform: Option<Platform>,
    /// Progress callback, invoked with non-decreasing `(downloaded, total)`.
    pub on_progress: Option<Box<OnProgress>>,
}

impl DownloadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the download host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the target platform.
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Sets the progress callback.
    pub fn on_progress(mut self, report: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(report));
        self
    }
}

impl std::fmt::Debug for DownloadOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOptions")
            .field("host", &self.host)
            .field("platform", &self.platform)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

/// Entry point for bootstrapping controllable Firefox sessions.
///
/// A `Firefox` instance is bound to a project root (where provisioned
/// builds are stored) and one browser revision. Both are immutable for the
/// instance lifetime, and every operation is an independent transaction, so
/// concurrent calls on one instance never contend.
///
/// # Example
///
/// ```ignore
/// use ffx::{ConnectOptions, Firefox};
/// use ffx_runtime::LaunchOptions;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let firefox = Firefox::new(std::env::current_dir()?, "1028");
///
///     // Provision the binary, then launch and drive it.
///     firefox.download_browser(Default::default()).await?;
///     let browser = firefox.launch(LaunchOptions::new()).await?;
///     browser.close().await?;
///
///     // Or attach to an already-running instance, slowed down for a demo.
///     let browser = firefox
///         .connect(ConnectOptions::new("ws://127.0.0.1:3712/session").slow_mo(150))
///         .await?;
///     browser.close().await?;
///     Ok(())
/// }
/// ```
pub struct Firefox {
    project_root: PathBuf,
    revision: String,
    launcher: Arc<dyn Launcher>,
}

impl Firefox {
    /// Creates a bootstrap bound to `project_root` and `revision`, using the
    /// default [`FirefoxLauncher`] for orchestration.
    pub fn new(project_root: impl Into<PathBuf>, revision: impl Into<String>) -> Self {
        let project_root = project_root.into();
        let revision = revision.into();
        let launcher = Arc::new(FirefoxLauncher::new(&project_root, &revision));
        Self {
            project_root,
            revision,
            launcher,
        }
    }

    /// Creates a bootstrap with a custom launch orchestrator.
    pub fn with_launcher(
        project_root: impl Into<PathBuf>,
        revision: impl Into<String>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            project_root: project_root.into(),
            revision: revision.into(),
            launcher,
        }
    }

    /// The revision this bootstrap is bound to.
    pub fn revision(&self) -> &str {
        &self.revision
    }

    /// The project root provisioned builds are stored under.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Downloads the bound revision and returns its resolved metadata.
    ///
    /// # Errors
    ///
    /// Returns `Error::Provisioning` if the revision cannot be resolved or
    /// the download fails.
    pub async fn download_browser(&self, options: DownloadOptions) -> Result<RevisionInfo> {
        let fetcher = self.create_browser_fetcher(FetcherOptions {
            host: options.host,
            platform: options.platform,
            downloads_path: None,
        });
        fetcher
            .download(&self.revision, options.on_progress.as_deref())
            .await
    }

    /// Launches a local browser and attaches to it.
    ///
    /// The launched server handle transfers into the attach step and is
    /// owned by the returned [`Browser`]; it is never exposed here. On an
    /// attach failure the spawned process is torn down before the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Provisioning` / `Error::Launch` when the orchestrator
    /// cannot provision or start the binary, and `Error::Attach` when the
    /// post-launch dial or handshake fails.
    pub async fn launch(&self, options: LaunchOptions) -> Result<Browser> {
        let server = self.launcher.launch(options).await?;
        Browser::attach_to_server(server).await
    }

    /// Launches a local browser and returns the server handle without
    /// attaching, for callers that manage the endpoint externally.
    pub async fn launch_server(&self, options: LaunchOptions) -> Result<BrowserServer> {
        self.launcher.launch(options).await
    }

    /// Attaches to an already-running browser over its WebSocket endpoint.
    ///
    /// When `slow_mo` is set and nonzero, the transport is wrapped so every
    /// outbound message is deferred by that many milliseconds.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for an empty endpoint (no dial is
    /// attempted), `Error::Connect` when the dial fails or times out, and
    /// `Error::Attach` when the handshake after connecting fails; in that
    /// case the dialed transport is closed before the error is returned.
    pub async fn connect(&self, options: ConnectOptions) -> Result<Browser> {
        if options.ws_endpoint.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "ws_endpoint is required".to_string(),
            ));
        }

        let timeout =
            Duration::from_millis(options.timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS));
        let (transport, incoming) =
            match tokio::time::timeout(timeout, WebSocketTransport::connect(&options.ws_endpoint))
                .await
            {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(Error::Connect(format!(
                        "timed out dialing {} after {}ms",
                        options.ws_endpoint,
                        timeout.as_millis()
                    )));
                }
            };

        let transport = SlowMoTransport::wrap(Box::new(transport), options.slow_mo.unwrap_or(0));
        Browser::attach(transport, incoming, None).await
    }

    /// Resolved executable path for the bound revision.
    ///
    /// # Errors
    ///
    /// Returns `Error::Provisioning` when the revision has not been
    /// downloaded.
    pub fn executable_path(&self) -> Result<PathBuf> {
        self.launcher.executable_path()
    }

    /// The device catalog, rebuilt fresh on every access.
    pub fn devices(&self) -> DeviceCatalog {
        DeviceCatalog::build(DEVICE_DESCRIPTORS)
    }

    /// The fixed error-kind registry.
    pub fn errors(&self) -> &'static [ErrorKindInfo] {
        ERROR_KINDS
    }

    /// Argument list that [`Firefox::launch`] would use, without launching.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidArgument` for malformed configuration.
    pub fn default_args(&self, options: &LaunchOptions) -> Result<Vec<String>> {
        self.launcher.default_args(options)
    }

    /// Constructs a fetcher bound to the project root. Performs no I/O.
    pub fn create_browser_fetcher(&self, options: FetcherOptions) -> BrowserFetcher {
        BrowserFetcher::new(&self.project_root, options)
    }
}

impl std::fmt::Debug for Firefox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Firefox")
            .field("project_root", &self.project_root)
            .field("revision", &self.revision)
            .finish()
    }
}
