//! Firefox session runtime - transport, launcher, and binary provisioning
//!
//! This crate provides the low-level infrastructure for bootstrapping a
//! controllable Firefox instance:
//!
//! - **Provisioning**: resolving and downloading versioned browser builds
//! - **Launching**: spawning a build and waiting for its remote endpoint
//! - **Transport**: WebSocket message channel plus the slow-mo decorator
//! - **Errors**: the five-kind taxonomy every operation reports through
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   ffx-rs    │  Session bootstrap facade (Firefox, Browser, devices)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ ffx-runtime │  This crate
//! │  ┌────────┐ │
//! │  │ Launch │ │  Process spawn + endpoint wait
//! │  └────────┘ │
//! │  ┌────────┐ │
//! │  │ Fetch  │ │  Build download + extraction
//! │  └────────┘ │
//! │  ┌────────┐ │
//! │  │ Trans  │ │  WebSocket + slow-mo decorator
//! │  └────────┘ │
//! └─────────────┘
//! ```

pub mod error;
pub mod fetcher;
pub mod launcher;
pub mod transport;

// Re-export key types at crate root
pub use error::{ERROR_KINDS, Error, ErrorKind, ErrorKindInfo, Result};
pub use fetcher::{
    BrowserFetcher, DEFAULT_DOWNLOAD_HOST, FetcherOptions, OnProgress, Platform, RevisionInfo,
};
pub use launcher::{
    BrowserServer, DEFAULT_LAUNCH_TIMEOUT_MS, FirefoxLauncher, LaunchFuture, LaunchOptions,
    Launcher,
};
pub use transport::{SlowMoTransport, Transport, TransportFuture, WebSocketTransport};
