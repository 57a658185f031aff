//! ffx: bootstrap controllable Firefox sessions
//!
//! This crate is the entry point of the automation client. A [`Firefox`]
//! instance is bound to a project root and a browser revision; from there a
//! caller can provision the binary, launch it locally, or attach to an
//! already-running instance over WebSocket:
//!
//! ```ignore
//! use ffx::{ConnectOptions, Firefox};
//! use ffx::runtime::LaunchOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let firefox = Firefox::new("/srv/automation", "1028");
//!     firefox.download_browser(Default::default()).await?;
//!
//!     let browser = firefox.launch(LaunchOptions::new()).await?;
//!     let id = browser.send("session.status", serde_json::json!({})).await?;
//!     println!("sent request {id}");
//!     browser.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! Device emulation profiles are exposed through [`Firefox::devices`] as a
//! dual positional/name-keyed catalog, and the error taxonomy through
//! [`Firefox::errors`].

pub mod browser;
pub mod devices;
pub mod firefox;

pub use browser::Browser;
pub use devices::{DEVICE_DESCRIPTORS, DeviceCatalog, DeviceDescriptor, Viewport};
pub use firefox::{ConnectOptions, DEFAULT_CONNECT_TIMEOUT_MS, DownloadOptions, Firefox};

/// Low-level runtime re-exported for callers that configure launches,
/// fetchers, or custom orchestrators.
pub use ffx_runtime as runtime;

pub use ffx_runtime::{Error, ErrorKind, ErrorKindInfo, Result};
