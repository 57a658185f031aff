// Copyright 2024 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Browser - live handle over an attached transport
//
// Reference:
// - upstream entry facade: firefox/ffPlaywright (connect handshake, server ownership)

use ffx_runtime::{BrowserServer, Error, Result, Transport, WebSocketTransport};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::mpsc;

/// Time allowed for the attach handshake to complete.
const ATTACH_TIMEOUT: Duration = Duration::from_secs(10);

/// A live, controllable browser.
///
/// Produced by attaching over a transport; owned by the caller until
/// [`Browser::close`]. When the browser was launched locally, the handle
/// also owns the server process and shuts it down on close.
///
/// The attach handshake verifies one round trip. A connection that dies
/// immediately *after* a successful handshake is reported by the first
/// subsequent [`Browser::send`] or [`Browser::next_message`], not as a
/// delayed attach failure.
pub struct Browser {
    transport: Box<dyn Transport>,
    incoming: TokioMutex<mpsc::UnboundedReceiver<Value>>,
    /// Owned server process, if this handle launched one.
    ///
    /// `Option` so close can take ownership; the parking_lot lock is never
    /// held across an await.
    server: Mutex<Option<BrowserServer>>,
    next_id: AtomicU64,
}

impl Browser {
    /// Performs the attach handshake over an established transport.
    ///
    /// On failure the transport, and the server if one was handed over, are
    /// torn down before the error is returned; no half-attached handle ever
    /// escapes.
    pub(crate) async fn attach(
        transport: Box<dyn Transport>,
        mut incoming: mpsc::UnboundedReceiver<Value>,
        server: Option<BrowserServer>,
    ) -> Result<Self> {
        let hello = serde_json::json!({
            "id": 0,
            "method": "session.hello",
            "params": { "client": "ffx", "version": env!("CARGO_PKG_VERSION") },
        });

        if let Err(e) = transport.send(hello).await {
            teardown(transport, server).await;
            return Err(Error::Attach(format!("handshake send failed: {e}")));
        }

        match tokio::time::timeout(ATTACH_TIMEOUT, incoming.recv()).await {
            Ok(Some(greeting)) => {
                tracing::debug!(?greeting, "browser attached");
                Ok(Self {
                    transport,
                    incoming: TokioMutex::new(incoming),
                    server: Mutex::new(server),
                    next_id: AtomicU64::new(1),
                })
            }
            Ok(None) => {
                teardown(transport, server).await;
                Err(Error::Attach(
                    "connection closed during handshake".to_string(),
                ))
            }
            Err(_) => {
                teardown(transport, server).await;
                Err(Error::Attach(format!(
                    "no handshake reply within {}s",
                    ATTACH_TIMEOUT.as_secs()
                )))
            }
        }
    }

    /// Dials a launched server's endpoint and attaches, taking ownership of
    /// the server. The process is torn down if the dial or handshake fails.
    ///
    /// A dial failure here is part of the attach step, not a remote-connect
    /// failure, so it is reported as `Error::Attach`.
    pub(crate) async fn attach_to_server(server: BrowserServer) -> Result<Self> {
        match WebSocketTransport::connect(server.ws_endpoint()).await {
            Ok((transport, incoming)) => {
                Self::attach(Box::new(transport), incoming, Some(server)).await
            }
            Err(e) => {
                let _ = server.close().await;
                Err(Error::Attach(format!("failed to dial launched server: {e}")))
            }
        }
    }

    /// Sends one protocol request and returns its message id.
    pub async fn send(&self, method: &str, params: Value) -> Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = serde_json::json!({ "id": id, "method": method, "params": params });
        self.transport.send(message).await?;
        Ok(id)
    }

    /// Receives the next inbound message.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connect` once the connection is gone.
    pub async fn next_message(&self) -> Result<Value> {
        self.incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| Error::Connect("connection closed".to_string()))
    }

    /// Closes the transport and shuts down the owned server, if any.
    pub async fn close(&self) -> Result<()> {
        self.transport.close().await?;
        let server = self.server.lock().take();
        if let Some(server) = server {
            tracing::debug!("shutting down launched browser server");
            server.close().await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Browser")
            .field("owns_server", &self.server.lock().is_some())
            .finish()
    }
}

async fn teardown(transport: Box<dyn Transport>, server: Option<BrowserServer>) {
    let _ = transport.close().await;
    if let Some(server) = server {
        let _ = server.close().await;
    }
}
