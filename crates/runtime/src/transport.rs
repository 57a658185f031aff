//! Message transports for speaking to a running browser.
//!
//! Outbound messages go through the [`Transport`] trait; inbound messages are
//! delivered on the unbounded receiver handed out when the transport is
//! created. Keeping the two directions separate lets a decorator shape the
//! send path without touching delivery.
//!
//! [`SlowMoTransport`] is the one decorator shipped here: it defers every
//! outbound message by a fixed delay so automated interactions stay slow
//! enough for a human to follow.

use crate::error::{Error, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::Mutex as TokioMutex;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Boxed future returned by [`Transport`] methods, keeping the trait
/// object safe without an async-trait dependency.
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Outbound half of a bidirectional message channel.
///
/// `close` must be idempotent: the underlying channel is torn down exactly
/// once, and later calls succeed without effect. Sends after close fail.
pub trait Transport: Send + Sync {
    /// Sends one JSON message to the peer.
    fn send(&self, message: Value) -> TransportFuture<'_>;

    /// Closes the transport, releasing the underlying channel.
    fn close(&self) -> TransportFuture<'_>;
}

type WsSink =
    futures_util::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// WebSocket transport speaking JSON text frames.
pub struct WebSocketTransport {
    sink: TokioMutex<WsSink>,
    closed: AtomicBool,
}

impl WebSocketTransport {
    /// Dials `url` and returns the transport plus the inbound message stream.
    ///
    /// A reader task is spawned to decode incoming text frames; it exits when
    /// the peer closes the socket or the receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connect` if the dial or WebSocket handshake fails.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::UnboundedReceiver<Value>)> {
        tracing::debug!(%url, "dialing websocket endpoint");
        let (stream, _response) = connect_async(url)
            .await
            .map_err(|e| Error::Connect(format!("failed to dial {url}: {e}")))?;

        let (sink, mut ws_rx) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<Value>(&text) {
                        Ok(message) => {
                            if tx.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("discarding unparseable frame: {e}"),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!("websocket read ended: {e}");
                        break;
                    }
                }
            }
        });

        Ok((
            Self {
                sink: TokioMutex::new(sink),
                closed: AtomicBool::new(false),
            },
            rx,
        ))
    }
}

impl Transport for WebSocketTransport {
    fn send(&self, message: Value) -> TransportFuture<'_> {
        Box::pin(async move {
            if self.closed.load(Ordering::SeqCst) {
                return Err(Error::Connect("transport is closed".to_string()));
            }
            let text = serde_json::to_string(&message)
                .map_err(|e| Error::Connect(format!("failed to encode message: {e}")))?;
            let mut sink = self.sink.lock().await;
            sink.send(Message::Text(text))
                .await
                .map_err(|e| Error::Connect(format!("websocket send failed: {e}")))
        })
    }

    fn close(&self) -> TransportFuture<'_> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            let mut sink = self.sink.lock().await;
            // The peer may already be gone; a failed close frame is not an error.
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
            Ok(())
        })
    }
}

/// Decorator that defers every outbound message by a fixed delay.
///
/// Messages are enqueued at send time and forwarded by a single worker in
/// FIFO order, so two messages sent in order reach the inner transport in
/// that order even when their delay windows overlap. Each message is
/// forwarded no earlier than `delay` after its send.
///
/// Closing cancels messages still in their delay window without delivering
/// them and closes the inner transport exactly once.
pub struct SlowMoTransport {
    delay: Duration,
    queue: mpsc::UnboundedSender<(Value, Instant)>,
    closed: AtomicBool,
    shutdown: Arc<Notify>,
    done: TokioMutex<Option<oneshot::Receiver<Result<()>>>>,
}

impl SlowMoTransport {
    /// Wraps `inner`, deferring sends by `delay_ms` milliseconds.
    ///
    /// A delay of zero returns `inner` unchanged; no worker is spawned and
    /// the wrapped transport is indistinguishable from the original.
    pub fn wrap(inner: Box<dyn Transport>, delay_ms: u64) -> Box<dyn Transport> {
        if delay_ms == 0 {
            return inner;
        }

        let delay = Duration::from_millis(delay_ms);
        let (queue_tx, mut queue_rx) = mpsc::unbounded_channel::<(Value, Instant)>();
        let shutdown = Arc::new(Notify::new());
        let (done_tx, done_rx) = oneshot::channel();

        let signal = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = signal.notified() => break,
                    next = queue_rx.recv() => match next {
                        Some((message, deadline)) => {
                            tokio::select! {
                                biased;
                                // Cancel the pending send: it is never delivered.
                                _ = signal.notified() => break,
                                _ = tokio::time::sleep_until(deadline) => {
                                    if let Err(e) = inner.send(message).await {
                                        tracing::warn!("slow-mo forwarding failed: {e}");
                                        break;
                                    }
                                }
                            }
                        }
                        None => break,
                    },
                }
            }
            let _ = done_tx.send(inner.close().await);
        });

        Box::new(Self {
            delay,
            queue: queue_tx,
            closed: AtomicBool::new(false),
            shutdown,
            done: TokioMutex::new(Some(done_rx)),
        })
    }
}

impl Transport for SlowMoTransport {
    fn send(&self, message: Value) -> TransportFuture<'_> {
        let deadline = Instant::now() + self.delay;
        Box::pin(async move {
            if self.closed.load(Ordering::SeqCst) {
                return Err(Error::Connect("transport is closed".to_string()));
            }
            self.queue
                .send((message, deadline))
                .map_err(|_| Error::Connect("transport is closed".to_string()))
        })
    }

    fn close(&self) -> TransportFuture<'_> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            self.shutdown.notify_one();
            let done = self.done.lock().await.take();
            match done {
                Some(rx) => rx.await.unwrap_or(Ok(())),
                None => Ok(()),
            }
        })
    }
}
