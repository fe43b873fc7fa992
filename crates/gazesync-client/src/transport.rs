//! Session Transport — one reconnecting duplex channel to the relay
//!
//! Owns the connection lifecycle: open, typed-envelope dispatch, bounded
//! linear backoff on abnormal closure, explicit teardown. Transport errors
//! never propagate past this component; they surface through the error
//! callback and the connection status, because the kiosk UI has to stay
//! responsive no matter what the network does.
//!
//! Callback registration is single-slot: registering a second callback for
//! the same kind replaces the first. Exactly one monitor view consumes each
//! transport, so a subscriber list would be dead weight.

use crate::sync::lock;
use futures::{SinkExt, StreamExt};
use gazesync_core::{
    ClientCountData, ConnectionStatus, Envelope, GazeData, Inbound, PageChangeData,
    ReconnectPolicy,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMsg};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

type ConnectCallback = Box<dyn FnMut() + Send>;
type ErrorCallback = Box<dyn FnMut(String) + Send>;
type GazeCallback = Box<dyn FnMut(GazeData) + Send>;
type PageChangeCallback = Box<dyn FnMut(PageChangeData) + Send>;
type ClientCountCallback = Box<dyn FnMut(ClientCountData) + Send>;

#[derive(Default)]
struct Handlers {
    on_connect: Option<ConnectCallback>,
    on_disconnect: Option<ConnectCallback>,
    on_error: Option<ErrorCallback>,
    on_gaze: Option<GazeCallback>,
    on_page_change: Option<PageChangeCallback>,
    on_client_count: Option<ClientCountCallback>,
    on_relay_error: Option<ErrorCallback>,
}

struct Inner {
    url: Url,
    policy: ReconnectPolicy,
    handlers: Mutex<Handlers>,
    status: Mutex<ConnectionStatus>,
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    attempts: AtomicU32,
    cancel: Mutex<CancellationToken>,
}

/// Cheaply cloneable handle to one relay connection. Constructed per
/// session with its URL and policy injected — not a process-wide singleton.
#[derive(Clone)]
pub struct SessionTransport {
    inner: Arc<Inner>,
}

impl SessionTransport {
    pub fn new(url: Url, policy: ReconnectPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                url,
                policy,
                handlers: Mutex::new(Handlers::default()),
                status: Mutex::new(ConnectionStatus::Disconnected),
                outbound: Mutex::new(None),
                attempts: AtomicU32::new(0),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Open the channel. No-op while already open. Resets the retry budget,
    /// so a user-triggered reconnect after the backoff cap tries again
    /// immediately. Must be called within a tokio runtime.
    pub fn connect(&self) {
        if self.status() == ConnectionStatus::Connected {
            return;
        }
        self.inner.attempts.store(0, Ordering::SeqCst);

        // Replace any pending connection task or reconnect timer
        let token = CancellationToken::new();
        let previous = std::mem::replace(&mut *lock(&self.inner.cancel), token.clone());
        previous.cancel();

        set_status(&self.inner, ConnectionStatus::Connecting);
        tokio::spawn(run(self.inner.clone(), token));
    }

    /// Close the channel and cancel any pending reconnect timer. A later
    /// `connect()` starts fresh. No callbacks fire after this returns.
    pub fn disconnect(&self) {
        self.inner.attempts.store(0, Ordering::SeqCst);
        lock(&self.inner.cancel).cancel();
        *lock(&self.inner.outbound) = None;
        *lock(&self.inner.status) = ConnectionStatus::Disconnected;
    }

    pub fn status(&self) -> ConnectionStatus {
        *lock(&self.inner.status)
    }

    /// Transmit an envelope while the channel is open; silently drop it
    /// otherwise. This is a liveness-sensitive stream, not a durable log —
    /// queueing stale samples for replay would mislead the observer.
    pub fn send(&self, envelope: &Envelope) {
        let guard = lock(&self.inner.outbound);
        let Some(tx) = guard.as_ref() else {
            debug!("transport not open, envelope dropped");
            return;
        };
        match envelope.encode() {
            Ok(text) => {
                if tx.send(text).is_err() {
                    debug!("connection task gone, envelope dropped");
                }
            }
            Err(e) => warn!(error = %e, "failed to encode envelope"),
        }
    }

    pub fn on_connect(&self, callback: impl FnMut() + Send + 'static) {
        lock(&self.inner.handlers).on_connect = Some(Box::new(callback));
    }

    pub fn on_disconnect(&self, callback: impl FnMut() + Send + 'static) {
        lock(&self.inner.handlers).on_disconnect = Some(Box::new(callback));
    }

    /// Transport-level failures: connect errors, abnormal closure.
    pub fn on_error(&self, callback: impl FnMut(String) + Send + 'static) {
        lock(&self.inner.handlers).on_error = Some(Box::new(callback));
    }

    pub fn on_gaze(&self, callback: impl FnMut(GazeData) + Send + 'static) {
        lock(&self.inner.handlers).on_gaze = Some(Box::new(callback));
    }

    pub fn on_page_change(&self, callback: impl FnMut(PageChangeData) + Send + 'static) {
        lock(&self.inner.handlers).on_page_change = Some(Box::new(callback));
    }

    pub fn on_client_count(&self, callback: impl FnMut(ClientCountData) + Send + 'static) {
        lock(&self.inner.handlers).on_client_count = Some(Box::new(callback));
    }

    /// Errors pushed by the relay itself (an `error` envelope).
    pub fn on_relay_error(&self, callback: impl FnMut(String) + Send + 'static) {
        lock(&self.inner.handlers).on_relay_error = Some(Box::new(callback));
    }
}

fn set_status(inner: &Inner, status: ConnectionStatus) {
    *lock(&inner.status) = status;
}

// Callbacks run with the handlers lock released, so a callback may register
// or replace handlers without deadlocking. A replacement made during the
// call wins; the in-flight callback is not restored over it.
macro_rules! fire {
    ($inner:expr, $slot:ident $(, $arg:expr)*) => {{
        let taken = lock(&$inner.handlers).$slot.take();
        if let Some(mut cb) = taken {
            cb($($arg),*);
            let mut handlers = lock(&$inner.handlers);
            if handlers.$slot.is_none() {
                handlers.$slot = Some(cb);
            }
        }
    }};
}

fn fire_connect(inner: &Inner) {
    fire!(inner, on_connect);
}

fn fire_disconnect(inner: &Inner) {
    fire!(inner, on_disconnect);
}

fn fire_error(inner: &Inner, message: String) {
    fire!(inner, on_error, message);
}

/// Connection task: connect, pump the duplex loop, back off, repeat until
/// cancelled or the retry budget runs out.
async fn run(inner: Arc<Inner>, cancel: CancellationToken) {
    loop {
        set_status(&inner, ConnectionStatus::Connecting);

        let connected = tokio::select! {
            _ = cancel.cancelled() => return,
            result = connect_async(inner.url.as_str()) => result,
        };

        match connected {
            Ok((stream, _)) => {
                inner.attempts.store(0, Ordering::SeqCst);

                // The channel must be open before the connect callback runs:
                // callbacks send from inside it (the subject announces its
                // page on every connect)
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();
                *lock(&inner.outbound) = Some(outbound_tx);
                set_status(&inner, ConnectionStatus::Connected);
                info!(url = %inner.url, "transport connected");
                fire_connect(&inner);

                match pump(&inner, stream, outbound_rx, &cancel).await {
                    PumpExit::Cancelled => {
                        *lock(&inner.outbound) = None;
                        return;
                    }
                    PumpExit::Closed(reason) => {
                        *lock(&inner.outbound) = None;
                        set_status(&inner, ConnectionStatus::Disconnected);
                        warn!(reason = %reason, "transport closed abnormally");
                        fire_disconnect(&inner);
                        fire_error(&inner, reason);
                    }
                }
            }
            Err(e) => {
                // A failed connect is a disconnection to consumers: the
                // status callback must not stay at Connecting while the
                // relay is unreachable
                set_status(&inner, ConnectionStatus::Disconnected);
                warn!(url = %inner.url, error = %e, "transport connect failed");
                fire_disconnect(&inner);
                fire_error(&inner, e.to_string());
            }
        }

        let attempt = inner.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match inner.policy.delay_for(attempt) {
            Some(delay) => {
                info!(
                    attempt,
                    max = inner.policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => {
                warn!("retry budget exhausted, waiting for an explicit reconnect");
                return;
            }
        }
    }
}

enum PumpExit {
    Cancelled,
    Closed(String),
}

async fn pump(
    inner: &Arc<Inner>,
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> PumpExit {
    let (mut ws_tx, mut ws_rx) = stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_tx.send(WsMsg::Close(None)).await;
                return PumpExit::Cancelled;
            }

            outgoing = outbound_rx.recv() => {
                match outgoing {
                    Some(text) => {
                        if let Err(e) = ws_tx.send(WsMsg::Text(text)).await {
                            return PumpExit::Closed(format!("send failed: {}", e));
                        }
                    }
                    None => return PumpExit::Closed("outbound channel dropped".to_string()),
                }
            }

            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(WsMsg::Text(text))) => dispatch(inner, &text),
                    Some(Ok(WsMsg::Close(_))) => {
                        return PumpExit::Closed("closed by peer".to_string());
                    }
                    Some(Ok(_)) => {} // Binary, Ping, Pong, Frame — ignore
                    Some(Err(e)) => return PumpExit::Closed(e.to_string()),
                    None => return PumpExit::Closed("stream ended".to_string()),
                }
            }
        }
    }
}

/// Route one inbound frame to its per-type callback. Unknown types and
/// malformed frames are logged and dropped, never fatal.
fn dispatch(inner: &Inner, text: &str) {
    match Envelope::decode(text) {
        Ok(Inbound::Known(Envelope::GazeData(data))) => fire!(inner, on_gaze, data),
        Ok(Inbound::Known(Envelope::PageChange(data))) => fire!(inner, on_page_change, data),
        Ok(Inbound::Known(Envelope::ClientCount(data))) => fire!(inner, on_client_count, data),
        Ok(Inbound::Known(Envelope::Error(data))) => fire!(inner, on_relay_error, data.message),
        Ok(Inbound::Unknown { kind }) => {
            warn!(kind = %kind, "unknown message type, ignored");
        }
        Err(e) => {
            warn!(error = %e, "malformed message dropped");
        }
    }
}
