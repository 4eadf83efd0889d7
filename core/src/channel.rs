//! Correlated request/response over a single duplex message pipe.
//!
//! # Design
//! The pipe itself has no request/response pairing. `HostChannel` adds it:
//! every `call` takes the next id from a counter that starts at 1 and never
//! resets, parks a `oneshot` sender under that id, and posts the frame. An
//! inbound frame whose `id` matches a parked sender completes it and removes
//! it, so each call resolves at most once. Frames with an unknown id and
//! frames of an unknown `type` are dropped; the first can be a call the
//! caller stopped waiting for, the second a newer host.
//!
//! Everything that is not a correlated response is decoded as a `HostEvent`
//! and queued for the console's event loop. Inbound frames are fed either by
//! calling `receive` directly or by a pump task reading an `mpsc` receiver.
//!
//! `rehome` swaps the outbound port and the inbound pump. Pending calls are
//! keyed by channel-scoped ids, so they survive the move.
//!
//! There is no timeout and no cancellation: dropping a `PendingCall` stops
//! waiting but leaves its entry until the host answers or the channel shuts
//! down. Every call carries a `CancellationToken` so callers can already
//! thread one through; the channel keeps it on the `PendingCall` and never
//! observes it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ChannelError;
use crate::protocol::{self, HostCall, HostEvent, Notification, ResponseFrame};

type Reply = Result<Value, ChannelError>;

/// Outbound half of the pipe. Implementations only need to deliver frames
/// in the order they are posted.
pub trait MessagePort: Send + Sync {
    fn post(&self, frame: Value) -> Result<(), ChannelError>;
}

/// In-process port backed by an unbounded `mpsc` channel.
#[derive(Debug, Clone)]
pub struct PipePort {
    tx: mpsc::UnboundedSender<Value>,
}

impl MessagePort for PipePort {
    fn post(&self, frame: Value) -> Result<(), ChannelError> {
        self.tx
            .send(frame)
            .map_err(|_| ChannelError::Port("pipe closed".to_string()))
    }
}

/// A port and the receiver that sees everything posted to it.
pub fn pipe() -> (PipePort, mpsc::UnboundedReceiver<Value>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PipePort { tx }, rx)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct HostChannel {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    port: Mutex<Arc<dyn MessagePort>>,
    events: mpsc::UnboundedSender<HostEvent>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl HostChannel {
    /// Create a channel on `port` and send the `CONSOLE_READY` handshake
    /// before anything else. Unsolicited events arrive on the returned
    /// receiver.
    pub fn open(
        port: Arc<dyn MessagePort>,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<HostEvent>), ChannelError> {
        let (events, events_rx) = mpsc::unbounded_channel();
        let channel = Arc::new(Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            port: Mutex::new(port),
            events,
            pump: Mutex::new(None),
        });
        channel.notify(&Notification::ConsoleReady)?;
        info!("host channel ready");
        Ok((channel, events_rx))
    }

    /// Issue a correlated call. The pending entry exists as soon as this
    /// returns, whether or not the result is ever awaited. `cancel` is held
    /// but not observed: cancelling it does not abandon the call.
    pub fn call(&self, call: HostCall, cancel: CancellationToken) -> PendingCall {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = match protocol::encode_call(id, &call) {
            Ok(frame) => frame,
            Err(err) => return PendingCall::failed(id, cancel, err),
        };

        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        debug!(id, "host call sent");
        if let Err(err) = self.port().post(frame) {
            lock(&self.pending).remove(&id);
            return PendingCall::failed(id, cancel, err);
        }
        PendingCall {
            id,
            cancel,
            state: PendingState::Waiting(rx),
        }
    }

    /// Send a fire-and-forget frame. No correlation id is allocated.
    pub fn notify(&self, notification: &Notification) -> Result<(), ChannelError> {
        let frame = protocol::encode_notification(notification)?;
        self.port().post(frame)
    }

    /// Dispatch one inbound frame.
    pub fn receive(&self, frame: Value) {
        if let Some(id) = frame.get("id").and_then(Value::as_u64) {
            let waiting = lock(&self.pending).remove(&id);
            if let Some(tx) = waiting {
                let reply = match serde_json::from_value::<ResponseFrame>(frame) {
                    Ok(response) => response.into_result(),
                    Err(err) => Err(ChannelError::Decode(err)),
                };
                debug!(id, ok = reply.is_ok(), "host call answered");
                // The caller may have stopped waiting; that is fine.
                let _ = tx.send(reply);
                return;
            }
            if frame.get("type").is_none() {
                debug!(id, "dropping response for unknown call");
                return;
            }
        }

        match serde_json::from_value::<HostEvent>(frame) {
            Ok(event) => {
                if self.events.send(event).is_err() {
                    debug!("event receiver gone; dropping host event");
                }
            }
            Err(err) => warn!(error = %err, "dropping unrecognized host frame"),
        }
    }

    /// Start pumping `inbound` into `receive` on the current tokio runtime,
    /// replacing any previous pump.
    pub fn attach(self: &Arc<Self>, inbound: mpsc::UnboundedReceiver<Value>) {
        let task = tokio::spawn(pump(Arc::downgrade(self), inbound));
        if let Some(previous) = lock(&self.pump).replace(task) {
            previous.abort();
        }
    }

    /// Move the conversation onto a new port. Subsequent sends go to `port`
    /// and subsequent receives come from `inbound`.
    pub fn rehome(self: &Arc<Self>, port: Arc<dyn MessagePort>, inbound: mpsc::UnboundedReceiver<Value>) {
        *lock(&self.port) = port;
        self.attach(inbound);
        info!(pending = self.pending_count(), "host channel re-homed");
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Stop the pump and fail every pending call with `ChannelError::Closed`.
    pub fn shutdown(&self) {
        if let Some(task) = lock(&self.pump).take() {
            task.abort();
        }
        let abandoned: Vec<_> = lock(&self.pending).drain().collect();
        if !abandoned.is_empty() {
            info!(count = abandoned.len(), "closing host channel with calls pending");
        }
    }

    fn port(&self) -> Arc<dyn MessagePort> {
        Arc::clone(&lock(&self.port))
    }
}

impl Drop for HostChannel {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.pump).take() {
            task.abort();
        }
    }
}

async fn pump(channel: Weak<HostChannel>, mut inbound: mpsc::UnboundedReceiver<Value>) {
    while let Some(frame) = inbound.recv().await {
        let Some(channel) = channel.upgrade() else {
            break;
        };
        channel.receive(frame);
    }
    debug!("host pump finished");
}

enum PendingState {
    Waiting(oneshot::Receiver<Reply>),
    Failed(Option<ChannelError>),
}

/// The eventual result of a `HostChannel::call`.
pub struct PendingCall {
    id: u64,
    cancel: CancellationToken,
    state: PendingState,
}

impl PendingCall {
    fn failed(id: u64, cancel: CancellationToken, err: ChannelError) -> Self {
        Self {
            id,
            cancel,
            state: PendingState::Failed(Some(err)),
        }
    }

    pub fn correlation_id(&self) -> u64 {
        self.id
    }

    /// The token this call was issued with. Reserved; nothing watches it.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Future for PendingCall {
    type Output = Result<Value, ChannelError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            PendingState::Waiting(rx) => Pin::new(rx)
                .poll(cx)
                .map(|reply| reply.unwrap_or(Err(ChannelError::Closed))),
            PendingState::Failed(err) => {
                Poll::Ready(Err(err.take().unwrap_or(ChannelError::Closed)))
            }
        }
    }
}
