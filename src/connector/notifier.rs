use futures::Stream;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::ConnectorFault;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Lifecycle notification emitted by a connector
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The connection became usable. Emitted at most once.
    Ready,
    /// The connection failed irrecoverably, or a live connection was lost
    Error(ConnectorFault),
}

impl LifecycleEvent {
    pub fn is_ready(&self) -> bool {
        matches!(self, LifecycleEvent::Ready)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, LifecycleEvent::Error(_))
    }
}

/// What happened to an emitted event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Some subscription exists or has existed
    Handled,
    /// An error nobody has ever subscribed for
    Unhandled,
}

/// Fan-out of lifecycle events.
///
/// The first event ends the connect sequence and is replayed to every later
/// subscriber; anything after it is only delivered live. The replayed event
/// and the broadcast sender are guarded by one lock, so no subscriber sees
/// the first event twice or misses it.
pub(crate) struct Notifier {
    connector: Uuid,
    inner: Mutex<NotifierInner>,
}

struct NotifierInner {
    outcome: Option<LifecycleEvent>,
    subscribed: bool,
    sender: broadcast::Sender<LifecycleEvent>,
}

impl Notifier {
    pub fn new(connector: Uuid) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            connector,
            inner: Mutex::new(NotifierInner {
                outcome: None,
                subscribed: false,
                sender,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, NotifierInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn emit(&self, event: LifecycleEvent) -> Delivery {
        let mut inner = self.lock();

        if inner.outcome.is_none() {
            inner.outcome = Some(event.clone());
        }
        // No live receiver is fine as long as someone subscribed once
        let _ = inner.sender.send(event.clone());

        match &event {
            LifecycleEvent::Error(fault) if !inner.subscribed => {
                error!(connector = %self.connector, "Unhandled connector error: {}", fault);
                Delivery::Unhandled
            }
            _ => Delivery::Handled,
        }
    }

    pub fn subscribe(&self) -> LifecycleSubscription {
        let mut inner = self.lock();
        inner.subscribed = true;
        LifecycleSubscription {
            backlog: inner.outcome.iter().cloned().collect(),
            receiver: inner.sender.subscribe(),
        }
    }
}

/// Ordered stream of lifecycle events for one subscriber
pub struct LifecycleSubscription {
    backlog: VecDeque<LifecycleEvent>,
    receiver: broadcast::Receiver<LifecycleEvent>,
}

impl LifecycleSubscription {
    /// Next event, waiting if none is pending. `None` once the connector is gone.
    pub async fn recv(&mut self) -> Option<LifecycleEvent> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Lifecycle subscriber lagged, {} event(s) skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already pending
    pub fn try_recv(&mut self) -> Option<LifecycleEvent> {
        if let Some(event) = self.backlog.pop_front() {
            return Some(event);
        }

        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Lifecycle subscriber lagged, {} event(s) skipped", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = LifecycleEvent> + Send + Unpin {
        Box::pin(futures::stream::unfold(self, |mut subscription| async move {
            subscription.recv().await.map(|event| (event, subscription))
        }))
    }
}
