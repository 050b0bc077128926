//! Store-owned change notification.
//!
//! Every [`DataBakeStore`](crate::DataBakeStore) carries its own
//! [`ChangeNotifier`]. Observers register either a callback or a channel and
//! receive one [`DataItemsChange`] per successful mutating call, after its
//! transaction committed. There is no replay: an observer registered after a
//! publish never sees that event.
//!
//! # Ordering
//!
//! The store queues each change while it still holds the connection lock, so
//! the queue is in commit order. Exactly one caller drains it at a time. A
//! change queued while a drain is running (from another thread, or from a
//! callback that writes to the store) is delivered by that drain after the
//! change in progress, so every observer sees changes in commit order. The
//! flip side is that a write can return before its own change has reached
//! every observer.
//!
//! # Panics
//!
//! A panicking callback is isolated: the panic is logged with `warn!` and
//! delivery continues with the next subscriber.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use data_bake_core::DataItemsChange;
use tracing::warn;

/// Callback invoked with each published change.
pub type ChangeCallback = dyn Fn(&DataItemsChange) + Send + Sync;

/// Handle returned by [`ChangeNotifier::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

#[derive(Clone)]
enum Sink {
    Callback(Arc<ChangeCallback>),
    Channel(Sender<DataItemsChange>),
}

#[derive(Default)]
struct Pending {
    changes: VecDeque<DataItemsChange>,
    draining: bool,
}

/// Fans out change events to the observers of one store.
pub struct ChangeNotifier {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Sink)>>,
    pending: Mutex<Pending>,
}

impl ChangeNotifier {
    /// Creates a notifier with no subscribers.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
            pending: Mutex::new(Pending::default()),
        }
    }

    /// Registers a callback for every subsequent change.
    ///
    /// Callbacks run without any store lock held, so they may call back into
    /// the store.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&DataItemsChange) + Send + Sync + 'static,
    {
        self.register(Sink::Callback(Arc::new(callback)))
    }

    /// Registers a channel and returns its receiving end.
    ///
    /// The subscription is dropped automatically on the first publish after
    /// the receiver goes away.
    pub fn subscribe_channel(&self) -> Receiver<DataItemsChange> {
        let (tx, rx) = mpsc::channel();
        self.register(Sink::Channel(tx));
        rx
    }

    /// Removes a subscription. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    /// Number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Queues `change` and delivers everything queued, unless a drain is
    /// already running, in which case that drain delivers it.
    pub fn publish(&self, change: DataItemsChange) {
        self.enqueue(change);
        self.flush();
    }

    /// Appends `change` to the delivery queue without delivering it.
    pub(crate) fn enqueue(&self, change: DataItemsChange) {
        self.pending().changes.push_back(change);
    }

    /// Delivers queued changes in FIFO order until the queue is empty.
    pub(crate) fn flush(&self) {
        {
            let mut pending = self.pending();
            if pending.draining {
                return;
            }
            pending.draining = true;
        }

        loop {
            let change = {
                let mut pending = self.pending();
                match pending.changes.pop_front() {
                    Some(change) => change,
                    None => {
                        pending.draining = false;
                        return;
                    }
                }
            };
            self.deliver(&change);
        }
    }

    fn deliver(&self, change: &DataItemsChange) {
        // Snapshot so callbacks can subscribe or unsubscribe while running.
        let sinks: Vec<(SubscriptionId, Sink)> = self.lock().clone();

        let mut disconnected = Vec::new();
        for (id, sink) in sinks {
            match sink {
                Sink::Callback(callback) => {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(change)));
                    if let Err(payload) = outcome {
                        warn!(
                            subscription = id.0,
                            panic = panic_message(payload.as_ref()),
                            "change callback panicked"
                        );
                    }
                }
                Sink::Channel(tx) => {
                    if tx.send(change.clone()).is_err() {
                        disconnected.push(id);
                    }
                }
            }
        }

        if !disconnected.is_empty() {
            self.lock().retain(|(id, _)| !disconnected.contains(id));
        }
    }

    fn register(&self, sink: Sink) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, sink));
        id
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Sink)>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
