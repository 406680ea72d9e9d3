//! Broadcast primitives backing an action's observable streams
//!
//! None of these types lock internally. They live inside the action's state
//! and are only mutated while that state is held, which is what gives every
//! observer the same strictly ordered view of transitions.
//!
//! - [`Broadcast`]: live values only, late observers see nothing from before
//!   they attached.
//! - [`Replay`]: caches the last published value and hands it to each new
//!   observer before live values.
//! - [`StateSignal`]: always holds a value, suppresses consecutive duplicates
//!   and hands the current value to each new observer.

use async_channel::{Receiver, Sender, TrySendError};
use futures::Stream;
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::warn;

pin_project! {
    /// A subscription to one of an action's streams
    ///
    /// Ends when the action is disposed, or when the observer was configured
    /// with a bounded buffer and fell behind.
    pub struct Observer<T> {
        // Boxed so observers stay `Unpin` and work with `StreamExt::next`
        receiver: Pin<Box<Receiver<T>>>,
    }
}

impl<T> Observer<T> {
    fn new(receiver: Receiver<T>) -> Self {
        Self {
            receiver: Box::pin(receiver),
        }
    }

    /// Number of values delivered but not yet consumed
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

impl<T> Stream for Observer<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().receiver.as_mut().poll_next(cx)
    }
}

impl<T> std::fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .field("pending", &self.receiver.len())
            .field("closed", &self.receiver.is_closed())
            .finish()
    }
}

/// Fan-out to the currently attached observers
struct Subscribers<T> {
    senders: Vec<Sender<T>>,
    capacity: Option<usize>,
    action: Arc<str>,
    signal: &'static str,
}

impl<T> Subscribers<T> {
    fn new(action: Arc<str>, signal: &'static str, capacity: Option<usize>) -> Self {
        Self {
            senders: Vec::new(),
            capacity,
            action,
            signal,
        }
    }

    fn len(&self) -> usize {
        self.senders.len()
    }

    fn close(&mut self) {
        // Dropping the only sender ends the observer's stream
        self.senders.clear();
    }

    fn attach(&mut self, initial: Option<T>) -> Observer<T> {
        let (sender, receiver) = match self.capacity {
            Some(capacity) => async_channel::bounded(capacity.max(1)),
            None => async_channel::unbounded(),
        };
        if let Some(value) = initial {
            // Fresh channel with room for at least one value
            let _ = sender.try_send(value);
        }
        self.senders.push(sender);
        Observer::new(receiver)
    }
}

impl<T: Clone> Subscribers<T> {
    fn publish(&mut self, value: &T) {
        let action = &self.action;
        let signal = self.signal;
        self.senders
            .retain(|sender| match sender.try_send(value.clone()) {
                Ok(()) => true,
                Err(TrySendError::Closed(_)) => false,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        action = %action,
                        signal,
                        "Observer buffer full, disconnecting lagging observer"
                    );
                    false
                }
            });
    }
}

/// Live-only broadcast with no cache
pub(crate) struct Broadcast<T> {
    subscribers: Subscribers<T>,
}

impl<T> Broadcast<T> {
    pub(crate) fn new(action: Arc<str>, signal: &'static str, capacity: Option<usize>) -> Self {
        Self {
            subscribers: Subscribers::new(action, signal, capacity),
        }
    }

    pub(crate) fn observer_count(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn close(&mut self) {
        self.subscribers.close();
    }
}

impl<T: Clone> Broadcast<T> {
    pub(crate) fn subscribe(&mut self) -> Observer<T> {
        self.subscribers.attach(None)
    }

    pub(crate) fn publish(&mut self, value: T) {
        self.subscribers.publish(&value);
    }
}

/// Broadcast that replays the last value to late observers
pub(crate) struct Replay<T> {
    latest: Option<T>,
    subscribers: Subscribers<T>,
}

impl<T> Replay<T> {
    pub(crate) fn new(action: Arc<str>, signal: &'static str, capacity: Option<usize>) -> Self {
        Self {
            latest: None,
            subscribers: Subscribers::new(action, signal, capacity),
        }
    }

    pub(crate) fn latest(&self) -> Option<&T> {
        self.latest.as_ref()
    }

    pub(crate) fn close(&mut self) {
        self.subscribers.close();
    }
}

impl<T: Clone> Replay<T> {
    pub(crate) fn subscribe(&mut self) -> Observer<T> {
        self.subscribers.attach(self.latest.clone())
    }

    pub(crate) fn publish(&mut self, value: T) {
        self.subscribers.publish(&value);
        self.latest = Some(value);
    }
}

/// Current-value signal with consecutive duplicates suppressed
pub(crate) struct StateSignal<T> {
    value: T,
    subscribers: Subscribers<T>,
}

impl<T> StateSignal<T> {
    pub(crate) fn new(
        initial: T,
        action: Arc<str>,
        signal: &'static str,
        capacity: Option<usize>,
    ) -> Self {
        Self {
            value: initial,
            subscribers: Subscribers::new(action, signal, capacity),
        }
    }

    pub(crate) fn close(&mut self) {
        self.subscribers.close();
    }
}

impl<T: Clone + PartialEq> StateSignal<T> {
    pub(crate) fn get(&self) -> T {
        self.value.clone()
    }

    pub(crate) fn subscribe(&mut self) -> Observer<T> {
        self.subscribers.attach(Some(self.value.clone()))
    }

    /// Store `value`, notifying observers only if it differs from the current
    /// one. Returns whether a transition happened.
    pub(crate) fn set(&mut self, value: T) -> bool {
        if self.value == value {
            return false;
        }
        self.subscribers.publish(&value);
        self.value = value;
        true
    }
}
