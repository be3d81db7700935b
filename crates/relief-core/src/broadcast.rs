//! Fire-and-forget fan-out of mutation events.
//!
//! Backed by a [`tokio::sync::broadcast`] channel: every subscriber
//! connected at publish time receives the event, late subscribers never
//! see it, and nothing is persisted. A subscriber that falls more than
//! the channel capacity behind receives
//! [`RecvError::Lagged`](broadcast::error::RecvError::Lagged) and resumes
//! from the oldest retained event.

use std::collections::BTreeSet;

use relief_types::{AuditAction, EntityKind, EventName, MutationEvent};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::CoreError;

/// Which event names a subscriber wants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    names: Option<BTreeSet<EventName>>,
}

impl EventFilter {
    /// Accept every event.
    pub const fn all() -> Self {
        Self { names: None }
    }

    /// Accept only the listed names.
    pub fn only(names: impl IntoIterator<Item = EventName>) -> Self {
        Self {
            names: Some(names.into_iter().collect()),
        }
    }

    /// Parse a comma-separated list of wire names. An empty list accepts
    /// every event.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] naming the first unknown event.
    pub fn parse_list(list: &str) -> Result<Self, CoreError> {
        let mut names = BTreeSet::new();
        for raw in list.split(',').filter(|s| !s.trim().is_empty()) {
            let name = EventName::parse(raw)
                .ok_or_else(|| CoreError::Validation(format!("unknown event: {}", raw.trim())))?;
            names.insert(name);
        }
        if names.is_empty() {
            Ok(Self::all())
        } else {
            Ok(Self { names: Some(names) })
        }
    }

    /// Whether an event named `name` passes the filter.
    pub fn accepts(&self, name: EventName) -> bool {
        self.names.as_ref().is_none_or(|names| names.contains(&name))
    }
}

/// Publisher side of the channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<MutationEvent>,
    clock: Clock,
}

impl Broadcaster {
    /// Create a channel retaining up to `capacity` events per subscriber.
    pub fn new(capacity: usize, clock: Clock) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, clock }
    }

    /// Announce a mutation. Returns the number of subscribers reached;
    /// zero subscribers is not an error.
    pub fn publish(
        &self,
        event: EventName,
        entity: EntityKind,
        id: Uuid,
        action: AuditAction,
        payload: serde_json::Value,
    ) -> usize {
        let receivers = self
            .tx
            .send(MutationEvent {
                event,
                entity,
                id,
                action,
                payload,
                emitted_at: self.clock.now(),
            })
            .unwrap_or(0);
        tracing::debug!(%event, %id, receivers, "Published mutation event");
        receivers
    }

    /// Register a subscriber for events passing `filter`.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            filter,
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One registered subscriber. Dropping it (or calling
/// [`Subscription::unsubscribe`]) unregisters.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<MutationEvent>,
    filter: EventFilter,
}

impl Subscription {
    /// Wait for the next event passing the filter.
    ///
    /// # Errors
    ///
    /// Returns [`broadcast::error::RecvError::Lagged`] if events were
    /// dropped because this subscriber fell behind (receiving again
    /// resumes), or [`broadcast::error::RecvError::Closed`] once every
    /// [`Broadcaster`] is gone.
    pub async fn recv(&mut self) -> Result<MutationEvent, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if self.filter.accepts(event.event) {
                return Ok(event);
            }
        }
    }

    /// Take the next already-delivered event passing the filter, if any.
    ///
    /// # Errors
    ///
    /// Returns [`broadcast::error::TryRecvError::Empty`] when nothing is
    /// waiting, plus the lag and closed cases of [`Subscription::recv`].
    pub fn try_recv(&mut self) -> Result<MutationEvent, broadcast::error::TryRecvError> {
        loop {
            let event = self.rx.try_recv()?;
            if self.filter.accepts(event.event) {
                return Ok(event);
            }
        }
    }

    /// The filter this subscription applies.
    pub const fn filter(&self) -> &EventFilter {
        &self.filter
    }

    /// Stop receiving events.
    pub fn unsubscribe(self) {
        drop(self);
    }
}
