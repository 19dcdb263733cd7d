use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;
use dashmap::DashMap;
use tokio::sync::Notify;
use tracing::{debug, info};
use uuid::Uuid;

use super::Event;
use crate::metrics::Metrics;

enum PushOutcome {
    Delivered,
    /// Delivered after discarding the oldest pending event.
    Overflowed,
    Closed,
}

/// Bounded per-subscriber queue. A full mailbox discards its own oldest
/// entry; the producer never waits on it.
struct Mailbox {
    queue: ArrayQueue<Arc<Event>>,
    notify: Notify,
    closed: AtomicBool,
}

impl Mailbox {
    fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    fn push(&self, event: Arc<Event>) -> PushOutcome {
        if self.closed.load(Ordering::Acquire) {
            return PushOutcome::Closed;
        }
        let outcome = match self.queue.force_push(event) {
            None => PushOutcome::Delivered,
            Some(_) => PushOutcome::Overflowed,
        };
        self.notify.notify_one();
        outcome
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Fan-out of [`Event`]s to a changing set of subscribers.
pub struct EventBus {
    subscribers: DashMap<Uuid, Arc<Mailbox>>,
    capacity: usize,
    closed: AtomicBool,
    metrics: Arc<Metrics>,
}

impl EventBus {
    pub fn new(capacity: usize, metrics: Arc<Metrics>) -> Self {
        Self {
            subscribers: DashMap::new(),
            capacity: capacity.max(1),
            closed: AtomicBool::new(false),
            metrics,
        }
    }

    /// Registers a subscriber. Dropping the returned guard unsubscribes it.
    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = Uuid::new_v4();
        let mailbox = Arc::new(Mailbox::new(self.capacity));

        if self.closed.load(Ordering::Acquire) {
            mailbox.close();
        } else {
            self.subscribers.insert(id, Arc::clone(&mailbox));
            self.metrics.sse_subscribers.inc();
            debug!(subscriber_id = %id, "Subscriber registered");
            // close() may have collected its ids before the insert landed.
            if self.closed.load(Ordering::Acquire) {
                self.release(id);
            }
        }

        Subscription {
            id,
            mailbox,
            bus: Arc::clone(self),
        }
    }

    /// Removes a subscriber and discards its backlog. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: Uuid) -> bool {
        match self.release(id) {
            Some(mailbox) => {
                while mailbox.queue.pop().is_some() {}
                true
            }
            None => false,
        }
    }

    /// Drops `id` from the registry and closes its mailbox, leaving any
    /// backlog readable.
    fn release(&self, id: Uuid) -> Option<Arc<Mailbox>> {
        let (_, mailbox) = self.subscribers.remove(&id)?;
        mailbox.close();
        self.metrics.sse_subscribers.dec();
        debug!(subscriber_id = %id, "Subscriber removed");
        Some(mailbox)
    }

    /// Enqueues `event` for every current subscriber and returns how many
    /// mailboxes received it. Never blocks.
    pub fn publish(&self, event: Event) -> usize {
        let event = Arc::new(event);
        self.metrics.events_published.inc();

        // Copy the registry first so no shard lock is held during fan-out.
        let targets: Vec<(Uuid, Arc<Mailbox>)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        let mut delivered = 0;
        for (id, mailbox) in targets {
            match mailbox.push(Arc::clone(&event)) {
                PushOutcome::Delivered => delivered += 1,
                PushOutcome::Overflowed => {
                    delivered += 1;
                    self.metrics.events_dropped.inc();
                    debug!(subscriber_id = %id, "Mailbox full, dropped oldest event");
                }
                PushOutcome::Closed => {}
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Ends every subscription; pending events can still be drained.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let ids: Vec<Uuid> = self.subscribers.iter().map(|entry| *entry.key()).collect();
        for id in &ids {
            self.release(*id);
        }
        info!("Event bus closed, {} subscribers released", ids.len());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Handle to one subscriber mailbox.
pub struct Subscription {
    id: Uuid,
    mailbox: Arc<Mailbox>,
    bus: Arc<EventBus>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next event. Returns `None` once the subscription has
    /// been closed and its mailbox drained.
    pub async fn recv(&self) -> Option<Arc<Event>> {
        loop {
            if let Some(event) = self.mailbox.queue.pop() {
                return Some(event);
            }
            if self.mailbox.is_closed() {
                return None;
            }
            self.mailbox.notify.notified().await;
        }
    }

    pub fn try_recv(&self) -> Option<Arc<Event>> {
        self.mailbox.queue.pop()
    }

    pub fn pending(&self) -> usize {
        self.mailbox.queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.mailbox.is_closed()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.id);
    }
}
