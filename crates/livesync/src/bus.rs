//! In-process publish/subscribe fan-out.
//!
//! Four independent categories: session pushes, parameter deltas, status
//! changes, heartbeat latency. Publishing calls every current subscriber
//! synchronously in subscription order. A subscriber that panics is logged
//! and skipped; the remaining subscribers still run and the publisher never
//! sees the failure.
//!
//! Events of one category reach every subscriber in publish order. A publish
//! made while that category is already delivering (from inside a handler, or
//! from another thread) is queued and delivered once the current event has
//! reached everyone.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use liveproto::{ParameterDelta, SessionSnapshot};
use tracing::{debug, warn};

use crate::status::StatusEvent;

/// Subscription category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Session,
    Delta,
    Status,
    Latency,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Session => "session",
            Category::Delta => "delta",
            Category::Status => "status",
            Category::Latency => "latency",
        }
    }
}

/// Handle returned by `subscribe`; pass it back to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    category: Category,
    id: u64,
}

impl Subscription {
    pub fn category(&self) -> Category {
        self.category
    }
}

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Outbox<T> {
    events: VecDeque<T>,
    delivering: bool,
}

/// One category's subscriber list.
pub struct Topic<T> {
    category: Category,
    next_id: AtomicU64,
    handlers: RwLock<Vec<(u64, Handler<T>)>>,
    outbox: Mutex<Outbox<T>>,
}

impl<T> Topic<T> {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            next_id: AtomicU64::new(1),
            handlers: RwLock::new(Vec::new()),
            outbox: Mutex::new(Outbox {
                events: VecDeque::new(),
                delivering: false,
            }),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(handler)));
        debug!("Subscribed to {}: id={}", self.category.as_str(), id);
        Subscription {
            category: self.category,
            id,
        }
    }

    /// Remove exactly the handler `id`. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        match handlers.iter().position(|(h, _)| *h == id) {
            Some(pos) => {
                handlers.remove(pos);
                debug!("Unsubscribed from {}: id={}", self.category.as_str(), id);
                true
            }
            None => false,
        }
    }

    /// Invoke every subscriber with `event`.
    ///
    /// The list is copied before each delivery, so handlers may subscribe or
    /// unsubscribe (themselves included) while running.
    pub fn publish(&self, event: &T)
    where
        T: Clone,
    {
        self.publish_if(|| Some(event.clone()));
    }

    /// Publish whatever `make` returns, if anything.
    ///
    /// `make` runs under the queue lock, so a state change made inside it is
    /// ordered with its event: two racing publishers deliver in the order
    /// their `make` calls ran. Returns whether an event was queued.
    pub fn publish_if<F>(&self, make: F) -> bool
    where
        F: FnOnce() -> Option<T>,
    {
        {
            let mut outbox = self.outbox();
            let Some(event) = make() else {
                return false;
            };
            outbox.events.push_back(event);
            if outbox.delivering {
                return true;
            }
            outbox.delivering = true;
        }

        loop {
            let event = {
                let mut outbox = self.outbox();
                match outbox.events.pop_front() {
                    Some(event) => event,
                    None => {
                        outbox.delivering = false;
                        return true;
                    }
                }
            };
            self.deliver(&event);
        }
    }

    fn outbox(&self) -> std::sync::MutexGuard<'_, Outbox<T>> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, event: &T) {
        let handlers: Vec<(u64, Handler<T>)> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, handler) in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(
                    "{} subscriber {} panicked; continuing with the rest",
                    self.category.as_str(),
                    id
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// All four categories.
pub struct EventBus {
    pub session: Topic<Arc<SessionSnapshot>>,
    pub delta: Topic<ParameterDelta>,
    pub status: Topic<StatusEvent>,
    pub latency: Topic<Duration>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            session: Topic::new(Category::Session),
            delta: Topic::new(Category::Delta),
            status: Topic::new(Category::Status),
            latency: Topic::new(Category::Latency),
        }
    }

    /// Idempotent; a second call for the same handle returns false.
    pub fn unsubscribe(&self, subscription: Subscription) -> bool {
        match subscription.category {
            Category::Session => self.session.unsubscribe(subscription.id),
            Category::Delta => self.delta.unsubscribe(subscription.id),
            Category::Status => self.status.unsubscribe(subscription.id),
            Category::Latency => self.latency.unsubscribe(subscription.id),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
