//! Event Bus
//!
//! Synchronous, same-thread publish/subscribe. Listeners for a tag run in
//! subscription order; one failing listener (error or panic) is logged and
//! the rest still run.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use tracing::{debug, error};

use crate::game::events::{EventTag, GameEvent};

/// Event listener. Keep the `Rc` to unsubscribe later.
pub type Listener = Rc<dyn Fn(&GameEvent) -> anyhow::Result<()>>;

/// Wrap a closure as a listener.
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&GameEvent) -> anyhow::Result<()> + 'static,
{
    Rc::new(f)
}

/// Publish/subscribe router.
///
/// Listeners may publish, subscribe or unsubscribe re-entrantly: `publish`
/// works on a snapshot of the listener list taken before the first call.
#[derive(Default)]
pub struct EventBus {
    listeners: RefCell<BTreeMap<EventTag, Vec<Listener>>>,
    failures: Cell<u64>,
}

impl EventBus {
    /// Empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `tag`, after any existing listeners.
    pub fn subscribe(&self, tag: EventTag, listener: Listener) {
        self.listeners.borrow_mut().entry(tag).or_default().push(listener);
    }

    /// Remove the first registration of `listener` for `tag`.
    ///
    /// Returns false (no-op) if it was not subscribed.
    pub fn unsubscribe(&self, tag: EventTag, listener: &Listener) -> bool {
        let mut map = self.listeners.borrow_mut();
        let Some(list) = map.get_mut(&tag) else {
            return false;
        };
        let Some(pos) = list.iter().position(|l| Rc::ptr_eq(l, listener)) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            map.remove(&tag);
        }
        true
    }

    /// Deliver `event` to every listener of its tag.
    ///
    /// Returns the number of listeners that completed without error.
    pub fn publish(&self, event: &GameEvent) -> usize {
        let tag = event.tag();
        let snapshot: Vec<Listener> = match self.listeners.borrow().get(&tag) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut ok = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => ok += 1,
                Ok(Err(e)) => {
                    self.failures.set(self.failures.get() + 1);
                    error!("Listener for {:?} failed: {:#}", tag, e);
                }
                Err(_) => {
                    self.failures.set(self.failures.get() + 1);
                    error!("Listener for {:?} panicked", tag);
                }
            }
        }
        debug!("Published {:?} to {} listener(s)", tag, ok);
        ok
    }

    /// Publish a batch in order.
    pub fn publish_all<I>(&self, events: I)
    where
        I: IntoIterator<Item = GameEvent>,
    {
        for event in events {
            self.publish(&event);
        }
    }

    /// Number of listeners for a tag.
    pub fn listener_count(&self, tag: EventTag) -> usize {
        self.listeners.borrow().get(&tag).map_or(0, Vec::len)
    }

    /// Total listener failures since creation.
    pub fn failure_count(&self) -> u64 {
        self.failures.get()
    }
}

/// Registrations owned by one subscriber, undone together on shutdown.
#[derive(Default)]
pub struct Subscriptions {
    entries: Vec<(EventTag, Listener)>,
}

impl Subscriptions {
    /// No registrations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe and remember the registration.
    pub fn add(&mut self, bus: &EventBus, tag: EventTag, listener: Listener) {
        bus.subscribe(tag, listener.clone());
        self.entries.push((tag, listener));
    }

    /// Unsubscribe everything added so far. Returns how many were removed.
    pub fn clear(&mut self, bus: &EventBus) -> usize {
        self.entries
            .drain(..)
            .filter(|(tag, listener)| bus.unsubscribe(*tag, listener))
            .count()
    }

    /// Registrations held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Nothing registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::actor::ActorId;

    fn leashed() -> GameEvent {
        GameEvent::EnemyLeashed { enemy: ActorId(1) }
    }

    #[test]
    fn test_publish_without_listeners_is_noop() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(&leashed()), 0);
        assert_eq!(bus.failure_count(), 0);
    }

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let bus = EventBus::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for n in 0..3 {
            let log = log.clone();
            bus.subscribe(EventTag::EnemyLeashed, listener(move |_| {
                log.borrow_mut().push(n);
                Ok(())
            }));
        }

        bus.publish(&leashed());
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_listener_is_isolated() {
        let bus = EventBus::new();
        let calls = Rc::new(Cell::new(0));

        bus.subscribe(EventTag::EnemyLeashed, listener(|_| anyhow::bail!("boom")));
        let c = calls.clone();
        bus.subscribe(EventTag::EnemyLeashed, listener(move |_| {
            c.set(c.get() + 1);
            Ok(())
        }));

        assert_eq!(bus.publish(&leashed()), 1);
        assert_eq!(calls.get(), 1);
        assert_eq!(bus.failure_count(), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let calls = Rc::new(Cell::new(0));

        bus.subscribe(EventTag::EnemyLeashed, listener(|_| panic!("listener panic")));
        let c = calls.clone();
        bus.subscribe(EventTag::EnemyLeashed, listener(move |_| {
            c.set(c.get() + 1);
            Ok(())
        }));

        bus.publish(&leashed());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_unsubscribe_removes_exactly_one() {
        let bus = EventBus::new();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        let l = listener(move |_| {
            c.set(c.get() + 1);
            Ok(())
        });

        bus.subscribe(EventTag::EnemyLeashed, l.clone());
        bus.subscribe(EventTag::EnemyLeashed, l.clone());
        assert!(bus.unsubscribe(EventTag::EnemyLeashed, &l));
        assert_eq!(bus.listener_count(EventTag::EnemyLeashed), 1);

        bus.publish(&leashed());
        assert_eq!(calls.get(), 1);

        assert!(bus.unsubscribe(EventTag::EnemyLeashed, &l));
        assert!(!bus.unsubscribe(EventTag::EnemyLeashed, &l));
        assert!(!bus.unsubscribe(EventTag::DamageDealt, &l));
    }

    #[test]
    fn test_subscriptions_clear() {
        let bus = EventBus::new();
        let mut subs = Subscriptions::new();
        subs.add(&bus, EventTag::EnemyLeashed, listener(|_| Ok(())));
        subs.add(&bus, EventTag::DamageDealt, listener(|_| Ok(())));
        assert_eq!(subs.len(), 2);

        assert_eq!(subs.clear(&bus), 2);
        assert!(subs.is_empty());
        assert_eq!(bus.listener_count(EventTag::EnemyLeashed), 0);
        assert_eq!(bus.listener_count(EventTag::DamageDealt), 0);
    }

    #[test]
    fn test_reentrant_publish() {
        let bus = Rc::new(EventBus::new());
        let seen = Rc::new(Cell::new(0));

        let inner = bus.clone();
        bus.subscribe(EventTag::EnemyLeashed, listener(move |_| {
            inner.publish(&GameEvent::NpcDialogueEnded { npc: ActorId(2) });
            Ok(())
        }));
        let s = seen.clone();
        bus.subscribe(EventTag::NpcDialogueEnded, listener(move |_| {
            s.set(s.get() + 1);
            Ok(())
        }));

        bus.publish(&leashed());
        assert_eq!(seen.get(), 1);
    }
}
