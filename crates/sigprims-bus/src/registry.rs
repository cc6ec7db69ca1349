use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::config::DEFAULT_SUBSCRIBER_CAPACITY;
use crate::error::{BusError, Result};
use crate::key::TypeKey;

type Snapshot<T> =
    SmallVec<[(SubscriptionHandle, Arc<dyn Subscriber<T>>); DEFAULT_SUBSCRIBER_CAPACITY]>;

/// Receiving side of a payload type.
pub trait Subscriber<T>: Send + Sync {
    /// Handle one published value.
    fn receive(&self, value: &T);

    /// Gate delivery; `receive` is only called when this returns true.
    fn filter(&self, _value: &T) -> bool {
        true
    }
}

/// [`Subscriber`] built from closures.
pub struct FnSubscriber<T, R, P> {
    receive: R,
    filter: P,
    _payload: PhantomData<fn(&T)>,
}

fn accept_all<T>(_: &T) -> bool {
    true
}

impl<T, R> FnSubscriber<T, R, fn(&T) -> bool>
where
    R: Fn(&T) + Send + Sync,
{
    /// Subscriber that receives every value.
    pub fn new(receive: R) -> Self {
        Self {
            receive,
            filter: accept_all::<T>,
            _payload: PhantomData,
        }
    }
}

impl<T, R, P> FnSubscriber<T, R, P> {
    /// Replace the filter.
    pub fn with_filter<Q>(self, filter: Q) -> FnSubscriber<T, R, Q>
    where
        Q: Fn(&T) -> bool + Send + Sync,
    {
        FnSubscriber {
            receive: self.receive,
            filter,
            _payload: PhantomData,
        }
    }
}

impl<T, R, P> Subscriber<T> for FnSubscriber<T, R, P>
where
    R: Fn(&T) + Send + Sync,
    P: Fn(&T) -> bool + Send + Sync,
{
    fn receive(&self, value: &T) {
        (self.receive)(value)
    }

    fn filter(&self, value: &T) -> bool {
        (self.filter)(value)
    }
}

/// Slot-table handle of one registered subscriber.
///
/// The generation changes whenever the slot is vacated, so a handle kept
/// past its unregistration never matches a later occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    slot: u32,
    generation: u32,
}

impl SubscriptionHandle {
    /// Slot index in the registry table.
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Generation of the slot at registration time.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

struct Slot<T> {
    generation: u32,
    subscriber: Option<Arc<dyn Subscriber<T>>>,
}

struct RegistryState<T> {
    slots: Vec<Slot<T>>,
    /// Occupied slot indices in registration order.
    order: Vec<u32>,
}

impl<T> RegistryState<T> {
    fn occupant(&self, handle: SubscriptionHandle) -> Option<&Arc<dyn Subscriber<T>>> {
        let slot = self.slots.get(handle.slot as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.subscriber.as_ref()
    }
}

/// Fixed-capacity subscriber table for one payload type.
///
/// Delivery order is registration order. Unregistering keeps the relative
/// order of the remaining subscribers. The internal lock is only held for
/// bookkeeping, never while subscriber callbacks run, so a callback may
/// publish, subscribe or unsubscribe on the same registry.
pub struct Registry<T> {
    key: TypeKey,
    capacity: usize,
    state: Mutex<RegistryState<T>>,
}

impl<T: 'static> Registry<T> {
    /// Create an empty registry.
    pub fn new(key: TypeKey, capacity: usize) -> Self {
        Self {
            key,
            capacity,
            state: Mutex::new(RegistryState {
                slots: Vec::with_capacity(capacity),
                order: Vec::with_capacity(capacity),
            }),
        }
    }

    /// Add a subscriber at the end of the delivery order.
    pub fn register(&self, subscriber: Arc<dyn Subscriber<T>>) -> Result<SubscriptionHandle> {
        let mut state = self.state.lock();
        if state.order.len() >= self.capacity {
            return Err(BusError::CapacityExceeded {
                type_name: self.key.display_name(),
                capacity: self.capacity,
            });
        }

        let slot = match state.slots.iter().position(|slot| slot.subscriber.is_none()) {
            Some(free) => free,
            None => {
                state.slots.push(Slot {
                    generation: 0,
                    subscriber: None,
                });
                state.slots.len() - 1
            }
        };

        let entry = &mut state.slots[slot];
        entry.subscriber = Some(subscriber);
        let handle = SubscriptionHandle {
            slot: slot as u32,
            generation: entry.generation,
        };
        state.order.push(handle.slot);

        debug!(
            key = %self.key,
            slot = handle.slot,
            subscribers = state.order.len(),
            "subscriber registered"
        );
        Ok(handle)
    }

    /// Remove exactly the subscriber behind `handle`.
    pub fn unregister(&self, handle: SubscriptionHandle) -> Result<()> {
        let mut state = self.state.lock();
        if state.occupant(handle).is_none() {
            return Err(BusError::UnknownSubscription(handle));
        }

        let slot = &mut state.slots[handle.slot as usize];
        slot.subscriber = None;
        slot.generation = slot.generation.wrapping_add(1);

        if let Some(position) = state.order.iter().position(|&s| s == handle.slot) {
            state.order.remove(position);
        }

        debug!(
            key = %self.key,
            slot = handle.slot,
            subscribers = state.order.len(),
            "subscriber unregistered"
        );
        Ok(())
    }

    /// True while `handle` refers to a live subscriber.
    pub fn contains(&self, handle: SubscriptionHandle) -> bool {
        self.state.lock().occupant(handle).is_some()
    }

    /// Deliver `value` to every current subscriber whose filter accepts it.
    ///
    /// The subscriber list is snapshotted on entry. Subscribers added during
    /// dispatch only see later publishes; subscribers removed during dispatch
    /// are skipped if they have not been reached yet. Returns the number of
    /// `receive` calls made.
    pub fn publish(&self, value: &T) -> usize {
        let snapshot = self.snapshot();
        trace!(key = %self.key, subscribers = snapshot.len(), "publish");

        let mut delivered = 0usize;
        for (handle, subscriber) in snapshot {
            if !self.contains(handle) {
                continue;
            }
            if subscriber.filter(value) {
                trace!(key = %self.key, slot = handle.slot, "receive");
                subscriber.receive(value);
                delivered += 1;
            }
        }
        delivered
    }

    /// Live subscribers in delivery order. Stays on the stack up to the
    /// default capacity.
    fn snapshot(&self) -> Snapshot<T> {
        let state = self.state.lock();
        state
            .order
            .iter()
            .filter_map(|&slot| {
                let entry = &state.slots[slot as usize];
                entry.subscriber.as_ref().map(|subscriber| {
                    let handle = SubscriptionHandle {
                        slot,
                        generation: entry.generation,
                    };
                    (handle, Arc::clone(subscriber))
                })
            })
            .collect()
    }

    /// Number of registered subscribers.
    pub fn len(&self) -> usize {
        self.state.lock().order.len()
    }

    /// True when nothing is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of subscribers.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Routing key of the payload type.
    pub fn key(&self) -> TypeKey {
        self.key
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("key", &self.key)
            .field("capacity", &self.capacity)
            .field("subscribers", &self.state.lock().order.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    type Log = Arc<Mutex<Vec<(&'static str, i32)>>>;

    fn recorder(name: &'static str, log: &Log) -> Arc<dyn Subscriber<i32>> {
        let log = Arc::clone(log);
        Arc::new(FnSubscriber::new(move |value: &i32| {
            log.lock().push((name, *value));
        }))
    }

    fn registry(capacity: usize) -> Registry<i32> {
        Registry::new(TypeKey::implicit::<i32>(), capacity)
    }

    #[test]
    fn fan_out_in_registration_order() {
        let registry = registry(8);
        let log = Log::default();
        registry.register(recorder("s1", &log)).unwrap();
        registry.register(recorder("s2", &log)).unwrap();
        registry.register(recorder("s3", &log)).unwrap();

        assert_eq!(registry.publish(&42), 3);
        assert_eq!(*log.lock(), vec![("s1", 42), ("s2", 42), ("s3", 42)]);
    }

    #[test]
    fn capacity_is_enforced() {
        let registry = registry(2);
        let log = Log::default();
        registry.register(recorder("a", &log)).unwrap();
        registry.register(recorder("b", &log)).unwrap();

        let err = registry.register(recorder("c", &log)).unwrap_err();
        assert!(matches!(
            err,
            BusError::CapacityExceeded { capacity: 2, .. }
        ));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn freed_slot_can_be_reused() {
        let registry = registry(2);
        let log = Log::default();
        let a = registry.register(recorder("a", &log)).unwrap();
        registry.register(recorder("b", &log)).unwrap();

        registry.unregister(a).unwrap();
        let c = registry.register(recorder("c", &log)).unwrap();

        assert_eq!(c.slot(), a.slot());
        assert_ne!(c.generation(), a.generation());
        registry.publish(&1);
        assert_eq!(*log.lock(), vec![("b", 1), ("c", 1)]);
    }

    #[test]
    fn unregister_keeps_remaining_order() {
        let registry = registry(8);
        let log = Log::default();
        registry.register(recorder("a", &log)).unwrap();
        let b = registry.register(recorder("b", &log)).unwrap();
        registry.register(recorder("c", &log)).unwrap();
        registry.register(recorder("d", &log)).unwrap();

        registry.unregister(b).unwrap();
        registry.publish(&7);

        assert_eq!(*log.lock(), vec![("a", 7), ("c", 7), ("d", 7)]);
    }

    #[test]
    fn stale_handle_is_rejected() {
        let registry = registry(1);
        let log = Log::default();
        let first = registry.register(recorder("a", &log)).unwrap();
        registry.unregister(first).unwrap();
        let second = registry.register(recorder("b", &log)).unwrap();

        assert!(matches!(
            registry.unregister(first),
            Err(BusError::UnknownSubscription(_))
        ));
        assert!(registry.contains(second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn filter_gates_receive() {
        let registry = registry(4);
        let log = Log::default();
        let evens = Arc::clone(&log);
        registry
            .register(Arc::new(
                FnSubscriber::new(move |value: &i32| evens.lock().push(("even", *value)))
                    .with_filter(|value: &i32| value % 2 == 0),
            ))
            .unwrap();
        registry.register(recorder("all", &log)).unwrap();

        assert_eq!(registry.publish(&3), 1);
        assert_eq!(registry.publish(&4), 2);
        assert_eq!(*log.lock(), vec![("all", 3), ("even", 4), ("all", 4)]);
    }

    #[test]
    fn publish_with_no_subscribers_is_a_no_op() {
        let registry = registry(4);
        assert!(registry.is_empty());
        assert_eq!(registry.publish(&1), 0);
    }

    #[test]
    fn reentrant_publish_is_depth_first() {
        let registry = Arc::new(registry(4));
        let log = Log::default();

        let inner = Arc::clone(&registry);
        let seen = Arc::clone(&log);
        registry
            .register(Arc::new(FnSubscriber::new(move |value: &i32| {
                seen.lock().push(("chain", *value));
                if *value < 3 {
                    inner.publish(&(value + 1));
                }
            })))
            .unwrap();
        registry.register(recorder("tail", &log)).unwrap();

        registry.publish(&0);

        assert_eq!(
            *log.lock(),
            vec![
                ("chain", 0),
                ("chain", 1),
                ("chain", 2),
                ("chain", 3),
                ("tail", 3),
                ("tail", 2),
                ("tail", 1),
                ("tail", 0),
            ]
        );
    }

    #[test]
    fn subscriber_added_during_dispatch_waits_for_next_publish() {
        let registry = Arc::new(registry(4));
        let late_calls = Arc::new(AtomicUsize::new(0));

        let inner = Arc::clone(&registry);
        let counter = Arc::clone(&late_calls);
        let added = Arc::new(AtomicUsize::new(0));
        let added_flag = Arc::clone(&added);
        registry
            .register(Arc::new(FnSubscriber::new(move |_: &i32| {
                if added_flag.fetch_add(1, Ordering::SeqCst) == 0 {
                    let counter = Arc::clone(&counter);
                    inner
                        .register(Arc::new(FnSubscriber::new(move |_: &i32| {
                            counter.fetch_add(1, Ordering::SeqCst);
                        })))
                        .unwrap();
                }
            })))
            .unwrap();

        registry.publish(&1);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert_eq!(registry.len(), 2);

        registry.publish(&2);
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn subscriber_removed_during_dispatch_is_skipped() {
        let registry = Arc::new(registry(4));
        let log = Log::default();
        let victim: Arc<Mutex<Option<SubscriptionHandle>>> = Arc::default();

        let inner = Arc::clone(&registry);
        let target = Arc::clone(&victim);
        registry
            .register(Arc::new(FnSubscriber::new(move |_: &i32| {
                if let Some(handle) = target.lock().take() {
                    inner.unregister(handle).unwrap();
                }
            })))
            .unwrap();
        let handle = registry.register(recorder("victim", &log)).unwrap();
        registry.register(recorder("survivor", &log)).unwrap();
        *victim.lock() = Some(handle);

        assert_eq!(registry.publish(&5), 2);
        assert_eq!(*log.lock(), vec![("survivor", 5)]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn full_default_registry_snapshots_inline() {
        let registry = registry(DEFAULT_SUBSCRIBER_CAPACITY);
        let log = Log::default();
        for _ in 0..DEFAULT_SUBSCRIBER_CAPACITY {
            registry.register(recorder("s", &log)).unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), DEFAULT_SUBSCRIBER_CAPACITY);
        assert!(!snapshot.spilled());
        drop(snapshot);

        assert_eq!(registry.publish(&5), DEFAULT_SUBSCRIBER_CAPACITY);
        assert_eq!(log.lock().len(), DEFAULT_SUBSCRIBER_CAPACITY);
    }

    #[test]
    fn registry_debug_reports_counts() {
        let registry = registry(3);
        let log = Log::default();
        registry.register(recorder("a", &log)).unwrap();
        let debug = format!("{registry:?}");
        assert!(debug.contains("capacity: 3"));
        assert!(debug.contains("subscribers: 1"));
    }
}
