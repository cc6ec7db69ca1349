use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::BusConfig;
use crate::endpoint::{Publisher, Subscription};
use crate::error::{BusError, Result};
use crate::key::TypeKey;
use crate::registry::{FnSubscriber, Registry, Subscriber};

static GLOBAL: OnceLock<Bus> = OnceLock::new();

#[derive(Default)]
struct BusState {
    keys: HashMap<TypeId, TypeKey>,
    ids: HashMap<u32, TypeId>,
    registries: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl BusState {
    fn assign(&mut self, type_id: TypeId, key: TypeKey) -> Result<TypeKey> {
        if let Some(existing) = self.keys.get(&type_id) {
            if *existing == key {
                return Ok(key);
            }
            return Err(BusError::KeyConflict {
                type_name: key.rust_name(),
                existing: *existing,
                requested: key,
            });
        }

        if let Some(owner) = self.ids.get(&key.id()) {
            let existing = self
                .keys
                .get(owner)
                .map(TypeKey::display_name)
                .unwrap_or("<unknown>");
            return Err(BusError::IdCollision {
                id: key.id(),
                existing,
                requested: key.display_name(),
            });
        }

        if key.is_implicit() {
            warn!(
                type_name = key.rust_name(),
                "using compiler-generated type name as key; ids are not portable"
            );
        }
        debug!(key = %key, "type key assigned");
        self.keys.insert(type_id, key);
        self.ids.insert(key.id(), type_id);
        Ok(key)
    }
}

/// Registry-of-registries: one [`Registry<T>`] per payload type.
///
/// A type's [`TypeKey`] is fixed the first time the type is used or
/// declared, and cannot be changed afterwards. Registries are created on
/// first use and live as long as the bus.
pub struct Bus {
    config: BusConfig,
    state: Mutex<BusState>,
}

impl Bus {
    /// Create a bus with default config.
    pub fn new() -> Self {
        Self::with_config(BusConfig::default())
    }

    /// Create a bus with explicit config.
    pub fn with_config(config: BusConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BusState::default()),
        }
    }

    /// Initialize the process-wide bus with explicit config.
    ///
    /// Fails if the global bus already exists, either from an earlier call or
    /// from [`Bus::global`].
    pub fn init_global(config: BusConfig) -> Result<&'static Bus> {
        let mut created = false;
        let bus = GLOBAL.get_or_init(|| {
            created = true;
            Bus::with_config(config)
        });
        if created {
            Ok(bus)
        } else {
            Err(BusError::AlreadyInitialized)
        }
    }

    /// The process-wide bus, created with default config on first access.
    pub fn global() -> &'static Bus {
        GLOBAL.get_or_init(Bus::new)
    }

    /// Give `T` a portable name. Its wire id becomes `djb2(name)`.
    ///
    /// Declaring the same name again is a no-op; any other name fails.
    pub fn declare<T: 'static>(&self, name: &'static str) -> Result<TypeKey> {
        self.declare_key::<T>(TypeKey::named::<T>(name))
    }

    /// Give `T` an explicit wire id.
    pub fn declare_id<T: 'static>(&self, id: u32, name: Option<&'static str>) -> Result<TypeKey> {
        self.declare_key::<T>(TypeKey::with_id::<T>(id, name))
    }

    fn declare_key<T: 'static>(&self, key: TypeKey) -> Result<TypeKey> {
        self.state.lock().assign(TypeId::of::<T>(), key)
    }

    /// Key of `T`, assigning an implicit one if the type was never declared.
    pub fn key<T: 'static>(&self) -> Result<TypeKey> {
        let mut state = self.state.lock();
        Self::key_locked::<T>(&mut state)
    }

    fn key_locked<T: 'static>(state: &mut BusState) -> Result<TypeKey> {
        match state.keys.get(&TypeId::of::<T>()) {
            Some(key) => Ok(*key),
            None => state.assign(TypeId::of::<T>(), TypeKey::implicit::<T>()),
        }
    }

    /// Key of `T` if one has been assigned.
    pub fn lookup<T: 'static>(&self) -> Option<TypeKey> {
        self.state.lock().keys.get(&TypeId::of::<T>()).copied()
    }

    /// The registry for `T`, created on first use.
    pub fn registry<T: 'static>(&self) -> Result<Arc<Registry<T>>> {
        let mut state = self.state.lock();
        let type_id = TypeId::of::<T>();

        if let Some(existing) = state.registries.get(&type_id) {
            if let Ok(registry) = Arc::clone(existing).downcast::<Registry<T>>() {
                return Ok(registry);
            }
        }

        let key = Self::key_locked::<T>(&mut state)?;
        let registry = Arc::new(Registry::<T>::new(key, self.config.subscriber_capacity));
        state
            .registries
            .insert(type_id, Arc::clone(&registry) as Arc<dyn Any + Send + Sync>);
        debug!(key = %key, capacity = self.config.subscriber_capacity, "registry created");
        Ok(registry)
    }

    /// A publisher for `T`.
    pub fn publisher<T: 'static>(&self) -> Result<Publisher<T>> {
        Ok(Publisher::new(self.registry::<T>()?))
    }

    /// Register a subscriber for `T`; it stays registered until the returned
    /// [`Subscription`] is dropped.
    pub fn subscribe<T, S>(&self, subscriber: S) -> Result<Subscription<T>>
    where
        T: 'static,
        S: Subscriber<T> + 'static,
    {
        self.subscribe_shared(Arc::new(subscriber))
    }

    /// Register an already shared subscriber.
    pub fn subscribe_shared<T: 'static>(
        &self,
        subscriber: Arc<dyn Subscriber<T>>,
    ) -> Result<Subscription<T>> {
        Subscription::new(self.registry::<T>()?, subscriber)
    }

    /// Register a closure receiving every value of `T`.
    pub fn subscribe_fn<T, F>(&self, receive: F) -> Result<Subscription<T>>
    where
        T: 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(FnSubscriber::new(receive))
    }

    /// Register a closure receiving values of `T` accepted by `filter`.
    pub fn subscribe_filtered<T, F, P>(&self, receive: F, filter: P) -> Result<Subscription<T>>
    where
        T: 'static,
        F: Fn(&T) + Send + Sync + 'static,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.subscribe(FnSubscriber::new(receive).with_filter(filter))
    }

    /// Publish `value` to the current subscribers of `T`.
    pub fn publish<T: 'static>(&self, value: &T) -> Result<usize> {
        Ok(self.registry::<T>()?.publish(value))
    }

    /// Keys of every type seen by this bus, sorted by id.
    pub fn keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<TypeKey> = self.state.lock().keys.values().copied().collect();
        keys.sort_unstable_by_key(TypeKey::id);
        keys
    }

    /// Bus configuration.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Bus")
            .field("config", &self.config)
            .field("types", &state.keys.len())
            .field("registries", &state.registries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI64, Ordering};

    use super::*;
    use crate::key::djb2;

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Temperature(f32);

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Pressure(f32);

    #[test]
    fn registry_is_shared_per_type() {
        let bus = Bus::new();
        let a = bus.registry::<u32>().unwrap();
        let b = bus.registry::<u32>().unwrap();
        let c = bus.registry::<i32>().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn types_route_independently() {
        let bus = Bus::new();
        let ints = Arc::new(AtomicI64::new(0));
        let floats = Arc::new(AtomicI64::new(0));

        let i = Arc::clone(&ints);
        let _int_sub = bus
            .subscribe_fn(move |v: &i32| {
                i.fetch_add(i64::from(*v), Ordering::SeqCst);
            })
            .unwrap();
        let f = Arc::clone(&floats);
        let _float_sub = bus
            .subscribe_fn(move |v: &f32| {
                f.fetch_add(*v as i64, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(bus.publish(&2i32).unwrap(), 1);
        assert_eq!(bus.publish(&10.0f32).unwrap(), 1);
        assert_eq!(bus.publish(&3i32).unwrap(), 1);

        assert_eq!(ints.load(Ordering::SeqCst), 5);
        assert_eq!(floats.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn declare_sets_portable_id() {
        let bus = Bus::new();
        let key = bus.declare::<Temperature>("Temperature").unwrap();
        assert_eq!(key.id(), djb2("Temperature"));
        assert_eq!(bus.registry::<Temperature>().unwrap().key(), key);
    }

    #[test]
    fn redeclaring_same_name_is_idempotent() {
        let bus = Bus::new();
        let first = bus.declare::<Temperature>("Temperature").unwrap();
        let second = bus.declare::<Temperature>("Temperature").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn conflicting_name_is_rejected() {
        let bus = Bus::new();
        bus.declare::<Temperature>("Temperature").unwrap();
        let err = bus.declare::<Temperature>("Temp").unwrap_err();
        assert!(matches!(err, BusError::KeyConflict { .. }));
        assert_eq!(
            bus.lookup::<Temperature>().unwrap().name(),
            Some("Temperature")
        );
    }

    #[test]
    fn declaring_after_implicit_use_is_rejected() {
        let bus = Bus::new();
        bus.registry::<Pressure>().unwrap();
        assert!(matches!(
            bus.declare::<Pressure>("Pressure"),
            Err(BusError::KeyConflict { .. })
        ));
    }

    #[test]
    fn colliding_ids_are_rejected() {
        let bus = Bus::new();
        bus.declare_id::<Temperature>(100, Some("Temperature"))
            .unwrap();
        let err = bus.declare_id::<Pressure>(100, Some("Pressure")).unwrap_err();
        assert!(matches!(err, BusError::IdCollision { id: 100, .. }));
    }

    #[test]
    fn capacity_comes_from_config() {
        let bus = Bus::with_config(BusConfig {
            subscriber_capacity: 1,
        });
        let _first = bus.subscribe_fn(|_: &u8| {}).unwrap();
        let err = bus.subscribe_fn(|_: &u8| {}).unwrap_err();
        assert!(matches!(err, BusError::CapacityExceeded { capacity: 1, .. }));
    }

    #[test]
    fn keys_are_listed_by_id() {
        let bus = Bus::new();
        bus.declare_id::<Temperature>(20, None).unwrap();
        bus.declare_id::<Pressure>(10, None).unwrap();
        let ids: Vec<u32> = bus.keys().iter().map(TypeKey::id).collect();
        assert_eq!(ids, vec![10, 20]);
    }

    #[test]
    fn global_bus_is_a_singleton() {
        let a = Bus::global();
        let b = Bus::global();
        assert!(std::ptr::eq(a, b));
        assert!(matches!(
            Bus::init_global(BusConfig::default()),
            Err(BusError::AlreadyInitialized)
        ));
    }

    #[test]
    fn filtered_subscription() {
        let bus = Bus::new();
        let total = Arc::new(AtomicI64::new(0));
        let t = Arc::clone(&total);
        let _sub = bus
            .subscribe_filtered(
                move |v: &i64| {
                    t.fetch_add(*v, Ordering::SeqCst);
                },
                |v: &i64| *v > 10,
            )
            .unwrap();

        bus.publish(&5i64).unwrap();
        bus.publish(&50i64).unwrap();
        assert_eq!(total.load(Ordering::SeqCst), 50);
    }
}
