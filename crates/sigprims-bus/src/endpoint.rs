use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::key::TypeKey;
use crate::registry::{Registry, Subscriber, SubscriptionHandle};

/// Sending side of a payload type.
pub struct Publisher<T> {
    registry: Arc<Registry<T>>,
}

impl<T: 'static> Publisher<T> {
    /// Bind a publisher to a registry.
    pub fn new(registry: Arc<Registry<T>>) -> Self {
        Self { registry }
    }

    /// Deliver `value` to every current subscriber.
    pub fn publish(&self, value: &T) {
        self.registry.publish(value);
    }

    /// Routing key of the payload type.
    pub fn key(&self) -> TypeKey {
        self.registry.key()
    }

    /// Number of subscribers that would see a publish right now.
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    /// The registry this publisher feeds.
    pub fn registry(&self) -> &Arc<Registry<T>> {
        &self.registry
    }
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("registry", &self.registry)
            .finish()
    }
}

/// Registered subscriber. Unregisters itself on drop.
pub struct Subscription<T: 'static> {
    registry: Arc<Registry<T>>,
    handle: Option<SubscriptionHandle>,
}

impl<T: 'static> Subscription<T> {
    /// Register `subscriber` with `registry`.
    pub fn new(registry: Arc<Registry<T>>, subscriber: Arc<dyn Subscriber<T>>) -> Result<Self> {
        let handle = registry.register(subscriber)?;
        Ok(Self {
            registry,
            handle: Some(handle),
        })
    }

    /// Slot handle of this subscription.
    pub fn handle(&self) -> Option<SubscriptionHandle> {
        self.handle
    }

    /// Routing key of the payload type.
    pub fn key(&self) -> TypeKey {
        self.registry.key()
    }

    /// True while still registered.
    pub fn is_active(&self) -> bool {
        self.handle.is_some_and(|handle| self.registry.contains(handle))
    }

    /// Unregister now instead of on drop.
    pub fn cancel(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => self.registry.unregister(handle),
            None => Ok(()),
        }
    }
}

impl<T: 'static> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = self.registry.unregister(handle) {
                debug!(key = %self.registry.key(), error = %err, "subscription already gone");
            }
        }
    }
}

impl<T: 'static> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.registry.key())
            .field("handle", &self.handle)
            .finish()
    }
}

/// Implemented once per payload type a producer emits.
///
/// A producer of several types holds one [`Publisher`] per type and
/// implements `Produces<T>` for each; [`publish`] then picks the right one
/// from the value's type.
pub trait Produces<T> {
    /// The publisher for `T`.
    fn publisher(&self) -> &Publisher<T>;
}

/// Publish `value` through the `Publisher<T>` of a multi-type producer.
pub fn publish<T, P>(producer: &P, value: &T)
where
    T: 'static,
    P: Produces<T> + ?Sized,
{
    producer.publisher().publish(value);
}
