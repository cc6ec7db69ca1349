//! Type-routed publish/subscribe.
//!
//! Every payload type `T` gets one [`Registry<T>`] per [`Bus`]. Producers hold
//! a [`Publisher<T>`]; consumers hold a [`Subscription<T>`] that stays
//! registered for as long as it lives. Publishing is synchronous: each call
//! fans out to the current subscribers in registration order before it
//! returns.
//!
//! ```
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//!
//! use sigprims_bus::Bus;
//!
//! let bus = Bus::new();
//! let total = Arc::new(AtomicU32::new(0));
//!
//! let sink = Arc::clone(&total);
//! let _sub = bus
//!     .subscribe_fn(move |value: &u32| {
//!         sink.fetch_add(*value, Ordering::SeqCst);
//!     })
//!     .unwrap();
//!
//! let publisher = bus.publisher::<u32>().unwrap();
//! publisher.publish(&3141);
//! assert_eq!(total.load(Ordering::SeqCst), 3141);
//! ```

pub mod bus;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod key;
pub mod registry;

pub use bus::Bus;
pub use config::{BusConfig, DEFAULT_SUBSCRIBER_CAPACITY};
pub use endpoint::{publish, Produces, Publisher, Subscription};
pub use error::{BusError, Result};
pub use key::{djb2, TypeKey};
pub use registry::{FnSubscriber, Registry, Subscriber, SubscriptionHandle};
