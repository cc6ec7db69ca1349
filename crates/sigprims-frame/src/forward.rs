//! Bridges between the bus and the wire.
//!
//! [`StreamForwarder`] subscribes to a payload type and writes every value it
//! receives as a frame. [`ForwardPublisher`] is the receiving half: a buffer
//! sink that decodes completed frames and republishes them on the bus.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use sigprims_bus::{Bus, Publisher, Subscriber, Subscription, TypeKey};
use sigprims_transport::ByteSink;
use tracing::{trace, warn};

use crate::buffers::BufferSink;
use crate::wire::Wire;
use crate::writer::FrameWriter;

/// A frame writer shared by several forwarders.
pub type SharedWriter<W> = Arc<Mutex<FrameWriter<W>>>;

/// Buffer sink that republishes each completed frame as a `T`.
pub struct ForwardPublisher<T> {
    publisher: Publisher<T>,
}

impl<T: Wire + 'static> ForwardPublisher<T> {
    pub fn new(publisher: Publisher<T>) -> Self {
        Self { publisher }
    }

    pub fn key(&self) -> TypeKey {
        self.publisher.key()
    }
}

impl<T: Wire + 'static> BufferSink for ForwardPublisher<T> {
    fn complete(&mut self, data: &[u8]) {
        if data.len() < T::SIZE {
            warn!(
                key = %self.publisher.key(),
                len = data.len(),
                expected = T::SIZE,
                "receive buffer shorter than payload type"
            );
            return;
        }
        let mut src = data;
        let value = T::decode(&mut src);
        trace!(key = %self.publisher.key(), "republishing received frame");
        self.publisher.publish(&value);
    }
}

/// Subscriber that writes every value it receives to a frame stream.
///
/// Write failures are logged and counted; they never reach the publisher.
pub struct StreamForwarder<T, W> {
    key: TypeKey,
    writer: SharedWriter<W>,
    failures: AtomicU64,
    _payload: PhantomData<fn(&T)>,
}

impl<T, W> StreamForwarder<T, W> {
    pub fn new(key: TypeKey, writer: SharedWriter<W>) -> Self {
        Self {
            key,
            writer,
            failures: AtomicU64::new(0),
            _payload: PhantomData,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Number of values that could not be written.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

impl<T, W> Subscriber<T> for StreamForwarder<T, W>
where
    T: Wire,
    W: ByteSink + Send,
{
    fn receive(&self, value: &T) {
        if let Err(err) = self.writer.lock().write(&self.key, value) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!(key = %self.key, error = %err, "failed to forward signal");
        }
    }
}

/// Subscribe a [`StreamForwarder`] for `T` on `bus`, writing through `writer`.
pub fn forward_to_stream<T, W>(
    bus: &Bus,
    writer: &SharedWriter<W>,
) -> sigprims_bus::Result<Subscription<T>>
where
    T: Wire + 'static,
    W: ByteSink + Send + 'static,
{
    let key = bus.key::<T>()?;
    bus.subscribe(StreamForwarder::<T, W>::new(key, Arc::clone(writer)))
}
