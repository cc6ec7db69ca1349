use bytes::BytesMut;
use tracing::debug;

use crate::codec::DEFAULT_BUFFER_CAPACITY;
use crate::error::{FrameError, Result};

/// Receives the contents of a receive buffer each time a frame for it completes.
pub trait BufferSink: Send {
    /// Called with the full payload of one completed frame.
    fn complete(&mut self, data: &[u8]);
}

impl<F> BufferSink for F
where
    F: FnMut(&[u8]) + Send,
{
    fn complete(&mut self, data: &[u8]) {
        self(data)
    }
}

/// One fixed-length receive buffer.
///
/// Payload bytes land in a staging area and are only copied into the
/// visible buffer once the whole frame, postfix included, has been accepted.
pub struct BufferEntry {
    type_id: u32,
    buffer: BytesMut,
    staging: BytesMut,
    sink: Box<dyn BufferSink>,
}

impl BufferEntry {
    /// Type id this buffer receives.
    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    /// Fixed payload length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// True for zero-length payloads.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Payload of the most recently completed frame; zeroes before the first.
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.staging
    }

    pub(crate) fn complete(&mut self) {
        self.buffer.copy_from_slice(&self.staging);
        self.sink.complete(&self.buffer);
    }
}

impl std::fmt::Debug for BufferEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferEntry")
            .field("type_id", &self.type_id)
            .field("len", &self.buffer.len())
            .finish_non_exhaustive()
    }
}

/// Receive buffers sorted by type id.
///
/// Entries can only be added until the registry is sealed, which a frame
/// reader does on its first poll.
#[derive(Debug)]
pub struct BufferRegistry {
    entries: Vec<BufferEntry>,
    capacity: usize,
    sealed: bool,
}

impl BufferRegistry {
    /// Registry with the default capacity of 64 entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_CAPACITY)
    }

    /// Registry holding at most `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
            sealed: false,
        }
    }

    /// Add a zeroed buffer of `len` bytes for `type_id`.
    pub fn insert<S>(&mut self, type_id: u32, len: usize, sink: S) -> Result<()>
    where
        S: BufferSink + 'static,
    {
        if self.sealed {
            return Err(FrameError::RegistrationClosed { type_id });
        }
        if self.entries.len() >= self.capacity {
            return Err(FrameError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let at = self.entries.partition_point(|entry| entry.type_id < type_id);
        if self
            .entries
            .get(at)
            .is_some_and(|entry| entry.type_id == type_id)
        {
            return Err(FrameError::DuplicateType { type_id });
        }

        self.entries.insert(
            at,
            BufferEntry {
                type_id,
                buffer: BytesMut::zeroed(len),
                staging: BytesMut::zeroed(len),
                sink: Box::new(sink),
            },
        );
        debug!(type_id, len, "receive buffer registered");
        Ok(())
    }

    /// Entry for `type_id`.
    pub fn find(&self, type_id: u32) -> Option<&BufferEntry> {
        self.find_index(type_id).map(|index| &self.entries[index])
    }

    /// Position of the entry for `type_id`.
    pub fn find_index(&self, type_id: u32) -> Option<usize> {
        self.entries
            .binary_search_by_key(&type_id, |entry| entry.type_id)
            .ok()
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> &mut BufferEntry {
        &mut self.entries[index]
    }

    /// Refuse further inserts.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Registered type ids in ascending order.
    pub fn type_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(BufferEntry::type_id)
    }
}

impl Default for BufferRegistry {
    fn default() -> Self {
        Self::new()
    }
}
