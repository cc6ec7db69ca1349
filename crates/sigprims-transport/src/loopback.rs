use std::io;
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use parking_lot::Mutex;

use crate::traits::{ByteSink, ByteSource};

/// In-memory byte pipe.
///
/// Clones share one queue: bytes written through any handle are read back,
/// in order, through any other. Reads never block; an empty queue reads as 0.
/// An optional chunk limit caps how many bytes a single read may return,
/// which is handy for exercising partial-read handling.
#[derive(Debug, Clone, Default)]
pub struct Loopback {
    queue: Arc<Mutex<BytesMut>>,
    chunk_limit: Option<usize>,
}

impl Loopback {
    /// Create an empty loopback with no read chunk limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loopback handle whose reads return at most `limit` bytes.
    pub fn with_chunk_limit(limit: usize) -> Self {
        Self {
            queue: Arc::default(),
            chunk_limit: Some(limit.max(1)),
        }
    }

    /// A handle onto the same queue with a different read chunk limit.
    pub fn reader_with_chunk_limit(&self, limit: usize) -> Self {
        Self {
            queue: Arc::clone(&self.queue),
            chunk_limit: Some(limit.max(1)),
        }
    }

    /// Number of bytes waiting to be read.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// True when nothing is waiting to be read.
    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }
}

impl ByteSource for Loopback {
    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut queue = self.queue.lock();
        let mut n = buf.len().min(queue.len());
        if let Some(limit) = self.chunk_limit {
            n = n.min(limit);
        }
        buf[..n].copy_from_slice(&queue[..n]);
        queue.advance(n);
        Ok(n)
    }
}

impl ByteSink for Loopback {
    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        self.queue.lock().extend_from_slice(buf);
        Ok(())
    }
}
