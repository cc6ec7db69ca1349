use sigprims_bus::Publisher;
use sigprims_transport::ByteSource;
use tracing::{debug, trace, warn};

use crate::buffers::{BufferRegistry, BufferSink};
use crate::codec::{ErrorPolicy, FrameConfig, Header, HEADER_SIZE};
use crate::error::{FrameError, Result};
use crate::forward::ForwardPublisher;
use crate::wire::Wire;

const DISCARD_CHUNK: usize = 256;

/// Parser stage. The reader walks `Prefix → Header → Data → Postfix` and
/// returns to its initial stage after every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prefix,
    Header,
    Data,
    /// Dropping the payload and postfix of a rejected frame.
    Discard,
    Postfix,
    /// Stopped on an error under [`ErrorPolicy::Halt`].
    Halted,
}

/// Outcome of one [`FrameReader::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// A frame completed and its sink was notified.
    Complete,
    /// A stage finished, or was filled as far as requested; poll again.
    Advanced,
    /// The source returned fewer bytes than the stage asked for.
    Pending,
}

/// Counters kept by a [`FrameReader`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub frames_completed: u64,
    pub frames_skipped: u64,
    pub bytes_read: u64,
    /// Bytes dropped while searching for the next prefix.
    pub resync_bytes: u64,
}

type ErrorHook = Box<dyn FnMut(&FrameError) + Send>;

/// Incremental frame parser over a non-blocking [`ByteSource`].
///
/// Each poll reads at most once, and only the bytes the current stage still
/// needs, so a frame can arrive in any number of pieces. Completed payloads
/// are handed to the [`BufferSink`] registered for their type id.
pub struct FrameReader<S> {
    source: S,
    config: FrameConfig,
    buffers: BufferRegistry,
    stage: Stage,
    filled: usize,
    scratch: [u8; HEADER_SIZE],
    entry: usize,
    /// Bytes left to drop. Holds a full `u32` length plus the postfix.
    discard: u64,
    resyncing: bool,
    hook: Option<ErrorHook>,
    stats: ReaderStats,
}

impl<S: ByteSource> FrameReader<S> {
    /// Create a new frame reader with default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(source: S, config: FrameConfig) -> Self {
        let buffers = BufferRegistry::with_capacity(config.buffer_capacity);
        Self::with_buffers(source, config, buffers)
    }

    /// Create a reader around an already populated buffer registry.
    pub fn with_buffers(source: S, config: FrameConfig, buffers: BufferRegistry) -> Self {
        let stage = initial_stage(&config);
        Self {
            source,
            config,
            buffers,
            stage,
            filled: 0,
            scratch: [0; HEADER_SIZE],
            entry: 0,
            discard: 0,
            resyncing: false,
            hook: None,
            stats: ReaderStats::default(),
        }
    }

    /// Add a receive buffer. Only allowed before the first poll.
    pub fn register<K>(&mut self, type_id: u32, len: usize, sink: K) -> Result<()>
    where
        K: BufferSink + 'static,
    {
        self.buffers.insert(type_id, len, sink)
    }

    /// Decode frames of `T` and republish them through `publisher`.
    pub fn forward<T: Wire + 'static>(&mut self, publisher: Publisher<T>) -> Result<()> {
        let type_id = publisher.key().id();
        self.register(type_id, T::SIZE, ForwardPublisher::new(publisher))
    }

    /// Observe every protocol error, whatever the policy.
    pub fn set_error_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&FrameError) + Send + 'static,
    {
        self.hook = Some(Box::new(hook));
    }

    /// Read until a frame completes (`true`) or the source runs dry (`false`).
    pub fn read(&mut self) -> Result<bool> {
        loop {
            match self.poll()? {
                Progress::Complete => return Ok(true),
                Progress::Advanced => continue,
                Progress::Pending => return Ok(false),
            }
        }
    }

    /// Read every frame currently available, returning how many completed.
    pub fn drain(&mut self) -> Result<usize> {
        let mut frames = 0;
        while self.read()? {
            frames += 1;
        }
        Ok(frames)
    }

    /// Advance the state machine by at most one source read.
    pub fn poll(&mut self) -> Result<Progress> {
        self.buffers.seal();
        match self.stage {
            Stage::Prefix => self.poll_prefix(),
            Stage::Header => self.poll_header(),
            Stage::Data => self.poll_data(),
            Stage::Discard => self.poll_discard(),
            Stage::Postfix => self.poll_postfix(),
            Stage::Halted => Err(FrameError::Halted),
        }
    }

    /// Drop any partial frame and start again at the initial stage.
    ///
    /// Clears a halt. Receive buffers stay registered.
    pub fn reset(&mut self) {
        debug!(stage = ?self.stage, "frame reader reset");
        self.resyncing = false;
        self.discard = 0;
        self.enter(initial_stage(&self.config));
    }

    fn poll_prefix(&mut self) -> Result<Progress> {
        let Some(magic) = self.config.prefix else {
            self.enter(Stage::Header);
            return Ok(Progress::Advanced);
        };

        let want = self.request(magic.len() - self.filled);
        let n = self.fill_scratch(want)?;
        if self.filled < magic.len() {
            return Ok(settle(n, want));
        }

        if self.scratch[..magic.len()] == magic {
            if self.resyncing {
                self.resyncing = false;
                debug!(dropped = self.stats.resync_bytes, "resynchronized on frame prefix");
            }
            self.enter(Stage::Header);
            return Ok(Progress::Advanced);
        }

        if !self.resyncing {
            let mut found = [0u8; 4];
            found.copy_from_slice(&self.scratch[..4]);
            self.fault(FrameError::InvalidPrefix { found })?;
            self.resyncing = true;
        }
        self.scratch.copy_within(1..magic.len(), 0);
        self.filled = magic.len() - 1;
        self.stats.resync_bytes += 1;
        Ok(Progress::Advanced)
    }

    fn poll_header(&mut self) -> Result<Progress> {
        let want = self.request(HEADER_SIZE - self.filled);
        let n = self.fill_scratch(want)?;
        if self.filled < HEADER_SIZE {
            return Ok(settle(n, want));
        }

        let header = Header::decode(&self.scratch);
        let Some(index) = self.buffers.find_index(header.type_id) else {
            return self.reject(
                header,
                FrameError::UnknownType {
                    type_id: header.type_id,
                    data_bytes: header.data_bytes,
                },
            );
        };

        let expected = self.buffers.entry_mut(index).len();
        if expected != header.data_bytes as usize {
            return self.reject(
                header,
                FrameError::SizeMismatch {
                    type_id: header.type_id,
                    expected,
                    actual: header.data_bytes,
                },
            );
        }

        self.entry = index;
        self.enter(Stage::Data);
        Ok(Progress::Advanced)
    }

    fn poll_data(&mut self) -> Result<Progress> {
        let len = self.buffers.entry_mut(self.entry).len();
        if self.filled < len {
            let start = self.filled;
            let want = self.request(len - start);
            let dst = &mut self.buffers.entry_mut(self.entry).data_mut()[start..start + want];
            let n = self.source.read_some(dst)?;
            self.filled += n;
            self.stats.bytes_read += n as u64;
            if self.filled < len {
                return Ok(settle(n, want));
            }
        }

        if self.config.postfix.is_some() {
            self.enter(Stage::Postfix);
            Ok(Progress::Advanced)
        } else {
            Ok(self.complete())
        }
    }

    fn poll_postfix(&mut self) -> Result<Progress> {
        let Some(expected) = self.config.postfix else {
            return Ok(self.complete());
        };

        let n = self.fill_scratch(1)?;
        if n == 0 {
            return Ok(Progress::Pending);
        }

        let found = self.scratch[0];
        if found == expected {
            return Ok(self.complete());
        }

        self.fault(FrameError::InvalidPostfix { found, expected })?;
        self.stats.frames_skipped += 1;
        self.enter(initial_stage(&self.config));
        Ok(Progress::Advanced)
    }

    fn poll_discard(&mut self) -> Result<Progress> {
        if self.discard > 0 {
            let mut sink = [0u8; DISCARD_CHUNK];
            let want = self.request(self.discard.min(DISCARD_CHUNK as u64) as usize);
            let n = self.source.read_some(&mut sink[..want])?;
            self.discard -= n as u64;
            self.stats.bytes_read += n as u64;
            if self.discard > 0 {
                return Ok(settle(n, want));
            }
        }

        self.enter(initial_stage(&self.config));
        Ok(Progress::Advanced)
    }

    fn complete(&mut self) -> Progress {
        let entry = self.buffers.entry_mut(self.entry);
        trace!(type_id = entry.type_id(), bytes = entry.len(), "frame complete");
        entry.complete();
        self.stats.frames_completed += 1;
        self.enter(initial_stage(&self.config));
        Progress::Complete
    }

    /// Skip a frame whose header was refused, or halt.
    fn reject(&mut self, header: Header, err: FrameError) -> Result<Progress> {
        self.fault(err)?;
        self.stats.frames_skipped += 1;
        self.discard = u64::from(header.data_bytes) + u64::from(self.config.postfix.is_some());
        self.enter(Stage::Discard);
        Ok(Progress::Advanced)
    }

    fn fault(&mut self, err: FrameError) -> Result<()> {
        if let Some(hook) = self.hook.as_mut() {
            hook(&err);
        }
        match self.config.error_policy {
            ErrorPolicy::Skip => {
                warn!(error = %err, "skipping malformed frame");
                Ok(())
            }
            ErrorPolicy::Halt => {
                warn!(error = %err, "frame reader halted");
                self.stage = Stage::Halted;
                Err(err)
            }
        }
    }

    fn fill_scratch(&mut self, want: usize) -> Result<usize> {
        let start = self.filled;
        let n = self
            .source
            .read_some(&mut self.scratch[start..start + want])?;
        self.filled += n;
        self.stats.bytes_read += n as u64;
        Ok(n)
    }

    fn request(&self, remaining: usize) -> usize {
        match self.config.read_chunk_limit {
            Some(limit) => remaining.min(limit.max(1)),
            None => remaining,
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.filled = 0;
    }

    /// Current parser stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// True once halted by an error.
    pub fn is_halted(&self) -> bool {
        self.stage == Stage::Halted
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Registered receive buffers.
    pub fn buffers(&self) -> &BufferRegistry {
        &self.buffers
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &S {
        &self.source
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> S {
        self.source
    }
}

impl<S> std::fmt::Debug for FrameReader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameReader")
            .field("stage", &self.stage)
            .field("filled", &self.filled)
            .field("buffers", &self.buffers.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn initial_stage(config: &FrameConfig) -> Stage {
    if config.prefix.is_some() {
        Stage::Prefix
    } else {
        Stage::Header
    }
}

fn settle(read: usize, requested: usize) -> Progress {
    if read < requested {
        Progress::Pending
    } else {
        Progress::Advanced
    }
}
