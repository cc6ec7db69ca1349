use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use sigprims_bus::TypeKey;
use sigprims_transport::ByteSink;
use tracing::trace;

use crate::codec::{encode_frame, FrameConfig};
use crate::error::Result;
use crate::forward::SharedWriter;
use crate::wire::Wire;

const INITIAL_BUFFER_CAPACITY: usize = 256;

/// Writes complete frames to a [`ByteSink`].
pub struct FrameWriter<W> {
    sink: W,
    buf: BytesMut,
    payload: BytesMut,
    config: FrameConfig,
    frames_written: u64,
}

impl<W: ByteSink> FrameWriter<W> {
    /// Create a new frame writer with default configuration.
    pub fn new(sink: W) -> Self {
        Self::with_config(sink, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(sink: W, config: FrameConfig) -> Self {
        Self {
            sink,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            payload: BytesMut::new(),
            config,
            frames_written: 0,
        }
    }

    /// Encode `value` as one frame routed by `key`.
    pub fn write<T: Wire>(&mut self, key: &TypeKey, value: &T) -> Result<()> {
        self.payload.clear();
        self.payload.reserve(T::SIZE);
        value.encode(&mut self.payload);
        debug_assert_eq!(self.payload.len(), T::SIZE);

        self.buf.clear();
        encode_frame(&self.config, key.id(), &self.payload, &mut self.buf)?;
        trace!(key = %key, bytes = self.buf.len(), "writing frame");
        self.emit()
    }

    /// Send a raw payload under `type_id`.
    pub fn send(&mut self, type_id: u32, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        encode_frame(&self.config, type_id, payload, &mut self.buf)?;
        trace!(type_id, bytes = self.buf.len(), "writing frame");
        self.emit()
    }

    fn emit(&mut self) -> Result<()> {
        self.sink.write_bytes(&self.buf)?;
        self.sink.flush_bytes()?;
        self.frames_written += 1;
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.sink.flush_bytes().map_err(Into::into)
    }

    /// Number of frames written so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    /// Consume the writer and return the inner sink.
    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Wrap the writer for use by several [`StreamForwarder`]s.
    ///
    /// [`StreamForwarder`]: crate::forward::StreamForwarder
    pub fn into_shared(self) -> SharedWriter<W> {
        Arc::new(Mutex::new(self))
    }
}

impl<W> std::fmt::Debug for FrameWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameWriter")
            .field("config", &self.config)
            .field("frames_written", &self.frames_written)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, ErrorKind};

    use sigprims_transport::{IoSink, Loopback};

    use super::*;
    use crate::error::FrameError;

    #[test]
    fn write_typed_value() {
        let key = TypeKey::with_id::<i32>(100, None);
        let mut writer = FrameWriter::new(Vec::new());

        writer.write(&key, &7i32).unwrap();

        let out = writer.into_inner();
        assert_eq!(out.len(), 17);
        assert_eq!(&out[..4], b"SUB0");
        assert_eq!(&out[4..8], &100u32.to_le_bytes());
        assert_eq!(&out[8..12], &4u32.to_le_bytes());
        assert_eq!(&out[12..16], &7i32.to_le_bytes());
        assert_eq!(out[16], b'\n');
    }

    #[test]
    fn write_uses_declared_key() {
        let key = TypeKey::named::<f32>("Temperature");
        let mut writer = FrameWriter::with_config(Vec::new(), FrameConfig::bare());

        writer.write(&key, &21.5f32).unwrap();

        let out = writer.into_inner();
        assert_eq!(&out[..4], &key.id().to_le_bytes());
        assert_eq!(&out[8..], &21.5f32.to_le_bytes());
    }

    #[test]
    fn consecutive_frames_are_concatenated() {
        let key = TypeKey::with_id::<u8>(1, None);
        let mut writer = FrameWriter::new(Vec::new());

        writer.write(&key, &1u8).unwrap();
        writer.write(&key, &2u8).unwrap();
        writer.send(2, b"raw").unwrap();
        assert_eq!(writer.frames_written(), 3);

        let out = writer.into_inner();
        let first = writer_config_len(1);
        assert_eq!(out.len(), first * 2 + writer_config_len(3));
        assert_eq!(out[12], 1);
        assert_eq!(out[first + 12], 2);
    }

    fn writer_config_len(data_bytes: usize) -> usize {
        FrameConfig::default().frame_len(data_bytes)
    }

    #[test]
    fn writes_into_loopback() {
        let loopback = Loopback::new();
        let mut writer = FrameWriter::new(loopback.clone());
        writer.send(9, &[1, 2, 3]).unwrap();
        assert_eq!(loopback.pending(), FrameConfig::default().frame_len(3));
    }

    #[test]
    fn write_retries_interrupted_and_would_block() {
        let sink = FlakyWriter {
            failures: vec![ErrorKind::Interrupted, ErrorKind::WouldBlock],
            bytes: Vec::new(),
        };
        let mut writer = FrameWriter::new(IoSink::new(sink));

        writer.send(3, b"ok").unwrap();

        let out = writer.into_inner().into_inner();
        assert_eq!(out.bytes.len(), FrameConfig::default().frame_len(2));
    }

    #[test]
    fn write_zero_is_an_error() {
        let mut writer = FrameWriter::new(IoSink::new(ZeroWriter));
        let err = writer.send(1, b"x").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WriteZero));
    }

    struct FlakyWriter {
        failures: Vec<ErrorKind>,
        bytes: Vec<u8>,
    }

    impl io::Write for FlakyWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(kind) = self.failures.pop() {
                return Err(io::Error::from(kind));
            }
            let n = buf.len().min(3);
            self.bytes.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl io::Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}
