use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};

/// Header: type id (4) + payload length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Default stream magic: FourCC "SUB0".
pub const MAGIC: [u8; 4] = *b"SUB0";

/// Default frame delimiter.
pub const POSTFIX: u8 = b'\n';

/// Default number of receive buffers a reader can hold.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64;

/// Frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Routing id of the payload type.
    pub type_id: u32,
    /// Payload length in bytes.
    pub data_bytes: u32,
}

impl Header {
    /// Append the little-endian header to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.put_u32_le(self.type_id);
        dst.put_u32_le(self.data_bytes);
    }

    /// Parse a header.
    pub fn decode(src: &[u8; HEADER_SIZE]) -> Self {
        let [a, b, c, d, e, f, g, h] = *src;
        Self {
            type_id: u32::from_le_bytes([a, b, c, d]),
            data_bytes: u32::from_le_bytes([e, f, g, h]),
        }
    }
}

/// What a reader does when the stream breaks protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Report the error, drop the frame, and keep reading.
    #[default]
    Skip,
    /// Return the error and refuse further reads until reset.
    Halt,
}

/// Configuration shared by the frame reader and writer.
///
/// Both ends of a stream must agree on `prefix` and `postfix`.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Magic written before every header. Default: `b"SUB0"`.
    pub prefix: Option<[u8; 4]>,
    /// Delimiter written after every payload. Default: `b'\n'`.
    pub postfix: Option<u8>,
    /// Reader behavior on protocol errors. Default: [`ErrorPolicy::Skip`].
    pub error_policy: ErrorPolicy,
    /// Maximum number of receive buffers. Default: 64.
    pub buffer_capacity: usize,
    /// Cap on the bytes requested by a single source read.
    pub read_chunk_limit: Option<usize>,
}

impl FrameConfig {
    /// Header and payload only, with no prefix or postfix.
    pub fn bare() -> Self {
        Self {
            prefix: None,
            postfix: None,
            ..Self::default()
        }
    }

    /// Total encoded length of a frame carrying `data_bytes` of payload.
    pub fn frame_len(&self, data_bytes: usize) -> usize {
        self.prefix_len() + HEADER_SIZE + data_bytes + self.postfix_len()
    }

    pub(crate) fn prefix_len(&self) -> usize {
        self.prefix.map_or(0, |magic| magic.len())
    }

    pub(crate) fn postfix_len(&self) -> usize {
        usize::from(self.postfix.is_some())
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            prefix: Some(MAGIC),
            postfix: Some(POSTFIX),
            error_policy: ErrorPolicy::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            read_chunk_limit: None,
        }
    }
}

/// Encode one frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬────────────┬───────────────┬────────────┐
/// │ Prefix (4B)  │ Type id   │ Data bytes │ Payload       │ Postfix    │
/// │ "SUB0"       │ (4B LE)   │ (4B LE)    │ (Data bytes)  │ (1B) '\n'  │
/// │ optional     │           │            │               │ optional   │
/// └──────────────┴───────────┴────────────┴───────────────┴────────────┘
/// ```
pub fn encode_frame(
    config: &FrameConfig,
    type_id: u32,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    let data_bytes = u32::try_from(payload.len()).map_err(|_| FrameError::PayloadTooLarge {
        size: payload.len(),
        max: u32::MAX as usize,
    })?;

    dst.reserve(config.frame_len(payload.len()));
    if let Some(magic) = config.prefix {
        dst.put_slice(&magic);
    }
    Header {
        type_id,
        data_bytes,
    }
    .encode(dst);
    dst.put_slice(payload);
    if let Some(postfix) = config.postfix {
        dst.put_u8(postfix);
    }
    Ok(())
}
