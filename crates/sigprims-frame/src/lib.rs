//! Binary framing of typed signals over byte streams.
//!
//! Every frame carries:
//! - An optional 4-byte prefix (default "SUB0") for stream synchronization
//! - A little-endian header: 4-byte type id, 4-byte payload length
//! - The payload, in the type's fixed little-endian [`Wire`] layout
//! - An optional 1-byte postfix (default `'\n'`)
//!
//! [`FrameReader`] parses frames incrementally from a non-blocking source and
//! never needs a whole frame to be available at once.

pub mod buffers;
pub mod codec;
pub mod error;
pub mod forward;
pub mod reader;
pub mod wire;
pub mod writer;

pub use buffers::{BufferEntry, BufferRegistry, BufferSink};
pub use codec::{
    encode_frame, ErrorPolicy, FrameConfig, Header, DEFAULT_BUFFER_CAPACITY, HEADER_SIZE, MAGIC,
    POSTFIX,
};
pub use error::{FrameError, Result};
pub use forward::{forward_to_stream, ForwardPublisher, SharedWriter, StreamForwarder};
pub use reader::{FrameReader, Progress, ReaderStats, Stage};
pub use wire::Wire;
pub use writer::FrameWriter;
