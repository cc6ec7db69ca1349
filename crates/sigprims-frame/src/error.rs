/// Errors that can occur while framing or parsing signals.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// An I/O error occurred on the byte source or sink.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The buffer registry is full.
    #[error("buffer registry full ({capacity} entries)")]
    CapacityExceeded { capacity: usize },

    /// Buffers can only be registered before the reader starts.
    #[error("buffer registration closed once reading has started (type id {type_id:#010x})")]
    RegistrationClosed { type_id: u32 },

    /// A buffer for this type id already exists.
    #[error("type id {type_id:#010x} already has a receive buffer")]
    DuplicateType { type_id: u32 },

    /// A header named a type id with no receive buffer.
    #[error("no receive buffer for type id {type_id:#010x} ({data_bytes} bytes)")]
    UnknownType { type_id: u32, data_bytes: u32 },

    /// A header's payload length differs from the registered buffer length.
    #[error("type id {type_id:#010x} expects {expected} bytes, header says {actual}")]
    SizeMismatch {
        type_id: u32,
        expected: usize,
        actual: u32,
    },

    /// The stream does not start with the configured magic.
    #[error("invalid frame prefix {found:02x?}")]
    InvalidPrefix { found: [u8; 4] },

    /// The byte after the payload is not the configured delimiter.
    #[error("invalid frame postfix {found:#04x} (expected {expected:#04x})")]
    InvalidPostfix { found: u8, expected: u8 },

    /// The payload does not fit the 32-bit length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The reader stopped on an earlier error and must be reset.
    #[error("frame reader halted; call reset() to resume")]
    Halted,
}

pub type Result<T> = std::result::Result<T, FrameError>;
