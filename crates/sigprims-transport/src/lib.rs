//! Byte stream capabilities for the sigprims wire path.
//!
//! The frame layer only needs two things from its environment:
//! - "read up to N bytes, return the actual count, 0 permitted" ([`ByteSource`])
//! - "write exactly N bytes" ([`ByteSink`])
//!
//! This crate defines those capabilities and ships a few implementations:
//! adapters over `std::io`, an in-memory [`Loopback`], and Unix domain sockets.

pub mod error;
pub mod loopback;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use loopback::Loopback;
pub use traits::{ByteSink, ByteSource, IoSink, IoSource};

#[cfg(unix)]
pub use uds::{SignalStream, UnixDomainSocket};
