//! Type-routed signal pub/sub with resumable binary stream framing.
//!
//! Producers publish typed values, subscribers receive them synchronously,
//! and the same values can be carried across a byte stream as small
//! self-describing frames.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte source/sink capabilities, loopback and Unix sockets
//! - [`bus`]: per-type subscriber registries and publish fan-out
//! - [`frame`]: frame codec, incremental reader, bus/wire forwarders

/// Re-export transport types.
pub mod transport {
    pub use sigprims_transport::*;
}

/// Re-export bus types.
pub mod bus {
    pub use sigprims_bus::*;
}

/// Re-export frame types.
pub mod frame {
    pub use sigprims_frame::*;
}

pub use sigprims_bus::{publish, Bus, Produces, Publisher, Subscriber, Subscription, TypeKey};
pub use sigprims_frame::{FrameConfig, FrameReader, FrameWriter, Wire};
