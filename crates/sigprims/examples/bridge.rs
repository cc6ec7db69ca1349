//! Two buses joined by an in-memory wire.
//!
//! Run with:
//!   cargo run --example bridge

use sigprims::bus::Bus;
use sigprims::frame::{forward_to_stream, FrameReader, FrameWriter, SharedWriter};
use sigprims::transport::Loopback;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let local = Bus::new();
    let remote = Bus::new();
    local.declare::<f32>("Temperature")?;
    remote.declare::<f32>("Temperature")?;

    let wire = Loopback::with_chunk_limit(3);
    let writer: SharedWriter<Loopback> = FrameWriter::new(wire.clone()).into_shared();
    let _forward = forward_to_stream::<f32, _>(&local, &writer)?;

    let _print = remote.subscribe_fn(|celsius: &f32| {
        eprintln!("remote received {celsius:.1} C");
    })?;

    let mut reader = FrameReader::new(wire);
    reader.forward(remote.publisher::<f32>()?)?;

    for reading in [19.5f32, 20.0, 20.25] {
        local.publish(&reading)?;
    }

    // The wire hands out three bytes per read, so each frame takes several polls.
    let mut frames = 0;
    while frames < 3 {
        if reader.read()? {
            frames += 1;
        }
    }
    eprintln!("{:?}", reader.stats());
    Ok(())
}
