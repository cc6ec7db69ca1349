use std::any::Any;
use std::fmt::Display;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use sigprims_bus::Bus;
use sigprims_frame::{FrameReader, Wire};
use sigprims_transport::{ByteSource, IoSource};
use tracing::{info, warn};

use crate::cmd::{frame_config, ListenArgs};
use crate::exit::{bus_error, frame_error, CliError, CliResult, SUCCESS};
use crate::output::{OutputFormat, SignalPrinter};
use crate::signal::{SignalKind, SignalSpec};

/// A byte source that can tell when no more data will ever arrive.
trait SignalSource: ByteSource {
    fn exhausted(&self) -> bool;
}

impl<R: io::Read> SignalSource for IoSource<R> {
    fn exhausted(&self) -> bool {
        self.is_eof()
    }
}

#[cfg(unix)]
impl SignalSource for sigprims_transport::SignalStream {
    fn exhausted(&self) -> bool {
        self.is_eof()
    }
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let printer = Arc::new(SignalPrinter::new(format));

    match &args.path {
        Some(path) => listen_socket(path, &args, printer),
        None => {
            let source = IoSource::new(io::stdin());
            let running = Arc::new(AtomicBool::new(true));
            listen(source, &args, printer, &running)
        }
    }
}

#[cfg(unix)]
fn listen_socket(
    path: &std::path::Path,
    args: &ListenArgs,
    printer: Arc<SignalPrinter>,
) -> CliResult<i32> {
    use std::time::Duration;

    use sigprims_transport::UnixDomainSocket;

    use crate::exit::transport_error;

    let listener =
        UnixDomainSocket::bind(path).map_err(|err| transport_error("bind failed", err))?;
    info!(path = %path.display(), "listening for signals");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let stream = listener
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    stream
        .set_read_timeout(Some(Duration::from_millis(100)))
        .map_err(|err| transport_error("socket setup failed", err))?;
    listen(stream, args, printer, &running)
}

#[cfg(not(unix))]
fn listen_socket(
    _path: &std::path::Path,
    _args: &ListenArgs,
    _printer: Arc<SignalPrinter>,
) -> CliResult<i32> {
    Err(CliError::new(
        crate::exit::USAGE,
        "socket paths are only supported on unix platforms",
    ))
}

fn listen<S: SignalSource>(
    source: S,
    args: &ListenArgs,
    printer: Arc<SignalPrinter>,
    running: &AtomicBool,
) -> CliResult<i32> {
    let mut config = frame_config(args.bare);
    config.error_policy = args.policy.into();

    let mut reader = FrameReader::with_config(source, config);
    reader.set_error_hook(|err| warn!(error = %err, "frame rejected"));

    // One bus per signal: several signals may share a payload type.
    let mut guards: Vec<Box<dyn Any>> = Vec::with_capacity(args.signals.len());
    for spec in &args.signals {
        guards.push(attach(&mut reader, spec, &printer)?);
    }

    while running.load(Ordering::SeqCst) {
        let completed = reader
            .read()
            .map_err(|err| frame_error("receive failed", err))?;
        if let Some(count) = args.count {
            if printer.printed() >= count {
                break;
            }
        }
        if !completed && reader.get_ref().exhausted() {
            break;
        }
    }

    let stats = reader.stats();
    info!(
        printed = printer.printed(),
        frames = stats.frames_completed,
        skipped = stats.frames_skipped,
        resync_bytes = stats.resync_bytes,
        "listen finished"
    );
    drop(guards);
    Ok(SUCCESS)
}

fn attach<S: ByteSource>(
    reader: &mut FrameReader<S>,
    spec: &SignalSpec,
    printer: &Arc<SignalPrinter>,
) -> CliResult<Box<dyn Any>> {
    match spec.kind {
        SignalKind::Bool => attach_typed::<bool, S>(reader, spec, printer),
        SignalKind::U8 => attach_typed::<u8, S>(reader, spec, printer),
        SignalKind::I8 => attach_typed::<i8, S>(reader, spec, printer),
        SignalKind::U16 => attach_typed::<u16, S>(reader, spec, printer),
        SignalKind::I16 => attach_typed::<i16, S>(reader, spec, printer),
        SignalKind::U32 => attach_typed::<u32, S>(reader, spec, printer),
        SignalKind::I32 => attach_typed::<i32, S>(reader, spec, printer),
        SignalKind::U64 => attach_typed::<u64, S>(reader, spec, printer),
        SignalKind::I64 => attach_typed::<i64, S>(reader, spec, printer),
        SignalKind::F32 => attach_typed::<f32, S>(reader, spec, printer),
        SignalKind::F64 => attach_typed::<f64, S>(reader, spec, printer),
    }
}

fn attach_typed<T, S>(
    reader: &mut FrameReader<S>,
    spec: &SignalSpec,
    printer: &Arc<SignalPrinter>,
) -> CliResult<Box<dyn Any>>
where
    T: Wire + Serialize + Display + Send + Sync + 'static,
    S: ByteSource,
{
    let bus = Bus::new();
    bus.declare_id::<T>(spec.type_id, None)
        .map_err(|err| bus_error("declare failed", err))?;

    let printer = Arc::clone(printer);
    let label = spec.clone();
    let subscription = bus
        .subscribe_fn(move |value: &T| printer.print(&label, value))
        .map_err(|err| bus_error("subscribe failed", err))?;

    let publisher = bus
        .publisher::<T>()
        .map_err(|err| bus_error("publisher failed", err))?;
    reader
        .forward(publisher)
        .map_err(|err| frame_error("register failed", err))?;
    Ok(Box::new(subscription))
}

#[cfg(unix)]
fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
