use std::io;
use std::time::Duration;

use sigprims_bus::djb2;
use sigprims_frame::FrameWriter;
use sigprims_transport::{ByteSink, IoSink};
use tracing::info;

use crate::cmd::{frame_config, SendArgs};
use crate::exit::{frame_error, CliError, CliResult, SUCCESS, USAGE};

pub fn run(args: SendArgs) -> CliResult<i32> {
    let interval = args.interval.as_deref().map(parse_duration).transpose()?;
    let name = args.name.as_deref().unwrap_or(args.kind.as_str());
    let type_id = args.id.unwrap_or_else(|| djb2(name));

    let payloads = args
        .values
        .iter()
        .map(|value| args.kind.encode(value).map_err(|msg| CliError::new(USAGE, msg)))
        .collect::<CliResult<Vec<_>>>()?;
    let plan = SendPlan {
        type_id,
        payloads: &payloads,
        repeat: args.repeat,
        interval,
    };
    let config = frame_config(args.bare);

    let frames = match &args.path {
        Some(path) => {
            let stream = connect(path)?;
            plan.send(FrameWriter::with_config(stream, config))?
        }
        None => plan.send(FrameWriter::with_config(IoSink::new(io::stdout()), config))?,
    };

    info!(type_id, kind = %args.kind, frames, "signals sent");
    Ok(SUCCESS)
}

#[cfg(unix)]
fn connect(path: &std::path::Path) -> CliResult<sigprims_transport::SignalStream> {
    sigprims_transport::UnixDomainSocket::connect(path)
        .map_err(|err| crate::exit::transport_error("connect failed", err))
}

#[cfg(not(unix))]
fn connect(_path: &std::path::Path) -> CliResult<IoSink<io::Sink>> {
    Err(CliError::new(
        USAGE,
        "socket paths are only supported on unix platforms",
    ))
}

struct SendPlan<'a> {
    type_id: u32,
    payloads: &'a [Vec<u8>],
    repeat: usize,
    interval: Option<Duration>,
}

impl SendPlan<'_> {
    fn send<W: ByteSink>(&self, mut writer: FrameWriter<W>) -> CliResult<u64> {
        for _ in 0..self.repeat {
            for payload in self.payloads {
                if let Some(pause) = self.interval {
                    if writer.frames_written() > 0 {
                        std::thread::sleep(pause);
                    }
                }
                writer
                    .send(self.type_id, payload)
                    .map_err(|err| frame_error("send failed", err))?;
            }
        }
        writer
            .flush()
            .map_err(|err| frame_error("flush failed", err))?;
        Ok(writer.frames_written())
    }
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
        assert_eq!(parse_duration("0ms").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("-1s").is_err());
    }

    #[test]
    fn plan_repeats_value_list() {
        let payloads = vec![vec![1u8], vec![2u8]];
        let plan = SendPlan {
            type_id: 5,
            payloads: &payloads,
            repeat: 3,
            interval: None,
        };
        let frames = plan.send(FrameWriter::new(Vec::new())).unwrap();
        assert_eq!(frames, 6);
    }
}
