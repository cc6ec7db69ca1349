use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use sigprims_frame::{ErrorPolicy, FrameConfig};

use crate::exit::CliResult;
use crate::output::OutputFormat;
use crate::signal::{parse_type_id, SignalKind, SignalSpec};

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encode signal values as frames.
    Send(SendArgs),
    /// Decode frames and print the signals they carry.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Socket path to connect to. Frames go to stdout when omitted.
    pub path: Option<PathBuf>,
    /// Payload type of every value.
    #[arg(long, short = 'k')]
    pub kind: SignalKind,
    /// Signal name; its hash is the type id. Defaults to the kind name.
    #[arg(long, conflicts_with = "id")]
    pub name: Option<String>,
    /// Explicit type id (decimal or 0x-prefixed hex).
    #[arg(long, value_parser = parse_type_id)]
    pub id: Option<u32>,
    /// Value to send; repeat for several frames.
    #[arg(long = "value", required = true, allow_negative_numbers = true)]
    pub values: Vec<String>,
    /// Send the whole value list this many times.
    #[arg(long, default_value = "1")]
    pub repeat: usize,
    /// Pause between frames (e.g. 1s, 250ms).
    #[arg(long)]
    pub interval: Option<String>,
    /// Omit the frame prefix and postfix.
    #[arg(long)]
    pub bare: bool,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Socket path to bind. Frames are read from stdin when omitted.
    pub path: Option<PathBuf>,
    /// Signal to decode, as NAME:KIND or ID:KIND; repeatable.
    #[arg(long = "signal", short = 's', required = true)]
    pub signals: Vec<SignalSpec>,
    /// Exit after printing N signals.
    #[arg(long)]
    pub count: Option<usize>,
    /// What to do with malformed or unknown frames.
    #[arg(long, value_enum, default_value = "skip")]
    pub policy: PolicyArg,
    /// Expect frames without prefix and postfix.
    #[arg(long)]
    pub bare: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PolicyArg {
    Skip,
    Halt,
}

impl From<PolicyArg> for ErrorPolicy {
    fn from(policy: PolicyArg) -> Self {
        match policy {
            PolicyArg::Skip => ErrorPolicy::Skip,
            PolicyArg::Halt => ErrorPolicy::Halt,
        }
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn frame_config(bare: bool) -> FrameConfig {
    if bare {
        FrameConfig::bare()
    } else {
        FrameConfig::default()
    }
}
