use std::fmt::Display;
use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use sigprims_frame::Wire;

use crate::signal::{SignalKind, SignalSpec};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct SignalOutput<'a, T> {
    signal: &'a str,
    type_id: u32,
    kind: SignalKind,
    value: &'a T,
    timestamp: String,
}

/// Prints received signals and counts them.
#[derive(Debug)]
pub struct SignalPrinter {
    format: OutputFormat,
    printed: AtomicUsize,
}

impl SignalPrinter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            printed: AtomicUsize::new(0),
        }
    }

    pub fn printed(&self) -> usize {
        self.printed.load(Ordering::SeqCst)
    }

    pub fn print<T>(&self, spec: &SignalSpec, value: &T)
    where
        T: Wire + Serialize + Display,
    {
        match self.format {
            OutputFormat::Json => {
                let out = SignalOutput {
                    signal: &spec.label,
                    type_id: spec.type_id,
                    kind: spec.kind,
                    value,
                    timestamp: now_unix_seconds(),
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Table => {
                let mut table = Table::new();
                table
                    .load_preset(UTF8_FULL)
                    .set_content_arrangement(ContentArrangement::Dynamic)
                    .set_header(vec!["SIGNAL", "TYPE ID", "KIND", "SIZE", "VALUE"])
                    .add_row(vec![
                        spec.label.clone(),
                        format!("{:#010x}", spec.type_id),
                        spec.kind.to_string(),
                        spec.kind.size().to_string(),
                        value.to_string(),
                    ]);
                println!("{table}");
            }
            OutputFormat::Pretty => {
                println!(
                    "{}#{:08x} {} = {}",
                    spec.label, spec.type_id, spec.kind, value
                );
            }
            OutputFormat::Raw => {
                let mut bytes = Vec::with_capacity(T::SIZE);
                value.encode(&mut bytes);
                print_raw(&bytes);
            }
        }
        self.printed.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
