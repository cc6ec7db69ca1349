use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Serialize;
use sigprims_bus::djb2;
use sigprims_frame::Wire;

/// Scalar payload types the CLI can encode and decode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::I8 => "i8",
            Self::U16 => "u16",
            Self::I16 => "i16",
            Self::U32 => "u32",
            Self::I32 => "i32",
            Self::U64 => "u64",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    /// Encoded payload length.
    pub fn size(self) -> usize {
        match self {
            Self::Bool => bool::SIZE,
            Self::U8 => u8::SIZE,
            Self::I8 => i8::SIZE,
            Self::U16 => u16::SIZE,
            Self::I16 => i16::SIZE,
            Self::U32 => u32::SIZE,
            Self::I32 => i32::SIZE,
            Self::U64 => u64::SIZE,
            Self::I64 => i64::SIZE,
            Self::F32 => f32::SIZE,
            Self::F64 => f64::SIZE,
        }
    }

    /// Parse `text` as this kind and return its wire encoding.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, String> {
        match self {
            Self::Bool => encode_as::<bool>(self, text),
            Self::U8 => encode_as::<u8>(self, text),
            Self::I8 => encode_as::<i8>(self, text),
            Self::U16 => encode_as::<u16>(self, text),
            Self::I16 => encode_as::<i16>(self, text),
            Self::U32 => encode_as::<u32>(self, text),
            Self::I32 => encode_as::<i32>(self, text),
            Self::U64 => encode_as::<u64>(self, text),
            Self::I64 => encode_as::<i64>(self, text),
            Self::F32 => encode_as::<f32>(self, text),
            Self::F64 => encode_as::<f64>(self, text),
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn encode_as<T>(kind: SignalKind, text: &str) -> Result<Vec<u8>, String>
where
    T: Wire + FromStr,
    T::Err: fmt::Display,
{
    let value: T = text
        .trim()
        .parse()
        .map_err(|err| format!("invalid {kind} value `{text}`: {err}"))?;
    let mut out = Vec::with_capacity(T::SIZE);
    value.encode(&mut out);
    Ok(out)
}

/// Parse a type id given as decimal or `0x`-prefixed hex.
pub fn parse_type_id(input: &str) -> Result<u32, String> {
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|err| format!("invalid type id `{input}`: {err}"))
}

/// A signal to listen for: `NAME:KIND` or `ID:KIND`.
///
/// Names are hashed to their type id; numeric targets are used as-is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignalSpec {
    pub label: String,
    pub type_id: u32,
    pub kind: SignalKind,
}

impl FromStr for SignalSpec {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (target, kind) = input
            .rsplit_once(':')
            .ok_or_else(|| format!("expected NAME:KIND or ID:KIND, got `{input}`"))?;
        if target.is_empty() {
            return Err(format!("missing signal name in `{input}`"));
        }
        let kind = <SignalKind as ValueEnum>::from_str(kind, true)?;
        let starts_numeric = target.as_bytes()[0].is_ascii_digit();
        let type_id = if starts_numeric {
            parse_type_id(target)?
        } else {
            djb2(target)
        };
        Ok(Self {
            label: target.to_string(),
            type_id,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_spec_hashes_name() {
        let spec: SignalSpec = "Temperature:f32".parse().unwrap();
        assert_eq!(spec.label, "Temperature");
        assert_eq!(spec.type_id, djb2("Temperature"));
        assert_eq!(spec.kind, SignalKind::F32);
    }

    #[test]
    fn numeric_spec_keeps_id() {
        let spec: SignalSpec = "100:i32".parse().unwrap();
        assert_eq!(spec.type_id, 100);
        let hex: SignalSpec = "0x64:I32".parse().unwrap();
        assert_eq!(hex.type_id, 100);
        assert_eq!(hex.kind, SignalKind::I32);
    }

    #[test]
    fn malformed_specs_are_rejected() {
        assert!("Temperature".parse::<SignalSpec>().is_err());
        assert!(":f32".parse::<SignalSpec>().is_err());
        assert!("Temperature:f16".parse::<SignalSpec>().is_err());
        assert!("12abc:u8".parse::<SignalSpec>().is_err());
    }

    #[test]
    fn encode_matches_wire_layout() {
        assert_eq!(SignalKind::I32.encode("7").unwrap(), 7i32.to_le_bytes());
        assert_eq!(SignalKind::F64.encode(" 1.5 ").unwrap(), 1.5f64.to_le_bytes());
        assert_eq!(SignalKind::Bool.encode("true").unwrap(), vec![1]);
        assert_eq!(SignalKind::U16.size(), 2);
    }

    #[test]
    fn encode_rejects_out_of_range() {
        let err = SignalKind::U8.encode("300").unwrap_err();
        assert!(err.contains("invalid u8 value `300`"));
    }
}
