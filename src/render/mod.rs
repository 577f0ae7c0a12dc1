//! Value rendering for presenters, free-text filtering and row search.
//!
//! Collapses the external printer's `set_val`/`tostring`/`tojson` surface
//! into pure functions over the typed value model.

use std::net::Ipv6Addr;

use serde_json::Value as JsonValue;

use crate::fields::{FieldKind, PrintFormat};
use crate::value::{Arena, FieldValue, ValueData};

/// Internal numeric view of a value, after averaging by its count.
enum Num {
    Int(i128),
    Float(f64),
}

impl Num {
    fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }
}

/// Numeric payload of `v`, divided by `cnt` when the value aggregates
/// multiple samples. Integer kinds divide with truncation.
fn numeric(v: &FieldValue) -> Option<Num> {
    let raw = match v.data {
        ValueData::I8(x) => Num::Int(x as i128),
        ValueData::I16(x) => Num::Int(x as i128),
        ValueData::I32(x) => Num::Int(x as i128),
        ValueData::I64(x) => Num::Int(x as i128),
        ValueData::U8(x) => Num::Int(x as i128),
        ValueData::U16(x) => Num::Int(x as i128),
        ValueData::U32(x) => Num::Int(x as i128),
        ValueData::U64(x) => Num::Int(x as i128),
        ValueData::Double(x) => Num::Float(x),
        ValueData::Addr16(_) | ValueData::Buf(_) => return None,
    };

    if v.cnt > 1 {
        Some(match raw {
            Num::Int(x) => Num::Int(x / v.cnt as i128),
            Num::Float(x) => Num::Float(x / v.cnt as f64),
        })
    } else {
        Some(raw)
    }
}

fn format_int(v: i128, pf: PrintFormat) -> String {
    match pf {
        PrintFormat::Dec | PrintFormat::Id => v.to_string(),
        PrintFormat::Hex => format!("{v:x}"),
        PrintFormat::Oct => format!("{v:o}"),
    }
}

fn charbuf_str(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn l4proto_str(v: i128) -> String {
    match v {
        1 => "icmp".to_string(),
        6 => "tcp".to_string(),
        17 => "udp".to_string(),
        132 => "sctp".to_string(),
        other => other.to_string(),
    }
}

fn sockfamily_str(v: i128) -> String {
    match v {
        1 => "unix".to_string(),
        2 => "ipv4".to_string(),
        10 => "ipv6".to_string(),
        other => other.to_string(),
    }
}

fn ipv4_str(v: u32) -> String {
    let b = v.to_le_bytes();
    format!("{}.{}.{}.{}", b[0], b[1], b[2], b[3])
}

/// Renders a value to its display string.
///
/// A non-zero `time_delta` (set only for time-average columns) renders the
/// value as a percentage of the sample interval with two decimals.
pub fn render_str(
    kind: FieldKind,
    pf: PrintFormat,
    value: &FieldValue,
    arena: &Arena,
    time_delta: u64,
) -> String {
    if time_delta != 0 {
        if let Some(n) = numeric(value) {
            return format!("{:.2}", n.as_f64() * 100.0 / time_delta as f64);
        }
    }

    match kind {
        FieldKind::Bool => {
            let truthy = matches!(value.data, ValueData::U32(x) if x != 0);
            let s = if truthy { "true" } else { "false" };
            s.to_string()
        }
        FieldKind::Ipv4 => match value.data {
            ValueData::U32(x) => ipv4_str(x),
            _ => String::new(),
        },
        FieldKind::Ipv6 => match value.data {
            ValueData::Addr16(b) => Ipv6Addr::from(b).to_string(),
            _ => String::new(),
        },
        FieldKind::IpAddr | FieldKind::IpNet => match value.data {
            ValueData::U32(x) => ipv4_str(x),
            ValueData::Addr16(b) => Ipv6Addr::from(b).to_string(),
            _ => String::new(),
        },
        FieldKind::CharBuf => match value.data {
            ValueData::Buf(h) => charbuf_str(arena.bytes(h)),
            _ => String::new(),
        },
        FieldKind::ByteBuf => match value.data {
            ValueData::Buf(h) => String::from_utf8_lossy(arena.bytes(h)).into_owned(),
            _ => String::new(),
        },
        FieldKind::L4Proto => numeric(value)
            .map(|n| match n {
                Num::Int(v) => l4proto_str(v),
                Num::Float(v) => l4proto_str(v as i128),
            })
            .unwrap_or_default(),
        FieldKind::SockFamily => numeric(value)
            .map(|n| match n {
                Num::Int(v) => sockfamily_str(v),
                Num::Float(v) => sockfamily_str(v as i128),
            })
            .unwrap_or_default(),
        FieldKind::Double => numeric(value)
            .map(|n| format!("{}", n.as_f64()))
            .unwrap_or_default(),
        _ => numeric(value)
            .map(|n| match n {
                Num::Int(v) => format_int(v, pf),
                Num::Float(v) => format!("{v}"),
            })
            .unwrap_or_default(),
    }
}

/// Renders a value for the JSON presenter: numbers stay numbers, text and
/// address kinds become strings, bool becomes a JSON bool.
pub fn render_json(
    kind: FieldKind,
    pf: PrintFormat,
    value: &FieldValue,
    arena: &Arena,
    time_delta: u64,
) -> JsonValue {
    if time_delta != 0 {
        if let Some(n) = numeric(value) {
            let pct = n.as_f64() * 100.0 / time_delta as f64;
            return serde_json::Number::from_f64(pct)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null);
        }
    }

    match kind {
        FieldKind::Bool => {
            JsonValue::Bool(matches!(value.data, ValueData::U32(x) if x != 0))
        }
        FieldKind::Double => match numeric(value) {
            Some(n) => serde_json::Number::from_f64(n.as_f64())
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            None => JsonValue::Null,
        },
        FieldKind::CharBuf
        | FieldKind::ByteBuf
        | FieldKind::Ipv4
        | FieldKind::Ipv6
        | FieldKind::IpAddr
        | FieldKind::IpNet
        | FieldKind::L4Proto
        | FieldKind::SockFamily => {
            JsonValue::String(render_str(kind, pf, value, arena, 0))
        }
        _ => match numeric(value) {
            Some(Num::Int(v)) => {
                if pf == PrintFormat::Hex || pf == PrintFormat::Oct {
                    JsonValue::String(format_int(v, pf))
                } else if v < 0 {
                    JsonValue::Number((v as i64).into())
                } else {
                    JsonValue::Number((v as u64).into())
                }
            }
            Some(Num::Float(v)) => serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            None => JsonValue::Null,
        },
    }
}
