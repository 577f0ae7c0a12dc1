pub mod arena;

use std::cmp::Ordering;

use crate::fields::FieldKind;

pub use arena::{Arena, BufHandle};

/// Typed payload of one extracted field value.
///
/// Kinds sharing a machine representation share a variant; the column's
/// [`FieldKind`] (kept in the view's kind vector) decides rendering and
/// aggregation eligibility. Variable-length kinds live in the arena and
/// are carried by handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueData {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Double(f64),
    /// 16-byte address payload (ipv6, wide ip-addr/ip-net).
    Addr16([u8; 16]),
    /// char-buf / byte-buf bytes in the arena.
    Buf(BufHandle),
}

/// One field value plus the number of source samples it aggregates.
/// `cnt == 0` marks a defaulted (missing) value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldValue {
    pub data: ValueData,
    pub cnt: u32,
}

impl FieldValue {
    pub fn new(data: ValueData, cnt: u32) -> Self {
        Self { data, cnt }
    }

    /// Byte length of the value, matching the per-kind length contract.
    pub fn len(&self) -> u32 {
        match self.data {
            ValueData::I8(_) | ValueData::U8(_) => 1,
            ValueData::I16(_) | ValueData::U16(_) => 2,
            ValueData::I32(_) | ValueData::U32(_) => 4,
            ValueData::I64(_) | ValueData::U64(_) | ValueData::Double(_) => 8,
            ValueData::Addr16(_) => 16,
            ValueData::Buf(h) => h.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length the table records for a raw extraction of `kind`, before any
    /// copy happens. `None` when the kind cannot be a column.
    pub fn raw_len(kind: FieldKind, bytes: &[u8]) -> Option<usize> {
        if let Some(w) = kind.fixed_width() {
            return Some(w);
        }
        match kind {
            FieldKind::CharBuf => Some(
                bytes
                    .iter()
                    .position(|b| *b == 0)
                    .map(|p| p + 1)
                    .unwrap_or(bytes.len() + 1),
            ),
            FieldKind::ByteBuf => Some(bytes.len()),
            FieldKind::IpAddr | FieldKind::IpNet => {
                if bytes.len() == 4 {
                    Some(4)
                } else {
                    Some(16)
                }
            }
            _ => None,
        }
    }

    /// Decodes a raw extracted value of `kind`, copying buffer bytes into
    /// the arena's active slab. Returns `None` when the raw bytes are too
    /// short for the kind or the kind cannot be a column.
    pub fn decode(kind: FieldKind, bytes: &[u8], arena: &mut Arena) -> Option<Self> {
        let data = match kind {
            FieldKind::Int8 => ValueData::I8(i8::from_le_bytes(take(bytes)?)),
            FieldKind::Int16 => ValueData::I16(i16::from_le_bytes(take(bytes)?)),
            FieldKind::Int32 => ValueData::I32(i32::from_le_bytes(take(bytes)?)),
            FieldKind::Int64 | FieldKind::Fd | FieldKind::Pid | FieldKind::Errno => {
                ValueData::I64(i64::from_le_bytes(take(bytes)?))
            }
            FieldKind::Uint8
            | FieldKind::Flags8
            | FieldKind::EnumFlags8
            | FieldKind::SigType
            | FieldKind::L4Proto
            | FieldKind::SockFamily => ValueData::U8(u8::from_le_bytes(take(bytes)?)),
            FieldKind::Uint16
            | FieldKind::Flags16
            | FieldKind::EnumFlags16
            | FieldKind::Port
            | FieldKind::SyscallId => ValueData::U16(u16::from_le_bytes(take(bytes)?)),
            FieldKind::Uint32
            | FieldKind::Flags32
            | FieldKind::EnumFlags32
            | FieldKind::Mode
            | FieldKind::Bool
            | FieldKind::Ipv4
            | FieldKind::Sigset
            | FieldKind::Uid
            | FieldKind::Gid => ValueData::U32(u32::from_le_bytes(take(bytes)?)),
            FieldKind::Uint64 | FieldKind::RelTime | FieldKind::AbsTime => {
                ValueData::U64(u64::from_le_bytes(take(bytes)?))
            }
            FieldKind::Double => ValueData::Double(f64::from_le_bytes(take(bytes)?)),
            FieldKind::Ipv6 => ValueData::Addr16(take(bytes)?),
            FieldKind::IpAddr | FieldKind::IpNet => {
                if bytes.len() == 4 {
                    ValueData::U32(u32::from_le_bytes(take(bytes)?))
                } else {
                    ValueData::Addr16(take(bytes)?)
                }
            }
            FieldKind::CharBuf => {
                let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
                let mut copy = Vec::with_capacity(end + 1);
                copy.extend_from_slice(&bytes[..end]);
                copy.push(0);
                ValueData::Buf(arena.copy(&copy))
            }
            FieldKind::ByteBuf => ValueData::Buf(arena.copy(bytes)),
            FieldKind::SockAddr
            | FieldKind::SockTuple
            | FieldKind::FdList
            | FieldKind::FsPath
            | FieldKind::FsRelPath => return None,
        };

        Some(Self { data, cnt: 1 })
    }

    /// Canonical bytes used for key identity (hashing and `memcmp`-style
    /// row lookup).
    pub fn key_bytes(&self, arena: &Arena) -> Vec<u8> {
        match self.data {
            ValueData::I8(v) => v.to_le_bytes().to_vec(),
            ValueData::I16(v) => v.to_le_bytes().to_vec(),
            ValueData::I32(v) => v.to_le_bytes().to_vec(),
            ValueData::I64(v) => v.to_le_bytes().to_vec(),
            ValueData::U8(v) => v.to_le_bytes().to_vec(),
            ValueData::U16(v) => v.to_le_bytes().to_vec(),
            ValueData::U32(v) => v.to_le_bytes().to_vec(),
            ValueData::U64(v) => v.to_le_bytes().to_vec(),
            ValueData::Double(v) => v.to_le_bytes().to_vec(),
            ValueData::Addr16(v) => v.to_vec(),
            ValueData::Buf(h) => arena.bytes(h).to_vec(),
        }
    }

    /// Numeric value as f64, divided by the repetition count when the value
    /// aggregates more than one sample. Non-numeric payloads yield 0.
    pub fn scaled_f64(&self) -> f64 {
        let raw = match self.data {
            ValueData::I8(v) => v as f64,
            ValueData::I16(v) => v as f64,
            ValueData::I32(v) => v as f64,
            ValueData::I64(v) => v as f64,
            ValueData::U8(v) => v as f64,
            ValueData::U16(v) => v as f64,
            ValueData::U32(v) => v as f64,
            ValueData::U64(v) => v as f64,
            ValueData::Double(v) => v,
            ValueData::Addr16(_) | ValueData::Buf(_) => 0.0,
        };
        if self.cnt > 1 {
            raw / self.cnt as f64
        } else {
            raw
        }
    }

    /// Raw comparison between two values of the same storage class.
    /// Buffers compare lexicographically over their arena bytes.
    pub fn compare(&self, other: &Self, arena: &Arena) -> Ordering {
        match (self.data, other.data) {
            (ValueData::I8(a), ValueData::I8(b)) => a.cmp(&b),
            (ValueData::I16(a), ValueData::I16(b)) => a.cmp(&b),
            (ValueData::I32(a), ValueData::I32(b)) => a.cmp(&b),
            (ValueData::I64(a), ValueData::I64(b)) => a.cmp(&b),
            (ValueData::U8(a), ValueData::U8(b)) => a.cmp(&b),
            (ValueData::U16(a), ValueData::U16(b)) => a.cmp(&b),
            (ValueData::U32(a), ValueData::U32(b)) => a.cmp(&b),
            (ValueData::U64(a), ValueData::U64(b)) => a.cmp(&b),
            (ValueData::Double(a), ValueData::Double(b)) => {
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
            (ValueData::Addr16(a), ValueData::Addr16(b)) => a.cmp(&b),
            (ValueData::Buf(a), ValueData::Buf(b)) => arena.bytes(a).cmp(arena.bytes(b)),
            // Mixed storage never happens for values of one column.
            _ => Ordering::Equal,
        }
    }
}

fn take<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    bytes.get(..N)?.try_into().ok()
}
