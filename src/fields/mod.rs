pub mod registry;

use anyhow::Result;

use crate::event::EventLike;

/// Primitive kind of an extracted field value.
/// The set is closed; widths and aggregation behavior key off it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Bool,
    Double,
    /// Relative time in nanoseconds.
    RelTime,
    /// Absolute time in nanoseconds since the epoch.
    AbsTime,
    /// NUL-terminated string stored in the arena.
    CharBuf,
    /// Length-prefixed byte string stored in the arena.
    ByteBuf,
    Port,
    Ipv4,
    Ipv6,
    /// 4 or 16 bytes, dispatched by the extracted length.
    IpAddr,
    IpNet,
    SyscallId,
    Uid,
    Gid,
    L4Proto,
    SockFamily,
    Flags8,
    Flags16,
    Flags32,
    EnumFlags8,
    EnumFlags16,
    EnumFlags32,
    Fd,
    Pid,
    Errno,
    Mode,
    Sigset,
    SigType,
    // Variable-length kinds below are never valid as table columns.
    SockAddr,
    SockTuple,
    FdList,
    FsPath,
    FsRelPath,
}

impl FieldKind {
    /// Returns the fixed byte width for fixed-width kinds, `None` for
    /// variable-length kinds (char-buf, byte-buf, ip-addr/net).
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Int8
            | Self::Uint8
            | Self::Flags8
            | Self::EnumFlags8
            | Self::SigType
            | Self::L4Proto
            | Self::SockFamily => Some(1),
            Self::Int16
            | Self::Uint16
            | Self::Flags16
            | Self::EnumFlags16
            | Self::Port
            | Self::SyscallId => Some(2),
            Self::Int32
            | Self::Uint32
            | Self::Flags32
            | Self::EnumFlags32
            | Self::Mode
            | Self::Bool
            | Self::Ipv4
            | Self::Sigset
            | Self::Uid
            | Self::Gid => Some(4),
            Self::Int64
            | Self::Uint64
            | Self::RelTime
            | Self::AbsTime
            | Self::Fd
            | Self::Pid
            | Self::Errno
            | Self::Double => Some(8),
            Self::Ipv6 => Some(16),
            Self::CharBuf
            | Self::ByteBuf
            | Self::IpAddr
            | Self::IpNet
            | Self::SockAddr
            | Self::SockTuple
            | Self::FdList
            | Self::FsPath
            | Self::FsRelPath => None,
        }
    }

    /// Whether the kind may appear as a table column at all.
    pub fn is_column_kind(self) -> bool {
        !matches!(
            self,
            Self::SockAddr | Self::SockTuple | Self::FdList | Self::FsPath | Self::FsRelPath
        )
    }

    /// Kinds the arithmetic aggregations (SUM/AVG/TIME_AVG) operate on.
    /// Everything else is a silent no-op in the kernel.
    pub fn is_summable(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Uint64
                | Self::Bool
                | Self::RelTime
                | Self::AbsTime
                | Self::Double
        )
    }

    /// Kinds whose rendered string participates in free-text filtering
    /// and sample search.
    pub fn is_text_matchable(self) -> bool {
        matches!(
            self,
            Self::CharBuf
                | Self::ByteBuf
                | Self::SyscallId
                | Self::Port
                | Self::L4Proto
                | Self::SockFamily
                | Self::Ipv4
                | Self::Ipv6
                | Self::Uid
                | Self::Gid
        )
    }

    /// Default sort direction when a column of this kind is first selected.
    pub fn sorts_descending_by_default(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Uint64
                | Self::RelTime
                | Self::AbsTime
                | Self::Double
                | Self::Bool
        )
    }
}

/// How a value prefers to be formatted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrintFormat {
    #[default]
    Dec,
    Hex,
    Oct,
    /// Opaque identifier: decimal, never scaled.
    Id,
}

/// Static description of a field as declared by its extractor.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Fully qualified field name, e.g. `proc.name`.
    pub name: String,
    pub kind: FieldKind,
    pub print_format: PrintFormat,
    /// Human-readable legend text.
    pub description: String,
}

impl FieldInfo {
    pub fn new(name: &str, kind: FieldKind, print_format: PrintFormat, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            print_format,
            description: description.to_string(),
        }
    }
}

/// One value produced by an extractor, as raw bytes.
///
/// Fixed-width kinds are little-endian; char-buf carries a trailing NUL;
/// byte-buf length is the byte count itself.
#[derive(Debug, Clone, Default)]
pub struct RawValue {
    pub bytes: Vec<u8>,
}

impl RawValue {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn from_u8(v: u8) -> Self {
        Self::new(vec![v])
    }

    pub fn from_u16(v: u16) -> Self {
        Self::new(v.to_le_bytes().to_vec())
    }

    pub fn from_u32(v: u32) -> Self {
        Self::new(v.to_le_bytes().to_vec())
    }

    pub fn from_u64(v: u64) -> Self {
        Self::new(v.to_le_bytes().to_vec())
    }

    pub fn from_i64(v: i64) -> Self {
        Self::new(v.to_le_bytes().to_vec())
    }

    /// String bytes plus the terminating NUL expected for char-buf fields.
    pub fn from_str_nul(s: &str) -> Self {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        Self::new(bytes)
    }
}

/// A compiled field extractor bound to one field name.
pub trait FieldExtractor {
    /// Declared kind, print format and legend entry for the field.
    fn field_info(&self) -> &FieldInfo;

    /// Extract the field from `evt` into `out` (cleared by the caller).
    /// Returns false on a miss; only the first extracted value is consumed
    /// by the table.
    fn extract(&mut self, evt: &dyn EventLike, out: &mut Vec<RawValue>) -> bool;
}

/// Resolves field names into extractors. Injected into the table so the
/// engine carries no process-wide registry.
pub trait ExtractorFactory {
    /// Returns `None` when the field name is unknown at this view depth.
    fn new_extractor(&self, field_name: &str, view_depth: u32) -> Option<Box<dyn FieldExtractor>>;
}

/// A compiled event filter.
pub trait EventFilter {
    fn run(&mut self, evt: &dyn EventLike) -> bool;
}

/// Compiles filter expressions into runnable filters.
pub trait FilterCompiler {
    fn compile(&self, expression: &str) -> Result<Box<dyn EventFilter>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_widths() {
        assert_eq!(FieldKind::Int8.fixed_width(), Some(1));
        assert_eq!(FieldKind::SigType.fixed_width(), Some(1));
        assert_eq!(FieldKind::Port.fixed_width(), Some(2));
        assert_eq!(FieldKind::SyscallId.fixed_width(), Some(2));
        assert_eq!(FieldKind::Mode.fixed_width(), Some(4));
        assert_eq!(FieldKind::Bool.fixed_width(), Some(4));
        assert_eq!(FieldKind::Ipv4.fixed_width(), Some(4));
        assert_eq!(FieldKind::Sigset.fixed_width(), Some(4));
        assert_eq!(FieldKind::Fd.fixed_width(), Some(8));
        assert_eq!(FieldKind::Errno.fixed_width(), Some(8));
        assert_eq!(FieldKind::Double.fixed_width(), Some(8));
        assert_eq!(FieldKind::Ipv6.fixed_width(), Some(16));
        assert_eq!(FieldKind::CharBuf.fixed_width(), None);
        assert_eq!(FieldKind::ByteBuf.fixed_width(), None);
        assert_eq!(FieldKind::IpAddr.fixed_width(), None);
    }

    #[test]
    fn test_column_kind_rejection_set() {
        for kind in [
            FieldKind::SockAddr,
            FieldKind::SockTuple,
            FieldKind::FdList,
            FieldKind::FsPath,
            FieldKind::FsRelPath,
        ] {
            assert!(!kind.is_column_kind(), "{kind:?} must be rejected");
        }
        assert!(FieldKind::CharBuf.is_column_kind());
        assert!(FieldKind::Uint64.is_column_kind());
    }

    #[test]
    fn test_summable_excludes_ids() {
        assert!(FieldKind::Uint64.is_summable());
        assert!(FieldKind::Bool.is_summable());
        assert!(FieldKind::RelTime.is_summable());
        // Identifier-like kinds fall through the arithmetic switch.
        assert!(!FieldKind::Fd.is_summable());
        assert!(!FieldKind::Pid.is_summable());
        assert!(!FieldKind::Port.is_summable());
        assert!(!FieldKind::Ipv4.is_summable());
    }

    #[test]
    fn test_text_matchable_set() {
        assert!(FieldKind::CharBuf.is_text_matchable());
        assert!(FieldKind::Port.is_text_matchable());
        assert!(FieldKind::Uid.is_text_matchable());
        assert!(FieldKind::Ipv6.is_text_matchable());
        assert!(!FieldKind::Uint64.is_text_matchable());
        assert!(!FieldKind::RelTime.is_text_matchable());
    }

    #[test]
    fn test_default_sort_direction() {
        assert!(FieldKind::Uint64.sorts_descending_by_default());
        assert!(FieldKind::Double.sorts_descending_by_default());
        assert!(FieldKind::Bool.sorts_descending_by_default());
        assert!(!FieldKind::CharBuf.sorts_descending_by_default());
        assert!(!FieldKind::Port.sorts_descending_by_default());
    }

    #[test]
    fn test_raw_value_charbuf_has_nul() {
        let v = RawValue::from_str_nul("cat");
        assert_eq!(v.bytes, b"cat\0");
    }
}
