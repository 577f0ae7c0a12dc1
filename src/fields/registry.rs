//! Built-in field registry and filter compiler over the concrete event
//! model. Real deployments inject their own factory; this one covers the
//! driver binary and the test suite.

use anyhow::{bail, Result};

use crate::event::EventLike;

use super::{
    EventFilter, ExtractorFactory, FieldExtractor, FieldInfo, FieldKind, FilterCompiler,
    PrintFormat, RawValue,
};

/// Fields resolvable by the built-in registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuiltinField {
    UtilCnt,
    EvtCount,
    EvtType,
    EvtTs,
    EvtLatency,
    EvtBuflen,
    EvtRes,
    FdNum,
    FdCip,
    FdSport,
    FdL4Proto,
    ProcName,
    ProcArgs,
    ProcPid,
    ProcUid,
    ThreadTid,
}

impl BuiltinField {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "util.cnt" => Some(Self::UtilCnt),
            "evt.count" => Some(Self::EvtCount),
            "evt.type" => Some(Self::EvtType),
            "evt.ts" => Some(Self::EvtTs),
            "evt.latency" => Some(Self::EvtLatency),
            "evt.buflen" => Some(Self::EvtBuflen),
            "evt.res" => Some(Self::EvtRes),
            "fd.num" => Some(Self::FdNum),
            "fd.cip" => Some(Self::FdCip),
            "fd.sport" => Some(Self::FdSport),
            "fd.l4proto" => Some(Self::FdL4Proto),
            "proc.name" => Some(Self::ProcName),
            "proc.args" => Some(Self::ProcArgs),
            "proc.pid" => Some(Self::ProcPid),
            "proc.uid" => Some(Self::ProcUid),
            "thread.tid" => Some(Self::ThreadTid),
            _ => None,
        }
    }

    fn info(self) -> FieldInfo {
        match self {
            Self::UtilCnt => FieldInfo::new(
                "util.cnt",
                FieldKind::Uint64,
                PrintFormat::Dec,
                "incremental counter, unique per extracted row",
            ),
            Self::EvtCount => FieldInfo::new(
                "evt.count",
                FieldKind::Uint64,
                PrintFormat::Dec,
                "1 for every event",
            ),
            Self::EvtType => FieldInfo::new(
                "evt.type",
                FieldKind::Uint16,
                PrintFormat::Dec,
                "numeric event type",
            ),
            Self::EvtTs => FieldInfo::new(
                "evt.ts",
                FieldKind::AbsTime,
                PrintFormat::Dec,
                "event timestamp (ns since epoch)",
            ),
            Self::EvtLatency => FieldInfo::new(
                "evt.latency",
                FieldKind::RelTime,
                PrintFormat::Dec,
                "event latency in nanoseconds",
            ),
            Self::EvtBuflen => FieldInfo::new(
                "evt.buflen",
                FieldKind::Uint32,
                PrintFormat::Dec,
                "I/O buffer length in bytes",
            ),
            Self::EvtRes => FieldInfo::new(
                "evt.res",
                FieldKind::Errno,
                PrintFormat::Dec,
                "syscall result",
            ),
            Self::FdNum => FieldInfo::new(
                "fd.num",
                FieldKind::Fd,
                PrintFormat::Dec,
                "file descriptor number",
            ),
            Self::FdCip => FieldInfo::new(
                "fd.cip",
                FieldKind::Ipv4,
                PrintFormat::Dec,
                "client IPv4 address",
            ),
            Self::FdSport => FieldInfo::new(
                "fd.sport",
                FieldKind::Port,
                PrintFormat::Dec,
                "server port",
            ),
            Self::FdL4Proto => FieldInfo::new(
                "fd.l4proto",
                FieldKind::L4Proto,
                PrintFormat::Dec,
                "transport protocol",
            ),
            Self::ProcName => FieldInfo::new(
                "proc.name",
                FieldKind::CharBuf,
                PrintFormat::Dec,
                "process executable name",
            ),
            Self::ProcArgs => FieldInfo::new(
                "proc.args",
                FieldKind::CharBuf,
                PrintFormat::Dec,
                "process command line",
            ),
            Self::ProcPid => FieldInfo::new(
                "proc.pid",
                FieldKind::Pid,
                PrintFormat::Dec,
                "process id",
            ),
            Self::ProcUid => FieldInfo::new(
                "proc.uid",
                FieldKind::Uid,
                PrintFormat::Dec,
                "owner user id",
            ),
            Self::ThreadTid => FieldInfo::new(
                "thread.tid",
                FieldKind::Int64,
                PrintFormat::Dec,
                "thread id",
            ),
        }
    }
}

struct BuiltinExtractor {
    field: BuiltinField,
    info: FieldInfo,
    /// Running counter backing `util.cnt`.
    counter: u64,
}

impl BuiltinExtractor {
    fn new(field: BuiltinField) -> Self {
        Self {
            field,
            info: field.info(),
            counter: 0,
        }
    }
}

impl FieldExtractor for BuiltinExtractor {
    fn field_info(&self) -> &FieldInfo {
        &self.info
    }

    fn extract(&mut self, evt: &dyn EventLike, out: &mut Vec<RawValue>) -> bool {
        match self.field {
            BuiltinField::UtilCnt => {
                self.counter += 1;
                out.push(RawValue::from_u64(self.counter));
            }
            BuiltinField::EvtCount => out.push(RawValue::from_u64(1)),
            BuiltinField::EvtType => out.push(RawValue::from_u16(evt.type_id())),
            BuiltinField::EvtTs => out.push(RawValue::from_u64(evt.ts())),
            BuiltinField::EvtLatency => match evt.payload().and_then(|p| p.latency_ns) {
                Some(v) => out.push(RawValue::from_u64(v)),
                None => return false,
            },
            BuiltinField::EvtBuflen => match evt.payload().and_then(|p| p.buflen) {
                Some(v) => out.push(RawValue::from_u32(v)),
                None => return false,
            },
            BuiltinField::EvtRes => match evt.payload().and_then(|p| p.res) {
                Some(v) => out.push(RawValue::from_i64(v)),
                None => return false,
            },
            BuiltinField::FdNum => match evt.payload().and_then(|p| p.fd) {
                Some(v) => out.push(RawValue::from_i64(v)),
                None => return false,
            },
            BuiltinField::FdCip => match evt.payload().and_then(|p| p.client_ip) {
                Some(v) => out.push(RawValue::new(v.to_vec())),
                None => return false,
            },
            BuiltinField::FdSport => match evt.payload().and_then(|p| p.server_port) {
                Some(v) => out.push(RawValue::from_u16(v)),
                None => return false,
            },
            BuiltinField::FdL4Proto => match evt.payload().and_then(|p| p.l4proto) {
                Some(v) => out.push(RawValue::from_u8(v)),
                None => return false,
            },
            BuiltinField::ProcName => match evt.thread() {
                Some(t) => out.push(RawValue::from_str_nul(&t.name)),
                None => return false,
            },
            BuiltinField::ProcArgs => match evt.thread() {
                Some(t) => out.push(RawValue::from_str_nul(&t.args)),
                None => return false,
            },
            BuiltinField::ProcPid => match evt.thread() {
                Some(t) => out.push(RawValue::from_i64(t.pid)),
                None => return false,
            },
            BuiltinField::ProcUid => match evt.thread() {
                Some(t) => out.push(RawValue::from_u32(t.uid)),
                None => return false,
            },
            BuiltinField::ThreadTid => out.push(RawValue::from_i64(evt.tid())),
        }
        true
    }
}

/// Extractor factory over the built-in field set. View depth is accepted
/// and ignored; the registry has a single level.
#[derive(Debug, Default, Clone)]
pub struct FieldRegistry;

impl FieldRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl ExtractorFactory for FieldRegistry {
    fn new_extractor(&self, field_name: &str, _view_depth: u32) -> Option<Box<dyn FieldExtractor>> {
        BuiltinField::from_name(field_name)
            .map(|f| Box::new(BuiltinExtractor::new(f)) as Box<dyn FieldExtractor>)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClauseOp {
    Eq,
    Ne,
    Contains,
}

struct Clause {
    extractor: BuiltinExtractor,
    op: ClauseOp,
    rhs: Vec<u8>,
    scratch: Vec<RawValue>,
}

impl Clause {
    fn matches(&mut self, evt: &dyn EventLike) -> bool {
        self.scratch.clear();
        if !self.extractor.extract(evt, &mut self.scratch) {
            return false;
        }
        let Some(value) = self.scratch.first() else {
            return false;
        };

        match self.op {
            ClauseOp::Eq => value.bytes == self.rhs,
            ClauseOp::Ne => value.bytes != self.rhs,
            ClauseOp::Contains => value
                .bytes
                .windows(self.rhs.len().max(1))
                .any(|w| w == self.rhs.as_slice()),
        }
    }
}

/// Encodes a filter literal into the raw byte form the field extracts to.
fn encode_literal(kind: FieldKind, lit: &str) -> Result<Vec<u8>> {
    let bytes = match kind {
        FieldKind::CharBuf | FieldKind::ByteBuf => {
            let mut b = lit.as_bytes().to_vec();
            if kind == FieldKind::CharBuf {
                b.push(0);
            }
            b
        }
        FieldKind::Bool => {
            let v: u32 = match lit {
                "true" => 1,
                "false" => 0,
                _ => bail!("invalid bool literal: {lit}"),
            };
            v.to_le_bytes().to_vec()
        }
        FieldKind::Ipv4 => {
            let addr: std::net::Ipv4Addr =
                lit.parse().map_err(|_| anyhow::anyhow!("invalid ipv4 literal: {lit}"))?;
            addr.octets().to_vec()
        }
        _ => {
            let width = kind
                .fixed_width()
                .ok_or_else(|| anyhow::anyhow!("field kind unsupported in filters"))?;
            let v: i128 = lit
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid numeric literal: {lit}"))?;
            v.to_le_bytes()[..width].to_vec()
        }
    };
    Ok(bytes)
}

struct ClauseFilter {
    clauses: Vec<Clause>,
}

impl EventFilter for ClauseFilter {
    fn run(&mut self, evt: &dyn EventLike) -> bool {
        self.clauses.iter_mut().all(|c| c.matches(evt))
    }
}

/// Compiles conjunctions of `field op literal` clauses, ops `=`, `!=` and
/// `contains`, joined by ` and `.
#[derive(Debug, Default, Clone)]
pub struct ExprFilterCompiler;

impl ExprFilterCompiler {
    pub fn new() -> Self {
        Self
    }

    fn parse_clause(text: &str) -> Result<Clause> {
        let (lhs, op, rhs) = if let Some((l, r)) = text.split_once(" contains ") {
            (l, ClauseOp::Contains, r)
        } else if let Some((l, r)) = text.split_once("!=") {
            (l, ClauseOp::Ne, r)
        } else if let Some((l, r)) = text.split_once('=') {
            (l, ClauseOp::Eq, r)
        } else {
            bail!("expected 'field op value', got: {text}");
        };

        let name = lhs.trim();
        let lit = rhs.trim().trim_matches('"');

        let Some(field) = BuiltinField::from_name(name) else {
            bail!("unknown filter field: {name}");
        };
        let extractor = BuiltinExtractor::new(field);

        let rhs = match op {
            ClauseOp::Contains => lit.as_bytes().to_vec(),
            _ => encode_literal(extractor.info.kind, lit)?,
        };

        Ok(Clause {
            extractor,
            op,
            rhs,
            scratch: Vec::new(),
        })
    }
}

impl FilterCompiler for ExprFilterCompiler {
    fn compile(&self, expression: &str) -> Result<Box<dyn EventFilter>> {
        let mut clauses = Vec::new();
        for part in expression.split(" and ") {
            let part = part.trim();
            if part.is_empty() {
                bail!("empty filter clause");
            }
            clauses.push(Self::parse_clause(part)?);
        }
        if clauses.is_empty() {
            bail!("empty filter expression");
        }
        Ok(Box::new(ClauseFilter { clauses }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Event, EventPayload, ThreadInfo};

    fn event(type_id: u16, name: &str) -> Event {
        Event {
            ts: 1_000,
            tid: 7,
            type_id,
            thread: Some(ThreadInfo {
                tid: 7,
                pid: 7,
                name: name.to_string(),
                args: String::new(),
                uid: 1000,
            }),
            payload: EventPayload {
                latency_ns: Some(500),
                buflen: Some(128),
                fd: Some(3),
                client_ip: Some([10, 0, 0, 1]),
                server_port: Some(8080),
                l4proto: Some(6),
                res: Some(128),
            },
        }
    }

    #[test]
    fn test_registry_resolves_known_fields() {
        let reg = FieldRegistry::new();
        for name in [
            "util.cnt",
            "evt.count",
            "evt.type",
            "evt.latency",
            "fd.num",
            "fd.cip",
            "proc.name",
            "proc.pid",
            "thread.tid",
        ] {
            let ex = reg.new_extractor(name, 0).expect("known field");
            assert_eq!(ex.field_info().name, name);
        }
        assert!(reg.new_extractor("nope.field", 0).is_none());
    }

    #[test]
    fn test_extract_proc_name_charbuf() {
        let reg = FieldRegistry::new();
        let mut ex = reg.new_extractor("proc.name", 0).expect("known field");
        let mut out = Vec::new();
        assert!(ex.extract(&event(1, "cat"), &mut out));
        assert_eq!(out[0].bytes, b"cat\0");
    }

    #[test]
    fn test_extract_misses_without_payload_field() {
        let reg = FieldRegistry::new();
        let mut ex = reg.new_extractor("fd.num", 0).expect("known field");
        let mut evt = event(1, "cat");
        evt.payload.fd = None;
        let mut out = Vec::new();
        assert!(!ex.extract(&evt, &mut out));
        assert!(out.is_empty());
    }

    #[test]
    fn test_util_cnt_increments_per_extraction() {
        let reg = FieldRegistry::new();
        let mut ex = reg.new_extractor("util.cnt", 0).expect("known field");
        let evt = event(1, "cat");
        let mut out = Vec::new();
        for expected in 1u64..=3 {
            out.clear();
            assert!(ex.extract(&evt, &mut out));
            assert_eq!(out[0].bytes, expected.to_le_bytes());
        }
    }

    #[test]
    fn test_filter_numeric_equality() {
        let compiler = ExprFilterCompiler::new();
        let mut f = compiler.compile("evt.type = 3").expect("compiles");
        assert!(f.run(&event(3, "cat")));
        assert!(!f.run(&event(4, "cat")));
    }

    #[test]
    fn test_filter_string_and_conjunction() {
        let compiler = ExprFilterCompiler::new();
        let mut f = compiler
            .compile("proc.name = cat and evt.type != 9")
            .expect("compiles");
        assert!(f.run(&event(3, "cat")));
        assert!(!f.run(&event(9, "cat")));
        assert!(!f.run(&event(3, "ls")));
    }

    #[test]
    fn test_filter_contains() {
        let compiler = ExprFilterCompiler::new();
        let mut f = compiler.compile("proc.name contains at").expect("compiles");
        assert!(f.run(&event(1, "cat")));
        assert!(!f.run(&event(1, "ls")));
    }

    #[test]
    fn test_filter_ipv4_literal() {
        let compiler = ExprFilterCompiler::new();
        let mut f = compiler.compile("fd.cip = 10.0.0.1").expect("compiles");
        assert!(f.run(&event(1, "cat")));
        let mut evt = event(1, "cat");
        evt.payload.client_ip = Some([10, 0, 0, 2]);
        assert!(!f.run(&evt));
    }

    #[test]
    fn test_filter_compile_errors() {
        let compiler = ExprFilterCompiler::new();
        assert!(compiler.compile("proc.name").is_err());
        assert!(compiler.compile("bogus.field = 1").is_err());
        assert!(compiler.compile("").is_err());
    }
}
