use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One second in nanoseconds, the granularity of thread-table snapshots.
pub const ONE_SECOND_IN_NS: u64 = 1_000_000_000;

/// Reserved event type id for synthetic thread-table snapshot events.
/// No real event source produces it, so filters cannot match a snapshot
/// by accident.
pub const SNAPSHOT_EVENT_TYPE: u16 = u16::MAX;

/// Capability the ingestion pipeline requires from an event.
///
/// Two implementations exist: [`Event`] for real events coming from the
/// source, and [`SnapshotEvent`] for the per-flush thread-table walk.
pub trait EventLike {
    /// Event timestamp, nanoseconds since the epoch.
    fn ts(&self) -> u64;

    /// Thread id the event was generated by.
    fn tid(&self) -> i64;

    /// Numeric event type id.
    fn type_id(&self) -> u16;

    /// Thread the event is bound to, if known.
    fn thread(&self) -> Option<&ThreadInfo>;

    /// Per-event payload fields. Snapshot events have none.
    fn payload(&self) -> Option<&EventPayload> {
        None
    }
}

/// Durable per-thread state, fed through the pipeline once per flush.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub tid: i64,
    pub pid: i64,
    /// Executable name (comm).
    pub name: String,
    /// Command line, space separated.
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub uid: u32,
}

/// Optional per-event fields carried by real events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub latency_ns: Option<u64>,
    #[serde(default)]
    pub buflen: Option<u32>,
    #[serde(default)]
    pub fd: Option<i64>,
    /// Client IPv4 address in network byte order.
    #[serde(default)]
    pub client_ip: Option<[u8; 4]>,
    #[serde(default)]
    pub server_port: Option<u16>,
    #[serde(default)]
    pub l4proto: Option<u8>,
    /// Syscall result; negative values are errno.
    #[serde(default)]
    pub res: Option<i64>,
}

/// A concrete event as produced by the driver's JSON-lines source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    pub ts: u64,
    pub tid: i64,
    #[serde(default)]
    pub type_id: u16,
    /// Thread info resolved by the source, if any.
    #[serde(default)]
    pub thread: Option<ThreadInfo>,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl EventLike for Event {
    fn ts(&self) -> u64 {
        self.ts
    }

    fn tid(&self) -> i64 {
        self.tid
    }

    fn type_id(&self) -> u16 {
        self.type_id
    }

    fn thread(&self) -> Option<&ThreadInfo> {
        self.thread.as_ref()
    }

    fn payload(&self) -> Option<&EventPayload> {
        Some(&self.payload)
    }
}

/// Synthetic event wrapping one thread-table entry during a flush walk.
///
/// The timestamp is aligned to the end of the previous full second so the
/// snapshot sorts before any real event of the current second.
#[derive(Debug)]
pub struct SnapshotEvent<'a> {
    ts: u64,
    thread: &'a ThreadInfo,
}

impl<'a> SnapshotEvent<'a> {
    /// Builds a snapshot event for `thread` from the flush-driving
    /// timestamp `ts`.
    pub fn new(ts: u64, thread: &'a ThreadInfo) -> Self {
        let ts_s = ts - (ts % ONE_SECOND_IN_NS);
        Self {
            ts: ts_s.saturating_sub(1),
            thread,
        }
    }
}

impl EventLike for SnapshotEvent<'_> {
    fn ts(&self) -> u64 {
        self.ts
    }

    fn tid(&self) -> i64 {
        self.thread.tid
    }

    fn type_id(&self) -> u16 {
        SNAPSHOT_EVENT_TYPE
    }

    fn thread(&self) -> Option<&ThreadInfo> {
        Some(self.thread)
    }
}

/// Thread-table provider walked once per flush.
pub trait ThreadProvider {
    /// Visits every live thread; the visitor returns false to stop early.
    fn for_each_thread(&self, visit: &mut dyn FnMut(&ThreadInfo) -> bool);
}

/// In-memory thread table keyed by tid.
///
/// The engine only reads it; the event source updates it as processes come
/// and go. Iteration is tid-ordered so snapshot walks are deterministic.
#[derive(Debug, Default)]
pub struct ThreadRegistry {
    threads: RwLock<BTreeMap<i64, ThreadInfo>>,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `info.tid`.
    pub fn upsert(&self, info: ThreadInfo) {
        self.threads.write().insert(info.tid, info);
    }

    /// Removes a thread, e.g. on process exit.
    pub fn remove(&self, tid: i64) {
        self.threads.write().remove(&tid);
    }

    pub fn get(&self, tid: i64) -> Option<ThreadInfo> {
        self.threads.read().get(&tid).cloned()
    }

    pub fn len(&self) -> usize {
        self.threads.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.read().is_empty()
    }
}

impl ThreadProvider for ThreadRegistry {
    fn for_each_thread(&self, visit: &mut dyn FnMut(&ThreadInfo) -> bool) {
        for info in self.threads.read().values() {
            if !visit(info) {
                break;
            }
        }
    }
}
