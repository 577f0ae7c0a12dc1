use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use evtop::config::{ColumnSpec, OutputFormat, TableMode};
use evtop::event::{Event, EventPayload, ThreadInfo, ThreadProvider, ThreadRegistry};
use evtop::fields::registry::{ExprFilterCompiler, FieldRegistry};
use evtop::table::aggregate::Aggregation;
use evtop::{Providers, Table};

const SECOND: u64 = 1_000_000_000;

fn providers() -> Providers {
    Providers {
        fields: Arc::new(FieldRegistry::new()),
        filters: Arc::new(ExprFilterCompiler::new()),
        threads: Arc::new(ThreadRegistry::new()) as Arc<dyn ThreadProvider>,
    }
}

fn sum_table() -> Table {
    let mut t = Table::new(
        providers(),
        TableMode::Table,
        SECOND,
        OutputFormat::External,
    );
    t.configure(
        &[
            ColumnSpec::key("proc.name"),
            ColumnSpec::value("evt.buflen", Aggregation::Sum),
        ],
        "",
        false,
        0,
    )
    .expect("valid config");
    t
}

fn events(n: usize) -> Vec<Event> {
    (0..n)
        .map(|i| Event {
            ts: 100 + i as u64,
            tid: (i % 16) as i64,
            type_id: 1,
            thread: Some(ThreadInfo {
                tid: (i % 16) as i64,
                pid: (i % 16) as i64,
                name: format!("proc-{}", i % 16),
                args: String::new(),
                uid: 0,
            }),
            payload: EventPayload {
                buflen: Some((i % 4096) as u32),
                ..Default::default()
            },
        })
        .collect()
}

fn bench_process_event(c: &mut Criterion) {
    let batch = events(1024);

    c.bench_function("process_event_1k", |b| {
        let mut t = sum_table();
        t.flush(&batch[0]);
        b.iter(|| {
            for evt in &batch {
                t.process_event(black_box(evt));
            }
        });
    });
}

fn bench_flush_cycle(c: &mut Criterion) {
    let batch = events(1024);

    c.bench_function("flush_and_sample", |b| {
        let mut t = sum_table();
        t.flush(&batch[0]);
        let mut boundary = 1u64;
        b.iter(|| {
            for evt in &batch {
                t.process_event(evt);
            }
            let flush_evt = Event {
                ts: boundary * SECOND + 100,
                tid: 1,
                ..Default::default()
            };
            t.flush(&flush_evt);
            boundary += 1;
            let rows = t.get_sample(SECOND).expect("sample");
            black_box(rows.len());
        });
    });
}

criterion_group!(benches, bench_process_event, bench_flush_cycle);
criterion_main!(benches);
