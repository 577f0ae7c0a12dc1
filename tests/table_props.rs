//! Property-based tests for the aggregation table.
//!
//! Covers: key-set order independence, wrapping SUM semantics, AVG
//! truncation, and MIN/MAX over arbitrary contribution sequences.

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use evtop::config::{ColumnSpec, OutputFormat, TableMode};
use evtop::event::{Event, EventPayload, ThreadInfo, ThreadProvider, ThreadRegistry};
use evtop::fields::registry::{ExprFilterCompiler, FieldRegistry};
use evtop::fields::{FieldKind, PrintFormat};
use evtop::render::render_str;
use evtop::table::aggregate::Aggregation;
use evtop::value::ValueData;
use evtop::{Providers, SampleRow, Table};

const SECOND: u64 = 1_000_000_000;
const NAMES: [&str; 3] = ["alpha", "beta", "gamma"];

fn providers() -> Providers {
    Providers {
        fields: Arc::new(FieldRegistry::new()),
        filters: Arc::new(ExprFilterCompiler::new()),
        threads: Arc::new(ThreadRegistry::new()) as Arc<dyn ThreadProvider>,
    }
}

fn sum_table(aggregation: Aggregation) -> Table {
    let mut t = Table::new(
        providers(),
        TableMode::Table,
        SECOND,
        OutputFormat::External,
    );
    t.configure(
        &[
            ColumnSpec::key("proc.name"),
            ColumnSpec::value("evt.buflen", aggregation),
        ],
        "",
        false,
        0,
    )
    .expect("valid config");
    t
}

fn buflen_event(name: &str, buflen: u32) -> Event {
    Event {
        ts: 100,
        tid: 1,
        type_id: 1,
        thread: Some(ThreadInfo {
            tid: 1,
            pid: 1,
            name: name.to_string(),
            args: String::new(),
            uid: 0,
        }),
        payload: EventPayload {
            buflen: Some(buflen),
            ..Default::default()
        },
    }
}

fn run_and_sample(t: &mut Table, events: &[(usize, u32)]) -> Vec<SampleRow> {
    t.flush(&buflen_event(NAMES[0], 0));
    for (idx, value) in events {
        t.process_event(&buflen_event(NAMES[*idx], *value));
    }
    t.flush(&buflen_event(NAMES[0], 0));
    t.get_sample(SECOND).expect("sample").to_vec()
}

fn sample_by_name(t: &Table, rows: &[SampleRow]) -> HashMap<String, (ValueData, u32)> {
    rows.iter()
        .map(|row| {
            let name = render_str(
                FieldKind::CharBuf,
                PrintFormat::Dec,
                &row.key,
                t.arena(),
                0,
            );
            (name, (row.values[0].data, row.values[0].cnt))
        })
        .collect()
}

proptest! {
    /// Each distinct key maps to exactly one row, and ingestion order does
    /// not change the key set or the per-key SUM totals.
    #[test]
    fn prop_key_set_and_sum_are_order_independent(
        events in prop::collection::vec((0usize..3, any::<u32>()), 1..40),
        rotation in 0usize..40,
    ) {
        let mut forward = sum_table(Aggregation::Sum);
        let rows = run_and_sample(&mut forward, &events);
        let by_name = sample_by_name(&forward, &rows);

        let mut rotated_events = events.clone();
        rotated_events.rotate_left(rotation % events.len());
        let mut rotated = sum_table(Aggregation::Sum);
        let rows = run_and_sample(&mut rotated, &rotated_events);
        let by_name_rotated = sample_by_name(&rotated, &rows);

        let mut expected: HashMap<String, u32> = HashMap::new();
        for (idx, value) in &events {
            let slot = expected.entry(NAMES[*idx].to_string()).or_insert(0);
            *slot = slot.wrapping_add(*value);
        }

        prop_assert_eq!(by_name.len(), expected.len());
        for (name, total) in &expected {
            let (data, _) = by_name.get(name).expect("key present");
            prop_assert_eq!(*data, ValueData::U32(*total));
            let (rotated_data, _) = by_name_rotated.get(name).expect("key present");
            prop_assert_eq!(*rotated_data, ValueData::U32(*total));
        }
    }

    /// AVG stores the wrapping sum and the contribution count; the
    /// presented mean is the truncating quotient.
    #[test]
    fn prop_avg_matches_truncated_mean(
        values in prop::collection::vec(0u32..1_000_000, 1..30),
    ) {
        let events: Vec<(usize, u32)> = values.iter().map(|v| (0, *v)).collect();
        let mut t = sum_table(Aggregation::Avg);
        let rows = run_and_sample(&mut t, &events);
        prop_assert_eq!(rows.len(), 1);

        let sum: u32 = values.iter().fold(0u32, |acc, v| acc.wrapping_add(*v));
        let n = values.len() as u32;
        prop_assert_eq!(rows[0].values[0].data, ValueData::U32(sum));
        prop_assert_eq!(rows[0].values[0].cnt, n);

        let rendered = render_str(
            FieldKind::Uint32,
            PrintFormat::Dec,
            &rows[0].values[0],
            t.arena(),
            0,
        );
        prop_assert_eq!(rendered, (sum / n).to_string());
    }

    /// MIN keeps the smallest non-defaulted contribution with a count of
    /// one; MAX keeps the largest.
    #[test]
    fn prop_min_max_track_extremes(
        values in prop::collection::vec(any::<u32>(), 1..30),
    ) {
        let events: Vec<(usize, u32)> = values.iter().map(|v| (0, *v)).collect();

        let mut min_table = sum_table(Aggregation::Min);
        let rows = run_and_sample(&mut min_table, &events);
        prop_assert_eq!(rows.len(), 1);
        prop_assert_eq!(
            rows[0].values[0].data,
            ValueData::U32(*values.iter().min().expect("non-empty"))
        );
        prop_assert_eq!(rows[0].values[0].cnt, 1);

        let mut max_table = sum_table(Aggregation::Max);
        let rows = run_and_sample(&mut max_table, &events);
        prop_assert_eq!(rows.len(), 1);
        prop_assert_eq!(
            rows[0].values[0].data,
            ValueData::U32(*values.iter().max().expect("non-empty"))
        );
    }

    /// Group-by projection never grows the sample, and every group-by key
    /// value originates from some pre-merge row.
    #[test]
    fn prop_groupby_sample_is_a_projection(
        events in prop::collection::vec((1i64..6, 0usize..3, 0u32..1_000), 1..40),
    ) {
        let mut t = Table::new(
            providers(),
            TableMode::Table,
            SECOND,
            OutputFormat::External,
        );
        t.configure(
            &[
                ColumnSpec::key("fd.num"),
                ColumnSpec::groupby_key("proc.name"),
                ColumnSpec::value("evt.buflen", Aggregation::Sum).with_merge(Aggregation::Sum),
            ],
            "",
            false,
            0,
        )
        .expect("valid config");

        t.flush(&buflen_event(NAMES[0], 0));
        // Non-aggregated columns keep the first value seen for a key, so
        // each descriptor is attributed to the first name it appeared with.
        let mut name_per_fd: HashMap<i64, String> = HashMap::new();
        for (fd, name_idx, value) in &events {
            let mut evt = buflen_event(NAMES[*name_idx], *value);
            evt.payload.fd = Some(*fd);
            name_per_fd
                .entry(*fd)
                .or_insert_with(|| NAMES[*name_idx].to_string());
            t.process_event(&evt);
        }
        t.flush(&buflen_event(NAMES[0], 0));

        let mut expected: HashMap<String, u32> = HashMap::new();
        for (fd, _, value) in &events {
            let name = name_per_fd.get(fd).expect("fd seen").clone();
            let slot = expected.entry(name).or_insert(0);
            *slot = slot.wrapping_add(*value);
        }

        let rows = t.get_sample(SECOND).expect("sample").to_vec();
        prop_assert!(rows.len() <= name_per_fd.len());
        let by_name = sample_by_name(&t, &rows);
        prop_assert_eq!(by_name.len(), expected.len());
        for (name, total) in &expected {
            let (data, _) = by_name.get(name).expect("group present");
            prop_assert_eq!(*data, ValueData::U32(*total));
        }
    }
}
