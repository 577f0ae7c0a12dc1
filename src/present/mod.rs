//! Sample presenters: space-separated plain text and JSON rows.

use std::io::{self, Write};

use crate::fields::{FieldKind, PrintFormat};
use crate::render;
use crate::table::SampleRow;
use crate::value::Arena;

/// Rendering metadata for one column of the active view.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMeta {
    pub kind: FieldKind,
    pub print_format: PrintFormat,
    /// Whether the column's value scales by the sample's time delta.
    pub time_scaled: bool,
}

/// A sample plus everything needed to render it: per-column metadata for
/// the key and the payload columns, and the arena resolving buffer values.
pub struct SampleView<'a> {
    pub rows: &'a [SampleRow],
    pub key: ColumnMeta,
    pub columns: Vec<ColumnMeta>,
    pub arena: &'a Arena,
}

/// Writes the sample as space-separated rows followed by a dashed trailer.
pub fn print_raw(view: &SampleView, time_delta: u64, out: &mut dyn Write) -> io::Result<()> {
    for row in view.rows {
        for (j, col) in view.columns.iter().enumerate() {
            let td = if col.time_scaled { time_delta } else { 0 };
            let rendered =
                render::render_str(col.kind, col.print_format, &row.values[j], view.arena, td);
            write!(out, "{rendered} ")?;
        }
        writeln!(out)?;
    }
    writeln!(out, "----------------------")?;
    Ok(())
}

/// Writes rows `first..=last` as `{"k": ..., "d": [...]}` objects between
/// a `"data": [` header and a `],` trailer. Returns the number of rows
/// emitted. `last` is assumed pre-clamped by the caller; a `first` past
/// the end emits nothing between header and trailer.
pub fn print_json(
    view: &SampleView,
    time_delta: u64,
    first: usize,
    last: usize,
    out: &mut dyn Write,
) -> io::Result<usize> {
    writeln!(out, "\"data\": [")?;

    let mut lines = 0;
    let len = view.rows.len();

    if len > 0 && first < len {
        let last = last.min(len - 1);
        for k in first..=last {
            let row = &view.rows[k];

            let mut data = Vec::with_capacity(view.columns.len());
            for (j, col) in view.columns.iter().enumerate() {
                let td = if col.time_scaled { time_delta } else { 0 };
                data.push(render::render_json(
                    col.kind,
                    col.print_format,
                    &row.values[j],
                    view.arena,
                    td,
                ));
            }

            let key = render::render_str(
                view.key.kind,
                view.key.print_format,
                &row.key,
                view.arena,
                0,
            );

            let key_json = serde_json::Value::String(key);
            let data_json = serde_json::Value::Array(data);
            write!(out, "{{\"k\":{key_json},\"d\":{data_json}}}")?;
            lines += 1;

            if k < last {
                write!(out, ",")?;
            }
            writeln!(out)?;
        }
    }

    writeln!(out, "],")?;
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{FieldValue, ValueData};

    fn meta(kind: FieldKind) -> ColumnMeta {
        ColumnMeta {
            kind,
            print_format: PrintFormat::Dec,
            time_scaled: false,
        }
    }

    fn two_row_view(arena: &mut Arena) -> (Vec<SampleRow>, ColumnMeta, Vec<ColumnMeta>) {
        let a = arena.copy(b"cat\0");
        let b = arena.copy(b"ls\0");
        let rows = vec![
            SampleRow {
                key: FieldValue::new(ValueData::Buf(a), 1),
                values: vec![FieldValue::new(ValueData::U64(7), 1)],
            },
            SampleRow {
                key: FieldValue::new(ValueData::Buf(b), 1),
                values: vec![FieldValue::new(ValueData::U64(3), 1)],
            },
        ];
        (rows, meta(FieldKind::CharBuf), vec![meta(FieldKind::Uint64)])
    }

    #[test]
    fn test_print_raw_layout() {
        let mut arena = Arena::new();
        let (rows, key, columns) = two_row_view(&mut arena);
        let view = SampleView {
            rows: &rows,
            key,
            columns,
            arena: &arena,
        };

        let mut out = Vec::new();
        print_raw(&view, 0, &mut out).expect("writes");
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(text, "7 \n3 \n----------------------\n");
    }

    #[test]
    fn test_print_raw_empty_sample_prints_trailer() {
        let arena = Arena::new();
        let view = SampleView {
            rows: &[],
            key: meta(FieldKind::Uint64),
            columns: vec![meta(FieldKind::Uint64)],
            arena: &arena,
        };

        let mut out = Vec::new();
        print_raw(&view, 0, &mut out).expect("writes");
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "----------------------\n"
        );
    }

    #[test]
    fn test_print_json_rows_and_separators() {
        let mut arena = Arena::new();
        let (rows, key, columns) = two_row_view(&mut arena);
        let view = SampleView {
            rows: &rows,
            key,
            columns,
            arena: &arena,
        };

        let mut out = Vec::new();
        let lines = print_json(&view, 0, 0, 1, &mut out).expect("writes");
        assert_eq!(lines, 2);
        let text = String::from_utf8(out).expect("utf8");
        assert_eq!(
            text,
            "\"data\": [\n{\"k\":\"cat\",\"d\":[7]},\n{\"k\":\"ls\",\"d\":[3]}\n],\n"
        );
    }

    #[test]
    fn test_print_json_first_past_end_emits_header_only() {
        let mut arena = Arena::new();
        let (rows, key, columns) = two_row_view(&mut arena);
        let view = SampleView {
            rows: &rows,
            key,
            columns,
            arena: &arena,
        };

        let mut out = Vec::new();
        let lines = print_json(&view, 0, 10, 1, &mut out).expect("writes");
        assert_eq!(lines, 0);
        assert_eq!(
            String::from_utf8(out).expect("utf8"),
            "\"data\": [\n],\n"
        );
    }

    #[test]
    fn test_print_json_single_row_range() {
        let mut arena = Arena::new();
        let (rows, key, columns) = two_row_view(&mut arena);
        let view = SampleView {
            rows: &rows,
            key,
            columns,
            arena: &arena,
        };

        let mut out = Vec::new();
        let lines = print_json(&view, 0, 1, 1, &mut out).expect("writes");
        assert_eq!(lines, 1);
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.contains("{\"k\":\"ls\",\"d\":[3]}"));
        assert!(!text.contains("cat"));
    }

    #[test]
    fn test_print_raw_time_scaled_column() {
        let arena = Arena::new();
        let rows = vec![SampleRow {
            key: FieldValue::new(ValueData::U64(1), 1),
            values: vec![FieldValue::new(ValueData::U64(500_000_000), 1)],
        }];
        let view = SampleView {
            rows: &rows,
            key: meta(FieldKind::Uint64),
            columns: vec![ColumnMeta {
                kind: FieldKind::RelTime,
                print_format: PrintFormat::Dec,
                time_scaled: true,
            }],
            arena: &arena,
        };

        let mut out = Vec::new();
        print_raw(&view, 1_000_000_000, &mut out).expect("writes");
        let text = String::from_utf8(out).expect("utf8");
        assert!(text.starts_with("50.00 "), "got: {text}");
    }
}
