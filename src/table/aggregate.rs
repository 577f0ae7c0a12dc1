use serde::Deserialize;

use crate::fields::FieldKind;
use crate::value::{Arena, FieldValue, ValueData};

/// Per-column aggregation operator. Each column carries one for the
/// pre-merge pass and one for the group-by merge pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    None,
    Sum,
    Avg,
    TimeAvg,
    Min,
    Max,
}

impl Aggregation {
    /// Operators whose presentation scales by the sample's time delta.
    pub fn is_time_scaled(self) -> bool {
        self == Self::TimeAvg
    }
}

macro_rules! int_pairwise {
    ($dst:expr, $src:expr, $m:ident) => {
        match (&mut $dst.data, $src.data) {
            (ValueData::I8(a), ValueData::I8(b)) => *a = (*a).$m(b),
            (ValueData::I16(a), ValueData::I16(b)) => *a = (*a).$m(b),
            (ValueData::I32(a), ValueData::I32(b)) => *a = (*a).$m(b),
            (ValueData::I64(a), ValueData::I64(b)) => *a = (*a).$m(b),
            (ValueData::U8(a), ValueData::U8(b)) => *a = (*a).$m(b),
            (ValueData::U16(a), ValueData::U16(b)) => *a = (*a).$m(b),
            (ValueData::U32(a), ValueData::U32(b)) => *a = (*a).$m(b),
            (ValueData::U64(a), ValueData::U64(b)) => *a = (*a).$m(b),
            _ => {}
        }
    };
}

/// Applies `op` for a column of `kind` to the stored value `dst` from the
/// freshly extracted (or projected) value `src`.
///
/// Arithmetic only touches the kinds the engine treats as summable;
/// identifier-like kinds (fd, pid, port, addresses...) pass through
/// untouched exactly where a switch would fall through to its default.
pub fn apply(
    op: Aggregation,
    kind: FieldKind,
    dst: &mut FieldValue,
    src: &mut FieldValue,
    arena: &mut Arena,
) {
    match op {
        Aggregation::None => {}
        Aggregation::Sum | Aggregation::TimeAvg => {
            if src.cnt < 2 {
                add_wrapping(kind, dst, src);
            } else {
                add_sum_of_avg(kind, dst, src);
            }
        }
        Aggregation::Avg => {
            dst.cnt = dst.cnt.wrapping_add(src.cnt);
            add_wrapping(kind, dst, src);
        }
        Aggregation::Max => add_max(kind, dst, src, arena),
        Aggregation::Min => {
            // First non-defaulted contribution initializes the cell.
            if src.cnt != 0 {
                if dst.cnt == 0 {
                    add_wrapping(kind, dst, src);
                    dst.cnt += 1;
                } else {
                    add_min(kind, dst, src);
                }
            }
        }
    }
}

/// In-place wrapping add over the summable kinds.
fn add_wrapping(kind: FieldKind, dst: &mut FieldValue, src: &FieldValue) {
    if !kind.is_summable() {
        return;
    }
    if let (ValueData::Double(a), ValueData::Double(b)) = (&mut dst.data, src.data) {
        *a += b;
        return;
    }
    int_pairwise!(dst, src, wrapping_add);
}

/// Merge variant used when the source already aggregates `src.cnt >= 2`
/// samples: re-normalize both sides to averages, sum, and collapse the
/// counts to 1. Integer division truncates toward zero.
fn add_sum_of_avg(kind: FieldKind, dst: &mut FieldValue, src: &mut FieldValue) {
    let cnt1 = dst.cnt;
    let cnt2 = src.cnt.max(1);

    if kind.is_summable() {
        macro_rules! arm {
            ($a:expr, $b:expr, $t:ty) => {{
                let mut acc = *$a as i128;
                if cnt1 > 1 {
                    acc /= cnt1 as i128;
                }
                let add = ($b as i128) / (cnt2 as i128);
                *$a = acc.wrapping_add(add) as $t;
            }};
        }
        match (&mut dst.data, src.data) {
            (ValueData::I8(a), ValueData::I8(b)) => arm!(a, b, i8),
            (ValueData::I16(a), ValueData::I16(b)) => arm!(a, b, i16),
            (ValueData::I32(a), ValueData::I32(b)) => arm!(a, b, i32),
            (ValueData::I64(a), ValueData::I64(b)) => arm!(a, b, i64),
            (ValueData::U8(a), ValueData::U8(b)) => arm!(a, b, u8),
            (ValueData::U16(a), ValueData::U16(b)) => arm!(a, b, u16),
            (ValueData::U32(a), ValueData::U32(b)) => arm!(a, b, u32),
            (ValueData::U64(a), ValueData::U64(b)) => arm!(a, b, u64),
            (ValueData::Double(a), ValueData::Double(b)) => {
                if cnt1 > 1 {
                    *a /= cnt1 as f64;
                }
                *a += b / cnt2 as f64;
            }
            _ => {}
        }
    }

    src.cnt = 1;
    dst.cnt = 1;
}

/// Numeric max; char/byte buffers take the source bytes and length.
fn add_max(kind: FieldKind, dst: &mut FieldValue, src: &FieldValue, _arena: &mut Arena) {
    if matches!(kind, FieldKind::CharBuf | FieldKind::ByteBuf) {
        // The source handle already lives in the active slab.
        dst.data = src.data;
        return;
    }
    if !kind.is_summable() {
        return;
    }
    if let (ValueData::Double(a), ValueData::Double(b)) = (&mut dst.data, src.data) {
        *a = a.max(b);
        return;
    }
    int_pairwise!(dst, src, max);
}

/// Numeric min; never reachable for char/byte buffers from a well-formed
/// configuration.
fn add_min(kind: FieldKind, dst: &mut FieldValue, src: &FieldValue) {
    if matches!(kind, FieldKind::CharBuf | FieldKind::ByteBuf) {
        debug_assert!(false, "min over string columns is not supported");
        return;
    }
    if !kind.is_summable() {
        return;
    }
    if let (ValueData::Double(a), ValueData::Double(b)) = (&mut dst.data, src.data) {
        *a = a.min(b);
        return;
    }
    int_pairwise!(dst, src, min);
}
