pub mod aggregate;
pub mod error;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::{ColumnSpec, OutputFormat, TableMode};
use crate::event::{EventLike, SnapshotEvent, ThreadProvider};
use crate::fields::{
    EventFilter, ExtractorFactory, FieldExtractor, FieldInfo, FieldKind, FilterCompiler,
    PrintFormat, RawValue,
};
use crate::present::{self, ColumnMeta, SampleView};
use crate::render;
use crate::value::{Arena, FieldValue, ValueData};

use aggregate::Aggregation;
pub use error::TableError;

/// Refresh interval forced onto list tables to keep them responsive.
const LIST_REFRESH_INTERVAL_NS: u64 = 200_000_000;

/// External collaborators a table needs: field resolution, filter
/// compilation and the thread table walked at each flush.
pub struct Providers {
    pub fields: Arc<dyn ExtractorFactory>,
    pub filters: Arc<dyn FilterCompiler>,
    pub threads: Arc<dyn ThreadProvider>,
}

/// One configured column: the compiled extractor plus both aggregation
/// operators and the extractor's declared field info.
struct BoundColumn {
    extractor: Box<dyn FieldExtractor>,
    aggregation: Aggregation,
    merge_aggregation: Aggregation,
    info: FieldInfo,
}

/// One materialized sample row: the key plus the payload columns.
#[derive(Debug, Clone)]
pub struct SampleRow {
    pub key: FieldValue,
    pub values: Vec<FieldValue>,
}

struct TableRow {
    key: FieldValue,
    vals: Vec<FieldValue>,
}

/// Which column/kind/legend vectors are live: the ingestion view or the
/// group-by merge view constructed at flush time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewKind {
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleSel {
    Full,
    Filtered,
}

/// Streaming aggregation table over a structured event stream.
///
/// Ingests events between flush boundaries, keyed by the configured key
/// column (or an inserted synthetic counter for lists), and materializes a
/// sorted sample at each flush. Single-threaded by contract; the caller
/// serializes ingestion, flushes and sample reads.
pub struct Table {
    mode: TableMode,
    output: OutputFormat,
    refresh_interval_ns: u64,
    next_flush_ns: u64,
    prev_flush_ns: u64,
    use_defaults: bool,
    paused: bool,

    providers: Providers,
    filter: Option<Box<dyn EventFilter>>,
    freetext_filter: String,

    // Pre-merge columns; index 0 is always the key.
    pre_columns: Vec<BoundColumn>,
    pre_kinds: Vec<FieldKind>,
    pre_legend: Vec<FieldInfo>,

    // Group-by view: positions into the pre-merge layout, group-by key
    // first (0 addresses the pre-merge key itself).
    post_cols: Vec<usize>,
    post_kinds: Vec<FieldKind>,
    post_legend: Vec<FieldInfo>,
    merging: bool,

    view: ViewKind,

    arena: Arena,
    pre_table: HashMap<Vec<u8>, TableRow>,
    post_table: HashMap<Vec<u8>, TableRow>,

    scratch: Vec<FieldValue>,
    post_scratch: Vec<FieldValue>,
    raw_scratch: Vec<RawValue>,

    full_sample: Vec<SampleRow>,
    filtered_sample: Vec<SampleRow>,
    sample_sel: SampleSel,

    /// 0-based index into a row's payload values; -1 means unsorted.
    sorting_col: i32,
    sorting_ascending: bool,
    just_sorted: bool,

    json_first_row: usize,
    json_last_row: usize,
    json_output_lines: usize,
}

impl Table {
    pub fn new(
        providers: Providers,
        mode: TableMode,
        refresh_interval_ns: u64,
        output: OutputFormat,
    ) -> Self {
        Self {
            mode,
            output,
            refresh_interval_ns,
            next_flush_ns: 0,
            prev_flush_ns: 0,
            use_defaults: false,
            paused: false,
            providers,
            filter: None,
            freetext_filter: String::new(),
            pre_columns: Vec::new(),
            pre_kinds: Vec::new(),
            pre_legend: Vec::new(),
            post_cols: Vec::new(),
            post_kinds: Vec::new(),
            post_legend: Vec::new(),
            merging: false,
            view: ViewKind::Pre,
            arena: Arena::new(),
            pre_table: HashMap::new(),
            post_table: HashMap::new(),
            scratch: Vec::new(),
            post_scratch: Vec::new(),
            raw_scratch: Vec::new(),
            full_sample: Vec::new(),
            filtered_sample: Vec::new(),
            sample_sel: SampleSel::Full,
            sorting_col: -1,
            sorting_ascending: false,
            just_sorted: true,
            json_first_row: 0,
            json_last_row: 0,
            json_output_lines: 0,
        }
    }

    /// Binds the column list and optional filter. Must be called exactly
    /// once before ingestion.
    pub fn configure(
        &mut self,
        columns: &[ColumnSpec],
        filter: &str,
        use_defaults: bool,
        view_depth: u32,
    ) -> Result<(), TableError> {
        self.use_defaults = use_defaults;

        // Lists refresh fast regardless of the configured cadence.
        if self.mode == TableMode::List {
            self.refresh_interval_ns = LIST_REFRESH_INTERVAL_NS;
        }

        if !filter.is_empty() {
            let compiled = self
                .providers
                .filters
                .compile(filter)
                .map_err(|e| TableError::Filter(e.to_string()))?;
            self.filter = Some(compiled);
        }

        self.pre_columns.clear();
        let mut key_seen = false;

        for spec in columns {
            let extractor = self
                .providers
                .fields
                .new_extractor(&spec.field, view_depth)
                .ok_or_else(|| TableError::InvalidFieldName(spec.field.clone()))?;

            let info = extractor.field_info().clone();
            if !info.kind.is_column_kind() {
                return Err(TableError::InvalidFieldKind(spec.field.clone()));
            }

            let col = BoundColumn {
                extractor,
                aggregation: spec.aggregation,
                merge_aggregation: Aggregation::None,
                info,
            };

            if spec.is_key {
                if key_seen {
                    return Err(TableError::MultipleKeys);
                }
                self.pre_columns.insert(0, col);
                key_seen = true;
            } else {
                self.pre_columns.push(col);
            }
        }

        match self.mode {
            TableMode::Table => {
                if !key_seen {
                    return Err(TableError::MissingKey);
                }
            }
            TableMode::List => {
                if key_seen {
                    return Err(TableError::ListHasKey);
                }
                // Lists get a synthetic counter key so the key-at-zero
                // invariant holds uniformly.
                let extractor = self
                    .providers
                    .fields
                    .new_extractor("util.cnt", view_depth)
                    .ok_or(TableError::Internal)?;
                let info = extractor.field_info().clone();
                self.pre_columns.insert(
                    0,
                    BoundColumn {
                        extractor,
                        aggregation: Aggregation::None,
                        merge_aggregation: Aggregation::None,
                        info,
                    },
                );
            }
        }

        if self.pre_columns.len() < 2 {
            return Err(TableError::EmptyTable);
        }

        self.pre_kinds = self.pre_columns.iter().map(|c| c.info.kind).collect();
        self.pre_legend = self.pre_columns.iter().map(|c| c.info.clone()).collect();
        self.scratch = vec![FieldValue::new(ValueData::U64(0), 0); self.pre_columns.len()];

        self.configure_groupby(columns)?;

        info!(
            mode = ?self.mode,
            columns = self.pre_columns.len(),
            groupby = self.merging,
            filtered = self.filter.is_some(),
            "table configured",
        );

        Ok(())
    }

    fn configure_groupby(&mut self, columns: &[ColumnSpec]) -> Result<(), TableError> {
        let n_gby_keys = columns.iter().filter(|c| c.is_groupby_key).count();
        if n_gby_keys == 0 {
            self.merging = false;
            return Ok(());
        }
        if n_gby_keys > 1 {
            return Err(TableError::MultipleGroupByKeys);
        }
        if self.mode != TableMode::Table {
            return Err(TableError::ListGroupBy);
        }

        self.merging = true;
        self.post_cols.clear();
        let mut gby_seen = false;

        // Position of each configured column in the pre-merge layout,
        // where the key was moved to the front.
        let mut premerge_pos = 1usize;
        for spec in columns {
            let pos = if spec.is_key {
                continue;
            } else {
                let p = premerge_pos;
                premerge_pos += 1;
                p
            };

            self.pre_columns[pos].merge_aggregation = spec.groupby_aggregation;

            if spec.is_groupby_key {
                if gby_seen {
                    return Err(TableError::MultipleGroupByKeys);
                }
                gby_seen = true;
                self.post_cols.insert(0, pos);
            } else {
                self.post_cols.push(pos);
            }
        }

        if !gby_seen {
            return Err(TableError::MissingGroupByKey);
        }
        if self.post_cols.len() < 2 {
            return Err(TableError::GroupByHasNoValues);
        }

        self.post_kinds = self
            .post_cols
            .iter()
            .map(|&i| self.pre_columns[i].info.kind)
            .collect();
        self.post_legend = self
            .post_cols
            .iter()
            .map(|&i| self.pre_columns[i].info.clone())
            .collect();
        self.post_scratch =
            vec![FieldValue::new(ValueData::U64(0), 0); self.post_cols.len()];

        Ok(())
    }

    /// Runs the event through the filter and the column extractors, then
    /// folds it into the table. Extraction misses silently drop the event
    /// (or substitute the kind's default when configured).
    pub fn process_event(&mut self, evt: &dyn EventLike) {
        if self.pre_columns.is_empty() {
            return;
        }

        if let Some(filter) = self.filter.as_mut() {
            if !filter.run(evt) {
                return;
            }
        }

        for j in 0..self.pre_columns.len() {
            let kind = self.pre_columns[j].info.kind;
            self.raw_scratch.clear();
            let hit = self.pre_columns[j]
                .extractor
                .extract(evt, &mut self.raw_scratch);

            let value = if hit && !self.raw_scratch.is_empty() {
                // Only the first extracted value is consumed.
                match FieldValue::decode(kind, &self.raw_scratch[0].bytes, &mut self.arena) {
                    Some(v) => v,
                    None => return,
                }
            } else if self.use_defaults {
                match default_value(&self.pre_columns[j].info, &mut self.arena) {
                    Some(v) => v,
                    None => return,
                }
            } else {
                return;
            };

            self.scratch[j] = value;
        }

        self.add_row(false);
    }

    /// Feeds one synthetic snapshot event per live thread through the
    /// filter and the normal ingestion path, so durable per-thread state
    /// shows up once per flush even without events.
    fn process_thread_table(&mut self, evt: &dyn EventLike) {
        let ts = evt.ts();
        let threads = Arc::clone(&self.providers.threads);
        threads.for_each_thread(&mut |tinfo| {
            let snapshot = SnapshotEvent::new(ts, tinfo);
            if let Some(filter) = self.filter.as_mut() {
                if !filter.run(&snapshot) {
                    return true;
                }
            }
            self.process_event(&snapshot);
            true
        });
    }

    fn add_row(&mut self, merging: bool) {
        if self.mode == TableMode::List {
            if self.paused {
                return;
            }
            let mut key = self.scratch[0];
            key.cnt = 1;
            let mut values = Vec::with_capacity(self.scratch.len() - 1);
            for v in &self.scratch[1..] {
                let mut v = *v;
                v.cnt = 1;
                values.push(v);
            }
            self.full_sample.push(SampleRow { key, values });
            return;
        }

        let n_fields = if merging {
            self.post_cols.len()
        } else {
            self.pre_columns.len()
        };

        let mut key = if merging {
            self.post_scratch[0]
        } else {
            self.scratch[0]
        };
        key.cnt = 1;
        let key_bytes = key.key_bytes(&self.arena);

        let table = if merging {
            &mut self.post_table
        } else {
            &mut self.pre_table
        };

        match table.entry(key_bytes) {
            Entry::Vacant(slot) => {
                let mut vals = Vec::with_capacity(n_fields - 1);
                for j in 1..n_fields {
                    vals.push(if merging {
                        self.post_scratch[j]
                    } else {
                        self.scratch[j]
                    });
                }
                slot.insert(TableRow { key, vals });
            }
            Entry::Occupied(slot) => {
                let row = slot.into_mut();
                for j in 1..n_fields {
                    let (op, kind) = if merging {
                        let col = &self.pre_columns[self.post_cols[j]];
                        (col.merge_aggregation, col.info.kind)
                    } else {
                        let col = &self.pre_columns[j];
                        (col.aggregation, col.info.kind)
                    };
                    let mut src = if merging {
                        self.post_scratch[j]
                    } else {
                        self.scratch[j]
                    };
                    aggregate::apply(op, kind, &mut row.vals[j - 1], &mut src, &mut self.arena);
                }
            }
        }
    }

    /// Flush boundary: snapshot the thread table, apply the group-by merge
    /// when configured, materialize the sample and advance the flush clock.
    ///
    /// Nothing is emitted on the very first tick; it only arms the clock.
    pub fn flush(&mut self, evt: &dyn EventLike) {
        if !self.paused && self.next_flush_ns != 0 {
            self.process_thread_table(evt);

            if self.merging {
                self.view = ViewKind::Post;
            }

            self.create_sample();

            if self.mode == TableMode::Table {
                // Keep the sample just produced readable by the consumer:
                // swap slabs and recycle the one that backed the sample
                // before last.
                self.arena.swap();
                self.arena.clear();
            }

            self.pre_table.clear();
            self.post_table.clear();

            debug!(
                ts = evt.ts(),
                rows = self.full_sample.len(),
                "flushed sample",
            );
        }

        let ts = evt.ts();
        self.prev_flush_ns = self.next_flush_ns;
        self.next_flush_ns = ts - (ts % self.refresh_interval_ns) + self.refresh_interval_ns;
    }

    fn create_sample(&mut self) {
        if self.mode != TableMode::Table {
            // Lists accumulate their sample during ingestion.
            return;
        }

        self.full_sample.clear();

        if self.merging {
            self.post_table.clear();

            let pre = std::mem::take(&mut self.pre_table);
            for row in pre.values() {
                for j in 0..self.post_cols.len() {
                    let col = self.post_cols[j];
                    self.post_scratch[j] = if col == 0 {
                        row.key
                    } else {
                        row.vals[col - 1]
                    };
                }
                self.add_row(true);
            }
            self.pre_table = pre;
        }

        let table = if self.merging {
            &self.post_table
        } else {
            &self.pre_table
        };

        for row in table.values() {
            self.full_sample.push(SampleRow {
                key: row.key,
                values: row.vals.clone(),
            });
        }
    }

    /// Filters, sorts and (for RAW/JSON outputs) prints the current
    /// sample, then restores the ingestion view. Returns the sample rows.
    pub fn get_sample(&mut self, time_delta: u64) -> Result<&[SampleRow], TableError> {
        let mut out = io::stdout();
        self.get_sample_to(time_delta, &mut out)
    }

    /// Same as [`Table::get_sample`] with an explicit output sink.
    pub fn get_sample_to(
        &mut self,
        time_delta: u64,
        out: &mut dyn Write,
    ) -> Result<&[SampleRow], TableError> {
        if !self.paused {
            if !self.freetext_filter.is_empty() {
                self.filter_sample();
                self.sample_sel = SampleSel::Filtered;
            } else {
                self.sample_sel = SampleSel::Full;
            }
            self.sort_sample()?;
        }

        if self.pre_columns.is_empty() {
            // Not configured yet; nothing to render.
            self.view = ViewKind::Pre;
            return Ok(self.sample());
        }

        match self.output {
            OutputFormat::Raw => {
                let view = self.sample_view();
                present::print_raw(&view, time_delta, out)?;
            }
            OutputFormat::Json => {
                let len = self.sample().len();
                if len > 0 && (self.json_last_row == 0 || self.json_last_row >= len - 1) {
                    self.json_last_row = len - 1;
                }
                let (first, last) = (self.json_first_row, self.json_last_row);
                let lines = {
                    let view = self.sample_view();
                    present::print_json(&view, time_delta, first, last, out)?
                };
                self.json_output_lines = lines;
            }
            OutputFormat::External => {}
        }

        // Ingestion always proceeds against the pre-merge view.
        self.view = ViewKind::Pre;

        Ok(self.sample())
    }

    /// The currently selected sample (filtered or full).
    pub fn sample(&self) -> &[SampleRow] {
        match self.sample_sel {
            SampleSel::Full => &self.full_sample,
            SampleSel::Filtered => &self.filtered_sample,
        }
    }

    fn filter_sample(&mut self) {
        self.filtered_sample.clear();

        for row in &self.full_sample {
            for (j, value) in row.values.iter().enumerate() {
                let kind = if self.merging {
                    self.post_kinds[j + 1]
                } else {
                    self.pre_kinds[j + 1]
                };
                if !kind.is_text_matchable() {
                    continue;
                }

                let legend = if self.merging {
                    &self.post_legend
                } else {
                    &self.pre_legend
                };
                let pf = legend[j + 1].print_format;
                let rendered = render::render_str(kind, pf, value, &self.arena, 0);
                if rendered.contains(&self.freetext_filter) {
                    self.filtered_sample.push(row.clone());
                    break;
                }
            }
        }
    }

    /// Returns the key of the first row whose rendered text values contain
    /// `text`, scanning the unfiltered sample.
    pub fn search_in_sample(&self, text: &str) -> Option<FieldValue> {
        for row in &self.full_sample {
            for (j, value) in row.values.iter().enumerate() {
                // When merging, value kinds resolve through the pre-merge
                // vector shifted past the original key and the group-by
                // key. See DESIGN.md on this indexing rule.
                let kind = if self.merging {
                    self.pre_kinds[j + 2]
                } else {
                    self.pre_kinds[j + 1]
                };
                if !kind.is_text_matchable() {
                    continue;
                }

                let legend = if self.merging {
                    &self.post_legend
                } else {
                    &self.pre_legend
                };
                let pf = legend[j + 1].print_format;
                let rendered = render::render_str(kind, pf, value, &self.arena, 0);
                if rendered.contains(text) {
                    return Some(row.key);
                }
            }
        }
        None
    }

    fn sort_sample(&mut self) -> Result<(), TableError> {
        if self.mode == TableMode::List {
            // Lists only re-sort after an explicit column selection.
            if self.sorting_col < 0 || !self.just_sorted {
                return Ok(());
            }
            self.just_sorted = false;
        }

        if self.sorting_col < 0 {
            return Ok(());
        }
        let col = self.sorting_col as usize;

        let mut rows = match self.sample_sel {
            SampleSel::Full => std::mem::take(&mut self.full_sample),
            SampleSel::Filtered => std::mem::take(&mut self.filtered_sample),
        };

        if !rows.is_empty() {
            if col >= rows[0].values.len() {
                // Put the rows back before surfacing the error.
                match self.sample_sel {
                    SampleSel::Full => self.full_sample = rows,
                    SampleSel::Filtered => self.filtered_sample = rows,
                }
                return Err(TableError::InvalidSortingColumn);
            }

            let arena = &self.arena;
            let ascending = self.sorting_ascending;
            rows.sort_by(|a, b| {
                let x = &a.values[col];
                let y = &b.values[col];
                let ord = if x.cnt > 1 || y.cnt > 1 {
                    // Average-of-average comparison.
                    x.scaled_f64()
                        .partial_cmp(&y.scaled_f64())
                        .unwrap_or(std::cmp::Ordering::Equal)
                } else {
                    x.compare(y, arena)
                };
                if ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        match self.sample_sel {
            SampleSel::Full => self.full_sample = rows,
            SampleSel::Filtered => self.filtered_sample = rows,
        }

        Ok(())
    }

    /// Selects the sorting column. Column 0 is the key: forbidden for
    /// keyed tables, disables sorting for lists. Re-selecting the current
    /// column toggles the direction.
    pub fn set_sorting_col(&mut self, col: usize) -> Result<(), TableError> {
        let (n_fields, kinds) = if self.merging {
            (self.post_cols.len(), &self.post_kinds)
        } else {
            (self.pre_columns.len(), &self.pre_kinds)
        };

        if col == 0 {
            if self.mode == TableMode::Table {
                return Err(TableError::InvalidSortingColumn);
            }
            self.sorting_col = -1;
            return Ok(());
        }

        if col >= n_fields {
            return Err(TableError::InvalidSortingColumn);
        }

        if col as i32 == self.sorting_col + 1 {
            self.sorting_ascending = !self.sorting_ascending;
        } else {
            self.sorting_ascending = !kinds[col].sorts_descending_by_default();
        }

        self.just_sorted = true;
        self.sorting_col = col as i32 - 1;
        Ok(())
    }

    /// Currently selected sorting column, 1-based; 0 means unsorted.
    pub fn get_sorting_col(&self) -> usize {
        (self.sorting_col + 1) as usize
    }

    /// Key of row `rownum` in the current sample.
    pub fn get_row_key(&self, rownum: usize) -> Option<&FieldValue> {
        self.sample().get(rownum).map(|r| &r.key)
    }

    /// Position of the row whose key matches `key` byte for byte.
    pub fn get_row_from_key(&self, key: &FieldValue) -> Option<usize> {
        let needle = key.key_bytes(&self.arena);
        self.sample().iter().position(|row| {
            row.key.len() == key.len() && row.key.key_bytes(&self.arena) == needle
        })
    }

    /// Key column field info and the rendered key of row `rownum`. Out of
    /// range rows yield an empty value; the info is still returned when
    /// `force` is set.
    pub fn get_row_key_name_and_val(
        &self,
        rownum: usize,
        force: bool,
    ) -> (Option<FieldInfo>, String) {
        let (kinds, legend) = if self.merging {
            (&self.post_kinds, &self.post_legend)
        } else {
            (&self.pre_kinds, &self.pre_legend)
        };

        match self.sample().get(rownum) {
            None => {
                let info = if force { legend.first().cloned() } else { None };
                (info, String::new())
            }
            Some(row) => {
                let info = legend.first().cloned();
                let rendered = render::render_str(
                    kinds[0],
                    legend[0].print_format,
                    &row.key,
                    &self.arena,
                    0,
                );
                (info, rendered)
            }
        }
    }

    /// Empties a list table's accumulated sample and its active slab.
    pub fn clear(&mut self) {
        if self.mode == TableMode::List {
            self.full_sample.clear();
            self.arena.clear();
        } else {
            warn!("clear() is only valid for list tables");
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_refresh_interval(&mut self, refresh_interval_ns: u64) {
        self.refresh_interval_ns = refresh_interval_ns;
    }

    pub fn refresh_interval_ns(&self) -> u64 {
        self.refresh_interval_ns
    }

    pub fn set_freetext_filter(&mut self, filter: &str) {
        self.freetext_filter = filter.to_string();
    }

    /// Row range emitted by the JSON presenter.
    pub fn set_json_rows(&mut self, first: usize, last: usize) {
        self.json_first_row = first;
        self.json_last_row = last;
    }

    /// Rows emitted by the last JSON print.
    pub fn json_output_lines_count(&self) -> usize {
        self.json_output_lines
    }

    pub fn next_flush_time_ns(&self) -> u64 {
        self.next_flush_ns
    }

    pub fn prev_flush_time_ns(&self) -> u64 {
        self.prev_flush_ns
    }

    pub fn mode(&self) -> TableMode {
        self.mode
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    /// Arena backing the sample's buffer values; external renderers
    /// resolve handles through it.
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Legend of the active view (key first).
    pub fn legend(&self) -> &[FieldInfo] {
        self.active_legend()
    }

    /// Kinds of the active view (key first).
    pub fn kinds(&self) -> &[FieldKind] {
        match self.view {
            ViewKind::Pre => &self.pre_kinds,
            ViewKind::Post => &self.post_kinds,
        }
    }

    fn active_legend(&self) -> &[FieldInfo] {
        match self.view {
            ViewKind::Pre => &self.pre_legend,
            ViewKind::Post => &self.post_legend,
        }
    }

    fn view_column(&self, idx: usize) -> &BoundColumn {
        match self.view {
            ViewKind::Pre => &self.pre_columns[idx],
            ViewKind::Post => &self.pre_columns[self.post_cols[idx]],
        }
    }

    fn sample_view(&self) -> SampleView<'_> {
        let kinds = self.kinds();
        let legend = self.active_legend();

        let mut columns = Vec::with_capacity(kinds.len().saturating_sub(1));
        for j in 1..kinds.len() {
            let col = self.view_column(j);
            columns.push(ColumnMeta {
                kind: kinds[j],
                print_format: legend[j].print_format,
                time_scaled: col.aggregation.is_time_scaled()
                    || col.merge_aggregation.is_time_scaled(),
            });
        }

        SampleView {
            rows: self.sample(),
            key: ColumnMeta {
                kind: kinds[0],
                print_format: legend[0].print_format,
                time_scaled: false,
            },
            columns,
            arena: &self.arena,
        }
    }
}

/// Type-specific default substituted when extraction misses and defaults
/// are enabled. `None` means the row is dropped instead.
fn default_value(info: &FieldInfo, arena: &mut Arena) -> Option<FieldValue> {
    let data = match info.kind {
        FieldKind::Int8 => ValueData::I8(0),
        FieldKind::Int16 => ValueData::I16(0),
        FieldKind::Int32 => ValueData::I32(0),
        FieldKind::Int64 => ValueData::I64(0),
        FieldKind::Uint8 => ValueData::U8(0),
        FieldKind::Uint16 => ValueData::U16(0),
        FieldKind::Uint32 | FieldKind::Bool => ValueData::U32(0),
        FieldKind::Uint64 | FieldKind::RelTime | FieldKind::AbsTime => ValueData::U64(0),
        FieldKind::Double => ValueData::Double(0.0),
        FieldKind::CharBuf => ValueData::Buf(arena.copy(&[0u8])),
        _ => return None,
    };

    // Integer defaults only exist for plainly printed columns.
    if info.kind != FieldKind::Double
        && info.kind != FieldKind::CharBuf
        && info.print_format != PrintFormat::Dec
    {
        return None;
    }

    Some(FieldValue::new(data, 0))
}
