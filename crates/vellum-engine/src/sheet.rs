// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::colorize::Colorizer;
use crate::column::Column;
use crate::error::InvariantViolation;
use crate::row::{Row, RowId};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SHEET_ID: AtomicU64 = AtomicU64::new(1);

/// Stable sheet identity, independent of stack position. Background
/// tasks hold these instead of references into the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SheetId(u64);

pub type Loader = Arc<dyn Fn() -> Result<Vec<Row>> + Send + Sync>;

/// Row storage with an explicit never-loaded sentinel. `Unloaded` is
/// distinct from a loaded-but-empty vector: pushing an unloaded sheet
/// triggers its loader, pushing an empty one does not.
#[derive(Debug, Default)]
pub enum RowSet {
    #[default]
    Unloaded,
    Loaded(Vec<Row>),
}

impl RowSet {
    pub fn as_slice(&self) -> &[Row] {
        match self {
            Self::Unloaded => &[],
            Self::Loaded(rows) => rows,
        }
    }
}

/// Position and width of one laid-out column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEntry {
    /// Index into the visible-column subsequence.
    pub vis_index: usize,
    /// Index into the raw column list.
    pub col_index: usize,
    pub x: u16,
    pub width: u16,
}

#[derive(Debug, Clone, Default)]
pub struct ColLayout {
    pub entries: Vec<LayoutEntry>,
    /// Visible-column index of the last column that fit on screen.
    pub right_vis_col: usize,
}

/// The central entity: rows, columns (first `n_keys` pinned), cursor,
/// viewport offsets, selection, per-sheet key bindings, colorizers, and
/// an optional reload hook.
pub struct Sheet {
    id: SheetId,
    pub name: String,
    rows: RowSet,
    pub columns: Vec<Column>,
    pub n_keys: usize,
    pub cursor_row: usize,
    /// Indexes the visible (non-hidden) column subsequence.
    pub cursor_vis_col: usize,
    pub top_row: usize,
    pub left_vis_col: usize,
    selection: HashMap<RowId, Row>,
    bindings: HashMap<String, String>,
    pub colorizers: Vec<Colorizer>,
    loader: Option<Loader>,
}

impl Sheet {
    pub fn new(name: &str, columns: Vec<Column>) -> Self {
        let mut sheet = Self {
            id: SheetId(NEXT_SHEET_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.to_owned(),
            rows: RowSet::Unloaded,
            columns,
            n_keys: 0,
            cursor_row: 0,
            cursor_vis_col: 0,
            top_row: 0,
            left_vis_col: 0,
            selection: HashMap::new(),
            bindings: HashMap::new(),
            colorizers: Vec::new(),
            loader: None,
        };
        sheet.recalc();
        sheet
    }

    pub fn with_loader(mut self, loader: Loader) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Build an already-loaded sheet from in-memory rows.
    pub fn with_rows(mut self, rows: Vec<Row>) -> Self {
        self.rows = RowSet::Loaded(rows);
        self
    }

    pub fn id(&self) -> SheetId {
        self.id
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.rows, RowSet::Loaded(_))
    }

    pub fn has_loader(&self) -> bool {
        self.loader.is_some()
    }

    pub fn loader(&self) -> Option<Loader> {
        self.loader.clone()
    }

    pub fn rows(&self) -> &[Row] {
        self.rows.as_slice()
    }

    pub fn n_rows(&self) -> usize {
        self.rows.as_slice().len()
    }

    /// Mutable row access; a never-loaded sheet becomes loaded-empty.
    pub fn rows_mut(&mut self) -> &mut Vec<Row> {
        if let RowSet::Unloaded = self.rows {
            self.rows = RowSet::Loaded(Vec::new());
        }
        match &mut self.rows {
            RowSet::Loaded(rows) => rows,
            RowSet::Unloaded => unreachable!(),
        }
    }

    pub fn set_rows(&mut self, rows: Vec<Row>) {
        self.rows = RowSet::Loaded(rows);
    }

    /// Run the bound loader synchronously. Sheets without one are
    /// purely derived; reloading them is a no-op.
    pub fn reload(&mut self) -> Result<()> {
        if let Some(loader) = self.loader.clone() {
            self.set_rows(loader()?);
            self.recalc();
        }
        Ok(())
    }

    /// Clear every column's value cache and re-bind back-references.
    /// Called after structural changes.
    pub fn recalc(&mut self) {
        let id = self.id;
        for column in &mut self.columns {
            column.clear_cache();
            column.sheet = Some(id);
        }
    }

    // ---- columns ----

    /// Raw indices of the visible (non-hidden) columns, key columns
    /// first by construction.
    pub fn visible_col_indices(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, column)| !column.hidden())
            .map(|(index, _)| index)
            .collect()
    }

    pub fn n_visible_cols(&self) -> usize {
        self.columns.iter().filter(|column| !column.hidden()).count()
    }

    pub fn n_visible_keys(&self) -> usize {
        self.columns[..self.n_keys.min(self.columns.len())]
            .iter()
            .filter(|column| !column.hidden())
            .count()
    }

    /// The column under the cursor.
    pub fn cursor_col_index(&self) -> Option<usize> {
        self.visible_col_indices().get(self.cursor_vis_col).copied()
    }

    pub fn cursor_col(&self) -> Option<&Column> {
        self.cursor_col_index().map(|index| &self.columns[index])
    }

    /// The row under the cursor.
    pub fn cursor_row_handle(&self) -> Option<Row> {
        self.rows().get(self.cursor_row).cloned()
    }

    /// Promote a column into the pinned key region, or demote it back
    /// out. Promotion moves it to the end of the key block; demotion to
    /// the front of the non-key block.
    pub fn toggle_key_column(&mut self, col_index: usize) {
        if col_index >= self.columns.len() {
            return;
        }
        if col_index >= self.n_keys {
            let column = self.columns.remove(col_index);
            self.columns.insert(self.n_keys, column);
            self.n_keys += 1;
        } else {
            let column = self.columns.remove(col_index);
            self.n_keys -= 1;
            self.columns.insert(self.n_keys, column);
        }
    }

    // ---- cursor & viewport ----

    pub fn cursor_down(&mut self, n: isize) {
        self.cursor_row = add_clamped(self.cursor_row, n);
    }

    pub fn cursor_right(&mut self, n: isize) {
        self.cursor_vis_col = add_clamped(self.cursor_vis_col, n);
    }

    /// Clamp the cursor into bounds and scroll the viewport so the
    /// cursor cell stays rendered. Called once per main-loop iteration,
    /// not after every mutation, so multi-step commands pay for one
    /// clamp. Key columns are always in view, so horizontal scrolling
    /// never hides them.
    pub fn check_cursor(&mut self, area_width: u16, n_screen_rows: usize) {
        let n_rows = self.n_rows();
        self.cursor_row = self.cursor_row.min(n_rows.saturating_sub(1));
        if self.cursor_row < self.top_row {
            self.top_row = self.cursor_row;
        } else if n_screen_rows > 0 && self.cursor_row >= self.top_row + n_screen_rows {
            self.top_row = self.cursor_row + 1 - n_screen_rows;
        }

        let n_vis = self.n_visible_cols();
        if n_vis == 0 {
            self.cursor_vis_col = 0;
            self.left_vis_col = 0;
            return;
        }
        self.cursor_vis_col = self.cursor_vis_col.min(n_vis - 1);
        self.left_vis_col = self.left_vis_col.min(n_vis - 1);

        let n_vis_keys = self.n_visible_keys();
        if self.cursor_vis_col < n_vis_keys {
            return;
        }
        if self.cursor_vis_col < self.left_vis_col {
            self.left_vis_col = self.cursor_vis_col;
            return;
        }
        while self.left_vis_col < self.cursor_vis_col {
            let layout = self.calc_col_layout(area_width, n_screen_rows);
            if self.cursor_vis_col <= layout.right_vis_col {
                break;
            }
            self.left_vis_col += 1;
        }
    }

    /// Recompute (x, width) per visible column, left to right, until the
    /// running offset exceeds the area width. Key columns lay out first;
    /// the scroll window starts at `left_vis_col`. Columns with no width
    /// yet are auto-sized from the rows currently on screen (name width
    /// alone when none are).
    pub fn calc_col_layout(&mut self, area_width: u16, n_screen_rows: usize) -> ColLayout {
        let visible = self.visible_col_indices();
        if visible.is_empty() {
            return ColLayout::default();
        }
        let n_vis_keys = self.n_visible_keys();
        let first_scrolled = self.left_vis_col.clamp(n_vis_keys, visible.len());

        let screen_rows: Vec<Row> = self
            .rows()
            .iter()
            .skip(self.top_row)
            .take(n_screen_rows.max(1))
            .cloned()
            .collect();

        let mut layout = ColLayout::default();
        let mut x: u16 = 0;
        let order = (0..n_vis_keys).chain(first_scrolled..visible.len());
        for vis_index in order {
            if x >= area_width {
                break;
            }
            let col_index = visible[vis_index];
            let width = match self.columns[col_index].width {
                Some(width) => width,
                None => {
                    let sized = self.columns[col_index].max_width(&screen_rows);
                    self.columns[col_index].width = Some(sized);
                    sized
                }
            };
            let remaining = area_width - x;
            layout.entries.push(LayoutEntry {
                vis_index,
                col_index,
                x,
                width: width.min(remaining),
            });
            layout.right_vis_col = vis_index;
            x = x.saturating_add(width).saturating_add(1);
        }
        layout
    }

    /// Page the scroll window left, keeping the cursor's position
    /// relative to the window. When the rightmost column is the last
    /// column and screen width is left over, the window keeps expanding
    /// leftward until another column would be clipped.
    pub fn page_left(&mut self, area_width: u16, n_screen_rows: usize) {
        let visible = self.visible_col_indices();
        let n_vis_keys = self.n_visible_keys();
        if visible.len() <= n_vis_keys {
            return;
        }
        // Resolve any un-sized widths first.
        let layout = self.calc_col_layout(area_width, n_screen_rows);
        let relative = self.cursor_vis_col.saturating_sub(self.left_vis_col);

        let keys_width: u16 = layout
            .entries
            .iter()
            .take_while(|entry| entry.vis_index < n_vis_keys)
            .map(|entry| entry.width + 1)
            .sum();
        let budget = area_width.saturating_sub(keys_width);

        let col_width = |vis_index: usize| -> u16 {
            self.columns[visible[vis_index]].width.unwrap_or(8) + 1
        };

        let target_right = self
            .left_vis_col
            .max(n_vis_keys)
            .saturating_sub(1)
            .max(n_vis_keys);
        let mut new_left = target_right;
        let mut used = col_width(target_right);
        while new_left > n_vis_keys && used + col_width(new_left - 1) <= budget {
            new_left -= 1;
            used += col_width(new_left);
        }
        self.left_vis_col = new_left;

        // Rightmost-column special case: soak up leftover width.
        let after = self.calc_col_layout(area_width, n_screen_rows);
        if after.right_vis_col == visible.len() - 1 {
            while self.left_vis_col > n_vis_keys {
                self.left_vis_col -= 1;
                let widened = self.calc_col_layout(area_width, n_screen_rows);
                if widened.right_vis_col < visible.len() - 1 {
                    self.left_vis_col += 1;
                    break;
                }
            }
        }
        self.cursor_vis_col = (self.left_vis_col + relative).min(visible.len() - 1);
    }

    // ---- selection ----

    pub fn select(&mut self, rows: &[Row]) {
        for row in rows {
            self.selection.insert(row.id(), row.clone());
        }
    }

    pub fn unselect(&mut self, rows: &[Row]) {
        for row in rows {
            self.selection.remove(&row.id());
        }
    }

    pub fn toggle(&mut self, rows: &[Row]) {
        for row in rows {
            if self.selection.remove(&row.id()).is_none() {
                self.selection.insert(row.id(), row.clone());
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn is_selected(&self, id: RowId) -> bool {
        self.selection.contains_key(&id)
    }

    pub fn n_selected(&self) -> usize {
        self.selection.len()
    }

    /// Selected rows in sheet order. The common 0/1-row case skips the
    /// full-sequence filter.
    pub fn selected_rows(&self) -> Vec<Row> {
        if self.selection.len() <= 1 {
            return self.selection.values().cloned().collect();
        }
        self.rows()
            .iter()
            .filter(|row| self.selection.contains_key(&row.id()))
            .cloned()
            .collect()
    }

    /// Rebuild `rows` without the selected ones, in one pass. The cursor
    /// lands on the nearest surviving row at or after its old position.
    /// A mismatch between rows removed and the selection size means the
    /// sheet changed underneath us, which is a bug worth failing on.
    pub fn delete_selected(&mut self) -> Result<usize> {
        let expected = self.selection.len();
        let prior_cursor = self.cursor_row;
        let rows = std::mem::take(self.rows_mut());
        let before = rows.len();

        let mut survivors_before_cursor = 0;
        let mut kept = Vec::with_capacity(before - expected.min(before));
        for (index, row) in rows.into_iter().enumerate() {
            if self.selection.contains_key(&row.id()) {
                continue;
            }
            if index < prior_cursor {
                survivors_before_cursor += 1;
            }
            kept.push(row);
        }

        let removed = before - kept.len();
        let n_kept = kept.len();
        *self.rows_mut() = kept;
        if removed != expected {
            return Err(InvariantViolation(format!(
                "deleted {removed} rows but {expected} were selected"
            ))
            .into());
        }
        self.selection.clear();
        self.cursor_row = survivors_before_cursor.min(n_kept.saturating_sub(1));
        Ok(removed)
    }

    // ---- ordering ----

    /// Stable sort by the tuple of typed values of `col_indices`.
    pub fn order_by(&mut self, col_indices: &[usize], reverse: bool) {
        let mut rows = std::mem::take(self.rows_mut());
        let columns = &self.columns;
        rows.sort_by(|left, right| {
            let mut ordering = std::cmp::Ordering::Equal;
            for &col_index in col_indices {
                let Some(column) = columns.get(col_index) else {
                    continue;
                };
                ordering = column
                    .get_typed_value(left)
                    .cmp_value(&column.get_typed_value(right));
                if ordering != std::cmp::Ordering::Equal {
                    break;
                }
            }
            if reverse { ordering.reverse() } else { ordering }
        });
        *self.rows_mut() = rows;
    }

    // ---- bindings ----

    pub fn bind(&mut self, keyseq: &str, command: &str) {
        self.bindings.insert(keyseq.to_owned(), command.to_owned());
    }

    pub fn binding(&self, keyseq: &str) -> Option<&str> {
        self.bindings.get(keyseq).map(String::as_str)
    }

    pub fn add_colorizer(&mut self, colorizer: Colorizer) {
        self.colorizers.push(colorizer);
    }

    // ---- copying ----

    /// Structural clone: deep-copied column definitions (independent
    /// widths/types, fresh caches), empty mutable rows, fresh selection
    /// and viewport, shared loader. "Duplicate with selected rows" and
    /// "duplicate as full copy" are both built on this.
    pub fn structural_copy(&self, name: &str) -> Self {
        let mut copy = Self::new(name, self.columns.clone());
        copy.n_keys = self.n_keys;
        copy.colorizers = self.colorizers.clone();
        copy.bindings = self.bindings.clone();
        copy.loader = self.loader.clone();
        copy.rows = RowSet::Loaded(Vec::new());
        copy
    }
}

fn add_clamped(base: usize, delta: isize) -> usize {
    let moved = base as i64 + delta as i64;
    moved.max(0) as usize
}

impl std::fmt::Debug for Sheet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sheet")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("n_rows", &self.n_rows())
            .field("n_cols", &self.columns.len())
            .finish_non_exhaustive()
    }
}
