// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::error::ReadOnlyColumn;
use crate::row::{Cells, Row, RowId};
use crate::sheet::SheetId;
use crate::value::{ColumnType, Value, format_value};
use anyhow::{Result, anyhow};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use unicode_width::UnicodeWidthStr;

const CACHE_CAPACITY: usize = 256;

pub type Getter = dyn Fn(&Column, &Row) -> Result<Value> + Send + Sync;
pub type Setter = dyn Fn(&Column, &Row, Value) -> Result<()> + Send + Sync;

/// Marker attached to a rendered cell. The renderer shows the glyph in
/// the cell's last character position with a note-specific color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Note {
    /// Value-kind hint on an untyped column.
    TypeHint(char),
    /// The cell's value is a still-running computation.
    Pending,
    /// The getter raised; trace retained for inspection.
    Error,
    /// A raw value was obtained but typing or formatting failed.
    Format,
}

impl Note {
    pub const fn glyph(self) -> char {
        match self {
            Self::TypeHint(glyph) => glyph,
            Self::Pending => '…',
            Self::Error => '!',
            Self::Format => '?',
        }
    }
}

/// The rendering-ready result of evaluating one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayCell {
    pub value: Value,
    pub text: String,
    pub note: Option<Note>,
    pub error: Option<String>,
    pub right_justify: bool,
}

/// Bounded memo of raw getter results, keyed by row identity. Evicts the
/// oldest-inserted entry on overflow. Shared reads from the draw path and
/// background tasks both go through the mutex; entries are idempotent
/// recomputations so contention is harmless.
#[derive(Default)]
struct ValueCache {
    map: HashMap<RowId, Value>,
    order: VecDeque<RowId>,
}

impl ValueCache {
    fn get(&self, id: RowId) -> Option<Value> {
        self.map.get(&id).cloned()
    }

    fn insert(&mut self, id: RowId, value: Value) {
        if self.map.insert(id, value).is_some() {
            return;
        }
        self.order.push_back(id);
        if self.order.len() > CACHE_CAPACITY
            && let Some(oldest) = self.order.pop_front()
        {
            self.map.remove(&oldest);
        }
    }

    fn remove(&mut self, id: RowId) {
        if self.map.remove(&id).is_some() {
            self.order.retain(|entry| *entry != id);
        }
    }
}

/// A named, typed accessor bound to a row-producing getter and optional
/// setter. Identity is the column object itself; names may collide.
pub struct Column {
    name: String,
    pub ctype: ColumnType,
    /// `Some(0)` hides the column; `None` auto-sizes on next layout.
    pub width: Option<u16>,
    pub fmt: Option<String>,
    getter: Arc<Getter>,
    setter: Option<Arc<Setter>>,
    cache: Option<Mutex<ValueCache>>,
    /// Non-owning back-reference, rebound by `Sheet::recalc`.
    pub sheet: Option<SheetId>,
}

impl Column {
    pub fn new<G>(name: &str, ctype: ColumnType, getter: G) -> Self
    where
        G: Fn(&Column, &Row) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.trim().to_owned(),
            ctype,
            width: None,
            fmt: None,
            getter: Arc::new(getter),
            setter: None,
            cache: None,
            sheet: None,
        }
    }

    /// Column over positional `Cells` rows, with a setter.
    pub fn indexed(name: &str, ctype: ColumnType, index: usize) -> Self {
        let mut column = Self::new(name, ctype, move |_column, row| {
            let cells = row
                .payload::<Cells>()
                .ok_or_else(|| anyhow!("row has no positional cells"))?;
            Ok(cells.get(index))
        });
        column.setter = Some(Arc::new(move |_column, row, value| {
            let cells = row
                .payload::<Cells>()
                .ok_or_else(|| anyhow!("row has no positional cells"))?;
            cells.set(index, value);
            Ok(())
        }));
        column
    }

    pub fn with_cache(mut self) -> Self {
        self.cache = Some(Mutex::new(ValueCache::default()));
        self
    }

    pub fn with_width(mut self, width: u16) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(&Column, &Row, Value) -> Result<()> + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.trim().to_owned();
    }

    /// Name reduced to an identifier, for sources that address columns
    /// by name.
    pub fn sanitized_name(&self) -> String {
        self.name
            .chars()
            .map(|ch| if ch.is_alphanumeric() { ch } else { '_' })
            .collect()
    }

    pub fn hidden(&self) -> bool {
        self.width == Some(0)
    }

    pub fn writable(&self) -> bool {
        self.setter.is_some()
    }

    /// Raw value with memoization. Getter errors propagate.
    pub fn get_value(&self, row: &Row) -> Result<Value> {
        let Some(cache) = &self.cache else {
            return (self.getter)(self, row);
        };
        if let Ok(cache) = cache.lock()
            && let Some(hit) = cache.get(row.id())
        {
            return Ok(hit);
        }
        let value = (self.getter)(self, row)?;
        if let Ok(mut cache) = cache.lock() {
            cache.insert(row.id(), value.clone());
        }
        Ok(value)
    }

    /// Raw value coerced through the column type. Never fails: any
    /// getter or coercion error yields the type's default, so one bad
    /// cell cannot abort a render or a sort.
    pub fn get_typed_value(&self, row: &Row) -> Value {
        match self.get_value(row) {
            Ok(raw) => self
                .ctype
                .coerce(&raw)
                .unwrap_or_else(|_| self.ctype.default_value()),
            Err(_) => self.ctype.default_value(),
        }
    }

    /// Evaluate one cell for display, degrading tier by tier: a getter
    /// error becomes an error cell with the trace retained; a pending
    /// value renders as in-progress; a typing/format failure shows the
    /// raw value verbatim with a format note.
    pub fn display_cell(&self, row: &Row) -> DisplayCell {
        let raw = match self.get_value(row) {
            Ok(raw) => raw,
            Err(error) => {
                return DisplayCell {
                    value: Value::Null,
                    text: String::new(),
                    note: Some(Note::Error),
                    error: Some(format!("{error:#}")),
                    right_justify: false,
                };
            }
        };

        if raw == Value::Pending {
            return DisplayCell {
                value: raw,
                text: String::new(),
                note: Some(Note::Pending),
                error: None,
                right_justify: false,
            };
        }

        let formatted = self
            .ctype
            .coerce(&raw)
            .and_then(|typed| format_value(self.ctype, self.fmt.as_deref(), &typed));
        match formatted {
            Ok(text) => DisplayCell {
                note: type_hint(self.ctype, &raw),
                text,
                error: None,
                right_justify: self.ctype.right_justified(),
                value: raw,
            },
            Err(error) => DisplayCell {
                text: raw.display(),
                note: Some(Note::Format),
                error: Some(format!("{error:#}")),
                right_justify: false,
                value: raw,
            },
        }
    }

    /// Coerce once, then apply to every row. Fails without a setter.
    pub fn set_values(&self, rows: &[Row], value: Value) -> Result<()> {
        let setter = self.setter.as_ref().ok_or_else(|| ReadOnlyColumn {
            column: self.name.clone(),
        })?;
        let coerced = self.ctype.coerce(&value)?;
        for row in rows {
            setter(self, row, coerced.clone())?;
            if let Some(cache) = &self.cache
                && let Ok(mut cache) = cache.lock()
            {
                cache.remove(row.id());
            }
        }
        Ok(())
    }

    pub fn set_value(&self, row: &Row, value: Value) -> Result<()> {
        self.set_values(std::slice::from_ref(row), value)
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache
            && let Ok(mut cache) = cache.lock()
        {
            *cache = ValueCache::default();
        }
    }

    /// Widest displayed string among `rows`, never narrower than the
    /// column name, plus a space of padding each side.
    pub fn max_width(&self, rows: &[Row]) -> u16 {
        let mut widest = self.name.width();
        for row in rows {
            widest = widest.max(self.display_cell(row).text.width());
        }
        (widest + 2).min(u16::MAX as usize) as u16
    }
}

fn type_hint(ctype: ColumnType, raw: &Value) -> Option<Note> {
    if ctype != ColumnType::Any {
        return None;
    }
    match raw {
        Value::Int(_) => Some(Note::TypeHint('#')),
        Value::Float(_) => Some(Note::TypeHint('%')),
        Value::Date(_) => Some(Note::TypeHint('@')),
        Value::Bool(_) => Some(Note::TypeHint('?')),
        _ => None,
    }
}

impl Clone for Column {
    /// Copies the definition, not the memo: the clone starts with a
    /// fresh, empty cache and no sheet binding.
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            ctype: self.ctype,
            width: self.width,
            fmt: self.fmt.clone(),
            getter: Arc::clone(&self.getter),
            setter: self.setter.clone(),
            cache: self.cache.as_ref().map(|_| Mutex::new(ValueCache::default())),
            sheet: None,
        }
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("ctype", &self.ctype)
            .field("width", &self.width)
            .finish_non_exhaustive()
    }
}
