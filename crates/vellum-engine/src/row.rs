// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::value::Value;
use std::any::Any;
use std::sync::{Arc, Mutex};

/// Identity of a row, stable for the row's lifetime and shared by all
/// clones of its handle. Used as the key for value caches and the
/// selection set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowId(usize);

/// An opaque, source-defined row. The engine never interprets the
/// payload; all access goes through column getters, which downcast to
/// the concrete type their source produced. Handles are cheap to clone
/// and safe to hand to background tasks.
#[derive(Clone)]
pub struct Row(Arc<dyn Any + Send + Sync>);

impl Row {
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self(Arc::new(payload))
    }

    pub fn id(&self) -> RowId {
        RowId(Arc::as_ptr(&self.0).cast::<()>() as usize)
    }

    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Row({:#x})", self.id().0)
    }
}

/// The common concrete row shape: a locked vector of values, indexable
/// by position. File loaders and the testkit produce these; the lock
/// exists so cell edits work through shared handles.
pub struct Cells(Mutex<Vec<Value>>);

impl Cells {
    pub fn get(&self, index: usize) -> Value {
        match self.0.lock() {
            Ok(values) => values.get(index).cloned().unwrap_or(Value::Null),
            Err(_) => Value::Null,
        }
    }

    pub fn set(&self, index: usize, value: Value) {
        if let Ok(mut values) = self.0.lock() {
            if index >= values.len() {
                values.resize(index + 1, Value::Null);
            }
            values[index] = value;
        }
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|values| values.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build a row over positional cell values.
pub fn cells_row(values: Vec<Value>) -> Row {
    Row::new(Cells(Mutex::new(values)))
}
