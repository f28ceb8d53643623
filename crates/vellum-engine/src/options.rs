// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::error::ConfigError;
use crate::value::Value;
use anyhow::Result;
use std::collections::BTreeMap;

/// One registered setting: current value, registration-time default, and
/// help text for the options sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionEntry {
    pub name: String,
    pub value: Value,
    pub default: Value,
    pub help: String,
}

/// Process-wide named settings with typed coercion. Read far more often
/// than written; writes happen on the main loop only.
#[derive(Debug, Clone, Default)]
pub struct Options {
    entries: BTreeMap<String, OptionEntry>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, default: Value, help: &str) {
        self.entries.insert(
            name.to_owned(),
            OptionEntry {
                name: name.to_owned(),
                value: default.clone(),
                default,
                help: help.to_owned(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.entries
            .get(name)
            .map(|entry| &entry.value)
            .ok_or_else(|| {
                ConfigError {
                    key: name.to_owned(),
                }
                .into()
            })
    }

    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.get(name)? {
            Value::Bool(flag) => Ok(*flag),
            other => Ok(!other.display().is_empty()),
        }
    }

    pub fn get_int(&self, name: &str) -> Result<i64> {
        match self.get(name)? {
            Value::Int(number) => Ok(*number),
            other => Ok(other.display().trim().parse().unwrap_or(0)),
        }
    }

    pub fn get_str(&self, name: &str) -> Result<String> {
        Ok(self.get(name)?.display())
    }

    /// Set an option, coercing the incoming value to the kind of the
    /// stored value. A null stored value takes the new value verbatim.
    /// Boolean entries use the string rule: empty or leading 0/f/F/n/N
    /// means false, everything else true.
    pub fn set(&mut self, name: &str, value: Value) -> Result<()> {
        let entry = self.entries.get_mut(name).ok_or_else(|| ConfigError {
            key: name.to_owned(),
        })?;
        entry.value = coerce_like(&entry.value, value)?;
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = &OptionEntry> {
        self.entries.values()
    }
}

fn coerce_like(current: &Value, incoming: Value) -> Result<Value> {
    match current {
        Value::Null => Ok(incoming),
        Value::Bool(_) => Ok(Value::Bool(truthy(&incoming))),
        Value::Int(_) => match incoming {
            Value::Int(_) => Ok(incoming),
            Value::Float(number) => Ok(Value::Int(number as i64)),
            Value::Bool(flag) => Ok(Value::Int(i64::from(flag))),
            other => Ok(Value::Int(other.display().trim().parse()?)),
        },
        Value::Float(_) => match incoming {
            Value::Float(_) => Ok(incoming),
            Value::Int(number) => Ok(Value::Float(number as f64)),
            other => Ok(Value::Float(other.display().trim().parse()?)),
        },
        Value::Str(_) => Ok(Value::Str(incoming.display())),
        Value::Date(_) | Value::Pending => Ok(incoming),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Int(number) => *number != 0,
        Value::Float(number) => *number != 0.0,
        Value::Null | Value::Pending => false,
        Value::Str(text) => {
            !(text.is_empty() || matches!(text.chars().next(), Some('0' | 'f' | 'F' | 'n' | 'N')))
        }
        Value::Date(_) => true,
    }
}
