// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use std::cmp::Ordering;
use time::Date;
use time::macros::format_description;

/// A raw cell value produced by a column getter. Rows are opaque to the
/// engine; getters translate whatever shape the source uses into one of
/// these.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(Date),
    /// Placeholder for a cell whose computation is still in flight.
    Pending,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Plain, format-free rendering. Used for untyped display and as the
    /// verbatim fallback when typed formatting fails.
    pub fn display(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(value) => value.to_string(),
            Self::Int(value) => value.to_string(),
            Self::Float(value) => format_float(*value),
            Self::Str(value) => value.clone(),
            Self::Date(value) => value.to_string(),
            Self::Pending => String::new(),
        }
    }

    /// Total ordering across value kinds: nulls first, numerics compare
    /// across Int/Float, text compares case-insensitively.
    pub fn cmp_value(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Bool(left), Self::Bool(right)) => left.cmp(right),
            (Self::Int(left), Self::Int(right)) => left.cmp(right),
            (Self::Float(left), Self::Float(right)) => left.total_cmp(right),
            (Self::Int(left), Self::Float(right)) => (*left as f64).total_cmp(right),
            (Self::Float(left), Self::Int(right)) => left.total_cmp(&(*right as f64)),
            (Self::Date(left), Self::Date(right)) => left.cmp(right),
            (Self::Str(left), Self::Str(right)) => {
                left.to_lowercase().cmp(&right.to_lowercase())
            }
            _ => self
                .display()
                .to_lowercase()
                .cmp(&other.display().to_lowercase()),
        }
    }
}

/// The fixed set of column value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Untyped passthrough.
    Any,
    Str,
    Int,
    Float,
    Date,
    /// Lenient numeric: parses after stripping non-numeric characters.
    Currency,
}

impl ColumnType {
    pub const fn glyph(self) -> char {
        match self {
            Self::Any => ' ',
            Self::Str => '~',
            Self::Int => '#',
            Self::Float => '%',
            Self::Date => '@',
            Self::Currency => '$',
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Date => "date",
            Self::Currency => "currency",
        }
    }

    /// The value substituted when coercion fails.
    pub fn default_value(self) -> Value {
        match self {
            Self::Any | Self::Date => Value::Null,
            Self::Str => Value::Str(String::new()),
            Self::Int => Value::Int(0),
            Self::Float | Self::Currency => Value::Float(0.0),
        }
    }

    /// Numeric-like types right-justify when a cell width is known.
    pub const fn right_justified(self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Currency)
    }

    pub fn coerce(self, value: &Value) -> Result<Value> {
        match self {
            Self::Any => Ok(value.clone()),
            Self::Str => Ok(Value::Str(value.display())),
            Self::Int => coerce_int(value),
            Self::Float => coerce_float(value),
            Self::Date => coerce_date(value),
            Self::Currency => coerce_currency(value),
        }
    }
}

fn coerce_int(value: &Value) -> Result<Value> {
    match value {
        Value::Int(_) => Ok(value.clone()),
        Value::Bool(flag) => Ok(Value::Int(i64::from(*flag))),
        Value::Float(number) => Ok(Value::Int(*number as i64)),
        Value::Str(text) => {
            let parsed: i64 = text.trim().parse()?;
            Ok(Value::Int(parsed))
        }
        other => bail!("cannot convert {} to int", other.display()),
    }
}

fn coerce_float(value: &Value) -> Result<Value> {
    match value {
        Value::Float(_) => Ok(value.clone()),
        Value::Int(number) => Ok(Value::Float(*number as f64)),
        Value::Str(text) => {
            let parsed: f64 = text.trim().parse()?;
            Ok(Value::Float(parsed))
        }
        other => bail!("cannot convert {} to float", other.display()),
    }
}

fn coerce_date(value: &Value) -> Result<Value> {
    match value {
        Value::Date(_) => Ok(value.clone()),
        Value::Str(text) => {
            let format = format_description!("[year]-[month]-[day]");
            let parsed = Date::parse(text.trim(), &format)?;
            Ok(Value::Date(parsed))
        }
        other => bail!("cannot convert {} to date", other.display()),
    }
}

fn coerce_currency(value: &Value) -> Result<Value> {
    match value {
        Value::Float(_) => Ok(value.clone()),
        Value::Int(number) => Ok(Value::Float(*number as f64)),
        Value::Str(text) => {
            let stripped: String = text
                .chars()
                .filter(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+'))
                .collect();
            if stripped.is_empty() {
                bail!("no numeric content in {text:?}");
            }
            let parsed: f64 = stripped.parse()?;
            Ok(Value::Float(parsed))
        }
        other => bail!("cannot convert {} to currency", other.display()),
    }
}

/// Format an already-coerced value for display. `fmt` is a per-column
/// override accepting the printf-style subset `%d`, `%s`, and `%.Nf`.
pub fn format_value(ctype: ColumnType, fmt: Option<&str>, value: &Value) -> Result<String> {
    if let Some(fmt) = fmt {
        return format_with(fmt, value);
    }
    match (ctype, value) {
        (ColumnType::Currency, Value::Float(number)) => Ok(format!("{number:.2}")),
        _ => Ok(value.display()),
    }
}

fn format_with(fmt: &str, value: &Value) -> Result<String> {
    if fmt == "%d" {
        return match value {
            Value::Int(number) => Ok(number.to_string()),
            Value::Float(number) => Ok((*number as i64).to_string()),
            other => bail!("%d needs a numeric value, got {}", other.display()),
        };
    }
    if fmt == "%s" {
        return Ok(value.display());
    }
    if let Some(precision) = fmt
        .strip_prefix("%.")
        .and_then(|rest| rest.strip_suffix('f'))
    {
        let precision: usize = precision.parse()?;
        return match value {
            Value::Float(number) => Ok(format!("{number:.precision$}")),
            Value::Int(number) => Ok(format!("{:.precision$}", *number as f64)),
            other => bail!("%.Nf needs a numeric value, got {}", other.display()),
        };
    }
    bail!("unsupported display format {fmt:?}")
}

fn format_float(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnType, Value, format_value};
    use anyhow::Result;
    use std::cmp::Ordering;
    use time::macros::date;

    #[test]
    fn currency_coercion_strips_noise() -> Result<()> {
        let coerced = ColumnType::Currency.coerce(&Value::Str("$1,234.50".to_owned()))?;
        assert_eq!(coerced, Value::Float(1234.5));
        Ok(())
    }

    #[test]
    fn currency_coercion_rejects_pure_noise() {
        let error = ColumnType::Currency
            .coerce(&Value::Str("n/a".to_owned()))
            .expect_err("no digits should fail");
        assert!(error.to_string().contains("no numeric content"));
    }

    #[test]
    fn int_coercion_parses_trimmed_strings() -> Result<()> {
        assert_eq!(
            ColumnType::Int.coerce(&Value::Str("  42 ".to_owned()))?,
            Value::Int(42)
        );
        Ok(())
    }

    #[test]
    fn date_coercion_parses_iso_dates() -> Result<()> {
        assert_eq!(
            ColumnType::Date.coerce(&Value::Str("2026-03-14".to_owned()))?,
            Value::Date(date!(2026 - 03 - 14))
        );
        Ok(())
    }

    #[test]
    fn str_coercion_is_total() -> Result<()> {
        assert_eq!(
            ColumnType::Str.coerce(&Value::Int(7))?,
            Value::Str("7".to_owned())
        );
        assert_eq!(
            ColumnType::Str.coerce(&Value::Null)?,
            Value::Str(String::new())
        );
        Ok(())
    }

    #[test]
    fn null_sorts_before_everything() {
        assert_eq!(Value::Null.cmp_value(&Value::Int(-5)), Ordering::Less);
        assert_eq!(
            Value::Str("a".to_owned()).cmp_value(&Value::Null),
            Ordering::Greater
        );
    }

    #[test]
    fn mixed_numerics_compare() {
        assert_eq!(Value::Int(2).cmp_value(&Value::Float(2.5)), Ordering::Less);
        assert_eq!(Value::Float(3.0).cmp_value(&Value::Int(3)), Ordering::Equal);
    }

    #[test]
    fn text_compares_case_insensitively() {
        assert_eq!(
            Value::Str("Apple".to_owned()).cmp_value(&Value::Str("apple".to_owned())),
            Ordering::Equal
        );
    }

    #[test]
    fn currency_formats_with_two_decimals_by_default() -> Result<()> {
        let text = format_value(ColumnType::Currency, None, &Value::Float(3.5))?;
        assert_eq!(text, "3.50");
        Ok(())
    }

    #[test]
    fn precision_format_override_applies() -> Result<()> {
        let text = format_value(ColumnType::Float, Some("%.3f"), &Value::Float(1.0 / 3.0))?;
        assert_eq!(text, "0.333");
        Ok(())
    }

    #[test]
    fn bad_format_string_is_an_error() {
        let error = format_value(ColumnType::Float, Some("%x"), &Value::Float(1.0))
            .expect_err("unsupported format should fail");
        assert!(error.to_string().contains("unsupported display format"));
    }

    #[test]
    fn type_defaults_match_their_kind() {
        assert_eq!(ColumnType::Str.default_value(), Value::Str(String::new()));
        assert_eq!(ColumnType::Int.default_value(), Value::Int(0));
        assert_eq!(ColumnType::Date.default_value(), Value::Null);
    }
}
