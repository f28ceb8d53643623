// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;

/// User-initiated abort of an in-progress interactive action. Swallowed
/// at the nearest command or line-editor boundary with a neutral status
/// message; never recorded in the error history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("aborted by user")
    }
}

impl std::error::Error for Cancelled {}

/// An unregistered option key was referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub key: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown option {:?}", self.key)
    }
}

impl std::error::Error for ConfigError {}

/// A write was attempted on a column with no setter bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnlyColumn {
    pub column: String,
}

impl fmt::Display for ReadOnlyColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column {:?} is read-only", self.column)
    }
}

impl std::error::Error for ReadOnlyColumn {}

/// A consistency check failed; indicates a deeper bug, so it propagates
/// to the dispatcher's generic catch-and-log path instead of being
/// recovered locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation(pub String);

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invariant violated: {}", self.0)
    }
}

impl std::error::Error for InvariantViolation {}

/// Cancellation must be distinguishable from real errors everywhere an
/// error crosses a catch boundary.
pub fn is_cancelled(error: &anyhow::Error) -> bool {
    error.downcast_ref::<Cancelled>().is_some()
}
