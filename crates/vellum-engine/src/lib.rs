// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Terminal-free core of the tabular browser: typed values and
//! columns, sheets with cursor and selection state, the command
//! table, background tasks, and the session that ties them together.
//! Front ends provide the terminal; nothing here touches one.

pub mod colorize;
pub mod column;
pub mod command;
pub mod defaults;
pub mod edit;
pub mod error;
pub mod meta;
pub mod options;
pub mod row;
pub mod session;
pub mod sheet;
pub mod tasks;
pub mod value;

pub use colorize::{CellStyle, Colorizer, ColorizerScope, PaletteColor, colorize};
pub use column::{Column, DisplayCell, Note};
pub use command::{Command, CommandSet, ExecCtx, Prefixes};
pub use defaults::{default_commands, default_options};
pub use edit::{EditOutcome, LineEditor};
pub use error::{Cancelled, ConfigError, InvariantViolation, ReadOnlyColumn, is_cancelled};
pub use options::{OptionEntry, Options};
pub use row::{Cells, Row, RowId, cells_row};
pub use session::{Prompt, Session};
pub use sheet::{ColLayout, LayoutEntry, Loader, Sheet, SheetId};
pub use tasks::{ErrorLog, Progress, Task, TaskCtx, TaskEvent, TaskTracker};
pub use value::{ColumnType, Value};
