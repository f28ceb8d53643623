// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Derived sheets that browse the session itself: the sheet stack,
//! the active sheet's columns, options, keybindings, status history,
//! and error traces. Each builder snapshots its subject into plain
//! cell rows, so the derived sheet stays valid even after the subject
//! changes underneath it.

use crate::column::Column;
use crate::row::{Row, cells_row};
use crate::session::Session;
use crate::sheet::Sheet;
use crate::value::{ColumnType, Value};
use time::OffsetDateTime;
use time::macros::format_description;

fn clock(at: OffsetDateTime) -> String {
    let description = format_description!("[hour]:[minute]:[second]");
    at.format(&description)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// One line of text per row. Backs the error-trace view and anything
/// else that just needs to page through prose.
pub fn text_sheet(name: &str, text: &str) -> Sheet {
    let rows: Vec<Row> = text
        .lines()
        .map(|line| cells_row(vec![Value::Str(line.to_owned())]))
        .collect();
    Sheet::new(name, vec![Column::indexed(name, ColumnType::Str, 0)]).with_rows(rows)
}

pub fn status_history_sheet(session: &Session) -> Sheet {
    let rows: Vec<Row> = session
        .status_history()
        .map(|(at, message)| {
            cells_row(vec![
                Value::Str(clock(*at)),
                Value::Str(message.clone()),
            ])
        })
        .collect();
    Sheet::new(
        "statuses",
        vec![
            Column::indexed("time", ColumnType::Str, 0).with_width(8),
            Column::indexed("message", ColumnType::Str, 1),
        ],
    )
    .with_rows(rows)
}

/// Rolling error history, most recent first. Each row carries its
/// full trace in a trailing cell with no column of its own, so
/// `Enter` can open it even after the live log rolls over.
pub fn errors_sheet(session: &Session) -> Sheet {
    let rows: Vec<Row> = session
        .errors()
        .entries()
        .into_iter()
        .map(|entry| {
            cells_row(vec![
                Value::Str(clock(entry.at)),
                Value::Str(entry.summary),
                Value::Str(entry.trace),
            ])
        })
        .collect();
    let mut sheet = Sheet::new(
        "errors",
        vec![
            Column::indexed("time", ColumnType::Str, 0).with_width(8),
            Column::indexed("error", ColumnType::Str, 1),
        ],
    )
    .with_rows(rows);
    sheet.bind("Enter", "error-trace");
    sheet
}

pub fn sheets_sheet(session: &Session) -> Sheet {
    let rows: Vec<Row> = session
        .stack()
        .iter()
        .map(|sheet| {
            cells_row(vec![
                Value::Str(sheet.name.clone()),
                Value::Int(sheet.n_rows() as i64),
                Value::Int(sheet.n_visible_cols() as i64),
                Value::Int(sheet.n_visible_keys() as i64),
                Value::Int(sheet.n_selected() as i64),
            ])
        })
        .collect();
    let mut sheet = Sheet::new(
        "sheets",
        vec![
            Column::indexed("name", ColumnType::Str, 0),
            Column::indexed("rows", ColumnType::Int, 1),
            Column::indexed("cols", ColumnType::Int, 2),
            Column::indexed("keys", ColumnType::Int, 3),
            Column::indexed("selected", ColumnType::Int, 4),
        ],
    )
    .with_rows(rows);
    sheet.bind("Enter", "jump-sheet");
    sheet
}

/// Columns of the sheet that was on top when `C` was pressed.
pub fn columns_sheet(subject: &Sheet) -> Sheet {
    let n_keys = subject.n_visible_keys();
    let rows: Vec<Row> = subject
        .visible_col_indices()
        .iter()
        .enumerate()
        .map(|(vis_index, &col_index)| {
            let column = &subject.columns[col_index];
            cells_row(vec![
                Value::Str(column.name().to_owned()),
                Value::Str(column.ctype.label().to_owned()),
                match column.width {
                    Some(width) => Value::Int(i64::from(width)),
                    None => Value::Null,
                },
                Value::Bool(vis_index < n_keys),
            ])
        })
        .collect();
    Sheet::new(
        &format!("{}_columns", subject.name),
        vec![
            Column::indexed("name", ColumnType::Str, 0),
            Column::indexed("type", ColumnType::Str, 1),
            Column::indexed("width", ColumnType::Int, 2),
            Column::indexed("key", ColumnType::Any, 3),
        ],
    )
    .with_rows(rows)
}

/// All registered options. `e` edits the option under the cursor in
/// place instead of editing the snapshot cell.
pub fn options_sheet(session: &Session) -> Sheet {
    let rows: Vec<Row> = session
        .options
        .entries()
        .map(|entry| {
            cells_row(vec![
                Value::Str(entry.name.clone()),
                Value::Str(entry.value.display()),
                Value::Str(entry.default.display()),
                Value::Str(entry.help.clone()),
            ])
        })
        .collect();
    let mut sheet = Sheet::new(
        "options",
        vec![
            Column::indexed("option", ColumnType::Str, 0),
            Column::indexed("value", ColumnType::Str, 1),
            Column::indexed("default", ColumnType::Str, 2),
            Column::indexed("help", ColumnType::Str, 3),
        ],
    )
    .with_rows(rows);
    sheet.bind("e", "edit-option");
    sheet.bind("Enter", "edit-option");
    sheet
}

/// Every binding in the command table alongside the command's help.
pub fn help_sheet(session: &Session) -> Sheet {
    let commands = session.commands();
    let mut rows: Vec<Row> = commands
        .bindings()
        .map(|(keyseq, name)| {
            let help = commands
                .command(name)
                .map(|command| command.help.clone())
                .unwrap_or_default();
            cells_row(vec![
                Value::Str(keyseq.to_owned()),
                Value::Str(name.to_owned()),
                Value::Str(help),
            ])
        })
        .collect();
    rows.sort_by(|a, b| {
        let a = a.payload::<crate::row::Cells>().map(|cells| cells.get(1));
        let b = b.payload::<crate::row::Cells>().map(|cells| cells.get(1));
        a.map(|v| v.display()).cmp(&b.map(|v| v.display()))
    });
    Sheet::new(
        "help",
        vec![
            Column::indexed("key", ColumnType::Str, 0).with_width(10),
            Column::indexed("command", ColumnType::Str, 1),
            Column::indexed("help", ColumnType::Str, 2),
        ],
    )
    .with_rows(rows)
}
