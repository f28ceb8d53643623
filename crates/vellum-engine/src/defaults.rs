// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! The stock command table and option registry. Front ends start from
//! these and layer their own bindings on top.

use crate::command::{CommandSet, ExecCtx};
use crate::column::Column;
use crate::meta;
use crate::sheet::Sheet;
use crate::value::{ColumnType, Value};
use anyhow::{Result, anyhow};
use std::sync::Arc;

pub fn default_options() -> crate::options::Options {
    let mut options = crate::options::Options::new();
    options.register(
        "csv-delimiter",
        Value::Str(",".to_owned()),
        "field separator used when reading delimited files",
    );
    options.register(
        "show-types",
        Value::Bool(true),
        "show a type glyph in each column header",
    );
    options.register(
        "color-current-row",
        Value::Bool(true),
        "highlight the row under the cursor",
    );
    options.register(
        "mouse",
        Value::Bool(true),
        "react to mouse clicks and scroll wheel",
    );
    options.register(
        "poll-interval-ms",
        Value::Int(120),
        "how long the main loop waits for a keystroke",
    );
    options
}

fn with_top<F>(ctx: &mut ExecCtx, body: F) -> Result<()>
where
    F: FnOnce(&mut Sheet) -> Result<()>,
{
    let sheet = ctx
        .session
        .top_mut()
        .ok_or_else(|| anyhow!("no sheet on the stack"))?;
    body(sheet)
}

fn cursor_column_index(sheet: &Sheet) -> Result<usize> {
    sheet
        .cursor_col_index()
        .ok_or_else(|| anyhow!("no column under the cursor"))
}

fn set_cursor_type(ctx: &mut ExecCtx, ctype: ColumnType) -> Result<()> {
    let mut name = String::new();
    with_top(ctx, |sheet| {
        let index = cursor_column_index(sheet)?;
        sheet.columns[index].ctype = ctype;
        name = sheet.columns[index].name().to_owned();
        Ok(())
    })?;
    ctx.session
        .status(&format!("{name} is now {}", ctype.label()));
    Ok(())
}

fn sort_by_cursor(ctx: &mut ExecCtx, reverse: bool) -> Result<()> {
    let mut name = String::new();
    with_top(ctx, |sheet| {
        let index = cursor_column_index(sheet)?;
        name = sheet.columns[index].name().to_owned();
        sheet.order_by(&[index], reverse);
        Ok(())
    })?;
    let direction = if reverse { "descending" } else { "ascending" };
    ctx.session.status(&format!("sorted by {name} {direction}"));
    Ok(())
}

fn sort_by_keys(ctx: &mut ExecCtx, reverse: bool) -> Result<()> {
    with_top(ctx, |sheet| {
        if sheet.n_keys == 0 {
            return Err(anyhow!("no key columns to sort by"));
        }
        let indices: Vec<usize> = (0..sheet.n_keys.min(sheet.columns.len())).collect();
        sheet.order_by(&indices, reverse);
        Ok(())
    })?;
    ctx.session.status("sorted by key columns");
    Ok(())
}

/// A derived column: a reference to an existing column by name, or a
/// constant when the text names no column.
fn derived_column(sheet: &Sheet, text: &str) -> Column {
    if let Some(source) = sheet.columns.iter().find(|column| column.name() == text) {
        let source = source.clone();
        Column::new(text, source.ctype, move |_column, row| source.get_value(row))
    } else {
        let constant = Value::Str(text.to_owned());
        Column::new(text, ColumnType::Any, move |_column, _row| Ok(constant.clone()))
    }
}

pub fn default_commands() -> Arc<CommandSet> {
    CommandSet::builder()
        // -- leaving --
        .command("quit-sheet", "drop the top sheet", |ctx| {
            ctx.session.remove_top();
            Ok(())
        })
        .command("quit-all", "drop every sheet and exit", |ctx| {
            ctx.session.request_quit();
            Ok(())
        })
        .command("quit-dump", "exit immediately and print the last error trace", |ctx| {
            ctx.session.request_hard_quit();
            Ok(())
        })
        // -- cursor movement --
        .command("cursor-down", "move down one row", |ctx| {
            with_top(ctx, |sheet| {
                sheet.cursor_down(1);
                Ok(())
            })
        })
        .command("cursor-up", "move up one row", |ctx| {
            with_top(ctx, |sheet| {
                sheet.cursor_down(-1);
                Ok(())
            })
        })
        .command("cursor-right", "move right one column", |ctx| {
            with_top(ctx, |sheet| {
                sheet.cursor_right(1);
                Ok(())
            })
        })
        .command("cursor-left", "move left one column", |ctx| {
            with_top(ctx, |sheet| {
                sheet.cursor_right(-1);
                Ok(())
            })
        })
        .command("go-top", "move to the first row", |ctx| {
            with_top(ctx, |sheet| {
                sheet.cursor_row = 0;
                Ok(())
            })
        })
        .command("go-bottom", "move to the last row", |ctx| {
            with_top(ctx, |sheet| {
                sheet.cursor_row = sheet.n_rows().saturating_sub(1);
                Ok(())
            })
        })
        .command("go-leftmost", "move to the first column", |ctx| {
            with_top(ctx, |sheet| {
                sheet.cursor_vis_col = 0;
                sheet.left_vis_col = 0;
                Ok(())
            })
        })
        .command("go-rightmost", "move to the last column", |ctx| {
            with_top(ctx, |sheet| {
                sheet.cursor_vis_col = sheet.n_visible_cols().saturating_sub(1);
                Ok(())
            })
        })
        .command("page-down", "scroll one screen of rows forward", |ctx| {
            let (_, n_screen_rows) = ctx.session.screen();
            with_top(ctx, |sheet| {
                sheet.cursor_down(n_screen_rows as isize);
                sheet.top_row += n_screen_rows;
                Ok(())
            })
        })
        .command("page-up", "scroll one screen of rows back", |ctx| {
            let (_, n_screen_rows) = ctx.session.screen();
            with_top(ctx, |sheet| {
                sheet.cursor_down(-(n_screen_rows as isize));
                sheet.top_row = sheet.top_row.saturating_sub(n_screen_rows);
                Ok(())
            })
        })
        .command("page-left", "scroll one screen of columns back", |ctx| {
            let (area_width, n_screen_rows) = ctx.session.screen();
            with_top(ctx, |sheet| {
                sheet.page_left(area_width, n_screen_rows);
                Ok(())
            })
        })
        .command("page-right", "scroll one screen of columns forward", |ctx| {
            let (area_width, n_screen_rows) = ctx.session.screen();
            with_top(ctx, |sheet| {
                let layout = sheet.calc_col_layout(area_width, n_screen_rows);
                let last = sheet.n_visible_cols().saturating_sub(1);
                sheet.left_vis_col = (layout.right_vis_col + 1).min(last);
                sheet.cursor_vis_col = sheet.left_vis_col;
                Ok(())
            })
        })
        // -- selection --
        .command("select-row", "select the current row and move down", |ctx| {
            with_top(ctx, |sheet| {
                if let Some(row) = sheet.cursor_row_handle() {
                    sheet.select(&[row]);
                    sheet.cursor_down(1);
                }
                Ok(())
            })
        })
        .command("unselect-row", "unselect the current row and move down", |ctx| {
            with_top(ctx, |sheet| {
                if let Some(row) = sheet.cursor_row_handle() {
                    sheet.unselect(&[row]);
                    sheet.cursor_down(1);
                }
                Ok(())
            })
        })
        .command("toggle-row", "toggle selection of the current row", |ctx| {
            with_top(ctx, |sheet| {
                if let Some(row) = sheet.cursor_row_handle() {
                    sheet.toggle(&[row]);
                    sheet.cursor_down(1);
                }
                Ok(())
            })
        })
        .command("select-all", "select every row", |ctx| {
            let mut count = 0;
            with_top(ctx, |sheet| {
                let rows = sheet.rows().to_vec();
                count = rows.len();
                sheet.select(&rows);
                Ok(())
            })?;
            ctx.session.status(&format!("selected {count} rows"));
            Ok(())
        })
        .command("unselect-all", "clear the selection", |ctx| {
            with_top(ctx, |sheet| {
                sheet.clear_selection();
                Ok(())
            })
        })
        .command("toggle-all", "invert the selection", |ctx| {
            with_top(ctx, |sheet| {
                let rows = sheet.rows().to_vec();
                sheet.toggle(&rows);
                Ok(())
            })
        })
        // -- modifying rows --
        .command("delete-row", "delete the current row", |ctx| {
            with_top(ctx, |sheet| {
                let cursor_row = sheet.cursor_row;
                if cursor_row < sheet.n_rows() {
                    let row = sheet.rows_mut().remove(cursor_row);
                    sheet.unselect(&[row]);
                }
                Ok(())
            })
        })
        .command("delete-selected", "delete all selected rows", |ctx| {
            let mut count = 0;
            with_top(ctx, |sheet| {
                count = sheet.delete_selected()?;
                Ok(())
            })?;
            ctx.session.status(&format!("deleted {count} rows"));
            Ok(())
        })
        // -- editing cells --
        .command("edit-cell", "edit the cell under the cursor", |ctx| {
            let (sheet_id, col_index, row, initial) = {
                let sheet = ctx
                    .session
                    .top_mut()
                    .ok_or_else(|| anyhow!("no sheet on the stack"))?;
                let col_index = cursor_column_index(sheet)?;
                let row = sheet
                    .cursor_row_handle()
                    .ok_or_else(|| anyhow!("no row under the cursor"))?;
                let initial = sheet.columns[col_index].display_cell(&row).text;
                (sheet.id(), col_index, row, initial)
            };
            ctx.session.prompt("edit: ", &initial, move |session, text| {
                let sheet = session
                    .sheet_mut(sheet_id)
                    .ok_or_else(|| anyhow!("sheet went away"))?;
                let column = &sheet.columns[col_index];
                column.set_value(&row, Value::Str(text.to_owned()))?;
                Ok(())
            });
            Ok(())
        })
        .command("edit-selected", "set every selected cell in this column", |ctx| {
            let (sheet_id, col_index, rows) = {
                let sheet = ctx
                    .session
                    .top_mut()
                    .ok_or_else(|| anyhow!("no sheet on the stack"))?;
                let col_index = cursor_column_index(sheet)?;
                let rows = sheet.selected_rows();
                if rows.is_empty() {
                    return Err(anyhow!("no rows selected"));
                }
                (sheet.id(), col_index, rows)
            };
            ctx.session.prompt("set selected to: ", "", move |session, text| {
                let count = rows.len();
                let sheet = session
                    .sheet_mut(sheet_id)
                    .ok_or_else(|| anyhow!("sheet went away"))?;
                sheet.columns[col_index].set_values(&rows, Value::Str(text.to_owned()))?;
                session.status(&format!("set {count} cells"));
                Ok(())
            });
            Ok(())
        })
        // -- duplicating --
        .command("dup-sheet", "push a copy with the selected rows (all when none)", |ctx| {
            let copy = {
                let sheet = ctx
                    .session
                    .top()
                    .ok_or_else(|| anyhow!("no sheet on the stack"))?;
                let mut copy = sheet.structural_copy(&format!("{}_copy", sheet.name));
                let rows = if sheet.n_selected() > 0 {
                    sheet.selected_rows()
                } else {
                    sheet.rows().to_vec()
                };
                copy.set_rows(rows);
                copy
            };
            ctx.session.push(copy);
            Ok(())
        })
        .command("dup-sheet-all", "push a full copy of the current sheet", |ctx| {
            let copy = {
                let sheet = ctx
                    .session
                    .top()
                    .ok_or_else(|| anyhow!("no sheet on the stack"))?;
                let mut copy = sheet.structural_copy(&format!("{}_copy", sheet.name));
                copy.set_rows(sheet.rows().to_vec());
                copy
            };
            ctx.session.push(copy);
            Ok(())
        })
        // -- shaping columns --
        .command("derive-column", "add a column from a name or constant", |ctx| {
            let (sheet_id, completions) = {
                let sheet = ctx
                    .session
                    .top()
                    .ok_or_else(|| anyhow!("no sheet on the stack"))?;
                let names = sheet
                    .columns
                    .iter()
                    .map(|column| column.name().to_owned())
                    .collect();
                (sheet.id(), names)
            };
            ctx.session.prompt_with_completions(
                "derive: ",
                "",
                completions,
                move |session, text| {
                    if text.is_empty() {
                        return Err(anyhow!("nothing to derive from"));
                    }
                    let sheet = session
                        .sheet_mut(sheet_id)
                        .ok_or_else(|| anyhow!("sheet went away"))?;
                    let column = derived_column(sheet, text);
                    let at = sheet.cursor_col_index().map_or(sheet.columns.len(), |i| i + 1);
                    sheet.columns.insert(at, column);
                    sheet.recalc();
                    Ok(())
                },
            );
            Ok(())
        })
        .command("hide-column", "hide the current column", |ctx| {
            let mut name = String::new();
            with_top(ctx, |sheet| {
                let index = cursor_column_index(sheet)?;
                name = sheet.columns[index].name().to_owned();
                sheet.columns[index].width = Some(0);
                Ok(())
            })?;
            ctx.session
                .status(&format!("hid {name}; unhide from the columns sheet"));
            Ok(())
        })
        .command("autosize-column", "size the current column to its contents", |ctx| {
            with_top(ctx, |sheet| {
                let index = cursor_column_index(sheet)?;
                sheet.columns[index].width = None;
                Ok(())
            })
        })
        .command("autosize-all", "size every column to its contents", |ctx| {
            with_top(ctx, |sheet| {
                for column in &mut sheet.columns {
                    if !column.hidden() {
                        column.width = None;
                    }
                }
                Ok(())
            })
        })
        .command("toggle-key-column", "promote or demote the current column as a key", |ctx| {
            with_top(ctx, |sheet| {
                let index = cursor_column_index(sheet)?;
                sheet.toggle_key_column(index);
                Ok(())
            })
        })
        // -- sorting --
        .command("sort-asc", "sort rows by the current column", |ctx| {
            sort_by_cursor(ctx, false)
        })
        .command("sort-desc", "sort rows by the current column, descending", |ctx| {
            sort_by_cursor(ctx, true)
        })
        .command("sort-keys-asc", "sort rows by the key columns", |ctx| {
            sort_by_keys(ctx, false)
        })
        .command("sort-keys-desc", "sort rows by the key columns, descending", |ctx| {
            sort_by_keys(ctx, true)
        })
        // -- column typing --
        .command("type-any", "untype the current column", |ctx| {
            set_cursor_type(ctx, ColumnType::Any)
        })
        .command("type-str", "type the current column as text", |ctx| {
            set_cursor_type(ctx, ColumnType::Str)
        })
        .command("type-int", "type the current column as integer", |ctx| {
            set_cursor_type(ctx, ColumnType::Int)
        })
        .command("type-float", "type the current column as float", |ctx| {
            set_cursor_type(ctx, ColumnType::Float)
        })
        .command("type-currency", "type the current column as currency", |ctx| {
            set_cursor_type(ctx, ColumnType::Currency)
        })
        .command("type-date", "type the current column as date", |ctx| {
            set_cursor_type(ctx, ColumnType::Date)
        })
        // -- derived sheets --
        .command("sheets-sheet", "browse the sheet stack", |ctx| {
            let sheet = meta::sheets_sheet(ctx.session);
            ctx.session.push(sheet);
            Ok(())
        })
        .command("columns-sheet", "browse the current sheet's columns", |ctx| {
            let subject = ctx
                .session
                .top()
                .ok_or_else(|| anyhow!("no sheet on the stack"))?;
            let sheet = meta::columns_sheet(subject);
            ctx.session.push(sheet);
            Ok(())
        })
        .command("options-sheet", "browse and edit options", |ctx| {
            let sheet = meta::options_sheet(ctx.session);
            ctx.session.push(sheet);
            Ok(())
        })
        .command("help-sheet", "browse all keybindings", |ctx| {
            let sheet = meta::help_sheet(ctx.session);
            ctx.session.push(sheet);
            Ok(())
        })
        .command("statuses-sheet", "browse the status history", |ctx| {
            let sheet = meta::status_history_sheet(ctx.session);
            ctx.session.push(sheet);
            Ok(())
        })
        .command("error-sheet", "browse the error history", |ctx| {
            let sheet = meta::errors_sheet(ctx.session);
            ctx.session.push(sheet);
            Ok(())
        })
        .command("error-trace", "open the full trace of the error on the current row", |ctx| {
            let trace = {
                let sheet = ctx
                    .session
                    .top()
                    .ok_or_else(|| anyhow!("no sheet on the stack"))?;
                let row = sheet
                    .cursor_row_handle()
                    .ok_or_else(|| anyhow!("no row under the cursor"))?;
                let cells = row
                    .payload::<crate::row::Cells>()
                    .ok_or_else(|| anyhow!("not an error row"))?;
                cells.get(2).display()
            };
            ctx.session.push(meta::text_sheet("error", &trace));
            Ok(())
        })
        // -- sheet-local targets --
        .command("jump-sheet", "raise the sheet named on the current row", |ctx| {
            let name = {
                let sheet = ctx
                    .session
                    .top()
                    .ok_or_else(|| anyhow!("no sheet on the stack"))?;
                let row = sheet
                    .cursor_row_handle()
                    .ok_or_else(|| anyhow!("no row under the cursor"))?;
                sheet.columns[0].display_cell(&row).text
            };
            ctx.session.remove_top();
            if !ctx.session.raise_named(&name) {
                return Err(anyhow!("no sheet named {name:?}"));
            }
            Ok(())
        })
        .command("edit-option", "edit the option named on the current row", |ctx| {
            let (name, current) = {
                let sheet = ctx
                    .session
                    .top()
                    .ok_or_else(|| anyhow!("no sheet on the stack"))?;
                let row = sheet
                    .cursor_row_handle()
                    .ok_or_else(|| anyhow!("no row under the cursor"))?;
                let cells = row
                    .payload::<crate::row::Cells>()
                    .ok_or_else(|| anyhow!("not an options row"))?;
                (cells.get(0).display(), cells.get(1).display())
            };
            let label = format!("{name} = ");
            ctx.session.prompt(&label, &current, move |session, text| {
                session.options.set(&name, Value::Str(text.to_owned()))?;
                let refreshed = meta::options_sheet(session);
                session.replace(refreshed);
                session.status(&format!("{name} set"));
                Ok(())
            });
            Ok(())
        })
        // -- background work --
        .command("reload-sheet", "reload the current sheet's rows", |ctx| {
            ctx.session.reload_top();
            Ok(())
        })
        .command("cancel-tasks", "cancel tasks running for the current sheet", |ctx| {
            let Some(id) = ctx.session.top().map(|sheet| sheet.id()) else {
                return Ok(());
            };
            let cancelled = ctx.session.tracker.cancel_all_for(id);
            ctx.session
                .status(&format!("cancel requested for {cancelled} tasks"));
            Ok(())
        })
        // -- bindings --
        .bind("q", "quit-sheet")
        .bind("gq", "quit-all")
        .bind("^Q", "quit-dump")
        .bind("j", "cursor-down")
        .bind("Down", "cursor-down")
        .bind("k", "cursor-up")
        .bind("Up", "cursor-up")
        .bind("l", "cursor-right")
        .bind("Right", "cursor-right")
        .bind("h", "cursor-left")
        .bind("Left", "cursor-left")
        .bind("gk", "go-top")
        .bind("gUp", "go-top")
        .bind("gj", "go-bottom")
        .bind("gDown", "go-bottom")
        .bind("gh", "go-leftmost")
        .bind("gLeft", "go-leftmost")
        .bind("gl", "go-rightmost")
        .bind("gRight", "go-rightmost")
        .bind("PgDn", "page-down")
        .bind("PgUp", "page-up")
        .bind("zh", "page-left")
        .bind("zLeft", "page-left")
        .bind("zl", "page-right")
        .bind("zRight", "page-right")
        .bind("s", "select-row")
        .bind("u", "unselect-row")
        .bind("Space", "toggle-row")
        .bind("gs", "select-all")
        .bind("gu", "unselect-all")
        .bind("gSpace", "toggle-all")
        .bind("d", "delete-row")
        .bind("gd", "delete-selected")
        .bind("\"", "dup-sheet")
        .bind("g\"", "dup-sheet-all")
        .bind("e", "edit-cell")
        .bind("ge", "edit-selected")
        .bind("=", "derive-column")
        .bind("-", "hide-column")
        .bind("_", "autosize-column")
        .bind("g_", "autosize-all")
        .bind("!", "toggle-key-column")
        .bind("[", "sort-asc")
        .bind("]", "sort-desc")
        .bind("g[", "sort-keys-asc")
        .bind("g]", "sort-keys-desc")
        .bind("z~", "type-any")
        .bind("~", "type-str")
        .bind("#", "type-int")
        .bind("%", "type-float")
        .bind("$", "type-currency")
        .bind("@", "type-date")
        .bind("S", "sheets-sheet")
        .bind("C", "columns-sheet")
        .bind("O", "options-sheet")
        .bind("F1", "help-sheet")
        .bind("z?", "help-sheet")
        .bind("^P", "statuses-sheet")
        .bind("^E", "error-sheet")
        .bind("^R", "reload-sheet")
        .bind("^C", "cancel-tasks")
        .build()
}

#[cfg(test)]
mod tests {
    use super::{default_commands, default_options};
    use anyhow::{Result, anyhow};
    use crate::row::{Cells, cells_row};
    use crate::session::Session;
    use crate::sheet::Sheet;
    use crate::value::{ColumnType, Value};
    use crate::column::Column;

    fn session() -> Session {
        Session::new(default_options(), default_commands())
    }

    fn fruit_sheet() -> Sheet {
        let rows = vec![
            cells_row(vec![Value::Str("pear".into()), Value::Str("3".into())]),
            cells_row(vec![Value::Str("apple".into()), Value::Str("1".into())]),
            cells_row(vec![Value::Str("plum".into()), Value::Str("2".into())]),
        ];
        Sheet::new(
            "fruit",
            vec![
                Column::indexed("name", ColumnType::Str, 0),
                Column::indexed("count", ColumnType::Int, 1),
            ],
        )
        .with_rows(rows)
    }

    fn cell_text(sheet: &Sheet, row: usize, col: usize) -> String {
        sheet.columns[col].display_cell(&sheet.rows()[row]).text
    }

    #[test]
    fn movement_and_extremes() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("j");
        session.handle_key("l");
        let sheet = session.top().expect("sheet");
        assert_eq!((sheet.cursor_row, sheet.cursor_vis_col), (1, 1));

        session.handle_key("g");
        session.handle_key("j");
        assert_eq!(session.top().expect("sheet").cursor_row, 2);
        session.handle_key("g");
        session.handle_key("k");
        assert_eq!(session.top().expect("sheet").cursor_row, 0);
    }

    #[test]
    fn sort_ascending_by_cursor_column() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("[");
        let sheet = session.top().expect("sheet");
        assert_eq!(cell_text(sheet, 0, 0), "apple");
        assert_eq!(cell_text(sheet, 2, 0), "plum");
    }

    #[test]
    fn select_then_delete_selected() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("s");
        session.handle_key("s");
        session.handle_key("g");
        session.handle_key("d");
        let sheet = session.top().expect("sheet");
        assert_eq!(sheet.n_rows(), 1);
        assert_eq!(cell_text(sheet, 0, 0), "plum");
        assert!(session.left_status().contains("deleted 2 rows"));
    }

    #[test]
    fn delete_single_row_under_cursor() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("d");
        let sheet = session.top().expect("sheet");
        assert_eq!(sheet.n_rows(), 2);
        assert_eq!(cell_text(sheet, 0, 0), "apple");
    }

    #[test]
    fn typing_a_column_changes_rendering() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("l");
        session.handle_key("~");
        let sheet = session.top().expect("sheet");
        assert_eq!(sheet.columns[1].ctype, ColumnType::Str);
    }

    #[test]
    fn hide_and_autosize() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("-");
        let sheet = session.top().expect("sheet");
        assert!(sheet.columns[0].hidden());
        assert_eq!(sheet.n_visible_cols(), 1);
    }

    #[test]
    fn edit_cell_via_prompt() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("e");
        assert!(session.pending_prompt.is_some());
        session.finish_prompt("quince");
        let sheet = session.top().expect("sheet");
        assert_eq!(cell_text(sheet, 0, 0), "quince");
    }

    #[test]
    fn edit_cell_respects_column_type() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("l");
        session.handle_key("e");
        session.finish_prompt("not a number");
        // Coercion failure surfaces as an error, not a mutated cell.
        assert_eq!(session.errors().len(), 1);
        let sheet = session.top().expect("sheet");
        assert_eq!(cell_text(sheet, 0, 1), "3");
    }

    #[test]
    fn derive_column_from_existing_name() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("=");
        session.finish_prompt("name");
        let sheet = session.top().expect("sheet");
        assert_eq!(sheet.columns.len(), 3);
        assert_eq!(cell_text(sheet, 0, 1), "pear");
    }

    #[test]
    fn key_toggle_then_key_sort() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("l");
        session.handle_key("!");
        let sheet = session.top().expect("sheet");
        assert_eq!(sheet.n_keys, 1);
        assert_eq!(sheet.columns[0].name(), "count");

        session.handle_key("g");
        session.handle_key("[");
        let sheet = session.top().expect("sheet");
        assert_eq!(cell_text(sheet, 0, 1), "apple");
    }

    #[test]
    fn dup_sheet_copies_selection_only() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("s");
        session.handle_key("\"");
        let copy = session.top().expect("sheet");
        assert_eq!(copy.name, "fruit_copy");
        assert_eq!(copy.n_rows(), 1);
        assert_eq!(cell_text(copy, 0, 0), "pear");
        assert_eq!(copy.n_selected(), 0);
    }

    #[test]
    fn dup_sheet_without_selection_copies_everything() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("\"");
        assert_eq!(session.top().expect("sheet").n_rows(), 3);
    }

    #[test]
    fn meta_sheets_stack_and_pop() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("S");
        assert_eq!(session.top().expect("sheet").name, "sheets");
        session.handle_key("q");
        assert_eq!(session.top().expect("sheet").name, "fruit");
    }

    #[test]
    fn options_sheet_edit_round_trip() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("O");
        // First registered option is color-current-row (sorted order).
        session.handle_key("e");
        assert!(session.pending_prompt.is_some());
        session.finish_prompt("false");
        assert!(!session.options.get_bool("color-current-row").expect("option"));
        assert_eq!(session.top().expect("sheet").name, "options");
    }

    #[test]
    fn jump_from_sheets_sheet() {
        let mut session = session();
        session.push(fruit_sheet());
        let mut second = fruit_sheet();
        second.name = "veg".to_owned();
        session.push(second);
        session.handle_key("S");
        session.handle_key("j");
        session.execute_command("jump-sheet");
        assert_eq!(session.top().expect("sheet").name, "fruit");
    }

    #[test]
    fn error_sheet_shows_last_trace() {
        let mut session = session();
        session.push(fruit_sheet());
        session.handle_key("g");
        session.handle_key("[");
        assert_eq!(session.errors().len(), 1);
        session.handle_key("^E");
        assert_eq!(session.top().expect("sheet").name, "errors");
        assert_eq!(session.top().expect("sheet").n_rows(), 1);
        session.handle_key("Enter");
        assert_eq!(session.top().expect("sheet").name, "error");
        assert!(session.top().expect("sheet").n_rows() >= 1);
    }

    #[test]
    fn every_past_error_stays_viewable() {
        let mut session = session();
        session.push(fruit_sheet());
        session.report(&anyhow!("disk full"));
        session.report(&anyhow!("network down"));
        session.handle_key("^E");
        assert_eq!(session.top().expect("sheet").n_rows(), 2);

        // Newest first under the cursor.
        session.handle_key("Enter");
        let top = session.top().expect("sheet");
        let line = top.columns[0].display_cell(&top.rows()[0]).text;
        assert!(line.contains("network down"));

        // Pop back and open the older entry.
        session.handle_key("q");
        session.handle_key("j");
        session.handle_key("Enter");
        let top = session.top().expect("sheet");
        let line = top.columns[0].display_cell(&top.rows()[0]).text;
        assert!(line.contains("disk full"));
    }

    #[test]
    fn poll_interval_is_a_registered_option() -> Result<()> {
        let options = default_options();
        assert_eq!(options.get_int("poll-interval-ms")?, 120);
        Ok(())
    }
}
