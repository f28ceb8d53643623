// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::command::{CommandSet, ExecCtx, Prefixes};
use crate::error::is_cancelled;
use crate::options::Options;
use crate::sheet::{Sheet, SheetId};
use crate::tasks::{ErrorLog, TaskEvent, TaskTracker};
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;
use time::OffsetDateTime;

const STATUS_HISTORY_CAP: usize = 100;

/// A pending request for one line of user input. Commands that need a
/// value park one of these on the session; the front end drives the
/// line editor and hands the committed text back to `finish_prompt`.
pub struct Prompt {
    pub label: String,
    pub initial: String,
    pub completions: Vec<String>,
    on_submit: Box<dyn FnOnce(&mut Session, &str) -> Result<()> + Send>,
}

/// The application controller: the sheet stack (index 0 = top/active),
/// status and error histories, the command table, the option registry,
/// and the background task tracker.
pub struct Session {
    stack: Vec<Sheet>,
    pub options: Options,
    commands: Arc<CommandSet>,
    pub tracker: TaskTracker,
    events: Receiver<TaskEvent>,
    errors: ErrorLog,
    transient_status: Vec<String>,
    status_history: VecDeque<(OffsetDateTime, String)>,
    prefixes: Prefixes,
    pub pending_prompt: Option<Prompt>,
    screen: (u16, usize),
    quit: bool,
    hard_quit: bool,
}

impl Session {
    pub fn new(options: Options, commands: Arc<CommandSet>) -> Self {
        let (tx, events) = mpsc::channel();
        let errors = ErrorLog::default();
        Self {
            stack: Vec::new(),
            options,
            commands,
            tracker: TaskTracker::new(tx, errors.clone()),
            events,
            errors,
            transient_status: Vec::new(),
            status_history: VecDeque::new(),
            prefixes: Prefixes::default(),
            pending_prompt: None,
            screen: (80, 24),
            quit: false,
            hard_quit: false,
        }
    }

    /// Most recent drawable area, updated by the front end each frame.
    /// Commands that page or lay out columns read it from here.
    pub fn set_screen(&mut self, area_width: u16, n_screen_rows: usize) {
        self.screen = (area_width, n_screen_rows);
    }

    pub fn screen(&self) -> (u16, usize) {
        self.screen
    }

    // ---- sheet stack ----

    pub fn stack(&self) -> &[Sheet] {
        &self.stack
    }

    pub fn top(&self) -> Option<&Sheet> {
        self.stack.first()
    }

    pub fn top_mut(&mut self) -> Option<&mut Sheet> {
        self.stack.first_mut()
    }

    pub fn sheet_mut(&mut self, id: SheetId) -> Option<&mut Sheet> {
        self.stack.iter_mut().find(|sheet| sheet.id() == id)
    }

    /// Put a sheet on top. A sheet already on the stack moves instead of
    /// duplicating; a never-loaded sheet with a loader reloads in the
    /// background.
    pub fn push(&mut self, sheet: Sheet) {
        let id = sheet.id();
        if let Some(position) = self.stack.iter().position(|held| held.id() == id) {
            let held = self.stack.remove(position);
            self.stack.insert(0, held);
            return;
        }
        let needs_load = !sheet.is_loaded();
        let has_loader = sheet.has_loader();
        self.stack.insert(0, sheet);
        if needs_load {
            if has_loader {
                self.spawn_reload(id);
            } else {
                self.status("no row source bound; sheet stays empty");
            }
        }
    }

    /// Pop the current top, then push. Used by commands that become a
    /// different view rather than stacking on top.
    pub fn replace(&mut self, sheet: Sheet) {
        if !self.stack.is_empty() {
            self.stack.remove(0);
        }
        self.push(sheet);
    }

    /// Raise the first sheet with this name to the top. Returns false
    /// when no stacked sheet matches.
    pub fn raise_named(&mut self, name: &str) -> bool {
        let Some(position) = self.stack.iter().position(|sheet| sheet.name == name) else {
            return false;
        };
        let sheet = self.stack.remove(position);
        self.stack.insert(0, sheet);
        true
    }

    pub fn remove_top(&mut self) -> Option<Sheet> {
        if self.stack.is_empty() {
            None
        } else {
            Some(self.stack.remove(0))
        }
    }

    /// Reload the top sheet's rows on a background task.
    pub fn reload_top(&mut self) {
        let Some(sheet) = self.top() else {
            return;
        };
        if sheet.has_loader() {
            let id = sheet.id();
            self.spawn_reload(id);
        } else {
            self.status("no row source bound; nothing to reload");
        }
    }

    fn spawn_reload(&mut self, id: SheetId) {
        let Some(loader) = self.sheet_mut(id).and_then(|sheet| sheet.loader()) else {
            return;
        };
        self.tracker.spawn("reload", id, move |ctx| {
            let rows = loader()?;
            ctx.check_cancelled()?;
            let count = rows.len();
            ctx.send(TaskEvent::Apply(Box::new(move |session| {
                if let Some(sheet) = session.sheet_mut(id) {
                    sheet.set_rows(rows);
                    sheet.recalc();
                }
                session.status(&format!("loaded {count} rows"));
            })));
            Ok(())
        });
    }

    // ---- status & errors ----

    pub fn status(&mut self, message: &str) {
        self.transient_status.push(message.to_owned());
        self.status_history
            .push_front((OffsetDateTime::now_utc(), message.to_owned()));
        self.status_history.truncate(STATUS_HISTORY_CAP);
    }

    pub fn transient_status(&self) -> &[String] {
        &self.transient_status
    }

    pub fn clear_transient_status(&mut self) {
        self.transient_status.clear();
    }

    pub fn status_history(&self) -> impl Iterator<Item = &(OffsetDateTime, String)> {
        self.status_history.iter()
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    pub fn report(&mut self, error: &anyhow::Error) {
        self.errors.push(error);
        self.status(&format!("{error:#}"));
    }

    // ---- quitting ----

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    /// Short-circuit the loop; the front end surfaces the most recent
    /// error trace instead of continuing.
    pub fn request_hard_quit(&mut self) {
        self.quit = true;
        self.hard_quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.quit || self.stack.is_empty()
    }

    pub fn hard_quit_requested(&self) -> bool {
        self.hard_quit
    }

    pub fn last_error_trace(&self) -> Option<String> {
        self.errors.most_recent().map(|entry| entry.trace)
    }

    // ---- keystroke dispatch ----

    pub fn pending_prefixes(&self) -> Prefixes {
        self.prefixes
    }

    /// Feed one decoded keystroke. Prefixes buffer until a non-prefix
    /// key arrives; transient status clears only once a complete
    /// sequence is processed, so timeout ticks never wipe messages.
    pub fn handle_key(&mut self, keystroke: &str) {
        if self.prefixes.absorb(keystroke) {
            return;
        }
        let prefixes = std::mem::take(&mut self.prefixes);
        let keyseq = prefixes.apply_to(keystroke);
        self.clear_transient_status();
        self.execute_keyseq(&keyseq, prefixes);
    }

    fn execute_keyseq(&mut self, keyseq: &str, prefixes: Prefixes) {
        let commands = Arc::clone(&self.commands);
        let sheet_binding = self
            .top()
            .and_then(|sheet| sheet.binding(keyseq))
            .map(str::to_owned);
        let Some(command) = commands.resolve(sheet_binding.as_deref(), keyseq) else {
            return;
        };
        let command = command.clone();
        let mut ctx = ExecCtx {
            session: self,
            keystroke: keyseq.to_owned(),
            prefixes,
        };
        if let Err(error) = command.run(&mut ctx) {
            if is_cancelled(&error) {
                self.status("aborted");
            } else {
                self.report(&error);
            }
        }
    }

    /// Run a named command directly (help sheets, tests, batch mode).
    pub fn execute_command(&mut self, name: &str) {
        let commands = Arc::clone(&self.commands);
        let Some(command) = commands.command(name) else {
            self.status(&format!("no such command {name:?}"));
            return;
        };
        let command = command.clone();
        let mut ctx = ExecCtx {
            session: self,
            keystroke: String::new(),
            prefixes: Prefixes::default(),
        };
        if let Err(error) = command.run(&mut ctx) {
            if is_cancelled(&error) {
                self.status("aborted");
            } else {
                self.report(&error);
            }
        }
    }

    pub fn commands(&self) -> &Arc<CommandSet> {
        &self.commands
    }

    // ---- prompting ----

    pub fn prompt<F>(&mut self, label: &str, initial: &str, on_submit: F)
    where
        F: FnOnce(&mut Session, &str) -> Result<()> + Send + 'static,
    {
        self.pending_prompt = Some(Prompt {
            label: label.to_owned(),
            initial: initial.to_owned(),
            completions: Vec::new(),
            on_submit: Box::new(on_submit),
        });
    }

    pub fn prompt_with_completions<F>(
        &mut self,
        label: &str,
        initial: &str,
        completions: Vec<String>,
        on_submit: F,
    ) where
        F: FnOnce(&mut Session, &str) -> Result<()> + Send + 'static,
    {
        self.prompt(label, initial, on_submit);
        if let Some(prompt) = &mut self.pending_prompt {
            prompt.completions = completions;
        }
    }

    /// Apply a committed prompt value. Cancellation unwinds with a
    /// neutral status, same as command dispatch.
    pub fn finish_prompt(&mut self, text: &str) {
        let Some(prompt) = self.pending_prompt.take() else {
            return;
        };
        if let Err(error) = (prompt.on_submit)(self, text) {
            if is_cancelled(&error) {
                self.status("aborted");
            } else {
                self.report(&error);
            }
        }
    }

    pub fn cancel_prompt(&mut self) {
        if self.pending_prompt.take().is_some() {
            self.status("aborted");
        }
    }

    // ---- background work ----

    /// Drain finished-task events and apply their effects. Runs once per
    /// main-loop iteration, before drawing.
    pub fn reap_tasks(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                TaskEvent::Status(message) => self.status(&message),
                TaskEvent::Apply(apply) => apply(self),
            }
        }
    }

    /// Block until no more than `expected` tasks remain unfinished.
    /// Non-interactive entry points call this before exiting.
    pub fn sync(&mut self, expected: usize) {
        loop {
            self.reap_tasks();
            if self.tracker.unfinished() <= expected {
                return;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }

    // ---- status line composition ----

    /// Left status: sheet name plus accumulated transient messages.
    pub fn left_status(&self) -> String {
        let mut parts = Vec::new();
        if let Some(sheet) = self.top() {
            parts.push(sheet.name.clone());
        }
        parts.extend(self.transient_status.iter().cloned());
        parts.join(" | ")
    }

    /// Right status: in-progress percentage while the active sheet has
    /// tasks running, row/column counts otherwise.
    pub fn right_status(&self) -> String {
        let Some(sheet) = self.top() else {
            return String::new();
        };
        if let Some((done, total)) = self.tracker.progress_for(sheet.id()) {
            let percent = if total == 0 {
                100
            } else {
                done * 100 / total
            };
            return format!("{percent:3}%");
        }
        if !self.tracker.active_for(sheet.id()).is_empty() {
            return "working".to_owned();
        }
        let prefix_label = self.prefixes.label();
        let counts = format!("{} rows {} cols", sheet.n_rows(), sheet.n_visible_cols());
        if prefix_label.is_empty() {
            counts
        } else {
            format!("{prefix_label}- {counts}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Session;
    use crate::command::CommandSet;
    use crate::column::Column;
    use crate::options::Options;
    use crate::row::cells_row;
    use crate::sheet::Sheet;
    use crate::value::{ColumnType, Value};
    use anyhow::anyhow;
    use std::sync::Arc;

    fn session() -> Session {
        let commands = CommandSet::builder()
            .command("cursor-down", "move down one row", |ctx| {
                if let Some(sheet) = ctx.session.top_mut() {
                    sheet.cursor_down(1);
                }
                Ok(())
            })
            .command("fail", "always fails", |_ctx| Err(anyhow!("deliberate")))
            .command("abort", "always cancels", |_ctx| {
                Err(crate::error::Cancelled.into())
            })
            .bind("j", "cursor-down")
            .bind("x", "fail")
            .bind("c", "abort")
            .build();
        Session::new(Options::new(), commands)
    }

    fn loaded_sheet(name: &str, n: usize) -> Sheet {
        let rows = (0..n)
            .map(|index| cells_row(vec![Value::Int(index as i64)]))
            .collect();
        Sheet::new(name, vec![Column::indexed("n", ColumnType::Int, 0)]).with_rows(rows)
    }

    #[test]
    fn push_moves_existing_sheet_instead_of_duplicating() {
        let mut session = session();
        let first = loaded_sheet("first", 1);
        let second = loaded_sheet("second", 1);
        let first_id = first.id();

        session.push(first);
        session.push(second);
        assert_eq!(session.top().map(|sheet| sheet.name.as_str()), Some("second"));

        let re_pushed = session.remove_top().expect("second on top");
        session.push(re_pushed);
        // Pushing a sheet whose id is already stacked just raises it.
        let again = loaded_sheet("first-lookalike", 1);
        session.push(again);
        assert_eq!(session.stack().len(), 3);

        let position = session
            .stack()
            .iter()
            .position(|sheet| sheet.id() == first_id);
        assert_eq!(position, Some(2));
    }

    #[test]
    fn push_of_unloaded_sheet_triggers_background_reload() {
        let mut session = session();
        let sheet = Sheet::new(
            "lazy",
            vec![Column::indexed("n", ColumnType::Int, 0)],
        )
        .with_loader(Arc::new(|| {
            Ok(vec![cells_row(vec![Value::Int(1)]), cells_row(vec![Value::Int(2)])])
        }));
        session.push(sheet);

        session.sync(0);
        let top = session.top().expect("sheet on top");
        assert!(top.is_loaded());
        assert_eq!(top.n_rows(), 2);
    }

    #[test]
    fn push_of_loaded_empty_sheet_does_not_reload() {
        let mut session = session();
        let sheet = loaded_sheet("empty", 0);
        session.push(sheet);
        session.sync(0);
        assert_eq!(session.tracker.tasks().len(), 0);
    }

    #[test]
    fn replace_swaps_the_top_sheet() {
        let mut session = session();
        session.push(loaded_sheet("first", 1));
        session.push(loaded_sheet("second", 1));
        session.replace(loaded_sheet("third", 1));

        let names: Vec<&str> = session
            .stack()
            .iter()
            .map(|sheet| sheet.name.as_str())
            .collect();
        assert_eq!(names, vec!["third", "first"]);
    }

    #[test]
    fn keystrokes_dispatch_against_the_top_sheet() {
        let mut session = session();
        session.push(loaded_sheet("rows", 5));
        session.handle_key("j");
        session.handle_key("j");
        assert_eq!(session.top().expect("sheet").cursor_row, 2);
    }

    #[test]
    fn prefix_keys_buffer_until_a_full_sequence() {
        let mut session = session();
        session.push(loaded_sheet("rows", 3));
        session.handle_key("g");
        assert!(!session.pending_prefixes().is_empty());
        // Unbound sequence: prefixes consumed, nothing executed.
        session.handle_key("j");
        assert!(session.pending_prefixes().is_empty());
        assert_eq!(session.top().expect("sheet").cursor_row, 0);
    }

    #[test]
    fn command_failure_lands_in_error_log_and_status() {
        let mut session = session();
        session.push(loaded_sheet("rows", 1));
        session.handle_key("x");
        assert_eq!(session.errors().len(), 1);
        assert!(session.left_status().contains("deliberate"));
        // The session stays usable.
        session.handle_key("j");
        assert_eq!(session.errors().len(), 1);
    }

    #[test]
    fn cancellation_is_not_an_error() {
        let mut session = session();
        session.push(loaded_sheet("rows", 1));
        session.handle_key("c");
        assert!(session.errors().is_empty());
        assert!(session.left_status().contains("aborted"));
    }

    #[test]
    fn transient_status_clears_on_next_complete_keystroke() {
        let mut session = session();
        session.push(loaded_sheet("rows", 2));
        session.status("hello");
        assert!(session.left_status().contains("hello"));

        // A bare prefix does not clear it.
        session.handle_key("g");
        assert!(session.left_status().contains("hello"));

        session.handle_key("j");
        assert!(!session.left_status().contains("hello"));
    }

    #[test]
    fn prompt_round_trip_applies_the_continuation() {
        let mut session = session();
        session.push(loaded_sheet("rows", 1));
        session.prompt("rename", "old", |session, text| {
            if let Some(sheet) = session.top_mut() {
                sheet.name = text.to_owned();
            }
            Ok(())
        });
        assert!(session.pending_prompt.is_some());

        session.finish_prompt("renamed");
        assert!(session.pending_prompt.is_none());
        assert_eq!(session.top().expect("sheet").name, "renamed");
    }

    #[test]
    fn cancelled_prompt_leaves_state_untouched() {
        let mut session = session();
        session.push(loaded_sheet("rows", 1));
        session.prompt("rename", "old", |session, text| {
            session.top_mut().expect("sheet").name = text.to_owned();
            Ok(())
        });
        session.cancel_prompt();
        assert_eq!(session.top().expect("sheet").name, "rows");
        assert!(session.left_status().contains("aborted"));
    }

    #[test]
    fn session_quits_when_stack_empties() {
        let mut session = session();
        session.push(loaded_sheet("only", 1));
        assert!(!session.should_quit());
        session.remove_top();
        assert!(session.should_quit());
    }

    #[test]
    fn right_status_shows_counts() {
        let mut session = session();
        session.push(loaded_sheet("rows", 7));
        assert_eq!(session.right_status(), "7 rows 1 cols");
    }
}
