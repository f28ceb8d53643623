// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::error::{Cancelled, is_cancelled};
use crate::session::Session;
use crate::sheet::SheetId;
use anyhow::Result;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use time::OffsetDateTime;

const ERROR_HISTORY_CAP: usize = 100;

/// What a background task sends back to the main loop. Tasks never
/// touch sheets directly; mutations travel as closures applied between
/// frames, which keeps all cursor/viewport/row mutation on one thread.
pub enum TaskEvent {
    Status(String),
    Apply(Box<dyn FnOnce(&mut Session) + Send>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    pub at: OffsetDateTime,
    pub summary: String,
    pub trace: String,
}

/// Rolling, most-recent-first error history. The one piece of state
/// mutated from both the main loop and task wrapper threads, hence the
/// mutex.
#[derive(Clone, Default)]
pub struct ErrorLog(Arc<Mutex<VecDeque<ErrorEntry>>>);

impl ErrorLog {
    pub fn push(&self, error: &anyhow::Error) {
        let entry = ErrorEntry {
            at: OffsetDateTime::now_utc(),
            summary: format!("{error:#}"),
            trace: format!("{error:?}"),
        };
        if let Ok(mut entries) = self.0.lock() {
            entries.push_front(entry);
            entries.truncate(ERROR_HISTORY_CAP);
        }
    }

    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.0
            .lock()
            .map(|entries| entries.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn most_recent(&self) -> Option<ErrorEntry> {
        self.0
            .lock()
            .ok()
            .and_then(|entries| entries.front().cloned())
    }

    pub fn len(&self) -> usize {
        self.0.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counters for one in-flight iteration, registered on the owning
/// sheet's progress list for its scope.
pub struct ProgressCounters {
    done: AtomicUsize,
    total: AtomicUsize,
}

struct TaskShared {
    ended: Mutex<Option<OffsetDateTime>>,
    status: Mutex<String>,
    cancel: AtomicBool,
    progress: Mutex<Vec<Arc<ProgressCounters>>>,
}

impl TaskShared {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            ended: Mutex::new(None),
            status: Mutex::new("running".to_owned()),
            cancel: AtomicBool::new(false),
            progress: Mutex::new(Vec::new()),
        })
    }

    fn set_status(&self, status: &str) {
        if let Ok(mut held) = self.status.lock() {
            *held = status.to_owned();
        }
    }

    fn finish(&self) {
        if let Ok(mut ended) = self.ended.lock() {
            *ended = Some(OffsetDateTime::now_utc());
        }
        if let Ok(mut progress) = self.progress.lock() {
            progress.clear();
        }
    }
}

/// One background operation. Owned sheet is captured at spawn time: a
/// task belongs to whichever sheet was on top when it launched, no
/// matter how the stack changes afterward.
pub struct Task {
    pub name: String,
    pub sheet: SheetId,
    pub started: OffsetDateTime,
    shared: Arc<TaskShared>,
}

impl Task {
    pub fn finished(&self) -> bool {
        self.shared
            .ended
            .lock()
            .map(|ended| ended.is_some())
            .unwrap_or(true)
    }

    pub fn ended(&self) -> Option<OffsetDateTime> {
        self.shared.ended.lock().ok().and_then(|ended| *ended)
    }

    pub fn status(&self) -> String {
        self.shared
            .status
            .lock()
            .map(|status| status.clone())
            .unwrap_or_default()
    }

    /// Request cooperative cancellation; the body notices at its next
    /// check.
    pub fn cancel(&self) {
        self.shared.cancel.store(true, Ordering::Relaxed);
    }

    fn progress_totals(&self) -> Option<(usize, usize)> {
        let progress = self.shared.progress.lock().ok()?;
        if progress.is_empty() {
            return None;
        }
        let mut done = 0;
        let mut total = 0;
        for counters in progress.iter() {
            done += counters.done.load(Ordering::Relaxed);
            total += counters.total.load(Ordering::Relaxed);
        }
        Some((done, total))
    }
}

/// Handed to every task body: cancellation checks, progress scopes, and
/// the event channel back to the main loop.
pub struct TaskCtx {
    shared: Arc<TaskShared>,
    tx: Sender<TaskEvent>,
}

impl TaskCtx {
    pub fn cancelled(&self) -> bool {
        self.shared.cancel.load(Ordering::Relaxed)
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancelled() {
            return Err(Cancelled.into());
        }
        Ok(())
    }

    pub fn set_status(&self, status: &str) {
        self.shared.set_status(status);
    }

    pub fn send(&self, event: TaskEvent) {
        let _ = self.tx.send(event);
    }

    /// Open a progress scope over `total` steps. Deregistration is
    /// guaranteed on every exit path, including panics and early
    /// returns, so a crashed iteration never leaves a stale bar.
    pub fn progress(&self, total: usize) -> Progress {
        let counters = Arc::new(ProgressCounters {
            done: AtomicUsize::new(0),
            total: AtomicUsize::new(total),
        });
        if let Ok(mut progress) = self.shared.progress.lock() {
            progress.push(Arc::clone(&counters));
        }
        Progress {
            counters,
            shared: Arc::clone(&self.shared),
        }
    }
}

pub struct Progress {
    counters: Arc<ProgressCounters>,
    shared: Arc<TaskShared>,
}

impl Progress {
    pub fn inc(&self) {
        self.counters.done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: usize) {
        self.counters.done.fetch_add(n, Ordering::Relaxed);
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if let Ok(mut progress) = self.shared.progress.lock() {
            progress.retain(|counters| !Arc::ptr_eq(counters, &self.counters));
        }
    }
}

/// Spawns background operations as independent threads and tracks them
/// per sheet. The tracker itself lives on the main thread; threads only
/// touch their own `TaskShared`, the error log, and the event channel.
pub struct TaskTracker {
    tasks: Vec<Task>,
    tx: Sender<TaskEvent>,
    errors: ErrorLog,
}

impl TaskTracker {
    pub fn new(tx: Sender<TaskEvent>, errors: ErrorLog) -> Self {
        Self {
            tasks: Vec::new(),
            tx,
            errors,
        }
    }

    /// Launch `body` on its own thread, attributed to `sheet`. The
    /// wrapper records cancellation as "aborted by user" without logging
    /// an error; any other failure lands in both the task status and the
    /// global error history. Either way the task leaves the active list
    /// on exit and stays in the history.
    pub fn spawn<F>(&mut self, name: &str, sheet: SheetId, body: F)
    where
        F: FnOnce(&TaskCtx) -> Result<()> + Send + 'static,
    {
        let shared = TaskShared::new();
        self.tasks.push(Task {
            name: name.to_owned(),
            sheet,
            started: OffsetDateTime::now_utc(),
            shared: Arc::clone(&shared),
        });

        let ctx = TaskCtx {
            shared: Arc::clone(&shared),
            tx: self.tx.clone(),
        };
        let errors = self.errors.clone();
        let task_name = name.to_owned();
        thread::spawn(move || {
            match body(&ctx) {
                Ok(()) => ctx.shared.set_status("complete"),
                Err(error) if is_cancelled(&error) => {
                    ctx.shared.set_status("aborted by user");
                }
                Err(error) => {
                    let summary = format!("{task_name}: {error:#}");
                    ctx.shared.set_status(&summary);
                    errors.push(&error);
                    let _ = ctx.tx.send(TaskEvent::Status(summary));
                }
            }
            ctx.shared.finish();
        });
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn unfinished(&self) -> usize {
        self.tasks.iter().filter(|task| !task.finished()).count()
    }

    /// Active (not yet finished) tasks owned by one sheet.
    pub fn active_for(&self, sheet: SheetId) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| task.sheet == sheet && !task.finished())
            .collect()
    }

    /// Aggregate progress across a sheet's active tasks, if any scope is
    /// open.
    pub fn progress_for(&self, sheet: SheetId) -> Option<(usize, usize)> {
        let mut done = 0;
        let mut total = 0;
        let mut any = false;
        for task in self.active_for(sheet) {
            if let Some((task_done, task_total)) = task.progress_totals() {
                done += task_done;
                total += task_total;
                any = true;
            }
        }
        any.then_some((done, total))
    }

    pub fn cancel_all_for(&self, sheet: SheetId) -> usize {
        let active = self.active_for(sheet);
        for task in &active {
            task.cancel();
        }
        active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorLog, TaskEvent, TaskTracker};
    use crate::sheet::{Sheet, SheetId};
    use anyhow::{Result, anyhow};
    use std::sync::mpsc;
    use std::time::Duration;

    fn sheet_id() -> SheetId {
        Sheet::new("t", Vec::new()).id()
    }

    fn wait_for_finish(tracker: &TaskTracker) {
        for _ in 0..200 {
            if tracker.unfinished() == 0 {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("tasks did not finish in time");
    }

    #[test]
    fn completed_task_leaves_active_list_but_stays_in_history() -> Result<()> {
        let (tx, _rx) = mpsc::channel();
        let errors = ErrorLog::default();
        let mut tracker = TaskTracker::new(tx, errors.clone());
        let owner = sheet_id();

        let (done_tx, done_rx) = mpsc::channel();
        tracker.spawn("count", owner, move |ctx| {
            let progress = ctx.progress(10);
            for _ in 0..10 {
                ctx.check_cancelled()?;
                progress.inc();
            }
            done_tx.send(()).ok();
            Ok(())
        });
        assert_eq!(tracker.active_for(owner).len(), 1);

        done_rx.recv_timeout(Duration::from_secs(2))?;
        wait_for_finish(&tracker);
        assert!(tracker.active_for(owner).is_empty());
        assert_eq!(tracker.tasks().len(), 1);
        assert_eq!(tracker.tasks()[0].status(), "complete");
        assert!(errors.is_empty());
        Ok(())
    }

    #[test]
    fn task_attribution_sticks_to_the_spawning_sheet() {
        let (tx, _rx) = mpsc::channel();
        let mut tracker = TaskTracker::new(tx, ErrorLog::default());
        let first = sheet_id();
        let second = sheet_id();

        let (release_tx, release_rx) = mpsc::channel::<()>();
        tracker.spawn("slow", first, move |_ctx| {
            release_rx.recv().ok();
            Ok(())
        });

        // A different sheet becoming active never inherits the task.
        assert_eq!(tracker.active_for(first).len(), 1);
        assert!(tracker.active_for(second).is_empty());

        release_tx.send(()).ok();
        wait_for_finish(&tracker);
        assert!(tracker.active_for(first).is_empty());
    }

    #[test]
    fn failed_task_is_logged_and_statused() {
        let (tx, rx) = mpsc::channel();
        let errors = ErrorLog::default();
        let mut tracker = TaskTracker::new(tx, errors.clone());

        tracker.spawn("explode", sheet_id(), |_ctx| Err(anyhow!("boom")));
        wait_for_finish(&tracker);

        assert_eq!(errors.len(), 1);
        assert!(errors.most_recent().expect("entry").summary.contains("boom"));
        assert!(tracker.tasks()[0].status().contains("boom"));
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(TaskEvent::Status(status)) => assert!(status.contains("explode")),
            _ => panic!("expected a status event"),
        }
    }

    #[test]
    fn cancelled_task_records_abort_without_an_error() {
        let (tx, _rx) = mpsc::channel();
        let errors = ErrorLog::default();
        let mut tracker = TaskTracker::new(tx, errors.clone());
        let owner = sheet_id();

        let (started_tx, started_rx) = mpsc::channel();
        tracker.spawn("cancellable", owner, move |ctx| {
            started_tx.send(()).ok();
            loop {
                ctx.check_cancelled()?;
                std::thread::sleep(Duration::from_millis(2));
            }
        });
        started_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("task should start");

        assert_eq!(tracker.cancel_all_for(owner), 1);
        wait_for_finish(&tracker);
        assert_eq!(tracker.tasks()[0].status(), "aborted by user");
        assert!(errors.is_empty());
    }

    #[test]
    fn progress_scope_deregisters_on_drop() {
        let (tx, _rx) = mpsc::channel();
        let mut tracker = TaskTracker::new(tx, ErrorLog::default());
        let owner = sheet_id();

        let (checked_tx, checked_rx) = mpsc::channel::<()>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        tracker.spawn("staged", owner, move |ctx| {
            {
                let progress = ctx.progress(4);
                progress.add(2);
                checked_tx.send(()).ok();
                release_rx.recv().ok();
            }
            checked_tx.send(()).ok();
            release_rx.recv().ok();
            Ok(())
        });

        checked_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("scope should open");
        assert_eq!(tracker.progress_for(owner), Some((2, 4)));

        release_tx.send(()).ok();
        checked_rx
            .recv_timeout(Duration::from_secs(2))
            .expect("scope should close");
        assert_eq!(tracker.progress_for(owner), None);

        release_tx.send(()).ok();
        wait_for_finish(&tracker);
    }

    #[test]
    fn error_log_is_bounded_and_most_recent_first() {
        let errors = ErrorLog::default();
        for index in 0..120 {
            errors.push(&anyhow!("error {index}"));
        }
        assert_eq!(errors.len(), 100);
        assert!(errors.most_recent().expect("entry").summary.contains("error 119"));
    }
}
