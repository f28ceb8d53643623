// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

/// What a keystroke did to the editor. `Pending` means keep editing;
/// the other outcomes end the session one way or another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Pending,
    Done(String),
    Cancelled,
    /// Hand the buffer to an external editor; the driver resumes with
    /// `replace_buffer` once it returns.
    External,
}

/// Single-line editor state machine. Keystrokes arrive already decoded
/// (the same representation command dispatch uses), so the editor has
/// no terminal dependency and tests drive it with plain strings.
pub struct LineEditor {
    buffer: Vec<char>,
    cursor: usize,
    history: Vec<String>,
    history_pos: Option<usize>,
    in_progress: String,
    completions: Vec<String>,
    completion_pos: Option<usize>,
    completion_stem: String,
    literal_next: bool,
}

impl LineEditor {
    pub fn new(initial: &str) -> Self {
        let buffer: Vec<char> = initial.chars().collect();
        let cursor = buffer.len();
        Self {
            buffer,
            cursor,
            history: Vec::new(),
            history_pos: None,
            in_progress: String::new(),
            completions: Vec::new(),
            completion_pos: None,
            completion_stem: String::new(),
            literal_next: false,
        }
    }

    /// Older entries first; Up walks from the most recent backwards.
    pub fn with_history(mut self, history: Vec<String>) -> Self {
        self.history = history;
        self
    }

    pub fn with_completions(mut self, completions: Vec<String>) -> Self {
        self.completions = completions;
        self
    }

    pub fn text(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn replace_buffer(&mut self, text: &str) {
        self.buffer = text.chars().collect();
        self.cursor = self.buffer.len();
    }

    pub fn handle_key(&mut self, keystroke: &str) -> EditOutcome {
        if self.literal_next {
            self.literal_next = false;
            if let Some(ch) = single_char(keystroke) {
                self.insert(ch);
                return EditOutcome::Pending;
            }
        }
        match keystroke {
            "Enter" => return EditOutcome::Done(self.text()),
            "Esc" | "^C" | "^G" => return EditOutcome::Cancelled,
            "^O" => return EditOutcome::External,
            "Left" | "^B" => self.cursor = self.cursor.saturating_sub(1),
            "Right" | "^F" => self.cursor = (self.cursor + 1).min(self.buffer.len()),
            "Home" | "^A" => self.cursor = 0,
            "End" | "^E" => self.cursor = self.buffer.len(),
            "Backspace" | "^H" => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.buffer.remove(self.cursor);
                    self.reset_completion();
                }
            }
            "Del" | "^D" => {
                if self.cursor < self.buffer.len() {
                    self.buffer.remove(self.cursor);
                    self.reset_completion();
                }
            }
            "^K" => {
                self.buffer.truncate(self.cursor);
                self.reset_completion();
            }
            "^U" => {
                self.buffer.drain(..self.cursor);
                self.cursor = 0;
                self.reset_completion();
            }
            "^T" => self.transpose(),
            "^V" => self.literal_next = true,
            "Up" => self.history_back(),
            "Down" => self.history_forward(),
            "Tab" => self.complete(1),
            "BTab" => self.complete(-1),
            other => {
                if let Some(ch) = single_char(other) {
                    self.insert(ch);
                }
            }
        }
        EditOutcome::Pending
    }

    fn insert(&mut self, ch: char) {
        self.buffer.insert(self.cursor, ch);
        self.cursor += 1;
        self.reset_completion();
    }

    /// Swap the two characters before the cursor, emacs style.
    fn transpose(&mut self) {
        if self.cursor >= 2 {
            self.buffer.swap(self.cursor - 2, self.cursor - 1);
        } else if self.cursor == 1 && self.buffer.len() >= 2 {
            self.buffer.swap(0, 1);
            self.cursor = 2;
        }
    }

    fn history_back(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.history_pos {
            // First Up snapshots whatever was being typed.
            None => {
                self.in_progress = self.text();
                self.history.len() - 1
            }
            Some(0) => 0,
            Some(index) => index - 1,
        };
        self.history_pos = Some(next);
        self.replace_buffer(&self.history[next].clone());
    }

    fn history_forward(&mut self) {
        let Some(index) = self.history_pos else {
            return;
        };
        if index + 1 < self.history.len() {
            self.history_pos = Some(index + 1);
            self.replace_buffer(&self.history[index + 1].clone());
        } else {
            self.history_pos = None;
            let restored = std::mem::take(&mut self.in_progress);
            self.replace_buffer(&restored);
        }
    }

    /// Cycle through completions sharing the stem typed before the
    /// first Tab; direction -1 cycles backwards.
    fn complete(&mut self, direction: isize) {
        if self.completions.is_empty() {
            return;
        }
        if self.completion_pos.is_none() {
            self.completion_stem = self.text();
        }
        let matches: Vec<usize> = self
            .completions
            .iter()
            .enumerate()
            .filter(|(_, candidate)| candidate.starts_with(&self.completion_stem))
            .map(|(index, _)| index)
            .collect();
        if matches.is_empty() {
            return;
        }
        let position = match self.completion_pos {
            None => {
                if direction > 0 {
                    0
                } else {
                    matches.len() - 1
                }
            }
            Some(current) => {
                let current = matches.iter().position(|&m| m == current).unwrap_or(0);
                ((current as isize + direction).rem_euclid(matches.len() as isize)) as usize
            }
        };
        let chosen = matches[position];
        self.completion_pos = Some(chosen);
        self.replace_buffer(&self.completions[chosen].clone());
    }

    fn reset_completion(&mut self) {
        self.completion_pos = None;
    }

    /// The buffer windowed to `width` characters with the cursor kept
    /// in view; clipped edges are marked with an ellipsis.
    pub fn display(&self, width: usize) -> String {
        if self.buffer.len() <= width {
            return self.text();
        }
        let visible = width.saturating_sub(2).max(1);
        let start = self
            .cursor
            .saturating_sub(visible)
            .min(self.buffer.len() - visible);
        let end = (start + visible).min(self.buffer.len());
        let mut out = String::new();
        if start > 0 {
            out.push('…');
        }
        out.extend(&self.buffer[start..end]);
        if end < self.buffer.len() {
            out.push('…');
        }
        out
    }

    /// Column within the string returned by `display` where the
    /// terminal cursor belongs, accounting for the clipped window and
    /// its leading marker.
    pub fn display_cursor(&self, width: usize) -> usize {
        if self.buffer.len() <= width {
            return self.cursor;
        }
        let visible = width.saturating_sub(2).max(1);
        let start = self
            .cursor
            .saturating_sub(visible)
            .min(self.buffer.len() - visible);
        self.cursor - start + usize::from(start > 0)
    }
}

fn single_char(keystroke: &str) -> Option<char> {
    let mut chars = keystroke.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}
