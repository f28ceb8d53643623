// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Crossterm/ratatui front end: terminal lifecycle, keystroke
//! decoding, the frame renderer, the modal prompt driver, and the
//! main loop. All tabular state lives in the engine; this crate only
//! turns it into cells on a screen.

use anyhow::{Context, Result, bail};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyModifiers,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use std::io::{self, Write};
use std::time::Duration;
use unicode_width::UnicodeWidthChar;
use vellum_engine::{
    CellStyle, Colorizer, ColorizerScope, EditOutcome, LineEditor, Note, PaletteColor, Session,
    Sheet, colorize,
};

const SCROLL_STEP: isize = 3;
/// Separator after the pinned key columns; plain one elsewhere.
const KEY_SEPARATOR: char = '‖';
const COLUMN_SEPARATOR: char = '│';

/// Crossterm key event to the engine's keystroke names: plain
/// characters stand for themselves, control chords are `^X`, and
/// special keys get stable names the command table binds against.
pub fn decode_key(key: KeyEvent) -> Option<String> {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && let KeyCode::Char(ch) = key.code
    {
        return Some(format!("^{}", ch.to_ascii_uppercase()));
    }
    let name = match key.code {
        KeyCode::Char(' ') => "Space".to_owned(),
        KeyCode::Char(ch) => ch.to_string(),
        KeyCode::Enter => "Enter".to_owned(),
        KeyCode::Esc => "Esc".to_owned(),
        KeyCode::Up => "Up".to_owned(),
        KeyCode::Down => "Down".to_owned(),
        KeyCode::Left => "Left".to_owned(),
        KeyCode::Right => "Right".to_owned(),
        KeyCode::Home => "Home".to_owned(),
        KeyCode::End => "End".to_owned(),
        KeyCode::PageUp => "PgUp".to_owned(),
        KeyCode::PageDown => "PgDn".to_owned(),
        KeyCode::Backspace => "Backspace".to_owned(),
        KeyCode::Delete => "Del".to_owned(),
        KeyCode::Insert => "Ins".to_owned(),
        KeyCode::Tab => "Tab".to_owned(),
        KeyCode::BackTab => "BTab".to_owned(),
        KeyCode::F(n) => format!("F{n}"),
        _ => return None,
    };
    Some(name)
}

fn palette_color(color: PaletteColor) -> Color {
    match color {
        PaletteColor::Black => Color::Black,
        PaletteColor::Red => Color::Red,
        PaletteColor::Green => Color::Green,
        PaletteColor::Yellow => Color::Yellow,
        PaletteColor::Blue => Color::Blue,
        PaletteColor::Magenta => Color::Magenta,
        PaletteColor::Cyan => Color::Cyan,
        PaletteColor::White => Color::White,
        PaletteColor::Gray => Color::DarkGray,
    }
}

fn terminal_style(style: CellStyle) -> Style {
    let mut out = Style::default();
    if let Some(fg) = style.fg {
        out = out.fg(palette_color(fg));
    }
    if let Some(bg) = style.bg {
        out = out.bg(palette_color(bg));
    }
    if style.bold {
        out = out.add_modifier(Modifier::BOLD);
    }
    if style.underline {
        out = out.add_modifier(Modifier::UNDERLINED);
    }
    if style.reverse {
        out = out.add_modifier(Modifier::REVERSED);
    }
    out
}

/// The stock colorizer chain every new sheet starts with.
pub fn default_colorizers() -> Vec<Colorizer> {
    vec![
        Colorizer::new(ColorizerScope::Header, 0, |_sheet, _column, _row, _cell| {
            Some(CellStyle::default().with_bold())
        }),
        Colorizer::new(ColorizerScope::Column, 5, |sheet, column, _row, _cell| {
            let column = column?;
            let is_key = sheet.columns[..sheet.n_keys.min(sheet.columns.len())]
                .iter()
                .any(|key_col| std::ptr::eq(key_col, column));
            is_key.then(|| CellStyle::fg(PaletteColor::Cyan))
        }),
        Colorizer::new(ColorizerScope::Row, 8, |sheet, _column, row, _cell| {
            let row = row?;
            sheet
                .is_selected(row.id())
                .then(|| CellStyle::fg(PaletteColor::Green).with_bold())
        }),
        Colorizer::new(ColorizerScope::Cell, 7, |_sheet, _column, _row, cell| {
            match cell?.note {
                Some(Note::Error) => Some(CellStyle::fg(PaletteColor::Red)),
                Some(Note::Format) => Some(CellStyle::fg(PaletteColor::Yellow)),
                _ => None,
            }
        }),
    ]
}

/// Truncate or pad to exactly `width` terminal columns; truncation
/// replaces the last column with an ellipsis.
fn fit(text: &str, width: usize, right_justify: bool) -> String {
    if width == 0 {
        return String::new();
    }
    let mut used = 0;
    let mut kept = String::new();
    let mut clipped = false;
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if used + ch_width > width {
            clipped = true;
            break;
        }
        kept.push(ch);
        used += ch_width;
    }
    if clipped {
        // Drop trailing characters until the ellipsis fits.
        while used + 1 > width {
            let Some(ch) = kept.pop() else { break };
            used -= ch.width().unwrap_or(0);
        }
        kept.push('…');
        used += 1;
    }
    let padding = " ".repeat(width.saturating_sub(used));
    if right_justify {
        format!("{padding}{kept}")
    } else {
        format!("{kept}{padding}")
    }
}

fn note_style(note: Note) -> Style {
    match note {
        Note::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Note::Format => Style::default().fg(Color::Yellow),
        Note::Pending => Style::default().fg(Color::Blue),
        Note::TypeHint(_) => Style::default().fg(Color::DarkGray),
    }
}

fn header_line(sheet: &Sheet, layout: &vellum_engine::ColLayout, show_types: bool) -> Line<'static> {
    let n_vis_keys = sheet.n_visible_keys();
    let n_visible = sheet.n_visible_cols();
    let mut spans = Vec::new();
    for (position, entry) in layout.entries.iter().enumerate() {
        let column = &sheet.columns[entry.col_index];
        let mut label = column.name().to_owned();
        if show_types {
            label.push(' ');
            label.push(column.ctype.glyph());
        }
        if entry.vis_index == sheet.left_vis_col.max(n_vis_keys) && sheet.left_vis_col > n_vis_keys
        {
            label.insert(0, '<');
        }
        if position + 1 == layout.entries.len() && layout.right_vis_col + 1 < n_visible {
            label.push('>');
        }
        let style = colorize(
            &sheet.colorizers,
            &[ColorizerScope::Column, ColorizerScope::Header],
            sheet,
            Some(column),
            None,
            None,
        );
        let mut style = terminal_style(style);
        if entry.vis_index == sheet.cursor_vis_col {
            style = style.add_modifier(Modifier::REVERSED);
        }
        spans.push(Span::styled(fit(&label, entry.width as usize, false), style));
        let separator = if entry.vis_index + 1 == n_vis_keys || entry.vis_index == layout.right_vis_col
        {
            KEY_SEPARATOR
        } else {
            COLUMN_SEPARATOR
        };
        spans.push(Span::styled(
            separator.to_string(),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn row_line(
    sheet: &Sheet,
    layout: &vellum_engine::ColLayout,
    row_index: usize,
    color_current: bool,
) -> Line<'static> {
    let row = &sheet.rows()[row_index];
    let n_vis_keys = sheet.n_visible_keys();
    let current_row = row_index == sheet.cursor_row;
    let mut spans = Vec::new();
    for entry in &layout.entries {
        let column = &sheet.columns[entry.col_index];
        let cell = column.display_cell(row);
        let style = colorize(
            &sheet.colorizers,
            &[ColorizerScope::Column, ColorizerScope::Row, ColorizerScope::Cell],
            sheet,
            Some(column),
            Some(row),
            Some(&cell),
        );
        let mut style = terminal_style(style);
        if current_row && color_current {
            style = style.add_modifier(Modifier::REVERSED);
        }
        if current_row && entry.vis_index == sheet.cursor_vis_col {
            style = style.add_modifier(Modifier::BOLD);
        }
        let width = entry.width as usize;
        match cell.note {
            Some(note) if width > 1 => {
                spans.push(Span::styled(
                    fit(&cell.text, width - 1, cell.right_justify),
                    style,
                ));
                let mut glyph_style = note_style(note);
                if current_row && color_current {
                    glyph_style = glyph_style.add_modifier(Modifier::REVERSED);
                }
                spans.push(Span::styled(note.glyph().to_string(), glyph_style));
            }
            _ => {
                spans.push(Span::styled(fit(&cell.text, width, cell.right_justify), style));
            }
        }
        let separator = if entry.vis_index + 1 == n_vis_keys || entry.vis_index == layout.right_vis_col
        {
            KEY_SEPARATOR
        } else {
            COLUMN_SEPARATOR
        };
        let mut separator_style = Style::default().fg(Color::DarkGray);
        if current_row && color_current {
            separator_style = separator_style.add_modifier(Modifier::REVERSED);
        }
        spans.push(Span::styled(separator.to_string(), separator_style));
    }
    Line::from(spans)
}

fn sheet_lines(
    sheet: &mut Sheet,
    area_width: u16,
    n_screen_rows: usize,
    show_types: bool,
    color_current: bool,
) -> Vec<Line<'static>> {
    sheet.check_cursor(area_width, n_screen_rows);
    let layout = sheet.calc_col_layout(area_width, n_screen_rows);
    let sheet = &*sheet;

    let mut lines = vec![header_line(sheet, &layout, show_types)];
    let last = (sheet.top_row + n_screen_rows).min(sheet.n_rows());
    for row_index in sheet.top_row..last {
        lines.push(row_line(sheet, &layout, row_index, color_current));
    }
    lines
}

fn compose_status(left: &str, right: &str, width: usize) -> String {
    let gap = width
        .saturating_sub(left.chars().count())
        .saturating_sub(right.chars().count());
    if gap == 0 {
        let mut clipped: String = left.chars().take(width.saturating_sub(right.chars().count() + 1)).collect();
        clipped.push(' ');
        clipped.push_str(right);
        return clipped;
    }
    format!("{left}{}{right}", " ".repeat(gap))
}

/// Modal line-editor state while a prompt is open.
pub struct PromptUi {
    pub label: String,
    pub editor: LineEditor,
}

pub fn render(frame: &mut ratatui::Frame<'_>, session: &mut Session, prompt: Option<&PromptUi>) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(frame.area());
    let body = layout[0];
    let status_area = layout[1];

    let n_screen_rows = body.height.saturating_sub(1) as usize;
    session.set_screen(body.width, n_screen_rows);

    let show_types = session.options.get_bool("show-types").unwrap_or(true);
    let color_current = session.options.get_bool("color-current-row").unwrap_or(true);
    if let Some(sheet) = session.top_mut() {
        let lines = sheet_lines(sheet, body.width, n_screen_rows, show_types, color_current);
        frame.render_widget(Paragraph::new(lines), body);
    }

    match prompt {
        Some(prompt) => render_prompt(frame, status_area, prompt),
        None => {
            let left = session.left_status();
            let right = session.right_status();
            let status = compose_status(&left, &right, status_area.width as usize);
            frame.render_widget(
                Paragraph::new(status).style(Style::default().fg(Color::Yellow)),
                status_area,
            );
        }
    }
}

fn render_prompt(frame: &mut ratatui::Frame<'_>, area: Rect, prompt: &PromptUi) {
    let label_width = prompt.label.chars().count();
    let field_width = (area.width as usize).saturating_sub(label_width);
    let text = format!("{}{}", prompt.label, prompt.editor.display(field_width));
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::White)),
        area,
    );
    let cursor_x = (label_width + prompt.editor.display_cursor(field_width))
        .min(area.width.saturating_sub(1) as usize);
    frame.set_cursor_position(Position::new(area.x + cursor_x as u16, area.y));
}

fn handle_mouse(session: &mut Session, mouse: MouseEvent) {
    let (area_width, n_screen_rows) = session.screen();
    let Some(sheet) = session.top_mut() else {
        return;
    };
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if mouse.row >= 1 {
                let want = sheet.top_row + mouse.row as usize - 1;
                if want < sheet.n_rows() {
                    sheet.cursor_row = want;
                }
            }
            let layout = sheet.calc_col_layout(area_width, n_screen_rows);
            if let Some(entry) = layout
                .entries
                .iter()
                .find(|entry| mouse.column >= entry.x && mouse.column < entry.x + entry.width + 1)
            {
                sheet.cursor_vis_col = entry.vis_index;
            }
        }
        MouseEventKind::ScrollDown => sheet.cursor_down(SCROLL_STEP),
        MouseEventKind::ScrollUp => sheet.cursor_down(-SCROLL_STEP),
        _ => {}
    }
}

/// Write the buffer to a temp file, run the editor on it, and read it
/// back. No terminal state is touched here, so a failed launch leaves
/// nothing to clean up.
fn edit_in_subprocess(editor: &str, initial: &str) -> Result<String> {
    let mut file = tempfile::Builder::new()
        .suffix(".txt")
        .tempfile()
        .context("create temp file")?;
    file.write_all(initial.as_bytes()).context("write temp file")?;
    file.flush().context("flush temp file")?;

    let status = std::process::Command::new(editor)
        .arg(file.path())
        .status()
        .with_context(|| format!("launch {editor}"))?;
    if !status.success() {
        bail!("{editor} exited with {status}");
    }
    std::fs::read_to_string(file.path()).context("read edited text")
}

/// Hand the buffer to `$EDITOR` with the terminal restored, then put
/// the alternate screen back. The screen comes back whether or not
/// the editor launched or succeeded.
fn external_edit<B>(terminal: &mut Terminal<B>, initial: &str) -> Result<String>
where
    B: ratatui::backend::Backend,
{
    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_owned());
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    let edited = edit_in_subprocess(&editor, initial);
    execute!(io::stdout(), terminal::EnterAlternateScreen).context("re-enter alternate screen")?;
    enable_raw_mode().context("re-enable raw mode")?;
    terminal.clear().context("clear terminal")?;
    edited
}

/// The interactive loop: reap background work, draw, wait for input,
/// dispatch. Returns once the session wants out or the stack empties.
pub fn run(session: &mut Session) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;
    let mouse_enabled = session.options.get_bool("mouse").unwrap_or(true);
    if mouse_enabled {
        execute!(io::stdout(), EnableMouseCapture).context("enable mouse capture")?;
    }

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut prompt_ui: Option<PromptUi> = None;
    let mut prompt_history: Vec<String> = Vec::new();
    let mut result = Ok(());
    loop {
        session.reap_tasks();
        if session.should_quit() {
            break;
        }
        if prompt_ui.is_none()
            && let Some(pending) = &session.pending_prompt
        {
            prompt_ui = Some(PromptUi {
                label: pending.label.clone(),
                editor: LineEditor::new(&pending.initial)
                    .with_history(prompt_history.clone())
                    .with_completions(pending.completions.clone()),
            });
        }

        if let Err(error) = terminal.draw(|frame| render(frame, session, prompt_ui.as_ref())) {
            result = Err(error).context("draw frame");
            break;
        }

        let poll_ms = session.options.get_int("poll-interval-ms").unwrap_or(120);
        if !event::poll(Duration::from_millis(poll_ms.max(1) as u64)).context("poll event")? {
            continue;
        }
        match event::read().context("read event")? {
            Event::Key(key) => {
                let Some(keystroke) = decode_key(key) else {
                    continue;
                };
                if let Some(ui) = &mut prompt_ui {
                    match ui.editor.handle_key(&keystroke) {
                        EditOutcome::Pending => {}
                        EditOutcome::Done(text) => {
                            prompt_history.push(text.clone());
                            prompt_ui = None;
                            session.finish_prompt(&text);
                        }
                        EditOutcome::Cancelled => {
                            prompt_ui = None;
                            session.cancel_prompt();
                        }
                        EditOutcome::External => {
                            match external_edit(&mut terminal, &ui.editor.text()) {
                                Ok(text) => {
                                    ui.editor.replace_buffer(text.trim_end_matches('\n'));
                                }
                                Err(error) => session.report(&error),
                            }
                        }
                    }
                } else {
                    session.handle_key(&keystroke);
                }
            }
            Event::Mouse(mouse) if mouse_enabled && prompt_ui.is_none() => {
                handle_mouse(session, mouse);
            }
            Event::Resize(_, _) => {}
            _ => {}
        }
    }

    if mouse_enabled {
        let _ = execute!(io::stdout(), DisableMouseCapture);
    }
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

#[cfg(test)]
mod tests {
    use super::{
        compose_status, decode_key, default_colorizers, edit_in_subprocess, fit, header_line,
        palette_color, row_line, sheet_lines, terminal_style,
    };
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::style::{Color, Modifier};
    use vellum_engine::{CellStyle, ColorizerScope, PaletteColor, colorize};
    use vellum_testkit::tiny_sheet;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn decode_plain_and_control_keys() {
        assert_eq!(decode_key(key(KeyCode::Char('j'))).as_deref(), Some("j"));
        assert_eq!(decode_key(key(KeyCode::Char(' '))).as_deref(), Some("Space"));
        assert_eq!(decode_key(key(KeyCode::Enter)).as_deref(), Some("Enter"));
        assert_eq!(decode_key(key(KeyCode::F(1))).as_deref(), Some("F1"));
        assert_eq!(decode_key(key(KeyCode::BackTab)).as_deref(), Some("BTab"));

        let ctrl_r = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL);
        assert_eq!(decode_key(ctrl_r).as_deref(), Some("^R"));
    }

    #[test]
    fn shifted_characters_pass_through() {
        let shift_s = KeyEvent::new(KeyCode::Char('S'), KeyModifiers::SHIFT);
        assert_eq!(decode_key(shift_s).as_deref(), Some("S"));
    }

    #[test]
    fn fit_pads_truncates_and_justifies() {
        assert_eq!(fit("ab", 4, false), "ab  ");
        assert_eq!(fit("ab", 4, true), "  ab");
        assert_eq!(fit("abcdef", 4, false), "abc…");
        assert_eq!(fit("", 3, false), "   ");
        assert_eq!(fit("abc", 0, false), "");
    }

    #[test]
    fn compose_status_right_aligns() {
        assert_eq!(compose_status("left", "right", 12), "left   right");
        // No room: left is clipped, right wins.
        assert_eq!(compose_status("averylongleft", "9%", 10), "averylo 9%");
    }

    #[test]
    fn palette_maps_each_color() {
        assert_eq!(palette_color(PaletteColor::Red), Color::Red);
        assert_eq!(palette_color(PaletteColor::Gray), Color::DarkGray);
    }

    #[test]
    fn terminal_style_carries_attributes() {
        let style = terminal_style(CellStyle::fg(PaletteColor::Green).with_bold());
        assert_eq!(style.fg, Some(Color::Green));
        assert!(style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn selected_rows_are_colored_by_the_default_chain() {
        let mut sheet = tiny_sheet();
        sheet.colorizers = default_colorizers();
        let row = sheet.rows()[1].clone();
        sheet.select(&[row.clone()]);

        let style = colorize(
            &sheet.colorizers,
            &[ColorizerScope::Row],
            &sheet,
            None,
            Some(&row),
            None,
        );
        assert_eq!(style.fg, Some(PaletteColor::Green));
        assert!(style.bold);
    }

    #[test]
    fn key_columns_win_over_selection_color() {
        let mut sheet = tiny_sheet();
        sheet.colorizers = default_colorizers();
        sheet.toggle_key_column(0);
        let row = sheet.rows()[0].clone();
        sheet.select(&[row.clone()]);

        let style = colorize(
            &sheet.colorizers,
            &[ColorizerScope::Column, ColorizerScope::Row],
            &sheet,
            Some(&sheet.columns[0]),
            Some(&row),
            None,
        );
        // Row precedence 8 beats column precedence 5 for fg.
        assert_eq!(style.fg, Some(PaletteColor::Green));
    }

    #[test]
    fn header_line_shows_names_and_type_glyphs() {
        let mut sheet = tiny_sheet();
        sheet.colorizers = default_colorizers();
        let layout = sheet.calc_col_layout(40, 10);
        let line = header_line(&sheet, &layout, true);
        let text: String = line.spans.iter().map(|span| span.content.as_ref()).collect();
        assert!(text.contains("name"));
        assert!(text.contains("age"));
        // Heavy separator closes off the rightmost visible column.
        assert!(text.ends_with(super::KEY_SEPARATOR));
        assert_eq!(
            text.matches(super::KEY_SEPARATOR).count(),
            1,
            "no key columns, so only the trailing edge is heavy"
        );
    }

    #[test]
    fn sheet_lines_cover_header_and_rows() {
        let mut sheet = tiny_sheet();
        sheet.colorizers = default_colorizers();
        let lines = sheet_lines(&mut sheet, 40, 10, true, true);
        // Header plus three data rows.
        assert_eq!(lines.len(), 4);

        let second: String = lines[2]
            .spans
            .iter()
            .map(|span| span.content.as_ref())
            .collect();
        assert!(second.contains("grace"));
        assert!(second.contains("85"));
        assert!(second.ends_with(super::KEY_SEPARATOR));
    }

    #[test]
    fn subprocess_edit_reports_a_missing_editor() {
        let error = edit_in_subprocess("/no/such/editor", "keep me").unwrap_err();
        assert!(format!("{error:#}").contains("launch /no/such/editor"));
    }

    #[test]
    fn subprocess_edit_returns_the_file_untouched_by_a_no_op_editor() -> anyhow::Result<()> {
        let text = edit_in_subprocess("true", "keep me")?;
        assert_eq!(text, "keep me");
        Ok(())
    }

    #[test]
    fn subprocess_edit_rejects_a_failing_editor() {
        let error = edit_in_subprocess("false", "keep me").unwrap_err();
        assert!(error.to_string().contains("exited with"));
    }

    #[test]
    fn row_line_marks_the_cursor_cell() {
        let mut sheet = tiny_sheet();
        sheet.colorizers = default_colorizers();
        sheet.cursor_row = 0;
        let layout = sheet.calc_col_layout(40, 10);
        let line = row_line(&sheet, &layout, 0, true);
        let bolded = line
            .spans
            .iter()
            .any(|span| span.style.add_modifier.contains(Modifier::BOLD));
        assert!(bolded);
    }
}
