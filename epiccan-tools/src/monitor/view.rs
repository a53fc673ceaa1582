//! Pane windowing and terminal drawing.
//!
//! Drawing is plain queued crossterm output, redrawn from scratch every
//! frame. Each pane records the row capacity it actually rendered with
//! back into the state, which is what gives PageUp/PageDown their step
//! size on the next keystroke.

use crossterm::style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::{cursor, style, terminal, ExecutableCommand, QueueableCommand};

use std::io::{self, Write};
use std::ops::Range;
use std::time::Instant;

use super::state::{Focus, MonitorState};

/// Visible slice of a list of length `len` shown in a pane with `cap`
/// rows, keeping `cursor` centered where room allows and never leaving a
/// trailing blank region near the end.
pub fn window(len: usize, cap: usize, cursor: usize) -> Range<usize> {
    if len == 0 || cap == 0 {
        return 0..0;
    }
    let start = cursor
        .saturating_sub(cap / 2)
        .min(len.saturating_sub(cap));
    start..len.min(start + cap)
}

fn clip(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

fn format_value(v: Option<f32>) -> String {
    match v {
        Some(v) => format!("{:.3}", v),
        None => "-".to_string(),
    }
}

fn format_age(observed_at: Option<Instant>, now: Instant) -> String {
    match observed_at {
        Some(at) => format!("{}s", now.duration_since(at).as_secs()),
        None => "-".to_string(),
    }
}

pub struct Tui {
    stdout: io::Stdout,
}

impl Tui {
    pub fn setup() -> io::Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        stdout.execute(terminal::EnterAlternateScreen)?;
        stdout.execute(cursor::Hide)?;
        Ok(Self { stdout })
    }

    pub fn teardown(&mut self) {
        let _ = self.stdout.execute(cursor::Show);
        let _ = self.stdout.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = self.stdout.flush();
    }

    /// Restores the terminal even when a later panic unwinds the stack.
    pub fn install_panic_hook() {
        let original_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            let mut t = Tui {
                stdout: io::stdout(),
            };
            t.teardown();
            original_hook(panic_info);
        }));
    }

    pub fn draw(&mut self, st: &mut MonitorState) -> io::Result<()> {
        let (w, h) = terminal::size()?;
        let (w, h) = (w as usize, h as usize);
        if w == 0 || h < 6 {
            return Ok(());
        }
        let left_w = (w / 2).max(40).min(w);

        self.stdout.queue(cursor::MoveTo(0, 0))?;
        self.stdout
            .queue(terminal::Clear(terminal::ClearType::All))?;

        self.draw_status(st, w)?;
        self.draw_help(w)?;
        self.draw_browser(st, h, left_w)?;
        self.draw_values(st, h, left_w, w)?;

        self.stdout.flush()
    }

    fn draw_status(&mut self, st: &MonitorState, w: usize) -> io::Result<()> {
        let poll = if st.polling { "ON" } else { "OFF" };
        let mut line = format!(
            "iface={}  addr={}  poll={}  rate={:.1}Hz  source={}  sel={}",
            st.iface,
            st.device_addr,
            poll,
            st.rate_hz,
            st.source_mode.label(),
            st.selection.len()
        );
        if let Some(buf) = &st.addr_input {
            line.push_str(&format!("  addr> {}_", buf));
        }

        self.stdout.queue(cursor::MoveTo(0, 0))?;
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout.queue(style::Print(clip(&line, w)))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;

        if let Some(err) = &st.last_error {
            let msg = format!(
                "  [{}] ERROR: {}",
                err.at.format("%H:%M:%S"),
                err.message
            );
            let used = line.chars().count().min(w);
            if used < w {
                self.stdout.queue(SetForegroundColor(Color::Red))?;
                self.stdout.queue(style::Print(clip(&msg, w - used)))?;
                self.stdout.queue(ResetColor)?;
            }
        }
        Ok(())
    }

    fn draw_help(&mut self, w: usize) -> io::Result<()> {
        let help = "[Tab] focus  [Space] select  [r]emove  [c]lear  [p]oll  [+/-] rate  \
                    [f] source  [e] addr  [q]uit";
        self.stdout.queue(cursor::MoveTo(0, 1))?;
        self.stdout.queue(SetForegroundColor(Color::DarkGrey))?;
        self.stdout.queue(style::Print(clip(help, w)))?;
        self.stdout.queue(ResetColor)?;
        Ok(())
    }

    fn draw_browser(&mut self, st: &mut MonitorState, h: usize, left_w: usize) -> io::Result<()> {
        // Filter line with a visible edit cursor while searching.
        self.stdout.queue(cursor::MoveTo(0, 3))?;
        let label = "Filter: ";
        if st.focus == Focus::Search {
            self.stdout.queue(SetAttribute(Attribute::Bold))?;
        }
        self.stdout
            .queue(style::Print(clip(label, left_w)))?;
        let text_w = left_w.saturating_sub(label.len());
        let cursor_pos = st.filter_cursor.min(st.filter_text.chars().count());
        if st.focus == Focus::Search && text_w > 0 {
            let before: String = st.filter_text.chars().take(cursor_pos).collect();
            let under: String = st
                .filter_text
                .chars()
                .nth(cursor_pos)
                .unwrap_or(' ')
                .to_string();
            let after: String = st.filter_text.chars().skip(cursor_pos + 1).collect();
            self.stdout.queue(style::Print(clip(&before, text_w)))?;
            self.stdout.queue(SetAttribute(Attribute::Reverse))?;
            self.stdout.queue(style::Print(under))?;
            self.stdout.queue(SetAttribute(Attribute::NoReverse))?;
            self.stdout.queue(style::Print(clip(
                &after,
                text_w.saturating_sub(before.chars().count() + 1),
            )))?;
            self.stdout.queue(SetAttribute(Attribute::Reset))?;
        } else {
            self.stdout
                .queue(style::Print(clip(&st.filter_text, text_w)))?;
            self.stdout.queue(SetAttribute(Attribute::Reset))?;
        }

        let filtered = st.filtered_catalog();
        let header = format!("Variables ({})", filtered.len());
        self.stdout.queue(cursor::MoveTo(0, 4))?;
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout.queue(style::Print(clip(&header, left_w)))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;

        let cap = h.saturating_sub(5).max(1);
        let range = window(filtered.len(), cap, st.browser_cursor);
        let mut row = 5u16;
        for i in range {
            let e = filtered[i];
            let mark = if st.selection.contains(e) { "[x]" } else { "[ ]" };
            let line = format!("{} {:<32} {:<6} {}", mark, e.name, e.source, e.hash);
            self.stdout.queue(cursor::MoveTo(0, row))?;
            if st.focus == Focus::Browser && i == st.browser_cursor {
                self.stdout.queue(SetAttribute(Attribute::Reverse))?;
                self.stdout.queue(style::Print(clip(&line, left_w)))?;
                self.stdout.queue(SetAttribute(Attribute::Reset))?;
            } else {
                self.stdout.queue(style::Print(clip(&line, left_w)))?;
            }
            row += 1;
        }

        st.browser_rows = cap;
        Ok(())
    }

    fn draw_values(
        &mut self,
        st: &mut MonitorState,
        h: usize,
        left_w: usize,
        w: usize,
    ) -> io::Result<()> {
        let x = left_w as u16 + 1;
        let pane_w = w.saturating_sub(left_w + 1);
        if pane_w == 0 {
            st.values_rows = 1;
            return Ok(());
        }

        self.stdout.queue(cursor::MoveTo(x, 3))?;
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout.queue(style::Print(clip("Live values", pane_w)))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;

        let cap = h.saturating_sub(4).max(1);
        let range = window(st.selection.len(), cap, st.values_cursor);
        let now = Instant::now();
        let mut row = 4u16;
        for i in range {
            let e = &st.selection[i];
            let cached = st.values.get(&e.hash);
            let line = format!(
                "{:<32} {:>12} {:>5}",
                e.name,
                format_value(cached.map(|c| c.value)),
                format_age(cached.map(|c| c.observed_at), now)
            );
            self.stdout.queue(cursor::MoveTo(x, row))?;
            if st.focus == Focus::ValueList && i == st.values_cursor {
                self.stdout.queue(SetAttribute(Attribute::Reverse))?;
                self.stdout.queue(style::Print(clip(&line, pane_w)))?;
                self.stdout.queue(SetAttribute(Attribute::Reset))?;
            } else {
                self.stdout.queue(style::Print(clip(&line, pane_w)))?;
            }
            row += 1;
        }

        st.values_rows = cap;
        Ok(())
    }
}
