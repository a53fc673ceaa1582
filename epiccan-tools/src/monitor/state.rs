//! Session state for the live monitor.
//!
//! One `MonitorState` value owns everything the panes render and the key
//! handler mutates. All mutation goes through the named operations here,
//! each of which leaves the cursor invariants intact: the browser cursor
//! stays within the filtered catalog, the value-list cursor within the
//! selection, and focus never rests on a pane whose list is empty.

use chrono::{DateTime, Local};
use epiccan::catalog::CatalogEntry;
use epiccan::proto::DEVICE_ADDR_MAX;

use std::collections::HashMap;
use std::time::Instant;

pub const RATE_MIN_HZ: f32 = 0.5;
pub const RATE_MAX_HZ: f32 = 50.0;
pub const RATE_STEP_HZ: f32 = 0.5;

/// Which pane receives keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Search,
    Browser,
    ValueList,
}

/// Source-kind restriction applied on top of the text filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    Both,
    Config,
    Output,
}

impl SourceMode {
    pub fn next(self) -> SourceMode {
        match self {
            SourceMode::Both => SourceMode::Config,
            SourceMode::Config => SourceMode::Output,
            SourceMode::Output => SourceMode::Both,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SourceMode::Both => "both",
            SourceMode::Config => "config",
            SourceMode::Output => "output",
        }
    }

    fn matches(self, entry: &CatalogEntry) -> bool {
        match self {
            SourceMode::Both => true,
            SourceMode::Config => entry.source == epiccan::catalog::SourceKind::Config,
            SourceMode::Output => entry.source == epiccan::catalog::SourceKind::Output,
        }
    }
}

/// Last successfully observed value for one hash.
#[derive(Debug, Clone, Copy)]
pub struct CachedValue {
    pub value: f32,
    pub observed_at: Instant,
}

#[derive(Debug, Clone)]
pub struct LastError {
    pub message: String,
    pub at: DateTime<Local>,
}

pub struct MonitorState {
    pub iface: String,
    pub device_addr: u8,
    pub polling: bool,
    pub rate_hz: f32,

    pub filter_text: String,
    pub filter_cursor: usize,
    pub source_mode: SourceMode,

    pub focus: Focus,
    pub browser_cursor: usize,
    pub values_cursor: usize,

    pub catalog: Vec<CatalogEntry>,
    pub selection: Vec<CatalogEntry>,
    pub values: HashMap<i32, CachedValue>,

    pub last_error: Option<LastError>,

    // Visible row counts from the last rendered frame; PageUp/PageDown
    // reuse them as their step size.
    pub browser_rows: usize,
    pub values_rows: usize,

    // Pending device-address entry, None when not editing.
    pub addr_input: Option<String>,
}

impl MonitorState {
    pub fn new(iface: String, device_addr: u8, rate_hz: f32, catalog: Vec<CatalogEntry>) -> Self {
        MonitorState {
            iface,
            device_addr: device_addr.min(DEVICE_ADDR_MAX),
            polling: true,
            rate_hz: rate_hz.clamp(RATE_MIN_HZ, RATE_MAX_HZ),
            filter_text: String::new(),
            filter_cursor: 0,
            source_mode: SourceMode::Both,
            focus: Focus::Search,
            browser_cursor: 0,
            values_cursor: 0,
            catalog,
            selection: Vec::new(),
            values: HashMap::new(),
            last_error: None,
            browser_rows: 10,
            values_rows: 10,
            addr_input: None,
        }
    }

    /// The catalog subset currently visible in the browser pane: source
    /// mode match AND case-insensitive substring match on the name.
    pub fn filtered_catalog(&self) -> Vec<&CatalogEntry> {
        let needle = self.filter_text.to_lowercase();
        self.catalog
            .iter()
            .filter(|e| self.source_mode.matches(e))
            .filter(|e| needle.is_empty() || e.name.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered_catalog().len()
    }

    /// Re-establishes both cursor invariants after any mutation that may
    /// have shrunk a list.
    pub fn clamp_cursors(&mut self) {
        self.browser_cursor = clamp_cursor(self.browser_cursor, self.filtered_len());
        self.values_cursor = clamp_cursor(self.values_cursor, self.selection.len());
    }

    /// Moves focus back to Search if it rests on a pane whose list
    /// emptied out from under it.
    fn normalize_focus(&mut self) {
        match self.focus {
            Focus::Browser if self.filtered_len() == 0 => self.focus = Focus::Search,
            Focus::ValueList if self.selection.is_empty() => self.focus = Focus::Search,
            _ => {}
        }
    }

    pub fn toggle_polling(&mut self) {
        self.polling = !self.polling;
    }

    pub fn bump_rate(&mut self, delta: f32) {
        self.rate_hz = (self.rate_hz + delta).clamp(RATE_MIN_HZ, RATE_MAX_HZ);
    }

    pub fn cycle_source_mode(&mut self) {
        self.source_mode = self.source_mode.next();
        self.browser_cursor = 0;
        self.clamp_cursors();
        self.normalize_focus();
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(LastError {
            message: message.into(),
            at: Local::now(),
        });
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Commits a free-form device-address entry. Out-of-range or
    /// unparsable input leaves the address unchanged and surfaces an
    /// error; valid input also clears a previous error.
    pub fn commit_device_addr(&mut self, input: &str) {
        match parse_addr(input) {
            Some(addr) => {
                self.device_addr = addr;
                self.clear_error();
            }
            None => self.set_error(format!("invalid device address {:?}", input)),
        }
    }

    /// Adds the entry if absent (at the end), removes it if present.
    pub fn toggle_selected(&mut self, entry: &CatalogEntry) {
        if let Some(pos) = self.selection.iter().position(|e| e == entry) {
            self.selection.remove(pos);
        } else {
            self.selection.push(entry.clone());
        }
        self.clamp_cursors();
        self.normalize_focus();
    }

    /// Removes the selection entry at `idx`; out of range is a no-op.
    pub fn remove_selected_at(&mut self, idx: usize) {
        if idx < self.selection.len() {
            self.selection.remove(idx);
        }
        self.clamp_cursors();
        self.normalize_focus();
    }

    pub fn clear_selected(&mut self) {
        self.selection.clear();
        self.values_cursor = 0;
        self.normalize_focus();
    }

    /// Records a successful read. `Instant::now()` is monotonic, so the
    /// per-hash timestamp can only advance.
    pub fn record_value(&mut self, hash: i32, value: f32) {
        self.values.insert(
            hash,
            CachedValue {
                value,
                observed_at: Instant::now(),
            },
        );
    }

    // Filter editing. Text changes re-clamp the browser cursor but do not
    // reset it; only a source-mode change resets it to the top.

    pub fn filter_insert(&mut self, c: char) {
        let byte = byte_offset(&self.filter_text, self.filter_cursor);
        self.filter_text.insert(byte, c);
        self.filter_cursor += 1;
        self.clamp_cursors();
    }

    pub fn filter_backspace(&mut self) {
        if self.filter_cursor > 0 {
            self.filter_cursor -= 1;
            let byte = byte_offset(&self.filter_text, self.filter_cursor);
            self.filter_text.remove(byte);
            self.clamp_cursors();
        }
    }

    pub fn filter_left(&mut self) {
        self.filter_cursor = self.filter_cursor.saturating_sub(1);
    }

    pub fn filter_right(&mut self) {
        self.filter_cursor = (self.filter_cursor + 1).min(self.filter_text.chars().count());
    }

    pub fn filter_clear(&mut self) {
        self.filter_text.clear();
        self.filter_cursor = 0;
        self.clamp_cursors();
    }
}

fn clamp_cursor(cursor: usize, len: usize) -> usize {
    if len == 0 {
        0
    } else {
        cursor.min(len - 1)
    }
}

fn byte_offset(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

fn parse_addr(input: &str) -> Option<u8> {
    let trimmed = input.trim();
    let value = if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        u8::from_str_radix(hex, 16).ok()?
    } else {
        trimmed.parse::<u8>().ok()?
    };
    (value <= DEVICE_ADDR_MAX).then_some(value)
}
