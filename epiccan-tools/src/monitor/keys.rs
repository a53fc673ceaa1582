//! Keyboard dispatch for the monitor.
//!
//! Dispatch is explicit on the (focus, key) pair. The Search pane owns
//! text editing and swallows list-navigation keys so they cannot corrupt
//! the filter; the one exception is Down, which drops straight into the
//! browser when it has results. Ctrl-C quits from any focus; the command
//! keys apply outside Search, where they are typable filter text.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::state::{Focus, MonitorState, RATE_STEP_HZ};

const ADDR_INPUT_MAX: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Continue,
    Quit,
}

fn is_filter_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

fn move_cursor(cursor: usize, len: usize, delta: isize) -> usize {
    if len == 0 {
        return 0;
    }
    let max = (len - 1) as isize;
    (cursor as isize + delta).clamp(0, max) as usize
}

/// Forward focus cycle: Search, Browser, ValueList, back to Search,
/// skipping panes whose lists are empty.
pub fn cycle_forward(st: &mut MonitorState) {
    st.focus = match st.focus {
        Focus::Search => {
            if st.filtered_len() > 0 {
                Focus::Browser
            } else if !st.selection.is_empty() {
                Focus::ValueList
            } else {
                Focus::Search
            }
        }
        Focus::Browser => {
            if !st.selection.is_empty() {
                Focus::ValueList
            } else {
                Focus::Search
            }
        }
        Focus::ValueList => Focus::Search,
    };
    st.clamp_cursors();
}

/// Backward focus cycle, mirror of `cycle_forward`.
pub fn cycle_backward(st: &mut MonitorState) {
    st.focus = match st.focus {
        Focus::Search => {
            if !st.selection.is_empty() {
                Focus::ValueList
            } else if st.filtered_len() > 0 {
                Focus::Browser
            } else {
                Focus::Search
            }
        }
        Focus::Browser => Focus::Search,
        Focus::ValueList => {
            if st.filtered_len() > 0 {
                Focus::Browser
            } else {
                Focus::Search
            }
        }
    };
    st.clamp_cursors();
}

pub fn handle_key(st: &mut MonitorState, key: KeyEvent) -> KeyOutcome {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return KeyOutcome::Quit;
    }

    if st.addr_input.is_some() {
        handle_addr_entry(st, key);
        return KeyOutcome::Continue;
    }

    match key.code {
        KeyCode::Tab => {
            cycle_forward(st);
            return KeyOutcome::Continue;
        }
        KeyCode::BackTab => {
            cycle_backward(st);
            return KeyOutcome::Continue;
        }
        _ => {}
    }

    match st.focus {
        Focus::Search => handle_search_key(st, key),
        Focus::Browser => handle_browser_key(st, key),
        Focus::ValueList => handle_values_key(st, key),
    }
}

fn handle_addr_entry(st: &mut MonitorState, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            if let Some(input) = st.addr_input.take() {
                st.commit_device_addr(&input);
            }
        }
        KeyCode::Esc => {
            st.addr_input = None;
        }
        KeyCode::Backspace => {
            if let Some(buf) = st.addr_input.as_mut() {
                buf.pop();
            }
        }
        KeyCode::Char(c) if c.is_ascii_alphanumeric() => {
            if let Some(buf) = st.addr_input.as_mut() {
                if buf.len() < ADDR_INPUT_MAX {
                    buf.push(c);
                }
            }
        }
        _ => {}
    }
}

fn handle_search_key(st: &mut MonitorState, key: KeyEvent) -> KeyOutcome {
    match key.code {
        // Down drops into the browser when it has anything to show,
        // keeping the cursor where it was (re-clamped).
        KeyCode::Down => {
            if st.filtered_len() > 0 {
                st.clamp_cursors();
                st.focus = Focus::Browser;
            }
        }
        KeyCode::Left => st.filter_left(),
        KeyCode::Right => st.filter_right(),
        KeyCode::Backspace => st.filter_backspace(),
        KeyCode::Esc => st.filter_clear(),
        KeyCode::Char(c) if is_filter_char(c) => st.filter_insert(c),
        // Everything else (Up, paging, Home/End, Enter, Delete,
        // function keys) is swallowed so it cannot corrupt the filter.
        _ => {}
    }
    KeyOutcome::Continue
}

fn handle_browser_key(st: &mut MonitorState, key: KeyEvent) -> KeyOutcome {
    let len = st.filtered_len();
    match key.code {
        KeyCode::Up => st.browser_cursor = move_cursor(st.browser_cursor, len, -1),
        KeyCode::Down => st.browser_cursor = move_cursor(st.browser_cursor, len, 1),
        KeyCode::PageUp => {
            st.browser_cursor = move_cursor(st.browser_cursor, len, -(st.browser_rows as isize))
        }
        KeyCode::PageDown => {
            st.browser_cursor = move_cursor(st.browser_cursor, len, st.browser_rows as isize)
        }
        KeyCode::Home => st.browser_cursor = 0,
        KeyCode::End => st.browser_cursor = len.saturating_sub(1),
        KeyCode::Char(' ') => {
            let under_cursor = st
                .filtered_catalog()
                .get(st.browser_cursor)
                .map(|e| (*e).clone());
            if let Some(entry) = under_cursor {
                st.toggle_selected(&entry);
            }
        }
        _ => return handle_global_letter(st, key),
    }
    KeyOutcome::Continue
}

fn handle_values_key(st: &mut MonitorState, key: KeyEvent) -> KeyOutcome {
    let len = st.selection.len();
    match key.code {
        KeyCode::Up => st.values_cursor = move_cursor(st.values_cursor, len, -1),
        KeyCode::Down => st.values_cursor = move_cursor(st.values_cursor, len, 1),
        KeyCode::PageUp => {
            st.values_cursor = move_cursor(st.values_cursor, len, -(st.values_rows as isize))
        }
        KeyCode::PageDown => {
            st.values_cursor = move_cursor(st.values_cursor, len, st.values_rows as isize)
        }
        KeyCode::Home => st.values_cursor = 0,
        KeyCode::End => st.values_cursor = len.saturating_sub(1),
        KeyCode::Delete | KeyCode::Char('r') | KeyCode::Char('R') => {
            st.remove_selected_at(st.values_cursor);
        }
        KeyCode::Char('c') | KeyCode::Char('C') => st.clear_selected(),
        _ => return handle_global_letter(st, key),
    }
    KeyOutcome::Continue
}

/// Commands shared by the browser and value panes. None of these apply
/// in Search, where most of them are typable filter text.
fn handle_global_letter(st: &mut MonitorState, key: KeyEvent) -> KeyOutcome {
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') => return KeyOutcome::Quit,
        KeyCode::Char('p') | KeyCode::Char('P') => st.toggle_polling(),
        KeyCode::Char('f') | KeyCode::Char('F') => st.cycle_source_mode(),
        KeyCode::Char('e') | KeyCode::Char('E') => st.addr_input = Some(String::new()),
        KeyCode::Char('+') | KeyCode::Char('=') => st.bump_rate(RATE_STEP_HZ),
        KeyCode::Char('-') | KeyCode::Char('_') => st.bump_rate(-RATE_STEP_HZ),
        _ => {}
    }
    KeyOutcome::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::state::tests::test_state;
    use crate::monitor::state::SourceMode;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn select_first(st: &mut crate::monitor::state::MonitorState) {
        let e = st.catalog[0].clone();
        st.toggle_selected(&e);
    }

    #[test]
    fn forward_cycle_visits_all_panes() {
        let mut st = test_state();
        select_first(&mut st);
        assert_eq!(st.focus, Focus::Search);

        handle_key(&mut st, key(KeyCode::Tab));
        assert_eq!(st.focus, Focus::Browser);
        handle_key(&mut st, key(KeyCode::Tab));
        assert_eq!(st.focus, Focus::ValueList);
        handle_key(&mut st, key(KeyCode::Tab));
        assert_eq!(st.focus, Focus::Search);
    }

    #[test]
    fn forward_cycle_skips_empty_panes() {
        // Empty catalog, non-empty selection: Search jumps to ValueList.
        let mut st = test_state();
        select_first(&mut st);
        st.catalog.clear();
        cycle_forward(&mut st);
        assert_eq!(st.focus, Focus::ValueList);

        // Browser with empty selection falls through to Search.
        let mut st = test_state();
        st.focus = Focus::Browser;
        cycle_forward(&mut st);
        assert_eq!(st.focus, Focus::Search);

        // Nothing anywhere: stays put.
        let mut st = test_state();
        st.catalog.clear();
        cycle_forward(&mut st);
        assert_eq!(st.focus, Focus::Search);
    }

    #[test]
    fn backward_cycle_transitions() {
        let mut st = test_state();
        select_first(&mut st);
        cycle_backward(&mut st);
        assert_eq!(st.focus, Focus::ValueList);
        cycle_backward(&mut st);
        assert_eq!(st.focus, Focus::Browser);
        cycle_backward(&mut st);
        assert_eq!(st.focus, Focus::Search);

        // No selection: Search goes to the browser instead.
        let mut st = test_state();
        cycle_backward(&mut st);
        assert_eq!(st.focus, Focus::Browser);

        // ValueList with an empty browser falls back to Search.
        let mut st = test_state();
        select_first(&mut st);
        st.catalog.clear();
        st.focus = Focus::ValueList;
        cycle_backward(&mut st);
        assert_eq!(st.focus, Focus::Search);
    }

    #[test]
    fn forward_then_backward_returns_to_search() {
        let mut st = test_state();
        select_first(&mut st);
        cycle_forward(&mut st);
        cycle_backward(&mut st);
        assert_eq!(st.focus, Focus::Search);
    }

    #[test]
    fn down_from_search_enters_browser_keeping_cursor() {
        let mut st = test_state();
        st.browser_cursor = 2;
        handle_key(&mut st, key(KeyCode::Down));
        assert_eq!(st.focus, Focus::Browser);
        assert_eq!(st.browser_cursor, 2);

        // With nothing to show, Down stays in Search.
        let mut st = test_state();
        st.catalog.clear();
        handle_key(&mut st, key(KeyCode::Down));
        assert_eq!(st.focus, Focus::Search);
    }

    #[test]
    fn search_swallows_navigation_keys() {
        let mut st = test_state();
        for c in "rpm".chars() {
            handle_key(&mut st, key(KeyCode::Char(c)));
        }
        for code in [
            KeyCode::Up,
            KeyCode::PageUp,
            KeyCode::PageDown,
            KeyCode::Home,
            KeyCode::End,
            KeyCode::Delete,
            KeyCode::Enter,
        ] {
            handle_key(&mut st, key(code));
        }
        assert_eq!(st.filter_text, "rpm");
        assert_eq!(st.focus, Focus::Search);
    }

    #[test]
    fn search_inserts_command_letters_instead_of_running_them() {
        let mut st = test_state();
        let polling = st.polling;
        handle_key(&mut st, key(KeyCode::Char('p')));
        assert_eq!(st.polling, polling);
        assert_eq!(st.filter_text, "p");

        assert_eq!(
            handle_key(&mut st, key(KeyCode::Char('q'))),
            KeyOutcome::Continue
        );
        assert_eq!(st.filter_text, "pq");
    }

    #[test]
    fn search_editing_keys() {
        let mut st = test_state();
        for c in "temp".chars() {
            handle_key(&mut st, key(KeyCode::Char(c)));
        }
        handle_key(&mut st, key(KeyCode::Left));
        handle_key(&mut st, key(KeyCode::Backspace));
        assert_eq!(st.filter_text, "tep");
        handle_key(&mut st, key(KeyCode::Esc));
        assert_eq!(st.filter_text, "");
        assert_eq!(st.filter_cursor, 0);
    }

    #[test]
    fn rate_keys_adjust_outside_search() {
        let mut st = test_state();
        st.focus = Focus::Browser;
        handle_key(&mut st, key(KeyCode::Char('+')));
        assert_eq!(st.rate_hz, 10.5);
        st.focus = Focus::ValueList;
        handle_key(&mut st, key(KeyCode::Char('-')));
        handle_key(&mut st, key(KeyCode::Char('-')));
        assert_eq!(st.rate_hz, 9.5);
    }

    #[test]
    fn search_keeps_dash_and_underscore_typable() {
        let mut st = test_state();
        for c in "throttle_pos-2".chars() {
            handle_key(&mut st, key(KeyCode::Char(c)));
        }
        assert_eq!(st.filter_text, "throttle_pos-2");
        assert_eq!(st.rate_hz, 10.0);
        // '+' is not filter text and does nothing while searching.
        handle_key(&mut st, key(KeyCode::Char('+')));
        assert_eq!(st.filter_text, "throttle_pos-2");
        assert_eq!(st.rate_hz, 10.0);
    }

    #[test]
    fn ctrl_c_quits_from_any_focus() {
        let mut st = test_state();
        assert_eq!(handle_key(&mut st, ctrl('c')), KeyOutcome::Quit);
        st.focus = Focus::Browser;
        assert_eq!(handle_key(&mut st, ctrl('c')), KeyOutcome::Quit);
        st.addr_input = Some("3".to_string());
        assert_eq!(handle_key(&mut st, ctrl('c')), KeyOutcome::Quit);
    }

    #[test]
    fn browser_select_operates_on_filtered_view() {
        let mut st = test_state();
        st.filter_text = "target".to_string();
        st.focus = Focus::Browser;
        st.browser_cursor = 1; // boostTarget within the filtered view
        handle_key(&mut st, key(KeyCode::Char(' ')));
        assert_eq!(st.selection.len(), 1);
        assert_eq!(st.selection[0].name, "boostTarget");

        // Toggling again removes it.
        handle_key(&mut st, key(KeyCode::Char(' ')));
        assert!(st.selection.is_empty());
    }

    #[test]
    fn browser_navigation_clamps() {
        let mut st = test_state();
        st.focus = Focus::Browser;
        handle_key(&mut st, key(KeyCode::Up));
        assert_eq!(st.browser_cursor, 0);
        handle_key(&mut st, key(KeyCode::End));
        assert_eq!(st.browser_cursor, 4);
        handle_key(&mut st, key(KeyCode::Down));
        assert_eq!(st.browser_cursor, 4);
        st.browser_rows = 3;
        handle_key(&mut st, key(KeyCode::PageUp));
        assert_eq!(st.browser_cursor, 1);
        handle_key(&mut st, key(KeyCode::PageDown));
        assert_eq!(st.browser_cursor, 4);
        handle_key(&mut st, key(KeyCode::Home));
        assert_eq!(st.browser_cursor, 0);
    }

    #[test]
    fn value_pane_remove_and_clear() {
        let mut st = test_state();
        for e in st.catalog.clone() {
            st.toggle_selected(&e);
        }
        st.focus = Focus::ValueList;
        st.values_cursor = 1;
        handle_key(&mut st, key(KeyCode::Delete));
        assert_eq!(st.selection.len(), 4);
        assert_eq!(st.selection[1].name, "coolantTemp");

        handle_key(&mut st, key(KeyCode::Char('r')));
        assert_eq!(st.selection.len(), 3);

        handle_key(&mut st, key(KeyCode::Char('c')));
        assert!(st.selection.is_empty());
        assert_eq!(st.values_cursor, 0);
        // The emptied pane no longer holds focus.
        assert_eq!(st.focus, Focus::Search);
    }

    #[test]
    fn quit_key_outside_search() {
        let mut st = test_state();
        st.focus = Focus::Browser;
        assert_eq!(handle_key(&mut st, key(KeyCode::Char('q'))), KeyOutcome::Quit);
    }

    #[test]
    fn address_entry_flow() {
        let mut st = test_state();
        st.focus = Focus::Browser;
        handle_key(&mut st, key(KeyCode::Char('e')));
        assert!(st.addr_input.is_some());

        handle_key(&mut st, key(KeyCode::Char('1')));
        handle_key(&mut st, key(KeyCode::Char('2')));
        handle_key(&mut st, key(KeyCode::Backspace));
        handle_key(&mut st, key(KeyCode::Char('4')));
        handle_key(&mut st, key(KeyCode::Enter));
        assert!(st.addr_input.is_none());
        assert_eq!(st.device_addr, 14);
        assert!(st.last_error.is_none());

        // Out-of-range entry keeps the previous address and surfaces an
        // error.
        handle_key(&mut st, key(KeyCode::Char('e')));
        handle_key(&mut st, key(KeyCode::Char('2')));
        handle_key(&mut st, key(KeyCode::Char('0')));
        handle_key(&mut st, key(KeyCode::Enter));
        assert_eq!(st.device_addr, 14);
        assert!(st.last_error.is_some());

        // Esc cancels without committing.
        handle_key(&mut st, key(KeyCode::Char('e')));
        handle_key(&mut st, key(KeyCode::Char('7')));
        handle_key(&mut st, key(KeyCode::Esc));
        assert!(st.addr_input.is_none());
        assert_eq!(st.device_addr, 14);
    }

    #[test]
    fn source_cycle_key() {
        let mut st = test_state();
        st.focus = Focus::Browser;
        st.browser_cursor = 3;
        handle_key(&mut st, key(KeyCode::Char('f')));
        assert_eq!(st.source_mode, SourceMode::Config);
        assert_eq!(st.browser_cursor, 0);
    }
}
