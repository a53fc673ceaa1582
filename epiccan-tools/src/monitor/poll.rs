//! Periodic refresh of the value cache.
//!
//! A tick is due when the time since the last completed pass reaches the
//! poll period. Within one pass every selected variable is read in
//! selection order; each read succeeds or fails on its own, so one
//! unresponsive signal never blocks the rest. Failed reads are simply
//! retried on the next tick.

use epiccan::var::VariableReader;

use std::time::{Duration, Instant};

use super::state::MonitorState;

pub struct PollScheduler {
    last_tick: Option<Instant>,
}

impl PollScheduler {
    pub fn new() -> PollScheduler {
        PollScheduler { last_tick: None }
    }

    /// Whether a poll pass is due at `now`. The first tick is always due.
    pub fn tick_due(&self, rate_hz: f32, now: Instant) -> bool {
        match self.last_tick {
            None => true,
            Some(last) => now.duration_since(last) >= Duration::from_secs_f32(1.0 / rate_hz),
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_tick = Some(now);
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// One poll pass over the whole selection.
pub fn poll_once(st: &mut MonitorState, reader: &mut dyn VariableReader) {
    let dest = st.device_addr;
    let targets: Vec<(i32, String)> = st
        .selection
        .iter()
        .map(|e| (e.hash, e.name.clone()))
        .collect();
    for (hash, name) in targets {
        match reader.read_var(hash, dest) {
            Ok(value) => {
                st.record_value(hash, value);
                st.clear_error();
            }
            Err(e) => st.set_error(format!("{}: {}", name, e)),
        }
    }
}

/// Evaluates the tick decision and runs a poll pass when one is due.
/// Returns whether a pass ran. With the transport absent the tick is
/// consumed without attempting any read.
pub fn run_tick(
    st: &mut MonitorState,
    sched: &mut PollScheduler,
    reader: Option<&mut dyn VariableReader>,
    now: Instant,
) -> bool {
    if !st.polling || !sched.tick_due(st.rate_hz, now) {
        return false;
    }
    let ran = match reader {
        Some(r) if !st.selection.is_empty() => {
            poll_once(st, r);
            true
        }
        _ => false,
    };
    sched.mark(Instant::now());
    ran
}
