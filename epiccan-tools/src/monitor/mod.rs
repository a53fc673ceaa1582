//! Core of the interactive monitor: session state, keyboard dispatch,
//! the polling scheduler, and pane windowing/drawing. Everything here is
//! driven by the `epic-monitor` binary's control loop and is testable
//! without a terminal or a bus.

pub mod keys;
pub mod poll;
pub mod state;
pub mod view;

pub use keys::{handle_key, KeyOutcome};
pub use poll::{poll_once, run_tick, PollScheduler};
pub use state::{Focus, MonitorState, SourceMode};
pub use view::{window, Tui};
