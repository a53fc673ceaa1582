// epic-monitor
//
// Interactive live telemetry monitor for EPIC engine controllers on a
// shared CAN bus. Browse the variable catalog, pick a working set, and
// watch the values refresh. Quit: q (outside the filter) or Ctrl-C.

use crossterm::event::{self, Event};

use epiccan::bus::Bus;
use epiccan::catalog;
use epiccan::var::{VarClient, VariableReader};
use epiccan_tools::monitor::keys::{handle_key, KeyOutcome};
use epiccan_tools::monitor::poll::{run_tick, PollScheduler};
use epiccan_tools::monitor::state::MonitorState;
use epiccan_tools::monitor::view::Tui;
use epiccan_tools::{bus_opts, bus_parseopts};

use std::process::ExitCode;
use std::time::{Duration, Instant};

// Upper bound on one key wait, so the tick decision is re-evaluated
// often enough at the highest poll rates.
const INPUT_POLL: Duration = Duration::from_millis(20);

fn print_usage(opts: &getopts::Options, program: &str) {
    let brief = format!(
        "Usage: {program} [options]\n\n\
         Live variable monitor for EPIC controllers over the CAN bus."
    );
    eprintln!("{}", opts.usage(&brief));
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = bus_opts();
    opts.optopt("r", "rate", "poll rate in Hz (default 10.0)", "hz");
    let (matches, bus_args) = bus_parseopts(&opts, &args);
    if matches.opt_present("help") {
        print_usage(&opts, args.first().map(String::as_str).unwrap_or("epic-monitor"));
        return ExitCode::SUCCESS;
    }
    let rate = matches
        .opt_str("rate")
        .and_then(|s| s.parse::<f32>().ok())
        .unwrap_or(10.0);

    let catalog = catalog::load_variables(&bus_args.vars_path);
    let mut st = MonitorState::new(bus_args.iface.clone(), bus_args.device_addr, rate, catalog);

    // A failed open is not fatal: the session continues browse-only with
    // polling disabled and the error surfaced in the header.
    let mut client = match Bus::open(&bus_args.iface) {
        Ok(bus) => Some(VarClient::new(bus)),
        Err(e) => {
            st.polling = false;
            st.set_error(format!("CAN open failed: {:?}", e));
            None
        }
    };

    let mut tui = match Tui::setup() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("terminal setup failed: {}", e);
            return ExitCode::FAILURE;
        }
    };
    Tui::install_panic_hook();

    let mut sched = PollScheduler::new();
    loop {
        if tui.draw(&mut st).is_err() {
            break;
        }

        match event::poll(INPUT_POLL) {
            Ok(true) => {
                if let Ok(Event::Key(key)) = event::read() {
                    if handle_key(&mut st, key) == KeyOutcome::Quit {
                        break;
                    }
                }
            }
            Ok(false) => {}
            Err(_) => break,
        }

        run_tick(
            &mut st,
            &mut sched,
            client.as_mut().map(|c| c as &mut dyn VariableReader),
            Instant::now(),
        );
    }

    tui.teardown();
    ExitCode::SUCCESS
}
