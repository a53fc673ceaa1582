// epic-tool
//
// One-shot command line access to EPIC controllers: read or watch a
// variable, write a config variable, call a remote function, and list
// the catalogs.

use epiccan::bus::Bus;
use epiccan::catalog::{self, SourceKind};
use epiccan::var::VarClient;
use epiccan_tools::{bus_opts, bus_parseopts, BusOpts};

use std::process::ExitCode;
use std::time::Duration;

fn print_usage(opts: &getopts::Options, program: &str) {
    let brief = format!(
        "Usage: {program} [options] <command> [args]\n\n\
         Commands:\n\
         \x20 vars                      list cataloged variables\n\
         \x20 funcs                     list cataloged functions\n\
         \x20 get <name|hash>           read one variable\n\
         \x20 watch <name|hash>         read repeatedly until Ctrl-C\n\
         \x20 set <name> <value>        write a config variable\n\
         \x20 call <name|id> [arg] [arg2]  call a remote function"
    );
    eprintln!("{}", opts.usage(&brief));
}

fn open_client(bus: &BusOpts, timeout: Duration) -> Result<VarClient, ()> {
    match Bus::open(&bus.iface) {
        Ok(b) => Ok(VarClient::with_timeout(b, timeout)),
        Err(e) => {
            eprintln!("Failed to open {}: {:?}", bus.iface, e);
            Err(())
        }
    }
}

fn cmd_vars(bus: &BusOpts) -> Result<(), ()> {
    let vars = catalog::load_variables(&bus.vars_path);
    if vars.is_empty() {
        eprintln!("No variables cataloged in {}", bus.vars_path);
        return Ok(());
    }
    for v in vars {
        println!("{:<32} {:>12} {}", v.name, v.hash, v.source);
    }
    Ok(())
}

fn cmd_funcs(bus: &BusOpts) -> Result<(), ()> {
    let funcs = catalog::load_functions(&bus.funcs_path);
    if funcs.is_empty() {
        eprintln!("No functions cataloged in {}", bus.funcs_path);
        return Ok(());
    }
    for f in funcs {
        println!(
            "{:>4}  {:<28} arg={:<7} ret={}",
            f.id,
            f.lua_name,
            f.arg.as_deref().unwrap_or("NONE"),
            f.ret.as_deref().unwrap_or("NONE")
        );
    }
    Ok(())
}

fn cmd_get(bus: &BusOpts, timeout: Duration, token: &str) -> Result<(), ()> {
    let hash = catalog::resolve_var_token(token);
    let mut client = open_client(bus, timeout)?;
    match client.read(hash, bus.device_addr) {
        Ok(v) => {
            println!("{}", v);
            Ok(())
        }
        Err(e) => {
            eprintln!("read failed: {}", e);
            Err(())
        }
    }
}

fn cmd_watch(bus: &BusOpts, timeout: Duration, rate_hz: f32, token: &str) -> Result<(), ()> {
    let hash = catalog::resolve_var_token(token);
    let mut client = open_client(bus, timeout)?;
    let period = Duration::from_secs_f32(1.0 / rate_hz.clamp(0.5, 50.0));
    loop {
        match client.read(hash, bus.device_addr) {
            Ok(v) => println!("[{}] {}", chrono::Local::now().format("%H:%M:%S%.3f"), v),
            Err(e) => eprintln!("read failed: {}", e),
        }
        std::thread::sleep(period);
    }
}

fn cmd_set(bus: &BusOpts, timeout: Duration, name: &str, value: &str) -> Result<(), ()> {
    let value: f32 = match value.parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("invalid value: {:?}", value);
            return Err(());
        }
    };

    // Only cataloged config variables are writable.
    let vars = catalog::load_variables(&bus.vars_path);
    let entry = match catalog::find_by_name(&vars, name) {
        Some(e) if e.source == SourceKind::Config => e.clone(),
        Some(_) => {
            eprintln!("variable {:?} is not writable (source is not config)", name);
            return Err(());
        }
        None => {
            eprintln!("variable {:?} not found in {}", name, bus.vars_path);
            return Err(());
        }
    };

    let mut client = open_client(bus, timeout)?;
    match client.write(entry.hash, value, bus.device_addr) {
        Ok(()) => {
            println!(
                "sent set {} = {} (addr={})",
                entry.name, value, bus.device_addr
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("write failed: {}", e);
            Err(())
        }
    }
}

fn cmd_call(bus: &BusOpts, timeout: Duration, args: &[String]) -> Result<(), ()> {
    let token = &args[0];
    let funcs = catalog::load_functions(&bus.funcs_path);
    let func_id = match catalog::resolve_func_token(&funcs, token) {
        Some(id) => id,
        None => {
            eprintln!("unknown function: {:?}", token);
            return Err(());
        }
    };
    let arg: f32 = match args.get(1) {
        Some(s) => match s.parse() {
            Ok(v) => v,
            Err(_) => {
                eprintln!("invalid argument: {:?}", s);
                return Err(());
            }
        },
        None => 0.0,
    };
    let arg2: Option<i16> = match args.get(2) {
        Some(s) => match s.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                eprintln!("invalid second argument: {:?}", s);
                return Err(());
            }
        },
        None => None,
    };

    let mut client = open_client(bus, timeout)?;
    match client.call(func_id, arg, arg2, bus.device_addr) {
        Ok(ret) => {
            println!("{}", ret);
            Ok(())
        }
        Err(e) => {
            eprintln!("call failed: {}", e);
            Err(())
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let mut opts = bus_opts();
    opts.optopt("r", "rate", "watch rate in Hz (default 10.0)", "hz");
    opts.optopt("t", "timeout", "reply timeout in ms (default 1000)", "ms");
    let (matches, bus_args) = bus_parseopts(&opts, &args);
    let program = args.first().map(String::as_str).unwrap_or("epic-tool");

    if matches.opt_present("help") || matches.free.is_empty() {
        print_usage(&opts, program);
        return if matches.opt_present("help") {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    }

    let timeout = Duration::from_millis(
        matches
            .opt_str("timeout")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1000),
    );
    let rate = matches
        .opt_str("rate")
        .and_then(|s| s.parse::<f32>().ok())
        .unwrap_or(10.0);

    let command = matches.free[0].as_str();
    let operands = &matches.free[1..];

    let result = match (command, operands.len()) {
        ("vars", 0) => cmd_vars(&bus_args),
        ("funcs", 0) => cmd_funcs(&bus_args),
        ("get", 1) => cmd_get(&bus_args, timeout, &operands[0]),
        ("watch", 1) => cmd_watch(&bus_args, timeout, rate, &operands[0]),
        ("set", 2) => cmd_set(&bus_args, timeout, &operands[0], &operands[1]),
        ("call", 1..=3) => cmd_call(&bus_args, timeout, operands),
        _ => {
            print_usage(&opts, program);
            Err(())
        }
    };

    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
