use epiccan::proto::DEVICE_ADDR_MAX;
use getopts::Options;

pub mod monitor;

/// Options shared by every tool talking to the bus.
pub struct BusOpts {
    pub iface: String,
    pub device_addr: u8,
    pub vars_path: String,
    pub funcs_path: String,
}

pub fn bus_opts() -> Options {
    let mut opts = Options::new();
    opts.optopt("i", "iface", "CAN interface name (default can0)", "name");
    opts.optopt("e", "ecu", "target device address 0..15 (default 0)", "addr");
    opts.optopt(
        "",
        "vars",
        "variable catalog path (default variables.json)",
        "path",
    );
    opts.optopt(
        "",
        "funcs",
        "function catalog path (default functions_v1.json)",
        "path",
    );
    opts.optflag("h", "help", "Show help");
    opts
}

pub fn bus_parseopts(opts: &Options, args: &[String]) -> (getopts::Matches, BusOpts) {
    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(f) => {
            eprintln!("{}", f);
            std::process::exit(2);
        }
    };
    let iface = matches
        .opt_str("iface")
        .unwrap_or_else(|| "can0".to_string());
    let device_addr = matches
        .opt_str("ecu")
        .and_then(|s| s.parse::<u8>().ok())
        .unwrap_or(0)
        .min(DEVICE_ADDR_MAX);
    let vars_path = matches
        .opt_str("vars")
        .unwrap_or_else(|| "variables.json".to_string());
    let funcs_path = matches
        .opt_str("funcs")
        .unwrap_or_else(|| "functions_v1.json".to_string());
    (
        matches,
        BusOpts {
            iface,
            device_addr,
            vars_path,
            funcs_path,
        },
    )
}
