//! Headless Terminal Driver Runner
//!
//! Runs the driver against simulated hardware: types keystrokes on one
//! terminal, optionally writes a message, reads back every complete line
//! and prints what reached the screen along with the statistics.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tty_monitor::sim::{InterruptPump, SimulatedDevice};
use tty_monitor::{Config, TerminalDriver};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

/// Command-line arguments
struct Args {
    /// Terminal to drive
    term: usize,
    /// Keystrokes, with `\r`, `\n`, `\b`, `\t` and `\\` escapes
    keys: Vec<u8>,
    /// Message written after typing
    message: Option<Vec<u8>>,
    /// Driver configuration file
    config: Option<PathBuf>,
    format: OutputFormat,
    help: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            term: 0,
            keys: Vec::new(),
            message: None,
            config: None,
            format: OutputFormat::Text,
            help: false,
        }
    }
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let argv: Vec<String> = std::env::args().skip(1).collect();

    let mut i = 0;
    while i < argv.len() {
        match argv[i].as_str() {
            "-h" | "--help" => {
                args.help = true;
            },
            "-t" | "--terminal" => {
                i += 1;
                if i < argv.len() {
                    args.term = argv[i].parse().unwrap_or(0);
                }
            },
            "-k" | "--keys" => {
                i += 1;
                if i < argv.len() {
                    args.keys = unescape(&argv[i]);
                }
            },
            "-w" | "--write" => {
                i += 1;
                if i < argv.len() {
                    args.message = Some(unescape(&argv[i]));
                }
            },
            "-c" | "--config" => {
                i += 1;
                if i < argv.len() {
                    args.config = Some(PathBuf::from(&argv[i]));
                }
            },
            "-j" | "--json" => {
                args.format = OutputFormat::Json;
            },
            _ => {},
        }
        i += 1;
    }

    args
}

/// Expand the backslash escapes accepted on the command line
fn unescape(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    let mut bytes = s.bytes();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'r') => out.push(b'\r'),
            Some(b'n') => out.push(b'\n'),
            Some(b'b') => out.push(0x08),
            Some(b't') => out.push(b'\t'),
            Some(other) => out.push(other),
            None => out.push(b'\\'),
        }
    }
    out
}

fn print_help() {
    eprintln!(
        r#"tty-headless - Drive a terminal over simulated hardware

USAGE:
    tty-headless [OPTIONS]

OPTIONS:
    -h, --help              Show this help message
    -t, --terminal <N>      Terminal index (default: 0)
    -k, --keys <TEXT>       Keystrokes to type (escapes: \r \n \b \t \\)
    -w, --write <TEXT>      Message to write after typing
    -c, --config <FILE>     Driver configuration (JSON, default:
                            ~/.config/tty-monitor/config.json)
    -j, --json              Print statistics as JSON

EXAMPLES:
    # Type a line with a correction and read it back
    tty-headless -k 'ab\bc\r'

    # Type, then have the program answer
    tty-headless -k 'ls\r' -w '\nfile.txt\n' --json
"#
    );
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = parse_args();
    if args.help {
        print_help();
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        },
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(),
    };
    let input_capacity = config.input_capacity;

    let device = Arc::new(SimulatedDevice::new(config.max_terminals));
    let driver = Arc::new(TerminalDriver::new(config, Arc::clone(&device))?);
    let pump = InterruptPump::start(Arc::clone(&driver), Arc::clone(&device))?;

    driver.init_terminal(args.term)?;
    tracing::info!("Terminal {} up", args.term);

    device.type_bytes(&driver, args.term, &args.keys)?;
    if let Some(message) = &args.message {
        driver.write(args.term, message)?;
    }
    driver.drain(args.term)?;

    let mut lines = Vec::new();
    while driver.lines_available(args.term)? > 0 {
        lines.push(driver.read(args.term, input_capacity)?);
    }

    let screen = device.transcript(args.term);
    let stats = driver.statistics();
    pump.stop();

    println!("screen: \"{}\"", screen.escape_ascii());
    for line in &lines {
        println!("read:   \"{}\"", line.escape_ascii());
    }
    match args.format {
        OutputFormat::Text => print!("{}", stats.to_text()),
        OutputFormat::Json => println!("{}", stats.to_json()?),
    }
    Ok(())
}
