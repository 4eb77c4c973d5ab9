//! Headless terminal runner
//!
//! Feeds a byte stream from stdin or a file into the state engine and
//! writes the resulting screen snapshot, for testing and automation.
//!
//! ```bash
//! # Process escape sequences and output a JSON snapshot
//! printf 'Hello \x1b[31mRed\x1b[0m' | vtstate-headless
//!
//! # Process from a file and output plain text
//! vtstate-headless -i input.bin -t
//!
//! # Custom terminal size
//! vtstate-headless -c 120 -r 40 -i input.bin -o snapshot.json
//! ```

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vtstate::{EngineConfig, ModeFlags, TerminalEngine};

struct Args {
    /// Input file (stdin if not specified)
    input: Option<PathBuf>,
    /// Output file (stdout if not specified)
    output: Option<PathBuf>,
    /// Output as text instead of JSON
    text: bool,
    cols: u16,
    rows: u16,
    scrollback: usize,
    help: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            text: false,
            cols: 80,
            rows: 24,
            scrollback: 1000,
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
            }
            "-i" | "--input" => {
                i += 1;
                if i < argv.len() {
                    args.input = Some(PathBuf::from(&argv[i]));
                }
            }
            "-o" | "--output" => {
                i += 1;
                if i < argv.len() {
                    args.output = Some(PathBuf::from(&argv[i]));
                }
            }
            "-t" | "--text" => {
                args.text = true;
            }
            "-c" | "--cols" => {
                i += 1;
                if i < argv.len() {
                    args.cols = argv[i].parse().unwrap_or(80);
                }
            }
            "-r" | "--rows" => {
                i += 1;
                if i < argv.len() {
                    args.rows = argv[i].parse().unwrap_or(24);
                }
            }
            "-s" | "--scrollback" => {
                i += 1;
                if i < argv.len() {
                    args.scrollback = argv[i].parse().unwrap_or(1000);
                }
            }
            _ => {}
        }
        i += 1;
    }

    args
}

fn print_help() {
    eprintln!(
        r#"vtstate-headless - headless terminal state engine for testing

USAGE:
    vtstate-headless [OPTIONS]

OPTIONS:
    -h, --help              Show this help message
    -i, --input <FILE>      Input file (stdin if not specified)
    -o, --output <FILE>     Output file (stdout if not specified)
    -t, --text              Output as plain text instead of JSON
    -c, --cols <N>          Terminal columns (default: 80)
    -r, --rows <N>          Terminal rows (default: 24)
    -s, --scrollback <N>    Retained lines (default: 1000)
"#
    );
}

fn main() -> ExitCode {
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
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let input_data = if let Some(path) = &args.input {
        std::fs::read(path)?
    } else {
        let mut data = Vec::new();
        io::stdin().read_to_end(&mut data)?;
        data
    };

    let mut config = EngineConfig::with_size(args.cols, args.rows);
    config.scrollback_lines = args.scrollback;
    let term = TerminalEngine::new(config);
    term.add_mode_flags(ModeFlags::AUTO_WRAP);
    term.insert(&input_data)?;

    let snapshot = term.snapshot();
    let output_data = if args.text {
        snapshot.to_text()
    } else {
        snapshot.to_json()?
    };

    if let Some(path) = &args.output {
        let mut file = File::create(path)?;
        file.write_all(output_data.as_bytes())?;
    } else {
        io::stdout().write_all(output_data.as_bytes())?;
    }

    Ok(())
}
