//! Replicated database simulator.
//!
//! Runs a transaction script against a simulated set of sites.
//!
//! ```bash
//! replisim scripts/test1.txt
//! RUST_LOG=replisim=debug replisim --sites 4 < script.txt
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use replisim::{Config, Driver};
use replisim_base::{ErrorKind, Result};
use replisim_ui::TextSink;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "replisim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Script to run. Reads standard input when omitted.
    input: Option<PathBuf>,

    /// Write reports to this file instead of standard output.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of sites
    #[arg(long, default_value_t = 10)]
    sites: u8,

    /// Number of variables
    #[arg(long, default_value_t = 20)]
    variables: u32,
}

fn main() -> ExitCode {
    // Reports go to stdout, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            match e.kind() {
                ErrorKind::Script => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = Config {
        sites: args.sites,
        variables: args.variables,
    };
    let mut driver = Driver::new(config)?;
    let input: Box<dyn BufRead> = match &args.input {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(std::io::stdin().lock()),
    };
    let output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(std::io::stdout()),
    };
    let mut sink = TextSink::new(output);
    driver.run(input, &mut sink)
}
