use std::io::{stdin, stdout};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use rum::{loader, Interpreter};

/// Run a Universal Machine program.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a UM program file (a sequence of 32-bit big-endian words).
    program: PathBuf,

    /// Increase log verbosity (-v for debug, -vv for trace). Ignored if
    /// RUST_LOG is set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let program = match loader::boot(&args.program) {
        Ok(program) => program,
        Err(e) => {
            error!(%e, "failed to load program");
            return ExitCode::FAILURE;
        }
    };

    let mut interpreter = Interpreter::new(program);
    match interpreter.run(&mut stdin(), &mut stdout()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(%e, "fatal condition during execution");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
