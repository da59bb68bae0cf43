mod cli;

use clap::Parser;
use freehand::logger;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();

    // Session log (overwrites the previous session's log)
    match &args.log_file {
        Some(path) => logger::init_at(path),
        None => logger::init(),
    }

    cli::run(args)
}
