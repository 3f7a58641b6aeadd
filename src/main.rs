use alphagene::cli::{Cli, run};
use alphagene::logging::init_logging;
use clap::Parser;

fn main() -> std::process::ExitCode {
    if let Err(err) = init_logging() {
        eprintln!("warning: logging disabled: {err}");
    }
    run(Cli::parse())
}
