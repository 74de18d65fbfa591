//! Stackdef CLI: typed configuration defaulting for infrastructure stacks.

use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "stackdef",
    version,
    about = "Typed configuration defaulting for infrastructure stacks: schema-driven merge, derived shapes, deployment waves"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Log output format: text or json
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: stackdef::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    let log = stackdef::cli::LogOptions {
        verbose: cli.verbose,
        format: cli.log_format,
    };
    if let Err(e) = stackdef::cli::dispatch(cli.command, &log) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
