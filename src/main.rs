mod args;
mod kiosk;
mod vote;

use clap::Parser;
use log::{debug, LevelFilter};
use snafu::ErrorCompat;

use crate::args::Args;
use crate::kiosk::Kiosk;
use crate::vote::VoteResult;

fn run(args: &Args) -> VoteResult<()> {
    let election = vote::build_election(&args.config, args.top)?;
    if let Some(dest) = args.export.as_deref() {
        return vote::run_export(&election, dest);
    }
    if args.tally {
        return vote::run_tally(&election, args.out.clone());
    }
    let stdin = std::io::stdin();
    let mut kiosk = Kiosk::new(&election, stdin.lock(), std::io::stdout());
    kiosk.run()
}

fn main() {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_default_env()
            .filter_level(LevelFilter::Debug)
            .init();
    } else {
        env_logger::init();
    }
    debug!("args: {:?}", args);

    if let Err(e) = run(&args) {
        eprintln!("An error occured: {}", e);
        if let Some(source) = std::error::Error::source(&e) {
            eprintln!("Caused by: {}", source);
        }
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
