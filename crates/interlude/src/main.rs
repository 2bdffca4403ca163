use anyhow::Result;

use interlude::cli::{Args, Command};
use interlude::{logging, runtime};

fn main() -> Result<()> {
    let args = Args::parse_checked();
    logging::init(&args.log.log_level, args.log.log_file.as_deref())?;

    match args.command() {
        Command::Run(run) => runtime::run(run),
        Command::Authorize(auth) => runtime::authorize(auth),
    }
}
