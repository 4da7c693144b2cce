mod config;
mod data;
mod prompt;
mod report;
mod session;
mod stats;
mod viewer;

use std::io;

use anyhow::Result;
use clap::Parser;

use config::{Args, CityCatalog};
use prompt::Console;
use session::Session;

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .init();

    args.validate()?;
    let catalog = CityCatalog::from_args(&args)?;

    let stdin = io::stdin();
    let mut console = Console::new(stdin.lock(), io::stdout());
    Session::new(&catalog, args.page_size).run(&mut console)
}
