use clap::Parser;

mod app;
mod cli;
mod config;
mod env;
mod exec;
mod tasks;
mod util;

/// Exit status of any failed run, after the kernel tree is back on baseline.
const FAILURE: i32 = 255;

fn main() {
    let cli = crate::cli::Cli::parse();
    crate::util::logger::init(crate::util::logger::level(cli.verbose, cli.quiet));
    if let Err(e) = crate::app::run(&cli) {
        log::error!("{e:#}");
        std::process::exit(FAILURE);
    }
}
