//! mtd-bootcount - Boot-attempt counter maintenance for MTD partitions
//!
//! Routers that detect boot loops keep a boot-attempt counter in a raw
//! flash partition. The bootloader increments it on every attempt; once
//! the system has come up, `mtd-bootcount resetbc <partition>` sets it back
//! to zero.
//!
//! Exit status is 0 on success (including a counter that was already zero)
//! and a distinct non-zero code for each failure kind.

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use error::CliError;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            if let CliError::BootCount(inner) = &e {
                if inner.flash_modified() {
                    log::warn!("Boot-count log may be inconsistent; it will be rescanned on the next attempt");
                }
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(command: Commands) -> Result<(), CliError> {
    match command {
        Commands::ResetBc { device } => {
            let mut mtd = bootcount_linux_mtd::open_linux_mtd(&device)?;
            commands::run_resetbc(&mut mtd)?;
        }
        Commands::Show { device } => {
            let mut mtd = bootcount_linux_mtd::open_linux_mtd(&device)?;
            commands::run_show(&mut mtd)?;
        }
    }
    Ok(())
}
