//! CLI argument parsing

use clap::{Parser, Subcommand};

/// Help text shared by the device arguments
const DEVICE_HELP: &str = "Partition holding the boot counter: /dev/mtdN, mtdN or partition name";

#[derive(Parser)]
#[command(name = "mtd-bootcount")]
#[command(
    author,
    version,
    about = "Boot-attempt counter maintenance for MTD partitions",
    long_about = None
)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reset the boot counter to zero
    #[command(name = "resetbc")]
    ResetBc {
        #[arg(help = DEVICE_HELP)]
        device: String,
    },

    /// Show the boot counter without modifying the partition
    Show {
        #[arg(help = DEVICE_HELP)]
        device: String,
    },
}
