//! Top-level error type for the CLI

use bootcount_linux_mtd::LinuxMtdError;
use thiserror::Error;

/// Errors reported by the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// The partition could not be opened
    #[error(transparent)]
    Device(#[from] LinuxMtdError),

    /// The boot counter operation failed
    #[error(transparent)]
    BootCount(#[from] bootcount_core::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Device(_) => 9,
            Self::BootCount(e) => e.exit_code(),
        }
    }
}
