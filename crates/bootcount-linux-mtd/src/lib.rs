//! bootcount-linux-mtd - Linux MTD (Memory Technology Device) backend
//!
//! This crate gives the boot counter access to a raw flash partition
//! through the Linux MTD subsystem. Partitions are exposed at `/dev/mtdN`;
//! geometry comes from the `MEMGETINFO` ioctl, erases go through
//! `MEMERASE`, and records are read and written with positioned I/O.
//!
//! # Example
//!
//! ```ignore
//! use bootcount_linux_mtd::open_linux_mtd;
//!
//! let mut mtd = open_linux_mtd("s_env")?;
//! let outcome = bootcount_core::reset_boot_count(&mut mtd)?;
//! ```
//!
//! # Device names
//!
//! A partition can be given as:
//! - a device node path: `/dev/mtd3`
//! - a device number: `mtd3`
//! - a partition name: `s_env` (looked up in `/sys/class/mtd/*/name`)
//!
//! List available partitions:
//! ```bash
//! cat /proc/mtd
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with MTD support (`CONFIG_MTD`) and the MTD character
//!   device (`CONFIG_MTD_CHAR`)
//! - Read/write access to `/dev/mtdN` (usually root)

pub mod device;
pub mod error;

// Re-exports
pub use device::{DeviceSpec, LinuxMtd, LinuxMtdConfig, MtdInfo};
pub use error::{LinuxMtdError, Result};

/// Open the partition named by `device` (path, `mtdN` or partition name)
pub fn open_linux_mtd(device: &str) -> Result<LinuxMtd> {
    let spec: DeviceSpec = device.parse()?;
    LinuxMtd::open(&LinuxMtdConfig::new(spec))
}
