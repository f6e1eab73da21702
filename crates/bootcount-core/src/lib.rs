//! bootcount-core - Boot-attempt counter log for raw flash partitions
//!
//! Routers keep a small log of boot-attempt records in a dedicated MTD
//! partition. The bootloader bumps the counter on every attempt and falls
//! back to a recovery image once it crosses a threshold; userspace resets
//! it to zero after a successful boot.
//!
//! Flash can only be cleared to all-ones one erase block at a time, and
//! programming only flips bits from 1 to 0. The counter is therefore an
//! append-only log of fixed-size records:
//!
//! ```text
//! | magic | count | checksum | 0xFF padding ... |  <- slot 0
//! | magic | count | checksum | 0xFF padding ... |  <- slot 1
//! | 0xFFFFFFFF ...                              |  <- first free slot
//! ```
//!
//! This crate knows the record format, the slot geometry and the reset
//! algorithm. The device itself is abstracted behind [`BootCountDevice`].
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable the scan buffer and the reset operation
//!
//! # Example
//!
//! ```ignore
//! use bootcount_core::{reset_boot_count, ResetOutcome};
//!
//! match reset_boot_count(&mut device)? {
//!     ResetOutcome::AlreadyZero => println!("nothing to do"),
//!     ResetOutcome::Reset { offset, .. } => println!("reset at 0x{:08X}", offset),
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod device;
pub mod error;
pub mod geometry;
pub mod record;
#[cfg(feature = "alloc")]
pub mod reset;
pub mod scan;

pub use device::{BootCountDevice, DeviceError, RawGeometry};
pub use error::{Error, Result};
pub use geometry::{slot_offset, PartitionGeometry, MIN_RECORD_STRIDE};
pub use record::{BootCounterRecord, RecordState, BOOTCOUNT_MAGIC, ERASED_MAGIC, RECORD_LEN};
#[cfg(feature = "alloc")]
pub use reset::{reset_boot_count, ResetOutcome};
pub use scan::{read_boot_count, scan_log, LogState, LogStatus, RecordScan, Slot, SlotIter};
