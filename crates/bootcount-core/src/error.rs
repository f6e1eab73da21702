//! Error types for bootcount-core
//!
//! Every variant is fatal for the operation that produced it and carries
//! enough context (offset, observed magic, device error) to diagnose it.

use crate::device::DeviceError;
use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Partition geometry could not be queried
    GeometryQuery(DeviceError),
    /// The one-erase-block scratch buffer could not be allocated
    Allocation {
        /// Requested buffer size in bytes
        size: usize,
    },
    /// A record slot could not be read
    ReadFailed {
        /// Offset of the slot
        offset: u32,
        /// Underlying device failure
        source: DeviceError,
    },
    /// A slot holds neither a valid record nor erased flash
    CorruptLog {
        /// Offset of the offending slot
        offset: u32,
        /// Magic value found there
        magic: u32,
    },
    /// The erase primitive failed
    EraseFailed {
        /// Start of the erase range
        start: u32,
        /// Length of the erase range
        len: u32,
        /// Whether the whole partition was being erased
        full: bool,
        /// Underlying device failure
        source: DeviceError,
    },
    /// The write primitive failed
    WriteFailed {
        /// Start of the write
        offset: u32,
        /// Number of bytes being written
        len: usize,
        /// Underlying device failure
        source: DeviceError,
    },
    /// The device accepted fewer bytes than requested
    ShortWrite {
        /// Start of the write
        offset: u32,
        /// Number of bytes requested
        expected: usize,
        /// Number of bytes written
        written: usize,
    },
    /// Pending writes could not be flushed to the media
    SyncFailed(DeviceError),
}

impl Error {
    /// Process exit code reported for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::GeometryQuery(_) => 1,
            Self::Allocation { .. } => 2,
            Self::CorruptLog { .. } => 3,
            Self::EraseFailed { full: true, .. } => 4,
            Self::EraseFailed { full: false, .. } => 5,
            Self::WriteFailed { .. } | Self::ShortWrite { .. } => 6,
            Self::ReadFailed { .. } => 7,
            Self::SyncFailed(_) => 8,
        }
    }

    /// Whether the flash may have been modified before the failure
    ///
    /// After an erase or write failure the log contents are undefined and
    /// the next attempt has to start from a fresh scan.
    pub fn flash_modified(&self) -> bool {
        matches!(
            self,
            Self::EraseFailed { .. }
                | Self::WriteFailed { .. }
                | Self::ShortWrite { .. }
                | Self::SyncFailed(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GeometryQuery(e) => {
                write!(f, "unable to obtain geometry for the partition: {}", e)
            }
            Self::Allocation { size } => {
                write!(f, "unable to allocate {} bytes of scratch memory", size)
            }
            Self::ReadFailed { offset, source } => {
                write!(f, "failed to read record at offset 0x{:08X}: {}", offset, source)
            }
            Self::CorruptLog { offset, magic } => write!(
                f,
                "unexpected magic 0x{:08X} at offset 0x{:08X}; aborting",
                magic, offset
            ),
            Self::EraseFailed {
                start,
                len,
                full,
                source,
            } => write!(
                f,
                "failed to erase {} 0x{:08X}..0x{:08X}: {}",
                if *full { "partition" } else { "block" },
                start,
                start.saturating_add(*len),
                source
            ),
            Self::WriteFailed {
                offset,
                len,
                source,
            } => write!(
                f,
                "failed to write {} bytes at offset 0x{:08X}: {}",
                len, offset, source
            ),
            Self::ShortWrite {
                offset,
                expected,
                written,
            } => write!(
                f,
                "short write at offset 0x{:08X}: {} of {} bytes written",
                offset, written, expected
            ),
            Self::SyncFailed(e) => write!(f, "failed to sync written record: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
