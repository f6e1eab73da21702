//! Device abstraction for the partition holding the boot counter log
//!
//! Implementations own an already opened, already validated partition.
//! All primitives are blocking and operate on absolute partition offsets.

use core::fmt;

/// Geometry as reported by the device, before any flooring is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawGeometry {
    /// Total partition size in bytes
    pub total_size: u32,
    /// Erase block size in bytes
    pub erase_size: u32,
    /// Minimum writable unit in bytes (1 on most NOR parts)
    pub write_size: u32,
}

/// Failure reported by a device primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The operating system returned an error number
    Os(i32),
    /// The requested range lies outside the partition
    OutOfBounds,
    /// The device does not support the operation
    Unsupported,
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Os(errno) => write!(f, "os error {}", errno),
            Self::OutOfBounds => write!(f, "range outside partition"),
            Self::Unsupported => write!(f, "operation not supported"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DeviceError {}

/// Raw flash partition used to store the boot counter log
///
/// Erase sets a range to all-ones; writes can only clear bits. Callers
/// must hold exclusive access for the duration of an operation.
pub trait BootCountDevice {
    /// Query the partition geometry
    fn geometry(&mut self) -> Result<RawGeometry, DeviceError>;

    /// Read `buf.len()` bytes starting at `offset`
    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), DeviceError>;

    /// Write `data` starting at `offset`, returning the number of bytes
    /// the device accepted
    fn write_at(&mut self, offset: u32, data: &[u8]) -> Result<usize, DeviceError>;

    /// Erase `len` bytes starting at `start`
    fn erase(&mut self, start: u32, len: u32) -> Result<(), DeviceError>;

    /// Flush pending writes to stable media
    fn sync(&mut self) -> Result<(), DeviceError>;
}
