//! Slot geometry of the boot counter partition
//!
//! Geometry is derived from a live device query on every operation and is
//! never cached.

use crate::device::{BootCountDevice, RawGeometry};
use crate::error::{Error, Result};
use crate::scan::SlotIter;
use log::{debug, warn};

/// Minimum spacing between record slots
///
/// NOR devices often report a write size of 1 byte while the bootloader
/// still spaces records 16 bytes apart. Writing a record into a slot
/// smaller than the physical write unit could clobber its neighbours.
pub const MIN_RECORD_STRIDE: u32 = 16;

/// Derived layout of the record log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionGeometry {
    /// Total partition size in bytes
    pub total_size: u32,
    /// Erase size reported by the device
    pub reported_erase_size: u32,
    /// Write size reported by the device
    pub reported_write_size: u32,
    /// Spacing between slot start offsets
    pub record_stride: u32,
    /// Erase granularity used for accounting, never below the stride
    pub effective_erase_size: u32,
    /// Number of slots per erase block
    pub records_per_block: u32,
    /// Number of slots in the partition
    pub total_records: u32,
}

impl PartitionGeometry {
    /// Derive the log layout from the geometry reported by the device
    pub fn new(raw: RawGeometry) -> Self {
        let record_stride = if raw.write_size < MIN_RECORD_STRIDE {
            debug!(
                "Record stride set to {} for write size of {}",
                MIN_RECORD_STRIDE, raw.write_size
            );
            MIN_RECORD_STRIDE
        } else {
            raw.write_size
        };

        let effective_erase_size = if raw.erase_size < record_stride {
            debug!(
                "Erase size set to {} for erase size of {}",
                record_stride, raw.erase_size
            );
            record_stride
        } else {
            raw.erase_size
        };

        if effective_erase_size % record_stride != 0 {
            warn!(
                "Erase size {} is not a multiple of the record stride {}",
                effective_erase_size, record_stride
            );
        }

        let records_per_block = effective_erase_size / record_stride;

        // Slots never straddle an erase block or run past the partition end
        let full_blocks = raw.total_size / effective_erase_size;
        let tail_slots = (raw.total_size % effective_erase_size) / record_stride;
        let total_records = full_blocks * records_per_block + tail_slots.min(records_per_block);

        Self {
            total_size: raw.total_size,
            reported_erase_size: raw.erase_size,
            reported_write_size: raw.write_size,
            record_stride,
            effective_erase_size,
            records_per_block,
            total_records,
        }
    }

    /// Query the device and derive the log layout
    pub fn query<D: BootCountDevice + ?Sized>(device: &mut D) -> Result<Self> {
        let raw = device.geometry().map_err(Error::GeometryQuery)?;
        debug!(
            "Partition geometry: size={}, erase_size={}, write_size={}",
            raw.total_size, raw.erase_size, raw.write_size
        );
        Ok(Self::new(raw))
    }

    /// Absolute offset of slot `index`
    pub fn slot_offset(&self, index: u32) -> u32 {
        slot_offset(
            index,
            self.record_stride,
            self.records_per_block,
            self.effective_erase_size,
        )
    }

    /// Start offset of the erase block holding slot `index`
    pub fn block_start(&self, index: u32) -> u32 {
        (index / self.records_per_block) * self.effective_erase_size
    }

    /// Size of the scratch buffer holding one erase block
    pub fn block_buffer_len(&self) -> usize {
        self.effective_erase_size as usize
    }

    /// Iterate over all slots of the log, starting at offset 0
    pub fn slots(&self) -> SlotIter {
        SlotIter::new(*self)
    }
}

/// Absolute offset of slot `index` in a partition laid out with
/// `records_per_block` slots of `stride` bytes per `erase_size` block
///
/// `records_per_block` must be non-zero.
pub const fn slot_offset(index: u32, stride: u32, records_per_block: u32, erase_size: u32) -> u32 {
    (index / records_per_block) * erase_size + (index % records_per_block) * stride
}
