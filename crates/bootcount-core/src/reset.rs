//! Resetting the boot counter to zero
//!
//! The reset is strictly sequential: geometry, scan, decide, erase, write,
//! sync. Any failure aborts the whole operation; nothing is retried and
//! nothing is rolled back.

use crate::device::BootCountDevice;
use crate::error::{Error, Result};
use crate::geometry::PartitionGeometry;
use crate::record::BootCounterRecord;
use crate::scan::scan_log;
use alloc::vec::Vec;
use log::{debug, info};

/// Successful outcome of [`reset_boot_count`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The counter was already zero; the device was not modified
    AlreadyZero,
    /// A zero record was written
    Reset {
        /// Count found before the reset
        previous_count: u32,
        /// Offset of the new zero record
        offset: u32,
        /// Whether the log was full and the whole partition was erased
        log_full: bool,
    },
}

/// Reset the boot counter stored on `device` to zero
///
/// If the log has a free slot, the erase block holding it is erased and
/// rewritten with the records that preceded the free slot in that block,
/// followed by a zero record in the free slot. If the log is full, the
/// whole partition is erased and the zero record goes to offset 0.
///
/// A counter that is already zero is left untouched, so calling this
/// repeatedly does not wear the flash.
pub fn reset_boot_count<D: BootCountDevice + ?Sized>(device: &mut D) -> Result<ResetOutcome> {
    let geometry = PartitionGeometry::query(device)?;
    let mut block = alloc_block(&geometry)?;

    let state = scan_log(device, &geometry, &mut block)?;

    if state.last_count == 0 {
        info!("Boot count is already zero");
        return Ok(ResetOutcome::AlreadyZero);
    }

    let (write_start, index_in_block, offset) = match state.free_slot {
        Some(slot) => {
            erase(device, slot.block_start, geometry.effective_erase_size, false)?;
            (slot.block_start, slot.index_in_block, slot.offset)
        }
        None => {
            info!(
                "Boot-count log full with {} entries; erasing (expected occasionally)",
                state.valid_records
            );
            erase(device, 0, geometry.total_size, true)?;
            block.fill(0xFF);
            (0, 0, 0)
        }
    };

    let stride = geometry.record_stride as usize;
    let record_start = index_in_block as usize * stride;
    let len = record_start + stride;
    BootCounterRecord::new(0).encode_slot(&mut block[record_start..len]);

    debug!(
        "Writing {} bytes at 0x{:08X} (zero record at 0x{:08X})",
        len, write_start, offset
    );
    let written = device
        .write_at(write_start, &block[..len])
        .map_err(|source| Error::WriteFailed {
            offset: write_start,
            len,
            source,
        })?;
    if written != len {
        return Err(Error::ShortWrite {
            offset: write_start,
            expected: len,
            written,
        });
    }

    device.sync().map_err(Error::SyncFailed)?;

    info!("Boot count successfully reset to zero");

    Ok(ResetOutcome::Reset {
        previous_count: state.last_count,
        offset,
        log_full: state.free_slot.is_none(),
    })
}

/// Allocate the scratch buffer holding one erase block, filled with 0xFF
fn alloc_block(geometry: &PartitionGeometry) -> Result<Vec<u8>> {
    let size = geometry.block_buffer_len();
    let mut block = Vec::new();
    block
        .try_reserve_exact(size)
        .map_err(|_| Error::Allocation { size })?;
    block.resize(size, 0xFF);
    Ok(block)
}

fn erase<D: BootCountDevice + ?Sized>(
    device: &mut D,
    start: u32,
    len: u32,
    full: bool,
) -> Result<()> {
    debug!("Erasing 0x{:08X}..0x{:08X}", start, start.saturating_add(len));
    device.erase(start, len).map_err(|source| Error::EraseFailed {
        start,
        len,
        full,
        source,
    })
}
