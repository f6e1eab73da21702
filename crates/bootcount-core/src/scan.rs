//! Scanning the record log
//!
//! [`SlotIter`] walks slot positions without touching the device,
//! [`RecordScan`] reads the record at each of them, and [`scan_log`] finds
//! the last valid count and the first free slot.

use crate::device::BootCountDevice;
use crate::error::{Error, Result};
use crate::geometry::PartitionGeometry;
use crate::record::{BootCounterRecord, RecordState, RECORD_LEN};
use log::trace;

/// Position of one record slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Slot number, counting from the start of the partition
    pub index: u32,
    /// Absolute offset of the slot
    pub offset: u32,
    /// Start of the erase block holding the slot
    pub block_start: u32,
    /// Slot number within its erase block
    pub index_in_block: u32,
}

/// Iterator over the slots of a partition, in log order
///
/// Finite, and restartable from offset 0 with [`SlotIter::restart`].
#[derive(Debug, Clone)]
pub struct SlotIter {
    geometry: PartitionGeometry,
    next: u32,
}

impl SlotIter {
    /// Iterate over all slots of `geometry`
    pub fn new(geometry: PartitionGeometry) -> Self {
        Self { geometry, next: 0 }
    }

    /// Go back to the first slot
    pub fn restart(&mut self) {
        self.next = 0;
    }
}

impl Iterator for SlotIter {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        if self.next >= self.geometry.total_records {
            return None;
        }
        let index = self.next;
        self.next += 1;
        Some(Slot {
            index,
            offset: self.geometry.slot_offset(index),
            block_start: self.geometry.block_start(index),
            index_in_block: index % self.geometry.records_per_block,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.geometry.total_records.saturating_sub(self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for SlotIter {}

/// Lazily reads the record at every slot of the partition
pub struct RecordScan<'a, D: ?Sized> {
    device: &'a mut D,
    slots: SlotIter,
}

impl<'a, D: BootCountDevice + ?Sized> RecordScan<'a, D> {
    /// Scan `device` laid out as `geometry`
    pub fn new(device: &'a mut D, geometry: &PartitionGeometry) -> Self {
        Self {
            device,
            slots: geometry.slots(),
        }
    }
}

impl<D: BootCountDevice + ?Sized> Iterator for RecordScan<'_, D> {
    type Item = Result<(Slot, BootCounterRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.slots.next()?;
        let mut raw = [0u8; RECORD_LEN];
        if let Err(source) = self.device.read_at(slot.offset, &mut raw) {
            // Stop after a failed read
            self.slots.next = self.slots.geometry.total_records;
            return Some(Err(Error::ReadFailed {
                offset: slot.offset,
                source,
            }));
        }
        BootCounterRecord::decode(&raw).map(|record| Ok((slot, record)))
    }
}

/// Result of scanning the record log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogState {
    /// Count of the last valid record, 0 if there is none
    pub last_count: u32,
    /// Number of valid records in the log
    pub valid_records: u32,
    /// First erased slot, `None` if every slot holds a record
    pub free_slot: Option<Slot>,
}

impl LogState {
    /// Whether every slot of the partition holds a record
    pub fn is_full(&self) -> bool {
        self.free_slot.is_none()
    }
}

/// Log layout together with the result of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStatus {
    /// Layout derived from the device
    pub geometry: PartitionGeometry,
    /// Scan result
    pub state: LogState,
}

/// Query the geometry and scan the log without modifying the device
pub fn read_boot_count<D: BootCountDevice + ?Sized>(device: &mut D) -> Result<LogStatus> {
    let geometry = PartitionGeometry::query(device)?;
    let state = scan_log(device, &geometry, &mut [])?;
    Ok(LogStatus { geometry, state })
}

/// Scan the record log from offset 0
///
/// The records of the erase block holding the free slot are copied into
/// `block` at their in-block positions, with everything else left at 0xFF.
/// Pass an empty slice to skip this.
///
/// Assumes erased flash reads back as 0xFF.
pub fn scan_log<D: BootCountDevice + ?Sized>(
    device: &mut D,
    geometry: &PartitionGeometry,
    block: &mut [u8],
) -> Result<LogState> {
    let keep_block = block.len() >= geometry.block_buffer_len();
    let stride = geometry.record_stride as usize;

    let mut state = LogState {
        last_count: 0,
        valid_records: 0,
        free_slot: None,
    };

    for entry in RecordScan::new(device, geometry) {
        let (slot, record) = entry?;

        if keep_block && slot.index_in_block == 0 {
            block.fill(0xFF);
        }

        match record.state() {
            RecordState::Corrupt => {
                return Err(Error::CorruptLog {
                    offset: slot.offset,
                    magic: record.magic,
                });
            }
            RecordState::Erased => {
                trace!("First free slot {} at 0x{:08X}", slot.index, slot.offset);
                state.free_slot = Some(slot);
                break;
            }
            RecordState::Valid => {
                trace!(
                    "Record {} at 0x{:08X}: count {}",
                    slot.index,
                    slot.offset,
                    record.count
                );
                if keep_block {
                    let start = slot.index_in_block as usize * stride;
                    record.encode(&mut block[start..start + RECORD_LEN]);
                }
                state.last_count = record.count;
                state.valid_records += 1;
            }
        }
    }

    Ok(state)
}
