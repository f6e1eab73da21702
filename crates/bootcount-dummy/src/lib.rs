//! bootcount-dummy - In-memory MTD partition emulator for testing
//!
//! This crate provides a simulated flash partition with NOR semantics:
//! erase sets bytes to 0xFF and writes can only clear bits. Every primitive
//! is counted and can be made to fail, which lets the boot counter logic be
//! tested without hardware.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
use alloc::vec;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

use bootcount_core::device::{BootCountDevice, DeviceError, RawGeometry};
use bootcount_core::record::{BootCounterRecord, RECORD_LEN};
use log::trace;

/// EINVAL, reported for misaligned erase requests
const EINVAL: i32 = 22;
/// EIO, reported for injected faults
const EIO: i32 = 5;

/// Configuration for the dummy partition
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Partition size in bytes
    pub total_size: u32,
    /// Erase block size reported to callers
    pub erase_size: u32,
    /// Write size reported to callers
    pub write_size: u32,
}

impl Default for DummyConfig {
    fn default() -> Self {
        // Typical NOR boot-counter partition
        Self {
            total_size: 0x40000,
            erase_size: 0x10000,
            write_size: 1,
        }
    }
}

/// Number of calls made to each device primitive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpCounts {
    /// Geometry queries
    pub geometry: usize,
    /// Reads
    pub reads: usize,
    /// Writes
    pub writes: usize,
    /// Erases
    pub erases: usize,
    /// Syncs
    pub syncs: usize,
}

/// Primitive to make fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Geometry query fails
    Geometry,
    /// Reads fail
    Read,
    /// Erases fail
    Erase,
    /// Writes fail
    Write,
    /// Writes only accept half of the data
    ShortWrite,
    /// Sync fails
    Sync,
}

/// Dummy MTD partition
///
/// Emulates a flash partition in memory for testing purposes.
#[cfg(feature = "alloc")]
pub struct DummyMtd {
    config: DummyConfig,
    data: Vec<u8>,
    counts: OpCounts,
    faults: Vec<Fault>,
    erase_log: Vec<(u32, u32)>,
    write_log: Vec<(u32, usize)>,
}

#[cfg(feature = "alloc")]
impl DummyMtd {
    /// Create a new, fully erased partition
    pub fn new(config: DummyConfig) -> Self {
        let data = vec![0xFF; config.total_size as usize];
        Self {
            config,
            data,
            counts: OpCounts::default(),
            faults: Vec::new(),
            erase_log: Vec::new(),
            write_log: Vec::new(),
        }
    }

    /// Create a new partition with the default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Create a new partition with the given geometry
    pub fn with_geometry(total_size: u32, erase_size: u32, write_size: u32) -> Self {
        Self::new(DummyConfig {
            total_size,
            erase_size,
            write_size,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Get a reference to the partition contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the partition contents
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Place a record at `offset`, bypassing flash semantics and counters
    pub fn put_record(&mut self, offset: u32, record: BootCounterRecord) {
        let start = offset as usize;
        record.encode(&mut self.data[start..start + RECORD_LEN]);
    }

    /// Place a raw magic value at `offset`, bypassing flash semantics
    pub fn put_magic(&mut self, offset: u32, magic: u32) {
        let start = offset as usize;
        self.data[start..start + 4].copy_from_slice(&magic.to_ne_bytes());
    }

    /// Decode the record stored at `offset`
    pub fn record_at(&self, offset: u32) -> BootCounterRecord {
        let start = offset as usize;
        BootCounterRecord::decode(&self.data[start..start + RECORD_LEN])
            .unwrap_or(BootCounterRecord::new(0))
    }

    /// Calls made so far
    pub fn counts(&self) -> OpCounts {
        self.counts
    }

    /// Forget all recorded calls
    pub fn clear_counts(&mut self) {
        self.counts = OpCounts::default();
        self.erase_log.clear();
        self.write_log.clear();
    }

    /// `(start, len)` of every successful erase, in order
    pub fn erase_log(&self) -> &[(u32, u32)] {
        &self.erase_log
    }

    /// `(offset, len)` of every successful write, in order
    pub fn write_log(&self) -> &[(u32, usize)] {
        &self.write_log
    }

    /// Make `fault` fail from now on
    pub fn inject(&mut self, fault: Fault) {
        if !self.faults.contains(&fault) {
            self.faults.push(fault);
        }
    }

    /// Remove all injected faults
    pub fn clear_faults(&mut self) {
        self.faults.clear();
    }

    fn faulty(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    fn range(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, DeviceError> {
        let start = offset as usize;
        let end = start.checked_add(len).ok_or(DeviceError::OutOfBounds)?;
        if end > self.data.len() {
            return Err(DeviceError::OutOfBounds);
        }
        Ok(start..end)
    }
}

#[cfg(feature = "alloc")]
impl BootCountDevice for DummyMtd {
    fn geometry(&mut self) -> Result<RawGeometry, DeviceError> {
        self.counts.geometry += 1;
        if self.faulty(Fault::Geometry) {
            return Err(DeviceError::Os(EIO));
        }
        Ok(RawGeometry {
            total_size: self.config.total_size,
            erase_size: self.config.erase_size,
            write_size: self.config.write_size,
        })
    }

    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.counts.reads += 1;
        if self.faulty(Fault::Read) {
            return Err(DeviceError::Os(EIO));
        }
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_at(&mut self, offset: u32, data: &[u8]) -> Result<usize, DeviceError> {
        self.counts.writes += 1;
        if self.faulty(Fault::Write) {
            return Err(DeviceError::Os(EIO));
        }
        let range = self.range(offset, data.len())?;

        let accepted = if self.faulty(Fault::ShortWrite) {
            data.len() / 2
        } else {
            data.len()
        };

        // Flash programming: can only change 1 -> 0
        for (dst, &src) in self.data[range].iter_mut().zip(&data[..accepted]) {
            *dst &= src;
        }

        trace!("dummy: wrote {} bytes at 0x{:08X}", accepted, offset);
        self.write_log.push((offset, accepted));
        Ok(accepted)
    }

    fn erase(&mut self, start: u32, len: u32) -> Result<(), DeviceError> {
        self.counts.erases += 1;
        if self.faulty(Fault::Erase) {
            return Err(DeviceError::Os(EIO));
        }

        let erase_size = self.config.erase_size;
        if erase_size != 0 && (start % erase_size != 0 || len % erase_size != 0) {
            return Err(DeviceError::Os(EINVAL));
        }

        let range = self.range(start, len as usize)?;
        // Erase sets all bytes to 0xFF
        self.data[range].fill(0xFF);

        trace!("dummy: erased {} bytes at 0x{:08X}", len, start);
        self.erase_log.push((start, len));
        Ok(())
    }

    fn sync(&mut self) -> Result<(), DeviceError> {
        self.counts.syncs += 1;
        if self.faulty(Fault::Sync) {
            return Err(DeviceError::Os(EIO));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bootcount_core::{
        read_boot_count, reset_boot_count, Error, RecordState, ResetOutcome, BOOTCOUNT_MAGIC,
    };

    /// Fill slots `0..counts.len()` with records holding `counts`
    fn fill_log(flash: &mut DummyMtd, stride: u32, counts: &[u32]) {
        for (i, &count) in counts.iter().enumerate() {
            flash.put_record(i as u32 * stride, BootCounterRecord::new(count));
        }
    }

    #[test]
    fn test_erase_and_program_semantics() {
        let mut flash = DummyMtd::with_geometry(0x2000, 0x1000, 1);

        assert_eq!(flash.write_at(0, &[0x0F]).unwrap(), 1);
        assert_eq!(flash.write_at(0, &[0xF3]).unwrap(), 1);
        // Writes can only clear bits
        assert_eq!(flash.data()[0], 0x03);

        // Misaligned erase is rejected
        assert_eq!(flash.erase(0x10, 0x1000), Err(DeviceError::Os(EINVAL)));

        flash.erase(0, 0x1000).unwrap();
        assert_eq!(flash.data()[0], 0xFF);
        assert_eq!(flash.erase(0x1000, 0x2000), Err(DeviceError::OutOfBounds));
    }

    #[test]
    fn test_reset_twice_is_idempotent() {
        let mut flash = DummyMtd::new_default();
        fill_log(&mut flash, 16, &[1, 2, 3]);

        let outcome = reset_boot_count(&mut flash).unwrap();
        assert!(matches!(outcome, ResetOutcome::Reset { previous_count: 3, .. }));
        assert_eq!(read_boot_count(&mut flash).unwrap().state.last_count, 0);

        flash.clear_counts();
        assert_eq!(reset_boot_count(&mut flash).unwrap(), ResetOutcome::AlreadyZero);
        assert_eq!(read_boot_count(&mut flash).unwrap().state.last_count, 0);

        let counts = flash.counts();
        assert_eq!(counts.erases, 0);
        assert_eq!(counts.writes, 0);
        assert_eq!(counts.syncs, 0);
    }

    #[test]
    fn test_reset_after_count() {
        let mut flash = DummyMtd::new_default();
        fill_log(&mut flash, 16, &[1, 2, 3, 4, 5, 6, 7]);

        let outcome = reset_boot_count(&mut flash).unwrap();
        assert_eq!(
            outcome,
            ResetOutcome::Reset {
                previous_count: 7,
                offset: 7 * 16,
                log_full: false,
            }
        );

        let status = read_boot_count(&mut flash).unwrap();
        assert_eq!(status.state.last_count, 0);
        assert_eq!(status.state.valid_records, 8);
        assert_eq!(status.state.free_slot.map(|s| s.offset), Some(8 * 16));

        let record = flash.record_at(7 * 16);
        assert_eq!(record.state(), RecordState::Valid);
        assert_eq!(record.count, 0);
        assert_eq!(record.checksum, BOOTCOUNT_MAGIC);
        assert_eq!(flash.counts().syncs, 1);
    }

    #[test]
    fn test_block_erase_preserves_earlier_records() {
        // Four 16 byte slots per 64 byte erase block
        let mut flash = DummyMtd::with_geometry(256, 64, 16);
        fill_log(&mut flash, 16, &[1, 2, 3, 4, 5, 6]);

        reset_boot_count(&mut flash).unwrap();

        // The block holding slots 4..8 is erased and rewritten from its start
        assert_eq!(flash.erase_log(), &[(64, 64)]);
        assert_eq!(flash.write_log(), &[(64, 48)]);

        assert_eq!(flash.record_at(64).count, 5);
        assert_eq!(flash.record_at(80).count, 6);
        assert_eq!(flash.record_at(96), BootCounterRecord::new(0));
        // Padding after each record is left erased
        assert!(flash.data()[64 + RECORD_LEN..80].iter().all(|&b| b == 0xFF));
        assert!(flash.data()[112..128].iter().all(|&b| b == 0xFF));
        // Earlier blocks are untouched
        assert_eq!(flash.record_at(48).count, 4);

        let status = read_boot_count(&mut flash).unwrap();
        assert_eq!(status.state.valid_records, 7);
        assert_eq!(status.state.last_count, 0);
    }

    #[test]
    fn test_free_slot_at_block_start() {
        let mut flash = DummyMtd::with_geometry(256, 64, 16);
        fill_log(&mut flash, 16, &[1, 2, 3, 4]);

        reset_boot_count(&mut flash).unwrap();

        assert_eq!(flash.erase_log(), &[(64, 64)]);
        assert_eq!(flash.write_log(), &[(64, 16)]);
        assert_eq!(flash.record_at(64), BootCounterRecord::new(0));
        assert_eq!(flash.record_at(48).count, 4);
    }

    #[test]
    fn test_corrupt_magic_aborts_without_io() {
        let mut flash = DummyMtd::new_default();
        fill_log(&mut flash, 16, &[1, 2]);
        flash.put_magic(32, 0xDEAD_BEEF);
        let before = flash.data().to_vec();

        let err = reset_boot_count(&mut flash).unwrap_err();
        assert_eq!(
            err,
            Error::CorruptLog {
                offset: 32,
                magic: 0xDEAD_BEEF
            }
        );
        assert_eq!(err.exit_code(), 3);
        assert!(!err.flash_modified());

        let counts = flash.counts();
        assert_eq!(counts.erases, 0);
        assert_eq!(counts.writes, 0);
        assert_eq!(flash.data(), &before[..]);
    }

    #[test]
    fn test_full_log_erases_partition() {
        let mut flash = DummyMtd::with_geometry(0x4000, 0x1000, 0x1000);
        let counts: Vec<u32> = (1..=4).collect();
        fill_log(&mut flash, 0x1000, &counts);

        let outcome = reset_boot_count(&mut flash).unwrap();
        assert_eq!(
            outcome,
            ResetOutcome::Reset {
                previous_count: 4,
                offset: 0,
                log_full: true,
            }
        );

        assert_eq!(flash.erase_log(), &[(0, 0x4000)]);
        assert_eq!(flash.write_log(), &[(0, 0x1000)]);
        assert_eq!(flash.record_at(0), BootCounterRecord::new(0));
        assert_eq!(flash.record_at(0x1000).magic, 0xFFFF_FFFF);

        let status = read_boot_count(&mut flash).unwrap();
        assert_eq!(status.state.last_count, 0);
        assert_eq!(status.state.valid_records, 1);
    }

    #[test]
    fn test_full_log_with_zero_count_is_noop() {
        let mut flash = DummyMtd::with_geometry(64, 32, 16);
        fill_log(&mut flash, 16, &[3, 2, 1, 0]);

        assert_eq!(reset_boot_count(&mut flash).unwrap(), ResetOutcome::AlreadyZero);
        assert_eq!(flash.counts().erases, 0);
    }

    #[test]
    fn test_stride_floor_for_byte_write_size() {
        let mut flash = DummyMtd::with_geometry(0x10000, 0x1000, 1);
        fill_log(&mut flash, 16, &[9]);

        let status = read_boot_count(&mut flash).unwrap();
        assert_eq!(status.geometry.record_stride, 16);

        reset_boot_count(&mut flash).unwrap();
        assert_eq!(flash.record_at(16), BootCounterRecord::new(0));
        assert_eq!(flash.write_log(), &[(0, 32)]);
    }

    #[test]
    fn test_stride_follows_64_byte_write_size() {
        let mut flash = DummyMtd::with_geometry(0x10000, 0x1000, 64);
        fill_log(&mut flash, 64, &[9, 10]);

        let status = read_boot_count(&mut flash).unwrap();
        assert_eq!(status.geometry.record_stride, 64);
        assert_eq!(status.state.free_slot.map(|s| s.offset), Some(128));

        reset_boot_count(&mut flash).unwrap();
        assert_eq!(flash.record_at(128), BootCounterRecord::new(0));
        assert_eq!(flash.write_log(), &[(0, 192)]);
    }

    #[test]
    fn test_erased_partition_is_noop() {
        let mut flash = DummyMtd::with_geometry(65536, 4096, 4096);

        let status = read_boot_count(&mut flash).unwrap();
        assert_eq!(status.geometry.records_per_block, 1);
        assert_eq!(status.state.last_count, 0);

        flash.clear_counts();
        assert_eq!(reset_boot_count(&mut flash).unwrap(), ResetOutcome::AlreadyZero);

        let counts = flash.counts();
        assert_eq!(counts.geometry, 1);
        assert_eq!(counts.reads, 1);
        assert_eq!(counts.erases, 0);
        assert_eq!(counts.writes, 0);
        assert_eq!(counts.syncs, 0);
    }

    #[test]
    fn test_second_slot_free() {
        let mut flash = DummyMtd::with_geometry(65536, 4096, 4096);
        flash.put_record(0, BootCounterRecord::new(5));

        reset_boot_count(&mut flash).unwrap();

        assert_eq!(flash.erase_log(), &[(4096, 4096)]);
        assert_eq!(flash.write_log(), &[(4096, 4096)]);
        assert_eq!(flash.record_at(4096), BootCounterRecord::new(0));
        assert_eq!(flash.record_at(0).count, 5);

        let status = read_boot_count(&mut flash).unwrap();
        assert_eq!(status.state.last_count, 0);
        assert_eq!(status.state.free_slot.map(|s| s.offset), Some(8192));
    }

    #[test]
    fn test_geometry_failure() {
        let mut flash = DummyMtd::new_default();
        flash.inject(Fault::Geometry);

        let err = reset_boot_count(&mut flash).unwrap_err();
        assert!(matches!(err, Error::GeometryQuery(DeviceError::Os(EIO))));
        assert_eq!(flash.counts().reads, 0);
    }

    #[test]
    fn test_read_failure() {
        let mut flash = DummyMtd::new_default();
        flash.inject(Fault::Read);

        let err = reset_boot_count(&mut flash).unwrap_err();
        assert!(matches!(err, Error::ReadFailed { offset: 0, .. }));
        assert_eq!(flash.counts().erases, 0);
    }

    #[test]
    fn test_erase_failure_skips_write() {
        let mut flash = DummyMtd::new_default();
        fill_log(&mut flash, 16, &[2]);
        flash.inject(Fault::Erase);

        let err = reset_boot_count(&mut flash).unwrap_err();
        assert!(matches!(
            err,
            Error::EraseFailed {
                start: 0,
                len: 0x10000,
                full: false,
                ..
            }
        ));
        assert_eq!(err.exit_code(), 5);
        assert!(err.flash_modified());
        assert_eq!(flash.counts().writes, 0);
    }

    #[test]
    fn test_full_erase_failure() {
        let mut flash = DummyMtd::with_geometry(64, 32, 16);
        fill_log(&mut flash, 16, &[1, 2, 3, 4]);
        flash.inject(Fault::Erase);

        let err = reset_boot_count(&mut flash).unwrap_err();
        assert!(matches!(err, Error::EraseFailed { full: true, .. }));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_write_failure() {
        let mut flash = DummyMtd::new_default();
        fill_log(&mut flash, 16, &[2]);
        flash.inject(Fault::Write);

        let err = reset_boot_count(&mut flash).unwrap_err();
        assert!(matches!(err, Error::WriteFailed { offset: 0, len: 32, .. }));
        assert_eq!(flash.counts().syncs, 0);
    }

    #[test]
    fn test_short_write() {
        let mut flash = DummyMtd::new_default();
        fill_log(&mut flash, 16, &[2]);
        flash.inject(Fault::ShortWrite);

        let err = reset_boot_count(&mut flash).unwrap_err();
        assert_eq!(
            err,
            Error::ShortWrite {
                offset: 0,
                expected: 32,
                written: 16
            }
        );
        assert_eq!(err.exit_code(), 6);
        assert_eq!(flash.counts().syncs, 0);
    }

    #[test]
    fn test_sync_failure() {
        let mut flash = DummyMtd::new_default();
        fill_log(&mut flash, 16, &[2]);
        flash.inject(Fault::Sync);

        let err = reset_boot_count(&mut flash).unwrap_err();
        assert!(matches!(err, Error::SyncFailed(_)));
        // The record itself made it to the device
        assert_eq!(flash.record_at(16), BootCounterRecord::new(0));

        flash.clear_faults();
        assert_eq!(reset_boot_count(&mut flash).unwrap(), ResetOutcome::AlreadyZero);
    }
}
