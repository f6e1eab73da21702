//! On-flash boot counter record
//!
//! A record occupies the first [`RECORD_LEN`] bytes of its slot:
//!
//! ```text
//! offset 0: magic    (u32, native endian)
//! offset 4: count    (u32, native endian)
//! offset 8: checksum (u32, native endian)
//! ```
//!
//! The remaining bytes of the slot are left at 0xFF.

/// Magic value identifying a written record
pub const BOOTCOUNT_MAGIC: u32 = 0x2011_0811;

/// Magic value of a slot that has not been written since the last erase
pub const ERASED_MAGIC: u32 = 0xFFFF_FFFF;

/// Size of an encoded record in bytes
pub const RECORD_LEN: usize = 12;

const MAGIC_OFFSET: usize = 0;
const COUNT_OFFSET: usize = 4;
const CHECKSUM_OFFSET: usize = 8;

/// Boot counter record as stored in a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootCounterRecord {
    /// Record magic
    pub magic: u32,
    /// Boot attempt count
    pub count: u32,
    /// Always written equal to [`BOOTCOUNT_MAGIC`]
    pub checksum: u32,
}

/// Classification of a slot by its magic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// A written record
    Valid,
    /// Erased flash; the first free slot of the log
    Erased,
    /// Anything else
    Corrupt,
}

impl BootCounterRecord {
    /// A valid record holding `count`
    pub const fn new(count: u32) -> Self {
        Self {
            magic: BOOTCOUNT_MAGIC,
            count,
            checksum: BOOTCOUNT_MAGIC,
        }
    }

    /// Decode a record from the start of `buf`
    ///
    /// Returns `None` if `buf` is shorter than [`RECORD_LEN`].
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < RECORD_LEN {
            return None;
        }
        Some(Self {
            magic: read_u32(buf, MAGIC_OFFSET),
            count: read_u32(buf, COUNT_OFFSET),
            checksum: read_u32(buf, CHECKSUM_OFFSET),
        })
    }

    /// Encode the record into the start of `buf`, leaving the rest untouched
    ///
    /// Returns `false` if `buf` is shorter than [`RECORD_LEN`].
    pub fn encode(&self, buf: &mut [u8]) -> bool {
        if buf.len() < RECORD_LEN {
            return false;
        }
        buf[MAGIC_OFFSET..MAGIC_OFFSET + 4].copy_from_slice(&self.magic.to_ne_bytes());
        buf[COUNT_OFFSET..COUNT_OFFSET + 4].copy_from_slice(&self.count.to_ne_bytes());
        buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&self.checksum.to_ne_bytes());
        true
    }

    /// Fill `slot` with 0xFF and encode the record at its start
    pub fn encode_slot(&self, slot: &mut [u8]) -> bool {
        slot.fill(0xFF);
        self.encode(slot)
    }

    /// Classify the record by its magic
    ///
    /// Only the magic is inspected; the checksum carries no information
    /// beyond marking the record as written.
    pub fn state(&self) -> RecordState {
        match self.magic {
            BOOTCOUNT_MAGIC => RecordState::Valid,
            ERASED_MAGIC => RecordState::Erased,
            _ => RecordState::Corrupt,
        }
    }
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_ne_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_offsets() {
        let mut buf = [0xFFu8; 16];
        assert!(BootCounterRecord::new(5).encode(&mut buf));

        assert_eq!(&buf[0..4], &BOOTCOUNT_MAGIC.to_ne_bytes());
        assert_eq!(&buf[4..8], &5u32.to_ne_bytes());
        assert_eq!(&buf[8..12], &BOOTCOUNT_MAGIC.to_ne_bytes());
        // Bytes past the record are not touched
        assert_eq!(&buf[12..], &[0xFF; 4]);
    }

    #[test]
    fn test_decode_erased() {
        let record = BootCounterRecord::decode(&[0xFF; RECORD_LEN]).unwrap();
        assert_eq!(record.magic, ERASED_MAGIC);
        assert_eq!(record.state(), RecordState::Erased);
    }

    #[test]
    fn test_state() {
        assert_eq!(BootCounterRecord::new(0).state(), RecordState::Valid);

        let mut record = BootCounterRecord::new(3);
        record.magic = 0xDEAD_BEEF;
        assert_eq!(record.state(), RecordState::Corrupt);

        // A checksum mismatch does not make a record invalid
        let mut record = BootCounterRecord::new(3);
        record.checksum = 0;
        assert_eq!(record.state(), RecordState::Valid);
    }

    #[test]
    fn test_short_buffers() {
        assert!(BootCounterRecord::decode(&[0u8; RECORD_LEN - 1]).is_none());
        assert!(!BootCounterRecord::new(1).encode(&mut [0u8; RECORD_LEN - 1]));
    }

    #[test]
    fn test_encode_slot_pads_with_ones() {
        let mut slot = [0u8; 32];
        assert!(BootCounterRecord::new(0).encode_slot(&mut slot));

        assert!(slot[RECORD_LEN..].iter().all(|&b| b == 0xFF));
        let record = BootCounterRecord::decode(&slot).unwrap();
        assert_eq!(record, BootCounterRecord::new(0));
        assert_eq!(record.checksum, BOOTCOUNT_MAGIC);
    }
}
