//! Log block and record format
//!
//! ```text
//! block := record* trailer?
//! record :=
//!   checksum: u32    // masked crc32c of type and payload, little-endian
//!   length:   u16    // little-endian
//!   type:     u8     // One of FULL, FIRST, MIDDLE, LAST
//!   payload:  u8[length]
//! trailer := u8[< HEADER_SIZE]   // zero-filled
//! ```

/// Size of every physical block
pub const BLOCK_SIZE: usize = 32 * 1024;

/// checksum (4) + length (2) + type (1)
pub const HEADER_SIZE: usize = 4 + 2 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Reserved for preallocated (zeroed) file regions
    Zero = 0,
    Full = 1,
    // Fragments of a record spanning several physical records
    First = 2,
    Middle = 3,
    Last = 4,
}

pub const MAX_RECORD_TYPE: u8 = RecordType::Last as u8;

impl RecordType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(RecordType::Zero),
            1 => Some(RecordType::Full),
            2 => Some(RecordType::First),
            3 => Some(RecordType::Middle),
            4 => Some(RecordType::Last),
            _ => None,
        }
    }
}

const MASK_DELTA: u32 = 0xa282_ead8;

/// Mask a crc before storing it
///
/// Computing the crc of a string that itself embeds crcs is problematic,
/// so stored checksums are rotated and offset.
pub fn mask_crc(crc: u32) -> u32 {
    crc.rotate_right(15).wrapping_add(MASK_DELTA)
}

/// Inverse of [`mask_crc`]
pub fn unmask_crc(masked: u32) -> u32 {
    masked.wrapping_sub(MASK_DELTA).rotate_left(15)
}

/// Unmasked crc of a single type byte, the seed extended by the payload
pub(crate) fn type_crc(record_type: u8) -> u32 {
    crc32c::crc32c(&[record_type])
}

/// Unmasked crc of `type || payload`
pub(crate) fn record_crc(type_crc: u32, payload: &[u8]) -> u32 {
    crc32c::crc32c_append(type_crc, payload)
}
