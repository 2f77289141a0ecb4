//! Internal key format
//!
//! ```text
//! internal key:  [ user key ... ][ tag: u64 LE = (sequence << 8) | type ]
//! lookup key:    [ u32 LE internal key length ][ internal key ]
//! ```
//!
//! Internal keys sort by user key ascending, then by tag descending, so
//! the newest version of a user key comes first.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut};

use crate::comparator::{BytewiseComparator, Comparator};
use crate::error::{CinderError, Result};

pub type SequenceNumber = u64;

/// Largest sequence that still leaves room for the type byte in a tag
pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

/// Size of the packed (sequence, type) trailer
pub const TAG_SIZE: usize = 8;

/// Size of the length prefix on memtable keys
pub(crate) const LENGTH_PREFIX_SIZE: usize = 4;

/// Longest user key an entry can hold; its internal key length must fit
/// the u32 prefix
pub const MAX_KEY_LEN: usize = u32::MAX as usize - TAG_SIZE;

/// Longest value an entry can hold
pub const MAX_VALUE_LEN: usize = u32::MAX as usize;

/// Reject keys and values too long for the memtable encoding
pub fn check_entry_lengths(key_len: usize, value_len: usize) -> Result<()> {
    if key_len > MAX_KEY_LEN {
        return Err(CinderError::InvalidArgument(format!(
            "key of {} bytes exceeds {} byte limit",
            key_len, MAX_KEY_LEN
        )));
    }
    if value_len > MAX_VALUE_LEN {
        return Err(CinderError::InvalidArgument(format!(
            "value of {} bytes exceeds {} byte limit",
            value_len, MAX_VALUE_LEN
        )));
    }
    Ok(())
}

/// Encode a field length as its u32 prefix
pub(crate) fn length_prefix(len: usize) -> u32 {
    match u32::try_from(len) {
        Ok(prefix) => prefix,
        Err(_) => panic!("field length {} does not fit a u32 prefix", len),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ValueType {
    Deletion = 0,
    Value = 1,
}

/// Type used when building seek keys. Tags sort descending, so the highest
/// type code sorts first among entries with the same sequence.
pub(crate) const VALUE_TYPE_FOR_SEEK: ValueType = ValueType::Value;

impl TryFrom<u8> for ValueType {
    type Error = CinderError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ValueType::Deletion),
            1 => Ok(ValueType::Value),
            other => Err(CinderError::corruption(format!("unknown value type {}", other))),
        }
    }
}

/// Pack a sequence number and type into a tag
pub fn pack_sequence_and_type(sequence: SequenceNumber, value_type: ValueType) -> u64 {
    assert!(sequence <= MAX_SEQUENCE_NUMBER, "sequence {} out of range", sequence);
    (sequence << 8) | value_type as u64
}

/// Split a tag back into sequence and raw type byte
pub(crate) fn unpack_tag(tag: u64) -> (SequenceNumber, u8) {
    (tag >> 8, (tag & 0xff) as u8)
}

pub(crate) fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    assert!(internal_key.len() >= TAG_SIZE, "internal key shorter than its tag");
    &internal_key[..internal_key.len() - TAG_SIZE]
}

pub(crate) fn extract_tag(internal_key: &[u8]) -> u64 {
    assert!(internal_key.len() >= TAG_SIZE, "internal key shorter than its tag");
    let mut tag = &internal_key[internal_key.len() - TAG_SIZE..];
    tag.get_u64_le()
}

/// Borrowed view of a decoded internal key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

impl<'a> ParsedInternalKey<'a> {
    pub fn new(user_key: &'a [u8], sequence: SequenceNumber, value_type: ValueType) -> Self {
        Self {
            user_key,
            sequence,
            value_type,
        }
    }

    /// Decode an internal key
    pub fn parse(internal_key: &'a [u8]) -> Result<Self> {
        if internal_key.len() < TAG_SIZE {
            return Err(CinderError::corruption("internal key too short"));
        }
        let (sequence, type_byte) = unpack_tag(extract_tag(internal_key));
        Ok(Self {
            user_key: extract_user_key(internal_key),
            sequence,
            value_type: ValueType::try_from(type_byte)?,
        })
    }

    /// Append the encoded form to `dst`
    pub fn encode_to(&self, dst: &mut Vec<u8>) {
        dst.put_slice(self.user_key);
        dst.put_u64_le(pack_sequence_and_type(self.sequence, self.value_type));
    }
}

impl fmt::Display for ParsedInternalKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' @ {} : {:?}",
            String::from_utf8_lossy(self.user_key),
            self.sequence,
            self.value_type
        )
    }
}

/// Owned internal key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalKey {
    rep: Vec<u8>,
}

impl InternalKey {
    pub fn new(user_key: &[u8], sequence: SequenceNumber, value_type: ValueType) -> Self {
        let mut rep = Vec::with_capacity(user_key.len() + TAG_SIZE);
        ParsedInternalKey::new(user_key, sequence, value_type).encode_to(&mut rep);
        Self { rep }
    }

    pub fn encoded(&self) -> &[u8] {
        &self.rep
    }

    pub fn user_key(&self) -> &[u8] {
        extract_user_key(&self.rep)
    }

    pub fn parse(&self) -> Result<ParsedInternalKey<'_>> {
        ParsedInternalKey::parse(&self.rep)
    }
}

/// Probe key for a memtable point lookup
///
/// Encodes `(user_key, sequence, VALUE_TYPE_FOR_SEEK)` so that it sorts just
/// before the newest entry visible at `sequence`.
#[derive(Debug, Clone)]
pub struct LookupKey {
    data: Vec<u8>,
}

impl LookupKey {
    pub fn new(user_key: &[u8], sequence: SequenceNumber) -> Self {
        let internal_len = user_key.len() + TAG_SIZE;
        let mut data = Vec::with_capacity(LENGTH_PREFIX_SIZE + internal_len);
        data.put_u32_le(length_prefix(internal_len));
        ParsedInternalKey::new(user_key, sequence, VALUE_TYPE_FOR_SEEK).encode_to(&mut data);
        Self { data }
    }

    /// Length-prefixed form, laid out like a memtable entry's key
    pub fn memtable_key(&self) -> &[u8] {
        &self.data
    }

    pub fn internal_key(&self) -> &[u8] {
        &self.data[LENGTH_PREFIX_SIZE..]
    }

    pub fn user_key(&self) -> &[u8] {
        &self.data[LENGTH_PREFIX_SIZE..self.data.len() - TAG_SIZE]
    }
}

/// Orders internal keys: user key ascending, then sequence descending
#[derive(Clone)]
pub struct InternalKeyComparator {
    user: Arc<dyn Comparator>,
}

impl InternalKeyComparator {
    pub fn new(user: Arc<dyn Comparator>) -> Self {
        Self { user }
    }

    pub fn user_comparator(&self) -> &dyn Comparator {
        self.user.as_ref()
    }
}

impl Default for InternalKeyComparator {
    fn default() -> Self {
        Self::new(Arc::new(BytewiseComparator))
    }
}

impl fmt::Debug for InternalKeyComparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InternalKeyComparator")
            .field("user", &self.user.name())
            .finish()
    }
}

impl Comparator for InternalKeyComparator {
    fn name(&self) -> &'static str {
        "cinderkv.InternalKeyComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.user
            .compare(extract_user_key(a), extract_user_key(b))
            .then_with(|| extract_tag(b).cmp(&extract_tag(a)))
    }
}
