//! RPM header blobs: parsing, tag lookup and test builders.
//!
//! A header blob, as stored in a package list, has the layout:
//!
//! ```text
//! offset  size      field
//! 0       4         il    number of index entries (big-endian)
//! 4       4         dl    size of the data store (big-endian)
//! 8       16 * il   index entries: tag, type, offset, count (each big-endian u32)
//! 8+16il  dl        data store
//! ```
//!
//! [`Header::from_blob`] validates every index entry against the data store up
//! front, so lookups through [`Header::get`] never fail.

pub mod builder;
pub mod tags;

use std::fmt;

use thiserror::Error;

use crate::pipeline::Decoder;

pub use builder::HeaderBuilder;

/// Size of the `il`/`dl` preamble.
pub const PREAMBLE_LEN: usize = 8;

/// Size of one index entry.
pub const INDEX_ENTRY_LEN: usize = 16;

/// Upper bound on the number of index entries.
pub const MAX_INDEX_ENTRIES: u32 = 0xffff;

/// Upper bound on the data store size.
pub const MAX_DATA_LENGTH: u32 = 256 * 1024 * 1024;

/// Errors found while validating a header blob.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header blob too short: {0} bytes")]
    TooShort(usize),

    #[error("bad index entry count {0}")]
    IndexCount(u32),

    #[error("bad data length {0}")]
    DataLength(u32),

    #[error("header blob is {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("tag {tag}: unknown type {code}")]
    UnknownType { tag: u32, code: u32 },

    #[error("tag {tag}: zero count")]
    ZeroCount { tag: u32 },

    #[error("tag {tag}: {count} values for a single string")]
    StringCount { tag: u32, count: u32 },

    #[error("tag {tag}: data outside the data store")]
    OutOfBounds { tag: u32 },

    #[error("tag {tag}: unterminated string")]
    UnterminatedString { tag: u32 },
}

/// Value type of a header entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagType {
    Null,
    Char,
    Int8,
    Int16,
    Int32,
    Int64,
    String,
    Bin,
    StringArray,
    I18nString,
}

impl TagType {
    /// Decode a type code from an index entry.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Null,
            1 => Self::Char,
            2 => Self::Int8,
            3 => Self::Int16,
            4 => Self::Int32,
            5 => Self::Int64,
            6 => Self::String,
            7 => Self::Bin,
            8 => Self::StringArray,
            9 => Self::I18nString,
            _ => return None,
        })
    }

    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Null => 0,
            Self::Char => 1,
            Self::Int8 => 2,
            Self::Int16 => 3,
            Self::Int32 => 4,
            Self::Int64 => 5,
            Self::String => 6,
            Self::Bin => 7,
            Self::StringArray => 8,
            Self::I18nString => 9,
        }
    }

    /// Width of one element for fixed-size types.
    #[must_use]
    pub fn element_width(self) -> Option<usize> {
        match self {
            Self::Char | Self::Int8 | Self::Bin => Some(1),
            Self::Int16 => Some(2),
            Self::Int32 => Some(4),
            Self::Int64 => Some(8),
            Self::Null | Self::String | Self::StringArray | Self::I18nString => None,
        }
    }

    /// Whether values of this type are numbers.
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Char | Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }
}

/// The value of one tag, borrowed from the header's data store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagValue<'a> {
    Integers(Vec<u64>),
    /// Strings without their NUL terminators.
    Strings(Vec<&'a [u8]>),
    Binary(&'a [u8]),
}

impl TagValue<'_> {
    /// Number of elements. A binary value counts as one element.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            TagValue::Integers(values) => values.len(),
            TagValue::Strings(values) => values.len(),
            TagValue::Binary(_) => 1,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A validated index entry.
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    tag: u32,
    kind: TagType,
    count: u32,
    /// Byte range of the value within the data store.
    start: usize,
    end: usize,
}

/// A parsed RPM header that owns its blob.
pub struct Header {
    blob: Vec<u8>,
    data_start: usize,
    /// Sorted by tag; the first entry wins for duplicate tags.
    entries: Vec<IndexEntry>,
}

impl fmt::Debug for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Header")
            .field("blob_len", &self.blob.len())
            .field("tags", &self.entries.iter().map(|e| e.tag).collect::<Vec<_>>())
            .finish()
    }
}

fn read_u32(buf: &[u8], pos: usize) -> u32 {
    u32::from_be_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

/// Length of an entry's value when it is a run of `count` NUL-terminated strings.
fn string_run_len(data: &[u8], start: usize, count: u32, tag: u32) -> Result<usize, HeaderError> {
    let mut pos = start;
    for _ in 0..count {
        let rest = data.get(pos..).ok_or(HeaderError::OutOfBounds { tag })?;
        let nul =
            rest.iter().position(|&b| b == 0).ok_or(HeaderError::UnterminatedString { tag })?;
        pos += nul + 1;
    }
    Ok(pos - start)
}

impl Header {
    /// Parse and validate a header blob.
    ///
    /// # Errors
    ///
    /// Returns a [`HeaderError`] describing the first structural problem found.
    pub fn from_blob(blob: Vec<u8>) -> Result<Self, HeaderError> {
        if blob.len() < PREAMBLE_LEN {
            return Err(HeaderError::TooShort(blob.len()));
        }
        let il = read_u32(&blob, 0);
        let dl = read_u32(&blob, 4);
        if il == 0 || il > MAX_INDEX_ENTRIES {
            return Err(HeaderError::IndexCount(il));
        }
        if dl > MAX_DATA_LENGTH {
            return Err(HeaderError::DataLength(dl));
        }

        let data_start = PREAMBLE_LEN + INDEX_ENTRY_LEN * il as usize;
        let expected = data_start + dl as usize;
        if blob.len() != expected {
            return Err(HeaderError::LengthMismatch { expected, actual: blob.len() });
        }

        let data = &blob[data_start..];
        let mut entries = Vec::with_capacity(il as usize);
        for i in 0..il as usize {
            let pos = PREAMBLE_LEN + i * INDEX_ENTRY_LEN;
            let tag = read_u32(&blob, pos);
            let code = read_u32(&blob, pos + 4);
            let start = read_u32(&blob, pos + 8) as usize;
            let count = read_u32(&blob, pos + 12);

            let kind = TagType::from_code(code).ok_or(HeaderError::UnknownType { tag, code })?;
            if count == 0 {
                return Err(HeaderError::ZeroCount { tag });
            }
            if start > data.len() {
                return Err(HeaderError::OutOfBounds { tag });
            }

            let len = match kind {
                TagType::Null => 0,
                TagType::String => {
                    if count != 1 {
                        return Err(HeaderError::StringCount { tag, count });
                    }
                    string_run_len(data, start, count, tag)?
                }
                TagType::StringArray | TagType::I18nString => {
                    string_run_len(data, start, count, tag)?
                }
                _ => {
                    let width = kind.element_width().unwrap_or(1);
                    (count as usize).checked_mul(width).ok_or(HeaderError::OutOfBounds { tag })?
                }
            };
            let end = start.checked_add(len).ok_or(HeaderError::OutOfBounds { tag })?;
            if end > data.len() {
                return Err(HeaderError::OutOfBounds { tag });
            }

            entries.push(IndexEntry { tag, kind, count, start, end });
        }
        entries.sort_by_key(|e| e.tag);

        Ok(Self { blob, data_start, entries })
    }

    fn entry(&self, tag: u32) -> Option<&IndexEntry> {
        let pos = self.entries.partition_point(|e| e.tag < tag);
        self.entries.get(pos).filter(|e| e.tag == tag)
    }

    fn data(&self) -> &[u8] {
        &self.blob[self.data_start..]
    }

    /// Whether the header carries `tag`.
    #[must_use]
    pub fn contains(&self, tag: u32) -> bool {
        self.entry(tag).is_some()
    }

    /// The type of `tag`, if present.
    #[must_use]
    pub fn tag_type(&self, tag: u32) -> Option<TagType> {
        self.entry(tag).map(|e| e.kind)
    }

    /// Look up the value of `tag`.
    ///
    /// An internationalized string yields only its first (untranslated) element.
    #[must_use]
    pub fn get(&self, tag: u32) -> Option<TagValue<'_>> {
        let entry = self.entry(tag)?;
        let bytes = &self.data()[entry.start..entry.end];
        let value = match entry.kind {
            TagType::Null => TagValue::Integers(Vec::new()),
            TagType::Char | TagType::Int8 | TagType::Int16 | TagType::Int32 | TagType::Int64 => {
                let width = entry.kind.element_width().unwrap_or(1);
                let values = bytes
                    .chunks_exact(width)
                    .map(|chunk| chunk.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
                    .collect();
                TagValue::Integers(values)
            }
            TagType::Bin => TagValue::Binary(bytes),
            TagType::String | TagType::StringArray => {
                TagValue::Strings(split_strings(bytes, entry.count as usize))
            }
            TagType::I18nString => TagValue::Strings(split_strings(bytes, 1)),
        };
        Some(value)
    }

    /// Tags present in the header, in ascending order.
    pub fn tags(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|e| e.tag)
    }

    /// Number of index entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The raw blob this header was parsed from.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }
}

fn split_strings(bytes: &[u8], count: usize) -> Vec<&[u8]> {
    bytes.split(|&b| b == 0).take(count).collect()
}

/// Decodes pipeline blobs into [`Header`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct RpmDecoder;

impl Decoder for RpmDecoder {
    type Record = Header;
    type Error = HeaderError;

    fn decode(&self, blob: Vec<u8>) -> Result<Header, HeaderError> {
        Header::from_blob(blob)
    }
}
