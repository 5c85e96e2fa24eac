use super::{INDEX_ENTRY_LEN, PREAMBLE_LEN, TagType};
use crate::pkglist::HEADER_MAGIC;

// ============================================================================
// Header Blob Builder
// ============================================================================

/// Builds RPM header blobs entry by entry.
///
/// Values are laid out the way rpm lays them out: each value aligned to its
/// element width within the data store, zero padding in between. Index entries
/// keep insertion order.
///
/// # Usage
///
/// ```
/// use pkgq_lib::rpmheader::{Header, HeaderBuilder, tags};
///
/// let blob = HeaderBuilder::new()
///     .string(tags::NAME, "bash")
///     .int32(tags::SIZE, &[1024])
///     .build();
/// let header = Header::from_blob(blob).unwrap();
/// assert!(header.contains(tags::NAME));
/// ```
#[derive(Debug, Clone, Default)]
pub struct HeaderBuilder {
    index: Vec<u8>,
    data: Vec<u8>,
    entries: u32,
}

impl HeaderBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, tag: u32, kind: TagType, count: usize, value: &[u8]) -> Self {
        let align = kind.element_width().unwrap_or(1);
        while self.data.len() % align != 0 {
            self.data.push(0);
        }

        let offset = u32::try_from(self.data.len()).expect("data store exceeds u32");
        let count = u32::try_from(count).expect("count exceeds u32");
        for field in [tag, kind.code(), offset, count] {
            self.index.extend_from_slice(&field.to_be_bytes());
        }
        self.data.extend_from_slice(value);
        self.entries += 1;
        self
    }

    fn push_strings(self, tag: u32, kind: TagType, values: &[&str]) -> Self {
        let mut value = Vec::new();
        for s in values {
            value.extend_from_slice(s.as_bytes());
            value.push(0);
        }
        self.push(tag, kind, values.len(), &value)
    }

    /// Add a single `STRING` value.
    #[must_use]
    pub fn string(self, tag: u32, value: &str) -> Self {
        self.push_strings(tag, TagType::String, &[value])
    }

    /// Add a `STRING_ARRAY` value.
    #[must_use]
    pub fn string_array(self, tag: u32, values: &[&str]) -> Self {
        self.push_strings(tag, TagType::StringArray, values)
    }

    /// Add an `I18NSTRING` value, untranslated text first.
    #[must_use]
    pub fn i18n_string(self, tag: u32, values: &[&str]) -> Self {
        self.push_strings(tag, TagType::I18nString, values)
    }

    #[must_use]
    pub fn int8(self, tag: u32, values: &[u8]) -> Self {
        self.push(tag, TagType::Int8, values.len(), values)
    }

    #[must_use]
    pub fn int16(self, tag: u32, values: &[u16]) -> Self {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.push(tag, TagType::Int16, values.len(), &bytes)
    }

    #[must_use]
    pub fn int32(self, tag: u32, values: &[u32]) -> Self {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.push(tag, TagType::Int32, values.len(), &bytes)
    }

    #[must_use]
    pub fn int64(self, tag: u32, values: &[u64]) -> Self {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.push(tag, TagType::Int64, values.len(), &bytes)
    }

    /// Add a `BIN` value.
    #[must_use]
    pub fn bin(self, tag: u32, value: &[u8]) -> Self {
        self.push(tag, TagType::Bin, value.len(), value)
    }

    /// The header blob: preamble, index and data store.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let dl = u32::try_from(self.data.len()).expect("data store exceeds u32");
        let mut blob = Vec::with_capacity(
            PREAMBLE_LEN + INDEX_ENTRY_LEN * self.entries as usize + self.data.len(),
        );
        blob.extend_from_slice(&self.entries.to_be_bytes());
        blob.extend_from_slice(&dl.to_be_bytes());
        blob.extend_from_slice(&self.index);
        blob.extend_from_slice(&self.data);
        blob
    }

    /// The blob framed as a package list record: magic followed by the blob.
    #[must_use]
    pub fn build_record(&self) -> Vec<u8> {
        let mut record = HEADER_MAGIC.to_vec();
        record.extend_from_slice(&self.build());
        record
    }
}
