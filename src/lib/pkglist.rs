//! Package list input.
//!
//! A package list is a plain concatenation of framed RPM headers, each one the
//! 8-byte header magic followed by the header blob. The stream may be gzip
//! compressed as a whole.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::errors::{PkgqError, Result};
use crate::rpmheader::{INDEX_ENTRY_LEN, MAX_DATA_LENGTH, MAX_INDEX_ENTRIES, PREAMBLE_LEN};

/// Magic bytes that precede every header in a package list.
pub const HEADER_MAGIC: [u8; 8] = [0x8e, 0xad, 0xe8, 0x01, 0x00, 0x00, 0x00, 0x00];

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const FILE_TYPE: &str = "pkglist";

/// Check if a path refers to stdin.
#[must_use]
pub fn is_stdin_path<P: AsRef<Path>>(path: P) -> bool {
    let path_str = path.as_ref().to_string_lossy();
    path_str == "-" || path_str == "/dev/stdin"
}

/// Read into `buf` until it is full or the stream ends, returning the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Splits a package list stream into header blobs.
///
/// Errors name the input and the byte offset (in the uncompressed stream) of the
/// record that could not be read.
pub struct PkglistReader<R> {
    inner: R,
    path: String,
    offset: u64,
    records: u64,
}

impl<R: BufRead> PkglistReader<R> {
    /// Wrap a stream; `path` is only used in error messages.
    pub fn new(inner: R, path: impl Into<String>) -> Self {
        Self { inner, path: path.into(), offset: 0, records: 0 }
    }

    /// The input's name as given at construction.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Number of records read so far.
    #[must_use]
    pub fn records_read(&self) -> u64 {
        self.records
    }

    fn invalid(&self, reason: String) -> PkgqError {
        PkgqError::InvalidFileFormat {
            file_type: FILE_TYPE.to_string(),
            path: self.path.clone(),
            reason,
        }
    }

    fn read_error(&self, source: io::Error) -> PkgqError {
        PkgqError::Read { path: self.path.clone(), source }
    }

    /// Read the next header blob, without its magic.
    ///
    /// Returns `Ok(None)` at a clean end of stream.
    ///
    /// # Errors
    ///
    /// Returns an error for bad magic, implausible lengths, truncation or an I/O failure.
    pub fn next_blob(&mut self) -> Result<Option<Vec<u8>>> {
        let start = self.offset;

        let mut magic = [0u8; HEADER_MAGIC.len()];
        let n = read_full(&mut self.inner, &mut magic).map_err(|e| self.read_error(e))?;
        if n == 0 {
            return Ok(None);
        }
        if n < magic.len() {
            return Err(self.invalid(format!("truncated header magic at offset {start}")));
        }
        if magic != HEADER_MAGIC {
            return Err(self.invalid(format!("bad header magic at offset {start}")));
        }

        let mut blob = vec![0u8; PREAMBLE_LEN];
        let n = read_full(&mut self.inner, &mut blob).map_err(|e| self.read_error(e))?;
        if n < PREAMBLE_LEN {
            return Err(self.invalid(format!("truncated header at offset {start}")));
        }

        let il = u32::from_be_bytes([blob[0], blob[1], blob[2], blob[3]]);
        let dl = u32::from_be_bytes([blob[4], blob[5], blob[6], blob[7]]);
        if il == 0 || il > MAX_INDEX_ENTRIES {
            return Err(self.invalid(format!("bad index entry count {il} at offset {start}")));
        }
        if dl > MAX_DATA_LENGTH {
            return Err(self.invalid(format!("bad data length {dl} at offset {start}")));
        }

        let body_len = INDEX_ENTRY_LEN * il as usize + dl as usize;
        blob.resize(PREAMBLE_LEN + body_len, 0);
        let n = read_full(&mut self.inner, &mut blob[PREAMBLE_LEN..]).map_err(|e| self.read_error(e))?;
        if n < body_len {
            return Err(self.invalid(format!(
                "truncated header at offset {start}: expected {body_len} more bytes, found {n}"
            )));
        }

        self.offset += (HEADER_MAGIC.len() + blob.len()) as u64;
        self.records += 1;
        Ok(Some(blob))
    }
}

impl<R: BufRead> Iterator for PkglistReader<R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_blob().transpose()
    }
}

/// Wrap `reader` in a gzip decoder if the stream starts with the gzip magic.
fn maybe_decompress<'a, R: BufRead + 'a>(mut reader: R) -> io::Result<Box<dyn BufRead + 'a>> {
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if is_gzip {
        // Concatenated gzip members decode as one stream
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

/// Open a package list from a file, or stdin for `-`.
///
/// Gzip-compressed input is detected from its first bytes and decompressed.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn open_pkglist<P: AsRef<Path>>(path: P) -> Result<PkglistReader<Box<dyn BufRead>>> {
    let path = path.as_ref();
    let name = path.to_string_lossy().into_owned();
    let read_error = |source| PkgqError::Read { path: name.clone(), source };

    let reader = if is_stdin_path(path) {
        maybe_decompress(BufReader::new(io::stdin())).map_err(read_error)?
    } else {
        let file = File::open(path).map_err(read_error)?;
        maybe_decompress(BufReader::new(file)).map_err(read_error)?
    };
    Ok(PkglistReader::new(reader, name))
}
