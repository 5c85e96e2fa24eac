//! Sinks and collaborators for driving the pipeline directly.

#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use pkgq_lib::pipeline::{Decoder, Formatter};

/// A sink whose contents stay readable while the pipeline owns it.
#[derive(Debug, Clone, Default)]
pub struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().clone()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.contents()).expect("sink holds UTF-8")
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A sink that accepts `remaining` writes and fails every one after that.
#[derive(Debug)]
pub struct FailingSink {
    pub remaining: usize,
    pub written: Vec<u8>,
}

impl FailingSink {
    pub fn after(remaining: usize) -> Self {
        Self { remaining, written: Vec::new() }
    }
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "sink closed"));
        }
        self.remaining -= 1;
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Blobs are UTF-8 text; the record is the text itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextDecoder;

impl Decoder for TextDecoder {
    type Record = String;
    type Error = std::string::FromUtf8Error;

    fn decode(&self, blob: Vec<u8>) -> Result<String, Self::Error> {
        String::from_utf8(blob)
    }
}

/// Writes each record on its own line, sleeping first for records listed in
/// `slow`, and failing on `fail_on` or panicking on `panic_on`.
#[derive(Debug, Default)]
pub struct LineFormatter {
    pub slow: Vec<(String, Duration)>,
    pub fail_on: Option<String>,
    pub panic_on: Option<String>,
    pub calls: AtomicUsize,
}

impl LineFormatter {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Formatter<String> for LineFormatter {
    type Error = io::Error;

    fn format(&self, record: &String, out: &mut Vec<u8>) -> Result<(), Self::Error> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some((_, delay)) = self.slow.iter().find(|(name, _)| name == record) {
            thread::sleep(*delay);
        }
        if self.fail_on.as_ref() == Some(record) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, format!("cannot format {record}")));
        }
        assert!(self.panic_on.as_ref() != Some(record), "formatter panicked on {record}");
        out.extend_from_slice(record.as_bytes());
        out.push(b'\n');
        Ok(())
    }
}

/// Formats with a delay that depends on the record, to shuffle completion order.
#[derive(Debug, Clone, Copy)]
pub struct JitterFormatter {
    pub max_delay_micros: u64,
}

impl Formatter<String> for JitterFormatter {
    type Error = std::convert::Infallible;

    fn format(&self, record: &String, out: &mut Vec<u8>) -> Result<(), Self::Error> {
        if self.max_delay_micros > 0 {
            let hash = record.bytes().fold(17u64, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)));
            thread::sleep(Duration::from_micros(hash % self.max_delay_micros));
        }
        out.extend_from_slice(record.as_bytes());
        out.push(b'\n');
        Ok(())
    }
}
