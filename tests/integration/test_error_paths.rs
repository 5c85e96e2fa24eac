//! Error path integration tests.
//!
//! These tests run real package list data through the reader, the header
//! decoder and the query format together, and check which errors come out and
//! what output survives them.

use std::error::Error as _;
use std::io::Cursor;

use pkgq_lib::errors::{FAILURE_EXIT_CODE, PkgqError};
use pkgq_lib::pipeline::{PipelineConfig, QueryPipeline};
use pkgq_lib::pkglist::PkglistReader;
use pkgq_lib::queryformat::{QueryFormat, QueryFormatError};
use pkgq_lib::rpmheader::{HeaderError, RpmDecoder};

use crate::helpers::{SharedSink, TestPackage, numbered_packages, pkglist_bytes, undecodable_record};

/// Read every record from `bytes` and run it through the query pipeline.
fn query(format: &str, bytes: Vec<u8>, sink: SharedSink) -> Result<u64, PkgqError> {
    let format = QueryFormat::parse(format).expect("valid format");
    let mut pipeline = QueryPipeline::new(&PipelineConfig::default(), RpmDecoder, format, sink)?;
    for blob in PkglistReader::new(Cursor::new(bytes), "test.pkglist") {
        pipeline.submit(blob?)?;
    }
    Ok(pipeline.finish()?.stats.records_written)
}

// ==================== Decode Errors ====================

#[test]
fn test_decode_error_carries_header_error() {
    let packages = numbered_packages(4);
    let mut bytes = pkglist_bytes(&packages[..1]);
    bytes.extend(undecodable_record(&packages[1]));
    bytes.extend(pkglist_bytes(&packages[2..]));

    let sink = SharedSink::default();
    let err = query("%{NAME}\\n", bytes, sink.clone()).unwrap_err();

    let PkgqError::Decode { index, source } = &err else { panic!("unexpected error: {err:?}") };
    assert_eq!(*index, 1);
    let header_err = source.downcast_ref::<HeaderError>().expect("source is a HeaderError");
    assert!(matches!(header_err, HeaderError::UnknownType { code: 99, .. }));
    assert_eq!(sink.text(), "pkg00000\n");
    assert_eq!(err.exit_code(), FAILURE_EXIT_CODE);
}

// ==================== Format Errors ====================

#[test]
fn test_evaluation_error_stops_at_failing_package() {
    // The third package's arrays have different lengths.
    let good = |name: &str| {
        TestPackage::new(name, "1.0", "alt1")
            .builder()
            .string_array(pkgq_lib::rpmheader::tags::PROVIDENAME, &[name])
            .string_array(pkgq_lib::rpmheader::tags::REQUIRENAME, &["glibc"])
            .build_record()
    };
    let bad = TestPackage::new("broken", "1.0", "alt1")
        .builder()
        .string_array(pkgq_lib::rpmheader::tags::PROVIDENAME, &["a", "b"])
        .string_array(pkgq_lib::rpmheader::tags::REQUIRENAME, &["glibc", "libc", "zlib"])
        .build_record();

    let mut bytes = good("bash");
    bytes.extend(good("rpm"));
    bytes.extend(bad);
    bytes.extend(good("apt"));

    let sink = SharedSink::default();
    let err = query("[%{PROVIDENAME} %{REQUIRENAME}\\n]", bytes, sink.clone()).unwrap_err();

    let PkgqError::Format { index, source } = &err else { panic!("unexpected error: {err:?}") };
    assert_eq!(*index, 2);
    assert!(matches!(
        source.downcast_ref::<QueryFormatError>(),
        Some(QueryFormatError::ArraySizeMismatch { expected: 3, found: 2, .. })
    ));
    assert_eq!(sink.text(), "bash glibc\nrpm glibc\n");
}

#[test]
fn test_numeric_modifier_on_text_fails_at_runtime() {
    let bytes = pkglist_bytes(&numbered_packages(3));
    let err = query("%{NAME:hex}\\n", bytes, SharedSink::default()).unwrap_err();
    let PkgqError::Format { index, source } = &err else { panic!("unexpected error: {err:?}") };
    assert_eq!(*index, 0);
    assert!(err.to_string().contains("record #1"));
    assert!(source.to_string().contains("NAME"));
}

// ==================== Framing Errors ====================

#[test]
fn test_garbage_between_records_keeps_earlier_output() {
    let packages = numbered_packages(3);
    let mut bytes = pkglist_bytes(&packages[..2]);
    let offset = bytes.len();
    bytes.extend_from_slice(b"not a header at all");
    bytes.extend(pkglist_bytes(&packages[2..]));

    let sink = SharedSink::default();
    let format = QueryFormat::parse("%{NAME}\\n").unwrap();
    let mut pipeline =
        QueryPipeline::new(&PipelineConfig::default(), RpmDecoder, format, sink.clone()).unwrap();

    let mut read_error = None;
    for blob in PkglistReader::new(Cursor::new(bytes), "test.pkglist") {
        match blob {
            Ok(blob) => pipeline.submit(blob).unwrap(),
            Err(e) => {
                read_error = Some(e);
                break;
            }
        }
    }
    let stats = pipeline.finish().unwrap().stats;

    let err = read_error.expect("garbage must be rejected");
    let message = err.to_string();
    assert!(message.contains("test.pkglist"), "{message}");
    assert!(message.contains(&format!("offset {offset}")), "{message}");
    assert_eq!(stats.records_written, 2);
    assert_eq!(sink.text(), "pkg00000\npkg00001\n");
}

#[test]
fn test_read_error_exposes_io_source() {
    struct BrokenReader;

    impl std::io::Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk on fire"))
        }
    }

    let mut reader = PkglistReader::new(std::io::BufReader::new(BrokenReader), "broken.pkglist");
    let err = reader.next_blob().unwrap_err();
    assert!(matches!(err, PkgqError::Read { .. }));
    assert!(err.to_string().contains("broken.pkglist"));
    assert_eq!(err.source().map(ToString::to_string), Some("disk on fire".to_string()));
    assert_eq!(err.exit_code(), FAILURE_EXIT_CODE);
}

// ==================== Successful Runs ====================

#[test]
fn test_missing_tags_render_placeholder() {
    let bytes = pkglist_bytes(&numbered_packages(2));
    let sink = SharedSink::default();
    let written = query("%{NAME} %{EPOCH}\\n", bytes, sink.clone()).unwrap();
    assert_eq!(written, 2);
    assert_eq!(sink.text(), "pkg00000 (none)\npkg00001 (none)\n");
}
