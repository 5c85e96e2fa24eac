//! Integration tests for the query and querytags commands.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

use rand::SeedableRng;
use rand::rngs::StdRng;
use tempfile::TempDir;

use crate::helpers::{
    TestPackage, numbered_packages, pkglist_bytes, random_packages, undecodable_record,
    write_gzipped_pkglist, write_pkglist,
};

const NVR_FORMAT: &str = "%{NAME}-%{VERSION}-%{RELEASE}\\n";

fn pkgq(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pkgq"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run pkgq")
}

fn pkgq_with_stdin(args: &[&str], stdin: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_pkgq"))
        .args(args)
        .env("RUST_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to run pkgq");
    child.stdin.take().expect("stdin is piped").write_all(stdin).expect("Failed to write stdin");
    child.wait_with_output().expect("Failed to wait for pkgq")
}

fn expected_nvrs(packages: &[TestPackage]) -> String {
    packages.iter().map(|p| format!("{}\n", p.nvr())).collect()
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp paths are UTF-8")
}

#[test]
fn test_query_prints_packages_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("pkglist.classic");
    let packages = numbered_packages(500);
    write_pkglist(&input, &pkglist_bytes(&packages));

    let output = pkgq(&["query", NVR_FORMAT, path_str(&input)]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8(output.stdout).unwrap(), expected_nvrs(&packages));
}

#[test]
fn test_query_random_sizes_small_queue() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("pkglist.classic");
    let mut rng = StdRng::seed_from_u64(42);
    let packages = random_packages(&mut rng, 300);
    write_pkglist(&input, &pkglist_bytes(&packages));

    let output = pkgq(&[
        "query",
        "%{NAME} %{SIZE} %{#REQUIRENAME}\\n",
        path_str(&input),
        "--queue-capacity",
        "2",
        "--aid-low-water",
        "0",
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let expected: String = packages
        .iter()
        .map(|p| format!("{} {} {}\n", p.name, p.size, p.requires.len()))
        .collect();
    assert_eq!(String::from_utf8(output.stdout).unwrap(), expected);
}

#[test]
fn test_query_array_iteration() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("pkglist.classic");
    let packages = vec![
        TestPackage::new("bash", "5.2", "alt1").requires(&["glibc", "libtinfo"]),
        TestPackage::new("rpm", "4.13", "alt2").requires(&["librpm"]),
    ];
    write_pkglist(&input, &pkglist_bytes(&packages));

    let output = pkgq(&["query", "[%{=NAME} %{REQUIRENAME}\\n]", path_str(&input)]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "bash glibc\nbash libtinfo\nrpm librpm\n"
    );
}

#[test]
fn test_query_multiple_inputs_and_gzip() {
    let temp_dir = TempDir::new().unwrap();
    let plain = temp_dir.path().join("pkglist.base");
    let gzipped = temp_dir.path().join("pkglist.updates.gz");
    let first = numbered_packages(20);
    let second: Vec<TestPackage> =
        (0..30).map(|i| TestPackage::new(&format!("upd{i}"), "2.0", "alt1")).collect();
    write_pkglist(&plain, &pkglist_bytes(&first));
    write_gzipped_pkglist(&gzipped, &pkglist_bytes(&second));

    let output = pkgq(&["query", NVR_FORMAT, path_str(&plain), path_str(&gzipped)]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let expected = expected_nvrs(&first) + &expected_nvrs(&second);
    assert_eq!(String::from_utf8(output.stdout).unwrap(), expected);
}

#[test]
fn test_query_reads_stdin() {
    let packages = numbered_packages(50);
    let output = pkgq_with_stdin(&["query", NVR_FORMAT], &pkglist_bytes(&packages));

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8(output.stdout).unwrap(), expected_nvrs(&packages));
}

#[test]
fn test_query_empty_input() {
    let output = pkgq_with_stdin(&["query", NVR_FORMAT, "-"], &[]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_query_writes_output_file() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("pkglist.classic");
    let out = temp_dir.path().join("nvrs.txt");
    let packages = numbered_packages(10);
    write_pkglist(&input, &pkglist_bytes(&packages));

    let output = pkgq(&["query", NVR_FORMAT, path_str(&input), "-o", path_str(&out)]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(output.stdout.is_empty());
    assert_eq!(std::fs::read_to_string(&out).unwrap(), expected_nvrs(&packages));
}

#[test]
fn test_query_undecodable_record_keeps_earlier_output() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("pkglist.classic");
    let packages = numbered_packages(5);
    let mut bytes = pkglist_bytes(&packages[..2]);
    bytes.extend(undecodable_record(&packages[2]));
    bytes.extend(pkglist_bytes(&packages[3..]));
    write_pkglist(&input, &bytes);

    let output = pkgq(&["query", NVR_FORMAT, path_str(&input)]);

    assert_eq!(output.status.code(), Some(2));
    assert_eq!(String::from_utf8(output.stdout).unwrap(), expected_nvrs(&packages[..2]));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("record #3"), "stderr: {stderr}");
}

#[test]
fn test_query_truncated_input_stops_run() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("pkglist.classic");
    let packages = numbered_packages(3);
    let mut bytes = pkglist_bytes(&packages);
    bytes.truncate(bytes.len() - 5);
    write_pkglist(&input, &bytes);

    let output = pkgq(&["query", NVR_FORMAT, path_str(&input)]);

    assert_eq!(output.status.code(), Some(2));
    // Queued records may be discarded, but nothing past them is ever written.
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(expected_nvrs(&packages[..2]).starts_with(&stdout), "stdout: {stdout}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("truncated header"), "stderr: {stderr}");
}

#[test]
fn test_query_stops_at_garbage_between_records() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("pkglist.classic");
    let packages = numbered_packages(2_000);
    let mut bytes = pkglist_bytes(&packages[..1_500]);
    let offset = bytes.len();
    bytes.extend_from_slice(b"not a header at all");
    bytes.extend(pkglist_bytes(&packages[1_500..]));
    write_pkglist(&input, &bytes);

    let output = pkgq(&["query", NVR_FORMAT, path_str(&input), "--queue-capacity", "2"]);

    assert_eq!(output.status.code(), Some(2));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.is_empty() || stdout.ends_with('\n'), "partial record written");
    assert!(expected_nvrs(&packages[..1_500]).starts_with(&stdout));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains(&format!("bad header magic at offset {offset}")), "stderr: {stderr}");
}

#[test]
fn test_query_missing_input_fails() {
    let output = pkgq(&["query", NVR_FORMAT, "/nonexistent/pkglist.classic"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_query_bad_format_is_usage_error() {
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("pkglist.classic");
    write_pkglist(&input, &pkglist_bytes(&numbered_packages(1)));

    for format in ["%{NOSUCHTAG}", "%{NAME", "[%{NAME}"] {
        let output = pkgq(&["query", format, path_str(&input)]);
        assert_eq!(output.status.code(), Some(1), "format {format:?}");
        assert!(output.stdout.is_empty());
    }
}

#[test]
fn test_query_bad_arguments_are_usage_errors() {
    assert_eq!(pkgq(&["query"]).status.code(), Some(1));
    assert_eq!(pkgq(&["query", NVR_FORMAT, "--queue-capacity", "0"]).status.code(), Some(1));
    assert_eq!(pkgq(&["query", NVR_FORMAT, "-", "-"]).status.code(), Some(1));
    assert_eq!(pkgq(&["nosuchcommand"]).status.code(), Some(1));
}

#[test]
fn test_help_and_version_succeed() {
    assert!(pkgq(&["--help"]).status.success());
    assert!(pkgq(&["query", "--help"]).status.success());
    assert!(pkgq(&["--version"]).status.success());
}

#[test]
fn test_querytags_lists_names() {
    let output = pkgq(&["querytags"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.lines().any(|line| line == "NAME"));
    assert!(stdout.lines().any(|line| line == "REQUIRENAME"));

    let output = pkgq(&["querytags", "--numbers"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.lines().any(|line| line == "VERSION\t1001"));
}
