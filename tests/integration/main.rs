//! Integration tests for the pkgq library and binary.
//!
//! These tests exercise whole runs: package lists through the reader, the
//! two-thread pipeline and the query format, and the `pkgq` binary itself.

mod test_error_paths;
mod test_query_command;
