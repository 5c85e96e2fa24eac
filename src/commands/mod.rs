//! CLI command implementations for pkgq.
//!
//! - [`query`] - Render every package in one or more package lists through a query format
//! - [`querytags`] - List the tag names a query format may use

#![allow(clippy::missing_errors_doc, clippy::must_use_candidate)]

pub mod command;
pub mod common;
pub mod query;
pub mod querytags;
