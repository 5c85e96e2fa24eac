//! List the tag names a query format may use.

use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;

use pkgq_lib::rpmheader::tags::known_tags;

use crate::commands::command::Command;

/// List known header tags.
#[derive(Debug, Parser)]
#[command(
    name = "querytags",
    about = "\x1b[36mList the header tags available to query formats\x1b[0m",
    long_about = r#"
Print the canonical name of every header tag known to pkgq, one per line.

Names are matched without regard to case and may carry an 'RPMTAG_' prefix. Tags not
listed here can still be queried by number, e.g. '%{1000}'.
"#
)]
pub struct QueryTags {
    /// Also print each tag's number, tab-separated
    #[arg(short = 'n', long = "numbers", default_value = "false")]
    pub numbers: bool,
}

impl QueryTags {
    fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (name, tag) in known_tags() {
            if self.numbers {
                writeln!(out, "{name}\t{tag}")?;
            } else {
                writeln!(out, "{name}")?;
            }
        }
        out.flush()
    }
}

impl Command for QueryTags {
    fn execute(&self, _command_line: &str) -> Result<()> {
        let mut out = BufWriter::new(io::stdout().lock());
        self.write_to(&mut out).context("Failed to write tag list")
    }
}
