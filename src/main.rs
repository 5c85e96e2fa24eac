#![deny(unsafe_code)]
pub mod commands;
mod version;

use anyhow::Result;
use clap::Parser;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::error::ErrorKind;

/// Custom styles for CLI help output
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());
use commands::command::Command;
use commands::query::Query;
use commands::querytags::QueryTags;
use enum_dispatch::enum_dispatch;
use env_logger::Env;
use log::info;
use pkgq_lib::errors::{FAILURE_EXIT_CODE, PkgqError, USAGE_EXIT_CODE};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "pkgq", version, styles = STYLES)]
struct Args {
    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[enum_dispatch(Command)]
#[derive(Parser, Debug)]
enum Subcommand {
    #[command(display_order = 1)]
    Query(Query),
    #[command(display_order = 2)]
    Querytags(QueryTags),
}

/// Exit status for a failed command: the status of the first [`PkgqError`] in
/// the chain, or the general failure status.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PkgqError>())
        .map_or(FAILURE_EXIT_CODE, PkgqError::exit_code)
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let command_line = std::env::args().collect::<Vec<_>>().join(" ");

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => e.exit(),
            _ => {
                let _ = e.print();
                std::process::exit(USAGE_EXIT_CODE);
            }
        },
    };

    info!("Running pkgq version {}", version::VERSION.as_str());
    if let Err(e) = args.subcommand.execute(&command_line) {
        eprintln!("Error: {e:?}");
        std::process::exit(exit_code(&e));
    }
}
