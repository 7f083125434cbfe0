//! Long/wide pivoting of delimited tables driven by an explicit pivot spec.
//!
//! A [`spec::PivotSpec`] lists, for every wide column, the value variable it
//! holds (`.value`) and the key values it stands for. [`longer::pivot_longer`]
//! and [`wider::pivot_wider`] both read the same spec, so one spec describes
//! a pivot in either direction.

pub mod cli;
pub mod commands;
pub mod data;
pub mod error;
pub mod frame;
pub mod infer;
pub mod io_utils;
pub mod longer;
pub mod missing;
pub mod preview;
pub mod schema;
pub mod selection;
pub mod spec;
pub mod spec_io;
pub mod table;
pub mod wider;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands, SpecCommands};

pub use crate::{
    error::{PivotError, PivotResult},
    frame::{Column, Table},
    infer::{build_longer_spec, build_longer_spec_with, build_wider_spec},
    longer::{LongerOptions, pivot_longer},
    selection::ColumnSelection,
    spec::{KeyColumn, PivotSpec},
    wider::{DuplicatePolicy, WiderOptions, pivot_wider},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("csv_reshape", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Longer(args) => commands::execute_longer(&args),
        Commands::Wider(args) => commands::execute_wider(&args),
        Commands::Spec(SpecCommands::Longer(args)) => commands::execute_longer_spec(&args),
        Commands::Spec(SpecCommands::Wider(args)) => commands::execute_wider_spec(&args),
        Commands::Preview(args) => preview::execute(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
