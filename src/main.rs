//! Book Minder - personal digital-library metadata manager.
//!
//! Fetches bibliographic metadata from external providers, reconciles it
//! against per-field trust settings, and either applies it directly or stages
//! it for review.

pub mod cli;
pub mod config;
pub mod cover;
pub mod db;
pub mod model;
pub mod reconcile;
pub mod score;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(EnvFilter::from_default_env().add_directive("book_minder=info".parse()?))
        .init();

    cli::run_command(&args)
}
