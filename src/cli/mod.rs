//! Command-line interface for book-minder.
//!
//! This module provides CLI commands for adding books, running metadata
//! refreshes, and working the review queue.

mod commands;

pub use commands::{Cli, Commands, run_command};
