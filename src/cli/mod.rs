// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! CLI module for editing and rendering poses.
//!
//! This module contains the command-line interface logic, including argument parsing,
//! terminal logging and the subcommand implementations.

// Modules
/// CLI arguments.
pub mod args;

/// Subcommand implementations.
pub mod commands;

/// Terminal logging macros.
pub mod logging;
