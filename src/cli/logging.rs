// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Coloured terminal logging shared by the library and the CLI.
//!
//! Remote failures, fallbacks and stale responses are reported through [`warn!`] and are
//! never silenced. Per-event editor traces go through [`verbose!`]. Progress and result
//! lines ([`info!`], [`success!`]) are dropped in quiet mode so scripted `edit` and `extract`
//! runs only print what went wrong.

use std::sync::atomic::{AtomicU8, Ordering};

/// How much the CLI prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Warnings and errors only.
    Quiet,
    /// Progress and results as well.
    #[default]
    Normal,
    /// Editor traces and section headers as well.
    Verbose,
}

impl Verbosity {
    /// Level selected by the `--verbose` and `--quiet` flags. Verbose wins.
    #[must_use]
    pub const fn from_flags(verbose: bool, quiet: bool) -> Self {
        if verbose {
            Self::Verbose
        } else if quiet {
            Self::Quiet
        } else {
            Self::Normal
        }
    }

    const fn from_u8(level: u8) -> Self {
        match level {
            0 => Self::Quiet,
            1 => Self::Normal,
            _ => Self::Verbose,
        }
    }
}

static VERBOSITY: AtomicU8 = AtomicU8::new(Verbosity::Normal as u8);

/// Set the process-wide verbosity.
pub fn set_verbosity(level: Verbosity) {
    VERBOSITY.store(level as u8, Ordering::Relaxed);
}

/// Current process-wide verbosity.
pub fn verbosity() -> Verbosity {
    Verbosity::from_u8(VERBOSITY.load(Ordering::Relaxed))
}

/// Whether editor traces are printed.
pub fn is_verbose() -> bool {
    verbosity() >= Verbosity::Verbose
}

/// Whether progress and result lines are printed.
pub fn is_quiet() -> bool {
    verbosity() == Verbosity::Quiet
}

/// Macro for standard info messages.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        if !$crate::cli::logging::is_quiet() {
            println!("{}", format!($($arg)*));
        }
    }}
}

/// Macro for warning messages.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        use colored::Colorize;
        eprintln!("{} {}", "WARNING ⚠️".yellow().bold(), format!($($arg)*));
    }}
}

/// Macro for error messages.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        use colored::Colorize;
        eprintln!("{} {}", "Error:".red().bold(), format!($($arg)*));
    }}
}

/// Macro for success messages.
#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {{
        use colored::Colorize;
        if !$crate::cli::logging::is_quiet() {
            println!("{} {}", "✅".green(), format!($($arg)*));
        }
    }}
}

/// Macro for verbose messages.
#[macro_export]
macro_rules! verbose {
    ($($arg:tt)*) => {{
        if $crate::cli::logging::is_verbose() {
            eprintln!("{}", format!($($arg)*));
        }
    }}
}

/// Macro for section headers.
#[macro_export]
macro_rules! section {
    ($($arg:tt)*) => {{
        use colored::Colorize;
        if $crate::cli::logging::is_verbose() {
            println!();
            println!("{}", format!($($arg)*).cyan().bold());
        }
    }}
}
