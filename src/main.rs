// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose editor command-line interface.

use std::process;

use clap::Parser;

use pose_editor::cli::args::{Cli, Commands};
use pose_editor::cli::commands::{run_apply, run_edit, run_extract, run_preview, run_render};
use pose_editor::cli::logging::{Verbosity, set_verbosity};
use pose_editor::{VERSION, error, verbose};

fn main() {
    let cli = Cli::parse();
    set_verbosity(Verbosity::from_flags(cli.verbose, cli.quiet));
    verbose!("pose-editor {VERSION}");

    let result = match &cli.command {
        Commands::Render(args) => run_render(args),
        Commands::Preview(args) => run_preview(args),
        Commands::Apply(args) => run_apply(args),
        Commands::Extract(args) => run_extract(args),
        Commands::Edit(args) => run_edit(args),
    };

    if let Err(e) = result {
        error!("{e}");
        process::exit(1);
    }
}
