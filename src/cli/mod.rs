//! Command-line interface for pyinfer
//!
//! Provides commands: analyze

mod analyze_cmd;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use analyze_cmd::AnalyzeOptions;

/// pyinfer - whole-program type inference for Python
#[derive(Parser, Debug)]
#[command(name = "pyinfer")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output diagnostics as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress progress and summary output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Show debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Infer types for a file or a project directory
    Analyze {
        /// File or directory to analyze
        path: PathBuf,

        /// Extra directory searched for imports (repeatable)
        #[arg(long = "path", value_name = "DIR")]
        search_paths: Vec<PathBuf>,

        /// Do not read or write the on-disk AST cache
        #[arg(long)]
        no_cache: bool,

        /// Empty the AST cache before analyzing
        #[arg(long)]
        clear_cache: bool,

        /// Print the binding table
        #[arg(long)]
        bindings: bool,
    },
}

impl Cli {
    /// Log level selected by `--quiet` / `--verbose`
    pub fn log_level(&self) -> log::LevelFilter {
        if self.quiet {
            log::LevelFilter::Warn
        } else if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }

    /// Run the selected command, writing its report to stdout
    ///
    /// Returns `false` when the run completed but some file failed to parse.
    pub fn run(self) -> Result<bool, Box<dyn std::error::Error>> {
        match self.command {
            Command::Analyze {
                path,
                search_paths,
                no_cache,
                clear_cache,
                bindings,
            } => {
                let options = AnalyzeOptions {
                    path,
                    search_paths,
                    json: self.json,
                    no_cache,
                    clear_cache,
                    bindings,
                    quiet: self.quiet,
                };
                let stdout = std::io::stdout();
                analyze_cmd::run_analyze(&options, &mut stdout.lock())
            }
        }
    }
}

#[cfg(test)]
mod tests;
