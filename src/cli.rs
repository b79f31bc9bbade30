//! CLI argument parsing for the pagein replay driver

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "pagein")]
#[command(version)]
#[command(about = "Replay an instrumentation event stream and report page first-touch order", long_about = None)]
pub struct Cli {
    /// Recorded event stream to replay (one JSON event per line)
    pub trace: PathBuf,

    /// Binary to resolve instruction addresses against (symbol table + DWARF)
    #[arg(short, long, value_name = "PATH")]
    pub binary: Option<PathBuf>,

    /// Directory the report is written into (default: current working directory)
    #[arg(short = 'd', long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Write the report to this exact path instead of <DIR>/pagein.<pid>
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Enable debug logging to stderr
    #[arg(long)]
    pub debug: bool,
}
