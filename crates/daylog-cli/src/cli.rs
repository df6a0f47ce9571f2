//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Rule-driven categorizer for daily activity logs.
///
/// Compiles a small rules language into a classification pipeline, turns
/// line-oriented logs into per-day activity intervals and reports
/// categorized, time-weighted totals.
#[derive(Debug, Parser)]
#[command(name = "daylog", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Categorize logs and print per-category and counter totals.
    Report {
        /// Rules file (name or path; `.grc` and `rules/` are tried).
        #[arg(short, long)]
        rules: Option<String>,

        /// Restrict to a period: 06-12, ~06-12, 06-12~ or 06-12~06-18
        /// (dashes optional).
        #[arg(short, long)]
        period: Option<String>,

        /// Ad-hoc counter pattern, as if under [counters]; may repeat.
        #[arg(short = 'c', long = "count")]
        counters: Vec<String>,

        /// Collapse override "Category = ... = Target"; may repeat.
        #[arg(short = 's', long = "collapse")]
        collapses: Vec<String>,

        /// Show every activity with the rule that matched it.
        #[arg(short, long)]
        diag: bool,

        /// Emit the report as JSON.
        #[arg(long)]
        json: bool,

        /// Log files (name or path; `.log` and `data/` are tried).
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Count occurrences and time spent for a pattern across the logs.
    Count {
        /// Case-insensitive pattern matched against activity text.
        pattern: String,

        /// Rules file (name or path).
        #[arg(short, long)]
        rules: Option<String>,

        /// Log files.
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// Sleep hour and duration statistics averaged over fixed periods.
    Sleep {
        /// Number of days to average over (7 for weeks, 30 for months).
        #[arg(short = 'l', long = "length")]
        length: usize,

        /// Rules file (name or path).
        #[arg(short, long)]
        rules: Option<String>,

        /// Log files.
        #[arg(required = true)]
        files: Vec<String>,
    },
}
