//! CLI subcommand implementations.

pub mod count;
pub mod report;
pub mod sleep;
pub mod util;
