mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

use serde::Serialize;

pub use exports::{write_report, OutputFormat};
pub use progress::PhaseProgress;
pub use styling::{brand, label};

/// A result that can be rendered for a terminal or exported for tooling.
pub trait Report: Serialize {
    /// Human-readable tables for stdout.
    fn summary(&self) -> String;

    fn csv_header() -> &'static str;

    fn csv_rows(&self) -> Vec<String>;
}

/// Prints the `pkgsweep` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        brand("🧹 pkgsweep"),
        label(env!("CARGO_PKG_VERSION")),
        label("GitLab package retention cleaner")
    );
}
