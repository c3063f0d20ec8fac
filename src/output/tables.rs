use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::model::DeletionStatus;

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

/// GitLab's name for a numeric access level.
pub fn access_level_name(level: u8) -> String {
    match level {
        0 => "None".to_string(),
        5 => "Minimal".to_string(),
        10 => "Guest".to_string(),
        20 => "Reporter".to_string(),
        30 => "Developer".to_string(),
        40 => "Maintainer".to_string(),
        50 => "Owner".to_string(),
        other => other.to_string(),
    }
}

/// Deleting files needs Maintainer, so anything less is flagged.
pub fn access_level_cell(level: u8) -> Cell {
    let text = access_level_name(level);
    if level >= 40 {
        Cell::new(text).fg(TableColor::Green)
    } else {
        Cell::new(text).fg(TableColor::Yellow)
    }
}

pub fn status_cell(status: &DeletionStatus) -> Cell {
    match status {
        DeletionStatus::Deleted => Cell::new("deleted").fg(TableColor::Green),
        DeletionStatus::Failed { error } => Cell::new(format!("failed: {error}")).fg(TableColor::Red),
    }
}

/// Binary-prefixed size, e.g. `1.5 MiB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    #[allow(clippy::cast_precision_loss)]
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
