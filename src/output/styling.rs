//! Terminal styling shared by the report renderers and the spinner.

use std::fmt::Display;

use console::{style, StyledObject};

pub fn brand(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

pub fn heading(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn label(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

/// A number or amount the reader should notice.
pub fn figure(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn success(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn failure(text: impl Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

/// Green when nothing failed, red otherwise.
pub fn failure_count(count: usize) -> StyledObject<String> {
    if count == 0 {
        success(count)
    } else {
        failure(count)
    }
}
