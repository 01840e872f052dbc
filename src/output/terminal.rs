//! Terminal output utilities.

use colored::{ColoredString, Colorize};

/// Format a value as a quoted, right-aligned field.
pub fn format_field<T: ToString>(value: T, width: usize) -> String {
    let quoted = format!("\"{}\"", value.to_string());
    if quoted.len() >= width {
        quoted
    } else {
        format!("{quoted:>width$}")
    }
}

/// Green for target addresses, dim red for everything else.
pub fn verdict(is_target: bool) -> ColoredString {
    if is_target {
        "TARGET".green().bold()
    } else {
        "miss".red().dimmed()
    }
}
