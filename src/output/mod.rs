//! Output formatting.
//!
//! - [`report`] - rows for the reporting commands
//! - [`terminal`] - field formatting and colors

mod report;
mod terminal;

pub use report::{
    capture_header, capture_row, check_line, print_captures, print_stats, subnet_hit_lines,
    subnet_lines,
};
pub use terminal::{format_field, verdict};
