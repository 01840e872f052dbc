//! SQLite statistics: every allocated address and every capture.

mod stats_db;

pub use stats_db::{Action, Capture, StatsDb};
