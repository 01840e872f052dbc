//! Outbound notifications.

mod telegram;

pub use telegram::{message_text, Notifier, TELEGRAM_API};
