//! Telegram Bot API notifier. Delivery is best-effort: failures are logged, never returned.

use crate::config::Telegram;
use serde_json::json;
use std::time::Duration;

pub const TELEGRAM_API: &str = "https://api.telegram.org";

/// Format a notification as Telegram message text.
pub fn message_text(title: &str, body: &str, success: bool) -> String {
    let marker = if success { "[OK]" } else { "[i]" };
    format!("{marker} {title}\n{body}")
}

pub struct Notifier {
    http: reqwest::Client,
    settings: Option<Telegram>,
    api_base: String,
}

impl Notifier {
    pub fn new(settings: &Telegram) -> Notifier {
        Self::with_api_base(settings, TELEGRAM_API)
    }

    pub fn with_api_base(settings: &Telegram, api_base: &str) -> Notifier {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Notifier {
            http,
            settings: settings.is_configured().then(|| settings.clone()),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// A notifier that never sends anything.
    pub fn disabled() -> Notifier {
        Self::new(&Telegram::default())
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.is_some()
    }

    fn send_url(&self, token: &str) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, token)
    }

    pub async fn send(&self, title: &str, body: &str, success: bool) {
        let Some(settings) = &self.settings else {
            return;
        };
        let payload = json!({
            "chat_id": settings.chat,
            "text": message_text(title, body, success),
            "disable_web_page_preview": true,
        });
        let result = self
            .http
            .post(self.send_url(&settings.token))
            .json(&payload)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        match result {
            Ok(_) => log::debug!("Telegram notification sent: {title}"),
            Err(e) => log::warn!("Telegram notification failed: {e}"),
        }
    }
}
