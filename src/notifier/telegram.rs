// src/notifier/telegram.rs
//! Telegram Bot API transport

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{Notifier, NotifyOutcome};
use crate::config::TelegramConfig;

pub struct TelegramNotifier {
    client: Client,
    cfg: TelegramConfig,
    timeout: Duration,
}

impl TelegramNotifier {
    pub fn new(cfg: TelegramConfig, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            cfg,
            timeout,
        }
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        let token = self.cfg.bot_token.as_deref().filter(|t| !t.is_empty())?;
        let chat_id = self.cfg.chat_id.as_deref().filter(|c| !c.is_empty())?;
        Some((token, chat_id))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn notify(&self, message: &str) -> NotifyOutcome {
        let Some((token, chat_id)) = self.credentials() else {
            return NotifyOutcome::Failed("Telegram bot token or chat id not configured".to_string());
        };

        let url = format!(
            "{}/bot{}/sendMessage",
            self.cfg.api_base.trim_end_matches('/'),
            token
        );

        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .form(&[("chat_id", chat_id), ("text", message)])
            .send()
            .await;

        // reqwest errors embed the URL, which carries the token
        match resp {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!("Telegram notification sent");
                NotifyOutcome::Delivered
            }
            Ok(resp) => NotifyOutcome::Failed(format!("Telegram API returned {}", resp.status())),
            Err(e) if e.is_timeout() => NotifyOutcome::Failed(format!(
                "Telegram request timed out after {:?}",
                self.timeout
            )),
            Err(e) => NotifyOutcome::Failed(format!(
                "Telegram request failed: {}",
                e.without_url()
            )),
        }
    }
}
