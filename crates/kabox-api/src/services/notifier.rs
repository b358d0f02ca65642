//! Operator notifications.
//!
//! Events are pushed to a Telegram channel when configured. Delivery runs on a detached task
//! through [`notify`], so a slow or failing channel never delays or fails a request.

use anyhow::{Context, Result};
use async_trait::async_trait;
use kabox_core::TelegramSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ServerStarted {
        port: u16,
        storage: Vec<String>,
        databases: Vec<String>,
    },
    Uploaded {
        id: String,
        name: String,
        size: u64,
        storage: String,
        ip: String,
        elapsed_ms: u128,
    },
    Downloaded {
        id: String,
        name: String,
        ip: String,
    },
    RateLimited {
        ip: String,
        path: String,
    },
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

impl Notification {
    /// Message body in Telegram's HTML parse mode.
    pub fn render(&self) -> String {
        match self {
            Notification::ServerStarted {
                port,
                storage,
                databases,
            } => format!(
                "🚀 <b>Server Started</b>\n\nPort: {}\nStorage: {}\nDatabase: {}",
                port,
                escape_html(&storage.join(", ")),
                escape_html(&databases.join(", "))
            ),
            Notification::Uploaded {
                id,
                name,
                size,
                storage,
                ip,
                elapsed_ms,
            } => format!(
                "📤 <b>Upload Baru</b>\n\nID: <code>{}</code>\nFile: {}\nSize: {:.2} MB\nStorage: {}\nIP: {}\nTime: {}ms",
                escape_html(id),
                escape_html(name),
                *size as f64 / 1024.0 / 1024.0,
                escape_html(storage),
                escape_html(ip),
                elapsed_ms
            ),
            Notification::Downloaded { id, name, ip } => format!(
                "📥 <b>Download</b>\n\nID: <code>{}</code>\nFile: {}\nIP: {}",
                escape_html(id),
                escape_html(name),
                escape_html(ip)
            ),
            Notification::RateLimited { ip, path } => format!(
                "⚠️ Rate limit exceeded\nIP: {}\nPath: {}",
                escape_html(ip),
                escape_html(path)
            ),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Notification::ServerStarted { .. } => "server_started",
            Notification::Uploaded { .. } => "uploaded",
            Notification::Downloaded { .. } => "downloaded",
            Notification::RateLimited { .. } => "rate_limited",
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Used when no channel is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _notification: &Notification) -> Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
}

#[derive(Deserialize)]
struct TelegramReply {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    channel_id: String,
}

impl TelegramNotifier {
    pub fn new(settings: &TelegramSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build Telegram HTTP client")?;
        Ok(Self {
            client,
            api_base: TELEGRAM_API_BASE.to_string(),
            bot_token: settings.bot_token.clone(),
            channel_id: settings.channel_id.clone(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let reply: TelegramReply = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_base, self.bot_token))
            .json(&SendMessage {
                chat_id: &self.channel_id,
                text: notification.render(),
                parse_mode: "HTML",
            })
            .send()
            .await
            .context("Telegram request failed")?
            .json()
            .await
            .context("Invalid Telegram response")?;

        if !reply.ok {
            anyhow::bail!(
                "Telegram rejected message: {}",
                reply.description.unwrap_or_default()
            );
        }
        Ok(())
    }
}

/// Deliver `notification` in the background.
pub fn notify(notifier: &Arc<dyn Notifier>, notification: Notification) {
    let notifier = notifier.clone();
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&notification).await {
            tracing::warn!(error = %e, kind = notification.kind(), "Failed to send notification");
        }
    });
}
