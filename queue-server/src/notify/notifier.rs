//! 通知发送实现

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use super::Notification;

/// 发送错误
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected notification: status {0}")]
    Rejected(u16),
}

/// 通知发送者
///
/// 重试与送达由具体实现负责
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// 仅写日志的发送者 (默认)
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            kind = notification.kind.as_str(),
            phone = %notification.phone,
            daily_sequence = notification.daily_sequence,
            message = %notification.render(),
            "Notification dispatched"
        );
        Ok(())
    }
}

/// Webhook 请求体
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    #[serde(flatten)]
    notification: &'a Notification,
    message: String,
}

/// 以 JSON POST 转发到外部网关 (短信/WhatsApp 等)
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            notification,
            message: notification.render(),
        };
        let response = self.client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
