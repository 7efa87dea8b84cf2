use crate::traits::{Inbox, Transport};
use crate::types::{ChatMessage, Item, PublishError, PublishTask, SendOptions};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Render an item as a channel post.
pub fn format_message(item: &Item, hashtags: &str) -> String {
    let mut text = format!("📰 {}\n\nДжерело: {}\n{}", item.title, item.source, item.url);
    if !hashtags.trim().is_empty() {
        text.push_str("\n\n");
        text.push_str(hashtags.trim());
    }
    text
}

/// Sends items one at a time with a minimum gap between sends.
///
/// Pacing is blocking: a send waits until `interval` has passed since the
/// previous send attempt, whether that attempt succeeded or not. There is no
/// queue and no retry.
pub struct Publisher<T: Transport> {
    transport: T,
    interval: Duration,
    hashtags: String,
    options: SendOptions,
    last_send: Option<Instant>,
}

impl<T: Transport> Publisher<T> {
    pub fn new(transport: T, interval: Duration, hashtags: impl Into<String>) -> Self {
        Self {
            transport,
            interval,
            hashtags: hashtags.into(),
            options: SendOptions {
                disable_link_preview: true,
            },
            last_send: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn publish(&mut self, task: PublishTask<'_>) -> Result<(), PublishError> {
        self.pace().await;

        let text = format_message(task.item, &self.hashtags);
        let result = self.transport.send(task.channel, &text, self.options).await;
        self.last_send = Some(Instant::now());

        match &result {
            Ok(()) => info!("Published {} ({})", task.item.title, task.item.url),
            Err(e) => warn!("Publishing {} failed: {}", task.item.url, e),
        }
        result
    }

    async fn pace(&self) {
        if let Some(last) = self.last_send {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                let wait = self.interval - elapsed;
                debug!("Pacing: waiting {:?} before next send", wait);
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error_code: Option<u16>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

/// Telegram Bot API `sendMessage`.
pub struct TelegramTransport {
    client: Client,
    base_url: String,
}

impl TelegramTransport {
    pub fn new(client: Client, bot_token: &str) -> Self {
        Self::with_base_url(client, TELEGRAM_API, bot_token)
    }

    pub fn with_base_url(client: Client, api: &str, bot_token: &str) -> Self {
        Self {
            client,
            base_url: format!("{}/bot{}", api.trim_end_matches('/'), bot_token),
        }
    }

    /// Inbound side of the same bot.
    pub fn inbox(&self) -> TelegramInbox {
        TelegramInbox {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            offset: None,
        }
    }
}

/// Map an HTTP status and Bot API body onto a publish failure kind.
fn classify(status: StatusCode, body: Option<ApiResponse>) -> PublishError {
    let code = body
        .as_ref()
        .and_then(|b| b.error_code)
        .unwrap_or_else(|| status.as_u16());
    let description = body
        .as_ref()
        .and_then(|b| b.description.clone())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());

    match code {
        429 => PublishError::RateLimited {
            retry_after: body.and_then(|b| b.parameters).and_then(|p| p.retry_after),
        },
        401 | 403 => PublishError::Unauthorized(description),
        500..=599 => PublishError::Network(format!("server error {}: {}", code, description)),
        _ => PublishError::Rejected { status: code, description },
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send(&self, channel: &str, text: &str, options: SendOptions) -> Result<(), PublishError> {
        let payload = json!({
            "chat_id": channel,
            "text": text,
            "disable_web_page_preview": options.disable_link_preview,
        });

        let response = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PublishError::Network(e.without_url().to_string()))?;

        let status = response.status();
        let body = response.json::<ApiResponse>().await.ok();

        match body {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            body => Err(classify(status, body)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
}

/// Telegram Bot API `getUpdates`, short-polled.
///
/// Each call confirms the updates returned by the previous one.
pub struct TelegramInbox {
    client: Client,
    base_url: String,
    offset: Option<i64>,
}

#[async_trait]
impl Inbox for TelegramInbox {
    async fn receive(&mut self) -> Result<Vec<ChatMessage>, PublishError> {
        let mut payload = json!({
            "timeout": 0,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = self.offset {
            payload["offset"] = json!(offset);
        }

        let response = self
            .client
            .post(format!("{}/getUpdates", self.base_url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| PublishError::Network(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| PublishError::Network(e.without_url().to_string()))?;

        let updates = match serde_json::from_slice::<UpdatesResponse>(&body) {
            Ok(UpdatesResponse { ok: true, result }) if status.is_success() => result,
            _ => return Err(classify(status, serde_json::from_slice::<ApiResponse>(&body).ok())),
        };

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset = Some(last + 1);
        }

        let messages: Vec<ChatMessage> = updates
            .into_iter()
            .filter_map(|update| {
                let message = update.message?;
                Some(ChatMessage {
                    chat: message.chat.id.to_string(),
                    text: message.text?,
                })
            })
            .collect();

        if !messages.is_empty() {
            debug!("Received {} chat messages", messages.len());
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item() -> Item {
        Item::new(
            "У Мукачеві модернізували лікарню",
            "https://mukachevo.net/news/3",
            "Mukachevo.net",
        )
    }

    #[test]
    fn test_format_message_template() {
        let text = format_message(&item(), "#Закарпаття #новини");
        assert_eq!(
            text,
            "📰 У Мукачеві модернізували лікарню\n\nДжерело: Mukachevo.net\nhttps://mukachevo.net/news/3\n\n#Закарпаття #новини"
        );
    }

    #[test]
    fn test_format_message_without_hashtags() {
        let text = format_message(&item(), "  ");
        assert!(text.ends_with("https://mukachevo.net/news/3"));
    }

    fn body(json: serde_json::Value) -> Option<ApiResponse> {
        Some(serde_json::from_value(json).unwrap())
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify(
            StatusCode::TOO_MANY_REQUESTS,
            body(json!({"ok": false, "error_code": 429, "description": "Too Many Requests", "parameters": {"retry_after": 17}})),
        );
        assert_eq!(err, PublishError::RateLimited { retry_after: Some(17) });
        assert!(err.is_transient());
    }

    #[test]
    fn test_classify_authorization_and_rejection() {
        let err = classify(
            StatusCode::UNAUTHORIZED,
            body(json!({"ok": false, "error_code": 401, "description": "Unauthorized"})),
        );
        assert_eq!(err, PublishError::Unauthorized("Unauthorized".to_string()));
        assert!(!err.is_transient());

        let err = classify(
            StatusCode::BAD_REQUEST,
            body(json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"})),
        );
        assert_eq!(
            err,
            PublishError::Rejected {
                status: 400,
                description: "Bad Request: chat not found".to_string()
            }
        );
    }

    #[test]
    fn test_classify_without_body() {
        assert!(matches!(classify(StatusCode::BAD_GATEWAY, None), PublishError::Network(_)));
        assert!(matches!(classify(StatusCode::FORBIDDEN, None), PublishError::Unauthorized(_)));
    }
}
