//! Mailbox access — listing unread items, reading thread context, staging
//! draft replies, and the per-message idempotency marker.
//!
//! The worker depends only on the [`MailboxClient`] trait; the concrete
//! implementation speaks the Gmail REST API. OAuth token refresh is outside
//! this crate — the client holds a bearer token from configuration.
//! Drafts are staged for human review, never sent.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::error::MailboxError;

// ── Types ───────────────────────────────────────────────────────────

/// Reference to an unread mailbox item.
#[derive(Debug, Clone)]
pub struct MessageRef {
    pub id: String,
}

/// Full content of one inbound mailbox item.
#[derive(Debug, Clone)]
pub struct InboundEmail {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub sender: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
}

/// One prior message in a thread, oldest-first.
#[derive(Debug, Clone)]
pub struct ThreadSnippet {
    pub id: String,
    pub snippet: String,
}

// ── Client trait ────────────────────────────────────────────────────

/// Mailbox capability consumed by the ingestion worker.
#[async_trait]
pub trait MailboxClient: Send + Sync {
    /// List unread inbox items, bounded batch.
    async fn list_unread(&self, max_results: u32) -> Result<Vec<MessageRef>, MailboxError>;

    /// Fetch one item's full content.
    async fn get_message(&self, id: &str) -> Result<InboundEmail, MailboxError>;

    /// Fetch all messages in a thread, oldest first.
    async fn get_thread(&self, thread_id: &str) -> Result<Vec<ThreadSnippet>, MailboxError>;

    /// Stage a draft reply. Never sends.
    async fn create_draft(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), MailboxError>;

    /// Set the idempotency marker for a handled item. Idempotent: calling
    /// twice for one id has no additional visible effect.
    async fn mark_processed(&self, id: &str) -> Result<(), MailboxError>;
}

/// Reply subject for a draft: prefix "Re: " unless already a reply.
pub fn reply_subject(subject: &str) -> String {
    if subject.to_lowercase().starts_with("re:") {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

// ── Gmail implementation ────────────────────────────────────────────

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Gmail REST mailbox. The UNREAD label doubles as the processed marker:
/// removing it is the mailbox-side idempotency flag.
pub struct GmailMailbox {
    http: reqwest::Client,
    token: SecretString,
    base_url: String,
}

impl GmailMailbox {
    pub fn new(token: SecretString) -> Self {
        Self::with_base_url(token, GMAIL_BASE)
    }

    pub fn with_base_url(token: SecretString, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, MailboxError> {
        let response = self
            .http
            .get(format!("{}/{path}", self.base_url))
            .query(query)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(|e| MailboxError::RequestFailed(e.to_string()))?;
        Self::decode(response).await
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, MailboxError> {
        let response = self
            .http
            .post(format!("{}/{path}", self.base_url))
            .bearer_auth(self.token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| MailboxError::RequestFailed(e.to_string()))?;
        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, MailboxError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailboxError::Status {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| MailboxError::MalformedPayload(e.to_string()))
    }
}

#[async_trait]
impl MailboxClient for GmailMailbox {
    async fn list_unread(&self, max_results: u32) -> Result<Vec<MessageRef>, MailboxError> {
        let max = max_results.to_string();
        let body: WireMessageList = self
            .get_json(
                "messages",
                &[("q", "is:unread in:inbox"), ("maxResults", max.as_str())],
            )
            .await?;
        Ok(body
            .messages
            .into_iter()
            .map(|m| MessageRef { id: m.id })
            .collect())
    }

    async fn get_message(&self, id: &str) -> Result<InboundEmail, MailboxError> {
        let path = format!("messages/{id}");
        let message: WireMessage = self.get_json(&path, &[("format", "full")]).await?;

        let headers = &message.payload.headers;
        let header = |name: &str| {
            headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.clone())
        };

        Ok(InboundEmail {
            id: id.to_string(),
            thread_id: message.thread_id,
            subject: header("Subject").unwrap_or_else(|| "No Subject".into()),
            sender: header("From").unwrap_or_else(|| "Unknown".into()),
            body: extract_body(&message.payload),
            received_at: parse_internal_date(message.internal_date.as_deref()),
        })
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Vec<ThreadSnippet>, MailboxError> {
        let path = format!("threads/{thread_id}");
        let thread: WireThread = self.get_json(&path, &[]).await?;
        // Gmail returns thread messages oldest first already.
        Ok(thread
            .messages
            .into_iter()
            .map(|m| ThreadSnippet {
                id: m.id,
                snippet: m.snippet.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_draft(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), MailboxError> {
        let mime = format!(
            "To: {to}\r\nSubject: {subject}\r\n\
             Content-Type: text/html; charset=utf-8\r\n\r\n{html_body}"
        );
        let raw = URL_SAFE.encode(mime.as_bytes());
        let draft: WireDraft = self
            .post_json("drafts", &json!({"message": {"raw": raw}}))
            .await?;
        tracing::info!(draft = %draft.id, to = %to, "Draft staged");
        Ok(())
    }

    async fn mark_processed(&self, id: &str) -> Result<(), MailboxError> {
        let path = format!("messages/{id}/modify");
        let _: serde_json::Value = self
            .post_json(&path, &json!({"removeLabelIds": ["UNREAD"]}))
            .await?;
        Ok(())
    }
}

/// Plain-text body from a message payload: first text/plain part, else the
/// top-level body.
fn extract_body(payload: &WirePayload) -> String {
    if let Some(parts) = &payload.parts {
        for part in parts {
            if part.mime_type.as_deref() == Some("text/plain")
                && let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref())
            {
                return decode_base64url(data);
            }
        }
    }
    payload
        .body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .map(decode_base64url)
        .unwrap_or_default()
}

fn decode_base64url(data: &str) -> String {
    let bytes = URL_SAFE
        .decode(data)
        .or_else(|_| URL_SAFE_NO_PAD.decode(data))
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Receive time from the wire's epoch-millisecond string; now on absence.
fn parse_internal_date(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| s.parse::<i64>().ok())
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

// ── Gmail wire shapes ───────────────────────────────────────────────

#[derive(Deserialize)]
struct WireMessageList {
    #[serde(default)]
    messages: Vec<WireMessageRef>,
}

#[derive(Deserialize)]
struct WireMessageRef {
    id: String,
}

#[derive(Deserialize)]
struct WireMessage {
    #[serde(rename = "threadId")]
    thread_id: String,
    /// Epoch milliseconds, as a string on the wire.
    #[serde(rename = "internalDate")]
    internal_date: Option<String>,
    payload: WirePayload,
}

#[derive(Deserialize)]
struct WirePayload {
    #[serde(default)]
    headers: Vec<WireHeader>,
    #[serde(rename = "mimeType")]
    mime_type: Option<String>,
    body: Option<WireBody>,
    parts: Option<Vec<WirePayload>>,
}

#[derive(Deserialize)]
struct WireHeader {
    name: String,
    value: String,
}

#[derive(Deserialize)]
struct WireBody {
    data: Option<String>,
}

#[derive(Deserialize)]
struct WireThread {
    #[serde(default)]
    messages: Vec<WireThreadMessage>,
}

#[derive(Deserialize)]
struct WireThreadMessage {
    id: String,
    snippet: Option<String>,
}

#[derive(Deserialize)]
struct WireDraft {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_subject_prefixes_once() {
        assert_eq!(reply_subject("Order #1001 status"), "Re: Order #1001 status");
        assert_eq!(reply_subject("Re: Order #1001 status"), "Re: Order #1001 status");
        assert_eq!(reply_subject("RE: hello"), "RE: hello");
    }

    #[test]
    fn body_prefers_text_plain_part() {
        let payload: WirePayload = serde_json::from_value(serde_json::json!({
            "mimeType": "multipart/alternative",
            "headers": [],
            "parts": [
                {"mimeType": "text/html", "body": {"data": URL_SAFE.encode("<b>html</b>")}},
                {"mimeType": "text/plain", "body": {"data": URL_SAFE.encode("plain text")}}
            ]
        }))
        .unwrap();
        assert_eq!(extract_body(&payload), "plain text");
    }

    #[test]
    fn body_falls_back_to_top_level() {
        let payload: WirePayload = serde_json::from_value(serde_json::json!({
            "mimeType": "text/plain",
            "headers": [],
            "body": {"data": URL_SAFE.encode("top level body")}
        }))
        .unwrap();
        assert_eq!(extract_body(&payload), "top level body");
    }

    #[test]
    fn missing_body_decodes_to_empty() {
        let payload: WirePayload = serde_json::from_value(serde_json::json!({
            "mimeType": "text/plain",
            "headers": []
        }))
        .unwrap();
        assert_eq!(extract_body(&payload), "");
    }

    #[test]
    fn base64url_decodes_with_or_without_padding() {
        let padded = URL_SAFE.encode("hi!");
        let unpadded = URL_SAFE_NO_PAD.encode("hi!");
        assert_eq!(decode_base64url(&padded), "hi!");
        assert_eq!(decode_base64url(&unpadded), "hi!");
        assert_eq!(decode_base64url("%%%not-base64%%%"), "");
    }

    #[test]
    fn internal_date_parses_epoch_millis() {
        let parsed = parse_internal_date(Some("1700000000000"));
        assert_eq!(parsed.timestamp(), 1_700_000_000);
        // Garbage and absence both fall back to "now" rather than failing.
        assert!(parse_internal_date(Some("not-a-number")) <= Utc::now());
        assert!(parse_internal_date(None) <= Utc::now());
    }

    #[test]
    fn message_list_tolerates_empty_inbox() {
        let body: WireMessageList = serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(body.messages.is_empty());
    }
}
