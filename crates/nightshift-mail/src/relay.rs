//! HTTP mail-relay client.
//!
//! Speaks the common transactional-mail shape: `POST {base}/emails` with a
//! bearer token and a JSON body of `from`, `to`, `subject`, `text`, `html`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum MailError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("mail relay returned {status}: {body}")]
    Relay { status: u16, body: String },
}

/// One message to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMail {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: Option<String>,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
}

#[derive(Deserialize)]
struct SendResponse {
    id: Option<String>,
}

/// Client for a transactional mail relay.
#[derive(Clone)]
pub struct MailClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
}

impl MailClient {
    /// Create a client for the relay at `base_url` (no trailing slash needed),
    /// sending as `from`.
    pub fn new(base_url: String, api_key: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            from,
        }
    }

    pub fn from_address(&self) -> &str {
        &self.from
    }

    /// Send one message. Returns the relay's message id when it reports one.
    pub async fn send(&self, mail: &OutboundMail) -> Result<Option<String>, MailError> {
        let url = format!("{}/emails", self.base_url);
        let body = SendRequest {
            from: &self.from,
            to: [mail.to.as_str()],
            subject: &mail.subject,
            text: &mail.text,
            html: mail.html.as_deref(),
        };

        info!(url = %url, to = %mail.to, "sending mail");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_else(|e| {
                warn!(status = status.as_u16(), error = %e, "could not read relay error body");
                String::new()
            });
            return Err(MailError::Relay {
                status: status.as_u16(),
                body,
            });
        }

        // Relays differ in what they return; an unparseable body after a 2xx
        // still means the message was accepted.
        let text = resp.text().await.unwrap_or_else(|e| {
            warn!(to = %mail.to, error = %e, "could not read relay response body");
            String::new()
        });
        let id = serde_json::from_str::<SendResponse>(&text)
            .ok()
            .and_then(|r| r.id);
        info!(to = %mail.to, id = id.as_deref().unwrap_or("-"), "mail accepted");
        Ok(id)
    }
}
