/// Outbound email
///
/// [`EmailTransport`] is the seam: the API holds an optional
/// `Arc<dyn EmailTransport>` and skips sending when none is configured.
/// [`HttpEmailTransport`] posts JSON to a transactional email provider;
/// [`MemoryTransport`] records messages for tests.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::Mutex;

/// Error type for sending email
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Email is not configured")]
    NotConfigured,

    #[error("Email transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Email provider rejected message ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// A plain-text message
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Provider settings
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Serialize)]
struct ProviderRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

/// Sends through an HTTP email API with a bearer key
#[derive(Debug, Clone)]
pub struct HttpEmailTransport {
    client: reqwest::Client,
    config: MailerConfig,
}

impl HttpEmailTransport {
    pub fn new(config: MailerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let body = ProviderRequest {
            from: &self.config.from,
            to: [&email.to],
            subject: &email.subject,
            text: &email.body,
        };

        let resp = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), to = %email.to, "Email provider rejected message");
            return Err(MailError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        tracing::info!(to = %email.to, subject = %email.subject, "Email sent");
        Ok(())
    }
}

/// Keeps every message in memory
#[derive(Debug, Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<Email>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl EmailTransport for MemoryTransport {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        self.sent.lock().await.push(email.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_memory_transport_records() {
        let transport = Arc::new(MemoryTransport::new());
        let dyn_transport: Arc<dyn EmailTransport> = transport.clone();

        let email = Email {
            to: "owner@example.com".to_string(),
            subject: "Invoice INV-00003".to_string(),
            body: "Total due: $1,250.00".to_string(),
        };
        dyn_transport.send(&email).await.unwrap();

        assert_eq!(transport.sent().await, vec![email]);
    }

    #[test]
    fn test_provider_request_shape() {
        let body = ProviderRequest {
            from: "billing@sitebook.dev",
            to: ["client@example.com"],
            subject: "Hello",
            text: "Body",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["to"][0], "client@example.com");
        assert_eq!(json["text"], "Body");
    }

    #[tokio::test]
    async fn test_http_transport_reports_connection_errors() {
        let transport = HttpEmailTransport::new(MailerConfig {
            api_url: "http://127.0.0.1:1/send".to_string(),
            api_key: "key".to_string(),
            from: "billing@sitebook.dev".to_string(),
        });
        let email = Email {
            to: "client@example.com".to_string(),
            subject: "s".to_string(),
            body: "b".to_string(),
        };

        assert!(matches!(transport.send(&email).await, Err(MailError::Transport(_))));
    }
}
