use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::Settings;
use crate::services::report::Report;

/// Out-of-band delivery for finished reports.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, report: &Report) -> Result<()>;
}

/// Posts reports to a mail relay / chat webhook as JSON.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
    recipient: Option<String>,
    sender: Option<String>,
}

#[derive(Serialize)]
struct WebhookMessage<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a str>,
    subject: &'a str,
    text: &'a str,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String, recipient: Option<String>, sender: Option<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
            recipient,
            sender,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, report: &Report) -> Result<()> {
        tracing::info!("Sending report (subject: {})...", report.subject);

        let message = WebhookMessage {
            to: self.recipient.as_deref(),
            from: self.sender.as_deref(),
            subject: &report.subject,
            text: &report.body,
        };

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Notification webhook HTTP {}: {}", status, body));
        }

        tracing::info!("Report sent: {}", report.subject);
        Ok(())
    }
}

/// Writes reports to the log instead of delivering them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, report: &Report) -> Result<()> {
        tracing::info!("{}\n{}", report.subject, report.body);
        Ok(())
    }
}

pub fn notifier_from_settings(settings: &Settings) -> Box<dyn Notifier> {
    match &settings.notify_webhook_url {
        Some(url) => {
            tracing::info!("Webhook notifications enabled");
            Box::new(WebhookNotifier::new(
                url.clone(),
                settings.email_recipient.clone(),
                settings.email_sender.clone(),
            ))
        }
        None => {
            tracing::warn!("NOTIFY_WEBHOOK_URL not set; reports will only be logged");
            Box::new(LogNotifier)
        }
    }
}

/// Send each report, logging failures without aborting the rest.
pub async fn deliver_all(notifier: &dyn Notifier, reports: &[Report]) -> usize {
    let mut delivered = 0;
    for report in reports {
        match notifier.send(report).await {
            Ok(()) => delivered += 1,
            Err(e) => tracing::error!("Failed to send '{}': {}", report.subject, e),
        }
    }
    delivered
}
