// src/mailer.rs
use std::time::Duration;

use serde_json::json;
use thiserror::Error;

use crate::config::AppConfig;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum MailError {
    #[error("email service is not configured")]
    NotConfigured,
    #[error("email request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("email API rejected the message with status {0}")]
    Rejected(u16),
}

/// 通过 Resend API 同步发送邮件，失败不重试
#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    sender: Option<String>,
}

impl Mailer {
    pub fn from_config(config: &AppConfig) -> Result<Self, MailError> {
        let client = reqwest::Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: RESEND_ENDPOINT.to_string(),
            api_key: config.resend_api_key.clone(),
            sender: config.reset_email_from.clone(),
        })
    }

    pub async fn send_reset_email(
        &self,
        to_email: &str,
        token: &str,
        base_url: &str,
    ) -> Result<(), MailError> {
        let (Some(api_key), Some(sender)) = (&self.api_key, &self.sender) else {
            return Err(MailError::NotConfigured);
        };

        let link = reset_link(base_url, token);
        let payload = json!({
            "from": sender,
            "to": [to_email],
            "subject": "Reset your Daily Planner Studio password",
            "html": format!(
                "<p>Click the link below to reset your password. This link expires in 2 hours.</p>\
                 <p><a href=\"{link}\">{link}</a></p>"
            ),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::info!("重置密码邮件已发送");
            Ok(())
        } else {
            Err(MailError::Rejected(status.as_u16()))
        }
    }
}

pub fn reset_link(base_url: &str, token: &str) -> String {
    format!("{}/password-reset/{}", base_url.trim_end_matches('/'), token)
}
