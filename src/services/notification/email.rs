//! SMTP delivery of the "credits replenished" email.
//!
//! Sends multipart HTML + plain text via the lettre crate. Transient SMTP
//! rejections surface as retryable rate limiting and go through the bounded
//! backoff policy; everything else fails hard.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{Mailer, SendError};
use crate::config::EmailConfig;
use crate::services::retry::{retry_with_backoff, RetryPolicy};

/// SMTP-backed replenishment mailer
pub struct SmtpMailer {
    config: EmailConfig,
    retry: RetryPolicy,
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            retry: RetryPolicy::default(),
        }
    }

    /// Formats the replenishment notice as HTML email body
    fn format_html(total_limit: i64, storefront_url: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background-color: #f3f4f6;">
    <div style="max-width: 600px; margin: 0 auto; background-color: #ffffff; border-radius: 8px; overflow: hidden; box-shadow: 0 1px 3px rgba(0,0,0,0.1);">
        <div style="background-color: #16a34a; padding: 16px 24px;">
            <h1 style="color: #ffffff; margin: 0; font-size: 18px; font-weight: 600;">
                Your design credits are back
            </h1>
        </div>
        <div style="padding: 24px;">
            <p style="margin: 0 0 16px 0; font-size: 14px; color: #374151; line-height: 1.5;">
                You used up your free design credits earlier. Good news: your
                balance has been topped back up to {total_limit} credits, on the house.
            </p>
            <p style="margin: 0 0 24px 0; font-size: 14px; color: #374151; line-height: 1.5;">
                Upload a new photo and keep creating.
            </p>
            <div>
                <a href="{storefront_url}" style="display: inline-block; background-color: #2563eb; color: #ffffff; padding: 10px 20px; border-radius: 6px; text-decoration: none; font-size: 14px; font-weight: 500;">
                    Start a new design
                </a>
            </div>
        </div>
        <div style="padding: 16px 24px; background-color: #f9fafb; border-top: 1px solid #e5e7eb;">
            <p style="margin: 0; font-size: 12px; color: #6b7280;">
                You are receiving this because you created designs in our studio.
            </p>
        </div>
    </div>
</body>
</html>"#,
            total_limit = total_limit,
            storefront_url = storefront_url,
        )
    }

    /// Formats the replenishment notice as plain text email body
    fn format_text(total_limit: i64, storefront_url: &str) -> String {
        format!(
            r#"Your design credits are back

You used up your free design credits earlier. Good news: your balance
has been topped back up to {total_limit} credits, on the house.

Start a new design: {storefront_url}

--
You are receiving this because you created designs in our studio."#,
            total_limit = total_limit,
            storefront_url = storefront_url,
        )
    }

    async fn send_once(&self, to: &str, total_limit: i64) -> Result<String, SendError> {
        let smtp_host = self
            .config
            .smtp_host
            .as_deref()
            .ok_or_else(|| SendError::Failed("SMTP host not configured".to_string()))?;

        let from = self
            .config
            .from_address
            .parse()
            .map_err(|e| SendError::Failed(format!("Invalid from address: {}", e)))?;
        let to_addr = to
            .parse()
            .map_err(|e| SendError::Failed(format!("Invalid recipient {}: {}", to, e)))?;

        let html_body = Self::format_html(total_limit, &self.config.storefront_url);
        let text_body = Self::format_text(total_limit, &self.config.storefront_url);

        let email = Message::builder()
            .from(from)
            .to(to_addr)
            .subject("Your design credits have been replenished")
            .multipart(
                lettre::message::MultiPart::alternative()
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        lettre::message::SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )
            .map_err(|e| SendError::Failed(format!("Failed to build email: {}", e)))?;

        // Port 465 = implicit TLS (SMTPS), anything else = STARTTLS
        let mailer = if self.config.smtp_port == 465 {
            let tls_params = lettre::transport::smtp::client::TlsParameters::new(
                smtp_host.to_string(),
            )
            .map_err(|e| SendError::Failed(format!("Invalid TLS parameters: {}", e)))?;

            AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
                .map(|b| {
                    b.port(self.config.smtp_port)
                        .tls(lettre::transport::smtp::client::Tls::Wrapper(tls_params))
                })
                .map_err(|e| SendError::Failed(format!("Invalid SMTP host: {}", e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)
                .map(|b| b.port(self.config.smtp_port))
                .map_err(|e| SendError::Failed(format!("Invalid SMTP host: {}", e)))?
        };

        let mailer = if let (Some(username), Some(password)) = (
            self.config.smtp_username.as_ref(),
            self.config.smtp_password.as_ref(),
        ) {
            mailer
                .credentials(Credentials::new(username.clone(), password.clone()))
                .build()
        } else {
            mailer.build()
        };

        match mailer.send(email).await {
            Ok(response) => Ok(response
                .first_word()
                .map(|word| word.to_string())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())),
            Err(e) if e.is_transient() => Err(SendError::RateLimited(e.to_string())),
            Err(e) => Err(SendError::Failed(e.to_string())),
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_replenished(&self, to: &str, total_limit: i64) -> Result<String, SendError> {
        retry_with_backoff(
            &self.retry,
            || self.send_once(to, total_limit),
            SendError::is_retryable,
        )
        .await
    }
}
