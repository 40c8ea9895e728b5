use async_trait::async_trait;
use tracing::info;

use crate::config::SmtpConfig;

/// Outbound email template identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    UserWelcome,
    ActivationToken,
}

impl Template {
    pub fn name(&self) -> &'static str {
        match self {
            Template::UserWelcome => "user_welcome",
            Template::ActivationToken => "token_activation",
        }
    }
}

/// Narrow interface to the delivery mechanism. Handlers hand over a
/// recipient, a template and the dynamic data; rendering and transport are
/// somebody else's problem.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        template: Template,
        data: serde_json::Value,
    ) -> anyhow::Result<()>;
}

/// Records outbound mail in the log instead of delivering it. Used in
/// development and as the default until an SMTP transport is wired in.
pub struct LogMailer {
    sender: String,
}

impl LogMailer {
    pub fn new(smtp: &SmtpConfig) -> Self {
        Self {
            sender: smtp.sender.clone(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(
        &self,
        recipient: &str,
        template: Template,
        data: serde_json::Value,
    ) -> anyhow::Result<()> {
        info!(
            recipient,
            sender = %self.sender,
            template = template.name(),
            data = %data,
            "email dispatched"
        );
        Ok(())
    }
}
