pub mod sendgrid;
pub mod twilio;

use async_trait::async_trait;

use crate::state::AppState;

#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Best-effort SMS. Failures are logged and reported as `false`, never propagated.
pub async fn send_sms(state: &AppState, to: &str, body: &str) -> bool {
    let Some(provider) = state.messaging.as_deref() else {
        tracing::warn!("SMS provider not configured, skipping message");
        return false;
    };
    if to.trim().is_empty() {
        tracing::warn!("no phone number on record, skipping SMS");
        return false;
    }
    match provider.send_message(to, body).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, to, "failed to send SMS");
            false
        }
    }
}

/// Best-effort email, same contract as [`send_sms`].
pub async fn send_email(state: &AppState, to: &str, subject: &str, body: &str) -> bool {
    let Some(provider) = state.email.as_deref() else {
        tracing::warn!("email provider not configured, skipping message");
        return false;
    };
    if to.trim().is_empty() {
        tracing::warn!("no email address on record, skipping email");
        return false;
    }
    match provider.send_email(to, subject, body).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, to, subject, "failed to send email");
            false
        }
    }
}
