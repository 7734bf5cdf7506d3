use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::limits::{MAX_MESSAGE_LEN, NOTIFY_CHANNEL_CAPACITY};

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("message too long: {0} bytes")]
    TooLong(usize),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Opaque outbound notification channel. Delivery details (mail, chat,
/// webhook) live behind this trait.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// Broadcast hub: every subscriber receives every message.
pub struct NotifyHub {
    sender: broadcast::Sender<String>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTIFY_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Notifier for NotifyHub {
    /// No-op if nobody is listening.
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        if message.len() > MAX_MESSAGE_LEN {
            return Err(NotifyError::TooLong(message.len()));
        }
        let _ = self.sender.send(message.to_string());
        Ok(())
    }
}

/// Writes notifications to the log. Used when no delivery channel is wired.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        tracing::info!(target: "stayd::notify", "{message}");
        Ok(())
    }
}
