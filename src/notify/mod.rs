//! Notifier implementations

pub mod telegram;

use async_trait::async_trait;
use tracing::info;

use crate::common::traits::Notifier;

pub use telegram::TelegramNotifier;

/// Writes notifications to the log when no chat is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) {
        info!(target: "notifications", "{}", text);
    }
}
