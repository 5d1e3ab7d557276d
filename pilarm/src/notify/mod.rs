//! Alert delivery.
//!
//! [`Notifier`] renders the two alert messages and hands each one to a
//! [`NotificationClient`] on its own task. Dispatch never blocks the caller and
//! is never retried: a failed post is logged and forgotten.

mod slack;
mod template;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use strum::Display;
use tokio_util::task::TaskTracker;

use crate::error::NotifyError;
use crate::tracing::prelude::*;

pub use slack::{DEFAULT_API_URL, SlackClient, SlackConfig};

#[cfg(test)]
pub(crate) use slack::testing as fake_slack;
pub use template::MessageTemplates;

/// Proof that the chat service accepted a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    /// Channel id the message landed in.
    pub channel: String,
    /// Message timestamp assigned by the service.
    pub ts: String,
}

/// Something that can post a line of text to a channel.
#[async_trait]
pub trait NotificationClient: Send + Sync {
    async fn post(&self, channel_id: &str, text: &str) -> Result<DeliveryReceipt, NotifyError>;
}

/// The two alerts a session can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum AlertKind {
    /// Door has been open past the first threshold.
    DoorOpen,
    /// Door has been open past the overtime threshold.
    Overtime,
}

/// Formats alerts and dispatches them without waiting.
#[derive(Clone)]
pub struct Notifier {
    client: Arc<dyn NotificationClient>,
    channel_id: String,
    templates: Arc<MessageTemplates>,
    tracker: TaskTracker,
}

impl Notifier {
    /// `tracker` receives every dispatch task so shutdown can decide how long
    /// to wait for them.
    pub fn new(
        client: Arc<dyn NotificationClient>,
        channel_id: String,
        templates: MessageTemplates,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            client,
            channel_id,
            templates: Arc::new(templates),
            tracker,
        }
    }

    /// Render `kind` now and post it on a background task.
    pub fn dispatch(&self, kind: AlertKind) {
        let text = self.templates.render(kind, &Local::now());
        let client = Arc::clone(&self.client);
        let channel_id = self.channel_id.clone();

        self.tracker.spawn(async move {
            match client.post(&channel_id, &text).await {
                Ok(receipt) => info!(
                    alert = %kind,
                    channel = %receipt.channel,
                    ts = %receipt.ts,
                    "Sent message"
                ),
                Err(e) => error!(alert = %kind, error = %e, "Failed to send message"),
            }
        });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording client for dispatch tests.

    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingClient {
        posts: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingClient {
        pub fn new() -> Self {
            Self::default()
        }

        /// A client whose every post fails, but is still recorded.
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn posts(&self) -> Vec<(String, String)> {
            self.posts.lock().unwrap_or_else(|e| e.into_inner()).clone()
        }
    }

    #[async_trait]
    impl NotificationClient for RecordingClient {
        async fn post(&self, channel_id: &str, text: &str) -> Result<DeliveryReceipt, NotifyError> {
            let mut posts = self.posts.lock().unwrap_or_else(|e| e.into_inner());
            posts.push((channel_id.to_string(), text.to_string()));
            if self.fail {
                return Err(NotifyError::Api {
                    method: "chat.postMessage",
                    code: "ratelimited".to_string(),
                });
            }
            Ok(DeliveryReceipt {
                channel: channel_id.to_string(),
                ts: format!("1700000000.{:06}", posts.len()),
            })
        }
    }
}
