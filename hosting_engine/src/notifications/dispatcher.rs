use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use thiserror::Error;

use crate::notifications::NotificationEvent;

#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("Delivery failed: {0}")]
    Delivery(String),
}

pub type ChannelFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + 'a>>;

/// A delivery mechanism for notification events. Implementations must be cheap to call and must
/// not assume they are the only channel receiving the event.
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;

    fn deliver<'a>(&'a self, event: &'a NotificationEvent) -> ChannelFuture<'a>;
}

/// Fans an event out to every registered channel, sequentially and best-effort. A channel failure
/// is logged under the channel's name and the remaining channels still receive the event.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_channel<C: NotificationChannel + 'static>(&mut self, channel: C) -> &mut Self {
        self.channels.push(Arc::new(channel));
        self
    }

    pub async fn notify(&self, event: NotificationEvent) {
        trace!("🔔️ Dispatching {} to {} channel(s)", event.kind(), self.channels.len());
        for channel in &self.channels {
            if let Err(e) = channel.deliver(&event).await {
                warn!("🔔️ Channel '{}' failed to deliver a {} notification: {e}", channel.name(), event.kind());
            }
        }
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = self.channels.iter().map(|c| c.name()).collect::<Vec<_>>();
        write!(f, "NotificationDispatcher({})", names.join(", "))
    }
}
