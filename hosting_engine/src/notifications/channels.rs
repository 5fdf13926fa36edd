use log::*;

use crate::{
    db_types::NewNotification,
    notifications::{ChannelError, ChannelFuture, NotificationChannel, NotificationEvent},
    traits::LifecycleDatabase,
};

/// Persists events as rows in the operator's in-app notification feed. The store deduplicates on
/// (kind, order id) while an unread copy exists, so a flapping order does not flood the feed.
pub struct InAppChannel<B> {
    db: B,
}

impl<B> InAppChannel<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> NotificationChannel for InAppChannel<B>
where B: LifecycleDatabase + Send + Sync
{
    fn name(&self) -> &str {
        "in_app"
    }

    fn deliver<'a>(&'a self, event: &'a NotificationEvent) -> ChannelFuture<'a> {
        Box::pin(async move {
            let notification = NewNotification {
                kind: event.kind().to_string(),
                title: event.title(),
                message: event.message(),
                severity: event.severity(),
                order_id: event.order_id().cloned(),
            };
            self.db
                .insert_notification(notification)
                .await
                .map(|n| trace!("🔔️ In-app notification #{} stored", n.id))
                .map_err(|e| ChannelError::Delivery(e.to_string()))
        })
    }
}

/// Writes every event to the application log. Stands in for outbound mail in deployments where no
/// mail transport is configured.
#[derive(Debug, Clone, Default)]
pub struct LogChannel;

impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver<'a>(&'a self, event: &'a NotificationEvent) -> ChannelFuture<'a> {
        Box::pin(async move {
            info!("🔔️ [{:?}] {}: {}", event.audience(), event.title(), event.message());
            Ok(())
        })
    }
}
