//! The reconciliation poller.
//!
//! Runs on a fixed interval and does two idempotent-safe things per tick: raise an operator
//! notification for every order created since the last tick, and suspend active orders whose
//! service period lapsed without payment. Progress is tracked with a watermark persisted in the
//! store, so a restart re-processes at most one tick's worth of work (notifications are
//! deduplicated and suspensions are CAS-guarded, so re-processing is harmless).
use std::time::Duration;

use chrono::{DateTime, Utc};
use hosting_engine::{
    notifications::{NotificationDispatcher, NotificationEvent},
    traits::{LifecycleDatabase, LifecycleError},
    LifecycleApi,
    SqliteDatabase,
};
use log::*;
use tokio::task::JoinHandle;

pub const WATERMARK_NAME: &str = "reconciliation";

#[derive(Debug, Default, Clone, Copy)]
pub struct TickSummary {
    pub new_orders: usize,
    pub suspended: usize,
}

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_reconciliation_worker(
    db: SqliteDatabase,
    dispatcher: NotificationDispatcher,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let api = LifecycleApi::new(db, dispatcher);
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Reconciliation worker started (every {}s)", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running reconciliation tick");
            match run_reconciliation_tick(&api).await {
                Ok(summary) => {
                    if summary.new_orders > 0 || summary.suspended > 0 {
                        info!(
                            "🕰️ Reconciliation tick done. {} new order(s), {} suspension(s)",
                            summary.new_orders, summary.suspended
                        );
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running reconciliation tick: {e}");
                },
            }
        }
    })
}

/// One poller pass. Reads the persisted watermark, processes both triggers, and only advances the
/// watermark after everything succeeded; a failure leaves it unchanged so the next tick retries.
pub async fn run_reconciliation_tick<B: LifecycleDatabase>(
    api: &LifecycleApi<B>,
) -> Result<TickSummary, LifecycleError> {
    let db = api.db();
    let since = db.fetch_watermark(WATERMARK_NAME).await?.unwrap_or(DateTime::<Utc>::MIN_UTC);
    let now = Utc::now();

    let created = db.orders_created_after(since).await?;
    for order in &created {
        debug!("🕰️ New order [{}] spotted since last tick", order.order_id);
        api.dispatcher().notify(NotificationEvent::OrderCreated { order: order.clone() }).await;
    }

    let mut suspended = 0;
    for order in db.expired_unpaid_orders(now).await? {
        match api.suspend_order(&order.order_id, "Service period lapsed without payment").await {
            Ok(_) => suspended += 1,
            // Someone else already moved the order on. Both are fine.
            Err(LifecycleError::Conflict { .. }) | Err(LifecycleError::InvalidTransition { .. }) => {
                debug!("🕰️ Order [{}] was modified concurrently. Skipping.", order.order_id);
            },
            Err(e) => return Err(e),
        }
    }

    db.store_watermark(WATERMARK_NAME, now).await?;
    Ok(TickSummary { new_orders: created.len(), suspended })
}

#[cfg(test)]
mod test {
    use chrono::Duration as ChronoDuration;
    use hosting_engine::{
        db_types::{BillingPeriod, NewOrder, OrderId, PlanType, ServiceStatus},
        notifications::{InAppChannel, NotificationDispatcher},
        test_utils::{prepare_env, MemoryDatabase},
        traits::LifecycleDatabase,
        LifecycleApi,
    };
    use hpg_common::MinorUnits;

    use super::*;

    fn sample_order(id: &str) -> NewOrder {
        NewOrder {
            order_id: OrderId(id.to_string()),
            customer_name: "Ada Hosting Ltd".to_string(),
            customer_email: "ada@example.com".to_string(),
            customer_phone: None,
            customer_company: None,
            customer_address: None,
            plan_type: PlanType::Standard,
            billing_period: BillingPeriod::Monthly,
            price: MinorUnits::from(1999),
            currency: "EUR".to_string(),
            domain: format!("{id}.example.com"),
            start_date: Utc::now(),
            end_date: Utc::now() + ChronoDuration::days(30),
        }
    }

    fn api(db: &MemoryDatabase) -> LifecycleApi<MemoryDatabase> {
        let mut dispatcher = NotificationDispatcher::new();
        dispatcher.add_channel(InAppChannel::new(db.clone()));
        LifecycleApi::new(db.clone(), dispatcher)
    }

    #[tokio::test]
    async fn a_tick_notifies_new_orders_and_advances_the_watermark() {
        prepare_env();
        let db = MemoryDatabase::new();
        let api = api(&db);
        db.insert_order(sample_order("r1")).await.unwrap();
        db.insert_order(sample_order("r2")).await.unwrap();

        let summary = run_reconciliation_tick(&api).await.unwrap();
        assert_eq!(summary.new_orders, 2);
        assert_eq!(summary.suspended, 0);
        assert!(db.fetch_watermark(WATERMARK_NAME).await.unwrap().is_some());

        // A second tick sees nothing new and does not duplicate the notifications.
        let summary = run_reconciliation_tick(&api).await.unwrap();
        assert_eq!(summary.new_orders, 0);
        let kinds = db.fetch_notifications(true).await.unwrap();
        assert_eq!(kinds.iter().filter(|n| n.kind == "order_created").count(), 2);
    }

    #[tokio::test]
    async fn expired_unpaid_orders_are_suspended_exactly_once() {
        prepare_env();
        let db = MemoryDatabase::new();
        let api = api(&db);
        let (order, _) = db.insert_order(sample_order("r3")).await.unwrap();
        api.approve_order(&order.order_id).await.unwrap();
        db.force_end_date(&order.order_id, Utc::now() - ChronoDuration::days(1));

        let summary = run_reconciliation_tick(&api).await.unwrap();
        assert_eq!(summary.suspended, 1);
        let current = db.fetch_order(&order.order_id).await.unwrap().unwrap();
        assert_eq!(current.status, ServiceStatus::Suspended);

        // Racing re-run: the order is no longer Active, so the suspend is a logged no-op.
        let summary = run_reconciliation_tick(&api).await.unwrap();
        assert_eq!(summary.suspended, 0);
    }

    #[tokio::test]
    async fn paid_orders_are_not_suspended() {
        prepare_env();
        let db = MemoryDatabase::new();
        let api = api(&db);
        let (order, _) = db.insert_order(sample_order("r4")).await.unwrap();
        api.approve_order(&order.order_id).await.unwrap();
        db.force_end_date(&order.order_id, Utc::now() - ChronoDuration::days(1));
        api.mark_order_paid(&order.order_id, hosting_engine::traits::PaymentFacts {
            amount: MinorUnits::from(1999),
            method: "bank_transfer".to_string(),
            reference: "ref-1".to_string(),
            paid_at: Utc::now(),
        })
        .await
        .unwrap();

        let summary = run_reconciliation_tick(&api).await.unwrap();
        assert_eq!(summary.suspended, 0);
        let current = db.fetch_order(&order.order_id).await.unwrap().unwrap();
        assert_eq!(current.status, ServiceStatus::Active);
    }
}
