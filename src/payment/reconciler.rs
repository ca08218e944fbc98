use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use chrono::Utc;
use diesel::prelude::*;

use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::order::{Order, OrderStatus};
use crate::payment::gateway::{GatewayError, PaymentGateway};
use crate::schema::orders;

/// How far back a cycle looks for unresolved orders.
const LOOKBACK_HOURS: i64 = 24;
/// Upper bound on orders handled per cycle.
const CYCLE_CAP: i64 = 100;
/// Escalating pause between consecutive provider calls; the last value
/// repeats for every further order.
const PAUSE_SECS: [u64; 4] = [1, 3, 5, 10];

fn pause_before(order_index: usize) -> Duration {
    let idx = order_index.min(PAUSE_SECS.len() - 1);
    Duration::from_secs(PAUSE_SECS[idx])
}

/// Prevents overlapping reconciliation cycles. A cycle that finds the guard
/// taken is skipped entirely.
#[derive(Debug, Default)]
pub struct CycleGuard(AtomicBool);

impl CycleGuard {
    pub fn try_acquire(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn release(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Timer-driven safety net for missed payment webhooks: periodically re-polls
/// the provider for orders stuck in a pre-payment status and corrects them.
pub struct Reconciler {
    pool: DbPool,
    gateway: PaymentGateway,
    interval: Duration,
    guard: CycleGuard,
}

impl Reconciler {
    pub fn new(pool: DbPool, gateway: PaymentGateway, interval: Duration) -> Reconciler {
        Reconciler {
            pool,
            gateway,
            interval,
            guard: CycleGuard::default(),
        }
    }

    /// Runs forever; intended to be spawned once at startup.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let this = Arc::clone(&self);
            actix_web::rt::spawn(async move {
                if !this.guard.try_acquire() {
                    log::debug!("previous reconciliation cycle still running, skipping");
                    return;
                }
                if let Err(e) = this.run_cycle().await {
                    log::error!("reconciliation cycle failed: {}", e);
                }
                this.guard.release();
            });
        }
    }

    async fn run_cycle(&self) -> Result<(), AppError> {
        let pool = self.pool.clone();
        let stuck = web::block(move || {
            let mut conn = pool.get()?;
            let cutoff = Utc::now() - chrono::Duration::hours(LOOKBACK_HOURS);

            orders::table
                .filter(orders::status.eq_any([
                    OrderStatus::Pending.as_str(),
                    OrderStatus::ProcessingPayment.as_str(),
                ]))
                .filter(orders::provider_invoice_id.is_not_null())
                .filter(orders::created_at.gt(cutoff))
                .order(orders::created_at.asc())
                .limit(CYCLE_CAP)
                .select(Order::as_select())
                .load(&mut conn)
                .map_err(AppError::from)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

        if stuck.is_empty() {
            return Ok(());
        }
        log::info!("reconciling payment status of {} orders", stuck.len());

        for (i, order) in stuck.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(pause_before(i - 1)).await;
            }
            self.reconcile_order(order).await;
        }

        Ok(())
    }

    async fn reconcile_order(&self, order: &Order) {
        let Some(invoice_id) = order.provider_invoice_id.as_deref() else {
            return;
        };

        match self.gateway.invoice_status(invoice_id).await {
            Ok(invoice) => {
                let mapped = OrderStatus::from_provider(&invoice.status);
                let Some(next) = crate::payment::status_transition(&order.status, mapped) else {
                    return;
                };
                log::info!(
                    "order {}: provider reports '{}', moving {} -> {}",
                    order.id,
                    invoice.status,
                    order.status,
                    next.as_str()
                );
                if let Err(e) = self.write_status(order, next).await {
                    log::warn!("order {}: status update failed: {}", order.id, e);
                }
            }
            // The provider has not registered the invoice yet; try again
            // next cycle.
            Err(GatewayError::InvoiceNotFound) => {
                log::debug!("order {}: invoice {} not yet known", order.id, invoice_id);
            }
            Err(e) => {
                log::warn!("order {}: provider check failed: {}", order.id, e);
            }
        }
    }

    async fn write_status(&self, order: &Order, status: OrderStatus) -> Result<(), AppError> {
        let pool = self.pool.clone();
        let order_id = order.id;
        web::block(move || {
            let mut conn = pool.get()?;
            diesel::update(orders::table.find(order_id))
                .set((
                    orders::status.eq(status.as_str()),
                    orders::updated_at.eq(Utc::now()),
                ))
                .execute(&mut conn)
                .map_err(AppError::from)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_escalates_and_caps() {
        let secs: Vec<u64> = (0..6).map(|i| pause_before(i).as_secs()).collect();
        assert_eq!(secs, vec![1, 3, 5, 10, 10, 10]);
    }

    #[test]
    fn guard_rejects_second_acquire_until_released() {
        let guard = CycleGuard::default();
        assert!(guard.try_acquire());
        assert!(!guard.try_acquire());
        guard.release();
        assert!(guard.try_acquire());
    }
}
