use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::engine::book::BookSet;
use crate::engine::error::ValidationError;
use crate::engine::ledger::{Ledger, UserSnapshot};
use crate::engine::types::{
    total_cost, AssetId, ExchangeEvent, Order, OrderId, OrderRequest, OrderStatus, OrderView,
    Side, UserId, UserInit,
};
use crate::metrics::EngineMetrics;
use crate::utils::time::MonotonicClock;

/// Submissions in flight before producers block (back-pressure).
const SUBMISSION_QUEUE_DEPTH: usize = 100;

enum Command {
    Submit {
        user_id: UserId,
        request: OrderRequest,
    },
    Cancel {
        user_id: UserId,
        order_id: OrderId,
        done: oneshot::Sender<bool>,
    },
    Flush {
        done: oneshot::Sender<()>,
    },
}

/// The exchange core: ledger, per-asset books, and the submission pipeline.
///
/// Producers validate and enqueue from any task; a single consumer task
/// assigns ids and arrival times, reserves balances, and drives matching.
/// That single consumer is what makes arrival-time priority equal enqueue
/// order and keeps reservations from racing ongoing matches. Cancels travel
/// through the same queue, so every ledger mutation happens on one task.
pub struct Exchange {
    ledger: Arc<Ledger>,
    books: Arc<BookSet>,
    metrics: Arc<EngineMetrics>,
    commands: Mutex<Option<mpsc::Sender<Command>>>,
    consumer: Mutex<Option<JoinHandle<()>>>,
}

impl Exchange {
    /// Build an exchange and spawn its consumer task. Must be called from
    /// within a tokio runtime.
    pub fn new() -> Self {
        let ledger = Arc::new(Ledger::new());
        let books = Arc::new(BookSet::new());
        let metrics = Arc::new(EngineMetrics::new());

        let (commands, receiver) = mpsc::channel(SUBMISSION_QUEUE_DEPTH);
        let consumer = tokio::spawn(run_consumer(
            receiver,
            Arc::clone(&ledger),
            Arc::clone(&books),
            Arc::clone(&metrics),
        ));

        Self {
            ledger,
            books,
            metrics,
            commands: Mutex::new(Some(commands)),
            consumer: Mutex::new(Some(consumer)),
        }
    }

    /// Install the given users, silently overwriting any existing records.
    pub fn init_users(&self, users: Vec<UserInit>) {
        for user in users {
            debug!(user_id = %user.user_id, cash = user.cash, "user initialized");
            self.ledger.upsert_user(user);
        }
    }

    /// Validate and enqueue an order. Returns as soon as the submission is
    /// accepted; matching happens asynchronously on the consumer task, and an
    /// accepted submission is guaranteed to be attempted. Blocks when the
    /// submission queue is full.
    pub async fn submit_order(
        &self,
        user_id: &str,
        request: OrderRequest,
    ) -> Result<(), ValidationError> {
        if let Err(error) = validate_request(self.ledger.snapshot(user_id), user_id, &request) {
            self.metrics.increment_orders_rejected();
            warn!(%user_id, %error, "order rejected");
            return Err(error);
        }

        let sender = self.sender();
        sender
            .send(Command::Submit {
                user_id: user_id.to_string(),
                request,
            })
            .await
            .expect("submission consumer terminated");
        self.metrics
            .set_queue_depth(SUBMISSION_QUEUE_DEPTH - sender.capacity());
        self.metrics.increment_orders_submitted();
        Ok(())
    }

    /// Cancel an order, refunding its unfilled reservation. A no-op for
    /// unknown or terminal orders. The call returns once the cancel has been
    /// applied, after every submission enqueued before it.
    pub async fn cancel_order(&self, user_id: &str, order_id: OrderId) {
        let (done, applied) = oneshot::channel();
        self.sender()
            .send(Command::Cancel {
                user_id: user_id.to_string(),
                order_id,
                done,
            })
            .await
            .expect("submission consumer terminated");

        if applied.await.unwrap_or(false) {
            self.metrics.increment_orders_canceled();
        }
    }

    /// Wait until every previously enqueued command has been processed.
    pub async fn flush(&self) {
        let (done, drained) = oneshot::channel();
        self.sender()
            .send(Command::Flush { done })
            .await
            .expect("submission consumer terminated");
        let _ = drained.await;
    }

    /// Orders still working for a user. Empty for unknown users.
    pub fn active_orders(&self, user_id: &str) -> Vec<OrderView> {
        self.ledger.orders_with_status(user_id, OrderStatus::Working)
    }

    /// Fully filled orders for a user. Empty for unknown users.
    pub fn complete_orders(&self, user_id: &str) -> Vec<OrderView> {
        self.ledger
            .orders_with_status(user_id, OrderStatus::Complete)
    }

    pub fn snapshot(&self, user_id: &str) -> Option<UserSnapshot> {
        self.ledger.snapshot(user_id)
    }

    /// (bid count, ask count) currently resting for an asset.
    pub fn resting_orders(&self, asset_id: &AssetId) -> (usize, usize) {
        self.books.resting_orders(asset_id)
    }

    pub fn metrics(&self) -> Arc<EngineMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Close the submission queue. The consumer drains everything already
    /// enqueued and terminates; nothing is persisted. Further submissions
    /// panic.
    pub async fn close(&self) {
        drop(self.commands.lock().take());
        let consumer = self.consumer.lock().take();
        if let Some(consumer) = consumer {
            if let Err(error) = consumer.await {
                error!(%error, "consumer task failed");
            }
        }
    }

    fn sender(&self) -> mpsc::Sender<Command> {
        self.commands
            .lock()
            .clone()
            .expect("exchange has been closed")
    }
}

/// Producer-side validation against a balance snapshot. Races between
/// validation and enqueue are tolerated: reservations are applied in queue
/// order, so the pipeline sees every earlier debit before this one.
fn validate_request(
    snapshot: Option<UserSnapshot>,
    user_id: &str,
    request: &OrderRequest,
) -> Result<(), ValidationError> {
    let snapshot =
        snapshot.ok_or_else(|| ValidationError::UnknownUser(user_id.to_string()))?;

    if request.size == 0 {
        return Err(ValidationError::NonPositiveSize);
    }
    if request.limit == 0 {
        return Err(ValidationError::NonPositiveLimit);
    }

    // holding an asset at size 0 still counts as holding it
    let held = snapshot
        .inventory
        .get(&request.asset_id)
        .copied()
        .ok_or_else(|| ValidationError::AssetNotHeld(request.asset_id.clone()))?;

    match request.side {
        Side::Buy if snapshot.cash < total_cost(request.limit, request.size) => {
            Err(ValidationError::InsufficientCash)
        }
        Side::Sell if held < request.size => Err(ValidationError::InsufficientInventory),
        _ => Ok(()),
    }
}

async fn run_consumer(
    mut commands: mpsc::Receiver<Command>,
    ledger: Arc<Ledger>,
    books: Arc<BookSet>,
    metrics: Arc<EngineMetrics>,
) {
    let clock = MonotonicClock::new();

    while let Some(command) = commands.recv().await {
        match command {
            Command::Submit { user_id, request } => {
                let order = Order::new(Uuid::new_v4(), user_id, request, clock.now());
                ledger
                    .reserve_for_submit(order.clone())
                    .expect("fresh order id already recorded");

                let events = metrics.time_execute(|| books.execute(order, &ledger));
                for event in &events {
                    if let ExchangeEvent::Trade { price, size, .. } = event {
                        metrics.increment_trades_executed(*size, total_cost(*price, *size));
                    }
                }
            }
            Command::Cancel {
                user_id,
                order_id,
                done,
            } => {
                let applied =
                    metrics.time_cancel(|| apply_cancel(&ledger, &books, &user_id, &order_id));
                let _ = done.send(applied);
            }
            Command::Flush { done } => {
                let _ = done.send(());
            }
        }
    }

    info!("submission queue closed; consumer drained");
}

/// Remove the order from its book and refund the reservation, both under the
/// book guard. Unknown and terminal orders are quiet no-ops.
fn apply_cancel(ledger: &Ledger, books: &BookSet, user_id: &str, order_id: &OrderId) -> bool {
    let Some((asset_id, side)) = ledger.order_location(user_id, order_id) else {
        return false;
    };

    let book = books.book(&asset_id);
    let mut sides = book.lock();
    sides.list_mut(side).delete(order_id);
    ledger.cancel_reservation(user_id, order_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::AssetHolding;
    use std::collections::HashMap;

    fn snapshot(cash: u64, coin: u64) -> Option<UserSnapshot> {
        let mut inventory = HashMap::new();
        inventory.insert("COIN".to_string(), coin);
        Some(UserSnapshot {
            user_id: "u1".to_string(),
            cash,
            inventory,
            open_orders: 0,
        })
    }

    fn request(side: Side, limit: u64, size: u64) -> OrderRequest {
        OrderRequest {
            asset_id: "COIN".to_string(),
            side,
            limit,
            size,
        }
    }

    #[test]
    fn test_validate_unknown_user() {
        let result = validate_request(None, "ghost", &request(Side::Buy, 100, 1));
        assert_eq!(
            result,
            Err(ValidationError::UnknownUser("ghost".to_string()))
        );
    }

    #[test]
    fn test_validate_asset_not_held() {
        let result = validate_request(
            snapshot(10_000, 10),
            "u1",
            &OrderRequest {
                asset_id: "GAME".to_string(),
                side: Side::Buy,
                limit: 100,
                size: 1,
            },
        );
        assert_eq!(
            result,
            Err(ValidationError::AssetNotHeld("GAME".to_string()))
        );
    }

    #[test]
    fn test_validate_insufficient_cash() {
        let result = validate_request(snapshot(999, 10), "u1", &request(Side::Buy, 100, 10));
        assert_eq!(result, Err(ValidationError::InsufficientCash));

        // exactly enough passes
        assert!(validate_request(snapshot(1000, 10), "u1", &request(Side::Buy, 100, 10)).is_ok());
    }

    #[test]
    fn test_validate_insufficient_inventory() {
        let result = validate_request(snapshot(10_000, 9), "u1", &request(Side::Sell, 100, 10));
        assert_eq!(result, Err(ValidationError::InsufficientInventory));

        assert!(validate_request(snapshot(10_000, 10), "u1", &request(Side::Sell, 100, 10)).is_ok());
    }

    #[test]
    fn test_validate_zero_held_asset_counts_as_held() {
        let result = validate_request(snapshot(10_000, 0), "u1", &request(Side::Buy, 100, 10));
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_non_positive_fields() {
        assert_eq!(
            validate_request(snapshot(10_000, 10), "u1", &request(Side::Buy, 100, 0)),
            Err(ValidationError::NonPositiveSize)
        );
        assert_eq!(
            validate_request(snapshot(10_000, 10), "u1", &request(Side::Buy, 0, 10)),
            Err(ValidationError::NonPositiveLimit)
        );
    }

    #[tokio::test]
    async fn test_submit_then_query() {
        let exchange = Exchange::new();
        exchange.init_users(vec![UserInit {
            user_id: "u1".to_string(),
            cash: 10_000,
            assets: vec![AssetHolding {
                asset_id: "COIN".to_string(),
                size: 100,
            }],
        }]);

        exchange
            .submit_order("u1", request(Side::Buy, 100, 10))
            .await
            .unwrap();
        exchange.flush().await;

        let active = exchange.active_orders("u1");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].limit, 100);
        assert_eq!(exchange.snapshot("u1").unwrap().cash, 9_000);
        assert_eq!(exchange.resting_orders(&"COIN".to_string()), (1, 0));

        exchange.close().await;
    }

    #[tokio::test]
    async fn test_cancel_unknown_order_is_noop() {
        let exchange = Exchange::new();
        exchange.init_users(vec![UserInit {
            user_id: "u1".to_string(),
            cash: 10_000,
            assets: vec![],
        }]);

        exchange.cancel_order("u1", Uuid::new_v4()).await;
        exchange.cancel_order("ghost", Uuid::new_v4()).await;
        assert_eq!(exchange.snapshot("u1").unwrap().cash, 10_000);

        exchange.close().await;
    }

    #[tokio::test]
    async fn test_rejected_submission_reserves_nothing() {
        let exchange = Exchange::new();
        exchange.init_users(vec![UserInit {
            user_id: "u1".to_string(),
            cash: 500,
            assets: vec![AssetHolding {
                asset_id: "COIN".to_string(),
                size: 5,
            }],
        }]);

        let result = exchange.submit_order("u1", request(Side::Buy, 100, 10)).await;
        assert_eq!(result, Err(ValidationError::InsufficientCash));

        exchange.flush().await;
        assert!(exchange.active_orders("u1").is_empty());
        assert_eq!(exchange.snapshot("u1").unwrap().cash, 500);

        exchange.close().await;
    }
}
