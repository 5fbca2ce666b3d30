use dashmap::DashMap;
use std::collections::HashMap;
use tracing::debug;

use crate::engine::error::LedgerError;
use crate::engine::types::{
    total_cost, AssetId, Order, OrderId, OrderStatus, OrderView, Side, Size, Usd, UserId, UserInit,
};

/// One user's account: available cash, per-asset inventory, and every order
/// the user ever submitted. Orders are never deleted; the map doubles as the
/// audit log.
#[derive(Debug)]
struct UserAccount {
    cash: Usd,
    inventory: HashMap<AssetId, Size>,
    orders: HashMap<OrderId, Order>,
}

impl UserAccount {
    fn from_init(init: UserInit) -> Self {
        let mut inventory = HashMap::new();
        for holding in init.assets {
            inventory.insert(holding.asset_id, holding.size);
        }
        Self {
            cash: init.cash,
            inventory,
            orders: HashMap::new(),
        }
    }
}

/// Read-only projection of a user's balances, used by the submission
/// validator and by external observers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct UserSnapshot {
    pub user_id: UserId,
    pub cash: Usd,
    pub inventory: HashMap<AssetId, Size>,
    pub open_orders: usize,
}

/// In-memory ledger of users, balances, and order records.
///
/// Balance-moving calls are only made from the submission consumer task, so
/// they never race each other; the map still has to be concurrently readable
/// because snapshots and order queries run on producer threads.
///
/// Reservation model: a buy debits `limit × size` cash and a sell debits
/// `size` inventory at submission. Fills only credit the counterparty-side
/// quantity; cancels refund the unfilled remainder. Since all quantities are
/// unsigned, balances can never go negative: a would-be underflow is a
/// contract violation and panics the matching task.
#[derive(Debug, Default)]
pub struct Ledger {
    accounts: DashMap<UserId, UserAccount>,
}

impl Ledger {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Register a new user. Fails if the id is already taken.
    pub fn create_user(&self, init: UserInit) -> Result<(), LedgerError> {
        if self.accounts.contains_key(&init.user_id) {
            return Err(LedgerError::UserExists);
        }
        let user_id = init.user_id.clone();
        self.accounts.insert(user_id, UserAccount::from_init(init));
        Ok(())
    }

    /// Install a user record, silently replacing any existing state. This is
    /// the initialization-call behavior; `create_user` is the strict variant.
    pub fn upsert_user(&self, init: UserInit) {
        let user_id = init.user_id.clone();
        self.accounts.insert(user_id, UserAccount::from_init(init));
    }

    /// `None` for unknown users; the validator maps that to a rejection.
    pub fn snapshot(&self, user_id: &str) -> Option<UserSnapshot> {
        let account = self.accounts.get(user_id)?;
        Some(UserSnapshot {
            user_id: user_id.to_string(),
            cash: account.cash,
            inventory: account.inventory.clone(),
            open_orders: account
                .orders
                .values()
                .filter(|o| o.status == OrderStatus::Working)
                .count(),
        })
    }

    /// Record a validated order and debit the submitter's reservation: cash
    /// for a buy, inventory for a sell. The validator has already checked
    /// feasibility against a snapshot, and queue order guarantees every
    /// earlier reservation is visible here, so the debits cannot underflow.
    pub fn reserve_for_submit(&self, order: Order) -> Result<(), LedgerError> {
        let mut account = self
            .accounts
            .get_mut(&order.user_id)
            .expect("reservation for unknown user");

        if account.orders.contains_key(&order.id) {
            return Err(LedgerError::DuplicateOrder);
        }

        match order.side {
            Side::Buy => {
                let cost = total_cost(order.limit, order.remaining);
                account.cash = account
                    .cash
                    .checked_sub(cost)
                    .expect("cash reservation underflow");
            }
            Side::Sell => {
                let held = account
                    .inventory
                    .get_mut(&order.asset_id)
                    .expect("reservation for unheld asset");
                *held = held
                    .checked_sub(order.remaining)
                    .expect("inventory reservation underflow");
            }
        }

        debug!(order_id = %order.id, user_id = %order.user_id, side = %order.side, "order reserved");
        account.orders.insert(order.id, order);
        Ok(())
    }

    /// Credit one side of a fill and advance the order record.
    ///
    /// A sell owner earns `matched_price × quantity` cash. A buy owner earns
    /// `quantity` inventory plus the release of the over-reservation
    /// `(limit − matched_price) × quantity`, since a taker buy reserved at
    /// its own limit but trades at the maker's.
    pub fn apply_fill(
        &self,
        user_id: &str,
        order_id: &OrderId,
        matched_price: Usd,
        quantity: Size,
        status: OrderStatus,
    ) {
        let mut account = self
            .accounts
            .get_mut(user_id)
            .expect("fill for unknown user");

        let order = account
            .orders
            .get_mut(order_id)
            .expect("fill for unrecorded order");
        debug_assert_eq!(
            order.status,
            OrderStatus::Working,
            "fill for a terminal order"
        );
        order.fill(quantity);
        order.status = status;

        let side = order.side;
        let limit = order.limit;
        let asset_id = order.asset_id.clone();

        match side {
            Side::Sell => {
                account.cash += total_cost(matched_price, quantity);
            }
            Side::Buy => {
                *account.inventory.entry(asset_id).or_insert(0) += quantity;
                let excess = limit
                    .checked_sub(matched_price)
                    .expect("buy filled above its limit");
                account.cash += total_cost(excess, quantity);
            }
        }
    }

    /// Refund the unfilled remainder of a WORKING order and mark it CANCELED.
    /// A no-op for unknown users, unknown orders, and terminal orders, so
    /// cancel stays idempotent. Returns whether anything changed.
    pub fn cancel_reservation(&self, user_id: &str, order_id: &OrderId) -> bool {
        let Some(mut account) = self.accounts.get_mut(user_id) else {
            return false;
        };
        let Some(order) = account.orders.get_mut(order_id) else {
            return false;
        };
        if order.status != OrderStatus::Working {
            return false;
        }

        order.status = OrderStatus::Canceled;
        let side = order.side;
        let limit = order.limit;
        let remaining = order.remaining;
        let asset_id = order.asset_id.clone();

        match side {
            Side::Buy => account.cash += total_cost(limit, remaining),
            Side::Sell => *account.inventory.entry(asset_id).or_insert(0) += remaining,
        }

        debug!(%order_id, %user_id, "reservation canceled");
        true
    }

    /// Asset and side of a user's order, if recorded. The cancel path uses
    /// this to find the book to lock.
    pub fn order_location(&self, user_id: &str, order_id: &OrderId) -> Option<(AssetId, Side)> {
        let account = self.accounts.get(user_id)?;
        let order = account.orders.get(order_id)?;
        Some((order.asset_id.clone(), order.side))
    }

    /// All of a user's orders with the given status. Empty for unknown users.
    pub fn orders_with_status(&self, user_id: &str, status: OrderStatus) -> Vec<OrderView> {
        match self.accounts.get(user_id) {
            Some(account) => account
                .orders
                .values()
                .filter(|o| o.status == status)
                .map(OrderView::from)
                .collect(),
            None => Vec::new(),
        }
    }

}
