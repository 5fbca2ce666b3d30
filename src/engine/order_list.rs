use std::collections::VecDeque;

use crate::engine::types::{OrderId, Order, Side, Size, Usd, UserId};

/// Lightweight resting copy of an order held by one side of a book.
///
/// The authoritative record lives in the ledger; this carries just enough to
/// drive matching (price, remaining size) plus the keys needed to reach the
/// ledger record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestingOrder {
    pub id: OrderId,
    pub user_id: UserId,
    pub limit: Usd,
    pub remaining: Size,
}

impl From<&Order> for RestingOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id.clone(),
            limit: order.limit,
            remaining: order.remaining,
        }
    }
}

/// One side of a book: resting orders in strict price-time priority.
///
/// Buy side keeps the highest limit first, sell side the lowest; orders at an
/// equal limit keep FIFO arrival order. Incoming marketable orders interact
/// with the head, so peeking and head removal are O(1) and an insert scans
/// from the front; in the common case a new order prices near the top.
#[derive(Debug)]
pub struct OrderList {
    side: Side,
    orders: VecDeque<RestingOrder>,
}

impl OrderList {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            orders: VecDeque::new(),
        }
    }

    /// Insert at the position given by the side's price rule, after all
    /// resting orders with an equal limit.
    pub fn insert(&mut self, order: RestingOrder) {
        let position = match self.side {
            Side::Buy => self.orders.iter().position(|o| order.limit > o.limit),
            Side::Sell => self.orders.iter().position(|o| order.limit < o.limit),
        };

        match position {
            Some(index) => self.orders.insert(index, order),
            None => self.orders.push_back(order),
        }
    }

    /// Remove the order with the given id. Ids are unique process-wide, so
    /// the scan stops at the first match. No-op when absent.
    pub fn delete(&mut self, order_id: &OrderId) -> Option<RestingOrder> {
        let position = self.orders.iter().position(|o| &o.id == order_id)?;
        self.orders.remove(position)
    }

    /// Update the remaining size in place. A partial fill at the head must
    /// not disturb priority, so the position is never recomputed.
    pub fn update_remaining(&mut self, order_id: &OrderId, remaining: Size) {
        if let Some(order) = self.orders.iter_mut().find(|o| &o.id == order_id) {
            order.remaining = remaining;
        }
    }

    /// The best-priced, oldest resting order.
    pub fn peek_best(&self) -> Option<&RestingOrder> {
        self.orders.front()
    }

    pub fn find(&self, order_id: &OrderId) -> Option<&RestingOrder> {
        self.orders.iter().find(|o| &o.id == order_id)
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RestingOrder> {
        self.orders.iter()
    }
}
