use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type UserId = String;
pub type AssetId = String;
pub type OrderId = Uuid;
pub type Usd = u64; // integer cents; no float arithmetic anywhere
pub type Size = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Working,
    Complete,
    Canceled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::Working => write!(f, "WORKING"),
            OrderStatus::Complete => write!(f, "COMPLETE"),
            OrderStatus::Canceled => write!(f, "CANCELED"),
        }
    }
}

/// A validated order submission, as accepted from an external producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub asset_id: AssetId,
    pub side: Side,
    pub limit: Usd,
    pub size: Size,
}

/// The authoritative order record. Owned by the ledger; the order book only
/// holds lightweight resting copies keyed by id.
///
/// `size` is the originally requested size and never changes. While the order
/// is not canceled, `filled + remaining == size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub asset_id: AssetId,
    pub side: Side,
    pub limit: Usd,
    pub size: Size,
    pub remaining: Size,
    pub filled: Size,
    pub status: OrderStatus,
    pub event_at: DateTime<Utc>,
}

impl Order {
    pub fn new(id: OrderId, user_id: UserId, request: OrderRequest, event_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            asset_id: request.asset_id,
            side: request.side,
            limit: request.limit,
            size: request.size,
            remaining: request.size,
            filled: 0,
            status: OrderStatus::Working,
            event_at,
        }
    }

    /// Record a fill of `quantity` units. Marks the order COMPLETE once
    /// nothing remains.
    pub fn fill(&mut self, quantity: Size) {
        debug_assert!(quantity <= self.remaining, "fill exceeds remaining size");

        self.remaining -= quantity;
        self.filled += quantity;

        if self.remaining == 0 {
            self.status = OrderStatus::Complete;
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OrderStatus::Complete | OrderStatus::Canceled)
    }
}

/// Read-only projection of an order handed to external callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub asset_id: AssetId,
    pub side: Side,
    pub limit: Usd,
    pub size: Size,
    pub filled: Size,
    pub status: OrderStatus,
    pub event_at: DateTime<Utc>,
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id.clone(),
            asset_id: order.asset_id.clone(),
            side: order.side,
            limit: order.limit,
            size: order.size,
            filled: order.filled,
            status: order.status,
            event_at: order.event_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetHolding {
    pub asset_id: AssetId,
    pub size: Size,
}

/// Initial state for one user of the exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInit {
    pub user_id: UserId,
    pub cash: Usd,
    pub assets: Vec<AssetHolding>,
}

/// In-process events produced while executing one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeEvent {
    Trade {
        asset_id: AssetId,
        maker_order_id: OrderId,
        taker_order_id: OrderId,
        price: Usd,
        size: Size,
        event_at: DateTime<Utc>,
    },
    OrderRested {
        order_id: OrderId,
        remaining: Size,
    },
}

/// Total cash required to cover `size` units at `limit`.
///
/// Saturating: an unpayable notional fails the cash check instead of wrapping.
pub fn total_cost(limit: Usd, size: Size) -> Usd {
    limit.saturating_mul(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(side: Side, limit: Usd, size: Size) -> OrderRequest {
        OrderRequest {
            asset_id: "COIN".to_string(),
            side,
            limit,
            size,
        }
    }

    #[test]
    fn test_order_creation() {
        let order = Order::new(
            Uuid::new_v4(),
            "u1".to_string(),
            request(Side::Buy, 100, 10),
            Utc::now(),
        );

        assert_eq!(order.side, Side::Buy);
        assert_eq!(order.limit, 100);
        assert_eq!(order.size, 10);
        assert_eq!(order.remaining, 10);
        assert_eq!(order.filled, 0);
        assert_eq!(order.status, OrderStatus::Working);
    }

    #[test]
    fn test_order_fill() {
        let mut order = Order::new(
            Uuid::new_v4(),
            "u1".to_string(),
            request(Side::Buy, 100, 10),
            Utc::now(),
        );

        order.fill(4);
        assert_eq!(order.filled, 4);
        assert_eq!(order.remaining, 6);
        assert_eq!(order.status, OrderStatus::Working);

        order.fill(6);
        assert_eq!(order.filled, 10);
        assert_eq!(order.remaining, 0);
        assert_eq!(order.status, OrderStatus::Complete);
        assert!(order.is_terminal());
    }

    #[test]
    fn test_total_cost_saturates() {
        assert_eq!(total_cost(100, 10), 1000);
        assert_eq!(total_cost(u64::MAX, 2), u64::MAX);
    }

    #[test]
    fn test_view_reports_original_size() {
        let mut order = Order::new(
            Uuid::new_v4(),
            "u1".to_string(),
            request(Side::Sell, 250, 8),
            Utc::now(),
        );
        order.fill(3);

        let view = OrderView::from(&order);
        assert_eq!(view.size, 8);
        assert_eq!(view.filled, 3);
        assert_eq!(view.status, OrderStatus::Working);
    }
}
