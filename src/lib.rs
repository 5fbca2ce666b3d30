//! Spot Exchange Matching Engine
//!
//! An in-memory limit-order matching engine for a multi-asset spot exchange
//! with cash-settled trades. Per-asset books keep strict price-time priority,
//! fills update both parties' balances atomically, and a serialized
//! submission pipeline makes the ledger consistent with what an external
//! observer would see.
//!
//! # Quick Start
//!
//! ```no_run
//! use spot_exchange_engine::engine::{Exchange, OrderRequest, Side, UserInit, AssetHolding};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let exchange = Exchange::new();
//!
//! exchange.init_users(vec![UserInit {
//!     user_id: "alice".to_string(),
//!     cash: 10_000,
//!     assets: vec![AssetHolding { asset_id: "COIN".to_string(), size: 100 }],
//! }]);
//!
//! exchange.submit_order("alice", OrderRequest {
//!     asset_id: "COIN".to_string(),
//!     side: Side::Buy,
//!     limit: 100,
//!     size: 10,
//! }).await?;
//!
//! exchange.flush().await;
//! println!("active: {:?}", exchange.active_orders("alice"));
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! Four components, leaves first:
//!
//! 1. **Ledger**: users, cash (integer cents), per-asset inventory, and the
//!    order audit log. Debits reservations at submission, credits fills.
//! 2. **OrderList**: one side of a book in price-time priority, best price
//!    first, FIFO among equal limits.
//! 3. **BookSet**: lazily created per-asset books, each with its own guard;
//!    owns the matcher's entry point.
//! 4. **Submission pipeline**: a bounded FIFO with a single consumer task
//!    that assigns ids and arrival times and drives matching, so time
//!    priority equals enqueue order.
//!
//! Trades execute at the resting (maker) order's limit. All arithmetic is on
//! integer cents and integer unit counts.

pub mod engine;
pub mod metrics;
pub mod utils;

// Re-export commonly used types
pub use crate::engine::{
    Exchange, ExchangeEvent, Order, OrderId, OrderRequest, OrderStatus, OrderView, Side,
    UserInit, ValidationError,
};

pub use crate::metrics::EngineMetrics;
