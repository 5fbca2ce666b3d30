//! Exchange core module
//!
//! This module contains the ledger, the per-asset order books, the matching
//! algorithm, and the serialized submission pipeline that drives them.

pub mod book;
pub mod error;
pub mod ledger;
pub mod matching;
pub mod order_list;
pub mod service;
pub mod types;

// Re-export main types for convenience
pub use book::{Book, BookSet, BookSides};
pub use error::{LedgerError, ValidationError};
pub use ledger::{Ledger, UserSnapshot};
pub use matching::Matcher;
pub use order_list::{OrderList, RestingOrder};
pub use service::Exchange;
pub use types::{
    AssetHolding, AssetId, ExchangeEvent, Order, OrderId, OrderRequest, OrderStatus, OrderView,
    Side, Size, Usd, UserId, UserInit,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        let _ledger = Ledger::new();
        let _books = BookSet::new();
        let _list = OrderList::new(Side::Buy);
        let _error = ValidationError::InsufficientCash;
    }
}
