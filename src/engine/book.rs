use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::debug;

use crate::engine::ledger::Ledger;
use crate::engine::matching::Matcher;
use crate::engine::order_list::OrderList;
use crate::engine::types::{AssetId, ExchangeEvent, Order, Side};

/// The two sides of one asset's book.
#[derive(Debug)]
pub struct BookSides {
    pub bids: OrderList,
    pub asks: OrderList,
}

impl BookSides {
    fn new() -> Self {
        Self {
            bids: OrderList::new(Side::Buy),
            asks: OrderList::new(Side::Sell),
        }
    }

    pub fn list(&self, side: Side) -> &OrderList {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    pub fn list_mut(&mut self, side: Side) -> &mut OrderList {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }
}

/// One asset's order book. The mutex is the book guard: every mutation
/// (match, residual insert, cancel removal) happens while holding it.
#[derive(Debug)]
pub struct Book {
    sides: Mutex<BookSides>,
}

impl Book {
    fn new() -> Self {
        Self {
            sides: Mutex::new(BookSides::new()),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, BookSides> {
        self.sides.lock()
    }
}

/// All per-asset books. Guards are per asset, so activity on different
/// assets never contends.
#[derive(Debug, Default)]
pub struct BookSet {
    books: DashMap<AssetId, Arc<Book>>,
}

impl BookSet {
    pub fn new() -> Self {
        Self {
            books: DashMap::new(),
        }
    }

    /// The book for `asset_id`, created empty on first reference.
    pub fn book(&self, asset_id: &AssetId) -> Arc<Book> {
        if let Some(book) = self.books.get(asset_id) {
            return Arc::clone(&book);
        }
        self.books
            .entry(asset_id.clone())
            .or_insert_with(|| Arc::new(Book::new()))
            .clone()
    }

    /// Match `incoming` against its asset's book under the book guard,
    /// resting any residual on its own side.
    pub fn execute(&self, incoming: Order, ledger: &Ledger) -> Vec<ExchangeEvent> {
        let book = self.book(&incoming.asset_id);
        let mut sides = book.lock();
        debug!(order_id = %incoming.id, asset_id = %incoming.asset_id, "executing order");
        Matcher::execute(&mut sides, incoming, ledger)
    }

    /// Number of books created so far.
    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// (bid count, ask count) for an asset. Creates the book if absent.
    pub fn resting_orders(&self, asset_id: &AssetId) -> (usize, usize) {
        let book = self.book(asset_id);
        let sides = book.lock();
        (sides.bids.len(), sides.asks.len())
    }
}
