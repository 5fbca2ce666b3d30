use tracing::debug;

use crate::engine::book::BookSides;
use crate::engine::ledger::Ledger;
use crate::engine::order_list::RestingOrder;
use crate::engine::types::{ExchangeEvent, Order, OrderStatus, Side};

/// The matching algorithm. Runs under the asset's book guard and is the only
/// code that both moves ledger balances for fills and edits the book.
pub struct Matcher;

impl Matcher {
    /// Match `incoming` against the opposite side while its head is
    /// marketable, then rest any residual on the incoming side.
    ///
    /// Every trade executes at the resting (maker) order's limit. Both
    /// parties reserved at their own limit on submission, so the fill only
    /// credits the counterparty-side quantity; a taker buy matched below its
    /// limit additionally gets the reservation excess released by the ledger.
    pub fn execute(sides: &mut BookSides, mut incoming: Order, ledger: &Ledger) -> Vec<ExchangeEvent> {
        let mut events = Vec::new();

        loop {
            if incoming.remaining == 0 {
                break;
            }

            let opposite = sides.list_mut(incoming.side.opposite());
            let Some(head) = opposite.peek_best() else {
                break;
            };

            let marketable = match incoming.side {
                Side::Buy => head.limit <= incoming.limit,
                Side::Sell => head.limit >= incoming.limit,
            };
            if !marketable {
                break;
            }

            let maker_id = head.id;
            let maker_user = head.user_id.clone();
            let matched_price = head.limit;
            let traded = head.remaining.min(incoming.remaining);
            let maker_remaining = head.remaining - traded;

            let maker_status = if maker_remaining == 0 {
                OrderStatus::Complete
            } else {
                OrderStatus::Working
            };
            ledger.apply_fill(&maker_user, &maker_id, matched_price, traded, maker_status);

            incoming.fill(traded);
            ledger.apply_fill(
                &incoming.user_id,
                &incoming.id,
                matched_price,
                traded,
                incoming.status,
            );

            if maker_remaining == 0 {
                opposite.delete(&maker_id);
            } else {
                opposite.update_remaining(&maker_id, maker_remaining);
            }

            debug!(
                asset_id = %incoming.asset_id,
                maker = %maker_id,
                taker = %incoming.id,
                price = matched_price,
                size = traded,
                "trade executed"
            );
            events.push(ExchangeEvent::Trade {
                asset_id: incoming.asset_id.clone(),
                maker_order_id: maker_id,
                taker_order_id: incoming.id,
                price: matched_price,
                size: traded,
                event_at: incoming.event_at,
            });
        }

        // Residual rests with its original arrival time; submission is
        // serialized, so it is still older than anything submitted later.
        if incoming.remaining > 0 {
            let remaining = incoming.remaining;
            let order_id = incoming.id;
            sides
                .list_mut(incoming.side)
                .insert(RestingOrder::from(&incoming));
            events.push(ExchangeEvent::OrderRested {
                order_id,
                remaining,
            });
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::order_list::OrderList;
    use crate::engine::types::{AssetHolding, OrderRequest, Size, Usd, UserInit};
    use chrono::Utc;
    use uuid::Uuid;

    fn fresh_sides() -> BookSides {
        BookSides {
            bids: OrderList::new(Side::Buy),
            asks: OrderList::new(Side::Sell),
        }
    }

    fn funded_ledger() -> Ledger {
        let ledger = Ledger::new();
        for user_id in ["u1", "u2"] {
            ledger
                .create_user(UserInit {
                    user_id: user_id.to_string(),
                    cash: 10_000,
                    assets: vec![AssetHolding {
                        asset_id: "COIN".to_string(),
                        size: 100,
                    }],
                })
                .unwrap();
        }
        ledger
    }

    fn order(user_id: &str, side: Side, limit: Usd, size: Size) -> Order {
        Order::new(
            Uuid::new_v4(),
            user_id.to_string(),
            OrderRequest {
                asset_id: "COIN".to_string(),
                side,
                limit,
                size,
            },
            Utc::now(),
        )
    }

    /// Reserve and rest an order, the way the consumer would before matching.
    fn rest(sides: &mut BookSides, ledger: &Ledger, order: &Order) {
        ledger.reserve_for_submit(order.clone()).unwrap();
        sides.list_mut(order.side).insert(RestingOrder::from(order));
    }

    fn submit(sides: &mut BookSides, ledger: &Ledger, order: Order) -> Vec<ExchangeEvent> {
        ledger.reserve_for_submit(order.clone()).unwrap();
        Matcher::execute(sides, order, ledger)
    }

    fn trade_count(events: &[ExchangeEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, ExchangeEvent::Trade { .. }))
            .count()
    }

    #[test]
    fn test_incoming_buy_partial_fill_rests_residual() {
        let ledger = funded_ledger();
        let mut sides = fresh_sides();

        let sell_cheap = order("u1", Side::Sell, 100, 10);
        let sell_rich = order("u1", Side::Sell, 101, 30);
        rest(&mut sides, &ledger, &sell_cheap);
        rest(&mut sides, &ledger, &sell_rich);

        let buy = order("u2", Side::Buy, 100, 25);
        let buy_id = buy.id;
        let events = submit(&mut sides, &ledger, buy);

        // only the 100 ask is marketable; the rest of the buy rests
        assert_eq!(trade_count(&events), 1);
        let seller = ledger.snapshot("u1").unwrap();
        let buyer = ledger.snapshot("u2").unwrap();
        assert_eq!(seller.cash, 11_000);
        assert_eq!(buyer.inventory["COIN"], 110);

        assert_eq!(
            ledger.orders_with_status("u1", OrderStatus::Complete).len(),
            1
        );
        let working_buys = ledger.orders_with_status("u2", OrderStatus::Working);
        assert_eq!(working_buys.len(), 1);
        assert_eq!(working_buys[0].filled, 10);

        assert_eq!(sides.asks.len(), 1);
        assert_eq!(sides.asks.peek_best().unwrap().limit, 101);
        assert_eq!(sides.bids.len(), 1);
        assert_eq!(sides.bids.peek_best().unwrap().id, buy_id);
        assert_eq!(sides.bids.peek_best().unwrap().remaining, 15);
    }

    #[test]
    fn test_incoming_buy_sweeps_equal_priced_sells_fifo() {
        let ledger = funded_ledger();
        let mut sides = fresh_sides();

        let sell_first = order("u1", Side::Sell, 100, 10);
        let sell_second = order("u1", Side::Sell, 100, 30);
        rest(&mut sides, &ledger, &sell_first);
        rest(&mut sides, &ledger, &sell_second);

        let events = submit(&mut sides, &ledger, order("u2", Side::Buy, 100, 40));

        assert_eq!(trade_count(&events), 2);
        // first trade hits the earlier arrival
        match &events[0] {
            ExchangeEvent::Trade {
                maker_order_id,
                size,
                ..
            } => {
                assert_eq!(*maker_order_id, sell_first.id);
                assert_eq!(*size, 10);
            }
            other => panic!("expected trade, got {:?}", other),
        }

        assert_eq!(ledger.snapshot("u1").unwrap().cash, 14_000);
        assert_eq!(ledger.snapshot("u2").unwrap().inventory["COIN"], 140);
        assert!(sides.asks.is_empty());
        assert!(sides.bids.is_empty());
        assert_eq!(
            ledger.orders_with_status("u2", OrderStatus::Complete).len(),
            1
        );
    }

    #[test]
    fn test_incoming_sell_walks_bids_best_first() {
        let ledger = funded_ledger();
        let mut sides = fresh_sides();

        let bid_low = order("u1", Side::Buy, 100, 10);
        let bid_high = order("u1", Side::Buy, 101, 30);
        rest(&mut sides, &ledger, &bid_low);
        rest(&mut sides, &ledger, &bid_high);

        let events = submit(&mut sides, &ledger, order("u2", Side::Sell, 100, 35));

        assert_eq!(trade_count(&events), 2);

        // 30 @ 101 (best bid first), then 5 @ 100; maker price both times
        let seller = ledger.snapshot("u2").unwrap();
        assert_eq!(seller.cash, 10_000 + 30 * 101 + 5 * 100);

        let buyer = ledger.snapshot("u1").unwrap();
        assert_eq!(buyer.inventory["COIN"], 135);

        assert!(sides.asks.is_empty());
        assert_eq!(sides.bids.len(), 1);
        assert_eq!(sides.bids.peek_best().unwrap().id, bid_low.id);
        assert_eq!(sides.bids.peek_best().unwrap().remaining, 5);
    }

    #[test]
    fn test_trade_price_is_the_makers_limit() {
        let ledger = funded_ledger();
        let mut sides = fresh_sides();

        let sell = order("u1", Side::Sell, 100, 10);
        rest(&mut sides, &ledger, &sell);

        let events = submit(&mut sides, &ledger, order("u2", Side::Buy, 105, 10));

        match &events[0] {
            ExchangeEvent::Trade { price, .. } => assert_eq!(*price, 100),
            other => panic!("expected trade, got {:?}", other),
        }

        // buyer reserved 1050 but traded at 100; the 50 excess was released
        assert_eq!(ledger.snapshot("u2").unwrap().cash, 9_000);
        assert_eq!(ledger.snapshot("u1").unwrap().cash, 11_000);
    }

    #[test]
    fn test_non_marketable_orders_rest_without_trading() {
        let ledger = funded_ledger();
        let mut sides = fresh_sides();

        let bid = order("u1", Side::Buy, 100, 10);
        rest(&mut sides, &ledger, &bid);

        let events = submit(&mut sides, &ledger, order("u2", Side::Sell, 101, 35));

        assert_eq!(trade_count(&events), 0);
        assert!(matches!(events[0], ExchangeEvent::OrderRested { .. }));
        assert_eq!(sides.bids.len(), 1);
        assert_eq!(sides.asks.len(), 1);
    }

    #[test]
    fn test_match_into_empty_book_rests() {
        let ledger = funded_ledger();
        let mut sides = fresh_sides();

        let buy = order("u1", Side::Buy, 100, 10);
        let buy_id = buy.id;
        let events = submit(&mut sides, &ledger, buy);

        assert_eq!(
            events,
            vec![ExchangeEvent::OrderRested {
                order_id: buy_id,
                remaining: 10,
            }]
        );
    }
}
