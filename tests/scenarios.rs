//! End-to-end matching scenarios against a bare book: crossings, partial
//! fills, iceberg refills, stop cascades and collar enforcement.

use market_sim::config::EngineConfig;
use market_sim::logger::EventLog;
use market_sim::metrics::{
    Metrics, STOP_ORDERS_REJECTED, STOP_ORDERS_TRIGGERED, VOLUME_TRADED,
};
use market_sim::orderbook::OrderBook;
use market_sim::orders::{Order, Side};
use market_sim::trade::Trade;
use std::sync::Arc;

fn book_with_metrics() -> (OrderBook, Arc<Metrics>) {
    let metrics = Arc::new(Metrics::new());
    let book = OrderBook::new(
        &EngineConfig::default(),
        metrics.clone(),
        Arc::new(EventLog::disabled()),
    );
    (book, metrics)
}

/// Simple cross: a resting sell, then a smaller crossing buy.
#[test]
fn simple_cross() {
    let (mut book, _) = book_with_metrics();
    book.match_order(Order::limit(1, 500, Side::Sell, 10_000, 5));

    let trades = book.match_order(Order::limit(2, 500, Side::Buy, 10_100, 3));

    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].quantity, 3);
    assert_eq!(trades[0].price, 10_000);
    assert_eq!(book.asks.get(&10_000).unwrap()[0].quantity, 2);
    assert_eq!(book.last_trade_handle().load(), 10_000);
}

/// Partial fills against a level, FIFO, market residue discarded.
#[test]
fn partial_fills_across_a_level() {
    let (mut book, _) = book_with_metrics();
    book.match_order(Order::limit(1, 500, Side::Sell, 10_000, 5)); // A
    book.match_order(Order::limit(2, 500, Side::Sell, 10_000, 4)); // B

    let trades = book.match_order(Order::market(3, 500, Side::Buy, 7));

    assert_eq!(trades.len(), 2);
    assert_eq!((trades[0].maker_id, trades[0].quantity, trades[0].price), (1, 5, 10_000));
    assert_eq!((trades[1].maker_id, trades[1].quantity, trades[1].price), (2, 2, 10_000));
    let level = book.asks.get(&10_000).unwrap();
    assert_eq!((level[0].id, level[0].quantity), (2, 2));
    assert!(book.bids.is_empty());
}

/// Iceberg refill: first slice exhausts, the next slice appears and keeps
/// filling the same incoming order.
#[test]
fn iceberg_refill_mid_match() {
    let (mut book, _) = book_with_metrics();
    book.match_order(Order::iceberg(1, 500, Side::Buy, 10_000, 1_000, 100));

    let trades = book.match_order(Order::limit(2, 500, Side::Sell, 10_000, 150));

    let filled: u64 = trades.iter().map(|t| t.quantity).sum();
    assert_eq!(filled, 150);

    let level = book.bids.get(&10_000).unwrap();
    assert_eq!(level.len(), 1);
    assert!(level[0].quantity <= 100);
    assert_eq!(level[0].quantity, 50);

    // 1000 total - 150 traded = 850 untraded; 50 of that visible
    let reserve = &book.iceberg_hidden_bids.get(&10_000).unwrap()[0];
    assert_eq!(reserve.quantity, 100); // size of the published slice
}

/// Stop cascade: a down-tick arms a stop market sell that trades through
/// the remaining bid.
#[test]
fn stop_cascade_on_downtick() {
    let (mut book, metrics) = book_with_metrics();
    book.match_order(Order::stop_market(1, 500, Side::Sell, 9_500, 10));
    book.match_order(Order::limit(2, 500, Side::Sell, 10_500, 10));
    book.match_order(Order::limit(3, 500, Side::Buy, 9_400, 20));

    let trades = book.match_order(Order::limit(4, 500, Side::Sell, 9_400, 1));

    assert_eq!(trades.len(), 2);
    assert_eq!((trades[0].quantity, trades[0].price), (1, 9_400));
    assert_eq!((trades[1].taker_id, trades[1].quantity, trades[1].price), (1, 10, 9_400));
    assert_eq!(book.bids.get(&9_400).unwrap()[0].quantity, 9);
    assert!(book.stop_asks.is_empty());
    assert_eq!(metrics.counter(STOP_ORDERS_TRIGGERED), 1);
}

/// Collar rejection: a stop limit far above the arming print is discarded.
#[test]
fn collar_rejects_far_stop_limit() {
    let (mut book, metrics) = book_with_metrics();
    book.match_order(Order::stop_limit(1, 500, Side::Sell, 9_500, 11_000, 5));
    book.match_order(Order::limit(2, 500, Side::Buy, 9_400, 3));

    let trades = book.match_order(Order::limit(3, 500, Side::Sell, 9_400, 3));

    assert_eq!(trades.len(), 1); // only the arming trade
    assert_eq!(metrics.counter(STOP_ORDERS_REJECTED), 1);
    assert_eq!(metrics.counter(STOP_ORDERS_TRIGGERED), 0);
    assert!(book.stop_asks.is_empty());
    assert!(book.asks.is_empty());
}

/// A stop limit exactly at the collar edge (94 * 1.05 = 98.70) survives.
#[test]
fn collar_edge_is_accepted() {
    let (mut book, metrics) = book_with_metrics();
    book.match_order(Order::stop_limit(1, 500, Side::Sell, 9_500, 9_870, 5));
    book.match_order(Order::limit(2, 500, Side::Buy, 9_400, 3));
    book.match_order(Order::limit(3, 500, Side::Sell, 9_400, 3));

    assert_eq!(metrics.counter(STOP_ORDERS_REJECTED), 0);
    assert_eq!(metrics.counter(STOP_ORDERS_TRIGGERED), 1);
    assert_eq!(book.asks.get(&9_870).unwrap()[0].id, 1);
}

/// FIFO at a price across two takers: A then B, B keeps its remainder
/// ahead of C.
#[test]
fn fifo_preserved_across_partial_fills() {
    let (mut book, _) = book_with_metrics();
    book.match_order(Order::limit(1, 500, Side::Sell, 10_000, 3)); // A
    book.match_order(Order::limit(2, 500, Side::Sell, 10_000, 3)); // B
    book.match_order(Order::limit(3, 500, Side::Sell, 10_000, 3)); // C

    let trades = book.match_order(Order::market(4, 500, Side::Buy, 5));
    assert_eq!((trades[0].maker_id, trades[0].quantity), (1, 3));
    assert_eq!((trades[1].maker_id, trades[1].quantity), (2, 2));

    let level = book.asks.get(&10_000).unwrap();
    assert_eq!((level[0].id, level[0].quantity), (2, 1));
    assert_eq!(level[1].id, 3);

    let trades = book.match_order(Order::market(5, 500, Side::Buy, 1));
    assert_eq!(trades[0].maker_id, 2); // B's remainder executes before C
}

/// A market order with no opposite liquidity leaves no residue and trades
/// nothing.
#[test]
fn market_order_into_empty_book() {
    let (mut book, metrics) = book_with_metrics();
    let trades = book.match_order(Order::market(1, 500, Side::Sell, 10));
    assert!(trades.is_empty());
    assert!(book.bids.is_empty() && book.asks.is_empty());
    assert_eq!(metrics.counter(VOLUME_TRADED), 0);
}

/// Two identical limits at one price fill in arrival order.
#[test]
fn identical_limits_fill_in_arrival_order() {
    let (mut book, _) = book_with_metrics();
    book.match_order(Order::limit(1, 500, Side::Buy, 10_000, 4));
    book.match_order(Order::limit(2, 500, Side::Buy, 10_000, 4));

    let trades = book.match_order(Order::market(3, 500, Side::Sell, 8));
    assert_eq!(trades[0].maker_id, 1);
    assert_eq!(trades[1].maker_id, 2);
}

/// Replaying a session's fills as synthetic maker/taker pairs against an
/// empty book reproduces the volume counter.
#[test]
fn trade_log_replay_reproduces_volume() {
    let (mut book, metrics) = book_with_metrics();
    let mut fills: Vec<Trade> = Vec::new();
    fills.extend(book.match_order(Order::iceberg(1, 500, Side::Sell, 10_000, 300, 50)));
    fills.extend(book.match_order(Order::limit(2, 500, Side::Buy, 10_000, 120)));
    fills.extend(book.match_order(Order::stop_market(3, 500, Side::Buy, 10_000, 10)));
    fills.extend(book.match_order(Order::market(4, 500, Side::Buy, 20)));
    fills.extend(book.match_order(Order::market(5, 500, Side::Sell, 30)));

    // the counter equals the sum of emitted fills, in quantity cents
    let recorded = metrics.counter(VOLUME_TRADED);
    let total: u64 = fills.iter().map(|t| t.quantity).sum();
    assert!(recorded > 0);
    assert_eq!(recorded, total * 100);

    // every fill becomes a maker/taker pair against a fresh book
    let (mut replay_book, replay_metrics) = book_with_metrics();
    let mut id = 1_000u64;
    for trade in &fills {
        id += 2;
        replay_book.match_order(Order::limit(id, 500, Side::Sell, trade.price, trade.quantity));
        replay_book.match_order(Order::limit(id + 1, 500, Side::Buy, trade.price, trade.quantity));
    }
    assert_eq!(replay_metrics.counter(VOLUME_TRADED), recorded);
}
