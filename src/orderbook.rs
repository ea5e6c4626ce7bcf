use crate::config::EngineConfig;
use crate::iceberg;
use crate::logger::EventLog;
use crate::metrics::{
    Metrics, ORDERS_MATCHED, ORDERS_PROCESSED, ORDERS_RESTING, TIMER_ORDERBOOK_MATCH,
    VOLUME_TRADED,
};
use crate::orders::{Order, OrderKind, Side, dollars};
use crate::trade::Trade;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::debug;

/// Last-traded price in cents, readable without taking the book lock.
/// Writes happen only while the book lock is held.
pub struct LastTrade(AtomicU64);

impl LastTrade {
    pub fn new(cents: u64) -> Self {
        LastTrade(AtomicU64::new(cents))
    }

    pub fn load(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn store(&self, cents: u64) {
        self.0.store(cents, Ordering::Release);
    }
}

/// An [`OrderBook`] keeps resting orders in price-keyed [`BTreeMap`]s, one
/// FIFO [`VecDeque`] per price level:
///
/// - `bids` / `asks`: active limit orders (iceberg slices included).
/// - `stop_bids` / `stop_asks`: inert stop orders keyed by trigger price.
/// - `iceberg_hidden_bids` / `iceberg_hidden_asks`: iceberg reserves backing
///   the currently visible slices.
///
/// All mutation happens through [`OrderBook::match_order`] under the caller's
/// exclusive access; one match, including any stop cascade and iceberg
/// refills, is a single atomic unit with respect to other matches.
pub struct OrderBook {
    /// Buy orders, keyed by price; best (highest) scanned via the map tail.
    pub bids: BTreeMap<u64, VecDeque<Order>>,
    /// Sell orders, keyed by price; best (lowest) scanned via the map head.
    pub asks: BTreeMap<u64, VecDeque<Order>>,
    /// Stop SELL orders: armed when last trade <= trigger.
    pub stop_asks: BTreeMap<u64, VecDeque<Order>>,
    /// Stop BUY orders: armed when last trade >= trigger.
    pub stop_bids: BTreeMap<u64, VecDeque<Order>>,
    pub iceberg_hidden_asks: BTreeMap<u64, VecDeque<Order>>,
    pub iceberg_hidden_bids: BTreeMap<u64, VecDeque<Order>>,

    last_trade: Arc<LastTrade>,
    pub(crate) collar_bps: u64,
    pub(crate) trigger_fuel: u32,
    pub(crate) metrics: Arc<Metrics>,
    pub(crate) log: Arc<EventLog>,
}

impl OrderBook {
    pub fn new(config: &EngineConfig, metrics: Arc<Metrics>, log: Arc<EventLog>) -> Self {
        OrderBook {
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            stop_asks: BTreeMap::new(),
            stop_bids: BTreeMap::new(),
            iceberg_hidden_asks: BTreeMap::new(),
            iceberg_hidden_bids: BTreeMap::new(),
            last_trade: Arc::new(LastTrade::new(config.initial_last_trade)),
            collar_bps: config.collar_bps,
            trigger_fuel: config.trigger_fuel,
            metrics,
            log,
        }
    }

    /// Handle for lock-free reads of the last-traded price.
    pub fn last_trade_handle(&self) -> Arc<LastTrade> {
        self.last_trade.clone()
    }

    pub fn best_bid(&self) -> Option<u64> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<u64> {
        self.asks.keys().next().copied()
    }

    /// Match one incoming order against the book and return the fills it
    /// produced, including fills from any stop cascade it set off.
    ///
    /// Stop orders are parked in their trigger book instead of matching.
    /// Market residues are discarded; limit residues rest; iceberg residues
    /// rest as a visible slice backed by a hidden reserve.
    pub fn match_order(&mut self, order: Order) -> Vec<Trade> {
        let metrics = self.metrics.clone();
        let _timer = metrics.timer(TIMER_ORDERBOOK_MATCH);
        debug!(id = order.id, kind = order.kind.as_str(), side = order.side.as_str(), "match");
        self.log.order_submitted(&order);

        let mut trades = Vec::new();
        match order.kind {
            OrderKind::StopLimit { .. } | OrderKind::StopMarket { .. } => {
                self.place_stop(order);
                return trades;
            }
            OrderKind::Iceberg { .. } => {
                self.metrics.incr(ORDERS_PROCESSED);
                self.ingest_iceberg(order, &mut trades);
            }
            _ => {
                self.metrics.incr(ORDERS_PROCESSED);
                self.execute(order, &mut trades);
            }
        }

        if !trades.is_empty() {
            self.check_stop_triggers(&mut trades);
        }
        trades
    }

    /// Match an active (LIMIT/MARKET-shaped) order, rest any limit residue,
    /// and propagate the last fill price. Does not run the trigger scan;
    /// callers own that so cascades stay a single bounded loop.
    pub(crate) fn execute(&mut self, mut order: Order, trades: &mut Vec<Trade>) {
        let before = trades.len();
        self.fill_against_book(&mut order, trades);

        if order.quantity > 0 {
            match order.kind {
                OrderKind::Limit => self.rest(order),
                // market residue never rests
                _ => debug!(id = order.id, residue = order.quantity, "discarding market residue"),
            }
        }

        if let Some(last) = trades[before..].last().map(|t| t.price) {
            self.last_trade.store(last);
        }
    }

    /// Price–time priority fill loop: walk the opposite book from its best
    /// price, consuming each level FIFO. Trades print at the resting price.
    /// An iceberg slice consumed to zero refills from its reserve in place,
    /// at the tail of the level it occupied.
    pub(crate) fn fill_against_book(&mut self, taker: &mut Order, trades: &mut Vec<Trade>) {
        let (book, hidden) = match taker.side {
            Side::Buy => (&mut self.asks, &mut self.iceberg_hidden_asks),
            Side::Sell => (&mut self.bids, &mut self.iceberg_hidden_bids),
        };
        let metrics = &self.metrics;
        let log = &self.log;

        while taker.quantity > 0 {
            let best = match taker.side {
                Side::Buy => book.keys().next().copied(),
                Side::Sell => book.keys().next_back().copied(),
            };
            let Some(level) = best else { break };
            if !taker.crosses(level) {
                break;
            }
            let Some(queue) = book.get_mut(&level) else { break };

            while taker.quantity > 0 {
                let Some(resting) = queue.front_mut() else { break };
                let fill = taker.quantity.min(resting.quantity);

                log.trade(taker, resting, level, fill);
                metrics.incr(ORDERS_MATCHED);
                metrics.add(VOLUME_TRADED, fill * 100);
                if taker.is_interactive() {
                    let verb = if taker.side == Side::Buy { "bought" } else { "sold" };
                    println!("[MATCH] You {verb} {fill} units @ ${:.2}", dollars(level));
                } else if resting.is_interactive() {
                    println!(
                        "[MATCH] Your resting {} order executed: {fill} units @ ${:.2}",
                        resting.side.as_str(),
                        dollars(level)
                    );
                }

                trades.push(Trade {
                    price: level,
                    quantity: fill,
                    taker_id: taker.id,
                    maker_id: resting.id,
                    taker_side: taker.side,
                    timestamp: SystemTime::now(),
                });

                taker.quantity -= fill;
                resting.quantity -= fill;

                if resting.quantity == 0 {
                    if let Some(consumed) = queue.pop_front() {
                        iceberg::refill_slice(hidden, queue, &consumed, metrics, log);
                    }
                }
            }

            let emptied = queue.is_empty();
            if emptied {
                book.remove(&level);
            }
        }
    }

    /// Append a limit residue to its own side at its limit price.
    pub(crate) fn rest(&mut self, order: Order) {
        let Some(price) = order.price else { return };
        self.log.order_resting(&order);
        self.metrics.incr(ORDERS_RESTING);
        if order.is_interactive() {
            println!(
                "[RESTING] Your {} order for {} units @ ${:.2} is now in the order book waiting for a match.",
                order.side.as_str(),
                order.quantity,
                dollars(price)
            );
        }
        let side_book = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        side_book.entry(price).or_default().push_back(order);
    }
}

/// Is a stop-limit's post-trigger limit outside the price collar around
/// `last`? Pure integer comparison; the exact collar edge passes.
pub fn outside_collar(side: Side, limit: u64, last: u64, collar_bps: u64) -> bool {
    let limit = limit as u128 * 10_000;
    let last = last as u128;
    match side {
        Side::Sell => limit > last * (10_000 + collar_bps as u128),
        Side::Buy => limit < last * (10_000 - collar_bps as u128),
    }
}

/// Aggregated depth view for display and the `snapshot` command.
#[derive(Debug, Serialize)]
pub struct BookSnapshot {
    pub last_trade: f64,
    pub bids: Vec<LevelSnapshot>,
    pub asks: Vec<LevelSnapshot>,
}

#[derive(Debug, Serialize)]
pub struct LevelSnapshot {
    pub price: f64,
    pub quantity: u64,
    pub orders: usize,
}

impl BookSnapshot {
    pub fn capture(book: &OrderBook, depth: usize) -> Self {
        let level = |(price, queue): (&u64, &VecDeque<Order>)| LevelSnapshot {
            price: dollars(*price),
            quantity: queue.iter().map(|o| o.quantity).sum(),
            orders: queue.len(),
        };
        BookSnapshot {
            last_trade: dollars(book.last_trade.load()),
            bids: book.bids.iter().rev().take(depth).map(level).collect(),
            asks: book.asks.iter().take(depth).map(level).collect(),
        }
    }
}
