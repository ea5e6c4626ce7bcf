//! Iceberg reserves: only a small slice of the order is ever visible in the
//! active book. The reserve rests in the hidden book at the same price and
//! republishes a slice each time the visible one is consumed.
//!
//! A hidden entry reuses `quantity` for the size of its currently published
//! slice, and its `total_quantity` for the untraded remainder including that
//! slice.

use crate::logger::EventLog;
use crate::metrics::{ICEBERG_ORDERS_REFILLED, Metrics, ORDERS_RESTING};
use crate::orderbook::OrderBook;
use crate::orders::{Order, OrderKind, Side, dollars};
use crate::trade::Trade;
use std::collections::{BTreeMap, VecDeque};
use std::time::SystemTime;
use tracing::debug;

impl OrderBook {
    /// Take in a fresh iceberg: match it slice by slice, then rest the first
    /// unfilled slice as the visible order with the reserve behind it.
    ///
    /// Working slices are at most `display_quantity`; a slice that fills
    /// completely while reserve remains rolls straight into the next one, so
    /// the book can never be left crossed against an unpublished reserve.
    pub(crate) fn ingest_iceberg(&mut self, order: Order, trades: &mut Vec<Trade>) {
        let OrderKind::Iceberg {
            total_quantity,
            display_quantity,
        } = order.kind
        else {
            return;
        };
        let Some(price) = order.price else { return };

        let before = trades.len();
        let mut reserve = total_quantity;
        while reserve > 0 {
            let slice = reserve.min(display_quantity);
            let mut working = Order {
                kind: OrderKind::Limit,
                quantity: slice,
                ..order.clone()
            };
            self.fill_against_book(&mut working, trades);
            reserve -= slice - working.quantity;

            if working.quantity > 0 {
                // no liquidity left at this price: publish and stop
                self.publish_reserve(&order, working, reserve, price);
                break;
            }
        }

        if let Some(last) = trades[before..].last().map(|t| t.price) {
            self.last_trade_handle().store(last);
        }
    }

    /// Rest `visible` as a plain limit slice and record the reserve behind
    /// it. `reserve` counts everything untraded, the visible slice included.
    fn publish_reserve(&mut self, original: &Order, visible: Order, reserve: u64, price: u64) {
        let mut entry = original.clone();
        entry.quantity = visible.quantity; // published slice size
        if let OrderKind::Iceberg { total_quantity, .. } = &mut entry.kind {
            *total_quantity = reserve;
        }
        debug!(id = entry.id, visible = visible.quantity, reserve, "iceberg published");

        self.rest(visible);
        let hidden = match original.side {
            Side::Sell => &mut self.iceberg_hidden_asks,
            Side::Buy => &mut self.iceberg_hidden_bids,
        };
        hidden.entry(price).or_default().push_back(entry);
    }
}

/// Refill hook, called by the fill loop when a resting order is consumed to
/// zero. If the order was an iceberg slice, draw down the reserve and push
/// the next slice onto the tail of the level it occupied; refilled slices
/// forfeit time priority.
pub(crate) fn refill_slice(
    hidden: &mut BTreeMap<u64, VecDeque<Order>>,
    queue: &mut VecDeque<Order>,
    consumed: &Order,
    metrics: &Metrics,
    log: &EventLog,
) {
    let Some(price) = consumed.price else { return };
    let Some(entries) = hidden.get_mut(&price) else {
        return;
    };
    let Some(pos) = entries.iter().position(|e| e.id == consumed.id) else {
        return;
    };

    let entry = &mut entries[pos];
    let slice_size = entry.quantity;
    let OrderKind::Iceberg {
        total_quantity,
        display_quantity,
    } = entry.kind
    else {
        return;
    };
    let remaining = total_quantity.saturating_sub(slice_size);

    if remaining == 0 {
        if entry.is_interactive() {
            println!("[ICEBERG COMPLETE] Your ICEBERG order fully executed!");
        }
        debug!(id = consumed.id, "iceberg retired");
        entries.remove(pos);
        if entries.is_empty() {
            hidden.remove(&price);
        }
        return;
    }

    let next = remaining.min(display_quantity);
    entry.kind = OrderKind::Iceberg {
        total_quantity: remaining,
        display_quantity,
    };
    entry.quantity = next;

    let slice = Order {
        kind: OrderKind::Limit,
        quantity: next,
        timestamp: SystemTime::now(),
        ..entry.clone()
    };
    if entry.is_interactive() {
        println!(
            "[ICEBERG REFILL] {next} more units now visible @ ${:.2} (reserve: {})",
            dollars(price),
            remaining - next
        );
    }
    log.order_resting(&slice);
    metrics.incr(ORDERS_RESTING);
    metrics.incr(ICEBERG_ORDERS_REFILLED);
    queue.push_back(slice);
}
