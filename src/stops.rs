//! Stop-order lifecycle: parking, arming against last-trade moves, collar
//! enforcement, and the bounded trigger cascade.

use crate::metrics::{
    STOP_ORDERS_PLACED, STOP_ORDERS_REJECTED, STOP_ORDERS_TRIGGERED, TIMER_STOP_TRIGGER_CHECK,
};
use crate::orderbook::{OrderBook, outside_collar};
use crate::orders::{Order, OrderKind, Side, dollars};
use crate::trade::Trade;
use tracing::{debug, warn};

impl OrderBook {
    /// Park a stop order in its trigger book; stops never match on arrival.
    pub(crate) fn place_stop(&mut self, order: Order) {
        let Some(trigger) = order.kind.trigger_price() else {
            return;
        };
        self.metrics.incr(STOP_ORDERS_PLACED);
        if order.is_interactive() {
            let relation = if order.side == Side::Buy { ">=" } else { "<=" };
            println!(
                "[STOP] Your {} {} order placed. Will trigger when price {relation} ${:.2}",
                order.kind.as_str(),
                order.side.as_str(),
                dollars(trigger)
            );
        }
        let book = match order.side {
            Side::Sell => &mut self.stop_asks,
            Side::Buy => &mut self.stop_bids,
        };
        book.entry(trigger).or_default().push_back(order);
    }

    /// Run the trigger cascade until no stop is armed at the current
    /// last-trade price.
    ///
    /// One stop is popped, activated and matched per step; every step
    /// re-reads the last-trade price and re-scans from the best armed level,
    /// because the step's own fills may have armed more levels. Sells scan
    /// ascending trigger order, buys descending, FIFO within a level.
    pub(crate) fn check_stop_triggers(&mut self, trades: &mut Vec<Trade>) {
        let metrics = self.metrics.clone();
        let _timer = metrics.timer(TIMER_STOP_TRIGGER_CHECK);
        let mut fuel = self.trigger_fuel;

        loop {
            let last = self.last_trade_handle().load();
            let Some(stop) = self.pop_armed_stop(last) else {
                break;
            };
            if fuel == 0 {
                // Leaves the book consistent; the caller holds the lock and
                // the poisoned lock stops the pipeline.
                panic!(
                    "stop trigger cascade did not converge within {} triggers",
                    self.trigger_fuel
                );
            }
            fuel -= 1;

            let Some(active) = self.activate(stop, last) else {
                continue; // collar rejection
            };
            self.metrics.incr(STOP_ORDERS_TRIGGERED);
            debug!(id = active.id, last, "stop triggered");
            if active.is_interactive() {
                println!(
                    "[STOP TRIGGERED] Your STOP {} triggered at ${:.2} -> executing {} order",
                    active.side.as_str(),
                    dollars(last),
                    active.kind.as_str()
                );
            }
            self.execute(active, trades);
        }
    }

    /// Pop the next armed stop in deterministic order: stop sells first
    /// (lowest armed trigger), then stop buys (highest armed trigger).
    fn pop_armed_stop(&mut self, last: u64) -> Option<Order> {
        // Stop SELL arms when last <= trigger: armed levels are `last..`.
        if let Some(level) = self.stop_asks.range(last..).next().map(|(k, _)| *k) {
            if let Some(queue) = self.stop_asks.get_mut(&level) {
                let order = queue.pop_front();
                if queue.is_empty() {
                    self.stop_asks.remove(&level);
                }
                if order.is_some() {
                    return order;
                }
            }
        }
        // Stop BUY arms when last >= trigger: armed levels are `..=last`.
        if let Some(level) = self.stop_bids.range(..=last).next_back().map(|(k, _)| *k) {
            if let Some(queue) = self.stop_bids.get_mut(&level) {
                let order = queue.pop_front();
                if queue.is_empty() {
                    self.stop_bids.remove(&level);
                }
                if order.is_some() {
                    return order;
                }
            }
        }
        None
    }

    /// Transform a popped stop for execution. STOP_MARKET becomes MARKET;
    /// STOP_LIMIT becomes LIMIT unless its limit sits outside the price
    /// collar around the arming trade, in which case it is discarded.
    fn activate(&mut self, mut order: Order, last: u64) -> Option<Order> {
        match order.kind {
            OrderKind::StopMarket { .. } => {
                order.kind = OrderKind::Market;
                order.price = None;
                Some(order)
            }
            OrderKind::StopLimit { .. } => {
                let limit = order.price.unwrap_or(0);
                if outside_collar(order.side, limit, last, self.collar_bps) {
                    self.metrics.incr(STOP_ORDERS_REJECTED);
                    warn!(id = order.id, limit, last, "stop limit outside price collar");
                    if order.is_interactive() {
                        println!(
                            "[ORDER REJECTED] Your STOP {} limit ${:.2} exceeds the allowed deviation from market price ${:.2} (exchange price collar)",
                            order.side.as_str(),
                            dollars(limit),
                            dollars(last)
                        );
                    }
                    return None;
                }
                order.kind = OrderKind::Limit;
                Some(order)
            }
            _ => Some(order),
        }
    }
}
