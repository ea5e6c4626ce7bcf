//! Append-only CSV audit log: one stream for order events, one for trades.
//!
//! The sink is best-effort. A stream that cannot be opened is reported once
//! to stderr and disabled; matching is never blocked or failed by logging.

use crate::orders::{Order, dollars};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const ORDERS_HEADER: &str = "timestamp,id,user_id,kind,side,price,quantity,trigger_price,status";
const TRADES_HEADER: &str =
    "timestamp,incoming_id,resting_id,match_price,match_quantity,incoming_side,resting_side";

pub struct EventLog {
    orders: Mutex<Option<File>>,
    trades: Mutex<Option<File>>,
}

impl EventLog {
    /// Open (or create) `orders.csv` and `trades.csv` under `dir`.
    pub fn open(dir: &Path) -> EventLog {
        if let Err(e) = fs::create_dir_all(dir) {
            eprintln!("warning: could not create log directory {dir:?}: {e}");
        }
        EventLog {
            orders: Mutex::new(open_stream(dir.join("orders.csv"), ORDERS_HEADER)),
            trades: Mutex::new(open_stream(dir.join("trades.csv"), TRADES_HEADER)),
        }
    }

    /// A sink that drops everything. Used by tests and benchmarks.
    pub fn disabled() -> EventLog {
        EventLog {
            orders: Mutex::new(None),
            trades: Mutex::new(None),
        }
    }

    pub fn order_submitted(&self, order: &Order) {
        self.order_row(order, "SUBMITTED");
    }

    pub fn order_resting(&self, order: &Order) {
        self.order_row(order, "RESTING");
    }

    fn order_row(&self, order: &Order, status: &str) {
        let Ok(mut guard) = self.orders.lock() else {
            return;
        };
        let Some(file) = guard.as_mut() else {
            return;
        };
        let _ = writeln!(
            file,
            "{},{},{},{},{},{:.2},{:.2},{:.2},{}",
            epoch_millis(),
            order.id,
            order.user_id,
            order.kind.as_str(),
            order.side.as_str(),
            dollars(order.price.unwrap_or(0)),
            order.quantity as f64,
            dollars(order.kind.trigger_price().unwrap_or(0)),
            status,
        );
    }

    pub fn trade(&self, incoming: &Order, resting: &Order, price: u64, quantity: u64) {
        let Ok(mut guard) = self.trades.lock() else {
            return;
        };
        let Some(file) = guard.as_mut() else {
            return;
        };
        let _ = writeln!(
            file,
            "{},{},{},{:.2},{:.2},{},{}",
            epoch_millis(),
            incoming.id,
            resting.id,
            dollars(price),
            quantity as f64,
            incoming.side.as_str(),
            resting.side.as_str(),
        );
    }
}

fn open_stream(path: PathBuf, header: &str) -> Option<File> {
    let file = OpenOptions::new().create(true).append(true).open(&path);
    match file {
        Ok(mut file) => {
            let empty = file.metadata().map(|m| m.len() == 0).unwrap_or(false);
            if empty {
                let _ = writeln!(file, "{header}");
            }
            Some(file)
        }
        Err(e) => {
            eprintln!("warning: could not open log file {path:?}: {e}");
            None
        }
    }
}

fn epoch_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::Side;

    #[test]
    fn order_rows_carry_header_and_two_decimal_prices() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path());

        let order = Order::stop_limit(42, 0, Side::Sell, 9_500, 9_450, 10);
        log.order_submitted(&order);

        let contents = fs::read_to_string(dir.path().join("orders.csv")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), ORDERS_HEADER);
        let row = lines.next().unwrap();
        assert!(row.contains(",42,0,STOP_LIMIT,SELL,94.50,10.00,95.00,SUBMITTED"));
    }

    #[test]
    fn trade_rows_carry_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let log = EventLog::open(dir.path());

        let taker = Order::market(7, 1234, Side::Buy, 3);
        let maker = Order::limit(5, 0, Side::Sell, 10_000, 3);
        log.trade(&taker, &maker, 10_000, 3);

        let contents = fs::read_to_string(dir.path().join("trades.csv")).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next().unwrap(), TRADES_HEADER);
        assert!(lines.next().unwrap().contains(",7,5,100.00,3.00,BUY,SELL"));
    }

    #[test]
    fn reopening_does_not_duplicate_headers() {
        let dir = tempfile::tempdir().unwrap();
        {
            let log = EventLog::open(dir.path());
            log.order_submitted(&Order::limit(1, 9, Side::Buy, 100, 1));
        }
        {
            let log = EventLog::open(dir.path());
            log.order_submitted(&Order::limit(2, 9, Side::Buy, 100, 1));
        }
        let contents = fs::read_to_string(dir.path().join("orders.csv")).unwrap();
        let headers = contents
            .lines()
            .filter(|l| *l == ORDERS_HEADER)
            .count();
        assert_eq!(headers, 1);
        assert_eq!(contents.lines().count(), 3);
    }

    #[test]
    fn disabled_sink_swallows_everything() {
        let log = EventLog::disabled();
        log.order_submitted(&Order::limit(1, 9, Side::Buy, 100, 1));
        log.trade(
            &Order::market(2, 9, Side::Buy, 1),
            &Order::limit(1, 9, Side::Sell, 100, 1),
            100,
            1,
        );
    }
}
