//! Interactive command prompt. Orders entered here carry `user_id = 0`, so
//! the core reports their fills, rests, triggers and rejections back to
//! stdout as they happen.

use crate::engine::EngineHandle;
use crate::metrics::Metrics;
use crate::orderbook::{BookSnapshot, LastTrade, OrderBook, outside_collar};
use crate::orders::{Order, OrderIds, Side, dollars};
use std::io::{self, BufRead};
use std::sync::{Arc, Mutex};

const SNAPSHOT_DEPTH: usize = 10;

pub struct Ui {
    engine: EngineHandle,
    book: Arc<Mutex<OrderBook>>,
    last_trade: Arc<LastTrade>,
    ids: Arc<OrderIds>,
    metrics: Arc<Metrics>,
    collar_bps: u64,
}

impl Ui {
    pub fn new(
        engine: EngineHandle,
        book: Arc<Mutex<OrderBook>>,
        last_trade: Arc<LastTrade>,
        ids: Arc<OrderIds>,
        metrics: Arc<Metrics>,
        collar_bps: u64,
    ) -> Self {
        Ui {
            engine,
            book,
            last_trade,
            ids,
            metrics,
            collar_bps,
        }
    }

    /// Read commands from stdin until `quit` or EOF.
    pub fn run(&self) {
        print_banner();
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if !self.handle_line(line.trim()) {
                break;
            }
        }
    }

    /// Returns false when the session should end.
    fn handle_line(&self, line: &str) -> bool {
        if line.is_empty() {
            return true;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens[0].to_ascii_lowercase().as_str() {
            "quit" | "exit" => return false,
            "price" => {
                println!("Last traded price: ${:.2}", dollars(self.last_trade.load()));
            }
            "book" => self.print_book(),
            "snapshot" => {
                let snap = {
                    let book = self.book.lock().unwrap();
                    BookSnapshot::capture(&book, SNAPSHOT_DEPTH)
                };
                match serde_json::to_string_pretty(&snap) {
                    Ok(json) => println!("{json}"),
                    Err(e) => println!("snapshot failed: {e}"),
                }
            }
            "stats" => print!("{}", self.metrics.report()),
            "help" => print_help(),
            _ => self.handle_order(&tokens),
        }
        true
    }

    fn handle_order(&self, tokens: &[&str]) {
        let Some(side) = parse_side(tokens[0]) else {
            println!("Unknown command. Type 'help' for examples.");
            return;
        };
        if tokens.len() < 2 {
            println!("Missing order type. Type 'help' for examples.");
            return;
        }

        let id = self.ids.next();
        let order = match (tokens[1].to_ascii_uppercase().as_str(), &tokens[2..]) {
            ("LIMIT", &[price, qty]) => match (parse_price(price), parse_qty(qty)) {
                (Some(price), Some(qty)) => Some(Order::limit(id, 0, side, price, qty)),
                _ => None,
            },
            ("MARKET", &[qty]) => parse_qty(qty).map(|qty| Order::market(id, 0, side, qty)),
            ("STOP_LIMIT", &[trigger, limit, qty]) => {
                match (parse_price(trigger), parse_price(limit), parse_qty(qty)) {
                    (Some(trigger), Some(limit), Some(qty)) => {
                        self.warn_if_outside_collar(side, limit);
                        Some(Order::stop_limit(id, 0, side, trigger, limit, qty))
                    }
                    _ => None,
                }
            }
            ("STOP_MARKET", &[trigger, qty]) => match (parse_price(trigger), parse_qty(qty)) {
                (Some(trigger), Some(qty)) => Some(Order::stop_market(id, 0, side, trigger, qty)),
                _ => None,
            },
            ("ICEBERG", &[price, total, display]) => {
                match (parse_price(price), parse_qty(total), parse_qty(display)) {
                    (Some(price), Some(total), Some(display)) => {
                        Some(Order::iceberg(id, 0, side, price, total, display))
                    }
                    _ => None,
                }
            }
            _ => None,
        };

        let Some(order) = order else {
            println!("Invalid format. Type 'help' for command examples.");
            return;
        };
        match order.validate() {
            Ok(()) => {
                println!(
                    "Submitted: {} {} x{} (order {})",
                    order.side.as_str(),
                    order.kind.as_str(),
                    order.quantity,
                    order.id
                );
                self.engine.submit(order);
            }
            Err(reason) => println!("Order rejected: {reason}"),
        }
    }

    /// Advance notice at entry time, on a band twice as wide as the hard
    /// collar: a limit can drift past the collar itself between entry and
    /// trigger, so warning only at the rejection threshold would be too late.
    fn warn_if_outside_collar(&self, side: Side, limit: u64) {
        let last = self.last_trade.load();
        if outside_collar(side, limit, last, 2 * self.collar_bps) {
            println!(
                "WARNING: your {} limit ${:.2} is far from the current price ${:.2}; it will be rejected by the price collar if it triggers near this level.",
                side.as_str(),
                dollars(limit),
                dollars(last)
            );
        }
    }

    fn print_book(&self) {
        let book = self.book.lock().unwrap();
        println!("------ Order Book ------");
        println!("Asks (lowest first):");
        for (price, orders) in book.asks.iter().take(SNAPSHOT_DEPTH) {
            let total: u64 = orders.iter().map(|o| o.quantity).sum();
            println!("  ${:>9.2}  qty {total}", dollars(*price));
        }
        println!("Bids (highest first):");
        for (price, orders) in book.bids.iter().rev().take(SNAPSHOT_DEPTH) {
            let total: u64 = orders.iter().map(|o| o.quantity).sum();
            println!("  ${:>9.2}  qty {total}", dollars(*price));
        }
        println!("Stops parked: {} sell / {} buy",
            book.stop_asks.values().map(|q| q.len()).sum::<usize>(),
            book.stop_bids.values().map(|q| q.len()).sum::<usize>());
        println!("------------------------");
    }
}

fn parse_side(token: &str) -> Option<Side> {
    match token.to_ascii_uppercase().as_str() {
        "BUY" => Some(Side::Buy),
        "SELL" => Some(Side::Sell),
        _ => None,
    }
}

/// Prices are entered in dollars and stored in cents.
fn parse_price(token: &str) -> Option<u64> {
    let value: f64 = token.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * 100.0).round() as u64)
}

fn parse_qty(token: &str) -> Option<u64> {
    token.parse().ok()
}

fn print_banner() {
    println!("Market simulator ready. Commands:");
    println!("- BUY/SELL LIMIT <price> <quantity>");
    println!("- BUY/SELL MARKET <quantity>");
    println!("- BUY/SELL STOP_LIMIT <trigger_price> <limit_price> <quantity>");
    println!("- BUY/SELL STOP_MARKET <trigger_price> <quantity>");
    println!("- BUY/SELL ICEBERG <price> <total> <display>");
    println!("- price | book | snapshot | stats | help | quit");
}

fn print_help() {
    println!("Order types:");
    println!("- LIMIT: executes at your price or better, rests otherwise.");
    println!("    BUY LIMIT 99.50 10");
    println!("- MARKET: executes immediately at the best available price.");
    println!("    SELL MARKET 5");
    println!("- STOP_LIMIT: inert until the last trade reaches the trigger,");
    println!("  then becomes a LIMIT order. SELL stops trigger on a drop,");
    println!("  BUY stops on a rise. The exchange enforces a price collar;");
    println!("  limits too far from the market are rejected at trigger time.");
    println!("    SELL STOP_LIMIT 95.00 94.50 10");
    println!("- STOP_MARKET: like STOP_LIMIT but executes at market.");
    println!("    BUY STOP_MARKET 105.00 5");
    println!("- ICEBERG: rests showing only the display quantity, refilling");
    println!("  from the hidden reserve as slices fill.");
    println!("    BUY ICEBERG 100.00 1000 100");
}
