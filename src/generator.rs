//! Background order flow: a producer thread that fabricates plausible
//! random orders around the live last-trade price and feeds them into the
//! submission queue.

use crate::config::GeneratorConfig;
use crate::engine::EngineHandle;
use crate::metrics::{BACKGROUND_ORDERS_GENERATED, Metrics, TIMER_BACKGROUND_GENERATION};
use crate::orderbook::LastTrade;
use crate::orders::{Order, OrderIds, Side};
use rand::Rng;
use rand::rngs::ThreadRng;
use rand_distr::{Distribution, Exp};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{info, warn};

pub struct BackgroundGenerator {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundGenerator {
    pub fn start(
        config: GeneratorConfig,
        engine: EngineHandle,
        last_trade: Arc<LastTrade>,
        ids: Arc<OrderIds>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();
        let handle = thread::Builder::new()
            .name("background-generator".into())
            .spawn(move || generate_loop(config, engine, last_trade, ids, metrics, flag))
            .expect("spawn background generator");
        info!("background generator started");
        BackgroundGenerator {
            running,
            handle: Some(handle),
        }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BackgroundGenerator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn generate_loop(
    config: GeneratorConfig,
    engine: EngineHandle,
    last_trade: Arc<LastTrade>,
    ids: Arc<OrderIds>,
    metrics: Arc<Metrics>,
    running: Arc<AtomicBool>,
) {
    let mut rng = rand::rng();
    // Poisson arrivals: exponential inter-arrival times
    let inter_arrival = Exp::new(config.rate_hz).expect("rate_hz must be > 0");

    while running.load(Ordering::SeqCst) {
        {
            let _timer = metrics.timer(TIMER_BACKGROUND_GENERATION);
            let order = random_order(&mut rng, &config, &last_trade, &ids);
            match order.validate() {
                Ok(()) => {
                    engine.submit(order);
                    metrics.incr(BACKGROUND_ORDERS_GENERATED);
                }
                // structural rejection stays on the producer side
                Err(reason) => warn!(%reason, "generated order failed validation"),
            }
        }

        let wait = inter_arrival.sample(&mut rng);
        // cap the nap so stop() stays responsive at low rates
        thread::sleep(Duration::from_secs_f64(wait.min(0.25)));
    }
}

fn random_order(
    rng: &mut ThreadRng,
    config: &GeneratorConfig,
    last_trade: &LastTrade,
    ids: &OrderIds,
) -> Order {
    let id = ids.next();
    let user_id = rng.random_range(1001..=9999);
    let side = if rng.random_bool(0.5) { Side::Buy } else { Side::Sell };
    let quantity = rng.random_range(1..=config.max_quantity);
    let limit_price = rng.random_range(config.min_price..=config.max_price);

    match rng.random_range(0..10u32) {
        0..=3 => Order::limit(id, user_id, side, limit_price, quantity),
        4..=5 => Order::market(id, user_id, side, quantity),
        6..=7 => {
            let (trigger, price) = stop_prices(rng, last_trade, side, true);
            Order::stop_limit(id, user_id, side, trigger, price, quantity)
        }
        8 => {
            let (trigger, _) = stop_prices(rng, last_trade, side, false);
            Order::stop_market(id, user_id, side, trigger, quantity)
        }
        _ => {
            let total = rng.random_range(40..=20 * config.max_quantity.max(2));
            let display = (total / 10).max(1);
            Order::iceberg(id, user_id, side, limit_price, total, display)
        }
    }
}

/// Stop placement relative to the current market: sell stops trigger below
/// the last trade (stop-loss), buy stops above it (breakout). Stop-limit
/// prices stay inside the collar so triggered orders usually survive it.
fn stop_prices(
    rng: &mut ThreadRng,
    last_trade: &LastTrade,
    side: Side,
    with_limit: bool,
) -> (u64, u64) {
    let mut last = last_trade.load();
    if last == 0 {
        last = 9_500;
    }
    let scale = |base: u64, factor: f64| ((base as f64 * factor).round() as u64).max(1);

    match side {
        Side::Sell => {
            let trigger = scale(last, rng.random_range(0.85..0.95));
            let price = if with_limit {
                scale(trigger, rng.random_range(0.95..1.04))
            } else {
                0
            };
            (trigger, price)
        }
        Side::Buy => {
            let trigger = scale(last, rng.random_range(1.05..1.15));
            let price = if with_limit {
                scale(trigger, rng.random_range(1.01..1.05))
            } else {
                0
            };
            (trigger, price)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::OrderKind;

    #[test]
    fn random_orders_are_structurally_valid() {
        let mut rng = rand::rng();
        let config = GeneratorConfig::default();
        let last_trade = LastTrade::new(10_000);
        let ids = OrderIds::new();

        for _ in 0..2_000 {
            let order = random_order(&mut rng, &config, &last_trade, &ids);
            assert_eq!(order.validate(), Ok(()), "invalid order: {order:?}");
            assert!(order.user_id >= 1001);
        }
    }

    #[test]
    fn stop_sells_trigger_below_market_and_buys_above() {
        let mut rng = rand::rng();
        let last_trade = LastTrade::new(10_000);

        for _ in 0..500 {
            let (trigger, price) = stop_prices(&mut rng, &last_trade, Side::Sell, true);
            assert!(trigger < 10_000);
            assert!(price > 0);

            let (trigger, _) = stop_prices(&mut rng, &last_trade, Side::Buy, false);
            assert!(trigger > 10_000);
        }
    }

    #[test]
    fn flow_covers_every_order_kind() {
        let mut rng = rand::rng();
        let config = GeneratorConfig::default();
        let last_trade = LastTrade::new(10_000);
        let ids = OrderIds::new();

        let mut seen = [false; 5];
        for _ in 0..5_000 {
            let order = random_order(&mut rng, &config, &last_trade, &ids);
            let slot = match order.kind {
                OrderKind::Limit => 0,
                OrderKind::Market => 1,
                OrderKind::StopLimit { .. } => 2,
                OrderKind::StopMarket { .. } => 3,
                OrderKind::Iceberg { .. } => 4,
            };
            seen[slot] = true;
        }
        assert!(seen.iter().all(|s| *s), "kind never generated: {seen:?}");
    }
}
