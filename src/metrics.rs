//! Named counters and timing stats for the engine. Fire-and-forget: every
//! operation takes a short leaf lock and never blocks matching on failure.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const ORDERS_SUBMITTED: &str = "Orders_Submitted";
pub const ORDERS_DISPATCHED: &str = "Orders_Dispatched";
pub const ORDERS_PROCESSED: &str = "Orders_Processed";
pub const ORDERS_MATCHED: &str = "Orders_Matched";
pub const ORDERS_RESTING: &str = "Orders_Resting";
pub const ORDERS_COMPLETED: &str = "Orders_Completed";
/// Traded quantity in integer cents (units x 100).
pub const VOLUME_TRADED: &str = "Volume_Traded";
pub const STOP_ORDERS_PLACED: &str = "Stop_Orders_Placed";
pub const STOP_ORDERS_TRIGGERED: &str = "Stop_Orders_Triggered";
pub const STOP_ORDERS_REJECTED: &str = "Stop_Orders_Rejected";
pub const ICEBERG_ORDERS_REFILLED: &str = "Iceberg_Orders_Refilled";
pub const BACKGROUND_ORDERS_GENERATED: &str = "Background_Orders_Generated";

pub const TIMER_ORDERBOOK_MATCH: &str = "OrderBook_Match";
pub const TIMER_ORDER_PROCESSING: &str = "Order_Processing";
pub const TIMER_STOP_TRIGGER_CHECK: &str = "Stop_Trigger_Check";
pub const TIMER_ORDER_SUBMISSION: &str = "Order_Submission";
pub const TIMER_ORDER_QUEUE_WAIT: &str = "Order_Queue_Wait";
pub const TIMER_BACKGROUND_GENERATION: &str = "Background_Order_Generation";

#[derive(Clone, Copy)]
struct TimerStats {
    total: Duration,
    count: u64,
    min: Duration,
    max: Duration,
}

impl TimerStats {
    fn record(&mut self, elapsed: Duration) {
        self.total += elapsed;
        self.count += 1;
        self.min = self.min.min(elapsed);
        self.max = self.max.max(elapsed);
    }
}

impl Default for TimerStats {
    fn default() -> Self {
        TimerStats {
            total: Duration::ZERO,
            count: 0,
            min: Duration::MAX,
            max: Duration::ZERO,
        }
    }
}

pub struct Metrics {
    counters: Mutex<HashMap<&'static str, u64>>,
    timers: Mutex<HashMap<&'static str, TimerStats>>,
    started: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            counters: Mutex::new(HashMap::new()),
            timers: Mutex::new(HashMap::new()),
            started: Instant::now(),
        }
    }

    pub fn incr(&self, name: &'static str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &'static str, value: u64) {
        if let Ok(mut counters) = self.counters.lock() {
            *counters.entry(name).or_insert(0) += value;
        }
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .map(|c| c.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// RAII timer: records elapsed time under `name` when dropped.
    pub fn timer(&self, name: &'static str) -> TimerGuard<'_> {
        TimerGuard {
            metrics: self,
            name,
            start: Instant::now(),
        }
    }

    pub fn timer_count(&self, name: &str) -> u64 {
        self.timers
            .lock()
            .map(|t| t.get(name).map(|s| s.count).unwrap_or(0))
            .unwrap_or(0)
    }

    fn record(&self, name: &'static str, elapsed: Duration) {
        if let Ok(mut timers) = self.timers.lock() {
            timers.entry(name).or_default().record(elapsed);
        }
    }

    /// Formatted end-of-session report.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let uptime = self.started.elapsed().as_secs_f64();
        out.push_str("=== PERFORMANCE REPORT ===\n");
        out.push_str(&format!("Session uptime: {uptime:.1}s\n"));

        out.push_str("\nCounters:\n");
        if let Ok(counters) = self.counters.lock() {
            let mut rows: Vec<_> = counters.iter().collect();
            rows.sort_by_key(|(name, _)| *name);
            for (name, value) in rows {
                out.push_str(&format!("  {:<28} {}\n", name.replace('_', " "), value));
            }
        }

        out.push_str("\nTimings (avg/min/max ms):\n");
        if let Ok(timers) = self.timers.lock() {
            let mut rows: Vec<_> = timers.iter().collect();
            rows.sort_by_key(|(name, _)| *name);
            for (name, stats) in rows {
                if stats.count == 0 {
                    continue;
                }
                let avg = stats.total.as_secs_f64() * 1000.0 / stats.count as f64;
                let rate = stats.count as f64 / uptime.max(f64::EPSILON);
                out.push_str(&format!(
                    "  {:<28} {:>8.4} / {:>8.4} / {:>8.4}  ({} calls, {:.0}/s)\n",
                    name.replace('_', " "),
                    avg,
                    stats.min.as_secs_f64() * 1000.0,
                    stats.max.as_secs_f64() * 1000.0,
                    stats.count,
                    rate,
                ));
            }
        }
        out.push_str("==========================\n");
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::new()
    }
}

pub struct TimerGuard<'a> {
    metrics: &'a Metrics,
    name: &'static str,
    start: Instant,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.metrics.record(self.name, self.start.elapsed());
    }
}
