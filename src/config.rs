use std::thread;

/// Knobs for the matching core and its pipeline. Everything has a sensible
/// default; nothing is read from the environment or from files.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Matching worker threads.
    pub workers: usize,
    /// Price-collar half-width in basis points (500 = 5% each side).
    pub collar_bps: u64,
    /// Initial last-traded price in cents.
    pub initial_last_trade: u64,
    /// Stop triggers allowed per outer match before the cascade is declared
    /// pathological.
    pub trigger_fuel: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            workers: default_workers(),
            collar_bps: 500,
            initial_last_trade: 10_000,
            trigger_fuel: 10_000,
        }
    }
}

pub fn default_workers() -> usize {
    let hw = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    hw.max(4)
}

/// Shape of the background order flow.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Mean order arrival rate (Poisson), orders per second.
    pub rate_hz: f64,
    /// Limit-price band for random flow, in cents.
    pub min_price: u64,
    pub max_price: u64,
    pub max_quantity: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            rate_hz: 500.0,
            min_price: 7_000,
            max_price: 12_000,
            max_quantity: 10,
        }
    }
}
