use crate::orders::Side;
use std::time::SystemTime;

/// A trade is a matched transaction between two orders.
///
/// - The price comes from the maker (the resting order).
/// - The taker is the incoming order that triggered the fill.
#[derive(Debug, Clone)]
pub struct Trade {
    /// Match price in cents.
    pub price: u64,
    pub quantity: u64,
    pub taker_id: u64,
    pub maker_id: u64,
    pub taker_side: Side,
    pub timestamp: SystemTime,
}
