use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,  //Bid
    Sell, //Ask
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Order kind, with the per-kind fields living on the variant.
///
/// The active books only ever hold `Limit`-shaped orders; the full tagged
/// value rests in the stop books (`StopLimit`/`StopMarket`, keyed by trigger)
/// and the iceberg hidden books (`Iceberg`, tracking the reserve).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Limit,
    Market,
    StopLimit { trigger_price: u64 },
    StopMarket { trigger_price: u64 },
    Iceberg { total_quantity: u64, display_quantity: u64 },
}

impl OrderKind {
    pub fn is_stop(&self) -> bool {
        matches!(
            self,
            OrderKind::StopLimit { .. } | OrderKind::StopMarket { .. }
        )
    }

    pub fn trigger_price(&self) -> Option<u64> {
        match self {
            OrderKind::StopLimit { trigger_price } | OrderKind::StopMarket { trigger_price } => {
                Some(*trigger_price)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Limit => "LIMIT",
            OrderKind::Market => "MARKET",
            OrderKind::StopLimit { .. } => "STOP_LIMIT",
            OrderKind::StopMarket { .. } => "STOP_MARKET",
            OrderKind::Iceberg { .. } => "ICEBERG",
        }
    }
}

/// A single-instrument order. Prices are integer cents, quantities integer
/// units. `price` is `None` where no limit applies (MARKET, and STOP_MARKET
/// after activation).
///
/// `quantity` is the remaining quantity; for a resting iceberg slice it is
/// the currently visible portion.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: u64,
    /// `0` marks an interactive (user-entered) order for reporting.
    pub user_id: u64,
    pub kind: OrderKind,
    pub side: Side,
    pub price: Option<u64>,
    pub quantity: u64,
    pub timestamp: SystemTime,
}

impl Order {
    pub fn limit(id: u64, user_id: u64, side: Side, price: u64, quantity: u64) -> Self {
        Order {
            id,
            user_id,
            kind: OrderKind::Limit,
            side,
            price: Some(price),
            quantity,
            timestamp: SystemTime::now(),
        }
    }

    pub fn market(id: u64, user_id: u64, side: Side, quantity: u64) -> Self {
        Order {
            id,
            user_id,
            kind: OrderKind::Market,
            side,
            price: None,
            quantity,
            timestamp: SystemTime::now(),
        }
    }

    pub fn stop_limit(
        id: u64,
        user_id: u64,
        side: Side,
        trigger_price: u64,
        price: u64,
        quantity: u64,
    ) -> Self {
        Order {
            id,
            user_id,
            kind: OrderKind::StopLimit { trigger_price },
            side,
            price: Some(price),
            quantity,
            timestamp: SystemTime::now(),
        }
    }

    pub fn stop_market(
        id: u64,
        user_id: u64,
        side: Side,
        trigger_price: u64,
        quantity: u64,
    ) -> Self {
        Order {
            id,
            user_id,
            kind: OrderKind::StopMarket { trigger_price },
            side,
            price: None,
            quantity,
            timestamp: SystemTime::now(),
        }
    }

    pub fn iceberg(
        id: u64,
        user_id: u64,
        side: Side,
        price: u64,
        total_quantity: u64,
        display_quantity: u64,
    ) -> Self {
        Order {
            id,
            user_id,
            kind: OrderKind::Iceberg {
                total_quantity,
                display_quantity,
            },
            side,
            price: Some(price),
            quantity: total_quantity,
            timestamp: SystemTime::now(),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.user_id == 0
    }

    /// Does this (working) order cross a resting level at `book_price`?
    pub fn crosses(&self, book_price: u64) -> bool {
        if self.kind == OrderKind::Market {
            return true;
        }
        match self.price {
            Some(limit) => match self.side {
                Side::Buy => limit >= book_price,
                Side::Sell => limit <= book_price,
            },
            None => false,
        }
    }

    /// Structural validation. Producers run this before `submit`; the core
    /// assumes it has already passed.
    pub fn validate(&self) -> Result<(), OrderRejection> {
        if self.quantity == 0 {
            return Err(OrderRejection::ZeroQuantity);
        }
        match self.kind {
            OrderKind::Limit => {
                if self.price.unwrap_or(0) == 0 {
                    return Err(OrderRejection::MissingLimitPrice);
                }
            }
            OrderKind::Market => {}
            OrderKind::StopLimit { trigger_price } => {
                if trigger_price == 0 {
                    return Err(OrderRejection::MissingTriggerPrice);
                }
                if self.price.unwrap_or(0) == 0 {
                    return Err(OrderRejection::MissingLimitPrice);
                }
            }
            OrderKind::StopMarket { trigger_price } => {
                if trigger_price == 0 {
                    return Err(OrderRejection::MissingTriggerPrice);
                }
            }
            OrderKind::Iceberg {
                total_quantity,
                display_quantity,
            } => {
                if self.price.unwrap_or(0) == 0 {
                    return Err(OrderRejection::MissingLimitPrice);
                }
                if display_quantity == 0 || display_quantity >= total_quantity {
                    return Err(OrderRejection::BadIcebergShape);
                }
                if self.quantity != total_quantity {
                    return Err(OrderRejection::BadIcebergShape);
                }
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum OrderRejection {
    #[error("quantity must be > 0")]
    ZeroQuantity,
    #[error("limit price must be > 0")]
    MissingLimitPrice,
    #[error("stop orders need a trigger price > 0")]
    MissingTriggerPrice,
    #[error("iceberg display must be positive and smaller than the total")]
    BadIcebergShape,
}

/// Session-wide monotonic order id allocator, shared by all producers.
pub struct OrderIds {
    next: AtomicU64,
}

impl OrderIds {
    pub fn new() -> Self {
        OrderIds {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for OrderIds {
    fn default() -> Self {
        OrderIds::new()
    }
}

/// Render integer cents as dollars, e.g. `10_050` -> `100.50`.
pub fn dollars(cents: u64) -> f64 {
    cents as f64 / 100.0
}
