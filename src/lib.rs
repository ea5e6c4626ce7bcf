//! A single-instrument, in-memory limit-order-book matching engine:
//! price–time priority matching for limit, market, stop and iceberg orders,
//! stop-trigger cascades driven by the last-trade price, and a concurrent
//! submit/dispatch/match pipeline over one shared book.

pub mod config;
pub mod engine;
pub mod generator;
mod iceberg;
pub mod logger;
pub mod metrics;
pub mod orderbook;
pub mod orders;
mod stops;
pub mod trade;
pub mod ui;
