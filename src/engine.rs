//! Ingest pipeline: producers push into a FIFO submission queue, one
//! dispatcher thread hands orders to a worker pool, and workers run the
//! match under the book's exclusive lock.
//!
//! Matches must execute in dispatch order. Workers therefore clear a
//! sequence turnstile before taking the book lock: the pool pipelines
//! dequeueing and bookkeeping, but the critical sections run strictly FIFO.

use crate::config::EngineConfig;
use crate::logger::EventLog;
use crate::metrics::{
    Metrics, ORDERS_COMPLETED, ORDERS_DISPATCHED, ORDERS_SUBMITTED, TIMER_ORDER_PROCESSING,
    TIMER_ORDER_QUEUE_WAIT, TIMER_ORDER_SUBMISSION,
};
use crate::orderbook::{LastTrade, OrderBook};
use crate::orders::Order;
use crossbeam::channel::{self, Receiver, Sender};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{error, info};

struct Submission {
    queue: Mutex<VecDeque<Order>>,
    ready: Condvar,
    running: AtomicBool,
}

/// Serializes workers into dispatch order.
struct Turnstile {
    next: Mutex<u64>,
    turn: Condvar,
}

impl Turnstile {
    fn new() -> Self {
        Turnstile {
            next: Mutex::new(0),
            turn: Condvar::new(),
        }
    }

    fn wait_for(&self, seq: u64) {
        let mut next = self.next.lock().unwrap();
        while *next != seq {
            next = self.turn.wait(next).unwrap();
        }
    }

    fn advance(&self) {
        let mut next = self.next.lock().unwrap();
        *next += 1;
        drop(next);
        self.turn.notify_all();
    }
}

/// Advances the turnstile when dropped, so a panicking worker cannot stall
/// the sequence behind it.
struct TurnstileGuard<'a>(&'a Turnstile);

impl Drop for TurnstileGuard<'_> {
    fn drop(&mut self) {
        self.0.advance();
    }
}

/// Cheap clonable submission front for producers (UI, generator).
#[derive(Clone)]
pub struct EngineHandle {
    shared: Arc<Submission>,
    metrics: Arc<Metrics>,
}

impl EngineHandle {
    /// O(1) enqueue; never blocks on matching. Orders submitted after
    /// `stop` are dropped silently.
    pub fn submit(&self, order: Order) {
        let _timer = self.metrics.timer(TIMER_ORDER_SUBMISSION);
        self.metrics.incr(ORDERS_SUBMITTED);
        if !self.shared.running.load(Ordering::SeqCst) {
            return;
        }
        let mut queue = self.shared.queue.lock().unwrap();
        queue.push_back(order);
        drop(queue);
        self.shared.ready.notify_one();
    }

    pub fn queued(&self) -> usize {
        self.shared.queue.lock().map(|q| q.len()).unwrap_or(0)
    }
}

pub struct Engine {
    shared: Arc<Submission>,
    metrics: Arc<Metrics>,
    book: Arc<Mutex<OrderBook>>,
    last_trade: Arc<LastTrade>,
    dispatcher: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Build the book and spin up the dispatcher and worker threads.
    pub fn start(config: &EngineConfig, metrics: Arc<Metrics>, log: Arc<EventLog>) -> Engine {
        let book = OrderBook::new(config, metrics.clone(), log);
        let last_trade = book.last_trade_handle();
        let book = Arc::new(Mutex::new(book));

        let shared = Arc::new(Submission {
            queue: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
            running: AtomicBool::new(true),
        });
        let turnstile = Arc::new(Turnstile::new());
        let (tx, rx) = channel::unbounded::<(u64, Order)>();

        let workers = (0..config.workers.max(1))
            .map(|i| {
                let rx = rx.clone();
                let book = book.clone();
                let metrics = metrics.clone();
                let turnstile = turnstile.clone();
                thread::Builder::new()
                    .name(format!("match-worker-{i}"))
                    .spawn(move || worker_loop(rx, book, metrics, turnstile))
                    .expect("spawn matching worker")
            })
            .collect();
        drop(rx);

        let dispatcher = {
            let shared = shared.clone();
            let metrics = metrics.clone();
            thread::Builder::new()
                .name("dispatcher".into())
                .spawn(move || dispatch_loop(shared, metrics, tx))
                .expect("spawn dispatcher")
        };

        info!(workers = config.workers, "engine started");
        Engine {
            shared,
            metrics,
            book,
            last_trade,
            dispatcher: Some(dispatcher),
            workers,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shared: self.shared.clone(),
            metrics: self.metrics.clone(),
        }
    }

    pub fn book(&self) -> Arc<Mutex<OrderBook>> {
        self.book.clone()
    }

    pub fn last_trade(&self) -> Arc<LastTrade> {
        self.last_trade.clone()
    }

    /// Graceful shutdown: wake the dispatcher, drain in-flight tasks, join
    /// everything. Orders still sitting in the submission queue are dropped.
    pub fn stop(&mut self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shared.ready.notify_all();
        if let Some(dispatcher) = self.dispatcher.take() {
            let _ = dispatcher.join();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        info!("engine stopped");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch_loop(shared: Arc<Submission>, metrics: Arc<Metrics>, tx: Sender<(u64, Order)>) {
    let mut seq = 0u64;
    loop {
        let order = {
            let _timer = metrics.timer(TIMER_ORDER_QUEUE_WAIT);
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if !shared.running.load(Ordering::SeqCst) {
                    // undispatched orders are dropped, by design of stop()
                    return;
                }
                if let Some(order) = queue.pop_front() {
                    break order;
                }
                queue = shared.ready.wait(queue).unwrap();
            }
        };
        metrics.incr(ORDERS_DISPATCHED);
        if tx.send((seq, order)).is_err() {
            return;
        }
        seq += 1;
    }
    // tx drops here: workers drain what was handed off, then exit
}

fn worker_loop(
    rx: Receiver<(u64, Order)>,
    book: Arc<Mutex<OrderBook>>,
    metrics: Arc<Metrics>,
    turnstile: Arc<Turnstile>,
) {
    while let Ok((seq, order)) = rx.recv() {
        turnstile.wait_for(seq);
        let _turn = TurnstileGuard(&turnstile);
        let _timer = metrics.timer(TIMER_ORDER_PROCESSING);
        match book.lock() {
            Ok(mut book) => {
                book.match_order(order);
                metrics.incr(ORDERS_COMPLETED);
            }
            Err(_) => {
                // a previous match panicked while holding the lock; the
                // instrument is dead, drop the order
                error!(id = order.id, "book lock poisoned, dropping order");
            }
        }
    }
}
