//! Fixed-interval callback driver.
//!
//! The ticker is owned by the value its callbacks mutate, so callbacks are
//! plain `fn(&mut Owner)` pointers and firing goes through [`TickerOwner`].

use tokio::time::{interval_at, Duration, Instant, Interval, MissedTickBehavior};

pub type TickCallback<C> = fn(&mut C);

/// A value that owns a [`Ticker`] driving itself.
pub trait TickerOwner: Sized {
    fn ticker_mut(&mut self) -> &mut Ticker<Self>;
}

pub struct Ticker<C> {
    interval_ms: u64,
    running: bool,
    /// Created on the first wait after `start`, dropped on `stop`.
    interval: Option<Interval>,
    callbacks: Vec<TickCallback<C>>,
    fires: u64,
}

impl<C> Ticker<C> {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            running: false,
            interval: None,
            callbacks: Vec::new(),
            fires: 0,
        }
    }

    #[inline]
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Subscribe a callback; callbacks fire in registration order.
    pub fn add(&mut self, callback: TickCallback<C>) {
        self.callbacks.push(callback);
    }

    /// Arm periodic firing. Returns false if already running.
    ///
    /// No timer exists yet: the interval is created by the first
    /// [`wait`](Self::wait), so the first fire comes one period after
    /// [`run`](Self::run) begins, however long ago `start` was called.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.interval = None;
        true
    }

    /// Disarm periodic firing. Returns false if not running.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.interval = None;
        true
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Total fires since creation.
    #[inline]
    pub fn fires(&self) -> u64 {
        self.fires
    }

    /// Wait for the next scheduled fire. Returns false once stopped.
    ///
    /// A slow fire delays the following one instead of bursting to catch up.
    pub async fn wait(&mut self) -> bool {
        if !self.running {
            return false;
        }
        let period = Duration::from_millis(self.interval_ms);
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        interval.tick().await;
        self.running
    }
}

impl<C: TickerOwner> Ticker<C> {
    /// Invoke every callback once, in registration order.
    pub fn fire(owner: &mut C) {
        let mut index = 0;
        loop {
            let Some(callback) = owner.ticker_mut().callbacks.get(index).copied() else {
                break;
            };
            callback(owner);
            index += 1;
        }
        owner.ticker_mut().fires += 1;
    }

    /// Fire on every interval until the ticker is stopped.
    pub async fn run(owner: &mut C) {
        while owner.ticker_mut().wait().await {
            Self::fire(owner);
        }
    }
}
