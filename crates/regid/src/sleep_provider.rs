use core::{future::Future, time::Duration};

/// A trait that abstracts over how to wait out a backoff interval.
///
/// The allocator awaits this between retry rounds, which keeps the retry loop
/// independent of how (and whether) time actually passes.
pub trait SleepProvider: Send + Sync {
    /// We require `Send` so that the allocation future can move across worker
    /// threads.
    fn sleep_for(&self, dur: Duration) -> impl Future<Output = ()> + Send;
}

/// An implementation of [`SleepProvider`] using Tokio's timer.
///
/// This is the default provider.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleep;

impl SleepProvider for TokioSleep {
    fn sleep_for(&self, dur: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(dur)
    }
}

/// An implementation of [`SleepProvider`] using Tokio's yield.
///
/// Ignores the requested interval and only yields to the scheduler, which
/// turns the backoff schedule into a tight retry loop. Useful for in-process
/// contention tests; not meant for real stores.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioYield;

impl SleepProvider for TokioYield {
    fn sleep_for(&self, _dur: Duration) -> impl Future<Output = ()> + Send {
        tokio::task::yield_now()
    }
}
