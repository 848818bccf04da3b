//! The abstract delay primitive the synchronous poll loops suspend on.
//!
//! `spec.md` §1 lists the delay primitive among the capabilities injected
//! into the core rather than implemented by it; §5 calls for "a 1 ms delay
//! primitive" at each poll step. Injecting it as a trait lets tests replace
//! wall-clock sleeps with an instantly-advancing simulated clock.

/// Suspends the calling thread for approximately `ms` milliseconds.
pub trait Delay: Send + Sync {
    fn delay_ms(&self, ms: u32);
}

/// The hosted default: a real `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn delay_ms(&self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }
}
