use std::thread;
use std::time::{Duration, Instant};

/// Playback clock consumed by [`MatroskaReader`](super::MatroskaReader).
///
/// The reader calls [`start`](Self::start) when the first frame is
/// requested and [`wait_until`](Self::wait_until) with each frame's
/// presentation time relative to stream start.
pub trait Pacer {
    fn start(&mut self);

    /// Block until `target` has elapsed since [`start`](Self::start).
    fn wait_until(&mut self, target: Duration);
}

/// Paces frames against the wall clock by sleeping the calling thread.
#[derive(Debug, Default)]
pub struct RealtimePacer {
    start: Option<Instant>,
}

impl RealtimePacer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Pacer for RealtimePacer {
    fn start(&mut self) {
        self.start.get_or_insert_with(Instant::now);
    }

    fn wait_until(&mut self, target: Duration) {
        let start = *self.start.get_or_insert_with(Instant::now);
        let elapsed = start.elapsed();
        if let Some(delay) = target.checked_sub(elapsed)
            && !delay.is_zero()
        {
            tracing::trace!(delay_ms = delay.as_millis() as u64, "pacing frame");
            thread::sleep(delay);
        }
    }
}

/// Never waits; frames are produced as fast as they can be parsed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPacing;

impl Pacer for NoPacing {
    fn start(&mut self) {}

    fn wait_until(&mut self, _target: Duration) {}
}
