//! Progress watchdog for the offset solver.
//!
//! A timer thread samples the solver's bucket counter after a start delay
//! and then once per repeat period. Two samples without forward progress
//! raise the abort flag; the solver polls it between buckets and unwinds
//! cooperatively. The thread never touches solver state.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::warn;

const TICK: Duration = Duration::from_millis(10);

pub(crate) struct Watchdog {
    abort: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    progress: Arc<AtomicU32>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Watchdog {
    pub fn arm(start: Duration, repeat: Duration) -> Self {
        let abort = Arc::new(AtomicBool::new(false));
        let cancel = Arc::new(AtomicBool::new(false));
        let progress = Arc::new(AtomicU32::new(0));

        let handle = {
            let abort = Arc::clone(&abort);
            let cancel = Arc::clone(&cancel);
            let progress = Arc::clone(&progress);
            thread::spawn(move || {
                if pause(start, &cancel) {
                    return;
                }
                let mut last = 0u32;
                loop {
                    let current = progress.load(Ordering::Relaxed);
                    if current <= last {
                        warn!("progress is too slow, trying the next table size");
                        abort.store(true, Ordering::Relaxed);
                        return;
                    }
                    last = current;
                    if pause(repeat, &cancel) {
                        return;
                    }
                }
            })
        };

        Self {
            abort,
            cancel,
            progress,
            handle: Some(handle),
        }
    }

    /// Record the bucket the solver is working on.
    pub fn note_bucket(&self, i: u32) {
        self.progress.store(i, Ordering::Relaxed);
    }

    pub fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::Relaxed)
    }

    /// Stop watching without tearing the thread down; used once the solver
    /// leaves the phase worth supervising.
    pub fn disarm(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Sleep for `total`, polling the cancel flag. Returns true when cancelled.
fn pause(total: Duration, cancel: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        thread::sleep(TICK.min(deadline - now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stalled_progress_raises_abort() {
        let wd = Watchdog::arm(Duration::from_millis(20), Duration::from_millis(20));
        wd.note_bucket(0);
        let deadline = Instant::now() + Duration::from_secs(2);
        while !wd.abort_requested() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(wd.abort_requested());
    }

    #[test]
    fn advancing_progress_keeps_running() {
        let wd = Watchdog::arm(Duration::from_millis(20), Duration::from_millis(100));
        let start = Instant::now();
        let mut i = 1u32;
        while start.elapsed() < Duration::from_millis(130) {
            wd.note_bucket(i);
            i += 1;
            thread::sleep(Duration::from_millis(2));
        }
        assert!(!wd.abort_requested());
    }

    #[test]
    fn disarmed_watchdog_never_fires() {
        let wd = Watchdog::arm(Duration::from_millis(10), Duration::from_millis(10));
        wd.disarm();
        thread::sleep(Duration::from_millis(50));
        assert!(!wd.abort_requested());
    }
}
