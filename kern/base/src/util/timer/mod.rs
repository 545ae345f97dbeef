pub use core::time::Duration;

use alloc::sync::Arc;
use spin::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimerTicks(pub u64);

impl TimerTicks {
    pub const fn new(ticks: u64) -> Self {
        Self(ticks)
    }

    pub const fn since(self, earlier: TimerTicks) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Converts a tick count of a timer running at `frequency` Hz to a [`Duration`]
pub const fn ticks_to_duration(ticks: u64, frequency: u64) -> Duration {
    if frequency == 0 {
        return Duration::ZERO;
    }
    let nanos = ticks as u128 * 1_000_000_000 / frequency as u128;
    Duration::from_nanos(nanos as u64)
}

/// Converts a [`Duration`] to the number of ticks of a timer running at `frequency` Hz, rounding up
pub const fn duration_to_ticks(duration: Duration, frequency: u64) -> u64 {
    (duration.as_nanos() * frequency as u128).div_ceil(1_000_000_000) as u64
}

/// A monotonic time source
pub trait Timer: Send + Sync {
    fn now(&self) -> TimerTicks;
    /// The frequency of the timer in Hz
    fn frequency(&self) -> u64;

    fn time_since_boot(&self) -> Duration {
        ticks_to_duration(self.now().0, self.frequency())
    }

    /// Blocks the caller for at least `duration`.
    ///
    /// The default implementation spins on [`Timer::now`], which is what drivers want for the
    /// short settle times hardware asks for.
    fn delay(&self, duration: Duration) {
        let target = duration_to_ticks(duration, self.frequency());
        let start = self.now();
        while self.now().since(start) < target {
            core::hint::spin_loop();
        }
    }
}

/// The system timer, installed once a clock source has been calibrated
pub static TIMER: RwLock<Option<Arc<dyn Timer>>> = RwLock::new(None);

pub fn set_timer(timer: Arc<dyn Timer>) {
    *TIMER.write() = Some(timer);
}

pub fn time_since_boot() -> Duration {
    TIMER.read().as_ref().map(|t| t.time_since_boot()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU64, Ordering};

    /// Advances by one tick every time it is read
    struct SteppingTimer {
        ticks: AtomicU64,
    }

    impl Timer for SteppingTimer {
        fn now(&self) -> TimerTicks {
            TimerTicks(self.ticks.fetch_add(1, Ordering::Relaxed))
        }

        fn frequency(&self) -> u64 {
            1_000
        }
    }

    #[test]
    fn tick_conversions() {
        assert_eq!(ticks_to_duration(1_500, 1_000), Duration::from_millis(1_500));
        assert_eq!(ticks_to_duration(10, 0), Duration::ZERO);
        assert_eq!(duration_to_ticks(Duration::from_millis(20), 1_000), 20);
        assert_eq!(duration_to_ticks(Duration::from_micros(1), 1_000), 1);
    }

    #[test]
    fn delay_waits_for_the_whole_duration() {
        let timer = SteppingTimer { ticks: AtomicU64::new(0) };
        timer.delay(Duration::from_millis(20));
        // one read for the start, then one per elapsed tick
        assert!(timer.ticks.load(Ordering::Relaxed) >= 21);
    }

    #[test]
    fn system_timer_drives_time_since_boot() {
        set_timer(Arc::new(SteppingTimer {
            ticks: AtomicU64::new(2_000),
        }));
        assert!(time_since_boot() >= Duration::from_secs(2));
    }

    static_assertions::assert_obj_safe!(Timer);
}
