//! UE NAS timer management
//!
//! NAS timers are identified by their 3GPP code and track running state,
//! interval and a resettable expiry count. The NAS task drives them with
//! a periodic tick; expiry is observed between message dispatches, so a
//! paused task defers it until unpause.
//!
//! # Timers used by the simulator (3GPP TS 24.501)
//!
//! - T3346: backoff timer for congestion control
//! - T3512: periodic registration update timer
//! - T3521: de-registration retransmission timer

use std::time::{Duration, Instant};

/// Timer code for T3346.
pub const TIMER_T3346: u16 = 3346;
/// Timer code for T3512.
pub const TIMER_T3512: u16 = 3512;
/// Timer code for T3521.
pub const TIMER_T3521: u16 = 3521;

/// Default T3346 interval: 12 minutes (network controlled, this is max).
pub const DEFAULT_T3346_INTERVAL: u32 = 12 * 60;
/// Default T3512 interval: 54 minutes (network controlled).
pub const DEFAULT_T3512_INTERVAL: u32 = 54 * 60;
/// Default T3521 interval: 15 seconds.
pub const DEFAULT_T3521_INTERVAL: u32 = 15;

/// T3521 expiries before the de-registration procedure is aborted.
pub const MAX_T3521_RETRANSMISSION: u32 = 5;

/// A NAS timer.
#[derive(Debug)]
pub struct UeTimer {
    code: u16,
    is_mm: bool,
    interval_secs: u32,
    start_time: Option<Instant>,
    is_running: bool,
    expiry_count: u32,
}

impl UeTimer {
    /// Creates a timer.
    ///
    /// # Arguments
    /// * `code` - 3GPP timer code (e.g. 3521)
    /// * `is_mm` - whether this is a mobility management timer
    /// * `default_interval_secs` - default interval in seconds
    pub fn new(code: u16, is_mm: bool, default_interval_secs: u32) -> Self {
        Self {
            code,
            is_mm,
            interval_secs: default_interval_secs,
            start_time: None,
            is_running: false,
            expiry_count: 0,
        }
    }

    /// Starts the timer with its current interval.
    ///
    /// # Arguments
    /// * `clear_expiry_count` - whether to reset the expiry count
    pub fn start(&mut self, clear_expiry_count: bool) {
        if clear_expiry_count {
            self.reset_expiry_count();
        }
        self.start_time = Some(Instant::now());
        self.is_running = true;
    }

    /// Starts the timer with a network-provided interval.
    pub fn start_with_interval(&mut self, interval_secs: u32, clear_expiry_count: bool) {
        self.interval_secs = interval_secs;
        self.start(clear_expiry_count);
    }

    /// Stops the timer.
    ///
    /// # Arguments
    /// * `clear_expiry_count` - whether to reset the expiry count
    pub fn stop(&mut self, clear_expiry_count: bool) {
        if clear_expiry_count {
            self.reset_expiry_count();
        }
        if self.is_running {
            self.start_time = None;
            self.is_running = false;
        }
    }

    /// Resets the expiry count to zero.
    pub fn reset_expiry_count(&mut self) {
        self.expiry_count = 0;
    }

    /// Checks for expiry. Returns `true` if the timer just expired on
    /// this tick; the timer stops and its expiry count increments.
    pub fn perform_tick(&mut self) -> bool {
        if self.is_running {
            if let Some(start) = self.start_time {
                if start.elapsed() >= Duration::from_secs(u64::from(self.interval_secs)) {
                    self.stop(false);
                    self.expiry_count += 1;
                    return true;
                }
            }
        }
        false
    }

    /// True while the timer is running.
    pub fn is_running(&self) -> bool {
        self.is_running
    }

    /// The 3GPP timer code.
    pub fn code(&self) -> u16 {
        self.code
    }

    /// True for mobility management timers.
    pub fn is_mm_timer(&self) -> bool {
        self.is_mm
    }

    /// Current interval in seconds.
    pub fn interval(&self) -> u32 {
        self.interval_secs
    }

    /// Remaining seconds, 0 when stopped or expired.
    pub fn remaining(&self) -> u32 {
        if !self.is_running {
            return 0;
        }
        match self.start_time {
            Some(start) => {
                let elapsed = start.elapsed().as_secs() as u32;
                self.interval_secs.saturating_sub(elapsed)
            }
            None => 0,
        }
    }

    /// Number of expiries since the count was last reset.
    pub fn expiry_count(&self) -> u32 {
        self.expiry_count
    }

    #[cfg(test)]
    pub(crate) fn force_expire(&mut self) {
        self.start_time = Some(Instant::now() - Duration::from_secs(u64::from(self.interval_secs) + 1));
    }
}

impl std::fmt::Display for UeTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_running {
            write!(
                f,
                "T{}: rem[{}] int[{}]",
                self.code,
                self.remaining(),
                self.interval_secs
            )
        } else {
            write!(f, "T{}: .", self.code)
        }
    }
}

/// The fixed NAS timer set of a UE.
#[derive(Debug)]
pub struct UeTimers {
    /// T3346 - congestion backoff
    pub t3346: UeTimer,
    /// T3512 - periodic registration update
    pub t3512: UeTimer,
    /// T3521 - de-registration retransmission
    pub t3521: UeTimer,
}

impl Default for UeTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl UeTimers {
    /// Creates the timer set with default intervals.
    pub fn new() -> Self {
        Self {
            t3346: UeTimer::new(TIMER_T3346, true, DEFAULT_T3346_INTERVAL),
            t3512: UeTimer::new(TIMER_T3512, true, DEFAULT_T3512_INTERVAL),
            t3521: UeTimer::new(TIMER_T3521, true, DEFAULT_T3521_INTERVAL),
        }
    }

    /// Ticks every timer, returning the codes that expired.
    pub fn perform_tick(&mut self) -> Vec<u16> {
        let mut expired = Vec::new();
        for timer in [&mut self.t3346, &mut self.t3512, &mut self.t3521] {
            if timer.perform_tick() {
                expired.push(timer.code());
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_start_stop() {
        let mut timer = UeTimer::new(TIMER_T3521, true, 15);
        assert!(!timer.is_running());

        timer.start(true);
        assert!(timer.is_running());
        assert!(timer.remaining() > 0);
        assert!(!timer.perform_tick());

        timer.stop(true);
        assert!(!timer.is_running());
        assert_eq!(timer.remaining(), 0);
    }

    #[test]
    fn test_timer_expiry_counts() {
        let mut timer = UeTimer::new(TIMER_T3521, true, 15);
        timer.start(true);
        timer.force_expire();
        assert!(timer.perform_tick());
        assert_eq!(timer.expiry_count(), 1);
        assert!(!timer.is_running());

        // non-clearing restart keeps the count
        timer.start(false);
        timer.force_expire();
        assert!(timer.perform_tick());
        assert_eq!(timer.expiry_count(), 2);

        // clearing restart resets it
        timer.start(true);
        assert_eq!(timer.expiry_count(), 0);
    }

    #[test]
    fn test_timer_display() {
        let mut timer = UeTimer::new(TIMER_T3512, true, 60);
        assert_eq!(format!("{timer}"), "T3512: .");
        timer.start(true);
        assert!(format!("{timer}").starts_with("T3512: rem["));
    }

    #[test]
    fn test_timer_set_tick() {
        let mut timers = UeTimers::new();
        timers.t3521.start(true);
        timers.t3521.force_expire();
        assert_eq!(timers.perform_tick(), vec![TIMER_T3521]);
        assert!(timers.perform_tick().is_empty());
    }

    #[test]
    fn test_network_provided_interval() {
        let mut timer = UeTimer::new(TIMER_T3512, true, DEFAULT_T3512_INTERVAL);
        timer.start_with_interval(30, true);
        assert_eq!(timer.interval(), 30);
        assert!(timer.is_running());
    }
}
