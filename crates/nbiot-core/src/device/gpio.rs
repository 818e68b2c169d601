//! GPIO helpers
//!
//! Pins are passed in as values; nothing here reaches for a global pin table.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::protocol::Clock;

/// A digital output
pub trait OutputPin: Send {
    /// Drive the pin
    fn set(&mut self, high: bool);

    /// Level last driven
    fn is_high(&self) -> bool;

    /// Drive high
    fn set_high(&mut self) {
        self.set(true);
    }

    /// Drive low
    fn set_low(&mut self) {
        self.set(false);
    }
}

/// Output pin kept in memory.
///
/// Used where the host has no GPIO (modem powered externally, USB dongles)
/// and in tests. Clones observe the same level.
#[derive(Debug, Clone, Default)]
pub struct MemoryPin {
    level: Arc<AtomicBool>,
    transitions: Arc<AtomicUsize>,
}

impl MemoryPin {
    /// New pin, low
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of level changes so far
    pub fn transitions(&self) -> usize {
        self.transitions.load(Ordering::SeqCst)
    }
}

impl OutputPin for MemoryPin {
    fn set(&mut self, high: bool) {
        if self.level.swap(high, Ordering::SeqCst) != high {
            self.transitions.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_high(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }
}

/// Blink `pin` `count` times, then restore its previous level
pub fn blink(pin: &mut dyn OutputPin, clock: &dyn Clock, count: u32, between: Duration) {
    let previous = pin.is_high();
    for _ in 0..count {
        pin.set_high();
        clock.sleep(between);
        pin.set_low();
        clock.sleep(between);
    }
    pin.set(previous);
}

/// Main lamp output plus the on-board LED, which shows the inverse state
pub struct LampIndicators {
    main: Box<dyn OutputPin>,
    onboard: Box<dyn OutputPin>,
}

impl LampIndicators {
    /// Main lamp output and onboard LED
    pub fn new(main: impl OutputPin + 'static, onboard: impl OutputPin + 'static) -> Self {
        Self {
            main: Box::new(main),
            onboard: Box::new(onboard),
        }
    }

    /// Drive both outputs to match the lamp
    pub fn show(&mut self, lamp_on: bool) {
        self.main.set(lamp_on);
        self.onboard.set(!lamp_on);
    }

    /// Onboard LED, for blinking
    pub fn onboard_mut(&mut self) -> &mut dyn OutputPin {
        self.onboard.as_mut()
    }
}
