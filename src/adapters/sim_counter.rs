//! Simulated low-energy timer counter.
//!
//! Counts down one tick per [`step`](SimCounter::step), reloading from the
//! compare-0 value at underflow and reporting the interrupt flags the
//! hardware would latch.

use crate::app::ports::TimerCounter;
use crate::drivers::hw_timer::{Prescaler, TimerIrq};

#[derive(Debug)]
pub struct SimCounter {
    top: u32,
    count: u32,
    prescaler: Prescaler,
}

impl SimCounter {
    pub fn new() -> Self {
        Self {
            top: 0,
            count: 0,
            prescaler: Prescaler::Div1,
        }
    }

    /// Advance one counter tick.
    pub fn step(&mut self) -> TimerIrq {
        if self.count == 0 {
            self.count = self.top;
            TimerIrq {
                compare0: true,
                underflow: true,
            }
        } else {
            self.count -= 1;
            TimerIrq::default()
        }
    }

    /// Ticks until the next underflow interrupt.
    pub fn ticks_to_underflow(&self) -> u32 {
        self.count + 1
    }

    pub fn prescaler(&self) -> Prescaler {
        self.prescaler
    }
}

impl Default for SimCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerCounter for SimCounter {
    fn configure(&mut self, prescaler: Prescaler, top: u32) {
        self.prescaler = prescaler;
        self.top = top;
        self.count = top;
    }

    fn count(&self) -> u32 {
        self.count
    }

    fn set_count(&mut self, value: u32) {
        self.count = value;
    }
}
