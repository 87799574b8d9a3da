//! Low-energy timer driver.
//!
//! The counter is a free-running 16-bit down-counter that reloads from
//! `top` (compare 0) at underflow, so one periodic tick spans `top + 1`
//! counter ticks.  A one-shot deadline is implemented by capturing the
//! current count, loading the counter with the one-shot compare value and
//! letting it underflow; the ISR then restores the counter to where it
//! would have been, wrapping into the next period if needed.
//!
//! All timestamp arithmetic lives in [`period_position`], a pure function
//! over a [`CounterView`], so it can be property-tested without hardware.
//!
//! ```text
//!  top ┐╲          ╲          captured ┐ (arm)
//!      │ ╲          ╲                  │──▶ compare ┐╲
//!      │  ╲          ╲                 │            │ ╲ UF ──▶ restore
//!    0 ┘   ╲ tick     ╲ tick           │            ┘  ╲
//! ```

use log::{debug, info};

use crate::app::ports::TimerCounter;
use crate::config::ClockSource;
use crate::events::{PendingEvent, PendingEvents, StackEventQueue};

/// Longest representable period at full resolution (the widest band).
pub const MAX_PERIOD_MS: u32 = 7000;

/// Counter width.
pub const COUNTER_MAX: u32 = 0xFFFF;

// ---------------------------------------------------------------------------
// Prescale policy
// ---------------------------------------------------------------------------

/// Clock divider in front of the counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prescaler {
    Div1,
    Div2,
    Div4,
}

impl Prescaler {
    pub const fn divisor(self) -> u32 {
        match self {
            Self::Div1 => 1,
            Self::Div2 => 2,
            Self::Div4 => 4,
        }
    }

    /// Smallest divisor whose band covers `period_ms`.  The ULFRCO is slow
    /// enough that it never needs dividing.  `None` if the period is out of
    /// range.
    pub const fn for_period(period_ms: u32, clock: ClockSource) -> Option<Self> {
        if period_ms == 0 || period_ms > MAX_PERIOD_MS {
            return None;
        }
        match clock {
            ClockSource::Ulfrco => Some(Self::Div1),
            ClockSource::Lfxo => {
                if period_ms <= 2000 {
                    Some(Self::Div1)
                } else if period_ms <= 4000 {
                    Some(Self::Div2)
                } else {
                    Some(Self::Div4)
                }
            }
        }
    }
}

/// Longest period `clock` can express.
pub const fn max_period_ms(_clock: ClockSource) -> u32 {
    MAX_PERIOD_MS
}

/// Counter ticks for `ms` at `tick_hz`.
const fn ms_to_ticks(ms: u32, tick_hz: u32) -> u32 {
    ((ms as u64 * tick_hz as u64) / 1000) as u32
}

// ---------------------------------------------------------------------------
// Pure timestamp arithmetic
// ---------------------------------------------------------------------------

/// Snapshot taken when a one-shot was armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneShotWindow {
    /// Counter value captured at arm time.
    pub captured: u32,
    /// Value the counter was loaded with; it underflows after
    /// `compare + 1` ticks.
    pub compare: u32,
}

/// Everything needed to locate the counter inside its period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterView {
    pub top: u32,
    pub count: u32,
    pub one_shot: Option<OneShotWindow>,
}

/// Where the counter would be without the one-shot detour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodPosition {
    /// Equivalent down-count in `0..=top`.
    pub count: u32,
    /// Periodic boundaries crossed while the one-shot was loaded.  The
    /// hardware compare match is skipped for these, so callers add them.
    pub wrapped: u32,
}

impl PeriodPosition {
    /// Ticks elapsed since the periodic reference tick.
    pub const fn elapsed_ticks(self, top: u32) -> u32 {
        top - self.count
    }
}

/// Locate the counter inside the current period.
///
/// 1. No one-shot loaded: the raw count is the position.
/// 2. One-shot loaded and the ticks it consumed exceed the captured
///    count: the period boundary passed in between, so the position
///    wraps from `top`.
/// 3. One-shot loaded, boundary not reached: the consumed ticks are
///    subtracted from the captured count.
pub fn period_position(view: CounterView) -> PeriodPosition {
    match view.one_shot {
        None => PeriodPosition {
            count: view.count.min(view.top),
            wrapped: 0,
        },
        Some(w) => {
            let consumed = w.compare.saturating_sub(view.count);
            if consumed > w.captured {
                let over = consumed - w.captured;
                PeriodPosition {
                    count: (view.top + 1).saturating_sub(over).min(view.top),
                    wrapped: 1,
                }
            } else {
                PeriodPosition {
                    count: w.captured - consumed,
                    wrapped: 0,
                }
            }
        }
    }
}

/// Counter value to restore once the one-shot underflows (the one-shot
/// consumed `compare + 1` ticks).
pub fn restore_count(top: u32, window: OneShotWindow) -> PeriodPosition {
    let consumed = window.compare + 1;
    if consumed <= window.captured {
        PeriodPosition {
            count: window.captured - consumed,
            wrapped: 0,
        }
    } else {
        PeriodPosition {
            count: (top + 1 - (consumed - window.captured)).min(top),
            wrapped: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Interrupt causes the ISR glue reads from the peripheral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimerIrq {
    /// Compare-0 match (periodic reference).
    pub compare0: bool,
    /// Counter underflow.
    pub underflow: bool,
}

/// Low-energy timer bound to a hardware counter.
pub struct LeTimer<'a, C: TimerCounter> {
    counter: C,
    pending: &'a PendingEvents,
    wake: &'a StackEventQueue,
    clock: ClockSource,
    prescaler: Prescaler,
    period_ms: u32,
    top: u32,
    periods: u32,
    one_shot: Option<OneShotWindow>,
}

impl<'a, C: TimerCounter> LeTimer<'a, C> {
    pub fn new(
        counter: C,
        clock: ClockSource,
        pending: &'a PendingEvents,
        wake: &'a StackEventQueue,
    ) -> Self {
        Self {
            counter,
            pending,
            wake,
            clock,
            prescaler: Prescaler::Div1,
            period_ms: 0,
            top: 0,
            periods: 0,
            one_shot: None,
        }
    }

    /// Configure the recurring compare.  Returns `false` for a period no
    /// band can represent (a programming error; the timer stays as it was).
    pub fn start_periodic_tick(&mut self, period_ms: u32) -> bool {
        let Some(prescaler) = Prescaler::for_period(period_ms, self.clock) else {
            debug_assert!(false, "unrepresentable timer period: {period_ms} ms");
            return false;
        };
        let ticks = ms_to_ticks(period_ms, self.tick_hz_for(prescaler));
        let top = ticks.saturating_sub(1).min(COUNTER_MAX);

        self.prescaler = prescaler;
        self.period_ms = period_ms;
        self.top = top;
        self.periods = 0;
        self.one_shot = None;
        self.counter.configure(prescaler, top);
        info!(
            "LETIMER: period={}ms prescale=/{} top={}",
            period_ms,
            prescaler.divisor(),
            top
        );
        true
    }

    /// Arm a one-shot `delay_ms` from now, replacing any armed one.  Delays
    /// longer than one period are clamped to one period.
    pub fn arm_one_shot(&mut self, delay_ms: u32) {
        let hz = self.tick_hz_for(self.prescaler);
        let compare = ms_to_ticks(delay_ms, hz).saturating_sub(1).min(self.top);

        critical_section::with(|_| {
            let now = period_position(self.view());
            self.periods = self.periods.wrapping_add(now.wrapped);
            if now.wrapped > 0 {
                self.signal(PendingEvent::PeriodicTick);
            }
            let window = OneShotWindow {
                captured: now.count,
                compare,
            };
            self.one_shot = Some(window);
            self.counter.set_count(compare);
        });
        debug!("LETIMER: one-shot armed, {}ms (compare={})", delay_ms, compare);
    }

    /// Interrupt handler body.  Only touches the counter and the pending
    /// word; never calls into dispatch logic.
    pub fn on_interrupt(&mut self, irq: TimerIrq) {
        critical_section::with(|_| match self.one_shot {
            Some(window) if irq.underflow => {
                let restored = restore_count(self.top, window);
                self.counter.set_count(restored.count);
                self.one_shot = None;
                if restored.wrapped > 0 {
                    self.periods = self.periods.wrapping_add(restored.wrapped);
                    self.signal(PendingEvent::PeriodicTick);
                }
                self.signal(PendingEvent::OneShotExpired);
            }
            // Reload compare matches are meaningless while the one-shot
            // value is loaded.
            Some(_) => {}
            None => {
                if irq.compare0 {
                    self.periods = self.periods.wrapping_add(1);
                    self.signal(PendingEvent::PeriodicTick);
                }
            }
        });
    }

    /// Milliseconds since the last periodic reference tick.  Never
    /// decreases between two reference ticks.
    pub fn elapsed_ms(&self) -> u32 {
        let pos = period_position(self.view());
        pos.wrapped * self.period_ms + self.ticks_to_ms(pos.elapsed_ticks(self.top))
    }

    /// Milliseconds since `start_periodic_tick`.
    pub fn timestamp_ms(&self) -> u64 {
        let pos = period_position(self.view());
        let periods = u64::from(self.periods) + u64::from(pos.wrapped);
        periods * u64::from(self.period_ms) + u64::from(self.ticks_to_ms(pos.elapsed_ticks(self.top)))
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    pub fn prescaler(&self) -> Prescaler {
        self.prescaler
    }

    pub fn top(&self) -> u32 {
        self.top
    }

    /// Completed periods since the timer was started.
    pub fn periods(&self) -> u32 {
        self.periods
    }

    pub fn one_shot_armed(&self) -> bool {
        self.one_shot.is_some()
    }

    pub fn counter(&self) -> &C {
        &self.counter
    }

    pub fn counter_mut(&mut self) -> &mut C {
        &mut self.counter
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn view(&self) -> CounterView {
        CounterView {
            top: self.top,
            count: self.counter.count(),
            one_shot: self.one_shot,
        }
    }

    fn tick_hz_for(&self, prescaler: Prescaler) -> u32 {
        self.clock.frequency_hz() / prescaler.divisor()
    }

    fn ticks_to_ms(&self, ticks: u32) -> u32 {
        let per_period = u64::from(self.top) + 1;
        ((u64::from(ticks) * u64::from(self.period_ms)) / per_period) as u32
    }

    fn signal(&self, event: PendingEvent) {
        self.pending.raise_and_wake(event, self.wake);
    }
}
