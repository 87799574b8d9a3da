//! Push-button driver.
//!
//! ## Hardware
//!
//! Two active-low momentary switches with pull-ups and the port glitch
//! filter enabled.  Both edges interrupt.  The edge ISR does not trust the
//! edge polarity: it reads the pin level and posts the matching
//! external-signal code to the stack queue.
//!
//! | Pin | Pressed | Released |
//! |-----|---------|----------|
//! | PB0 | 4       | 5        |
//! | PB1 | 6       | 7        |
//!
//! The dispatcher reads the level again when it handles the signal.

use embedded_hal::digital::InputPin;
use log::{debug, warn};

use crate::app::ports::{Button, ButtonPort};
use crate::events::StackEventQueue;
use crate::pins::{
    BUTTON_A_PIN, BUTTON_B_PIN, SIGNAL_BUTTON_A_PRESSED, SIGNAL_BUTTON_A_RELEASED,
    SIGNAL_BUTTON_B_PRESSED, SIGNAL_BUTTON_B_RELEASED,
};

/// Signal code for a button edge.
pub const fn signal_for(button: Button, pressed: bool) -> u32 {
    match (button, pressed) {
        (Button::A, true) => SIGNAL_BUTTON_A_PRESSED,
        (Button::A, false) => SIGNAL_BUTTON_A_RELEASED,
        (Button::B, true) => SIGNAL_BUTTON_B_PRESSED,
        (Button::B, false) => SIGNAL_BUTTON_B_RELEASED,
    }
}

/// Inverse of [`signal_for`].  `None` for non-button signals.
pub const fn decode_signal(signal: u32) -> Option<(Button, bool)> {
    match signal {
        SIGNAL_BUTTON_A_PRESSED => Some((Button::A, true)),
        SIGNAL_BUTTON_A_RELEASED => Some((Button::A, false)),
        SIGNAL_BUTTON_B_PRESSED => Some((Button::B, true)),
        SIGNAL_BUTTON_B_RELEASED => Some((Button::B, false)),
        _ => None,
    }
}

pub struct PushButtons<'a, P: InputPin> {
    a: P,
    b: P,
    queue: &'a StackEventQueue,
    interrupts_enabled: bool,
}

impl<'a, P: InputPin> PushButtons<'a, P> {
    pub fn new(a: P, b: P, queue: &'a StackEventQueue) -> Self {
        Self {
            a,
            b,
            queue,
            interrupts_enabled: false,
        }
    }

    /// GPIO edge ISR body.  Returns the signal posted, if any.
    pub fn on_edge(&mut self, pin: u8) -> Option<u32> {
        if !self.interrupts_enabled {
            return None;
        }
        let button = match pin {
            BUTTON_A_PIN => Button::A,
            BUTTON_B_PIN => Button::B,
            other => {
                debug!("edge on unmapped pin {}", other);
                return None;
            }
        };
        let signal = signal_for(button, self.read(button));
        self.queue.signal(signal);
        Some(signal)
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled
    }

    pub fn pin_mut(&mut self, button: Button) -> &mut P {
        match button {
            Button::A => &mut self.a,
            Button::B => &mut self.b,
        }
    }

    fn read(&mut self, button: Button) -> bool {
        match self.pin_mut(button).is_low() {
            Ok(low) => low,
            Err(_) => {
                warn!("button {:?}: pin read failed", button);
                false
            }
        }
    }
}

impl<P: InputPin> ButtonPort for PushButtons<'_, P> {
    fn is_pressed(&mut self, button: Button) -> bool {
        self.read(button)
    }

    fn enable_interrupts(&mut self) {
        self.interrupts_enabled = true;
    }
}
