//! Simulated active-low button input.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin};

#[derive(Debug, Clone, Copy, Default)]
pub struct SimPin {
    /// Electrical level is low (button held).
    low: bool,
}

impl SimPin {
    pub fn released() -> Self {
        Self { low: false }
    }

    pub fn pressed() -> Self {
        Self { low: true }
    }

    pub fn press(&mut self) {
        self.low = true;
    }

    pub fn release(&mut self) {
        self.low = false;
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.low)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.low)
    }
}
