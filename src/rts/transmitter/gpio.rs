use std::{
  thread,
  time::{Duration, Instant},
};

#[cfg(feature = "arm")]
use rppal::gpio::{Gpio, OutputPin};

use super::pulse::{Pulse, PulseOutput};
#[cfg(not(feature = "arm"))]
use crate::mock_gpio::{Gpio, OutputPin};
use crate::{config::gpio::GpioPin, error::RtsResult};

/// Below this the remaining time of a pulse is spun rather than slept
const SPIN_THRESHOLD: Duration = Duration::from_micros(2000);

/// Drives the data pin of an OOK transmitter module (e.g. a 433.42 MHz crystal swapped FS1000A).
#[derive(Debug)]
pub struct GpioOutput {
  pin: OutputPin,
}

impl GpioOutput {
  pub fn new(pin: GpioPin) -> RtsResult<Self> {
    let gpio = Gpio::new()?;
    let mut pin = gpio.get(pin.bcm_number())?.into_output();
    pin.set_low();

    Ok(GpioOutput { pin })
  }
}

/// Wait until `deadline`, sleeping while it is far away and spinning for the last stretch.
fn wait_until(deadline: Instant) {
  loop {
    let now = Instant::now();
    if now >= deadline {
      return;
    }

    let remaining = deadline - now;
    if remaining > SPIN_THRESHOLD {
      thread::sleep(remaining - SPIN_THRESHOLD);
    }
    else {
      std::hint::spin_loop();
    }
  }
}

impl PulseOutput for GpioOutput {
  fn play(&mut self, pulses: &[Pulse]) -> RtsResult<()> {
    // deadlines are accumulated from the start so late wakeups don't stretch the whole train
    let mut deadline = Instant::now();

    for pulse in pulses {
      if pulse.is_mark() {
        self.pin.set_high();
      }
      else {
        self.pin.set_low();
      }
      deadline += Duration::from_micros(pulse.micros() as u64);
      wait_until(deadline);
    }

    self.pin.set_low();
    Ok(())
  }
}
