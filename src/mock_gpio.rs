//! Mimics rppal's output API without the need to compile to ARM and attach a transmitter

pub use std::fmt::Error;

pub struct Gpio;

impl Gpio {
  pub fn new() -> Result<Gpio, Error> {
    Ok(Gpio)
  }

  pub fn get(&self, pin: u8) -> Result<Pin, Error> {
    Ok(Pin(pin))
  }
}

#[derive(Debug)]
pub struct Pin(u8);

impl Pin {
  pub fn into_output(self) -> OutputPin {
    OutputPin { pin: self.0, high: false }
  }
}

#[derive(Debug)]
pub struct OutputPin {
  pin: u8,
  high: bool,
}

impl OutputPin {
  pub fn set_high(&mut self) {
    if !self.high {
      log::trace!("GPIO {} set to high", self.pin);
    }
    self.high = true;
  }

  pub fn set_low(&mut self) {
    if self.high {
      log::trace!("GPIO {} set to low", self.pin);
    }
    self.high = false;
  }

  #[cfg(test)]
  pub fn is_set_high(&self) -> bool {
    self.high
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn output_tracks_level() {
    let mut pin = Gpio::new().unwrap().get(17).unwrap().into_output();
    assert!(!pin.is_set_high());
    pin.set_high();
    assert!(pin.is_set_high());
    pin.set_low();
    assert!(!pin.is_set_high());
  }
}
