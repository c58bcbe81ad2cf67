use std::{fmt, str::FromStr};

use serde::Deserialize;

use crate::error::ConfigError;

/// Highest BCM GPIO number on the 40 pin header
const MAX_BCM_NUMBER: u8 = 27;

/// A GPIO pin given by its BCM name, e.g. `"Gpio17"`.
/// See: https://pinout.xyz/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct GpioPin(u8);

impl GpioPin {
  /// Get the BCM number for this GPIO pin
  pub fn bcm_number(&self) -> u8 {
    self.0
  }
}

impl FromStr for GpioPin {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    s.strip_prefix("Gpio")
      .and_then(|number| number.parse::<u8>().ok())
      .filter(|number| *number <= MAX_BCM_NUMBER)
      .map(GpioPin)
      .ok_or_else(|| ConfigError::GpioPin(s.to_owned()))
  }
}

impl TryFrom<String> for GpioPin {
  type Error = ConfigError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    value.parse()
  }
}

impl fmt::Display for GpioPin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Gpio{}", self.0)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_bcm_names() {
    let pin: GpioPin = "Gpio17".parse().unwrap();
    assert_eq!(pin.bcm_number(), 17);
    assert_eq!(pin.to_string(), "Gpio17");
  }

  #[test]
  fn rejects_unknown_pins() {
    assert!("Gpio28".parse::<GpioPin>().is_err());
    assert!("17".parse::<GpioPin>().is_err());
    assert!("GpioX".parse::<GpioPin>().is_err());
  }
}
