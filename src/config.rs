use std::{collections::BTreeMap, fs, path::PathBuf};

use serde::Deserialize;

use self::gpio::GpioPin;
use crate::{
  cover::{identifier::Identifier, CoverConfig},
  error::{ConfigError, RtsResult},
  mqtt_client::MqttClientConfig,
  rts::{
    transmitter::{GpioOutput, LogTransmitter, PulseTransmitter, Transmitter},
    DEFAULT_COMMAND_REPETITIONS, MAX_COMMAND_REPETITIONS, MIN_COMMAND_REPETITIONS,
  },
};

pub mod gpio;

pub const CONFIG_PATH: &str = "rts-config.toml";

fn default_command_repetitions() -> u8 {
  DEFAULT_COMMAND_REPETITIONS
}

fn default_storage_path() -> PathBuf {
  PathBuf::from("rts-state")
}

#[derive(Debug, Deserialize)]
pub struct Config {
  /// The MQTT configuration
  pub mqtt_client: MqttClientConfig,
  /// The radio shared by every cover
  pub rts: RtsConfig,
  /// A list of all covers to control
  #[serde(default)]
  pub covers: BTreeMap<Identifier, CoverConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RtsConfig {
  /// How many frames are sent for each command
  #[serde(default = "default_command_repetitions")]
  pub command_repetitions: u8,

  /// The directory channel and cover state is persisted in
  #[serde(default = "default_storage_path")]
  pub storage_path: PathBuf,

  pub transmitter: TransmitterConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransmitterConfig {
  /// An OOK transmitter keyed by a GPIO pin
  Gpio { pin: GpioPin },
  /// No radio, frames are only logged
  Log,
}

impl TransmitterConfig {
  pub fn build(&self) -> RtsResult<Box<dyn Transmitter>> {
    match self {
      TransmitterConfig::Gpio { pin } => Ok(Box::new(PulseTransmitter::new(GpioOutput::new(*pin)?))),
      TransmitterConfig::Log => Ok(Box::new(LogTransmitter)),
    }
  }
}

impl Config {
  pub fn load(path: &str) -> Result<Config, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_owned(),
      source,
    })?;
    Config::from_toml(path, &contents)
  }

  /// Parse and validate, `path` is only used for errors
  pub fn from_toml(path: &str, contents: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(contents).map_err(|source| ConfigError::Parse {
      path: path.to_owned(),
      source,
    })?;
    config.validate()?;
    Ok(config)
  }

  /// Check everything up front, so nothing is constructed from a bad configuration
  pub fn validate(&self) -> Result<(), ConfigError> {
    let repetitions = self.rts.command_repetitions;
    if !(MIN_COMMAND_REPETITIONS..=MAX_COMMAND_REPETITIONS).contains(&repetitions) {
      return Err(ConfigError::CommandRepetitions(repetitions));
    }

    for (identifier, cover) in &self.covers {
      cover.validate(identifier)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const MQTT: &str = r#"
    [mqtt_client]
    broker_domain = "localhost"
    broker_port = 1883
    client_id = "rts-cover"
    availability_topic = "rts/availability"
    online_availability = "online"
    offline_availability = "offline"
  "#;

  fn parse(rest: &str) -> Result<Config, ConfigError> {
    Config::from_toml("test.toml", &format!("{}\n{}", MQTT, rest))
  }

  #[test]
  fn rts_defaults() {
    let config = parse(
      r#"
      [rts.transmitter]
      type = "log"
      "#,
    )
    .unwrap();
    assert_eq!(config.rts.command_repetitions, 2);
    assert_eq!(config.rts.storage_path, PathBuf::from("rts-state"));
    assert!(matches!(config.rts.transmitter, TransmitterConfig::Log));
    assert!(config.covers.is_empty());
  }

  #[test]
  fn gpio_transmitter() {
    let config = parse(
      r#"
      [rts.transmitter]
      type = "gpio"
      pin = "Gpio17"
      "#,
    )
    .unwrap();
    assert!(matches!(config.rts.transmitter, TransmitterConfig::Gpio { pin } if pin.bcm_number() == 17));
  }

  #[test]
  fn repetitions_out_of_range() {
    for repetitions in [0, 17] {
      let result = parse(&format!(
        "[rts]\ncommand_repetitions = {}\n[rts.transmitter]\ntype = \"log\"",
        repetitions
      ));
      assert!(matches!(result, Err(ConfigError::CommandRepetitions(r)) if r == repetitions));
    }
  }

  #[test]
  fn unparsable() {
    assert!(matches!(parse("[rts"), Err(ConfigError::Parse { .. })));
    assert!(matches!(
      Config::load("/nonexistent/rts-config.toml"),
      Err(ConfigError::Read { .. })
    ));
  }
}
