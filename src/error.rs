use std::io;

use thiserror::Error;
use tokio::task::JoinError;

use crate::cover::identifier::Identifier;

pub type RtsResult<T> = Result<T, RtsError>;

#[derive(Debug, Error)]
pub enum RtsError {
  #[error(transparent)]
  #[cfg(feature = "arm")]
  Gpio(#[from] rppal::gpio::Error),
  #[cfg(not(feature = "arm"))]
  #[error(transparent)]
  Gpio(#[from] crate::mock_gpio::Error),
  #[error(transparent)]
  MqttClient(#[from] rumqttc::ClientError),
  #[error(transparent)]
  MqttConnection(#[from] rumqttc::ConnectionError),
  #[error("the MQTT client has been closed")]
  MqttClosed,
  #[error(transparent)]
  JoinError(#[from] JoinError),
  #[error(transparent)]
  Storage(#[from] io::Error),
  #[error(transparent)]
  Json(#[from] serde_json::Error),
  #[error(transparent)]
  Config(#[from] ConfigError),
  #[error("no cover registered as {0:?}")]
  UnknownCover(Identifier),
  #[error("channel id {0:#x} does not fit in 24 bits")]
  InvalidChannel(u32),
  #[error("rolling code {0} does not fit in 16 bits")]
  InvalidCode(u32),
  #[error("frame checksum mismatch (nibble {0:#x})")]
  InvalidFrame(u8),
  #[error("{0:?} is not a cover position")]
  InvalidPosition(String),
  #[error("unknown RTS control code {0:#x}")]
  UnknownControlCode(u8),
  #[error("the transmitter queue has been closed")]
  TransmitterClosed,
  #[error("cover {0} is no longer listening for commands")]
  CoverClosed(Identifier),
}

/// Problems found while loading the configuration, before anything is constructed.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("unable to read {path}: {source}")]
  Read {
    path: String,
    #[source]
    source: io::Error,
  },
  #[error("unable to parse {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: toml::de::Error,
  },
  #[error("command_repetitions must be between 1 and 16, got {0}")]
  CommandRepetitions(u8),
  #[error("cover {cover}: channel_id {value:#x} is out of range (max 0xffffff)")]
  ChannelId { cover: Identifier, value: u32 },
  #[error("cover {cover}: rolling_code {value} is out of range (max 0xffff)")]
  RollingCode { cover: Identifier, value: u32 },
  #[error("cover {0}: sensor needs at least one of channel_id_topic or rolling_code_topic")]
  EmptySensor(Identifier),
  #[error("unknown GPIO pin {0:?}")]
  GpioPin(String),
}
