use std::time::Duration;

use serde::Deserialize;
use serde_with::{serde_as, DurationSecondsWithFrac};

use super::{automation::ActionConfig, identifier::Identifier, sensor::ChannelSensorConfig, state::RestoreMode};
use crate::{
  channel::{InitialChannel, MAX_CHANNEL_ID},
  error::ConfigError,
};

fn default_true() -> bool {
  true
}

fn default_feedback_interval() -> Duration {
  Duration::from_secs(1)
}

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct CoverConfig {
  /// The name of the MQTT topic OPEN/CLOSE/STOP commands are received on
  pub command_topic: String,

  /// The name of the MQTT topic state changes are published on
  pub state_topic: String,

  /// Where the position (0.0 to 1.0) is published, if desired
  pub position_topic: Option<String>,

  /// A topic reporting the real position of the cover, used as feedback
  pub feedback_topic: Option<String>,

  /// Any message on this topic puts the motor in pairing mode
  pub program_topic: Option<String>,

  /// JSON `{"channel_id": .., "rolling_code": ..}` overrides of the channel
  pub config_channel_topic: Option<String>,

  #[serde(default = "default_true")]
  pub assumed_state: bool,

  /// Whether to assume commands succeed straight away
  #[serde(default = "default_true")]
  pub optimistic: bool,

  #[serde(default)]
  pub restore_mode: RestoreMode,

  #[serde_as(as = "DurationSecondsWithFrac<f64>")]
  #[serde(default = "default_feedback_interval")]
  /// How often the feedback is polled
  pub feedback_interval: Duration,

  /// Only used if no channel has been persisted for this cover yet
  pub channel_id: Option<u32>,
  /// Only used if no channel has been persisted for this cover yet
  pub rolling_code: Option<u32>,

  #[serde(default)]
  pub open_action: Vec<ActionConfig>,
  #[serde(default)]
  pub close_action: Vec<ActionConfig>,
  #[serde(default)]
  pub stop_action: Vec<ActionConfig>,

  pub sensor: Option<ChannelSensorConfig>,
}

impl CoverConfig {
  pub fn validate(&self, identifier: &Identifier) -> Result<(), ConfigError> {
    self.initial_channel(identifier)?;
    if let Some(sensor) = &self.sensor {
      sensor.validate(identifier)?;
    }
    Ok(())
  }

  pub fn initial_channel(&self, identifier: &Identifier) -> Result<InitialChannel, ConfigError> {
    if let Some(channel_id) = self.channel_id.filter(|channel_id| *channel_id > MAX_CHANNEL_ID) {
      return Err(ConfigError::ChannelId {
        cover: identifier.clone(),
        value: channel_id,
      });
    }
    let rolling_code = self
      .rolling_code
      .map(|rolling_code| {
        u16::try_from(rolling_code).map_err(|_| ConfigError::RollingCode {
          cover: identifier.clone(),
          value: rolling_code,
        })
      })
      .transpose()?;

    Ok(InitialChannel {
      channel_id: self.channel_id,
      rolling_code,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(toml: &str) -> CoverConfig {
    toml::from_str(toml).unwrap()
  }

  #[test]
  fn defaults() {
    let config = parse(
      r#"
      command_topic = "rts/kitchen/set"
      state_topic = "rts/kitchen/state"
      "#,
    );
    assert!(config.assumed_state);
    assert!(config.optimistic);
    assert_eq!(config.restore_mode, RestoreMode::NoRestore);
    assert_eq!(config.feedback_interval, Duration::from_secs(1));
    assert!(config.open_action.is_empty());
    assert!(config.sensor.is_none());
  }

  #[test]
  fn fractional_feedback_interval() {
    let config = parse(
      r#"
      command_topic = "a"
      state_topic = "b"
      feedback_interval = 0.25
      restore_mode = "RESTORE"
      "#,
    );
    assert_eq!(config.feedback_interval, Duration::from_millis(250));
    assert_eq!(config.restore_mode, RestoreMode::Restore);
  }

  #[test]
  fn rejects_out_of_range_channel() {
    let identifier = Identifier::from("kitchen");
    let config = parse(
      r#"
      command_topic = "a"
      state_topic = "b"
      channel_id = 0x1000000
      "#,
    );
    assert!(matches!(
      config.validate(&identifier),
      Err(ConfigError::ChannelId { value: 0x1000000, .. })
    ));

    let config = parse(
      r#"
      command_topic = "a"
      state_topic = "b"
      rolling_code = 65536
      "#,
    );
    assert!(matches!(
      config.validate(&identifier),
      Err(ConfigError::RollingCode { value: 65536, .. })
    ));
  }

  #[test]
  fn initial_channel_values() {
    let config = parse(
      r#"
      command_topic = "a"
      state_topic = "b"
      channel_id = 0x123456
      rolling_code = 42
      "#,
    );
    assert_eq!(
      config.initial_channel(&Identifier::from("kitchen")).unwrap(),
      InitialChannel {
        channel_id: Some(0x123456),
        rolling_code: Some(42),
      }
    );
  }
}
