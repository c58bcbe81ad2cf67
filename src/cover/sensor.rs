use serde::Deserialize;

use super::identifier::Identifier;
use crate::{
  channel::{Channel, ChannelListener},
  error::ConfigError,
  mqtt_client::{MqttPublish, PublishSender},
};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelSensorConfig {
  pub channel_id_topic: Option<String>,
  pub rolling_code_topic: Option<String>,
}

impl ChannelSensorConfig {
  pub fn validate(&self, identifier: &Identifier) -> Result<(), ConfigError> {
    if self.channel_id_topic.is_none() && self.rolling_code_topic.is_none() {
      Err(ConfigError::EmptySensor(identifier.clone()))
    }
    else {
      Ok(())
    }
  }
}

/// Publishes a cover's channel id and next rolling code, so they can be noted down and restored
/// if the device ever loses its storage.
#[derive(Debug, Clone)]
pub struct ChannelSensor {
  identifier: Identifier,
  config: ChannelSensorConfig,
  mqtt_tx: PublishSender,
}

impl ChannelSensor {
  pub fn new(identifier: Identifier, config: ChannelSensorConfig, mqtt_tx: PublishSender) -> Self {
    ChannelSensor {
      identifier,
      config,
      mqtt_tx,
    }
  }

  pub fn publish(&self, channel: Channel) {
    let values = [
      (&self.config.channel_id_topic, channel.channel_id.to_string()),
      (&self.config.rolling_code_topic, channel.rolling_code.to_string()),
    ];
    for (topic, payload) in values {
      if let Some(topic) = topic {
        if self.mqtt_tx.send(MqttPublish::retained(topic.clone(), payload)).is_err() {
          log::warn!("MQTT channel closed, cover {} sensor not published", self.identifier);
        }
      }
    }
  }

  /// Publish on every change to the registry
  pub fn into_listener(self) -> ChannelListener {
    Box::new(move |channel| self.publish(channel))
  }
}
