use rumqttc::{AsyncClient, LastWill, MqttOptions, QoS};
use serde::Deserialize;
use tokio::sync::mpsc;

pub use self::{
  receiver::{MqttReceiver, TopicRoutes},
  sender::{MqttSender, PublishReceiver, PublishSender},
};

pub mod receiver;
pub mod sender;

/// Requests that can be waiting on the event loop before publishing blocks
const REQUEST_CAPACITY: usize = 64;

#[derive(Debug, Clone, Deserialize)]
pub struct MqttClientConfig {
  pub broker_domain: String,
  pub broker_port: u16,
  pub client_id: String,
  pub availability_topic: String,
  pub online_availability: String,
  pub offline_availability: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MqttPublish {
  pub topic: String,
  pub qos: QoS,
  pub retain: bool,
  pub payload: String,
}

impl MqttPublish {
  /// A retained message, as used for every state the covers publish
  pub fn retained(topic: impl Into<String>, payload: impl Into<String>) -> Self {
    MqttPublish {
      topic: topic.into(),
      qos: QoS::AtLeastOnce,
      retain: true,
      payload: payload.into(),
    }
  }
}

/// The queue components publish through. It outlives MQTT sessions, so nothing published while
/// the broker is away is lost.
pub fn publish_channel() -> (PublishSender, PublishReceiver) {
  mpsc::unbounded_channel()
}

pub struct MqttClient {
  pub receiver: MqttReceiver,
  pub sender: MqttSender,
}

impl MqttClient {
  pub fn with_config(config: &MqttClientConfig) -> MqttClient {
    log::info!(
      "Connecting to MQTT broker {}:{} as {}",
      config.broker_domain,
      config.broker_port,
      config.client_id
    );
    let mut options = MqttOptions::new(&config.client_id, &config.broker_domain, config.broker_port);
    options.set_last_will(LastWill::new(
      &config.availability_topic,
      config.offline_availability.as_bytes().to_vec(),
      QoS::AtLeastOnce,
      true,
    ));

    let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);

    MqttClient {
      receiver: MqttReceiver::new(event_loop),
      sender: MqttSender::new(client, config),
    }
  }
}
