use rumqttc::{AsyncClient, QoS};
use tokio::sync::mpsc;

use super::{MqttClientConfig, MqttPublish};
use crate::error::{RtsError, RtsResult};

pub type PublishSender = mpsc::UnboundedSender<MqttPublish>;
pub type PublishReceiver = mpsc::UnboundedReceiver<MqttPublish>;

pub struct MqttSender {
  client: AsyncClient,
  availability_topic: String,
  online_availability: String,
}

impl MqttSender {
  pub fn new(client: AsyncClient, config: &MqttClientConfig) -> Self {
    MqttSender {
      client,
      availability_topic: config.availability_topic.clone(),
      online_availability: config.online_availability.clone(),
    }
  }

  pub async fn publish(&self, publish: MqttPublish) -> RtsResult<()> {
    self
      .client
      .publish(publish.topic, publish.qos, publish.retain, publish.payload)
      .await?;
    Ok(())
  }

  /// Announce our availability
  pub async fn announce(&self) -> RtsResult<()> {
    self
      .publish(MqttPublish::retained(
        self.availability_topic.clone(),
        self.online_availability.clone(),
      ))
      .await
  }

  pub async fn subscribe<'a>(&self, topics: impl Iterator<Item = &'a String>) -> RtsResult<()> {
    for topic in topics {
      log::info!("Subscribing to {}", topic);
      self.client.subscribe(topic, QoS::AtLeastOnce).await?;
    }
    Ok(())
  }

  /// Forward everything published by the covers until an error occurs
  pub async fn send_messages(&self, publish_rx: &mut PublishReceiver) -> RtsResult<()> {
    loop {
      if let Some(publish) = publish_rx.recv().await {
        self.publish(publish).await?;
      }
      else {
        return Err(RtsError::MqttClosed);
      }
    }
  }
}
