use std::fmt;

use rumqttc::QoS;
use serde::Deserialize;

use super::identifier::Identifier;
use crate::mqtt_client::{MqttPublish, PublishSender};

/// Something to do after a cover has been commanded
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionConfig {
  Publish {
    topic: String,
    payload: String,
    #[serde(default)]
    retain: bool,
  },
  Log(String),
}

pub type Action = Box<dyn FnMut() + Send>;

/// Actions run in order whenever the trigger fires
#[derive(Default)]
pub struct Trigger {
  actions: Vec<Action>,
}

impl fmt::Debug for Trigger {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Trigger ({} actions)", self.actions.len())
  }
}

impl Trigger {
  pub fn from_config(identifier: &Identifier, actions: &[ActionConfig], mqtt_tx: &PublishSender) -> Trigger {
    let mut trigger = Trigger::default();
    for action in actions {
      match action.clone() {
        ActionConfig::Publish { topic, payload, retain } => {
          let mqtt_tx = mqtt_tx.clone();
          trigger.add(move || {
            let publish = MqttPublish {
              topic: topic.clone(),
              qos: QoS::AtLeastOnce,
              retain,
              payload: payload.clone(),
            };
            if mqtt_tx.send(publish).is_err() {
              log::warn!("MQTT channel closed, dropping publish to {}", topic);
            }
          });
        }
        ActionConfig::Log(message) => {
          let identifier = identifier.clone();
          trigger.add(move || log::info!("Cover ({}): {}", identifier, message));
        }
      }
    }
    trigger
  }

  pub fn add(&mut self, action: impl FnMut() + Send + 'static) {
    self.actions.push(Box::new(action));
  }

  pub fn fire(&mut self) {
    for action in &mut self.actions {
      action();
    }
  }

  pub fn len(&self) -> usize {
    self.actions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }
}

#[derive(Debug, Default)]
pub struct Triggers {
  pub open: Trigger,
  pub close: Trigger,
  pub stop: Trigger,
}
