use std::{collections::HashMap, fmt, sync::Arc};

use rumqttc::{Event, EventLoop, Packet};

use crate::error::RtsResult;

pub type TopicHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Which handlers receive the payloads of which topics.
#[derive(Clone, Default)]
pub struct TopicRoutes {
  handlers: HashMap<String, Vec<TopicHandler>>,
}

impl fmt::Debug for TopicRoutes {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_set().entries(self.handlers.keys()).finish()
  }
}

impl TopicRoutes {
  pub fn route(&mut self, topic: impl Into<String>, handler: impl Fn(&str) + Send + Sync + 'static) {
    self.handlers.entry(topic.into()).or_default().push(Arc::new(handler));
  }

  pub fn topics(&self) -> impl Iterator<Item = &String> {
    self.handlers.keys()
  }

  /// Returns false if nothing is routed to `topic`
  pub fn dispatch(&self, topic: &str, payload: &str) -> bool {
    match self.handlers.get(topic) {
      Some(handlers) => {
        for handler in handlers {
          handler(payload);
        }
        true
      }
      None => false,
    }
  }
}

pub struct MqttReceiver {
  event_loop: EventLoop,
}

impl MqttReceiver {
  pub fn new(event_loop: EventLoop) -> Self {
    MqttReceiver { event_loop }
  }

  /// Poll the connection, handing every incoming publish to its route. Only returns on error.
  pub async fn receive_messages(&mut self, routes: &TopicRoutes) -> RtsResult<()> {
    loop {
      let event = self.event_loop.poll().await?;
      if let Event::Incoming(Packet::Publish(publish)) = event {
        let payload = String::from_utf8_lossy(&publish.payload);
        if !routes.dispatch(&publish.topic, &payload) {
          log::debug!("Ignoring message on unrouted topic {}", publish.topic);
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;

  #[test]
  fn dispatches_to_every_handler_of_a_topic() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let mut routes = TopicRoutes::default();
    for name in ["first", "second"] {
      let received = Arc::clone(&received);
      routes.route("rts/kitchen/set", move |payload: &str| {
        received.lock().unwrap().push(format!("{}: {}", name, payload))
      });
    }

    assert!(routes.dispatch("rts/kitchen/set", "OPEN"));
    assert!(!routes.dispatch("rts/hall/set", "OPEN"));
    assert_eq!(*received.lock().unwrap(), vec!["first: OPEN", "second: OPEN"]);
  }
}
