#![warn(rust_2018_idioms)]

use std::{process, sync::Arc, time::Duration};

use rts_cover::{
  channel::ChannelRegistry,
  config::{Config, CONFIG_PATH},
  cover::{mqtt::route_topics, sensor::ChannelSensor, CoverController, CoverHandle},
  error::{RtsError, RtsResult},
  mqtt_client::{self, MqttClient, PublishReceiver, TopicRoutes},
  rts::Rts,
  storage::FileStorage,
};
use simple_logger::SimpleLogger;
use tokio::{select, sync::Mutex, time::sleep};

#[tokio::main]
async fn main() {
  SimpleLogger::new()
    .with_module_level("rumqttc", log::LevelFilter::Warn)
    .init()
    .unwrap();

  let config = match Config::load(CONFIG_PATH) {
    Ok(config) => config,
    Err(err) => {
      log::error!("Invalid configuration: {}", err);
      process::exit(1);
    }
  };

  // covers live for the whole process, only the MQTT session is restarted
  let (routes, mut publish_rx) = match start_covers(&config).await {
    Ok(started) => started,
    Err(err) => {
      log::error!("Failed to start covers: {}", err);
      process::exit(1);
    }
  };

  loop {
    let err = run(&config, &routes, &mut publish_rx).await;
    log::error!("Error occurred, restarting in 5 seconds: {:?}", err);
    // wait some time for the broker to come back online
    sleep(Duration::from_secs(5)).await;
  }
}

/// Load every channel, start the transmitter and spawn a task for each cover
async fn start_covers(config: &Config) -> RtsResult<(TopicRoutes, PublishReceiver)> {
  let (mqtt_tx, publish_rx) = mqtt_client::publish_channel();
  let storage = FileStorage::open(&config.rts.storage_path)?;

  let mut registry = ChannelRegistry::new(Box::new(storage.clone()));
  for (identifier, cover_config) in &config.covers {
    let channel = registry.register(identifier.clone(), cover_config.initial_channel(identifier)?)?;

    if let Some(sensor_config) = &cover_config.sensor {
      let sensor = ChannelSensor::new(identifier.clone(), sensor_config.clone(), mqtt_tx.clone());
      sensor.publish(channel);
      registry.subscribe(identifier, sensor.into_listener())?;
    }
  }

  let (rts, worker) = Rts::new(
    Arc::new(Mutex::new(registry)),
    config.rts.command_repetitions,
    config.rts.transmitter.build()?,
  );
  worker.spawn();

  let mut routes = TopicRoutes::default();
  for (identifier, cover_config) in &config.covers {
    let (handle, commands) = CoverHandle::new(identifier.clone());
    let mut cover = CoverController::new(
      identifier.clone(),
      cover_config,
      rts.clone(),
      Box::new(storage.clone()),
      mqtt_tx.clone(),
    );

    if let Some(state_lambda) = route_topics(&mut routes, cover_config, &handle) {
      cover.set_state_lambda(state_lambda);
    }

    cover.setup().await;
    tokio::spawn(cover.listen(commands));
  }

  Ok((routes, publish_rx))
}

/// Run one MQTT session, forwarding messages both ways
/// Runs forever unless an error occurs
async fn run(config: &Config, routes: &TopicRoutes, publish_rx: &mut PublishReceiver) -> RtsError {
  let MqttClient { mut receiver, sender } = MqttClient::with_config(&config.mqtt_client);

  let send = async {
    sender.subscribe(routes.topics()).await?;
    sender.announce().await?;
    sender.send_messages(publish_rx).await
  };

  // both only end if an error occurs (most likely MQTT broker disconnection)
  let result = select! {
    result = receiver.receive_messages(routes) => result,
    result = send => result,
  };

  match result {
    Err(err) => err,
    Ok(()) => RtsError::MqttClosed,
  }
}
