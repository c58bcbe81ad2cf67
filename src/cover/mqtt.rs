use tokio::sync::watch;

use super::{
  action::{ConfigChannelAction, CoverHandle, ProgramAction},
  command::Command,
  config::CoverConfig,
  parse_position,
  templatable::{feedback_lambda, StateLambda},
};
use crate::{channel::ChannelUpdate, mqtt_client::TopicRoutes};

/// Route the cover's MQTT topics to its handle.
///
/// Returns the state lambda to give the controller if a feedback topic is configured.
pub fn route_topics(routes: &mut TopicRoutes, config: &CoverConfig, handle: &CoverHandle) -> Option<StateLambda> {
  let cover = handle.clone();
  routes.route(config.command_topic.clone(), move |payload| {
    match payload.parse::<Command>() {
      Ok(command @ (Command::Open | Command::Close | Command::Stop)) => send(&cover, command),
      _ => log::warn!("Cover ({}) ignoring unknown command {:?}", cover.identifier(), payload),
    }
  });

  if let Some(topic) = &config.program_topic {
    let program = ProgramAction::new(handle.clone());
    routes.route(topic.clone(), move |_| {
      if let Err(err) = program.play() {
        log::error!("{}", err);
      }
    });
  }

  if let Some(topic) = &config.config_channel_topic {
    let cover = handle.clone();
    routes.route(topic.clone(), move |payload| {
      match serde_json::from_str::<ChannelUpdate>(payload) {
        Ok(update) => {
          let mut action = ConfigChannelAction::new(cover.clone());
          if let Some(channel_id) = update.channel_id {
            action.set_channel_id(channel_id);
          }
          if let Some(rolling_code) = update.rolling_code {
            action.set_rolling_code(rolling_code);
          }
          if let Err(err) = action.play() {
            log::error!("{}", err);
          }
        }
        Err(err) => log::warn!("Cover ({}) ignoring channel configuration {:?}: {}", cover.identifier(), payload, err),
      }
    });
  }

  config.feedback_topic.as_ref().map(|topic| {
    let (position_tx, position_rx) = watch::channel(None);
    let identifier = handle.identifier().clone();
    routes.route(topic.clone(), move |payload| match parse_position(payload) {
      Ok(position) => {
        position_tx.send_replace(Some(position));
      }
      Err(err) => log::warn!("Cover ({}) ignoring feedback: {}", identifier, err),
    });
    feedback_lambda(position_rx)
  })
}

fn send(cover: &CoverHandle, command: Command) {
  if let Err(err) = cover.send(command) {
    log::error!("{}", err);
  }
}
