use std::{fmt, time::Duration};

use tokio::{select, time};

pub use self::{
  action::{CommandReceiver, ConfigChannelAction, CoverHandle, ProgramAction},
  command::Command,
  config::CoverConfig,
  identifier::Identifier,
  state::{CoverState, CoverTraits, Operation, RestoreMode},
  templatable::{feedback_lambda, StateLambda, Templatable},
};
use self::automation::{Trigger, Triggers};
use crate::{
  channel::ChannelUpdate,
  error::{RtsError, RtsResult},
  mqtt_client::{MqttPublish, PublishSender},
  rts::{frame::ControlCode, Rts},
  storage::Storage,
};

pub mod action;
pub mod automation;
pub mod command;
pub mod config;
pub mod identifier;
pub mod mqtt;
pub mod sensor;
pub mod state;
pub mod templatable;

/// `tokio::time::interval` does not accept zero
const MIN_FEEDBACK_INTERVAL: Duration = Duration::from_millis(10);

/// The storage slot the cover's last state is kept in
pub fn state_slot(identifier: &Identifier) -> String {
  format!("{}.cover", identifier)
}

/// Parse a feedback payload such as `0.5`
pub fn parse_position(payload: &str) -> RtsResult<f32> {
  payload
    .trim()
    .parse::<f32>()
    .ok()
    .filter(|position| !position.is_nan())
    .ok_or_else(|| RtsError::InvalidPosition(payload.to_owned()))
}

/// A cover moved by an RTS motor, controlled by pretending to be its remote.
///
/// RTS gives no feedback, so unless a state lambda says otherwise the state is whatever the last
/// command implies.
pub struct CoverController {
  identifier: Identifier,
  rts: Rts,
  storage: Box<dyn Storage>,
  mqtt_tx: PublishSender,
  state_topic: String,
  position_topic: Option<String>,
  assumed_state: bool,
  optimistic: bool,
  restore_mode: RestoreMode,
  feedback_interval: Duration,
  state_lambda: Option<StateLambda>,
  triggers: Triggers,
  state: CoverState,
}

impl fmt::Display for CoverController {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Cover ({})", self.identifier.0)
  }
}

impl CoverController {
  pub fn new(
    identifier: Identifier,
    config: &CoverConfig,
    rts: Rts,
    storage: Box<dyn Storage>,
    mqtt_tx: PublishSender,
  ) -> CoverController {
    let triggers = Triggers {
      open: Trigger::from_config(&identifier, &config.open_action, &mqtt_tx),
      close: Trigger::from_config(&identifier, &config.close_action, &mqtt_tx),
      stop: Trigger::from_config(&identifier, &config.stop_action, &mqtt_tx),
    };

    CoverController {
      identifier,
      rts,
      storage,
      mqtt_tx,
      state_topic: config.state_topic.clone(),
      position_topic: config.position_topic.clone(),
      assumed_state: config.assumed_state,
      optimistic: config.optimistic,
      restore_mode: config.restore_mode,
      feedback_interval: config.feedback_interval.max(MIN_FEEDBACK_INTERVAL),
      state_lambda: None,
      triggers,
      state: CoverState::default(),
    }
  }

  pub fn identifier(&self) -> &Identifier {
    &self.identifier
  }

  pub fn state(&self) -> CoverState {
    self.state
  }

  pub fn traits(&self) -> CoverTraits {
    CoverTraits {
      is_assumed_state: self.assumed_state,
      supports_position: false,
      supports_tilt: false,
      supports_toggle: false,
    }
  }

  /// Polled every feedback interval, whatever it returns is taken as the real position
  pub fn set_state_lambda(&mut self, lambda: StateLambda) {
    self.state_lambda = Some(lambda);
  }

  /// Restore the last state according to the restore mode, then publish it.
  pub async fn setup(&mut self) {
    log::info!("Setting up {}, restore mode {:?}", self, self.restore_mode);

    if self.restore_mode != RestoreMode::NoRestore {
      if let Some(restored) = self.load_state() {
        log::info!("{} restored state: {:?}", self, restored);
        self.state = restored;

        if self.restore_mode == RestoreMode::RestoreAndCall {
          if let Some(command) = restored.restore_command() {
            log::info!("{} repeating {} to reach its restored state", self, command);
            self.handle(command).await;
          }
        }
      }
    }

    self.publish_state();
  }

  pub async fn handle(&mut self, command: Command) {
    log::debug!("{} was commanded to {}, current state: {:?}", self, command, self.state);

    match command {
      Command::Open => {
        if self.transmit(ControlCode::Open).await {
          self.set_state(self.travel(Operation::Opening, CoverState::OPEN));
          self.triggers.open.fire();
        }
      }
      Command::Close => {
        if self.transmit(ControlCode::Close).await {
          self.set_state(self.travel(Operation::Closing, CoverState::CLOSED));
          self.triggers.close.fire();
        }
      }
      Command::Stop => {
        if self.transmit(ControlCode::Stop).await {
          self.set_state(CoverState {
            operation: Operation::Stopped,
            position: self.state.position,
          });
          self.triggers.stop.fire();
        }
      }
      Command::Program => {
        self.transmit(ControlCode::Program).await;
      }
      Command::ConfigChannel(update) => self.config_channel(update).await,
    }
  }

  /// Take `position` as the real position of the cover. Reaching either end stops any travel.
  pub fn apply_feedback(&mut self, position: f32) {
    if position.is_nan() {
      log::warn!("{} ignoring feedback that is not a number", self);
      return;
    }
    let position = position.clamp(CoverState::CLOSED, CoverState::OPEN);

    let at_end = position >= CoverState::OPEN || position <= CoverState::CLOSED;
    let operation = match self.state.operation {
      Operation::Opening | Operation::Closing if at_end => Operation::Idle,
      Operation::Unknown => Operation::Idle,
      operation => operation,
    };

    self.set_state(CoverState {
      position: Some(position),
      operation,
    });
  }

  /// Ask the state lambda for the position. Returns true if it had one.
  pub fn poll_feedback(&mut self) -> bool {
    let position = match self.state_lambda.as_mut() {
      Some(lambda) => lambda(),
      None => return false,
    };

    match position {
      Some(position) => {
        self.apply_feedback(position);
        true
      }
      None => false,
    }
  }

  /// Handle commands and poll feedback until every handle to this cover has been dropped
  pub async fn listen(mut self, mut commands: CommandReceiver) {
    log::info!("{} listening with initial state: {:?}", &self, self.state);
    let mut interval = time::interval(self.feedback_interval);
    let has_feedback = self.state_lambda.is_some();

    loop {
      select! {
        command = commands.recv() => match command {
          Some(command) => self.handle(command).await,
          None => break,
        },

        _ = interval.tick(), if has_feedback => {
          self.poll_feedback();
        }
      }
    }

    log::info!("{} stopped listening", &self);
  }

  /// Where a command leaves the cover. Optimistic covers are assumed to be at the end already.
  fn travel(&self, operation: Operation, end_position: f32) -> CoverState {
    if self.optimistic {
      CoverState {
        operation: Operation::Idle,
        position: Some(end_position),
      }
    }
    else {
      CoverState {
        operation,
        position: self.state.position,
      }
    }
  }

  /// Returns false if the command was dropped
  async fn transmit(&mut self, control: ControlCode) -> bool {
    match self.rts.schedule(&self.identifier, control).await {
      Ok(()) => true,
      Err(err) => {
        log::error!("{} dropped {} command: {}", self, control, err);
        false
      }
    }
  }

  async fn config_channel(&mut self, update: ChannelUpdate) {
    if let Err(err) = self.rts.config_channel(&self.identifier, update).await {
      log::error!("{} dropped channel configuration {:?}: {}", self, update, err);
    }
  }

  fn set_state(&mut self, state: CoverState) {
    if state == self.state {
      return;
    }
    log::debug!("{} setting new state: {:?}", &self, state);
    self.state = state;
    self.publish_state();
    self.persist_state();
  }

  fn publish_state(&self) {
    let mut publishes = vec![MqttPublish::retained(
      self.state_topic.clone(),
      self.state.state_payload(),
    )];
    if let (Some(topic), Some(position)) = (&self.position_topic, self.state.position) {
      publishes.push(MqttPublish::retained(topic.clone(), position.to_string()));
    }

    for publish in publishes {
      if self.mqtt_tx.send(publish).is_err() {
        log::warn!("MQTT channel closed, {} state not published", self);
      }
    }
  }

  fn persist_state(&mut self) {
    let slot = state_slot(&self.identifier);
    let result = serde_json::to_vec(&self.state)
      .map_err(RtsError::from)
      .and_then(|data| self.storage.write(&slot, &data));
    if let Err(err) = result {
      log::warn!("Failed to persist state of {}: {}", self, err);
    }
  }

  fn load_state(&self) -> Option<CoverState> {
    match self.storage.read(&state_slot(&self.identifier)) {
      Ok(Some(data)) => match serde_json::from_slice::<CoverState>(&data) {
        Ok(mut state) => {
          state.position = state
            .position
            .map(|position| position.clamp(CoverState::CLOSED, CoverState::OPEN));
          Some(state)
        }
        Err(err) => {
          log::warn!("Stored state of {} is unreadable: {}", self, err);
          None
        }
      },
      Ok(None) => {
        log::info!("No stored state for {}", self);
        None
      }
      Err(err) => {
        log::warn!("Failed to load state of {}: {}", self, err);
        None
      }
    }
  }
}
