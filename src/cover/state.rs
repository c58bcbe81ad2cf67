use std::fmt;

use serde::{Deserialize, Serialize};

use super::command::Command;

/// What to do with the last known state when starting up
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RestoreMode {
  /// Start in an unknown state
  #[default]
  NoRestore,
  /// Take the last known state without transmitting anything
  Restore,
  /// Take the last known state and send the command that leads to it again, in case the cover
  /// stopped moving when the power went out
  RestoreAndCall,
}

/// What the cover is believed to be doing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
  #[default]
  Unknown,
  Idle,
  Opening,
  Closing,
  Stopped,
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Operation::Unknown => write!(f, "unknown"),
      Operation::Idle => write!(f, "idle"),
      Operation::Opening => write!(f, "opening"),
      Operation::Closing => write!(f, "closing"),
      Operation::Stopped => write!(f, "stopped"),
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverState {
  /// 0.0 is closed, 1.0 is open. `None` until something tells us.
  pub position: Option<f32>,
  pub operation: Operation,
}

impl CoverState {
  pub const OPEN: f32 = 1.0;
  pub const CLOSED: f32 = 0.0;

  /// The command that brings a cover back to this state after a restart
  pub fn restore_command(&self) -> Option<Command> {
    match self.operation {
      Operation::Opening => Some(Command::Open),
      Operation::Closing => Some(Command::Close),
      Operation::Stopped => Some(Command::Stop),
      Operation::Idle | Operation::Unknown => match self.position {
        Some(position) if position >= CoverState::OPEN => Some(Command::Open),
        Some(position) if position <= CoverState::CLOSED => Some(Command::Close),
        _ => None,
      },
    }
  }

  /// The payload published on the state topic
  pub fn state_payload(&self) -> &'static str {
    match (self.operation, self.position) {
      (Operation::Opening, _) => "opening",
      (Operation::Closing, _) => "closing",
      (Operation::Stopped, _) => "stopped",
      (_, Some(position)) if position <= CoverState::CLOSED => "closed",
      (_, Some(_)) => "open",
      (_, None) => "unknown",
    }
  }
}

/// Capabilities reported for an RTS cover. RTS is one way, so the state is always assumed unless
/// feedback is configured, and there is no way to ask for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverTraits {
  pub is_assumed_state: bool,
  pub supports_position: bool,
  pub supports_tilt: bool,
  pub supports_toggle: bool,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn state(position: Option<f32>, operation: Operation) -> CoverState {
    CoverState { position, operation }
  }

  #[test]
  fn restore_commands() {
    assert_eq!(state(None, Operation::Opening).restore_command(), Some(Command::Open));
    assert_eq!(state(Some(0.5), Operation::Closing).restore_command(), Some(Command::Close));
    assert_eq!(state(Some(0.5), Operation::Stopped).restore_command(), Some(Command::Stop));
    assert_eq!(state(Some(1.0), Operation::Idle).restore_command(), Some(Command::Open));
    assert_eq!(state(Some(0.0), Operation::Idle).restore_command(), Some(Command::Close));
    assert_eq!(state(Some(0.3), Operation::Idle).restore_command(), None);
    assert_eq!(state(None, Operation::Unknown).restore_command(), None);
  }

  #[test]
  fn state_payloads() {
    assert_eq!(state(Some(1.0), Operation::Opening).state_payload(), "opening");
    assert_eq!(state(Some(0.0), Operation::Idle).state_payload(), "closed");
    assert_eq!(state(Some(0.4), Operation::Idle).state_payload(), "open");
    assert_eq!(state(None, Operation::Unknown).state_payload(), "unknown");
  }

  #[test]
  fn restore_mode_names() {
    #[derive(Deserialize)]
    struct Wrapper {
      mode: RestoreMode,
    }
    let wrapper: Wrapper = toml::from_str("mode = \"RESTORE_AND_CALL\"").unwrap();
    assert_eq!(wrapper.mode, RestoreMode::RestoreAndCall);
  }

  #[test]
  fn persisted_as_json() {
    let json = serde_json::to_string(&state(Some(1.0), Operation::Opening)).unwrap();
    assert_eq!(json, r#"{"position":1.0,"operation":"opening"}"#);
  }
}
