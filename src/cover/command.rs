use std::{fmt, str::FromStr};

use crate::{channel::ChannelUpdate, rts::frame::ControlCode};

/// Everything a cover can be told to do. Only the first four are transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  Open,
  Close,
  Stop,
  /// Put the paired motor into pairing mode, so it learns this cover's channel
  Program,
  ConfigChannel(ChannelUpdate),
}

impl Command {
  pub fn set_channel(channel_id: u32) -> Command {
    Command::ConfigChannel(ChannelUpdate {
      channel_id: Some(channel_id),
      rolling_code: None,
    })
  }

  pub fn set_rolling_code(rolling_code: u32) -> Command {
    Command::ConfigChannel(ChannelUpdate {
      channel_id: None,
      rolling_code: Some(rolling_code),
    })
  }

  /// The control code transmitted for this command, if it is transmitted at all
  pub fn control_code(&self) -> Option<ControlCode> {
    match self {
      Command::Open => Some(ControlCode::Open),
      Command::Close => Some(ControlCode::Close),
      Command::Stop => Some(ControlCode::Stop),
      Command::Program => Some(ControlCode::Program),
      Command::ConfigChannel(_) => None,
    }
  }
}

impl From<ControlCode> for Command {
  fn from(control: ControlCode) -> Self {
    match control {
      ControlCode::Open => Command::Open,
      ControlCode::Close => Command::Close,
      ControlCode::Stop => Command::Stop,
      ControlCode::Program => Command::Program,
    }
  }
}

impl FromStr for Command {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    ControlCode::from_str(s.trim()).map(Command::from)
  }
}

impl fmt::Display for Command {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.control_code() {
      Some(control) => write!(f, "{}", control),
      None => write!(f, "CONFIG_CHANNEL"),
    }
  }
}
