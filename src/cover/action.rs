use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::{command::Command, identifier::Identifier, templatable::Templatable};
use crate::{
  channel::ChannelUpdate,
  error::{RtsError, RtsResult},
};

pub type CommandReceiver = UnboundedReceiver<Command>;

/// Sends commands to a running cover controller.
#[derive(Debug, Clone)]
pub struct CoverHandle {
  identifier: Identifier,
  tx: UnboundedSender<Command>,
}

impl CoverHandle {
  pub fn new(identifier: Identifier) -> (CoverHandle, CommandReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CoverHandle { identifier, tx }, rx)
  }

  pub fn identifier(&self) -> &Identifier {
    &self.identifier
  }

  pub fn send(&self, command: Command) -> RtsResult<()> {
    self
      .tx
      .send(command)
      .map_err(|_| RtsError::CoverClosed(self.identifier.clone()))
  }
}

/// Puts the cover's motor into pairing mode
#[derive(Debug, Clone)]
pub struct ProgramAction {
  cover: CoverHandle,
}

impl ProgramAction {
  pub fn new(cover: CoverHandle) -> Self {
    ProgramAction { cover }
  }

  pub fn play(&self) -> RtsResult<()> {
    log::info!("Sending PROGRAM to cover {}", self.cover.identifier());
    self.cover.send(Command::Program)
  }
}

/// Overrides the cover's channel id and/or rolling code, both applied together.
#[derive(Debug)]
pub struct ConfigChannelAction {
  cover: CoverHandle,
  channel_id: Option<Templatable<u32>>,
  rolling_code: Option<Templatable<u32>>,
}

impl ConfigChannelAction {
  pub fn new(cover: CoverHandle) -> Self {
    ConfigChannelAction {
      cover,
      channel_id: None,
      rolling_code: None,
    }
  }

  pub fn set_channel_id(&mut self, channel_id: impl Into<Templatable<u32>>) {
    self.channel_id = Some(channel_id.into());
  }

  pub fn set_rolling_code(&mut self, rolling_code: impl Into<Templatable<u32>>) {
    self.rolling_code = Some(rolling_code.into());
  }

  /// Both values are evaluated now, not when the action was built
  pub fn play(&self) -> RtsResult<()> {
    let update = ChannelUpdate {
      channel_id: self.channel_id.as_ref().map(Templatable::value),
      rolling_code: self.rolling_code.as_ref().map(Templatable::value),
    };
    self.cover.send(Command::ConfigChannel(update))
  }
}
