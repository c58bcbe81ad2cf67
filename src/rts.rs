use std::sync::Arc;

use tokio::{
  sync::{
    mpsc::{self, UnboundedReceiver, UnboundedSender},
    Mutex,
  },
  task::JoinHandle,
};

use self::{
  frame::{ControlCode, Frame},
  transmitter::Transmitter,
};
use crate::{
  channel::{Channel, ChannelRegistry, ChannelUpdate},
  cover::identifier::Identifier,
  error::{RtsError, RtsResult},
};

pub mod frame;
pub mod transmitter;

pub const MIN_COMMAND_REPETITIONS: u8 = 1;
pub const MAX_COMMAND_REPETITIONS: u8 = 16;
pub const DEFAULT_COMMAND_REPETITIONS: u8 = 2;

/// A command whose rolling code has already been consumed, waiting for the transmitter.
#[derive(Debug, Clone)]
pub struct ScheduledCommand {
  pub identifier: Identifier,
  pub frame: Frame,
  pub repetitions: u8,
}

/// The hub every cover sends its commands through.
///
/// Commands are queued in the order they are scheduled and transmitted one at a time, so frames of
/// different covers are never interleaved on air and no command is dropped while the transmitter
/// is busy.
#[derive(Debug, Clone)]
pub struct Rts {
  registry: Arc<Mutex<ChannelRegistry>>,
  queue: UnboundedSender<ScheduledCommand>,
  command_repetitions: u8,
}

impl Rts {
  pub fn new(
    registry: Arc<Mutex<ChannelRegistry>>,
    command_repetitions: u8,
    transmitter: Box<dyn Transmitter>,
  ) -> (Rts, RtsWorker) {
    let (queue, pending) = mpsc::unbounded_channel();

    let rts = Rts {
      registry,
      queue,
      command_repetitions,
    };
    let worker = RtsWorker { transmitter, pending };

    (rts, worker)
  }

  pub fn registry(&self) -> &Arc<Mutex<ChannelRegistry>> {
    &self.registry
  }

  /// Consume the cover's next rolling code and queue the command for transmission.
  ///
  /// The new rolling code is persisted before the command is queued. If that fails the command is
  /// not sent.
  pub async fn schedule(&self, identifier: &Identifier, control: ControlCode) -> RtsResult<()> {
    let registry = Arc::clone(&self.registry);
    let queue = self.queue.clone();
    let identifier = identifier.clone();
    let repetitions = self.command_repetitions;

    // persisting syncs to disk, so it runs on a blocking thread
    tokio::task::spawn_blocking(move || {
      // held until the command is queued, so queue order matches rolling code order
      let mut registry = registry.blocking_lock();

      let channel = registry.get(&identifier)?;
      let rolling_code = registry.advance(&identifier)?;
      let frame = Frame::new(control, channel.channel_id, rolling_code)?;

      log::debug!(
        "Scheduling RTS command -- Control code: {}, Channel id: {:#x}, Rolling code value: {}",
        control,
        channel.channel_id,
        rolling_code
      );

      queue
        .send(ScheduledCommand {
          identifier,
          frame,
          repetitions,
        })
        .map_err(|_| RtsError::TransmitterClosed)
    })
    .await?
  }

  /// Apply a channel override for the cover, persisted on a blocking thread.
  pub async fn config_channel(&self, identifier: &Identifier, update: ChannelUpdate) -> RtsResult<Channel> {
    let registry = Arc::clone(&self.registry);
    let identifier = identifier.clone();

    tokio::task::spawn_blocking(move || registry.blocking_lock().config_channel(&identifier, update)).await?
  }
}

/// Owns the transmitter and drains the command queue.
#[derive(Debug)]
pub struct RtsWorker {
  transmitter: Box<dyn Transmitter>,
  pending: UnboundedReceiver<ScheduledCommand>,
}

impl RtsWorker {
  /// Run on a blocking thread until every [`Rts`] handle has been dropped.
  pub fn spawn(self) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || self.run())
  }

  pub fn run(mut self) {
    while let Some(command) = self.pending.blocking_recv() {
      self.transmit(command);
    }
    log::info!("RTS command queue closed");
  }

  /// Transmit everything queued so far without waiting for more, returning how many commands were
  /// sent.
  pub fn process_pending(&mut self) -> usize {
    let mut processed = 0;
    while let Ok(command) = self.pending.try_recv() {
      self.transmit(command);
      processed += 1;
    }
    if processed > 0 {
      log::debug!("Completed all scheduled RTS commands");
    }
    processed
  }

  fn transmit(&mut self, command: ScheduledCommand) {
    if let Err(err) = self.transmitter.send(&command.frame, command.repetitions) {
      log::error!(
        "Failed to transmit {} for cover {}: {}",
        command.frame,
        command.identifier,
        err
      );
    }
  }
}
