use std::{
  fmt::Debug,
  sync::{Arc, Mutex, PoisonError},
};

pub use self::{
  gpio::GpioOutput,
  pulse::{Pulse, PulseOutput, PulseTransmitter},
};
use super::frame::Frame;
use crate::error::RtsResult;

pub mod gpio;
pub mod pulse;

/// Anything that can put RTS frames on air.
///
/// There is no acknowledgement from receivers, repeating a frame is the only way to make it more
/// likely to arrive.
pub trait Transmitter: Debug + Send {
  /// Transmit `frame` `repeats` times, blocking until the last repetition has been sent.
  fn send(&mut self, frame: &Frame, repeats: u8) -> RtsResult<()>;
}

/// Only logs frames. Used when no radio is attached.
#[derive(Debug, Default)]
pub struct LogTransmitter;

impl Transmitter for LogTransmitter {
  fn send(&mut self, frame: &Frame, repeats: u8) -> RtsResult<()> {
    log::info!("Would transmit {} x{} (channel {:#x})", frame, repeats, frame.channel_id());
    Ok(())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentFrame {
  pub frame: Frame,
  pub repeats: u8,
}

/// Remembers everything sent through it. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransmitter {
  sent: Arc<Mutex<Vec<SentFrame>>>,
}

impl RecordingTransmitter {
  pub fn new() -> Self {
    RecordingTransmitter::default()
  }

  pub fn sent(&self) -> Vec<SentFrame> {
    self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Total number of physical frames, counting every repetition
  pub fn frames_on_air(&self) -> usize {
    self.sent().iter().map(|sent| sent.repeats as usize).sum()
  }
}

impl Transmitter for RecordingTransmitter {
  fn send(&mut self, frame: &Frame, repeats: u8) -> RtsResult<()> {
    self
      .sent
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(SentFrame { frame: *frame, repeats });
    Ok(())
  }
}
