use std::{
  fmt::Debug,
  time::{Duration, Instant},
};

use super::Transmitter;
use crate::{error::RtsResult, rts::frame::Frame};

/// Time to transmit one Manchester encoded bit
pub const SYMBOL_MICROS: u32 = 1208;

// Before the first command the remote sends a long wakeup signal followed by radio silence.
const WAKEUP_HIGH_MICROS: u32 = 9415;
const WAKEUP_LOW_MICROS: u32 = 89565;

// Each frame starts with a square wave hardware sync, then one software sync ending in half a
// symbol of silence.
const HARDWARE_SYNC_MICROS: u32 = 2 * SYMBOL_MICROS;
const SOFTWARE_SYNC_HIGH_MICROS: u32 = 4550;
const SOFTWARE_SYNC_LOW_MICROS: u32 = SYMBOL_MICROS / 2;

const INTER_FRAME_GAP_MICROS: u32 = 30415;

/// How long receivers stay awake after a wakeup signal
pub const WAKEUP_COOLDOWN: Duration = Duration::from_secs(10);

/// A period of carrier on (mark) or off (space), in microseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pulse {
  Mark(u32),
  Space(u32),
}

impl Pulse {
  pub fn micros(&self) -> u32 {
    match self {
      Pulse::Mark(micros) | Pulse::Space(micros) => *micros,
    }
  }

  pub fn is_mark(&self) -> bool {
    matches!(self, Pulse::Mark(_))
  }
}

/// Number of hardware sync periods before a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareSync {
  /// Directly after a wakeup signal
  Short,
  Long,
}

impl HardwareSync {
  fn periods(self) -> usize {
    match self {
      HardwareSync::Short => 2,
      HardwareSync::Long => 7,
    }
  }
}

pub fn wakeup_pulses() -> Vec<Pulse> {
  vec![Pulse::Mark(WAKEUP_HIGH_MICROS), Pulse::Space(WAKEUP_LOW_MICROS)]
}

/// Everything sent for one frame, including the trailing inter-frame gap.
pub fn frame_pulses(frame: &Frame, sync: HardwareSync) -> Vec<Pulse> {
  let half_symbol = SYMBOL_MICROS / 2;
  let mut pulses = Vec::with_capacity(sync.periods() * 2 + 2 + 56 * 2 + 1);

  for _ in 0..sync.periods() {
    pulses.push(Pulse::Mark(HARDWARE_SYNC_MICROS));
    pulses.push(Pulse::Space(HARDWARE_SYNC_MICROS));
  }
  pulses.push(Pulse::Mark(SOFTWARE_SYNC_HIGH_MICROS));
  pulses.push(Pulse::Space(SOFTWARE_SYNC_LOW_MICROS));

  for bit in frame.bits() {
    if bit {
      // rising edge
      pulses.push(Pulse::Space(half_symbol));
      pulses.push(Pulse::Mark(half_symbol));
    }
    else {
      // falling edge
      pulses.push(Pulse::Mark(half_symbol));
      pulses.push(Pulse::Space(half_symbol));
    }
  }

  pulses.push(Pulse::Space(INTER_FRAME_GAP_MICROS));
  pulses
}

/// An OOK output able to replay pulses with microsecond timing.
pub trait PulseOutput: Debug + Send {
  fn play(&mut self, pulses: &[Pulse]) -> RtsResult<()>;
}

/// Turns frames into RTS pulse trains for an OOK output.
#[derive(Debug)]
pub struct PulseTransmitter<O: PulseOutput> {
  output: O,
  wakeup_cooldown: Duration,
  last_wakeup: Option<Instant>,
}

impl<O: PulseOutput> PulseTransmitter<O> {
  pub fn new(output: O) -> Self {
    PulseTransmitter::with_wakeup_cooldown(output, WAKEUP_COOLDOWN)
  }

  pub fn with_wakeup_cooldown(output: O, wakeup_cooldown: Duration) -> Self {
    PulseTransmitter {
      output,
      wakeup_cooldown,
      last_wakeup: None,
    }
  }

  pub fn output(&self) -> &O {
    &self.output
  }

  fn needs_wakeup(&self) -> bool {
    self
      .last_wakeup
      .map_or(true, |last_wakeup| last_wakeup.elapsed() >= self.wakeup_cooldown)
  }
}

impl<O: PulseOutput> Transmitter for PulseTransmitter<O> {
  fn send(&mut self, frame: &Frame, repeats: u8) -> RtsResult<()> {
    let mut sync = HardwareSync::Long;

    if self.needs_wakeup() {
      log::debug!("Transmitting wakeup signal");
      self.output.play(&wakeup_pulses())?;
      self.last_wakeup = Some(Instant::now());
      sync = HardwareSync::Short;
    }

    for repetition in 0..repeats {
      if repetition == 0 {
        log::debug!("Transmitting {} on channel {:#x}", frame, frame.channel_id());
      }
      else {
        log::trace!("Repeating {} on channel {:#x}", frame, frame.channel_id());
      }
      self.output.play(&frame_pulses(frame, sync))?;
      sync = HardwareSync::Long;
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::rts::frame::ControlCode;

  /// Collects every pulse train played
  #[derive(Debug, Default)]
  struct RecordingOutput {
    trains: Vec<Vec<Pulse>>,
  }

  impl PulseOutput for RecordingOutput {
    fn play(&mut self, pulses: &[Pulse]) -> RtsResult<()> {
      self.trains.push(pulses.to_vec());
      Ok(())
    }
  }

  impl RecordingOutput {
    fn frames(&self) -> Vec<&Vec<Pulse>> {
      self
        .trains
        .iter()
        .filter(|train| train.contains(&Pulse::Mark(SOFTWARE_SYNC_HIGH_MICROS)))
        .collect()
    }

    fn wakeups(&self) -> usize {
      self
        .trains
        .iter()
        .filter(|train| train.contains(&Pulse::Mark(WAKEUP_HIGH_MICROS)))
        .count()
    }
  }

  fn hardware_syncs(train: &[Pulse]) -> usize {
    train
      .iter()
      .filter(|pulse| **pulse == Pulse::Mark(HARDWARE_SYNC_MICROS))
      .count()
  }

  fn frame() -> Frame {
    Frame::new(ControlCode::Open, 0x123456, 1).unwrap()
  }

  #[test]
  fn each_repetition_is_one_frame_on_air() {
    let mut transmitter = PulseTransmitter::new(RecordingOutput::default());
    transmitter.send(&frame(), 3).unwrap();

    assert_eq!(transmitter.output().wakeups(), 1);
    assert_eq!(transmitter.output().frames().len(), 3);
  }

  #[test]
  fn short_sync_only_after_wakeup() {
    let mut transmitter = PulseTransmitter::new(RecordingOutput::default());
    transmitter.send(&frame(), 2).unwrap();
    transmitter.send(&frame(), 1).unwrap();

    let output = transmitter.output();
    // the second command is within the cooldown, so no new wakeup
    assert_eq!(output.wakeups(), 1);
    let syncs: Vec<usize> = output.frames().iter().map(|train| hardware_syncs(train)).collect();
    assert_eq!(syncs, vec![2, 7, 7]);
  }

  #[test]
  fn wakeup_again_after_cooldown() {
    let mut transmitter = PulseTransmitter::with_wakeup_cooldown(RecordingOutput::default(), Duration::ZERO);
    transmitter.send(&frame(), 1).unwrap();
    transmitter.send(&frame(), 1).unwrap();
    assert_eq!(transmitter.output().wakeups(), 2);
  }

  #[test]
  fn cooldown_counts_from_the_last_wakeup() {
    let cooldown = Duration::from_millis(80);
    let mut transmitter = PulseTransmitter::with_wakeup_cooldown(RecordingOutput::default(), cooldown);

    transmitter.send(&frame(), 1).unwrap();
    std::thread::sleep(cooldown / 2);
    transmitter.send(&frame(), 1).unwrap();
    assert_eq!(transmitter.output().wakeups(), 1);

    // only half a cooldown since the last transmission, but a full one since the wakeup
    std::thread::sleep(cooldown / 2 + Duration::from_millis(5));
    transmitter.send(&frame(), 1).unwrap();
    assert_eq!(transmitter.output().wakeups(), 2);
  }

  #[test]
  fn frame_is_manchester_encoded() {
    let pulses = frame_pulses(&frame(), HardwareSync::Long);
    let half = SYMBOL_MICROS / 2;

    // 7 sync periods, the software sync, 56 bits and the gap
    assert_eq!(pulses.len(), 14 + 2 + 112 + 1);
    assert_eq!(pulses.last(), Some(&Pulse::Space(INTER_FRAME_GAP_MICROS)));

    // first data bit of 0xa7 is a 1, i.e. a rising edge
    assert_eq!(&pulses[16..18], &[Pulse::Space(half), Pulse::Mark(half)]);
    // second is a 0, a falling edge
    assert_eq!(&pulses[18..20], &[Pulse::Mark(half), Pulse::Space(half)]);

    let data_micros: u32 = pulses[16..128].iter().map(Pulse::micros).sum();
    assert_eq!(data_micros, 56 * (half * 2));
  }
}
