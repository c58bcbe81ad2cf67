//! The 7 byte RTS frame.
//!
//! Thanks to the protocol description at https://pushstack.wordpress.com/somfy-rts-protocol/
//!
//! | Byte | Content                                          |
//! |------|--------------------------------------------------|
//! | 0    | key, always `0xa7`                               |
//! | 1    | control code (high nibble), checksum (low nibble)|
//! | 2-3  | rolling code, big endian                         |
//! | 4-6  | channel id, little endian                        |
//!
//! On air every byte is XORed with the previously transmitted byte.

use std::{fmt, str::FromStr};

use crate::{
  channel::{validate_channel_id, validate_rolling_code},
  error::{RtsError, RtsResult},
};

pub const FRAME_LEN: usize = 7;

/// Receivers accept any value here, remotes in the wild use 0xa7.
const KEY: u8 = 0xa7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlCode {
  Stop = 0x1,
  Open = 0x2,
  Close = 0x4,
  Program = 0x8,
}

impl TryFrom<u8> for ControlCode {
  type Error = RtsError;

  fn try_from(code: u8) -> Result<Self, Self::Error> {
    match code {
      0x1 => Ok(ControlCode::Stop),
      0x2 => Ok(ControlCode::Open),
      0x4 => Ok(ControlCode::Close),
      0x8 => Ok(ControlCode::Program),
      _ => Err(RtsError::UnknownControlCode(code)),
    }
  }
}

impl fmt::Display for ControlCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ControlCode::Stop => write!(f, "STOP"),
      ControlCode::Open => write!(f, "OPEN"),
      ControlCode::Close => write!(f, "CLOSE"),
      ControlCode::Program => write!(f, "PROGRAM"),
    }
  }
}

impl FromStr for ControlCode {
  type Err = ();

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "STOP" => Ok(ControlCode::Stop),
      "OPEN" => Ok(ControlCode::Open),
      "CLOSE" => Ok(ControlCode::Close),
      "PROGRAM" => Ok(ControlCode::Program),
      _ => Err(()),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
  control: ControlCode,
  cleartext: [u8; FRAME_LEN],
}

fn checksum(bytes: &[u8; FRAME_LEN]) -> u8 {
  bytes.iter().fold(0, |acc, byte| acc ^ byte ^ (byte >> 4)) & 0xf
}

impl Frame {
  pub fn new(control: ControlCode, channel_id: u32, rolling_code: u16) -> RtsResult<Frame> {
    let channel_id = validate_channel_id(channel_id)?;

    let mut cleartext = [0u8; FRAME_LEN];
    cleartext[0] = KEY;
    cleartext[1] = (control as u8) << 4;
    cleartext[2..4].copy_from_slice(&rolling_code.to_be_bytes());
    cleartext[4..7].copy_from_slice(&channel_id.to_le_bytes()[..3]);
    cleartext[1] |= checksum(&cleartext);

    Ok(Frame { control, cleartext })
  }

  /// Like [`Frame::new`] for values that haven't been narrowed yet.
  pub fn from_raw(control: ControlCode, channel_id: u32, rolling_code: u32) -> RtsResult<Frame> {
    Frame::new(control, channel_id, validate_rolling_code(rolling_code)?)
  }

  /// Recover a frame from the bytes seen on air.
  pub fn decode(obfuscated: &[u8; FRAME_LEN]) -> RtsResult<Frame> {
    let mut cleartext = [0u8; FRAME_LEN];
    cleartext[0] = obfuscated[0];
    for i in 1..FRAME_LEN {
      cleartext[i] = obfuscated[i] ^ obfuscated[i - 1];
    }

    // the checksum nibble makes the whole frame sum to zero
    let remainder = checksum(&cleartext);
    if remainder != 0 {
      return Err(RtsError::InvalidFrame(remainder));
    }

    Ok(Frame {
      control: ControlCode::try_from(cleartext[1] >> 4)?,
      cleartext,
    })
  }

  pub fn control_code(&self) -> ControlCode {
    self.control
  }

  pub fn channel_id(&self) -> u32 {
    u32::from_le_bytes([self.cleartext[4], self.cleartext[5], self.cleartext[6], 0])
  }

  pub fn rolling_code(&self) -> u16 {
    u16::from_be_bytes([self.cleartext[2], self.cleartext[3]])
  }

  pub fn cleartext(&self) -> &[u8; FRAME_LEN] {
    &self.cleartext
  }

  /// The bytes as transmitted
  pub fn obfuscated(&self) -> [u8; FRAME_LEN] {
    let mut obfuscated = [0u8; FRAME_LEN];
    obfuscated[0] = self.cleartext[0];
    for i in 1..FRAME_LEN {
      obfuscated[i] = self.cleartext[i] ^ obfuscated[i - 1];
    }
    obfuscated
  }

  /// The transmitted bits, most significant bit of each byte first
  pub fn bits(&self) -> impl Iterator<Item = bool> {
    self
      .obfuscated()
      .into_iter()
      .flat_map(|byte| (0..8).rev().map(move |bit| byte & (1 << bit) != 0))
  }
}

fn hex(bytes: &[u8]) -> String {
  bytes.iter().map(|byte| format!("{byte:02x}")).collect::<Vec<_>>().join(" ")
}

impl fmt::Display for Frame {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} [{}]", self.control, hex(&self.cleartext))
  }
}
