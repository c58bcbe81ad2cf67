use std::{collections::HashMap, fmt};

use rand::Rng;
use serde::{Deserialize, Serialize};

use self::record::ChannelRecord;
use crate::{
  cover::identifier::Identifier,
  error::{RtsError, RtsResult},
  storage::Storage,
};

pub mod record;

/// Channel ids are 24 bits on air
pub const MAX_CHANNEL_ID: u32 = 0xff_ffff;

/// The identity of one virtual remote: the address motors are paired with and the next rolling
/// code it will transmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Channel {
  pub channel_id: u32,
  /// The next rolling code value to be transmitted
  pub rolling_code: u16,
}

impl Channel {
  pub fn new(channel_id: u32, rolling_code: u16) -> RtsResult<Channel> {
    Ok(Channel {
      channel_id: validate_channel_id(channel_id)?,
      rolling_code,
    })
  }

  /// A brand new remote. The rolling code starts in the lower half so it is far from wrapping.
  pub fn random() -> Channel {
    let mut rng = rand::thread_rng();
    Channel {
      channel_id: rng.gen_range(0..=MAX_CHANNEL_ID),
      rolling_code: rng.gen_range(0..=0x7fff),
    }
  }
}

pub fn validate_channel_id(channel_id: u32) -> RtsResult<u32> {
  if channel_id > MAX_CHANNEL_ID {
    Err(RtsError::InvalidChannel(channel_id))
  }
  else {
    Ok(channel_id)
  }
}

pub fn validate_rolling_code(rolling_code: u32) -> RtsResult<u16> {
  u16::try_from(rolling_code).map_err(|_| RtsError::InvalidCode(rolling_code))
}

/// An override of a channel's id and/or rolling code, applied as one change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ChannelUpdate {
  pub channel_id: Option<u32>,
  pub rolling_code: Option<u32>,
}

impl ChannelUpdate {
  pub fn is_empty(&self) -> bool {
    self.channel_id.is_none() && self.rolling_code.is_none()
  }
}

/// Values used when a cover has never persisted a channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InitialChannel {
  pub channel_id: Option<u32>,
  pub rolling_code: Option<u16>,
}

pub type ChannelListener = Box<dyn Fn(Channel) + Send + Sync>;

struct Entry {
  channel: Channel,
  /// The last record successfully written for this channel
  record: Option<ChannelRecord>,
  listeners: Vec<ChannelListener>,
}

/// Owns the channel of every cover and persists each change before it is acted upon.
pub struct ChannelRegistry {
  storage: Box<dyn Storage>,
  entries: HashMap<Identifier, Entry>,
}

impl fmt::Debug for ChannelRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ChannelRegistry")
      .field("storage", &self.storage)
      .field("covers", &self.entries.len())
      .finish()
  }
}

impl ChannelRegistry {
  pub fn new(storage: Box<dyn Storage>) -> Self {
    ChannelRegistry {
      storage,
      entries: HashMap::new(),
    }
  }

  /// Load the cover's persisted channel, or create and persist a new one.
  pub fn register(&mut self, identifier: Identifier, initial: InitialChannel) -> RtsResult<Channel> {
    if let Some(entry) = self.entries.get(&identifier) {
      return Ok(entry.channel);
    }

    if let Some(record) = record::load(self.storage.as_ref(), &identifier) {
      log::info!(
        "Initialized RTS cover {} with channel id {:#x}; next rolling code value is {}",
        identifier,
        record.channel.channel_id,
        record.channel.rolling_code
      );
      self.entries.insert(
        identifier,
        Entry {
          channel: record.channel,
          record: Some(record),
          listeners: Vec::new(),
        },
      );
      return Ok(record.channel);
    }

    log::warn!("No stored channel information (INCLUDING ROLLING CODE) for RTS cover {}", identifier);
    let random = Channel::random();
    let channel = Channel::new(
      initial.channel_id.unwrap_or(random.channel_id),
      initial.rolling_code.unwrap_or(random.rolling_code),
    )?;
    log::warn!(
      "Cover {} will act as a NEW REMOTE with channel id {:#x} and must be paired with its motor",
      identifier,
      channel.channel_id
    );

    self.entries.insert(
      identifier.clone(),
      Entry {
        channel,
        record: None,
        listeners: Vec::new(),
      },
    );
    self.persist(&identifier)?;
    Ok(channel)
  }

  pub fn get(&self, identifier: &Identifier) -> RtsResult<Channel> {
    self
      .entries
      .get(identifier)
      .map(|entry| entry.channel)
      .ok_or_else(|| RtsError::UnknownCover(identifier.clone()))
  }

  pub fn set_channel_id(&mut self, identifier: &Identifier, channel_id: u32) -> RtsResult<Channel> {
    self.config_channel(
      identifier,
      ChannelUpdate {
        channel_id: Some(channel_id),
        rolling_code: None,
      },
    )
  }

  pub fn set_rolling_code(&mut self, identifier: &Identifier, rolling_code: u32) -> RtsResult<Channel> {
    self.config_channel(
      identifier,
      ChannelUpdate {
        channel_id: None,
        rolling_code: Some(rolling_code),
      },
    )
  }

  /// Apply both parts of the update together and persist once. Nothing changes if either value is
  /// out of range.
  pub fn config_channel(&mut self, identifier: &Identifier, update: ChannelUpdate) -> RtsResult<Channel> {
    let channel_id = update.channel_id.map(validate_channel_id).transpose()?;
    let rolling_code = update.rolling_code.map(validate_rolling_code).transpose()?;

    let entry = self
      .entries
      .get_mut(identifier)
      .ok_or_else(|| RtsError::UnknownCover(identifier.clone()))?;

    if update.is_empty() {
      log::warn!("RTS cover {} received no-op 'config_channel' action", identifier);
      return Ok(entry.channel);
    }

    if let Some(channel_id) = channel_id {
      log::info!(
        "Assigning new channel id to RTS cover {}: previously {:#x}, now {:#x}",
        identifier,
        entry.channel.channel_id,
        channel_id
      );
      entry.channel.channel_id = channel_id;
    }
    if let Some(rolling_code) = rolling_code {
      log::info!(
        "Updating next rolling code value for RTS cover {}: previously {}, now {}",
        identifier,
        entry.channel.rolling_code,
        rolling_code
      );
      entry.channel.rolling_code = rolling_code;
    }

    self.persist(identifier)?;
    self.get(identifier)
  }

  /// Consume the next rolling code for the cover.
  ///
  /// The incremented value is persisted before this returns, so a code handed out here is never
  /// handed out again even if the device restarts straight after transmitting it.
  pub fn advance(&mut self, identifier: &Identifier) -> RtsResult<u16> {
    let entry = self
      .entries
      .get_mut(identifier)
      .ok_or_else(|| RtsError::UnknownCover(identifier.clone()))?;

    let code = entry.channel.rolling_code;
    entry.channel.rolling_code = code.wrapping_add(1);

    self.persist(identifier)?;
    Ok(code)
  }

  /// Call `listener` after every persisted change to the cover's channel.
  pub fn subscribe(&mut self, identifier: &Identifier, listener: ChannelListener) -> RtsResult<()> {
    self
      .entries
      .get_mut(identifier)
      .ok_or_else(|| RtsError::UnknownCover(identifier.clone()))?
      .listeners
      .push(listener);
    Ok(())
  }

  fn persist(&mut self, identifier: &Identifier) -> RtsResult<()> {
    let entry = self
      .entries
      .get_mut(identifier)
      .ok_or_else(|| RtsError::UnknownCover(identifier.clone()))?;

    match record::save(self.storage.as_mut(), identifier, entry.record.as_ref(), entry.channel) {
      Ok(record) => {
        entry.record = Some(record);
      }
      Err(err) => {
        log::error!("Failed to persist channel state for RTS cover {}: {}", identifier, err);
        log::error!("  RTS CONTROL WILL DESYNCHRONIZE IF THE DEVICE SHUTS DOWN OR RESTARTS");
        return Err(err);
      }
    }

    for listener in &entry.listeners {
      listener(entry.channel);
    }
    Ok(())
  }
}
