//! Power-loss tolerant channel records.
//!
//! # Record format
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ Magic: [u8; 4] = b"RTSC"     │  Offset: 0
//! │ Version: u8 = 1              │  Offset: 4
//! │ Sequence: u32                │  Offset: 5
//! │ Channel id: u32              │  Offset: 9
//! │ Rolling code: u16            │  Offset: 13
//! │ CRC32: u32                   │  Offset: 15
//! └──────────────────────────────┘
//! ```
//!
//! All integers are little endian. Every cover owns two slots, `<id>.a` and `<id>.b`. A record with
//! sequence `n` always lives in slot `n % 2`, so saving the next record never overwrites the newest
//! valid one. If power is lost mid-write the torn slot fails its CRC and the previous record is
//! loaded instead.

use crc::{Crc, CRC_32_ISO_HDLC};

use super::{Channel, MAX_CHANNEL_ID};
use crate::{cover::identifier::Identifier, error::RtsResult, storage::Storage};

const MAGIC: [u8; 4] = *b"RTSC";
const VERSION: u8 = 1;
pub const RECORD_LEN: usize = 19;

const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRecord {
  pub sequence: u32,
  pub channel: Channel,
}

impl ChannelRecord {
  pub fn encode(&self) -> [u8; RECORD_LEN] {
    let mut buf = [0u8; RECORD_LEN];
    buf[0..4].copy_from_slice(&MAGIC);
    buf[4] = VERSION;
    buf[5..9].copy_from_slice(&self.sequence.to_le_bytes());
    buf[9..13].copy_from_slice(&self.channel.channel_id.to_le_bytes());
    buf[13..15].copy_from_slice(&self.channel.rolling_code.to_le_bytes());

    let crc = CRC.checksum(&buf[..RECORD_LEN - 4]);
    buf[RECORD_LEN - 4..].copy_from_slice(&crc.to_le_bytes());
    buf
  }

  /// Returns `None` for anything that isn't a complete, intact record.
  pub fn decode(bytes: &[u8]) -> Option<ChannelRecord> {
    if bytes.len() != RECORD_LEN || bytes[0..4] != MAGIC || bytes[4] != VERSION {
      return None;
    }

    let stored_crc = u32::from_le_bytes([bytes[15], bytes[16], bytes[17], bytes[18]]);
    if stored_crc != CRC.checksum(&bytes[..RECORD_LEN - 4]) {
      return None;
    }

    let sequence = u32::from_le_bytes([bytes[5], bytes[6], bytes[7], bytes[8]]);
    let channel_id = u32::from_le_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]);
    let rolling_code = u16::from_le_bytes([bytes[13], bytes[14]]);

    if channel_id > MAX_CHANNEL_ID {
      return None;
    }

    Some(ChannelRecord {
      sequence,
      channel: Channel {
        channel_id,
        rolling_code,
      },
    })
  }

  /// True if this record was written after `other`, allowing for the sequence wrapping.
  pub fn is_newer_than(&self, other: &ChannelRecord) -> bool {
    (self.sequence.wrapping_sub(other.sequence) as i32) > 0
  }
}

fn slot_key(identifier: &Identifier, sequence: u32) -> String {
  if sequence % 2 == 0 {
    format!("{}.a", identifier.0)
  }
  else {
    format!("{}.b", identifier.0)
  }
}

fn read_slot(storage: &dyn Storage, key: &str) -> Option<ChannelRecord> {
  match storage.read(key) {
    Ok(Some(bytes)) => {
      let record = ChannelRecord::decode(&bytes);
      if record.is_none() {
        log::warn!("Ignoring damaged channel record in slot '{}'", key);
      }
      record
    }
    Ok(None) => None,
    Err(err) => {
      log::warn!("Unable to read channel record slot '{}': {}", key, err);
      None
    }
  }
}

/// Load the newest valid record for the cover, if any.
pub fn load(storage: &dyn Storage, identifier: &Identifier) -> Option<ChannelRecord> {
  let a = read_slot(storage, &slot_key(identifier, 0));
  let b = read_slot(storage, &slot_key(identifier, 1));

  match (a, b) {
    (Some(a), Some(b)) => Some(if b.is_newer_than(&a) { b } else { a }),
    (a, b) => a.or(b),
  }
}

/// Write `channel` as the successor of `previous`, leaving `previous` untouched.
pub fn save(
  storage: &mut dyn Storage,
  identifier: &Identifier,
  previous: Option<&ChannelRecord>,
  channel: Channel,
) -> RtsResult<ChannelRecord> {
  let record = ChannelRecord {
    sequence: previous.map_or(0, |previous| previous.sequence.wrapping_add(1)),
    channel,
  };

  storage.write(&slot_key(identifier, record.sequence), &record.encode())?;
  Ok(record)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::MemoryStorage;

  fn channel(channel_id: u32, rolling_code: u16) -> Channel {
    Channel {
      channel_id,
      rolling_code,
    }
  }

  #[test]
  fn encode_decode() {
    let record = ChannelRecord {
      sequence: 42,
      channel: channel(0xabcdef, 1234),
    };
    let bytes = record.encode();
    assert_eq!(&bytes[0..4], b"RTSC");
    assert_eq!(ChannelRecord::decode(&bytes), Some(record));
  }

  #[test]
  fn corrupted_record_is_rejected() {
    let mut bytes = ChannelRecord {
      sequence: 1,
      channel: channel(1, 2),
    }
    .encode();
    bytes[13] ^= 0x01;
    assert_eq!(ChannelRecord::decode(&bytes), None);
    assert_eq!(ChannelRecord::decode(&bytes[..10]), None);
  }

  #[test]
  fn newer_handles_wraparound() {
    let old = ChannelRecord {
      sequence: u32::MAX,
      channel: channel(1, 1),
    };
    let new = ChannelRecord {
      sequence: 0,
      channel: channel(1, 2),
    };
    assert!(new.is_newer_than(&old));
    assert!(!old.is_newer_than(&new));
  }

  #[test]
  fn saves_alternate_between_slots() {
    let mut storage = MemoryStorage::new();
    let identifier = Identifier::from("blind");

    let first = save(&mut storage, &identifier, None, channel(5, 10)).unwrap();
    let second = save(&mut storage, &identifier, Some(&first), channel(5, 11)).unwrap();

    assert!(storage.slot("blind.a").is_some());
    assert!(storage.slot("blind.b").is_some());
    assert_eq!(load(&storage, &identifier), Some(second));
  }

  #[test]
  fn torn_write_falls_back_to_previous_record() {
    let mut storage = MemoryStorage::new();
    let identifier = Identifier::from("blind");

    let first = save(&mut storage, &identifier, None, channel(5, 10)).unwrap();
    let second = save(&mut storage, &identifier, Some(&first), channel(5, 11)).unwrap();

    storage.simulate_power_loss(7);
    assert!(save(&mut storage, &identifier, Some(&second), channel(5, 12)).is_err());

    // the torn slot held `first`, `second` must survive
    assert_eq!(load(&storage, &identifier), Some(second));
  }

  #[test]
  fn nothing_stored() {
    let storage = MemoryStorage::new();
    assert_eq!(load(&storage, &Identifier::from("blind")), None);
  }
}
