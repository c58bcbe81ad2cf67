use std::sync::Arc;

use rts_cover::{
  channel::{ChannelRegistry, InitialChannel},
  cover::Identifier,
  error::RtsError,
  rts::{frame::ControlCode, transmitter::RecordingTransmitter, Rts, RtsWorker},
  storage::MemoryStorage,
};
use tokio::sync::Mutex;

fn fixed(channel_id: u32, rolling_code: u16) -> InitialChannel {
  InitialChannel {
    channel_id: Some(channel_id),
    rolling_code: Some(rolling_code),
  }
}

fn hub(storage: &MemoryStorage, covers: &[(&str, InitialChannel)], repetitions: u8) -> (Rts, RtsWorker, RecordingTransmitter) {
  let mut registry = ChannelRegistry::new(Box::new(storage.clone()));
  for (identifier, initial) in covers {
    registry.register(Identifier::from(*identifier), *initial).unwrap();
  }
  let transmitter = RecordingTransmitter::new();
  let (rts, worker) = Rts::new(Arc::new(Mutex::new(registry)), repetitions, Box::new(transmitter.clone()));
  (rts, worker, transmitter)
}

#[tokio::test]
async fn commands_are_transmitted_in_the_order_they_were_scheduled() {
  let storage = MemoryStorage::new();
  let (rts, mut worker, transmitter) = hub(
    &storage,
    &[("kitchen", fixed(0x111111, 10)), ("hall", fixed(0x222222, 20))],
    3,
  );
  let kitchen = Identifier::from("kitchen");
  let hall = Identifier::from("hall");

  rts.schedule(&kitchen, ControlCode::Open).await.unwrap();
  rts.schedule(&hall, ControlCode::Close).await.unwrap();
  rts.schedule(&kitchen, ControlCode::Stop).await.unwrap();

  assert_eq!(worker.process_pending(), 3);

  let sent: Vec<(ControlCode, u32, u16, u8)> = transmitter
    .sent()
    .iter()
    .map(|sent| {
      (
        sent.frame.control_code(),
        sent.frame.channel_id(),
        sent.frame.rolling_code(),
        sent.repeats,
      )
    })
    .collect();
  assert_eq!(
    sent,
    vec![
      (ControlCode::Open, 0x111111, 10, 3),
      (ControlCode::Close, 0x222222, 20, 3),
      (ControlCode::Stop, 0x111111, 11, 3),
    ]
  );
  assert_eq!(transmitter.frames_on_air(), 9);
}

#[tokio::test]
async fn rolling_codes_are_never_reused() {
  let storage = MemoryStorage::new();
  let (rts, mut worker, transmitter) = hub(&storage, &[("kitchen", fixed(0x123456, 0xfff0))], 1);
  let kitchen = Identifier::from("kitchen");

  for _ in 0..40 {
    rts.schedule(&kitchen, ControlCode::Open).await.unwrap();
  }
  worker.process_pending();

  let codes: Vec<u16> = transmitter
    .sent()
    .iter()
    .map(|sent| sent.frame.rolling_code())
    .collect();
  assert_eq!(codes.len(), 40);
  for pair in codes.windows(2) {
    assert_eq!(pair[1], pair[0].wrapping_add(1));
  }
  // wrapped past 0xffff
  assert!(codes.contains(&0xffff) && codes.contains(&0));
}

#[tokio::test]
async fn code_is_persisted_before_the_command_is_queued() {
  let storage = MemoryStorage::new();
  let (rts, _worker, transmitter) = hub(&storage, &[("kitchen", fixed(0x123456, 7))], 2);
  let kitchen = Identifier::from("kitchen");

  rts.schedule(&kitchen, ControlCode::Open).await.unwrap();
  assert!(transmitter.sent().is_empty());

  // restart before anything was transmitted
  let mut reloaded = ChannelRegistry::new(Box::new(storage.clone()));
  let channel = reloaded.register(kitchen.clone(), fixed(0x654321, 0)).unwrap();
  assert_eq!(channel.channel_id, 0x123456);
  assert_eq!(channel.rolling_code, 8);
}

#[tokio::test]
async fn command_is_dropped_when_the_code_cannot_be_persisted() {
  let storage = MemoryStorage::new();
  let (rts, mut worker, transmitter) = hub(&storage, &[("kitchen", fixed(0x123456, 7))], 2);
  let kitchen = Identifier::from("kitchen");

  storage.simulate_power_loss(5);
  assert!(matches!(
    rts.schedule(&kitchen, ControlCode::Open).await,
    Err(RtsError::Storage(_))
  ));
  assert_eq!(worker.process_pending(), 0);

  // the code that might have reached the air is skipped
  rts.schedule(&kitchen, ControlCode::Open).await.unwrap();
  worker.process_pending();
  assert_eq!(transmitter.sent()[0].frame.rolling_code(), 8);

  let mut reloaded = ChannelRegistry::new(Box::new(storage.clone()));
  assert_eq!(reloaded.register(kitchen, fixed(0, 0)).unwrap().rolling_code, 9);
}

#[tokio::test]
async fn unknown_covers_are_rejected() {
  let storage = MemoryStorage::new();
  let (rts, mut worker, _transmitter) = hub(&storage, &[], 2);

  assert!(matches!(
    rts.schedule(&Identifier::from("attic"), ControlCode::Open).await,
    Err(RtsError::UnknownCover(_))
  ));
  assert_eq!(worker.process_pending(), 0);
}

#[tokio::test]
async fn worker_drains_the_queue_until_closed() {
  let storage = MemoryStorage::new();
  let (rts, worker, transmitter) = hub(&storage, &[("kitchen", fixed(0x123456, 1))], 2);
  let kitchen = Identifier::from("kitchen");

  let handle = worker.spawn();
  rts.schedule(&kitchen, ControlCode::Open).await.unwrap();
  rts.schedule(&kitchen, ControlCode::Stop).await.unwrap();
  drop(rts);

  handle.await.unwrap();
  let controls: Vec<ControlCode> = transmitter
    .sent()
    .iter()
    .map(|sent| sent.frame.control_code())
    .collect();
  assert_eq!(controls, vec![ControlCode::Open, ControlCode::Stop]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_schedules_keep_queue_order_equal_to_code_order() {
  let storage = MemoryStorage::new();
  let (rts, mut worker, transmitter) = hub(
    &storage,
    &[("kitchen", fixed(0x111111, 0)), ("hall", fixed(0x222222, 0))],
    1,
  );

  let mut tasks = Vec::new();
  for i in 0..20 {
    let rts = rts.clone();
    let identifier = Identifier::from(if i % 2 == 0 { "kitchen" } else { "hall" });
    tasks.push(tokio::spawn(async move {
      rts.schedule(&identifier, ControlCode::Open).await.unwrap();
    }));
  }
  for task in tasks {
    task.await.unwrap();
  }

  assert_eq!(worker.process_pending(), 20);
  for channel_id in [0x111111, 0x222222] {
    let codes: Vec<u16> = transmitter
      .sent()
      .iter()
      .filter(|sent| sent.frame.channel_id() == channel_id)
      .map(|sent| sent.frame.rolling_code())
      .collect();
    assert_eq!(codes, (0..10).collect::<Vec<u16>>());
  }
}
