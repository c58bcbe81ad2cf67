pub mod channel;
pub mod config;
pub mod cover;
pub mod error;
#[cfg(not(feature = "arm"))]
mod mock_gpio;
pub mod mqtt_client;
pub mod rts;
pub mod storage;
