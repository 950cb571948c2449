pub mod config;
pub mod error;
pub mod files;
pub mod history;
pub mod peers;
mod messages;
mod search;

pub use config::{DEFAULT_MESSAGE_COUNT, HistoryConfig, HistoryPolicy};
pub use error::EngineError;
pub use files::{FileDbInsertionData, LinkEvent};
pub use history::{History, MessageIdCallback};
pub use peers::PeerCache;
