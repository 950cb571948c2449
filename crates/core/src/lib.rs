pub mod error;
pub mod file;
pub mod ids;
pub mod message;
pub mod search;

pub use error::CoreError;
pub use file::{FileDirection, FileStatus, FileTransfer};
pub use ids::*;
pub use message::{DateMessages, HistMessage, MessageContent, NewFileMessage, NewMessage};
pub use search::{MatchMode, SearchParams, SearchPeriod};
