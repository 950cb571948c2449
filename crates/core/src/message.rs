use crate::file::FileTransfer;
use crate::ids::MessageId;

/// A chat message about to be appended to history.
#[derive(Debug, Clone, Copy)]
pub struct NewMessage<'a> {
    /// Public key of the chat the message belongs to.
    pub peer_key: &'a str,
    pub text: &'a str,
    /// Public key of the author; equals `peer_key` for incoming messages.
    pub sender_key: &'a str,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// False while delivery has not been acknowledged.
    pub is_sent: bool,
    pub display_name: &'a str,
}

/// A file transfer announcement about to be appended to history.
#[derive(Debug, Clone, Copy)]
pub struct NewFileMessage<'a> {
    pub peer_key: &'a str,
    /// Transport-level file identifier; keys the completion cache.
    pub file_id: &'a str,
    pub file_name: &'a str,
    pub file_path: &'a str,
    pub file_size: i64,
    pub sender_key: &'a str,
    pub timestamp: i64,
    pub display_name: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    Text(String),
    File(FileTransfer),
}

impl MessageContent {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::File(_) => None,
        }
    }

    pub fn as_file(&self) -> Option<&FileTransfer> {
        match self {
            Self::Text(_) => None,
            Self::File(file) => Some(file),
        }
    }
}

/// One history row as returned by range fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistMessage {
    pub id: MessageId,
    pub is_sent: bool,
    pub timestamp: i64,
    pub chat_key: String,
    pub display_name: String,
    pub sender_key: String,
    pub content: MessageContent,
}

/// Number of messages on one day, `offset_days` after the start of the queried range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateMessages {
    pub offset_days: u32,
    pub count: u32,
}
