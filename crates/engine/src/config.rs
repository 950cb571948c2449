use serde::Deserialize;

/// Messages loaded when a chat is opened without a date range.
pub const DEFAULT_MESSAGE_COUNT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Messages loaded by `get_chat_history_default_num`; 0 loads the whole chat.
    pub default_message_count: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_message_count: DEFAULT_MESSAGE_COUNT,
        }
    }
}

/// User policy consulted on every append. Read per call, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPolicy {
    pub logging_enabled: bool,
}

impl HistoryPolicy {
    pub const ENABLED: Self = Self {
        logging_enabled: true,
    };
    pub const DISABLED: Self = Self {
        logging_enabled: false,
    };
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self::ENABLED
    }
}
