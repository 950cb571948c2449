use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileDirection {
    Sending,
    Receiving,
}

impl FileDirection {
    pub fn code(&self) -> i64 {
        match self {
            Self::Sending => 0,
            Self::Receiving => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Receiving => "receiving",
        }
    }
}

impl TryFrom<i64> for FileDirection {
    type Error = CoreError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Sending),
            1 => Ok(Self::Receiving),
            other => Err(CoreError::InvalidDirection(other)),
        }
    }
}

/// Transfer state as persisted in `file_transfers.file_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileStatus {
    Initializing,
    Paused,
    Transmitting,
    Broken,
    Canceled,
    Finished,
}

impl FileStatus {
    pub fn code(&self) -> i64 {
        match self {
            Self::Initializing => 0,
            Self::Paused => 1,
            Self::Transmitting => 2,
            Self::Broken => 3,
            Self::Canceled => 4,
            Self::Finished => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Paused => "paused",
            Self::Transmitting => "transmitting",
            Self::Broken => "broken",
            Self::Canceled => "canceled",
            Self::Finished => "finished",
        }
    }

    /// Terminal state recorded when a transfer concludes.
    pub fn concluded(success: bool) -> Self {
        if success { Self::Finished } else { Self::Canceled }
    }
}

impl TryFrom<i64> for FileStatus {
    type Error = CoreError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Initializing),
            1 => Ok(Self::Paused),
            2 => Ok(Self::Transmitting),
            3 => Ok(Self::Broken),
            4 => Ok(Self::Canceled),
            5 => Ok(Self::Finished),
            other => Err(CoreError::InvalidStatus(other)),
        }
    }
}

/// A file transfer row joined onto a history message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    /// Transport-level identifier used to resume the transfer.
    pub resume_file_id: Vec<u8>,
    pub file_path: String,
    pub file_name: String,
    pub file_size: i64,
    pub direction: FileDirection,
    pub status: FileStatus,
}
