use thiserror::Error;

use crate::classify::ErrorCode;

pub type Result<T> = std::result::Result<T, RecoveryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RecoveryError {
    #[error("{operation} failed after {attempts} attempt(s) with {code}: {message}")]
    Failed {
        operation: String,
        attempts: u32,
        code: ErrorCode,
        user_message: String,
        message: String,
    },

    #[error("{operation} cancelled after {attempts} attempt(s)")]
    Cancelled { operation: String, attempts: u32 },

    #[error("invalid recovery configuration: {0}")]
    InvalidConfig(String),
}

impl RecoveryError {
    /// Classification of the last failure, if the operation ran and failed.
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Failed { code, .. } => Some(*code),
            Self::Cancelled { .. } | Self::InvalidConfig(_) => None,
        }
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Failed { attempts, .. } | Self::Cancelled { attempts, .. } => *attempts,
            Self::InvalidConfig(_) => 0,
        }
    }

    #[must_use]
    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Failed { user_message, .. } => Some(user_message),
            Self::Cancelled { .. } | Self::InvalidConfig(_) => None,
        }
    }
}
