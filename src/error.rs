use crate::types::AggregatedText;

/// Failure while consuming an upstream record stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The byte stream failed mid-read. Whatever accumulated before the
    /// failure is kept in `partial` so callers can still display it.
    #[error("transport failure: {message}")]
    Transport {
        message: String,
        partial: AggregatedText,
    },
}

impl StreamError {
    pub fn transport(message: impl Into<String>, partial: AggregatedText) -> Self {
        Self::Transport {
            message: message.into(),
            partial,
        }
    }

    /// Best-effort text accumulated before the failure.
    pub fn partial(&self) -> &AggregatedText {
        match self {
            Self::Transport { partial, .. } => partial,
        }
    }
}

/// Failure of a full argue round-trip.
#[derive(Debug, thiserror::Error)]
pub enum ArgueError {
    #[error("an argue request is already in flight")]
    RequestInFlight,
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error(transparent)]
    Request(#[from] anyhow::Error),
}

impl ArgueError {
    pub fn partial(&self) -> Option<&AggregatedText> {
        match self {
            Self::Stream(error) => Some(error.partial()),
            _ => None,
        }
    }
}
