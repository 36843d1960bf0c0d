use thiserror::Error;

/// Everything that can go wrong between a signal arriving and a position
/// closing. None of these are fatal to the process; the webhook boundary
/// translates them into HTTP statuses and the monitor logs and retries.
#[derive(Debug, Error)]
pub enum BotError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("venue unavailable: {0}")]
    VenueUnavailable(String),

    #[error("order rejected by venue: {0}")]
    OrderRejected(String),

    #[error("position already open for {0}")]
    DuplicatePosition(String),

    #[error("no open position for {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::VenueUnavailable(err.to_string())
    }
}
