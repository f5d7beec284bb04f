//! Error kinds surfaced to callers of market operations.

use thiserror::Error;

/// Result type for market operations.
pub type MarketResult<T> = std::result::Result<T, MarketError>;

/// Every way a vote, purchase or tribunal request can be refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Self-voting is not permitted")]
    SelfVoteForbidden,

    #[error("New account cooldown: voting enabled after 10 minutes")]
    AccountCooldown,

    #[error("Daily vote quota exceeded")]
    QuotaExceeded,

    #[error("Max 2 of each vote type per target per UTC day")]
    PerTargetLimitExceeded,

    #[error("Market is under Observation Halt")]
    MarketHalted,

    #[error("Stability protocol already active")]
    AlreadyActive,

    #[error("Stability protocol cooldown: one activation per hour")]
    Cooldown,

    #[error("Daily protection cap of 60 minutes reached")]
    DailyCapReached,

    #[error("Index too low to purchase protection")]
    IndexTooLow,

    #[error("Invalid protection duration: {0} minutes")]
    InvalidDuration(u32),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store failure: {0}")]
    StoreFailure(String),
}

impl MarketError {
    /// Stable snake_case identifier, used in API bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::InvalidInput(_) => "invalid_input",
            Self::SelfVoteForbidden => "self_vote_forbidden",
            Self::AccountCooldown => "account_cooldown",
            Self::QuotaExceeded => "quota_exceeded",
            Self::PerTargetLimitExceeded => "per_target_limit_exceeded",
            Self::MarketHalted => "market_halted",
            Self::AlreadyActive => "already_active",
            Self::Cooldown => "cooldown",
            Self::DailyCapReached => "daily_cap_reached",
            Self::IndexTooLow => "index_too_low",
            Self::InvalidDuration(_) => "invalid_duration",
            Self::NotFound(_) => "not_found",
            Self::StoreFailure(_) => "store_failure",
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}
