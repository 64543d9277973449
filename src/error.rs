//! Error taxonomy
//!
//! Flat, serializable, one variant per row of the spec's error table.
//! Only [`EngineError::Transient`] is caller-retriable.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::numeric::NumericError;
use crate::reward::RewardOutcome;

#[derive(Debug, Error, Clone, Serialize, Deserialize)]
pub enum EngineError {
    #[error("malformed event: {0}")]
    SchemaError(String),

    #[error("user {0} not found")]
    UnknownUser(String),

    #[error("duplicate event {event_id}")]
    DuplicateEvent {
        event_id: String,
        prior_outcome: Box<RewardOutcome>,
    },

    #[error("daily mining cap reached")]
    CapReached,

    #[error("state store or ML scorer temporarily unavailable (attempt {attempt})")]
    Transient { attempt: u8 },

    #[error("numeric kernel overflow")]
    NumericOverflow,

    #[error("referral insertion would form a cycle")]
    GraphCycle,

    #[error("derived field invariant violated: {0}")]
    InvariantViolation(String),
}

impl From<NumericError> for EngineError {
    fn from(_: NumericError) -> Self {
        EngineError::NumericOverflow
    }
}
