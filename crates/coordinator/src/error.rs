// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::{Address, B256};
use ciphersum_events::IntegrityViolationReason;
use thiserror::Error;

use crate::CooldownKind;

/// Broad classes of failure. Callers branch on these rather than on individual variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authorization,
    AvailabilityGate,
    RateLimit,
    StateViolation,
    ParameterValidation,
    IntegrityViolation,
    EncryptionPrecondition,
    Internal,
}

/// Every way a coordinator operation can be rejected. A rejected operation never leaves a partial
/// mutation behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("{0} is not the owner")]
    NotOwner(Address),

    #[error("{0} is not a registered provider")]
    NotProvider(Address),

    #[error("Coordinator is paused")]
    Paused,

    #[error("Cooldown active for {actor} ({kind:?}), retry at {retry_at}")]
    CooldownActive {
        actor: Address,
        kind: CooldownKind,
        retry_at: u64,
    },

    #[error("Invalid batch state: {0}")]
    InvalidBatchState(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Decryption request {0} has already been processed")]
    ReplayDetected(u64),

    #[error("State hash mismatch for request {request_id}: expected {expected}, found {actual}")]
    StateMismatch {
        request_id: u64,
        expected: B256,
        actual: B256,
    },

    #[error("Proof rejected for request {0}")]
    InvalidProof(u64),

    #[error("Cleartext for request {request_id} could not be decoded: {reason}")]
    InvalidCleartext { request_id: u64, reason: String },

    #[error("Malformed ciphertext: {0}")]
    DecryptionFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoordinatorError {
    pub fn internal(err: impl std::fmt::Display) -> Self {
        CoordinatorError::Internal(err.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        use CoordinatorError::*;
        match self {
            NotOwner(_) | NotProvider(_) => ErrorKind::Authorization,
            Paused => ErrorKind::AvailabilityGate,
            CooldownActive { .. } => ErrorKind::RateLimit,
            InvalidBatchState(_) => ErrorKind::StateViolation,
            InvalidParameters(_) => ErrorKind::ParameterValidation,
            ReplayDetected(_)
            | StateMismatch { .. }
            | InvalidProof(_)
            | InvalidCleartext { .. } => ErrorKind::IntegrityViolation,
            DecryptionFailed(_) => ErrorKind::EncryptionPrecondition,
            Internal(_) => ErrorKind::Internal,
        }
    }

    /// Only rate limit rejections clear up by themselves
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::RateLimit
    }

    /// The alert reason to publish when this error rejects a decryption callback
    pub fn integrity_reason(&self) -> Option<IntegrityViolationReason> {
        match self {
            CoordinatorError::ReplayDetected(_) => Some(IntegrityViolationReason::ReplayDetected),
            CoordinatorError::StateMismatch { .. } => Some(IntegrityViolationReason::StateMismatch),
            CoordinatorError::InvalidProof(_) => Some(IntegrityViolationReason::InvalidProof),
            CoordinatorError::InvalidCleartext { .. } => {
                Some(IntegrityViolationReason::InvalidCleartext)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_cooldown_is_retryable() {
        let cooldown = CoordinatorError::CooldownActive {
            actor: Address::with_last_byte(1),
            kind: CooldownKind::Submission,
            retry_at: 60,
        };
        assert!(cooldown.is_retryable());
        assert!(!CoordinatorError::Paused.is_retryable());
        assert!(!CoordinatorError::ReplayDetected(1).is_retryable());
        assert!(!CoordinatorError::internal("boom").is_retryable());
    }

    #[test]
    fn integrity_errors_map_to_alert_reasons() {
        assert_eq!(
            CoordinatorError::InvalidProof(3).integrity_reason(),
            Some(IntegrityViolationReason::InvalidProof)
        );
        assert_eq!(
            CoordinatorError::InvalidProof(3).kind(),
            ErrorKind::IntegrityViolation
        );
        assert_eq!(
            CoordinatorError::InvalidBatchState("unknown".into()).integrity_reason(),
            None
        );
    }
}
