// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::{Address, B256};
use ciphersum_events::{
    BatchClosed, BatchOpened, CooldownUpdated, DecryptionCompleted, DecryptionRequested,
    GradientSubmitted, OwnershipTransferred, PausedSet, ProviderAdded, ProviderRemoved,
};
use ciphersum_fhe::Accumulator;
use ciphersum_utils::ArcBytes;
use serde::{Deserialize, Serialize};

use crate::{
    decode_cleartext, state_hash, AccessControl, BatchLedger, CooldownKind, CoordinatorError,
    DecryptionCoordinator, ProofVerifier, RateLimiter,
};

/// One precondition of a mutating operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    Owner,
    Provider,
    NotPaused,
    /// Passes if the caller's clock for this kind has elapsed, and restarts it
    Cooldown(CooldownKind),
}

/// Summary returned by the info query
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorInfo {
    pub owner: Address,
    pub paused: bool,
    pub cooldown_seconds: u64,
    pub current_batch_id: u64,
    pub next_request_id: u64,
    pub provider_count: usize,
}

/// Everything the coordinator persists.
///
/// Every operation mutates `self` in place and may fail halfway, so callers apply it to a copy
/// and keep the copy only when the operation returned `Ok`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorState {
    pub access: AccessControl,
    pub limiter: RateLimiter,
    pub ledger: BatchLedger,
    pub decryptions: DecryptionCoordinator,
}

impl CoordinatorState {
    pub fn new(owner: Address, cooldown_seconds: u64) -> Result<Self, CoordinatorError> {
        Ok(Self {
            access: AccessControl::new(owner)?,
            limiter: RateLimiter::new(cooldown_seconds)?,
            ledger: BatchLedger::default(),
            decryptions: DecryptionCoordinator::default(),
        })
    }

    pub fn info(&self) -> CoordinatorInfo {
        CoordinatorInfo {
            owner: self.access.owner,
            paused: self.access.paused,
            cooldown_seconds: self.limiter.cooldown_seconds,
            current_batch_id: self.ledger.current_id,
            next_request_id: self.decryptions.next_request_id,
            provider_count: self.access.providers.len(),
        }
    }

    /// Run the gates in order and stop at the first one that fails
    pub fn authorize(
        &mut self,
        caller: &Address,
        gates: &[Gate],
        now: u64,
    ) -> Result<(), CoordinatorError> {
        for gate in gates {
            match gate {
                Gate::Owner if !self.access.is_owner(caller) => {
                    return Err(CoordinatorError::NotOwner(*caller))
                }
                Gate::Provider if !self.access.is_provider(caller) => {
                    return Err(CoordinatorError::NotProvider(*caller))
                }
                Gate::NotPaused if self.access.paused => return Err(CoordinatorError::Paused),
                Gate::Cooldown(kind) => self.limiter.check_and_record(caller, *kind, now)?,
                _ => (),
            }
        }
        Ok(())
    }

    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        new_owner: Address,
        now: u64,
    ) -> Result<OwnershipTransferred, CoordinatorError> {
        self.authorize(&caller, &[Gate::Owner], now)?;
        self.access.transfer_ownership(new_owner)
    }

    pub fn add_provider(
        &mut self,
        caller: Address,
        provider: Address,
        now: u64,
    ) -> Result<ProviderAdded, CoordinatorError> {
        self.authorize(&caller, &[Gate::Owner], now)?;
        self.access.add_provider(provider)
    }

    pub fn remove_provider(
        &mut self,
        caller: Address,
        provider: Address,
        now: u64,
    ) -> Result<ProviderRemoved, CoordinatorError> {
        self.authorize(&caller, &[Gate::Owner], now)?;
        self.access.remove_provider(provider)
    }

    pub fn set_paused(
        &mut self,
        caller: Address,
        paused: bool,
        now: u64,
    ) -> Result<PausedSet, CoordinatorError> {
        self.authorize(&caller, &[Gate::Owner], now)?;
        Ok(self.access.set_paused(paused))
    }

    pub fn set_cooldown_seconds(
        &mut self,
        caller: Address,
        cooldown_seconds: u64,
        now: u64,
    ) -> Result<CooldownUpdated, CoordinatorError> {
        self.authorize(&caller, &[Gate::Owner], now)?;
        self.limiter.set_cooldown_seconds(cooldown_seconds)
    }

    pub fn open_batch(
        &mut self,
        caller: Address,
        now: u64,
        accumulator: &dyn Accumulator,
    ) -> Result<BatchOpened, CoordinatorError> {
        self.authorize(&caller, &[Gate::Owner, Gate::NotPaused], now)?;
        self.ledger.open_batch(accumulator.identity())
    }

    pub fn close_batch(
        &mut self,
        caller: Address,
        now: u64,
    ) -> Result<BatchClosed, CoordinatorError> {
        self.authorize(&caller, &[Gate::Owner, Gate::NotPaused], now)?;
        self.ledger.close_batch()
    }

    pub fn submit(
        &mut self,
        caller: Address,
        ciphertext: &[u8],
        sample_count: u64,
        now: u64,
        accumulator: &dyn Accumulator,
    ) -> Result<GradientSubmitted, CoordinatorError> {
        self.authorize(
            &caller,
            &[
                Gate::Provider,
                Gate::NotPaused,
                Gate::Cooldown(CooldownKind::Submission),
            ],
            now,
        )?;
        self.ledger
            .submit(caller, ciphertext, sample_count, accumulator)
    }

    /// Snapshot a closed batch and issue a request for it. Returns the serialized accumulator to
    /// hand to the oracle alongside the event.
    pub fn request_decryption(
        &mut self,
        caller: Address,
        batch_id: u64,
        now: u64,
        accumulator: &dyn Accumulator,
        coordinator: Address,
    ) -> Result<(DecryptionRequested, ArcBytes), CoordinatorError> {
        self.authorize(
            &caller,
            &[
                Gate::Owner,
                Gate::NotPaused,
                Gate::Cooldown(CooldownKind::DecryptionRequest),
            ],
            now,
        )?;

        if batch_id == 0 {
            return Err(CoordinatorError::InvalidBatchState(
                "batch id 0 does not refer to a batch".to_string(),
            ));
        }
        let batch = self.ledger.get(batch_id).ok_or_else(|| {
            CoordinatorError::InvalidBatchState(format!("batch {batch_id} does not exist"))
        })?;
        if batch.is_open {
            return Err(CoordinatorError::InvalidBatchState(format!(
                "batch {batch_id} is still open"
            )));
        }

        let serialized = accumulator
            .serialize(&batch.accumulator)
            .map_err(CoordinatorError::internal)?;
        let hash = state_hash(&serialized, coordinator);
        let event = self.decryptions.issue(batch_id, hash)?;
        Ok((event, ArcBytes::from_bytes(&serialized)))
    }

    /// Validate an oracle answer against everything that could have changed since the request was
    /// issued. Not gated by pause: a pending request can always be fulfilled.
    pub fn on_decryption_callback(
        &mut self,
        request_id: u64,
        cleartext: &[u8],
        proof: &[u8],
        accumulator: &dyn Accumulator,
        verifier: &dyn ProofVerifier,
        coordinator: Address,
    ) -> Result<DecryptionCompleted, CoordinatorError> {
        let request = self.decryptions.get(request_id).cloned().ok_or_else(|| {
            CoordinatorError::InvalidBatchState(format!("unknown decryption request {request_id}"))
        })?;
        if request.processed {
            return Err(CoordinatorError::ReplayDetected(request_id));
        }

        let batch = self.ledger.get(request.batch_id).ok_or_else(|| {
            CoordinatorError::InvalidBatchState(format!(
                "batch {} for request {request_id} no longer exists",
                request.batch_id
            ))
        })?;
        let total_samples = batch.total_samples;
        let actual = current_hash(&batch.accumulator, accumulator, coordinator);
        if actual != request.state_hash {
            return Err(CoordinatorError::StateMismatch {
                request_id,
                expected: request.state_hash,
                actual,
            });
        }

        if !verifier.verify(request_id, cleartext, proof) {
            return Err(CoordinatorError::InvalidProof(request_id));
        }

        let decrypted_sum = decode_cleartext(request_id, cleartext)?;
        self.decryptions.mark_processed(request_id)?;

        Ok(DecryptionCompleted {
            request_id,
            batch_id: request.batch_id,
            decrypted_sum,
            total_samples,
        })
    }
}

// An accumulator that no longer deserializes is hashed raw so that it reports as a mismatch.
fn current_hash(raw: &[u8], accumulator: &dyn Accumulator, coordinator: Address) -> B256 {
    match accumulator.serialize(raw) {
        Ok(serialized) => state_hash(&serialized, coordinator),
        Err(_) => state_hash(raw, coordinator),
    }
}
