// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::{keccak256, Address, B256};
use ciphersum_events::DecryptionRequested;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::CoordinatorError;

/// Binds a request to the exact accumulator it was issued against
pub fn state_hash(serialized_accumulator: &[u8], coordinator: Address) -> B256 {
    let mut preimage = Vec::with_capacity(serialized_accumulator.len() + 20);
    preimage.extend_from_slice(serialized_accumulator);
    preimage.extend_from_slice(coordinator.as_slice());
    keccak256(preimage)
}

/// Oracle results are a single little endian u64
pub fn decode_cleartext(request_id: u64, cleartext: &[u8]) -> Result<u64, CoordinatorError> {
    let bytes: [u8; 8] =
        cleartext
            .try_into()
            .map_err(|_| CoordinatorError::InvalidCleartext {
                request_id,
                reason: format!("expected 8 bytes, got {}", cleartext.len()),
            })?;
    Ok(u64::from_le_bytes(bytes))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionRequest {
    pub request_id: u64,
    pub batch_id: u64,
    pub state_hash: B256,
    pub processed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptionCoordinator {
    pub next_request_id: u64,
    pub requests: BTreeMap<u64, DecryptionRequest>,
}

impl Default for DecryptionCoordinator {
    fn default() -> Self {
        Self {
            next_request_id: 1,
            requests: BTreeMap::new(),
        }
    }
}

impl DecryptionCoordinator {
    pub fn get(&self, request_id: u64) -> Option<&DecryptionRequest> {
        self.requests.get(&request_id)
    }

    /// Record a pending request under a fresh id
    pub fn issue(
        &mut self,
        batch_id: u64,
        state_hash: B256,
    ) -> Result<DecryptionRequested, CoordinatorError> {
        let request_id = self.next_request_id;
        self.next_request_id = request_id
            .checked_add(1)
            .ok_or_else(|| CoordinatorError::InvalidParameters("request ids exhausted".into()))?;
        self.requests.insert(
            request_id,
            DecryptionRequest {
                request_id,
                batch_id,
                state_hash,
                processed: false,
            },
        );
        Ok(DecryptionRequested {
            request_id,
            batch_id,
            state_hash,
        })
    }

    /// Flip a request to processed. Fails if it does not exist or was already processed.
    pub fn mark_processed(&mut self, request_id: u64) -> Result<(), CoordinatorError> {
        let request = self.requests.get_mut(&request_id).ok_or_else(|| {
            CoordinatorError::InvalidBatchState(format!("unknown decryption request {request_id}"))
        })?;
        if request.processed {
            return Err(CoordinatorError::ReplayDetected(request_id));
        }
        request.processed = true;
        Ok(())
    }
}
