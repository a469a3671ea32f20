// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::{keccak256, Address};
use ciphersum_events::{BatchClosed, BatchOpened, GradientSubmitted};
use ciphersum_fhe::Accumulator;
use ciphersum_utils::ArcBytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::CoordinatorError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: u64,
    pub is_open: bool,
    pub accumulator: ArcBytes,
    pub total_samples: u64,
}

/// Batches keyed by id. Only the batch at `current_id` can ever be open, so it is the only one
/// that accepts submissions. `current_id == 0` means no batch has been opened yet.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLedger {
    pub current_id: u64,
    pub batches: BTreeMap<u64, Batch>,
}

impl BatchLedger {
    pub fn get(&self, id: u64) -> Option<&Batch> {
        self.batches.get(&id)
    }

    pub fn current(&self) -> Option<&Batch> {
        self.batches.get(&self.current_id)
    }

    fn current_open_mut(&mut self) -> Result<&mut Batch, CoordinatorError> {
        match self.batches.get_mut(&self.current_id) {
            Some(batch) if batch.is_open => Ok(batch),
            _ => Err(CoordinatorError::InvalidBatchState(
                "no batch is currently open".to_string(),
            )),
        }
    }

    pub fn open_count(&self) -> usize {
        self.batches.values().filter(|b| b.is_open).count()
    }

    pub fn open_batch(&mut self, identity: Vec<u8>) -> Result<BatchOpened, CoordinatorError> {
        if self.current().is_some_and(|b| b.is_open) {
            return Err(CoordinatorError::InvalidBatchState(format!(
                "batch {} is still open",
                self.current_id
            )));
        }
        let id = self
            .current_id
            .checked_add(1)
            .ok_or_else(|| CoordinatorError::InvalidBatchState("batch ids exhausted".into()))?;

        self.batches.insert(
            id,
            Batch {
                id,
                is_open: true,
                accumulator: ArcBytes::from_bytes(&identity),
                total_samples: 0,
            },
        );
        self.current_id = id;
        Ok(BatchOpened { batch_id: id })
    }

    pub fn close_batch(&mut self) -> Result<BatchClosed, CoordinatorError> {
        let batch = self.current_open_mut()?;
        batch.is_open = false;
        Ok(BatchClosed {
            batch_id: batch.id,
            total_samples: batch.total_samples,
        })
    }

    /// Fold a ciphertext into the open batch
    pub fn submit(
        &mut self,
        provider: Address,
        ciphertext: &[u8],
        sample_count: u64,
        accumulator: &dyn Accumulator,
    ) -> Result<GradientSubmitted, CoordinatorError> {
        let batch = self.current_open_mut()?;

        if !accumulator.is_well_formed(ciphertext) {
            return Err(CoordinatorError::DecryptionFailed(format!(
                "ciphertext of {} bytes is not well formed",
                ciphertext.len()
            )));
        }

        let total_samples = batch
            .total_samples
            .checked_add(sample_count)
            .ok_or_else(|| {
                CoordinatorError::InvalidParameters("sample count overflows batch total".into())
            })?;
        let combined = accumulator
            .combine(&batch.accumulator, ciphertext)
            .map_err(|e| CoordinatorError::DecryptionFailed(e.to_string()))?;

        batch.accumulator = ArcBytes::from_bytes(&combined);
        batch.total_samples = total_samples;
        debug!(batch_id = batch.id, total_samples, "accumulated submission");

        Ok(GradientSubmitted {
            provider,
            batch_id: batch.id,
            ciphertext_handle: keccak256(ciphertext),
            sample_count,
        })
    }
}
