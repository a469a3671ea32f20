// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix::{Message, Recipient};
use ciphersum_events::DecryptionCompleted;
use ciphersum_utils::ArcBytes;

use crate::CoordinatorError;

/// Fulfilment of a decryption request. Anyone may deliver one; the proof is what authorizes it.
#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "Result<DecryptionCompleted, CoordinatorError>")]
pub struct DecryptionCallback {
    pub request_id: u64,
    pub cleartext: ArcBytes,
    pub proof: ArcBytes,
}

/// Handed to the decryption oracle when a closed batch is ready to be revealed
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct OracleRequest {
    pub request_id: u64,
    pub batch_id: u64,
    pub ciphertexts: Vec<ArcBytes>,
    pub callback: Recipient<DecryptionCallback>,
}

/// Checks that `proof` authenticates `cleartext` as the oracle's answer to `request_id`
pub trait ProofVerifier: Send + Sync + 'static {
    fn verify(&self, request_id: u64, cleartext: &[u8], proof: &[u8]) -> bool;
}
