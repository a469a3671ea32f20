// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use ciphersum_coordinator::ProofVerifier;

pub struct AcceptAllVerifier;

impl ProofVerifier for AcceptAllVerifier {
    fn verify(&self, _: u64, _: &[u8], _: &[u8]) -> bool {
        true
    }
}

pub struct RejectAllVerifier;

impl ProofVerifier for RejectAllVerifier {
    fn verify(&self, _: u64, _: &[u8], _: &[u8]) -> bool {
        false
    }
}
