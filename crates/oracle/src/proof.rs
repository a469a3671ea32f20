// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy::primitives::{keccak256, Address, Signature, B256};
use alloy::signers::{local::PrivateKeySigner, SignerSync};
use anyhow::{anyhow, Result};
use ciphersum_coordinator::ProofVerifier;
use ciphersum_utils::ArcBytes;
use tracing::debug;

/// keccak256(request_id as big endian u64 ‖ cleartext)
pub fn result_digest(request_id: u64, cleartext: &[u8]) -> B256 {
    let mut preimage = Vec::with_capacity(8 + cleartext.len());
    preimage.extend_from_slice(&request_id.to_be_bytes());
    preimage.extend_from_slice(cleartext);
    keccak256(preimage)
}

/// Signs oracle results with an ECDSA key. The proof is an EIP-191 signature over
/// [`result_digest`].
#[derive(Clone, Debug)]
pub struct OracleSigner {
    signer: PrivateKeySigner,
}

impl OracleSigner {
    pub fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    pub fn random() -> Self {
        Self::new(PrivateKeySigner::random())
    }

    pub fn from_hex(key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = key
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid oracle signer key: {e}"))?;
        Ok(Self::new(signer))
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn sign(&self, request_id: u64, cleartext: &[u8]) -> Result<ArcBytes> {
        let digest = result_digest(request_id, cleartext);
        let sig = self
            .signer
            .sign_message_sync(digest.as_slice())
            .map_err(|e| anyhow!("Failed to sign oracle result: {e}"))?;
        Ok(ArcBytes::from_bytes(&sig.as_bytes()))
    }
}

pub fn recover_signer(request_id: u64, cleartext: &[u8], proof: &[u8]) -> Result<Address> {
    let sig = Signature::try_from(proof).map_err(|e| anyhow!("Invalid signature: {e}"))?;
    let digest = result_digest(request_id, cleartext);
    sig.recover_address_from_msg(digest.as_slice())
        .map_err(|e| anyhow!("Failed to recover signer address: {e}"))
}

/// Accepts a proof only if it was signed by the trusted oracle key
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignatureVerifier {
    trusted: Address,
}

impl SignatureVerifier {
    pub fn new(trusted: Address) -> Self {
        Self { trusted }
    }

    pub fn trusted(&self) -> Address {
        self.trusted
    }
}

impl ProofVerifier for SignatureVerifier {
    fn verify(&self, request_id: u64, cleartext: &[u8], proof: &[u8]) -> bool {
        match recover_signer(request_id, cleartext, proof) {
            Ok(signer) => signer == self.trusted,
            Err(err) => {
                debug!(request_id, "Proof did not recover: {err}");
                false
            }
        }
    }
}
