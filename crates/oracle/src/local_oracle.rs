// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix::prelude::*;
use anyhow::Result;
use ciphersum_coordinator::{DecryptionCallback, OracleRequest};
use ciphersum_fhe::{Accumulator, BfvAccumulator, BfvKeyset};
use ciphersum_utils::ArcBytes;
use tracing::{error, info, warn};

use crate::OracleSigner;

/// In-process decryption oracle. Holds the BFV secret key, decrypts the requested accumulator and
/// answers through the callback with a signed result.
pub struct LocalOracle {
    keyset: BfvKeyset,
    accumulator: BfvAccumulator,
    signer: OracleSigner,
}

impl LocalOracle {
    pub fn new(keyset: BfvKeyset, signer: OracleSigner) -> Self {
        let accumulator = BfvAccumulator::new(keyset.params());
        Self {
            keyset,
            accumulator,
            signer,
        }
    }

    /// Sum of the constant coefficients as an 8 byte little endian value. An empty accumulator
    /// decrypts to zero.
    pub fn decrypt(&self, ciphertexts: &[ArcBytes]) -> Result<Vec<u8>> {
        let combined = ciphertexts
            .iter()
            .try_fold(self.accumulator.identity(), |acc, ct| {
                if ct.is_empty() {
                    return Ok(acc);
                }
                self.accumulator.combine(&acc, ct)
            })?;

        let sum = if combined.is_empty() {
            0
        } else {
            self.keyset.decrypt_u64(&combined)?
        };
        Ok(sum.to_le_bytes().to_vec())
    }

    pub fn answer(&self, request_id: u64, ciphertexts: &[ArcBytes]) -> Result<DecryptionCallback> {
        let cleartext = self.decrypt(ciphertexts)?;
        let proof = self.signer.sign(request_id, &cleartext)?;
        Ok(DecryptionCallback {
            request_id,
            cleartext: cleartext.into(),
            proof,
        })
    }
}

impl Actor for LocalOracle {
    type Context = Context<Self>;
}

impl Handler<OracleRequest> for LocalOracle {
    type Result = ResponseActFuture<Self, ()>;

    fn handle(&mut self, msg: OracleRequest, _: &mut Self::Context) -> Self::Result {
        let request_id = msg.request_id;
        let callback = match self.answer(request_id, &msg.ciphertexts) {
            Ok(callback) => callback,
            Err(err) => {
                error!(request_id, batch_id = msg.batch_id, "Oracle could not answer: {err}");
                return Box::pin(fut::ready(()));
            }
        };

        Box::pin(msg.callback.send(callback).into_actor(self).map(
            move |res, _, _| match res {
                Ok(Ok(completed)) => info!(
                    request_id,
                    decrypted_sum = completed.decrypted_sum,
                    "Oracle result accepted"
                ),
                Ok(Err(err)) => warn!(request_id, "Oracle result rejected: {err}"),
                Err(err) => error!(request_id, "Could not deliver oracle result: {err}"),
            },
        ))
    }
}
