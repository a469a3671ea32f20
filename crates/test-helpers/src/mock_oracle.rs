// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix::prelude::*;
use ciphersum_coordinator::{CoordinatorError, DecryptionCallback, OracleRequest};
use ciphersum_events::DecryptionCompleted;
use ciphersum_utils::ArcBytes;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
    pub request_id: u64,
    pub batch_id: u64,
    pub ciphertexts: Vec<ArcBytes>,
}

/// Records every request and leaves answering to the test
#[derive(Default)]
pub struct MockOracle {
    requests: Vec<RecordedRequest>,
    callbacks: BTreeMap<u64, Recipient<DecryptionCallback>>,
}

impl Actor for MockOracle {
    type Context = Context<Self>;
}

impl Handler<OracleRequest> for MockOracle {
    type Result = ();
    fn handle(&mut self, msg: OracleRequest, _: &mut Self::Context) {
        self.requests.push(RecordedRequest {
            request_id: msg.request_id,
            batch_id: msg.batch_id,
            ciphertexts: msg.ciphertexts,
        });
        self.callbacks.insert(msg.request_id, msg.callback);
    }
}

#[derive(Message)]
#[rtype(result = "Vec<RecordedRequest>")]
pub struct GetRequests;

impl Handler<GetRequests> for MockOracle {
    type Result = Vec<RecordedRequest>;
    fn handle(&mut self, _: GetRequests, _: &mut Self::Context) -> Self::Result {
        self.requests.clone()
    }
}

/// Deliver a callback through the recipient captured with the request
#[derive(Message, Clone, Debug)]
#[rtype(result = "Result<DecryptionCompleted, CoordinatorError>")]
pub struct Fulfil {
    pub request_id: u64,
    pub cleartext: ArcBytes,
    pub proof: ArcBytes,
}

impl Fulfil {
    /// Answer with `sum` encoded as 8 little endian bytes
    pub fn sum(request_id: u64, sum: u64, proof: Vec<u8>) -> Self {
        Self {
            request_id,
            cleartext: sum.to_le_bytes().to_vec().into(),
            proof: proof.into(),
        }
    }
}

impl Handler<Fulfil> for MockOracle {
    type Result = ResponseFuture<Result<DecryptionCompleted, CoordinatorError>>;
    fn handle(&mut self, msg: Fulfil, _: &mut Self::Context) -> Self::Result {
        let callback = self.callbacks.get(&msg.request_id).cloned();
        Box::pin(async move {
            let Some(callback) = callback else {
                return Err(CoordinatorError::InvalidBatchState(format!(
                    "oracle never saw request {}",
                    msg.request_id
                )));
            };
            callback
                .send(DecryptionCallback {
                    request_id: msg.request_id,
                    cleartext: msg.cleartext,
                    proof: msg.proof,
                })
                .await
                .map_err(CoordinatorError::internal)?
        })
    }
}
