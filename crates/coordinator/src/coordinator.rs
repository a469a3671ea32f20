// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix::prelude::*;
use alloy_primitives::{Address, B256};
use anyhow::Result;
use ciphersum_data::{AutoPersist, Persistable, Repositories};
use ciphersum_events::{
    AggregatorEvent, BusError, DecryptionCompleted, EventBus, IntegrityViolation,
};
use ciphersum_fhe::Accumulator;
use ciphersum_utils::ArcBytes;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    Batch, Clock, CoordinatorError, CoordinatorInfo, CoordinatorRepositoryFactory,
    CoordinatorState, DecryptionCallback, DecryptionRequest, OracleRequest, ProofVerifier,
};

#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "Result<(), CoordinatorError>")]
pub struct TransferOwnership {
    pub caller: Address,
    pub new_owner: Address,
}

#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "Result<(), CoordinatorError>")]
pub struct AddProvider {
    pub caller: Address,
    pub provider: Address,
}

#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "Result<(), CoordinatorError>")]
pub struct RemoveProvider {
    pub caller: Address,
    pub provider: Address,
}

#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "Result<(), CoordinatorError>")]
pub struct SetPaused {
    pub caller: Address,
    pub paused: bool,
}

#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "Result<(), CoordinatorError>")]
pub struct SetCooldownSeconds {
    pub caller: Address,
    pub cooldown_seconds: u64,
}

/// Returns the id of the new batch
#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "Result<u64, CoordinatorError>")]
pub struct OpenBatch {
    pub caller: Address,
}

/// Returns the id of the batch that was closed
#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "Result<u64, CoordinatorError>")]
pub struct CloseBatch {
    pub caller: Address,
}

/// Returns the ciphertext handle
#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "Result<B256, CoordinatorError>")]
pub struct Submit {
    pub caller: Address,
    pub ciphertext: ArcBytes,
    pub sample_count: u64,
}

/// Returns the request id
#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "Result<u64, CoordinatorError>")]
pub struct RequestDecryption {
    pub caller: Address,
    pub batch_id: u64,
}

#[derive(Message, Clone, Debug, Default, PartialEq, Eq)]
#[rtype(result = "Result<CoordinatorInfo, CoordinatorError>")]
pub struct GetCoordinatorInfo;

#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "bool")]
pub struct IsProvider(pub Address);

#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "Option<Batch>")]
pub struct GetBatch(pub u64);

#[derive(Message, Clone, Debug, PartialEq, Eq)]
#[rtype(result = "Option<DecryptionRequest>")]
pub struct GetDecryptionRequest(pub u64);

pub struct CoordinatorParams {
    /// Identity mixed into the state hash
    pub address: Address,
    pub accumulator: Arc<dyn Accumulator>,
    pub verifier: Arc<dyn ProofVerifier>,
    pub oracle: Recipient<OracleRequest>,
    pub bus: Addr<EventBus<AggregatorEvent>>,
    pub clock: Arc<dyn Clock>,
}

/// Serializes every operation on the ledger through its mailbox. Each handler works on a copy of
/// the state and only writes it back, and publishes events, once the operation has succeeded.
pub struct Coordinator {
    address: Address,
    accumulator: Arc<dyn Accumulator>,
    verifier: Arc<dyn ProofVerifier>,
    oracle: Recipient<OracleRequest>,
    bus: Addr<EventBus<AggregatorEvent>>,
    clock: Arc<dyn Clock>,
    state: Persistable<CoordinatorState>,
}

impl Coordinator {
    pub fn new(params: CoordinatorParams, state: Persistable<CoordinatorState>) -> Self {
        Self {
            address: params.address,
            accumulator: params.accumulator,
            verifier: params.verifier,
            oracle: params.oracle,
            bus: params.bus,
            clock: params.clock,
            state,
        }
    }

    /// Start a coordinator on top of whatever state the store holds. `owner` and
    /// `cooldown_seconds` only apply when nothing has been persisted yet.
    pub async fn attach(
        params: CoordinatorParams,
        repositories: &Repositories,
        owner: Address,
        cooldown_seconds: u64,
    ) -> Result<Addr<Self>> {
        let repo = repositories.coordinator();
        let loaded = repo.load().await?;
        let state = if loaded.has() {
            let info = loaded.try_with(|s| Ok(s.info()))?;
            info!(
                owner = %info.owner,
                current_batch_id = info.current_batch_id,
                next_request_id = info.next_request_id,
                "Restored coordinator state"
            );
            loaded
        } else {
            info!(owner = %owner, cooldown_seconds, "Bootstrapping coordinator state");
            repo.send(Some(CoordinatorState::new(owner, cooldown_seconds)?))
        };

        Ok(Coordinator::new(params, state).start())
    }

    fn commit<T>(
        &mut self,
        op: impl FnOnce(&mut CoordinatorState) -> Result<T, CoordinatorError>,
    ) -> Result<T, CoordinatorError> {
        let mut next = self.state.try_get().map_err(CoordinatorError::internal)?;
        let out = op(&mut next)?;
        self.state.set(next);
        Ok(out)
    }

    fn apply<E>(
        &mut self,
        operation: &'static str,
        op: impl FnOnce(&mut CoordinatorState) -> Result<E, CoordinatorError>,
    ) -> Result<E, CoordinatorError>
    where
        E: Clone + Into<AggregatorEvent>,
    {
        match self.commit(op) {
            Ok(event) => {
                self.bus.do_send(event.clone().into());
                Ok(event)
            }
            Err(err) => Err(rejected(operation, err)),
        }
    }

    fn read<T: Default>(&self, f: impl FnOnce(&CoordinatorState) -> T) -> T {
        self.state.try_with(|s| Ok(f(s))).unwrap_or_default()
    }
}

fn rejected(operation: &'static str, err: CoordinatorError) -> CoordinatorError {
    warn!(operation, kind = ?err.kind(), "Rejected: {err}");
    err
}

impl Actor for Coordinator {
    type Context = Context<Self>;
}

impl Handler<TransferOwnership> for Coordinator {
    type Result = Result<(), CoordinatorError>;
    fn handle(&mut self, msg: TransferOwnership, _: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        self.apply("transfer_ownership", |s| {
            s.transfer_ownership(msg.caller, msg.new_owner, now)
        })?;
        Ok(())
    }
}

impl Handler<AddProvider> for Coordinator {
    type Result = Result<(), CoordinatorError>;
    fn handle(&mut self, msg: AddProvider, _: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        self.apply("add_provider", |s| s.add_provider(msg.caller, msg.provider, now))?;
        Ok(())
    }
}

impl Handler<RemoveProvider> for Coordinator {
    type Result = Result<(), CoordinatorError>;
    fn handle(&mut self, msg: RemoveProvider, _: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        self.apply("remove_provider", |s| {
            s.remove_provider(msg.caller, msg.provider, now)
        })?;
        Ok(())
    }
}

impl Handler<SetPaused> for Coordinator {
    type Result = Result<(), CoordinatorError>;
    fn handle(&mut self, msg: SetPaused, _: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        self.apply("set_paused", |s| s.set_paused(msg.caller, msg.paused, now))?;
        Ok(())
    }
}

impl Handler<SetCooldownSeconds> for Coordinator {
    type Result = Result<(), CoordinatorError>;
    fn handle(&mut self, msg: SetCooldownSeconds, _: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        self.apply("set_cooldown_seconds", |s| {
            s.set_cooldown_seconds(msg.caller, msg.cooldown_seconds, now)
        })?;
        Ok(())
    }
}

impl Handler<OpenBatch> for Coordinator {
    type Result = Result<u64, CoordinatorError>;
    fn handle(&mut self, msg: OpenBatch, _: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        let accumulator = self.accumulator.clone();
        let event = self.apply("open_batch", |s| {
            s.open_batch(msg.caller, now, accumulator.as_ref())
        })?;
        info!(batch_id = event.batch_id, "Batch opened");
        Ok(event.batch_id)
    }
}

impl Handler<CloseBatch> for Coordinator {
    type Result = Result<u64, CoordinatorError>;
    fn handle(&mut self, msg: CloseBatch, _: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        let event = self.apply("close_batch", |s| s.close_batch(msg.caller, now))?;
        info!(
            batch_id = event.batch_id,
            total_samples = event.total_samples,
            "Batch closed"
        );
        Ok(event.batch_id)
    }
}

impl Handler<Submit> for Coordinator {
    type Result = Result<B256, CoordinatorError>;
    fn handle(&mut self, msg: Submit, _: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        let accumulator = self.accumulator.clone();
        let event = self.apply("submit", |s| {
            s.submit(
                msg.caller,
                &msg.ciphertext,
                msg.sample_count,
                now,
                accumulator.as_ref(),
            )
        })?;
        Ok(event.ciphertext_handle)
    }
}

impl Handler<RequestDecryption> for Coordinator {
    type Result = Result<u64, CoordinatorError>;
    fn handle(&mut self, msg: RequestDecryption, ctx: &mut Self::Context) -> Self::Result {
        let now = self.clock.now();
        let accumulator = self.accumulator.clone();
        let address = self.address;

        let (event, ciphertext) = self
            .commit(|s| {
                s.request_decryption(msg.caller, msg.batch_id, now, accumulator.as_ref(), address)
            })
            .map_err(|err| rejected("request_decryption", err))?;

        info!(
            request_id = event.request_id,
            batch_id = event.batch_id,
            state_hash = %event.state_hash,
            "Decryption requested"
        );
        self.bus.do_send(AggregatorEvent::from(event.clone()));
        self.oracle.do_send(OracleRequest {
            request_id: event.request_id,
            batch_id: event.batch_id,
            ciphertexts: vec![ciphertext],
            callback: ctx.address().recipient(),
        });

        Ok(event.request_id)
    }
}

impl Handler<DecryptionCallback> for Coordinator {
    type Result = Result<DecryptionCompleted, CoordinatorError>;
    fn handle(&mut self, msg: DecryptionCallback, _: &mut Self::Context) -> Self::Result {
        let accumulator = self.accumulator.clone();
        let verifier = self.verifier.clone();
        let address = self.address;
        let request_id = msg.request_id;

        let result = self.commit(|s| {
            s.on_decryption_callback(
                request_id,
                &msg.cleartext,
                &msg.proof,
                accumulator.as_ref(),
                verifier.as_ref(),
                address,
            )
        });

        match result {
            Ok(event) => {
                info!(
                    request_id,
                    batch_id = event.batch_id,
                    decrypted_sum = event.decrypted_sum,
                    total_samples = event.total_samples,
                    "Decryption completed"
                );
                self.bus.do_send(AggregatorEvent::from(event.clone()));
                Ok(event)
            }
            Err(err) => {
                if let Some(reason) = err.integrity_reason() {
                    error!(request_id, ?reason, "Integrity violation: {err}");
                    self.bus.err(IntegrityViolation {
                        request_id,
                        reason,
                        message: err.to_string(),
                    });
                } else {
                    warn!(request_id, kind = ?err.kind(), "Rejected decryption callback: {err}");
                }
                Err(err)
            }
        }
    }
}

impl Handler<GetCoordinatorInfo> for Coordinator {
    type Result = Result<CoordinatorInfo, CoordinatorError>;
    fn handle(&mut self, _: GetCoordinatorInfo, _: &mut Self::Context) -> Self::Result {
        self.state
            .try_with(|s| Ok(s.info()))
            .map_err(CoordinatorError::internal)
    }
}

impl Handler<IsProvider> for Coordinator {
    type Result = bool;
    fn handle(&mut self, msg: IsProvider, _: &mut Self::Context) -> Self::Result {
        self.read(|s| s.access.is_provider(&msg.0))
    }
}

impl Handler<GetBatch> for Coordinator {
    type Result = Option<Batch>;
    fn handle(&mut self, msg: GetBatch, _: &mut Self::Context) -> Self::Result {
        self.read(|s| s.ledger.get(msg.0).cloned())
    }
}

impl Handler<GetDecryptionRequest> for Coordinator {
    type Result = Option<DecryptionRequest>;
    fn handle(&mut self, msg: GetDecryptionRequest, _: &mut Self::Context) -> Self::Result {
        self.read(|s| s.decryptions.get(msg.0).cloned())
    }
}
