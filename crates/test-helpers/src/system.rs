// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix::prelude::*;
use alloy_primitives::Address;
use anyhow::Result;
use ciphersum_coordinator::{
    AddProvider, CloseBatch, Coordinator, CoordinatorParams, ManualClock, OpenBatch,
    ProofVerifier, Submit,
};
use ciphersum_data::{DataStore, InMemStore, Repositories, RepositoriesFactory};
use ciphersum_events::{AggregatorEvent, EventBus, GetErrors, GetHistory, IntegrityViolation};
use ciphersum_fhe::{Accumulator, PlainAccumulator};
use std::sync::Arc;

use crate::{addr, AcceptAllVerifier, MockOracle};

pub const OWNER: Address = Address::with_last_byte(1);
pub const COORDINATOR_ADDRESS: Address = Address::with_last_byte(0xc0);
pub const START_TIME: u64 = 1_000;

/// A coordinator wired to a mock oracle, a manual clock and a recording event bus
pub struct TestSystem {
    pub coordinator: Addr<Coordinator>,
    pub bus: Addr<EventBus<AggregatorEvent>>,
    pub oracle: Addr<MockOracle>,
    pub clock: ManualClock,
    pub store: DataStore,
    pub repositories: Repositories,
    pub owner: Address,
    accumulator: Arc<dyn Accumulator>,
    verifier: Arc<dyn ProofVerifier>,
    cooldown_seconds: u64,
}

pub struct TestSystemBuilder {
    store: Option<DataStore>,
    verifier: Arc<dyn ProofVerifier>,
    accumulator: Arc<dyn Accumulator>,
    clock: ManualClock,
    owner: Address,
    cooldown_seconds: u64,
}

impl TestSystem {
    pub fn builder() -> TestSystemBuilder {
        TestSystemBuilder {
            store: None,
            verifier: Arc::new(AcceptAllVerifier),
            accumulator: Arc::new(PlainAccumulator),
            clock: ManualClock::new(START_TIME),
            owner: OWNER,
            cooldown_seconds: 60,
        }
    }

    pub async fn history(&self) -> Result<Vec<AggregatorEvent>> {
        Ok(self.bus.send(GetHistory::<AggregatorEvent>::new()).await?)
    }

    pub async fn errors(&self) -> Result<Vec<IntegrityViolation>> {
        Ok(self.bus.send(GetErrors::<AggregatorEvent>::new()).await?)
    }

    /// Start a fresh coordinator on the same store, as a process restart would. The previous
    /// address is dropped and must not be used afterwards.
    pub async fn restart(&mut self, verifier: Arc<dyn ProofVerifier>) -> Result<()> {
        self.verifier = verifier;
        self.coordinator = attach(
            &self.repositories,
            self.accumulator.clone(),
            self.verifier.clone(),
            &self.oracle,
            &self.bus,
            &self.clock,
            self.owner,
            self.cooldown_seconds,
        )
        .await?;
        Ok(())
    }

    /// Register providers, then open, fill and close one batch. Each entry is
    /// `(provider, value, sample_count)`. Returns the batch id.
    pub async fn closed_batch(&self, submissions: &[(Address, u64, u64)]) -> Result<u64> {
        for (provider, _, _) in submissions {
            self.coordinator
                .send(AddProvider {
                    caller: self.owner,
                    provider: *provider,
                })
                .await??;
        }
        let batch_id = self
            .coordinator
            .send(OpenBatch { caller: self.owner })
            .await??;
        for (provider, value, sample_count) in submissions {
            self.coordinator
                .send(Submit {
                    caller: *provider,
                    ciphertext: PlainAccumulator::encrypt(*value).into(),
                    sample_count: *sample_count,
                })
                .await??;
        }
        self.coordinator
            .send(CloseBatch { caller: self.owner })
            .await??;
        Ok(batch_id)
    }
}

impl TestSystemBuilder {
    pub fn with_store(mut self, store: DataStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_verifier(mut self, verifier: impl ProofVerifier) -> Self {
        self.verifier = Arc::new(verifier);
        self
    }

    pub fn with_accumulator(mut self, accumulator: impl Accumulator) -> Self {
        self.accumulator = Arc::new(accumulator);
        self
    }

    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_owner(mut self, owner: Address) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_cooldown_seconds(mut self, cooldown_seconds: u64) -> Self {
        self.cooldown_seconds = cooldown_seconds;
        self
    }

    pub async fn build(self) -> Result<TestSystem> {
        let store = match self.store {
            Some(store) => store,
            None => DataStore::from(&InMemStore::new(true).start()),
        };
        let repositories = store.repositories();
        let bus = EventBus::<AggregatorEvent>::default().start();
        let oracle = MockOracle::default().start();
        let coordinator = attach(
            &repositories,
            self.accumulator.clone(),
            self.verifier.clone(),
            &oracle,
            &bus,
            &self.clock,
            self.owner,
            self.cooldown_seconds,
        )
        .await?;

        Ok(TestSystem {
            coordinator,
            bus,
            oracle,
            clock: self.clock,
            store,
            repositories,
            owner: self.owner,
            accumulator: self.accumulator,
            verifier: self.verifier,
            cooldown_seconds: self.cooldown_seconds,
        })
    }
}

#[allow(clippy::too_many_arguments)]
async fn attach(
    repositories: &Repositories,
    accumulator: Arc<dyn Accumulator>,
    verifier: Arc<dyn ProofVerifier>,
    oracle: &Addr<MockOracle>,
    bus: &Addr<EventBus<AggregatorEvent>>,
    clock: &ManualClock,
    owner: Address,
    cooldown_seconds: u64,
) -> Result<Addr<Coordinator>> {
    Coordinator::attach(
        CoordinatorParams {
            address: COORDINATOR_ADDRESS,
            accumulator,
            verifier,
            oracle: oracle.clone().recipient(),
            bus: bus.clone(),
            clock: Arc::new(clock.clone()),
        },
        repositories,
        owner,
        cooldown_seconds,
    )
    .await
}

/// Providers 0x0a, 0x0b, 0x0c
pub fn providers() -> [Address; 3] {
    [addr(0x0a), addr(0x0b), addr(0x0c)]
}
