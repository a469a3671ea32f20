// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix::prelude::*;
use alloy_primitives::Address;
use anyhow::{bail, Result};
use ciphersum_coordinator::{
    AddProvider, CloseBatch, Coordinator, CoordinatorError, CoordinatorParams,
    GetDecryptionRequest, ManualClock, OpenBatch, RequestDecryption, Submit,
};
use ciphersum_data::{DataStore, InMemStore, RepositoriesFactory};
use ciphersum_events::{
    AggregatorEvent, Event, EventBus, GetErrors, GetHistory, IntegrityViolationReason,
};
use ciphersum_fhe::{build_bfv_params_arc, BfvAccumulator, BfvKeyset, SET_2048_1032193_1};
use ciphersum_logger::SimpleLogger;
use ciphersum_oracle::{LocalOracle, OracleSigner, SignatureVerifier};
use ciphersum_test_helpers::{init_tracing, providers, OWNER};
use std::{sync::Arc, time::Duration};
use tokio::time::sleep;

struct Round {
    coordinator: Addr<Coordinator>,
    bus: Addr<EventBus<AggregatorEvent>>,
    keyset: BfvKeyset,
}

/// Wire a coordinator to a BFV accumulator and a local oracle. The oracle's proofs are checked
/// against `trusted`, or against the oracle's own signer when `None`.
async fn setup(trusted: Option<Address>) -> Result<Round> {
    init_tracing();
    let (degree, plaintext_modulus, moduli) = SET_2048_1032193_1;
    let params = build_bfv_params_arc(degree, plaintext_modulus, &moduli)?;
    // Same seed, same keys: the submitters' copy only ever encrypts.
    let keyset = BfvKeyset::from_seed(params.clone(), 42)?;
    let oracle_keys = BfvKeyset::from_seed(params.clone(), 42)?;

    let signer = OracleSigner::random();
    let verifier = SignatureVerifier::new(trusted.unwrap_or(signer.address()));

    let bus = EventBus::<AggregatorEvent>::default().start();
    SimpleLogger::<AggregatorEvent>::attach("e2e", bus.clone());
    let repositories = DataStore::from(&InMemStore::new(false).start()).repositories();
    let oracle = LocalOracle::new(oracle_keys, signer).start();

    let coordinator = Coordinator::attach(
        CoordinatorParams {
            address: Address::with_last_byte(0xc0),
            accumulator: Arc::new(BfvAccumulator::new(params)),
            verifier: Arc::new(verifier),
            oracle: oracle.recipient(),
            bus: bus.clone(),
            clock: Arc::new(ManualClock::new(0)),
        },
        &repositories,
        OWNER,
        60,
    )
    .await?;

    Ok(Round {
        coordinator,
        bus,
        keyset,
    })
}

async fn run_round(round: &Round, submissions: &[(u64, u64)]) -> Result<u64> {
    let providers = providers();
    for provider in providers.iter().take(submissions.len()) {
        round
            .coordinator
            .send(AddProvider {
                caller: OWNER,
                provider: *provider,
            })
            .await??;
    }
    let batch_id = round.coordinator.send(OpenBatch { caller: OWNER }).await??;
    for ((value, sample_count), provider) in submissions.iter().zip(providers) {
        round
            .coordinator
            .send(Submit {
                caller: provider,
                ciphertext: round.keyset.encrypt_u64(*value)?.into(),
                sample_count: *sample_count,
            })
            .await??;
    }
    round.coordinator.send(CloseBatch { caller: OWNER }).await??;
    Ok(round
        .coordinator
        .send(RequestDecryption {
            caller: OWNER,
            batch_id,
        })
        .await??)
}

async fn wait_for_event(round: &Round, event_type: &str) -> Result<AggregatorEvent> {
    for _ in 0..200 {
        let history = round.bus.send(GetHistory::<AggregatorEvent>::new()).await?;
        if let Some(event) = history.into_iter().find(|e| e.event_type() == event_type) {
            return Ok(event);
        }
        sleep(Duration::from_millis(25)).await;
    }
    bail!("{event_type} was never published")
}

#[actix::test]
async fn test_encrypted_round_is_decrypted_by_local_oracle() -> Result<()> {
    let round = setup(None).await?;
    let request_id = run_round(&round, &[(5, 100), (7, 50), (11, 25)]).await?;

    let AggregatorEvent::DecryptionCompleted { data, .. } =
        wait_for_event(&round, "DecryptionCompleted").await?
    else {
        bail!("expected DecryptionCompleted");
    };
    assert_eq!(data.request_id, request_id);
    assert_eq!(data.batch_id, 1);
    assert_eq!(data.decrypted_sum, 23);
    assert_eq!(data.total_samples, 175);

    let request = round
        .coordinator
        .send(GetDecryptionRequest(request_id))
        .await?;
    assert_eq!(request.map(|r| r.processed), Some(true));
    assert!(round
        .bus
        .send(GetErrors::<AggregatorEvent>::new())
        .await?
        .is_empty());
    Ok(())
}

#[actix::test]
async fn test_untrusted_oracle_signature_is_rejected() -> Result<()> {
    let round = setup(Some(Address::with_last_byte(0xee))).await?;
    let request_id = run_round(&round, &[(3, 10)]).await?;

    let AggregatorEvent::IntegrityViolation { data, .. } =
        wait_for_event(&round, "IntegrityViolation").await?
    else {
        bail!("expected IntegrityViolation");
    };
    assert_eq!(data.request_id, request_id);
    assert_eq!(data.reason, IntegrityViolationReason::InvalidProof);

    let request = round
        .coordinator
        .send(GetDecryptionRequest(request_id))
        .await?;
    assert_eq!(request.map(|r| r.processed), Some(false));
    Ok(())
}

#[actix::test]
async fn test_three_part_ciphertext_is_rejected_and_round_continues() -> Result<()> {
    let round = setup(None).await?;
    let [provider_a, provider_b, _] = providers();
    for provider in [provider_a, provider_b] {
        round
            .coordinator
            .send(AddProvider {
                caller: OWNER,
                provider,
            })
            .await??;
    }
    let batch_id = round.coordinator.send(OpenBatch { caller: OWNER }).await??;

    let rejected = round
        .coordinator
        .send(Submit {
            caller: provider_a,
            ciphertext: round.keyset.encrypt_u64_three_part(9)?.into(),
            sample_count: 10,
        })
        .await?;
    assert!(matches!(rejected, Err(CoordinatorError::DecryptionFailed(_))));

    // The coordinator is still serving messages and the batch is untouched.
    round
        .coordinator
        .send(Submit {
            caller: provider_b,
            ciphertext: round.keyset.encrypt_u64(4)?.into(),
            sample_count: 20,
        })
        .await??;
    round.coordinator.send(CloseBatch { caller: OWNER }).await??;
    round
        .coordinator
        .send(RequestDecryption {
            caller: OWNER,
            batch_id,
        })
        .await??;

    let AggregatorEvent::DecryptionCompleted { data, .. } =
        wait_for_event(&round, "DecryptionCompleted").await?
    else {
        bail!("expected DecryptionCompleted");
    };
    assert_eq!(data.decrypted_sum, 4);
    assert_eq!(data.total_samples, 20);
    Ok(())
}
