// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::{Context, Result};
use ciphersum_coordinator::{
    CoordinatorError, CoordinatorRepositoryFactory, DecryptionCallback, GetCoordinatorInfo,
    GetDecryptionRequest, RequestDecryption,
};
use ciphersum_data::{DataStore, SledStore};
use ciphersum_events::IntegrityViolationReason;
use ciphersum_fhe::PlainAccumulator;
use ciphersum_test_helpers::{providers, AcceptAllVerifier, TestSystem, OWNER};
use std::sync::Arc;

fn callback(request_id: u64, sum: u64) -> DecryptionCallback {
    DecryptionCallback {
        request_id,
        cleartext: sum.to_le_bytes().to_vec().into(),
        proof: vec![0xaa].into(),
    }
}

#[actix::test]
async fn test_pending_request_survives_restart_on_sled() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("db");
    let [a, b, _] = providers();

    let system = TestSystem::builder()
        .with_store(DataStore::from(&SledStore::new(&path)?))
        .build()
        .await?;
    let batch_id = system.closed_batch(&[(a, 5, 100), (b, 6, 20)]).await?;
    let request_id = system
        .coordinator
        .send(RequestDecryption {
            caller: OWNER,
            batch_id,
        })
        .await??;

    // Reads are queued behind every write the coordinator has issued.
    let persisted = system
        .repositories
        .coordinator()
        .read()
        .await?
        .context("state was not persisted")?;
    assert_eq!(persisted.decryptions.next_request_id, 2);

    let restarted = TestSystem::builder()
        .with_store(DataStore::from(&SledStore::new(&path)?))
        .build()
        .await?;
    let info = restarted.coordinator.send(GetCoordinatorInfo).await??;
    assert_eq!(info.owner, OWNER);
    assert_eq!(info.current_batch_id, 1);
    assert_eq!(info.next_request_id, 2);
    assert_eq!(info.provider_count, 2);

    let completed = restarted
        .coordinator
        .send(callback(request_id, 11))
        .await??;
    assert_eq!(completed.decrypted_sum, 11);
    assert_eq!(completed.total_samples, 120);

    let replay = restarted
        .coordinator
        .send(callback(request_id, 11))
        .await?;
    assert_eq!(replay, Err(CoordinatorError::ReplayDetected(request_id)));
    Ok(())
}

#[actix::test]
async fn test_tampered_accumulator_is_detected() -> Result<()> {
    let mut system = TestSystem::builder().build().await?;
    let [a, _, _] = providers();
    let batch_id = system.closed_batch(&[(a, 5, 100)]).await?;
    let request_id = system
        .coordinator
        .send(RequestDecryption {
            caller: OWNER,
            batch_id,
        })
        .await??;

    let repo = system.repositories.coordinator();
    let mut state = repo.read().await?.context("state was not persisted")?;
    let batch = state
        .ledger
        .batches
        .get_mut(&batch_id)
        .context("batch missing")?;
    batch.accumulator = PlainAccumulator::encrypt(500).into();
    repo.write(&state);

    system.restart(Arc::new(AcceptAllVerifier)).await?;

    let res = system
        .coordinator
        .send(callback(request_id, 500))
        .await?;
    assert!(matches!(
        res,
        Err(CoordinatorError::StateMismatch { request_id: 1, .. })
    ));

    let request = system
        .coordinator
        .send(GetDecryptionRequest(request_id))
        .await?;
    assert_eq!(request.map(|r| r.processed), Some(false));

    let errors = system.errors().await?;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].reason, IntegrityViolationReason::StateMismatch);
    Ok(())
}
