// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::Result;
use ciphersum_coordinator::{
    AddProvider, CloseBatch, CooldownKind, CoordinatorError, ErrorKind, GetBatch,
    GetCoordinatorInfo, GetDecryptionRequest, IsProvider, ManualClock, OpenBatch,
    RemoveProvider, RequestDecryption, SetCooldownSeconds, SetPaused, Submit, TransferOwnership,
};
use ciphersum_events::{DecryptionCompleted, IntegrityViolationReason};
use ciphersum_fhe::PlainAccumulator;
use ciphersum_test_helpers::{
    addr, event_types, init_tracing, providers, Fulfil, GetRequests, RejectAllVerifier,
    TestSystem, OWNER,
};

#[actix::test]
async fn test_single_provider_round_and_replay() -> Result<()> {
    init_tracing();
    let system = TestSystem::builder()
        .with_clock(ManualClock::new(0))
        .build()
        .await?;
    let provider_a = addr(0x0a);

    let batch_id = system.closed_batch(&[(provider_a, 5, 100)]).await?;
    assert_eq!(batch_id, 1);

    let request_id = system
        .coordinator
        .send(RequestDecryption {
            caller: OWNER,
            batch_id,
        })
        .await??;
    assert_eq!(request_id, 1);

    let requests = system.oracle.send(GetRequests).await?;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].batch_id, 1);
    assert_eq!(PlainAccumulator::decrypt(&requests[0].ciphertexts[0])?, 5);

    let completed = system
        .oracle
        .send(Fulfil::sum(request_id, 5, b"proof".to_vec()))
        .await??;
    assert_eq!(
        completed,
        DecryptionCompleted {
            request_id: 1,
            batch_id: 1,
            decrypted_sum: 5,
            total_samples: 100,
        }
    );

    let replay = system
        .oracle
        .send(Fulfil::sum(request_id, 5, b"proof".to_vec()))
        .await?;
    assert_eq!(replay, Err(CoordinatorError::ReplayDetected(1)));

    let errors = system.errors().await?;
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].reason, IntegrityViolationReason::ReplayDetected);

    assert_eq!(
        event_types(&system.history().await?),
        vec![
            "ProviderAdded",
            "BatchOpened",
            "GradientSubmitted",
            "BatchClosed",
            "DecryptionRequested",
            "DecryptionCompleted",
            "IntegrityViolation",
        ]
    );
    Ok(())
}

#[actix::test]
async fn test_non_provider_is_rejected_before_state_checks() -> Result<()> {
    let system = TestSystem::builder().build().await?;
    let outsider = addr(0x0b);

    // No batch is open, yet authorization is what fails.
    let res = system
        .coordinator
        .send(Submit {
            caller: outsider,
            ciphertext: PlainAccumulator::encrypt(1).into(),
            sample_count: 1,
        })
        .await?;
    assert_eq!(res, Err(CoordinatorError::NotProvider(outsider)));
    assert_eq!(res.unwrap_err().kind(), ErrorKind::Authorization);
    assert!(system.history().await?.is_empty());
    Ok(())
}

#[actix::test]
async fn test_cooldown_enforced_per_provider() -> Result<()> {
    let clock = ManualClock::new(0);
    let system = TestSystem::builder()
        .with_clock(clock.clone())
        .build()
        .await?;
    let [a, b, _] = providers();
    for provider in [a, b] {
        system
            .coordinator
            .send(AddProvider {
                caller: OWNER,
                provider,
            })
            .await??;
    }
    system.coordinator.send(OpenBatch { caller: OWNER }).await??;

    let submit = |caller| Submit {
        caller,
        ciphertext: PlainAccumulator::encrypt(1).into(),
        sample_count: 1,
    };

    system.coordinator.send(submit(a)).await??;

    clock.set(30);
    let err = system
        .coordinator
        .send(submit(a))
        .await?
        .expect_err("cooldown should be active");
    assert_eq!(
        err,
        CoordinatorError::CooldownActive {
            actor: a,
            kind: CooldownKind::Submission,
            retry_at: 60,
        }
    );
    assert!(err.is_retryable());
    // Other providers keep their own clock.
    system.coordinator.send(submit(b)).await??;

    clock.set(61);
    system.coordinator.send(submit(a)).await??;

    let batch = system.coordinator.send(GetBatch(1)).await?;
    assert_eq!(batch.map(|b| b.total_samples), Some(3));
    Ok(())
}

#[actix::test]
async fn test_gate_ordering() -> Result<()> {
    let system = TestSystem::builder().build().await?;
    let [a, _, _] = providers();
    system
        .coordinator
        .send(AddProvider {
            caller: OWNER,
            provider: a,
        })
        .await??;

    // Submit with no open batch
    let res = system
        .coordinator
        .send(Submit {
            caller: a,
            ciphertext: PlainAccumulator::encrypt(1).into(),
            sample_count: 1,
        })
        .await?;
    assert!(matches!(res, Err(CoordinatorError::InvalidBatchState(_))));

    let res = system
        .coordinator
        .send(RequestDecryption {
            caller: OWNER,
            batch_id: 0,
        })
        .await?;
    assert!(matches!(res, Err(CoordinatorError::InvalidBatchState(_))));

    system.coordinator.send(OpenBatch { caller: OWNER }).await??;
    let res = system
        .coordinator
        .send(RequestDecryption {
            caller: OWNER,
            batch_id: 1,
        })
        .await?;
    assert!(matches!(res, Err(CoordinatorError::InvalidBatchState(_))));

    let res = system.coordinator.send(OpenBatch { caller: OWNER }).await?;
    assert!(matches!(res, Err(CoordinatorError::InvalidBatchState(_))));

    // Malformed ciphertexts are an encryption precondition failure
    let res = system
        .coordinator
        .send(Submit {
            caller: a,
            ciphertext: vec![1, 2, 3].into(),
            sample_count: 1,
        })
        .await?;
    assert_eq!(
        res.map_err(|e| e.kind()),
        Err(ErrorKind::EncryptionPrecondition)
    );

    // Pausing blocks batch operations but not administration
    system
        .coordinator
        .send(SetPaused {
            caller: OWNER,
            paused: true,
        })
        .await??;
    let res = system.coordinator.send(CloseBatch { caller: OWNER }).await?;
    assert_eq!(res, Err(CoordinatorError::Paused));
    system
        .coordinator
        .send(RemoveProvider {
            caller: OWNER,
            provider: a,
        })
        .await??;
    assert!(!system.coordinator.send(IsProvider(a)).await?);
    Ok(())
}

#[actix::test]
async fn test_owner_administration() -> Result<()> {
    let system = TestSystem::builder().build().await?;
    let new_owner = addr(0x02);

    let res = system
        .coordinator
        .send(SetCooldownSeconds {
            caller: OWNER,
            cooldown_seconds: 0,
        })
        .await?;
    assert!(matches!(res, Err(CoordinatorError::InvalidParameters(_))));

    system
        .coordinator
        .send(SetCooldownSeconds {
            caller: OWNER,
            cooldown_seconds: 10,
        })
        .await??;
    system
        .coordinator
        .send(TransferOwnership {
            caller: OWNER,
            new_owner,
        })
        .await??;

    let res = system.coordinator.send(OpenBatch { caller: OWNER }).await?;
    assert_eq!(res, Err(CoordinatorError::NotOwner(OWNER)));

    let info = system.coordinator.send(GetCoordinatorInfo).await??;
    assert_eq!(info.owner, new_owner);
    assert_eq!(info.cooldown_seconds, 10);
    assert_eq!(info.current_batch_id, 0);
    assert_eq!(info.next_request_id, 1);
    Ok(())
}

#[actix::test]
async fn test_bad_proof_leaves_request_pending() -> Result<()> {
    let system = TestSystem::builder()
        .with_verifier(RejectAllVerifier)
        .build()
        .await?;
    let [a, b, c] = providers();
    let batch_id = system
        .closed_batch(&[(a, 2, 10), (b, 3, 20), (c, 4, 30)])
        .await?;
    let request_id = system
        .coordinator
        .send(RequestDecryption {
            caller: OWNER,
            batch_id,
        })
        .await??;

    let res = system
        .oracle
        .send(Fulfil::sum(request_id, 9, vec![]))
        .await?;
    assert_eq!(res, Err(CoordinatorError::InvalidProof(request_id)));

    let request = system
        .coordinator
        .send(GetDecryptionRequest(request_id))
        .await?;
    assert_eq!(request.map(|r| r.processed), Some(false));
    let errors = system.errors().await?;
    assert_eq!(errors[0].reason, IntegrityViolationReason::InvalidProof);
    Ok(())
}
