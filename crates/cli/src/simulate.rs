// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix::prelude::*;
use alloy::primitives::Address;
use anyhow::{anyhow, bail, Context as _, Result};
use ciphersum_config::AppConfig;
use ciphersum_coordinator::{
    AddProvider, Clock, CloseBatch, Coordinator, CoordinatorParams, OpenBatch, RequestDecryption,
    Submit, SystemClock,
};
use ciphersum_data::{DataStore, InMemStore, RepositoriesFactory, SledStore};
use ciphersum_events::{AggregatorEvent, DecryptionCompleted, EventBus, Subscribe};
use ciphersum_fhe::{build_bfv_params_arc, BfvAccumulator, BfvKeyset};
use ciphersum_logger::SimpleLogger;
use ciphersum_oracle::{LocalOracle, OracleSigner, SignatureVerifier};
use std::{sync::Arc, time::Duration};
use tokio::sync::oneshot;
use tracing::{info, warn};

const ROUND_TIMEOUT: Duration = Duration::from_secs(60);

/// Owner used when the configuration does not name one
pub const DEFAULT_OWNER: Address = Address::with_last_byte(1);

/// Deterministic provider identity for the i-th submission
pub fn provider_address(index: usize) -> Address {
    let mut bytes = [0u8; 20];
    bytes[12..].copy_from_slice(&(0x1000 + index as u64).to_be_bytes());
    Address::from(bytes)
}

pub fn validate_round(values: &[u64], samples: &[u64]) -> Result<()> {
    if values.is_empty() {
        bail!("at least one value is required");
    }
    if values.len() != samples.len() {
        bail!(
            "got {} values but {} sample counts",
            values.len(),
            samples.len()
        );
    }
    Ok(())
}

/// Resolves with the first completion or integrity alert published on the bus
struct RoundOutcome {
    tx: Option<oneshot::Sender<AggregatorEvent>>,
}

impl RoundOutcome {
    fn attach(bus: &Addr<EventBus<AggregatorEvent>>) -> oneshot::Receiver<AggregatorEvent> {
        let (tx, rx) = oneshot::channel();
        let addr = RoundOutcome { tx: Some(tx) }.start();
        for event_type in ["DecryptionCompleted", "IntegrityViolation"] {
            bus.do_send(Subscribe::new(event_type, addr.clone().recipient()));
        }
        rx
    }
}

impl Actor for RoundOutcome {
    type Context = Context<Self>;
}

impl Handler<AggregatorEvent> for RoundOutcome {
    type Result = ();
    fn handle(&mut self, msg: AggregatorEvent, _: &mut Self::Context) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(msg);
        }
    }
}

fn open_store(config: &AppConfig) -> Result<DataStore> {
    if config.use_in_mem_store {
        return Ok((&InMemStore::new(false).start()).into());
    }
    let db_file = config.db_file()?;
    info!(db_file = %db_file.display(), "Using sled store");
    Ok((&SledStore::new(&db_file)?).into())
}

pub async fn execute(config: &AppConfig, values: Vec<u64>, samples: Vec<u64>) -> Result<()> {
    let data = run_round(config, values, samples, Arc::new(SystemClock)).await?;
    println!(
        "batch {} request {}: sum = {} over {} samples",
        data.batch_id, data.request_id, data.decrypted_sum, data.total_samples
    );
    Ok(())
}

/// Run one batch from opening to decryption. A batch opened here is closed again when a
/// submission is rejected so that the next run can open its own.
pub async fn run_round(
    config: &AppConfig,
    values: Vec<u64>,
    samples: Vec<u64>,
    clock: Arc<dyn Clock>,
) -> Result<DecryptionCompleted> {
    validate_round(&values, &samples)?;

    let params = build_bfv_params_arc(
        config.bfv.degree,
        config.bfv.plaintext_modulus,
        &config.bfv.moduli,
    )?;
    let keyset = BfvKeyset::from_seed(params.clone(), rand::random())?;

    // Providers encrypt under the oracle's public key before the oracle takes the keyset.
    let ciphertexts = values
        .iter()
        .map(|v| keyset.encrypt_u64(*v))
        .collect::<Result<Vec<_>>>()?;

    let signer = match &config.oracle.signer_key {
        Some(key) => OracleSigner::from_hex(key)?,
        None => OracleSigner::random(),
    };
    let trusted = config.oracle.verifier_address.unwrap_or(signer.address());
    let verifier = SignatureVerifier::new(trusted);
    info!(trusted = %verifier.trusted(), "Checking oracle proofs");
    let owner = config.owner.unwrap_or(DEFAULT_OWNER);

    let repositories = open_store(config)?.repositories();
    let bus = EventBus::<AggregatorEvent>::default().start();
    SimpleLogger::<AggregatorEvent>::attach(&config.name, bus.clone());
    let outcome = RoundOutcome::attach(&bus);
    let oracle = LocalOracle::new(keyset, signer).start();

    let coordinator = Coordinator::attach(
        CoordinatorParams {
            address: config.coordinator_address,
            accumulator: Arc::new(BfvAccumulator::new(params)),
            verifier: Arc::new(verifier),
            oracle: oracle.recipient(),
            bus: bus.clone(),
            clock,
        },
        &repositories,
        owner,
        config.cooldown_seconds,
    )
    .await?;

    for index in 0..values.len() {
        coordinator
            .send(AddProvider {
                caller: owner,
                provider: provider_address(index),
            })
            .await??;
    }

    let batch_id = coordinator.send(OpenBatch { caller: owner }).await??;
    if let Err(err) = submit_all(&coordinator, ciphertexts, samples).await {
        warn!(batch_id, "Closing batch after a rejected submission");
        coordinator.send(CloseBatch { caller: owner }).await??;
        return Err(err);
    }
    coordinator.send(CloseBatch { caller: owner }).await??;
    let request_id = coordinator
        .send(RequestDecryption {
            caller: owner,
            batch_id,
        })
        .await??;
    info!(request_id, batch_id, "Waiting for the oracle");

    let event = tokio::time::timeout(ROUND_TIMEOUT, outcome)
        .await
        .context("Timed out waiting for the decryption result")?
        .map_err(|_| anyhow!("Round ended without a result"))?;

    match event {
        AggregatorEvent::DecryptionCompleted { data, .. } => Ok(data),
        AggregatorEvent::IntegrityViolation { data, .. } => {
            bail!("Decryption rejected: {}", data.message)
        }
        other => bail!("Unexpected event {}", other),
    }
}

async fn submit_all(
    coordinator: &Addr<Coordinator>,
    ciphertexts: Vec<Vec<u8>>,
    samples: Vec<u64>,
) -> Result<()> {
    for (index, (ciphertext, sample_count)) in ciphertexts.into_iter().zip(samples).enumerate() {
        coordinator
            .send(Submit {
                caller: provider_address(index),
                ciphertext: ciphertext.into(),
                sample_count,
            })
            .await?
            .with_context(|| format!("Submission {} was rejected", index))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context as _;
    use ciphersum_coordinator::{CoordinatorError, ManualClock};

    #[test]
    fn round_shape_is_checked() {
        assert!(validate_round(&[5, 7], &[1, 2]).is_ok());
        assert!(validate_round(&[], &[]).is_err());
        assert!(validate_round(&[5, 7], &[1]).is_err());
    }

    #[test]
    fn provider_addresses_are_distinct() {
        assert_ne!(provider_address(0), provider_address(1));
        assert_ne!(provider_address(0), DEFAULT_OWNER);
        assert_ne!(provider_address(300), provider_address(44));
    }

    #[actix::test]
    async fn runs_an_in_memory_round() -> Result<()> {
        let mut config = AppConfig::default();
        config.use_in_mem_store = true;
        execute(&config, vec![5, 7, 11], vec![100, 50, 25]).await
    }

    #[actix::test]
    async fn rerun_inside_cooldown_leaves_no_open_batch() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = AppConfig::default();
        config.data_dir = Some(dir.path().to_path_buf());
        let clock = ManualClock::new(1_000);

        let first = run_round(&config, vec![5, 7], vec![10, 20], Arc::new(clock.clone())).await?;
        assert_eq!((first.batch_id, first.decrypted_sum), (1, 12));

        clock.advance(1);
        let err = run_round(&config, vec![1, 2], vec![1, 1], Arc::new(clock.clone()))
            .await
            .err()
            .context("second run should hit the cooldown")?;
        assert!(matches!(
            err.downcast_ref::<CoordinatorError>(),
            Some(CoordinatorError::CooldownActive { .. })
        ));

        clock.advance(config.cooldown_seconds);
        let third = run_round(&config, vec![3, 4], vec![1, 1], Arc::new(clock.clone())).await?;
        assert_eq!((third.batch_id, third.decrypted_sum), (3, 7));
        Ok(())
    }
}
