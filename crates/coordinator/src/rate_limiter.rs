// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use ciphersum_events::CooldownUpdated;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::CoordinatorError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CooldownKind {
    Submission,
    DecryptionRequest,
}

/// Per (actor, kind) cooldown clocks sharing one global interval. Records are never removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiter {
    pub cooldown_seconds: u64,
    pub last_action: BTreeMap<(Address, CooldownKind), u64>,
}

fn validate_cooldown(cooldown_seconds: u64) -> Result<u64, CoordinatorError> {
    if cooldown_seconds == 0 {
        return Err(CoordinatorError::InvalidParameters(
            "cooldown_seconds must be greater than zero".to_string(),
        ));
    }
    Ok(cooldown_seconds)
}

impl RateLimiter {
    pub fn new(cooldown_seconds: u64) -> Result<Self, CoordinatorError> {
        Ok(Self {
            cooldown_seconds: validate_cooldown(cooldown_seconds)?,
            last_action: BTreeMap::new(),
        })
    }

    pub fn set_cooldown_seconds(
        &mut self,
        cooldown_seconds: u64,
    ) -> Result<CooldownUpdated, CoordinatorError> {
        self.cooldown_seconds = validate_cooldown(cooldown_seconds)?;
        Ok(CooldownUpdated { cooldown_seconds })
    }

    pub fn last_action(&self, actor: &Address, kind: CooldownKind) -> Option<u64> {
        self.last_action.get(&(*actor, kind)).copied()
    }

    /// Fails while `now < last + cooldown`. An actor without a record always passes.
    pub fn check(
        &self,
        actor: &Address,
        kind: CooldownKind,
        now: u64,
    ) -> Result<(), CoordinatorError> {
        let Some(last) = self.last_action(actor, kind) else {
            return Ok(());
        };
        let retry_at = last.saturating_add(self.cooldown_seconds);
        if now < retry_at {
            return Err(CoordinatorError::CooldownActive {
                actor: *actor,
                kind,
                retry_at,
            });
        }
        Ok(())
    }

    pub fn check_and_record(
        &mut self,
        actor: &Address,
        kind: CooldownKind,
        now: u64,
    ) -> Result<(), CoordinatorError> {
        self.check(actor, kind, now)?;
        self.last_action.insert((*actor, kind), now);
        Ok(())
    }
}
