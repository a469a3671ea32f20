// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use ciphersum_events::{OwnershipTransferred, PausedSet, ProviderAdded, ProviderRemoved};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::CoordinatorError;

/// Owner, provider set and the pause switch. Role checks happen in
/// [`crate::CoordinatorState::authorize`]; the methods here only apply already authorized changes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    pub owner: Address,
    pub providers: BTreeSet<Address>,
    pub paused: bool,
}

fn non_zero(addr: Address, what: &str) -> Result<Address, CoordinatorError> {
    if addr.is_zero() {
        return Err(CoordinatorError::InvalidParameters(format!(
            "{what} must not be the zero address"
        )));
    }
    Ok(addr)
}

impl AccessControl {
    pub fn new(owner: Address) -> Result<Self, CoordinatorError> {
        Ok(Self {
            owner: non_zero(owner, "owner")?,
            providers: BTreeSet::new(),
            paused: false,
        })
    }

    pub fn is_owner(&self, addr: &Address) -> bool {
        self.owner == *addr
    }

    pub fn is_provider(&self, addr: &Address) -> bool {
        self.providers.contains(addr)
    }

    pub fn transfer_ownership(
        &mut self,
        new_owner: Address,
    ) -> Result<OwnershipTransferred, CoordinatorError> {
        let new_owner = non_zero(new_owner, "new owner")?;
        let previous_owner = std::mem::replace(&mut self.owner, new_owner);
        Ok(OwnershipTransferred {
            previous_owner,
            new_owner,
        })
    }

    /// Adding a provider twice is allowed and reported again
    pub fn add_provider(&mut self, provider: Address) -> Result<ProviderAdded, CoordinatorError> {
        let provider = non_zero(provider, "provider")?;
        self.providers.insert(provider);
        Ok(ProviderAdded { provider })
    }

    pub fn remove_provider(
        &mut self,
        provider: Address,
    ) -> Result<ProviderRemoved, CoordinatorError> {
        let provider = non_zero(provider, "provider")?;
        self.providers.remove(&provider);
        Ok(ProviderRemoved { provider })
    }

    pub fn set_paused(&mut self, paused: bool) -> PausedSet {
        self.paused = paused;
        PausedSet { paused }
    }
}
