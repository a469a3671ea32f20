// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix::Message;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

#[derive(Message, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[rtype(result = "()")]
pub struct BatchOpened {
    pub batch_id: u64,
}

impl Display for BatchOpened {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch_id: {}", self.batch_id)
    }
}

#[derive(Message, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[rtype(result = "()")]
pub struct BatchClosed {
    pub batch_id: u64,
    pub total_samples: u64,
}

impl Display for BatchClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "batch_id: {}, total_samples: {}",
            self.batch_id, self.total_samples
        )
    }
}

/// A provider's encrypted update was folded into the open batch. The ciphertext itself is not
/// carried on the event; `ciphertext_handle` is its keccak256 digest.
#[derive(Message, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[rtype(result = "()")]
pub struct GradientSubmitted {
    pub provider: Address,
    pub batch_id: u64,
    pub ciphertext_handle: B256,
    pub sample_count: u64,
}

impl Display for GradientSubmitted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "provider: {}, batch_id: {}, handle: {}, samples: {}",
            self.provider, self.batch_id, self.ciphertext_handle, self.sample_count
        )
    }
}
