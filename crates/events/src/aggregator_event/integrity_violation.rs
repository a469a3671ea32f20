// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix::Message;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntegrityViolationReason {
    ReplayDetected,
    StateMismatch,
    InvalidProof,
    InvalidCleartext,
}

/// Alert raised when a decryption fulfilment is rejected for integrity reasons. The rejected
/// callback does not change coordinator state; this event only exists so that observers can
/// react to protocol misuse.
#[derive(Message, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[rtype(result = "()")]
pub struct IntegrityViolation {
    pub request_id: u64,
    pub reason: IntegrityViolationReason,
    pub message: String,
}

impl Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "request_id: {}, reason: {:?}, {}",
            self.request_id, self.reason, self.message
        )
    }
}
