// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod access;
mod batch;
mod decryption;
mod integrity_violation;

pub use access::*;
pub use batch::*;
pub use decryption::*;
pub use integrity_violation::*;

use crate::{ErrorEvent, Event, EventId};
use actix::Message;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to help define From traits for AggregatorEvent
macro_rules! impl_from_event {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for AggregatorEvent {
                fn from(data: $variant) -> Self {
                    AggregatorEvent::$variant {
                        id: EventId::hash(&data),
                        data,
                    }
                }
            }
        )*
    };
}

#[derive(Message, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[rtype(result = "()")]
pub enum AggregatorEvent {
    OwnershipTransferred {
        id: EventId,
        data: OwnershipTransferred,
    },
    ProviderAdded {
        id: EventId,
        data: ProviderAdded,
    },
    ProviderRemoved {
        id: EventId,
        data: ProviderRemoved,
    },
    PausedSet {
        id: EventId,
        data: PausedSet,
    },
    CooldownUpdated {
        id: EventId,
        data: CooldownUpdated,
    },
    BatchOpened {
        id: EventId,
        data: BatchOpened,
    },
    BatchClosed {
        id: EventId,
        data: BatchClosed,
    },
    GradientSubmitted {
        id: EventId,
        data: GradientSubmitted,
    },
    DecryptionRequested {
        id: EventId,
        data: DecryptionRequested,
    },
    DecryptionCompleted {
        id: EventId,
        data: DecryptionCompleted,
    },
    IntegrityViolation {
        id: EventId,
        data: IntegrityViolation,
    },
}

impl AggregatorEvent {
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    pub fn get_id(&self) -> EventId {
        match self {
            AggregatorEvent::OwnershipTransferred { id, .. } => id.clone(),
            AggregatorEvent::ProviderAdded { id, .. } => id.clone(),
            AggregatorEvent::ProviderRemoved { id, .. } => id.clone(),
            AggregatorEvent::PausedSet { id, .. } => id.clone(),
            AggregatorEvent::CooldownUpdated { id, .. } => id.clone(),
            AggregatorEvent::BatchOpened { id, .. } => id.clone(),
            AggregatorEvent::BatchClosed { id, .. } => id.clone(),
            AggregatorEvent::GradientSubmitted { id, .. } => id.clone(),
            AggregatorEvent::DecryptionRequested { id, .. } => id.clone(),
            AggregatorEvent::DecryptionCompleted { id, .. } => id.clone(),
            AggregatorEvent::IntegrityViolation { id, .. } => id.clone(),
        }
    }

    /// The batch this event concerns, if any
    pub fn get_batch_id(&self) -> Option<u64> {
        match self {
            AggregatorEvent::BatchOpened { data, .. } => Some(data.batch_id),
            AggregatorEvent::BatchClosed { data, .. } => Some(data.batch_id),
            AggregatorEvent::GradientSubmitted { data, .. } => Some(data.batch_id),
            AggregatorEvent::DecryptionRequested { data, .. } => Some(data.batch_id),
            AggregatorEvent::DecryptionCompleted { data, .. } => Some(data.batch_id),
            _ => None,
        }
    }

    pub fn get_data(&self) -> String {
        match self {
            AggregatorEvent::OwnershipTransferred { data, .. } => format!("{}", data),
            AggregatorEvent::ProviderAdded { data, .. } => format!("{}", data),
            AggregatorEvent::ProviderRemoved { data, .. } => format!("{}", data),
            AggregatorEvent::PausedSet { data, .. } => format!("{}", data),
            AggregatorEvent::CooldownUpdated { data, .. } => format!("{}", data),
            AggregatorEvent::BatchOpened { data, .. } => format!("{}", data),
            AggregatorEvent::BatchClosed { data, .. } => format!("{}", data),
            AggregatorEvent::GradientSubmitted { data, .. } => format!("{}", data),
            AggregatorEvent::DecryptionRequested { data, .. } => format!("{}", data),
            AggregatorEvent::DecryptionCompleted { data, .. } => format!("{}", data),
            AggregatorEvent::IntegrityViolation { data, .. } => format!("{}", data),
        }
    }
}

impl Event for AggregatorEvent {
    type Id = EventId;

    fn event_type(&self) -> String {
        let s = format!("{:?}", self);
        extract_event_name(&s).to_string()
    }

    fn event_id(&self) -> Self::Id {
        self.get_id()
    }
}

impl ErrorEvent for AggregatorEvent {
    type Error = IntegrityViolation;

    fn as_error(&self) -> Option<&Self::Error> {
        match self {
            AggregatorEvent::IntegrityViolation { data, .. } => Some(data),
            _ => None,
        }
    }

    fn from_error(error: Self::Error) -> Self {
        AggregatorEvent::from(error)
    }
}

impl_from_event!(
    OwnershipTransferred,
    ProviderAdded,
    ProviderRemoved,
    PausedSet,
    CooldownUpdated,
    BatchOpened,
    BatchClosed,
    GradientSubmitted,
    DecryptionRequested,
    DecryptionCompleted,
    IntegrityViolation
);

impl fmt::Display for AggregatorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format!("{}({})", self.event_type(), self.get_data()))
    }
}

fn extract_event_name(s: &str) -> &str {
    let bytes = s.as_bytes();
    for (i, &item) in bytes.iter().enumerate() {
        if item == b' ' || item == b'(' || item == b'{' {
            return &s[..i];
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};

    #[test]
    fn event_type_is_the_variant_name() {
        let evt = AggregatorEvent::from(GradientSubmitted {
            provider: Address::repeat_byte(1),
            batch_id: 3,
            ciphertext_handle: B256::ZERO,
            sample_count: 10,
        });
        assert_eq!(evt.event_type(), "GradientSubmitted");
        assert_eq!(evt.get_batch_id(), Some(3));
    }

    #[test]
    fn events_survive_a_bincode_trip() -> anyhow::Result<()> {
        let evt = AggregatorEvent::from(DecryptionCompleted {
            request_id: 1,
            batch_id: 1,
            decrypted_sum: 5,
            total_samples: 100,
        });
        let decoded = AggregatorEvent::from_bytes(&evt.to_bytes()?)?;
        assert_eq!(decoded, evt);
        assert_eq!(decoded.event_id(), evt.event_id());
        Ok(())
    }

    #[test]
    fn only_integrity_violations_are_errors() {
        let alert = IntegrityViolation {
            request_id: 1,
            reason: IntegrityViolationReason::StateMismatch,
            message: "hash differs".to_string(),
        };
        assert_eq!(
            AggregatorEvent::from(alert.clone()).as_error(),
            Some(&alert)
        );
        assert!(AggregatorEvent::from(PausedSet { paused: true })
            .as_error()
            .is_none());
    }
}
