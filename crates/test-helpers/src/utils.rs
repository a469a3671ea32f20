// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use alloy_primitives::Address;
use ciphersum_events::{AggregatorEvent, Event};
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Short deterministic address, `0x00..0n`
pub fn addr(n: u8) -> Address {
    Address::with_last_byte(n)
}

/// Variant names of a slice of events in order
pub fn event_types(events: &[AggregatorEvent]) -> Vec<String> {
    events.iter().map(|e| e.event_type()).collect()
}

static TRACING: Once = Once::new();

/// Install a fmt subscriber once per test binary
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .with(tracing_subscriber::filter::LevelFilter::from_level(
                Level::INFO,
            ))
            .try_init();
    });
}
