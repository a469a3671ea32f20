// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::Repository;
use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};

/// This trait enables the self type to report their state snapshot
pub trait Snapshot
where
    Self: Sized,
{
    /// The Snapshot should represent all the dynamic data managed within the Actor or Object
    ///
    /// The state must be serializable so that it can be stored as a value
    type Snapshot: Serialize + DeserializeOwned;

    /// Return the Snapshot object for the implementor
    fn snapshot(&self) -> Result<Self::Snapshot>;
}

/// This trait enables the self type to checkpoint its state
pub trait Checkpoint: Snapshot {
    /// Declare the Repository instance available on the object
    fn repository(&self) -> &Repository<Self::Snapshot>;

    /// Write the current snapshot to the repository
    fn checkpoint(&self) {
        let Ok(snapshot) = self.snapshot() else {
            return;
        };
        self.repository().write(&snapshot);
    }

    /// Remove the snapshot from the repository
    fn clear_checkpoint(&self) {
        self.repository().clear();
    }
}
