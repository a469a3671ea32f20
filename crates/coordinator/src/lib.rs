// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod access;
mod batch;
mod clock;
mod coordinator;
mod decryption;
mod error;
mod oracle;
mod rate_limiter;
mod repo;
mod state;

pub use access::*;
pub use batch::*;
pub use clock::*;
pub use coordinator::*;
pub use decryption::*;
pub use error::*;
pub use oracle::*;
pub use rate_limiter::*;
pub use repo::*;
pub use state::*;
