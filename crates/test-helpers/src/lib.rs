// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

mod mock_oracle;
mod system;
mod utils;
mod verifiers;

pub use mock_oracle::*;
pub use system::*;
pub use utils::*;
pub use verifiers::*;
