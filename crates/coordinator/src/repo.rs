// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use ciphersum_data::{Repositories, Repository};

use crate::CoordinatorState;

pub struct StoreKeys;

impl StoreKeys {
    pub fn coordinator() -> String {
        String::from("//coordinator")
    }
}

pub trait CoordinatorRepositoryFactory {
    fn coordinator(&self) -> Repository<CoordinatorState>;
}

impl CoordinatorRepositoryFactory for Repositories {
    fn coordinator(&self) -> Repository<CoordinatorState> {
        Repository::new(self.store.scope(StoreKeys::coordinator()))
    }
}
