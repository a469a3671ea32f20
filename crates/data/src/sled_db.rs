// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::{Get, Insert, Remove};
use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use sled::{Db, Tree};
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use tracing::info;

// One handle per db file per process; sled refuses a second open of the same path.
static SLED_CACHE: Lazy<Arc<Mutex<HashMap<PathBuf, Db>>>> =
    Lazy::new(|| Arc::new(Mutex::new(HashMap::new())));

fn get_or_open_db(path: &PathBuf) -> Result<Db> {
    let mut cache = SLED_CACHE
        .lock()
        .map_err(|_| anyhow!("sled cache lock poisoned"))?;
    if let Some(db) = cache.get(path) {
        return Ok(db.clone());
    }
    let db = sled::open(path).with_context(|| {
        format!(
            "Could not open database at path '{}'",
            path.to_string_lossy()
        )
    })?;
    if db.was_recovered() {
        info!("recovered db at: {:?}", path);
    } else {
        info!("created db at: {:?}", path);
    }
    cache.insert(path.clone(), db.clone());
    Ok(db)
}

pub struct SledDb {
    db: Tree,
}

impl SledDb {
    pub fn new(path: &PathBuf, tree: &str) -> Result<Self> {
        let db = get_or_open_db(path)?
            .open_tree(tree)
            .with_context(|| format!("Could not open tree '{}'", tree))?;
        Ok(Self { db })
    }

    /// Drop every cached handle so the files can be reopened or removed
    pub fn close_all_connections() {
        if let Ok(mut cache) = SLED_CACHE.lock() {
            cache.clear();
        }
    }

    pub fn insert(&mut self, msg: Insert) -> Result<()> {
        self.db
            .insert(msg.key(), msg.value().to_vec())
            .context("Could not insert data into db")?;
        Ok(())
    }

    pub fn remove(&mut self, msg: Remove) -> Result<()> {
        self.db
            .remove(msg.key())
            .context("Could not remove data from db")?;
        Ok(())
    }

    pub fn get(&self, event: Get) -> Result<Option<Vec<u8>>> {
        let key = event.key();
        let str_key = String::from_utf8_lossy(key).into_owned();
        let res = self
            .db
            .get(key)
            .with_context(|| format!("Failed to fetch {}", str_key))?;

        Ok(res.map(|v| v.to_vec()))
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush().context("Could not flush db")?;
        Ok(())
    }
}
