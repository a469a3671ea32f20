// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use anyhow::Result;
use ciphersum_config::AppConfig;

pub fn execute(config: &AppConfig) -> Result<()> {
    match config.config_file() {
        Some(file) => println!("# {}", file.display()),
        None => println!("# defaults (no config file found)"),
    }
    print!("{}", config.to_yaml()?);
    Ok(())
}
