// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use crate::load_config::{find_in_parent, resolve_config_path, DEFAULT_CONFIG_NAME};
use alloy_primitives::Address;
use anyhow::{anyhow, bail, Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};
use tracing::info;

pub const ENV_PREFIX: &str = "CIPHERSUM_";

/// Address bound into every state hash unless the configuration names another
pub const DEFAULT_COORDINATOR_ADDRESS: Address = Address::with_last_byte(0xc0);

/// BFV parameter preset shared by submitters, the accumulator and the oracle
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BfvConfig {
    pub degree: usize,
    pub plaintext_modulus: u64,
    pub moduli: Vec<u64>,
}

impl Default for BfvConfig {
    fn default() -> Self {
        Self {
            degree: 2048,
            plaintext_modulus: 1032193,
            moduli: vec![0x3FFFFFFF000001],
        }
    }
}

/// Settings for the in-process decryption oracle
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct OracleConfig {
    /// Hex encoded secp256k1 key the local oracle signs results with
    pub signer_key: Option<String>,
    /// Only proofs recovered to this address are accepted
    pub verifier_address: Option<Address>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Name of this instance, used to scope the data dir
    pub name: String,
    /// Identity mixed into every decryption state hash
    pub coordinator_address: Address,
    /// Owner installed when no state has been persisted yet
    pub owner: Option<Address>,
    /// Minimum gap between two rate limited actions by the same caller
    pub cooldown_seconds: u64,
    /// Either an absolute path or a path relative to `{data_dir}/{name}`
    pub db_file: PathBuf,
    /// Keep all state in memory
    pub use_in_mem_store: bool,
    /// Defaults to `~/.local/share/ciphersum` on linux
    pub data_dir: Option<PathBuf>,
    pub oracle: OracleConfig,
    pub bfv: BfvConfig,
    /// The file this configuration was read from, if any
    #[serde(skip)]
    config_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "_default".to_string(),
            coordinator_address: DEFAULT_COORDINATOR_ADDRESS,
            owner: None,
            cooldown_seconds: 60,
            db_file: PathBuf::from("db"),
            use_in_mem_store: false,
            data_dir: None,
            oracle: OracleConfig::default(),
            bfv: BfvConfig::default(),
            config_file: None,
        }
    }
}

impl AppConfig {
    /// Reject configurations the coordinator cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.cooldown_seconds == 0 {
            bail!("cooldown_seconds must be greater than zero");
        }
        if self.coordinator_address == Address::ZERO {
            bail!("coordinator_address must not be the zero address");
        }
        if self.bfv.moduli.is_empty() {
            bail!("bfv.moduli must contain at least one modulus");
        }
        if !self.bfv.degree.is_power_of_two() {
            bail!("bfv.degree must be a power of two, got {}", self.bfv.degree);
        }
        if self.bfv.plaintext_modulus < 2 {
            bail!("bfv.plaintext_modulus must be at least 2");
        }
        Ok(())
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => OsDirs::data_dir(),
        }
    }

    /// Location of the sled database
    pub fn db_file(&self) -> Result<PathBuf> {
        if self.db_file.is_absolute() {
            return Ok(self.db_file.clone());
        }
        Ok(self.data_dir()?.join(&self.name).join(&self.db_file))
    }

    pub fn config_file(&self) -> Option<&PathBuf> {
        self.config_file.as_ref()
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Could not serialize configuration")
    }
}

/// Load configuration from defaults, the resolved yaml file and `CIPHERSUM_` env vars in that
/// order. Nested keys use a double underscore eg. `CIPHERSUM_ORACLE__SIGNER_KEY`.
pub fn load_config(cli_file: Option<String>) -> Result<AppConfig> {
    let cli_file = cli_file.map(PathBuf::from);
    let explicit = cli_file.is_some();

    let resolved = resolve_config_path(
        find_in_parent,
        env::current_dir()?,
        OsDirs::config_dir()?,
        DEFAULT_CONFIG_NAME,
        cli_file,
    );

    if explicit && !resolved.exists() {
        return Err(anyhow::Error::new(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", resolved.display()),
        ))
        .context("Configuration file not found"));
    }

    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
    let config_file = if resolved.exists() {
        info!("Using config file {}", resolved.display());
        figment = figment.merge(Yaml::file(&resolved));
        Some(resolved)
    } else {
        None
    };

    let mut config: AppConfig = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()
        .context("Could not parse configuration")?;

    config.config_file = config_file;
    config.validate()?;
    Ok(config)
}

pub struct OsDirs;
impl OsDirs {
    pub fn config_dir() -> Result<PathBuf> {
        Ok(dirs::config_dir()
            .ok_or(anyhow!("This OS does not provide a config dir"))?
            .join("ciphersum"))
    }

    pub fn data_dir() -> Result<PathBuf> {
        Ok(dirs::data_local_dir()
            .ok_or(anyhow!("This OS does not provide a data dir"))?
            .join("ciphersum"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_are_valid() -> Result<()> {
        let config = AppConfig::default();
        config.validate()?;
        assert_eq!(config.cooldown_seconds, 60);
        assert_eq!(config.bfv.degree, 2048);
        assert!(!config.use_in_mem_store);
        Ok(())
    }

    #[test]
    fn zero_cooldown_is_rejected() {
        let config = AppConfig {
            cooldown_seconds: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_coordinator_address_is_rejected() {
        assert_ne!(AppConfig::default().coordinator_address, Address::ZERO);
        let config = AppConfig {
            coordinator_address: Address::ZERO,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_cannot_set_zero_coordinator_address() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_NAME, "name: \"zero\"\n")?;
            jail.set_env(
                "CIPHERSUM_COORDINATOR_ADDRESS",
                "0x0000000000000000000000000000000000000000",
            );
            assert!(load_config(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn db_file_is_scoped_under_data_dir() -> Result<()> {
        let config = AppConfig {
            name: "alpha".to_string(),
            data_dir: Some(PathBuf::from("/var/ciphersum")),
            ..AppConfig::default()
        };
        assert_eq!(config.db_file()?, PathBuf::from("/var/ciphersum/alpha/db"));

        let absolute = AppConfig {
            db_file: PathBuf::from("/mnt/state.db"),
            ..config
        };
        assert_eq!(absolute.db_file()?, PathBuf::from("/mnt/state.db"));
        Ok(())
    }

    #[test]
    fn missing_explicit_file_is_not_found() -> Result<()> {
        let Err(err) = load_config(Some("/nope/ciphersum.config.yaml".to_string())) else {
            bail!("error expected");
        };
        let Some(e) = err.downcast_ref::<std::io::Error>() else {
            bail!("io error expected");
        };
        assert_eq!(e.kind(), std::io::ErrorKind::NotFound);
        Ok(())
    }

    #[test]
    fn yaml_then_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                DEFAULT_CONFIG_NAME,
                r#"
name: "round-one"
coordinator_address: "0x00000000000000000000000000000000000000c0"
owner: "0x0000000000000000000000000000000000000001"
cooldown_seconds: 30
use_in_mem_store: true
oracle:
  verifier_address: "0x00000000000000000000000000000000000000aa"
bfv:
  degree: 4096
"#,
            )?;
            jail.set_env("CIPHERSUM_COOLDOWN_SECONDS", "45");
            jail.set_env(
                "CIPHERSUM_ORACLE__SIGNER_KEY",
                "0x0101010101010101010101010101010101010101010101010101010101010101",
            );

            let config = load_config(None).map_err(|e| e.to_string())?;

            assert_eq!(config.name, "round-one");
            assert_eq!(config.coordinator_address, Address::with_last_byte(0xc0));
            assert_eq!(config.owner, Some(Address::with_last_byte(1)));
            assert_eq!(config.cooldown_seconds, 45);
            assert!(config.use_in_mem_store);
            assert_eq!(
                config.oracle.verifier_address,
                Some(Address::with_last_byte(0xaa))
            );
            assert!(config.oracle.signer_key.is_some());
            assert_eq!(config.bfv.degree, 4096);
            assert_eq!(config.bfv.plaintext_modulus, 1032193);
            assert!(config.config_file().is_some());
            Ok(())
        });
    }

    #[test]
    fn env_cannot_set_zero_cooldown() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_NAME, "name: \"zero\"\n")?;
            jail.set_env("CIPHERSUM_COOLDOWN_SECONDS", "0");
            assert!(load_config(None).is_err());
            Ok(())
        });
    }

    #[test]
    fn unknown_fields_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file(DEFAULT_CONFIG_NAME, "cooldown: 10\n")?;
            assert!(load_config(None).is_err());
            Ok(())
        });
    }
}
