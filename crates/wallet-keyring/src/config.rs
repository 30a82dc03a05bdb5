use crate::paths::KeyringPaths;
use eyre::Context as _;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PASSWORD_KDF_ITERATIONS: u32 = 100_000;
pub const DEFAULT_MNEMONIC_WORDS: usize = 12;
pub const DEFAULT_AUTO_LOCK_MINUTES: u32 = 5;
/// Longest accepted auto-lock delay (one week).
pub const MAX_AUTO_LOCK_MINUTES: u32 = 7 * 24 * 60;

/// PBKDF2 rounds used by third-party vaults: the legacy count first, then the current one.
pub const LEGACY_VAULT_PBKDF2_ITERATIONS: u32 = 10_000;
pub const CURRENT_VAULT_PBKDF2_ITERATIONS: u32 = 600_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyringConfig {
    /// PBKDF2-HMAC-SHA256 rounds for newly sealed mnemonics.
    ///
    /// The count is stored with each keyring, so existing wallets keep
    /// unlocking with the rounds they were created under.
    pub password_kdf_iterations: u32,
    /// Word count of generated mnemonics (12, 15, 18, 21 or 24).
    pub mnemonic_words: usize,
    /// Idle minutes before the service locks the keyring. 0 disables auto-lock.
    pub auto_lock_minutes: u32,
    /// Ordered PBKDF2 candidates tried against external vaults that do not
    /// declare their own iteration count.
    pub importer_pbkdf2_iterations: Vec<u32>,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            password_kdf_iterations: DEFAULT_PASSWORD_KDF_ITERATIONS,
            mnemonic_words: DEFAULT_MNEMONIC_WORDS,
            auto_lock_minutes: DEFAULT_AUTO_LOCK_MINUTES,
            importer_pbkdf2_iterations: vec![
                LEGACY_VAULT_PBKDF2_ITERATIONS,
                CURRENT_VAULT_PBKDF2_ITERATIONS,
            ],
        }
    }
}

impl KeyringConfig {
    pub fn validate(&self) -> eyre::Result<()> {
        if self.password_kdf_iterations == 0 {
            eyre::bail!("password_kdf_iterations must be > 0");
        }
        if !matches!(self.mnemonic_words, 12 | 15 | 18 | 21 | 24) {
            eyre::bail!("mnemonic_words must be one of 12, 15, 18, 21, 24");
        }
        if self.auto_lock_minutes > MAX_AUTO_LOCK_MINUTES {
            eyre::bail!("auto_lock_minutes must be <= {MAX_AUTO_LOCK_MINUTES}");
        }
        if self.importer_pbkdf2_iterations.is_empty()
            || self.importer_pbkdf2_iterations.contains(&0)
        {
            eyre::bail!("importer_pbkdf2_iterations must list at least one non-zero count");
        }
        Ok(())
    }
}

/// Apply environment variable overrides to the config.
fn apply_env_overrides(cfg: &mut KeyringConfig) {
    fn env_u32(var: &str) -> Option<u32> {
        std::env::var(var).ok().and_then(|v| v.trim().parse().ok())
    }

    if let Some(n) = env_u32("WALLET_KEYRING_KDF_ITERATIONS") {
        if n > 0 {
            cfg.password_kdf_iterations = n;
        }
    }
    if let Some(m) = env_u32("WALLET_KEYRING_AUTO_LOCK_MINUTES") {
        if m <= MAX_AUTO_LOCK_MINUTES {
            cfg.auto_lock_minutes = m;
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(paths: &KeyringPaths) -> Self {
        Self {
            path: paths.config_file(),
        }
    }

    pub fn load_or_init_default(&self) -> eyre::Result<KeyringConfig> {
        let mut cfg = match crate::fsutil::read_to_string_if_exists(&self.path)? {
            Some(s) => toml::from_str(&s).context("parse config.toml")?,
            None => {
                let cfg = KeyringConfig::default();
                self.save(&cfg)?;
                cfg
            }
        };
        apply_env_overrides(&mut cfg);
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, cfg: &KeyringConfig) -> eyre::Result<()> {
        let s = toml::to_string_pretty(cfg).context("serialize config.toml")?;
        crate::fsutil::write_private_atomic(&self.path, s.as_bytes()).context("write config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_load_writes_defaults() -> eyre::Result<()> {
        let cfg_dir = tempfile::tempdir()?;
        let data_dir = tempfile::tempdir()?;
        let paths = KeyringPaths::from_dirs(
            cfg_dir.path().to_path_buf(),
            data_dir.path().to_path_buf(),
        );
        let store = ConfigStore::new(&paths);
        let cfg = store.load_or_init_default()?;
        assert_eq!(cfg.mnemonic_words, DEFAULT_MNEMONIC_WORDS);
        assert!(paths.config_file().exists());
        Ok(())
    }

    #[test]
    fn partial_toml_keeps_defaults_for_missing_fields() -> eyre::Result<()> {
        let cfg: KeyringConfig = toml::from_str("mnemonic_words = 24\n")?;
        assert_eq!(cfg.mnemonic_words, 24);
        assert_eq!(cfg.importer_pbkdf2_iterations, vec![10_000_u32, 600_000_u32]);
        cfg.validate()?;
        Ok(())
    }

    #[test]
    fn rejects_odd_word_counts() {
        let cfg = KeyringConfig {
            mnemonic_words: 13,
            ..KeyringConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
