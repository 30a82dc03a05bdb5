//! Flat preference store the keyring persists into.
//!
//! Pref names are dotted strings registered by the embedding application;
//! they are opaque keys here, not paths into nested objects.

mod file;

pub use file::JsonFilePrefs;

use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub mod names {
    /// Dict keyed by keyring id; each entry is that keyring's sub-tree.
    pub const KEYRINGS: &str = "brave.wallet.keyrings";
    pub const SELECTED_ACCOUNT: &str = "brave.wallet.selected_account";
    pub const AUTO_LOCK_MINUTES: &str = "brave.wallet.auto_lock_minutes";
    pub const CUSTOM_NETWORKS: &str = "brave.wallet.custom_networks";
    pub const SELECTED_NETWORK: &str = "brave.wallet.selected_network";

    // Flat pre-namespacing layout, read once by the migration.
    pub const LEGACY_PASSWORD_ENCRYPTOR_SALT: &str = "brave.wallet.password_encryptor_salt";
    pub const LEGACY_PASSWORD_ENCRYPTOR_NONCE: &str = "brave.wallet.password_encryptor_nonce";
    pub const LEGACY_ENCRYPTED_MNEMONIC: &str = "brave.wallet.encrypted_mnemonic";
    pub const LEGACY_DEFAULT_KEYRING_ACCOUNT_NUM: &str = "brave.wallet.default_keyring_account_num";
    pub const LEGACY_ACCOUNT_NAMES: &str = "brave.wallet.account_names";
    pub const LEGACY_BACKUP_COMPLETE: &str = "brave.wallet.wallet_backup_complete";

    /// Global prefs wiped together with the keyrings on reset.
    pub const RESET_GLOBALS: &[&str] = &[
        SELECTED_ACCOUNT,
        AUTO_LOCK_MINUTES,
        CUSTOM_NETWORKS,
        SELECTED_NETWORK,
    ];
}

/// Synchronous key/value preference backend.
pub trait PrefService: Send {
    fn get(&self, name: &str) -> Option<&Value>;

    fn set(&mut self, name: &str, value: Value) -> eyre::Result<()>;

    fn clear(&mut self, name: &str) -> eyre::Result<()>;

    /// Clear several prefs as one change: on error every pref keeps its value.
    ///
    /// The default clears one by one and puts back what it removed when a
    /// later clear fails. Backends that can persist a batch should override it.
    fn clear_many(&mut self, names: &[&str]) -> eyre::Result<()> {
        let mut removed: Vec<(&str, Value)> = vec![];
        for name in names {
            let Some(previous) = self.get(name).cloned() else {
                continue;
            };
            if let Err(e) = self.clear(name) {
                for (name, value) in removed.into_iter().rev() {
                    if let Err(restore) = self.set(name, value) {
                        tracing::warn!(pref = name, error = %restore, "could not restore pref");
                    }
                }
                return Err(e);
            }
            removed.push((*name, previous));
        }
        Ok(())
    }

    fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn get_dict(&self, name: &str) -> Option<&Map<String, Value>> {
        self.get(name).and_then(Value::as_object)
    }

    fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPrefs {
    values: BTreeMap<String, Value>,
}

impl InMemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrefService for InMemoryPrefs {
    fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    fn set(&mut self, name: &str, value: Value) -> eyre::Result<()> {
        self.values.insert(name.to_owned(), value);
        Ok(())
    }

    fn clear(&mut self, name: &str) -> eyre::Result<()> {
        self.values.remove(name);
        Ok(())
    }
}

impl<P: PrefService + ?Sized> PrefService for Box<P> {
    fn get(&self, name: &str) -> Option<&Value> {
        (**self).get(name)
    }

    fn set(&mut self, name: &str, value: Value) -> eyre::Result<()> {
        (**self).set(name, value)
    }

    fn clear(&mut self, name: &str) -> eyre::Result<()> {
        (**self).clear(name)
    }

    fn clear_many(&mut self, names: &[&str]) -> eyre::Result<()> {
        (**self).clear_many(names)
    }
}

/// In-memory prefs whose `fail_on`-th write (1-based, `set` or `clear`) errors.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingPrefs {
    inner: InMemoryPrefs,
    fail_on: usize,
    writes: usize,
}

#[cfg(test)]
impl FailingPrefs {
    pub(crate) fn new(inner: InMemoryPrefs, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            writes: 0,
        }
    }

    fn count_write(&mut self) -> eyre::Result<()> {
        self.writes = self.writes.saturating_add(1);
        if self.writes == self.fail_on {
            eyre::bail!("write {} refused", self.writes);
        }
        Ok(())
    }
}

#[cfg(test)]
impl PrefService for FailingPrefs {
    fn get(&self, name: &str) -> Option<&Value> {
        self.inner.get(name)
    }

    fn set(&mut self, name: &str, value: Value) -> eyre::Result<()> {
        self.count_write()?;
        self.inner.set(name, value)
    }

    fn clear(&mut self, name: &str) -> eyre::Result<()> {
        self.count_write()?;
        self.inner.clear(name)
    }
}
