//! One-time move of the flat legacy wallet prefs into the namespaced
//! `brave.wallet.keyrings.default` sub-tree.
//!
//! [`plan`] is a pure function of a [`LegacyPrefSnapshot`]; [`migrate_obsolete_prefs`]
//! reads the snapshot, applies the plan in a single keyring write and then
//! clears the legacy names, so a second run finds nothing to do. A salt,
//! nonce and ciphertext set with a member missing is never copied or
//! cleared.

use crate::{
    keyring::{hd_keyring, store},
    prefs::{names, PrefService},
};
use serde_json::Value;

pub const DEFAULT_FIRST_ACCOUNT_NAME: &str = "Account 1";

const LEGACY_NAMES: &[&str] = &[
    names::LEGACY_PASSWORD_ENCRYPTOR_SALT,
    names::LEGACY_PASSWORD_ENCRYPTOR_NONCE,
    names::LEGACY_ENCRYPTED_MNEMONIC,
    names::LEGACY_DEFAULT_KEYRING_ACCOUNT_NUM,
    names::LEGACY_ACCOUNT_NAMES,
    names::LEGACY_BACKUP_COMPLETE,
];

/// The legacy flat prefs as found on disk. Values of the wrong type read as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegacyPrefSnapshot {
    pub password_encryptor_salt: Option<String>,
    pub password_encryptor_nonce: Option<String>,
    pub encrypted_mnemonic: Option<String>,
    pub default_keyring_account_num: Option<u64>,
    pub account_names: Option<Vec<String>>,
    pub backup_complete: Option<bool>,
}

impl LegacyPrefSnapshot {
    pub fn read(prefs: &dyn PrefService) -> Self {
        let string = |name: &str| prefs.get_str(name).map(str::to_owned);
        Self {
            password_encryptor_salt: string(names::LEGACY_PASSWORD_ENCRYPTOR_SALT),
            password_encryptor_nonce: string(names::LEGACY_PASSWORD_ENCRYPTOR_NONCE),
            encrypted_mnemonic: string(names::LEGACY_ENCRYPTED_MNEMONIC),
            default_keyring_account_num: prefs
                .get(names::LEGACY_DEFAULT_KEYRING_ACCOUNT_NUM)
                .and_then(Value::as_u64),
            account_names: prefs
                .get(names::LEGACY_ACCOUNT_NAMES)
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_owned)
                        .collect()
                }),
            backup_complete: prefs
                .get(names::LEGACY_BACKUP_COMPLETE)
                .and_then(Value::as_bool),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn crypto_fields(&self) -> [(&'static str, bool); 3] {
        [
            (
                names::LEGACY_PASSWORD_ENCRYPTOR_SALT,
                self.password_encryptor_salt.is_some(),
            ),
            (
                names::LEGACY_PASSWORD_ENCRYPTOR_NONCE,
                self.password_encryptor_nonce.is_some(),
            ),
            (
                names::LEGACY_ENCRYPTED_MNEMONIC,
                self.encrypted_mnemonic.is_some(),
            ),
        ]
    }

    /// Legacy names of a salt/nonce/ciphertext triplet that is only partly
    /// present, split into `(present, missing)`. `None` when it is complete or absent.
    pub fn incomplete_crypto(&self) -> Option<(Vec<&'static str>, Vec<&'static str>)> {
        let (present, missing): (Vec<_>, Vec<_>) =
            self.crypto_fields().into_iter().partition(|(_, found)| *found);
        if present.is_empty() || missing.is_empty() {
            return None;
        }
        let labels = |fields: Vec<(&'static str, bool)>| -> Vec<&'static str> {
            fields.into_iter().map(|(name, _)| name).collect()
        };
        Some((labels(present), labels(missing)))
    }
}

/// Writes to perform under the default keyring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespacedPrefWrites {
    /// `(key, value)` pairs for the keyring sub-tree.
    pub values: Vec<(&'static str, Value)>,
    /// `(derivation path, account name)` entries for `account_metas`.
    pub account_metas: Vec<(String, String)>,
}

impl NamespacedPrefWrites {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.account_metas.is_empty()
    }
}

pub fn plan(snapshot: &LegacyPrefSnapshot) -> NamespacedPrefWrites {
    let mut out = NamespacedPrefWrites::default();

    let crypto = [
        (store::PASSWORD_ENCRYPTOR_SALT, &snapshot.password_encryptor_salt),
        (store::PASSWORD_ENCRYPTOR_NONCE, &snapshot.password_encryptor_nonce),
        (store::ENCRYPTED_MNEMONIC, &snapshot.encrypted_mnemonic),
    ];
    // Salt, nonce and ciphertext only make sense together.
    if crypto.iter().all(|(_, v)| v.is_some()) {
        for (key, value) in crypto {
            if let Some(v) = value {
                out.values.push((key, Value::String(v.clone())));
            }
        }
    }

    if snapshot.backup_complete == Some(true) {
        out.values.push((store::BACKUP_COMPLETE, Value::Bool(true)));
    }

    if snapshot.default_keyring_account_num.is_some() || snapshot.account_names.is_some() {
        out.account_metas = account_metas(
            snapshot.default_keyring_account_num.unwrap_or(0),
            snapshot.account_names.as_deref().unwrap_or_default(),
        );
    }
    out
}

fn account_metas(account_num: u64, account_names: &[String]) -> Vec<(String, String)> {
    let consistent = account_num > 0
        && usize::try_from(account_num).is_ok_and(|n| n == account_names.len());
    if !consistent {
        return vec![(
            hd_keyring::derivation_path(0),
            DEFAULT_FIRST_ACCOUNT_NAME.to_owned(),
        )];
    }
    (0_u32..)
        .zip(account_names)
        .map(|(i, name)| (hd_keyring::derivation_path(i), name.clone()))
        .collect()
}

/// Migrate legacy flat prefs into the default keyring. Returns whether anything was migrated.
pub fn migrate_obsolete_prefs(store: &mut store::KeyringStore) -> eyre::Result<bool> {
    let snapshot = LegacyPrefSnapshot::read(store.prefs());
    // An incomplete triplet cannot be migrated; its prefs stay where they are.
    let mut kept: Vec<&str> = vec![];
    if let Some((present, missing)) = snapshot.incomplete_crypto() {
        tracing::warn!(
            ?missing,
            ?present,
            "legacy wallet encryption prefs incomplete; leaving them in place"
        );
        kept = present;
    }
    let rest = LegacyPrefSnapshot {
        password_encryptor_salt: None,
        password_encryptor_nonce: None,
        encrypted_mnemonic: None,
        ..snapshot.clone()
    };
    if snapshot.is_empty() || (!kept.is_empty() && rest.is_empty()) {
        return Ok(false);
    }
    let writes = plan(&snapshot);
    if !writes.is_empty() {
        store.update_keyring(store::DEFAULT_KEYRING_ID, |keyring| {
            for (key, value) in writes.values {
                keyring.insert(key.to_owned(), value);
            }
            for (path, name) in &writes.account_metas {
                store::insert_account_meta(keyring, path, name);
            }
        })?;
    }
    let cleared: Vec<&str> = LEGACY_NAMES
        .iter()
        .copied()
        .filter(|name| !kept.contains(name))
        .collect();
    store.prefs_mut().clear_many(&cleared)?;
    tracing::info!(
        accounts = writes.account_metas.len(),
        "migrated legacy wallet prefs"
    );
    Ok(true)
}
