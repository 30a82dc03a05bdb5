//! Keyring-namespaced facade over the flat pref store.
//!
//! Every keyring lives under `brave.wallet.keyrings.<keyring_id>`; values in
//! that sub-tree are addressed by `(key, keyring_id)`. Binary values are
//! stored as standard base64 strings.

use crate::{
    errors::KeyringError,
    keyring::hd_keyring,
    prefs::{names, PrefService},
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_KEYRING_ID: &str = "default";

pub const PASSWORD_ENCRYPTOR_SALT: &str = "password_encryptor_salt";
pub const PASSWORD_ENCRYPTOR_NONCE: &str = "password_encryptor_nonce";
/// PBKDF2 rounds the mnemonic was sealed with. Absent on migrated legacy keyrings.
pub const PASSWORD_ENCRYPTOR_ITERATIONS: &str = "password_encryptor_iterations";
pub const ENCRYPTED_MNEMONIC: &str = "encrypted_mnemonic";
pub const BACKUP_COMPLETE: &str = "backup_complete";
pub const ACCOUNT_METAS: &str = "account_metas";
pub const ACCOUNT_NAME: &str = "account_name";
pub const IMPORTED_ACCOUNTS: &str = "imported_accounts";
/// Set when the mnemonic must be expanded with the legacy entropy seed.
pub const LEGACY_BRAVE_WALLET: &str = "legacy_brave_wallet";

/// One entry of `imported_accounts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedAccountRecord {
    #[serde(default)]
    pub account_name: String,
    pub account_address: String,
    /// base64 ciphertext of the raw private key.
    pub encrypted_private_key: String,
    /// base64 nonce the key was sealed under.
    pub encrypted_private_key_nonce: String,
}

/// An HD account name keyed by its derivation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountMeta {
    pub path: String,
    pub name: String,
}

pub struct KeyringStore {
    prefs: Box<dyn PrefService>,
}

impl std::fmt::Debug for KeyringStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringStore").finish_non_exhaustive()
    }
}

impl KeyringStore {
    pub fn new(prefs: Box<dyn PrefService>) -> Self {
        Self { prefs }
    }

    pub fn prefs(&self) -> &dyn PrefService {
        self.prefs.as_ref()
    }

    pub fn prefs_mut(&mut self) -> &mut dyn PrefService {
        self.prefs.as_mut()
    }

    fn keyring_dict(&self, keyring_id: &str) -> Option<&Map<String, Value>> {
        self.prefs
            .get_dict(names::KEYRINGS)?
            .get(keyring_id)?
            .as_object()
    }

    pub fn keyring_ids(&self) -> Vec<String> {
        self.prefs
            .get_dict(names::KEYRINGS)
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str, keyring_id: &str) -> Option<&Value> {
        self.keyring_dict(keyring_id)?.get(key)
    }

    pub fn has(&self, key: &str, keyring_id: &str) -> bool {
        self.get(key, keyring_id).is_some()
    }

    /// Apply `f` to a copy of the keyring's sub-tree and write it back in one pref write.
    pub fn update_keyring(
        &mut self,
        keyring_id: &str,
        f: impl FnOnce(&mut Map<String, Value>),
    ) -> eyre::Result<()> {
        let mut keyrings = self
            .prefs
            .get_dict(names::KEYRINGS)
            .cloned()
            .unwrap_or_default();
        let mut keyring = keyrings
            .remove(keyring_id)
            .and_then(|v| match v {
                Value::Object(m) => Some(m),
                _ => None,
            })
            .unwrap_or_default();
        f(&mut keyring);
        keyrings.insert(keyring_id.to_owned(), Value::Object(keyring));
        self.prefs.set(names::KEYRINGS, Value::Object(keyrings))
    }

    pub fn set(&mut self, key: &str, value: Value, keyring_id: &str) -> eyre::Result<()> {
        self.update_keyring(keyring_id, |k| {
            k.insert(key.to_owned(), value);
        })
    }

    /// Decode a base64 pref into `out`, replacing its contents.
    ///
    /// Returns false and leaves `out` untouched when there is no destination,
    /// the pref is absent, not a string, or not valid base64.
    pub fn get_bytes(&self, key: &str, keyring_id: &str, out: Option<&mut Vec<u8>>) -> bool {
        let Some(out) = out else {
            return false;
        };
        let Some(encoded) = self.get(key, keyring_id).and_then(Value::as_str) else {
            return false;
        };
        let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
            return false;
        };
        *out = decoded;
        true
    }

    pub fn set_bytes(&mut self, key: &str, bytes: &[u8], keyring_id: &str) -> eyre::Result<()> {
        self.set(key, Value::String(encode_b64(bytes)), keyring_id)
    }

    pub fn get_bool(&self, key: &str, keyring_id: &str) -> bool {
        self.get(key, keyring_id)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// HD account names, ordered by derivation index.
    pub fn account_metas(&self, keyring_id: &str) -> Vec<AccountMeta> {
        let Some(metas) = self.get(ACCOUNT_METAS, keyring_id).and_then(Value::as_object) else {
            return vec![];
        };
        let mut out: Vec<(u32, AccountMeta)> = metas
            .iter()
            .filter_map(|(path, meta)| {
                let index = hd_keyring::index_from_path(path)?;
                let name = meta.get(ACCOUNT_NAME)?.as_str()?.to_owned();
                Some((
                    index,
                    AccountMeta {
                        path: path.clone(),
                        name,
                    },
                ))
            })
            .collect();
        out.sort_by_key(|(index, _)| *index);
        out.into_iter().map(|(_, meta)| meta).collect()
    }

    pub fn set_account_meta(&mut self, keyring_id: &str, path: &str, name: &str) -> eyre::Result<()> {
        self.update_keyring(keyring_id, |k| {
            insert_account_meta(k, path, name);
        })
    }

    pub fn imported_accounts(
        &self,
        keyring_id: &str,
    ) -> Result<Vec<ImportedAccountRecord>, KeyringError> {
        match self.get(IMPORTED_ACCOUNTS, keyring_id) {
            None => Ok(vec![]),
            Some(v) => serde_json::from_value(v.clone())
                .map_err(|_e| KeyringError::MalformedPref(IMPORTED_ACCOUNTS.to_owned())),
        }
    }

    pub fn set_imported_accounts(
        &mut self,
        keyring_id: &str,
        accounts: &[ImportedAccountRecord],
    ) -> eyre::Result<()> {
        let v = serde_json::to_value(accounts)?;
        self.set(IMPORTED_ACCOUNTS, v, keyring_id)
    }

    /// Drop every keyring and the wallet-wide prefs that depend on them, all
    /// or nothing.
    pub fn clear_all(&mut self) -> eyre::Result<()> {
        let mut batch = vec![names::KEYRINGS];
        batch.extend_from_slice(names::RESET_GLOBALS);
        self.prefs.clear_many(&batch)
    }
}

pub fn encode_b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn decode_b64(s: &str) -> Option<Vec<u8>> {
    base64::engine::general_purpose::STANDARD.decode(s).ok()
}

pub(crate) fn insert_account_meta(keyring: &mut Map<String, Value>, path: &str, name: &str) {
    let metas = keyring
        .entry(ACCOUNT_METAS)
        .or_insert_with(|| Value::Object(Map::new()));
    if !metas.is_object() {
        *metas = Value::Object(Map::new());
    }
    if let Value::Object(m) = metas {
        let mut meta = Map::new();
        meta.insert(ACCOUNT_NAME.to_owned(), Value::String(name.to_owned()));
        m.insert(path.to_owned(), Value::Object(meta));
    }
}
