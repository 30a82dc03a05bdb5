//! Wallet lifecycle for the default keyring.
//!
//! The controller is synchronous and owns an explicit tagged state. Every
//! public operation reports failure as `false` or an empty value and leaves
//! persisted and in-memory state as it found it; the reason goes to the log.
//! [`super::service::KeyringService`] runs it behind a single task queue.

use crate::{
    config::{KeyringConfig, DEFAULT_PASSWORD_KDF_ITERATIONS, MAX_AUTO_LOCK_MINUTES},
    errors::KeyringError,
    importer::ImportInfo,
    keyring::{
        hd_keyring::{self, HdKeyring},
        keystore_json, migration,
        password_encryptor::{random_nonce, random_salt, PasswordEncryptor},
        store::{
            self, decode_b64, encode_b64, ImportedAccountRecord, KeyringStore, BACKUP_COMPLETE,
            DEFAULT_KEYRING_ID, ENCRYPTED_MNEMONIC, IMPORTED_ACCOUNTS, LEGACY_BRAVE_WALLET,
            PASSWORD_ENCRYPTOR_ITERATIONS, PASSWORD_ENCRYPTOR_NONCE, PASSWORD_ENCRYPTOR_SALT,
        },
    },
    prefs::{names, PrefService},
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use zeroize::Zeroizing;

pub const MIN_STRONG_PASSWORD_LEN: usize = 7;

/// "Account N" for the account at zero-based `position`.
pub fn default_account_name(position: usize) -> String {
    format!("Account {}", position.saturating_add(1))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub address: String,
    pub name: String,
    pub is_imported: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyringInfo {
    pub id: String,
    pub is_default_keyring_created: bool,
    pub is_locked: bool,
    pub is_backed_up: bool,
    /// HD accounts by derivation index, then imported accounts in import order.
    /// Empty while locked.
    pub account_infos: Vec<AccountInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum KeyringEvent {
    KeyringCreated,
    KeyringRestored,
    KeyringReset,
    Locked,
    Unlocked,
    BackedUp,
    AccountsChanged,
    SelectedAccountChanged { address: Option<String> },
    AutoLockMinutesChanged { minutes: u32 },
}

#[derive(Debug)]
struct UnlockedKeyring {
    encryptor: PasswordEncryptor,
    keyring: HdKeyring,
}

#[derive(Debug)]
enum State {
    Uninitialized,
    Locked,
    Unlocked(Box<UnlockedKeyring>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Created,
    Restored,
}

#[derive(Debug)]
pub struct KeyringController {
    store: KeyringStore,
    config: KeyringConfig,
    state: State,
    events: Vec<KeyringEvent>,
}

fn logged<T>(operation: &'static str, result: eyre::Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(operation, error = %e, "keyring operation failed");
            None
        }
    }
}

fn account_path(position: usize) -> Result<String, KeyringError> {
    let index = u32::try_from(position).map_err(|_e| KeyringError::AccountIndexOutOfRange)?;
    Ok(hd_keyring::derivation_path(index))
}

fn default_metas(start: usize, count: usize) -> Result<Vec<(String, String)>, KeyringError> {
    (start..start.saturating_add(count))
        .map(|i| Ok((account_path(i)?, default_account_name(i))))
        .collect()
}

fn open_hd_keyring(mnemonic: &str, legacy: bool) -> Result<HdKeyring, KeyringError> {
    if legacy {
        HdKeyring::from_legacy_mnemonic(mnemonic)
    } else {
        HdKeyring::from_mnemonic(mnemonic)
    }
}

/// Encrypt an imported key under its own fresh nonce.
fn seal_imported_account(
    encryptor: &PasswordEncryptor,
    address: &str,
    private_key: &[u8],
    account_name: String,
) -> Result<ImportedAccountRecord, KeyringError> {
    let nonce = random_nonce();
    let ciphertext = encryptor.encrypt(private_key, &nonce)?;
    Ok(ImportedAccountRecord {
        account_name,
        account_address: address.to_owned(),
        encrypted_private_key: encode_b64(&ciphertext),
        encrypted_private_key_nonce: encode_b64(&nonce),
    })
}

fn open_imported_account(
    encryptor: &PasswordEncryptor,
    record: &ImportedAccountRecord,
) -> Result<Zeroizing<Vec<u8>>, KeyringError> {
    let malformed = || KeyringError::MalformedPref(IMPORTED_ACCOUNTS.to_owned());
    let ciphertext = decode_b64(&record.encrypted_private_key).ok_or_else(malformed)?;
    let nonce = decode_b64(&record.encrypted_private_key_nonce).ok_or_else(malformed)?;
    encryptor.decrypt(&ciphertext, &nonce)
}

fn append_imported_record(
    keyring_store: &mut KeyringStore,
    record: ImportedAccountRecord,
) -> eyre::Result<()> {
    let mut records = keyring_store.imported_accounts(DEFAULT_KEYRING_ID)?;
    records.push(record);
    keyring_store.set_imported_accounts(DEFAULT_KEYRING_ID, &records)
}

impl KeyringController {
    /// Wrap a pref store, migrating legacy flat prefs first.
    pub fn new(prefs: Box<dyn PrefService>, config: KeyringConfig) -> Self {
        let mut keyring_store = KeyringStore::new(prefs);
        if let Err(e) = migration::migrate_obsolete_prefs(&mut keyring_store) {
            tracing::warn!(error = %e, "legacy wallet pref migration failed");
        }
        let mut controller = Self {
            store: keyring_store,
            config,
            state: State::Uninitialized,
            events: vec![],
        };
        controller.state = controller.resting_state();
        controller
    }

    fn resting_state(&self) -> State {
        if self.is_default_keyring_created() {
            State::Locked
        } else {
            State::Uninitialized
        }
    }

    pub const fn config(&self) -> &KeyringConfig {
        &self.config
    }

    /// Events produced since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<KeyringEvent> {
        std::mem::take(&mut self.events)
    }

    pub const fn is_locked(&self) -> bool {
        !matches!(self.state, State::Unlocked(_))
    }

    pub fn is_default_keyring_created(&self) -> bool {
        self.store.has(ENCRYPTED_MNEMONIC, DEFAULT_KEYRING_ID)
    }

    pub fn is_wallet_backed_up(&self) -> bool {
        self.store.get_bool(BACKUP_COMPLETE, DEFAULT_KEYRING_ID)
    }

    pub fn is_strong_password(password: &str) -> bool {
        password.chars().count() >= MIN_STRONG_PASSWORD_LEN
            && password.chars().any(char::is_alphabetic)
            && password.chars().any(|c| c.is_ascii_digit())
            && password.chars().any(|c| !c.is_alphanumeric())
    }

    // ── Creation ────────────────────────────────────────────────────────

    /// New random mnemonic, one account. Returns the mnemonic for backup.
    pub fn create_wallet(&mut self, password: &str) -> Option<Zeroizing<String>> {
        let result = hd_keyring::generate_mnemonic(self.config.mnemonic_words)
            .map_err(eyre::Report::from)
            .and_then(|mnemonic| {
                self.install_mnemonic(&mnemonic, password, false, Origin::Created, 1)?;
                Ok(mnemonic)
            });
        logged("create_wallet", result)
    }

    pub fn create_default_keyring(&mut self, password: &str) -> bool {
        self.create_wallet(password).is_some()
    }

    /// Replace the default keyring with `mnemonic`. No accounts are derived.
    pub fn restore_wallet(
        &mut self,
        mnemonic: &str,
        password: &str,
        is_legacy_brave_wallet: bool,
    ) -> bool {
        let result = self.install_mnemonic(
            mnemonic,
            password,
            is_legacy_brave_wallet,
            Origin::Restored,
            0,
        );
        logged("restore_wallet", result).is_some()
    }

    /// Restore from an external wallet import and derive as many accounts as it had.
    pub fn restore_from_import_info(&mut self, info: &ImportInfo, password: &str) -> bool {
        let result = self.install_mnemonic(
            &info.mnemonic,
            password,
            info.is_legacy_crypto_wallets,
            Origin::Restored,
            info.number_of_accounts.max(1),
        );
        logged("restore_from_import_info", result).is_some()
    }

    fn install_mnemonic(
        &mut self,
        mnemonic: &str,
        password: &str,
        legacy: bool,
        origin: Origin,
        accounts: usize,
    ) -> eyre::Result<()> {
        if password.is_empty() {
            return Err(KeyringError::EmptyPassword.into());
        }
        let mut keyring = open_hd_keyring(mnemonic, legacy)?;
        let salt = random_salt();
        let nonce = random_nonce();
        let iterations = self.config.password_kdf_iterations;
        let encryptor = PasswordEncryptor::derive_from_password(password, &salt, iterations)?;
        let encrypted_mnemonic = encryptor.encrypt(keyring.mnemonic().as_bytes(), &nonce)?;
        keyring.add_accounts(accounts)?;
        let metas = default_metas(0, accounts)?;
        let imported = serde_json::to_value(self.carry_imported_accounts(&encryptor, &mut keyring)?)?;

        // Salt, rounds, nonce and ciphertext land in the same pref write.
        self.store.update_keyring(DEFAULT_KEYRING_ID, |k| {
            k.insert(
                PASSWORD_ENCRYPTOR_SALT.to_owned(),
                Value::String(encode_b64(&salt)),
            );
            k.insert(
                PASSWORD_ENCRYPTOR_NONCE.to_owned(),
                Value::String(encode_b64(&nonce)),
            );
            k.insert(
                PASSWORD_ENCRYPTOR_ITERATIONS.to_owned(),
                Value::from(iterations),
            );
            k.insert(
                ENCRYPTED_MNEMONIC.to_owned(),
                Value::String(encode_b64(&encrypted_mnemonic)),
            );
            k.insert(IMPORTED_ACCOUNTS.to_owned(), imported);
            k.insert(
                BACKUP_COMPLETE.to_owned(),
                Value::Bool(origin == Origin::Restored),
            );
            if legacy {
                k.insert(LEGACY_BRAVE_WALLET.to_owned(), Value::Bool(true));
            } else {
                k.remove(LEGACY_BRAVE_WALLET);
            }
            for (path, name) in &metas {
                store::insert_account_meta(k, path, name);
            }
        })?;

        self.state = State::Unlocked(Box::new(UnlockedKeyring { encryptor, keyring }));
        self.events.push(match origin {
            Origin::Created => KeyringEvent::KeyringCreated,
            Origin::Restored => KeyringEvent::KeyringRestored,
        });
        self.clear_stale_selection();
        tracing::info!(
            keyring_id = DEFAULT_KEYRING_ID,
            accounts,
            legacy,
            ?origin,
            "default keyring installed"
        );
        Ok(())
    }

    /// Imported keys survive a new mnemonic only if the old keyring is open
    /// to re-encrypt them; otherwise they are dropped.
    fn carry_imported_accounts(
        &self,
        encryptor: &PasswordEncryptor,
        keyring: &mut HdKeyring,
    ) -> eyre::Result<Vec<ImportedAccountRecord>> {
        let previous = self
            .store
            .imported_accounts(DEFAULT_KEYRING_ID)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding unreadable imported accounts");
                vec![]
            });
        let State::Unlocked(old) = &self.state else {
            if !previous.is_empty() {
                tracing::warn!(
                    count = previous.len(),
                    "keyring replaced while locked; dropping imported accounts"
                );
            }
            return Ok(vec![]);
        };

        let mut records = Vec::with_capacity(previous.len());
        for address in old.keyring.imported_addresses() {
            let Some(private_key) = old.keyring.imported_private_key(&address) else {
                continue;
            };
            if let Err(e) = keyring.import_account(&private_key) {
                tracing::warn!(%address, error = %e, "imported account dropped");
                continue;
            }
            let name = previous
                .iter()
                .find(|r| r.account_address.eq_ignore_ascii_case(&address))
                .map(|r| r.account_name.clone())
                .unwrap_or_default();
            records.push(seal_imported_account(encryptor, &address, &private_key, name)?);
        }
        Ok(records)
    }

    // ── Lock state ──────────────────────────────────────────────────────

    pub fn unlock(&mut self, password: &str) -> bool {
        match self.state {
            State::Uninitialized => {
                tracing::warn!("unlock requested before a keyring exists");
                return false;
            }
            State::Unlocked(_) => return self.validate_password(password),
            State::Locked => {}
        }
        match self.open_keyring(password) {
            Ok(unlocked) => {
                self.state = State::Unlocked(Box::new(unlocked));
                self.events.push(KeyringEvent::Unlocked);
                tracing::info!(keyring_id = DEFAULT_KEYRING_ID, "keyring unlocked");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "unlock failed");
                false
            }
        }
    }

    /// Persist any derived account that has no name entry yet, then drop the
    /// key material. No-op unless unlocked.
    pub fn lock(&mut self) {
        let State::Unlocked(u) = &self.state else {
            return;
        };
        let named: BTreeSet<String> = self
            .store
            .account_metas(DEFAULT_KEYRING_ID)
            .into_iter()
            .map(|m| m.path)
            .collect();
        let missing: Vec<(String, String)> = default_metas(0, u.keyring.accounts_number())
            .unwrap_or_default()
            .into_iter()
            .filter(|(path, _)| !named.contains(path))
            .collect();
        if !missing.is_empty() {
            let result = self.store.update_keyring(DEFAULT_KEYRING_ID, |k| {
                for (path, name) in &missing {
                    store::insert_account_meta(k, path, name);
                }
            });
            if let Err(e) = result {
                tracing::warn!(error = %e, "could not persist account count before locking");
            }
        }
        self.state = State::Locked;
        self.events.push(KeyringEvent::Locked);
        tracing::info!(keyring_id = DEFAULT_KEYRING_ID, "keyring locked");
    }

    pub fn validate_password(&self, password: &str) -> bool {
        self.decrypt_mnemonic(password).is_ok()
    }

    fn decrypt_mnemonic(
        &self,
        password: &str,
    ) -> Result<(PasswordEncryptor, Zeroizing<String>), KeyringError> {
        if password.is_empty() {
            return Err(KeyringError::EmptyPassword);
        }
        let (mut salt, mut nonce, mut ciphertext) = (vec![], vec![], vec![]);
        let id = DEFAULT_KEYRING_ID;
        if !(self.store.get_bytes(PASSWORD_ENCRYPTOR_SALT, id, Some(&mut salt))
            && self.store.get_bytes(PASSWORD_ENCRYPTOR_NONCE, id, Some(&mut nonce))
            && self.store.get_bytes(ENCRYPTED_MNEMONIC, id, Some(&mut ciphertext)))
        {
            return Err(KeyringError::NotCreated);
        }
        let encryptor =
            PasswordEncryptor::derive_from_password(password, &salt, self.sealed_iterations()?)?;
        let plaintext = encryptor.decrypt(&ciphertext, &nonce)?;
        let phrase = std::str::from_utf8(&plaintext).map_err(|_e| KeyringError::DecryptionFailed)?;
        Ok((encryptor, Zeroizing::new(phrase.to_owned())))
    }

    /// Rounds recorded next to the salt. Keyrings migrated from the flat
    /// layout predate the field and were sealed with the default.
    fn sealed_iterations(&self) -> Result<u32, KeyringError> {
        match self.store.get(PASSWORD_ENCRYPTOR_ITERATIONS, DEFAULT_KEYRING_ID) {
            None => Ok(DEFAULT_PASSWORD_KDF_ITERATIONS),
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .filter(|n| *n > 0)
                .ok_or_else(|| KeyringError::MalformedPref(PASSWORD_ENCRYPTOR_ITERATIONS.to_owned())),
        }
    }

    /// Highest named derivation index + 1.
    fn persisted_hd_account_count(&self) -> usize {
        self.store
            .account_metas(DEFAULT_KEYRING_ID)
            .iter()
            .filter_map(|m| hd_keyring::index_from_path(&m.path))
            .max()
            .and_then(|i| usize::try_from(i).ok())
            .map_or(0, |i| i.saturating_add(1))
    }

    fn open_keyring(&self, password: &str) -> eyre::Result<UnlockedKeyring> {
        let (encryptor, mnemonic) = self.decrypt_mnemonic(password)?;
        let legacy = self.store.get_bool(LEGACY_BRAVE_WALLET, DEFAULT_KEYRING_ID);
        let mut keyring = open_hd_keyring(&mnemonic, legacy)?;
        keyring.add_accounts(self.persisted_hd_account_count())?;
        // Every persisted imported key must come back, or the unlock fails.
        for record in self.store.imported_accounts(DEFAULT_KEYRING_ID)? {
            let private_key = open_imported_account(&encryptor, &record)?;
            keyring.import_account(&private_key)?;
        }
        Ok(UnlockedKeyring { encryptor, keyring })
    }

    // ── Accounts ────────────────────────────────────────────────────────

    pub fn add_account(&mut self, name: &str) -> bool {
        logged("add_account", self.add_named_accounts(vec![name.to_owned()])).is_some()
    }

    pub fn add_accounts_with_default_names(&mut self, count: usize) -> bool {
        let State::Unlocked(u) = &self.state else {
            tracing::warn!("add accounts while locked");
            return false;
        };
        let start = u.keyring.accounts_number();
        let labels = (start..start.saturating_add(count))
            .map(default_account_name)
            .collect();
        logged(
            "add_accounts_with_default_names",
            self.add_named_accounts(labels),
        )
        .is_some()
    }

    fn add_named_accounts(&mut self, labels: Vec<String>) -> eyre::Result<Vec<String>> {
        let State::Unlocked(u) = &mut self.state else {
            return Err(KeyringError::Locked.into());
        };
        if labels.iter().any(|n| n.trim().is_empty()) {
            eyre::bail!("account name must not be empty");
        }
        let start = u.keyring.accounts_number();
        let metas = (start..)
            .zip(labels)
            .map(|(i, name)| Ok((account_path(i)?, name)))
            .collect::<Result<Vec<_>, KeyringError>>()?;
        let addresses = u.keyring.add_accounts(metas.len())?;
        let persisted = self.store.update_keyring(DEFAULT_KEYRING_ID, |k| {
            for (path, name) in &metas {
                store::insert_account_meta(k, path, name);
            }
        });
        if let Err(e) = persisted {
            u.keyring.truncate_accounts(start);
            return Err(e);
        }
        self.events.push(KeyringEvent::AccountsChanged);
        Ok(addresses)
    }

    /// Import a hex private key. Returns the account address.
    pub fn import_account(&mut self, name: &str, private_key_hex: &str) -> Option<String> {
        logged("import_account", self.import_hex(name, private_key_hex))
    }

    fn import_hex(&mut self, name: &str, private_key_hex: &str) -> eyre::Result<String> {
        let private_key = hd_keyring::parse_private_key_hex(private_key_hex)?;
        self.import_private_key(name, &private_key)
    }

    /// Import the key held by a V3 keystore JSON. Returns the account address.
    pub fn import_account_from_json(
        &mut self,
        name: &str,
        password: &str,
        json: &str,
    ) -> Option<String> {
        logged(
            "import_account_from_json",
            self.import_keystore(name, password, json),
        )
    }

    fn import_keystore(&mut self, name: &str, password: &str, json: &str) -> eyre::Result<String> {
        // Check before running the keystore KDF.
        if self.is_locked() {
            return Err(KeyringError::Locked.into());
        }
        let private_key = keystore_json::decrypt_keystore(json, password)?;
        self.import_private_key(name, &private_key)
    }

    fn import_private_key(&mut self, name: &str, private_key: &[u8]) -> eyre::Result<String> {
        let State::Unlocked(u) = &mut self.state else {
            return Err(KeyringError::Locked.into());
        };
        if name.trim().is_empty() {
            eyre::bail!("account name must not be empty");
        }
        let address = u.keyring.import_account(private_key)?;
        let persisted = seal_imported_account(&u.encryptor, &address, private_key, name.to_owned())
            .map_err(eyre::Report::from)
            .and_then(|record| append_imported_record(&mut self.store, record));
        if let Err(e) = persisted {
            u.keyring.remove_imported_account(&address);
            return Err(e);
        }
        self.events.push(KeyringEvent::AccountsChanged);
        tracing::info!(%address, "account imported");
        Ok(address)
    }

    pub fn remove_imported_account(&mut self, address: &str) -> bool {
        logged("remove_imported_account", self.remove_imported(address)).is_some()
    }

    fn remove_imported(&mut self, address: &str) -> eyre::Result<()> {
        let State::Unlocked(u) = &mut self.state else {
            return Err(KeyringError::Locked.into());
        };
        let mut records = self.store.imported_accounts(DEFAULT_KEYRING_ID)?;
        let before = records.len();
        records.retain(|r| !r.account_address.eq_ignore_ascii_case(address));
        if address.is_empty() || records.len() == before {
            return Err(KeyringError::AccountNotFound(address.to_owned()).into());
        }
        self.store
            .set_imported_accounts(DEFAULT_KEYRING_ID, &records)?;
        u.keyring.remove_imported_account(address);
        self.events.push(KeyringEvent::AccountsChanged);
        self.clear_stale_selection();
        Ok(())
    }

    pub fn set_default_keyring_derived_account_name(&mut self, address: &str, name: &str) -> bool {
        logged(
            "set_default_keyring_derived_account_name",
            self.rename_derived(address, name),
        )
        .is_some()
    }

    fn rename_derived(&mut self, address: &str, name: &str) -> eyre::Result<()> {
        let State::Unlocked(u) = &self.state else {
            return Err(KeyringError::Locked.into());
        };
        if name.trim().is_empty() {
            eyre::bail!("account name must not be empty");
        }
        let position = u
            .keyring
            .index_of(address)
            .ok_or_else(|| KeyringError::AccountNotFound(address.to_owned()))?;
        self.store
            .set_account_meta(DEFAULT_KEYRING_ID, &account_path(position)?, name)?;
        self.events.push(KeyringEvent::AccountsChanged);
        Ok(())
    }

    pub fn set_default_keyring_imported_account_name(&mut self, address: &str, name: &str) -> bool {
        logged(
            "set_default_keyring_imported_account_name",
            self.rename_imported(address, name),
        )
        .is_some()
    }

    fn rename_imported(&mut self, address: &str, name: &str) -> eyre::Result<()> {
        if self.is_locked() {
            return Err(KeyringError::Locked.into());
        }
        if name.trim().is_empty() {
            eyre::bail!("account name must not be empty");
        }
        let mut records = self.store.imported_accounts(DEFAULT_KEYRING_ID)?;
        let record = records
            .iter_mut()
            .find(|r| !address.is_empty() && r.account_address.eq_ignore_ascii_case(address))
            .ok_or_else(|| KeyringError::AccountNotFound(address.to_owned()))?;
        name.clone_into(&mut record.account_name);
        self.store
            .set_imported_accounts(DEFAULT_KEYRING_ID, &records)?;
        self.events.push(KeyringEvent::AccountsChanged);
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub fn default_keyring_info(&self) -> KeyringInfo {
        let account_infos = match &self.state {
            State::Unlocked(u) => self.account_infos(&u.keyring),
            State::Locked | State::Uninitialized => vec![],
        };
        KeyringInfo {
            id: DEFAULT_KEYRING_ID.to_owned(),
            is_default_keyring_created: self.is_default_keyring_created(),
            is_locked: self.is_locked(),
            is_backed_up: self.is_wallet_backed_up(),
            account_infos,
        }
    }

    fn account_infos(&self, keyring: &HdKeyring) -> Vec<AccountInfo> {
        let metas: BTreeMap<String, String> = self
            .store
            .account_metas(DEFAULT_KEYRING_ID)
            .into_iter()
            .map(|m| (m.path, m.name))
            .collect();
        let records = self
            .store
            .imported_accounts(DEFAULT_KEYRING_ID)
            .unwrap_or_default();

        let derived = keyring.addresses().into_iter().enumerate().map(|(i, address)| {
            let name = account_path(i)
                .ok()
                .and_then(|p| metas.get(&p).cloned())
                .unwrap_or_else(|| default_account_name(i));
            AccountInfo {
                address,
                name,
                is_imported: false,
            }
        });
        let imported = keyring.imported_addresses().into_iter().map(|address| {
            let name = records
                .iter()
                .find(|r| r.account_address.eq_ignore_ascii_case(&address))
                .map(|r| r.account_name.clone())
                .unwrap_or_default();
            AccountInfo {
                address,
                name,
                is_imported: true,
            }
        });
        derived.chain(imported).collect()
    }

    /// Empty while locked.
    pub fn mnemonic_for_default_keyring(&self) -> Zeroizing<String> {
        match &self.state {
            State::Unlocked(u) => Zeroizing::new(u.keyring.mnemonic().to_owned()),
            State::Locked | State::Uninitialized => Zeroizing::default(),
        }
    }

    /// Lowercase hex without `0x`; empty when locked or unknown.
    pub fn private_key_for_imported_account(&self, address: &str) -> Zeroizing<String> {
        let State::Unlocked(u) = &self.state else {
            return Zeroizing::default();
        };
        u.keyring
            .imported_private_key(address)
            .map(|k| Zeroizing::new(hex::encode(k.as_slice())))
            .unwrap_or_default()
    }

    /// Lowercase hex without `0x`; empty when locked or unknown.
    pub fn private_key_for_default_keyring_account(&self, address: &str) -> Zeroizing<String> {
        let State::Unlocked(u) = &self.state else {
            return Zeroizing::default();
        };
        u.keyring
            .private_key_for(address)
            .map(|k| Zeroizing::new(hex::encode(k.as_slice())))
            .unwrap_or_default()
    }

    // ── Wallet settings ─────────────────────────────────────────────────

    /// Idempotent. Fails only when no keyring exists.
    pub fn notify_wallet_backup_complete(&mut self) -> bool {
        if !self.is_default_keyring_created() {
            tracing::warn!("backup complete without a keyring");
            return false;
        }
        if self.is_wallet_backed_up() {
            return true;
        }
        let result = self
            .store
            .set(BACKUP_COMPLETE, Value::Bool(true), DEFAULT_KEYRING_ID);
        logged("notify_wallet_backup_complete", result)
            .map(|()| self.events.push(KeyringEvent::BackedUp))
            .is_some()
    }

    pub fn selected_account(&self) -> Option<String> {
        self.store
            .prefs()
            .get_str(names::SELECTED_ACCOUNT)
            .map(str::to_owned)
    }

    pub fn set_selected_account(&mut self, address: &str) -> bool {
        let State::Unlocked(u) = &self.state else {
            tracing::warn!("select account while locked");
            return false;
        };
        let Some(canonical) = u
            .keyring
            .addresses()
            .into_iter()
            .chain(u.keyring.imported_addresses())
            .find(|a| a.eq_ignore_ascii_case(address))
        else {
            tracing::warn!(%address, "select unknown account");
            return false;
        };
        let result = self
            .store
            .prefs_mut()
            .set(names::SELECTED_ACCOUNT, Value::String(canonical.clone()));
        logged("set_selected_account", result)
            .map(|()| {
                self.events.push(KeyringEvent::SelectedAccountChanged {
                    address: Some(canonical),
                });
            })
            .is_some()
    }

    fn clear_stale_selection(&mut self) {
        let Some(selected) = self.selected_account() else {
            return;
        };
        let known = match &self.state {
            State::Unlocked(u) => u.keyring.has_address(&selected),
            State::Locked | State::Uninitialized => false,
        };
        if known {
            return;
        }
        match self.store.prefs_mut().clear(names::SELECTED_ACCOUNT) {
            Ok(()) => self
                .events
                .push(KeyringEvent::SelectedAccountChanged { address: None }),
            Err(e) => tracing::warn!(error = %e, "could not clear selected account"),
        }
    }

    pub fn auto_lock_minutes(&self) -> u32 {
        self.store
            .prefs()
            .get(names::AUTO_LOCK_MINUTES)
            .and_then(Value::as_u64)
            .and_then(|m| u32::try_from(m).ok())
            .filter(|m| (1..=MAX_AUTO_LOCK_MINUTES).contains(m))
            .unwrap_or(self.config.auto_lock_minutes)
    }

    pub fn set_auto_lock_minutes(&mut self, minutes: u32) -> bool {
        if !(1..=MAX_AUTO_LOCK_MINUTES).contains(&minutes) {
            tracing::warn!(minutes, "auto-lock minutes out of range");
            return false;
        }
        let result = self
            .store
            .prefs_mut()
            .set(names::AUTO_LOCK_MINUTES, Value::from(minutes));
        logged("set_auto_lock_minutes", result)
            .map(|()| {
                self.events
                    .push(KeyringEvent::AutoLockMinutesChanged { minutes });
            })
            .is_some()
    }

    // ── Maintenance ─────────────────────────────────────────────────────

    /// Wipe every keyring and the wallet-wide prefs tied to them. A failed
    /// wipe changes nothing, in memory or on disk.
    pub fn reset(&mut self) -> bool {
        if logged("reset", self.store.clear_all()).is_none() {
            return false;
        }
        self.state = self.resting_state();
        self.events.push(KeyringEvent::KeyringReset);
        tracing::info!("wallet reset");
        true
    }

    pub fn migrate_obsolete_prefs(&mut self) -> bool {
        let migrated = logged(
            "migrate_obsolete_prefs",
            migration::migrate_obsolete_prefs(&mut self.store),
        )
        .unwrap_or(false);
        if migrated && matches!(self.state, State::Uninitialized) {
            self.state = self.resting_state();
        }
        migrated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::{FailingPrefs, InMemoryPrefs};
    use serde_json::json;

    const PASSWORD: &str = "brave1234!";
    const DIVIDE: &str = "divide cruise upon flag harsh carbon filter merit once advice bright drive";
    const DIVIDE_0: &str = "0xf81229FE54D8a20fBc1e1e2a3451D1c7489437Db";
    const DIVIDE_1: &str = "0x00c0f72E601C31DEb7890612cB92Ac0Fb7090EB0";
    const IMPORTED_KEY: &str = "83f39ea7adbd0d74e6dec7f3dfaecc8f646566641a7ba2660f3011fc3570291c";
    const IMPORTED_ADDRESS: &str = "0x408d7Cd9eE0c2B72AB67Bd2ddFa5cc8483afed6A";

    fn test_config() -> KeyringConfig {
        KeyringConfig {
            password_kdf_iterations: 1_000,
            ..KeyringConfig::default()
        }
    }

    fn controller() -> KeyringController {
        KeyringController::new(Box::new(InMemoryPrefs::new()), test_config())
    }

    fn keyrings(c: &KeyringController) -> Option<Value> {
        c.store.prefs().get(names::KEYRINGS).cloned()
    }

    fn stored_b64(c: &KeyringController, key: &str) -> Option<String> {
        c.store
            .get(key, DEFAULT_KEYRING_ID)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }

    fn addresses(c: &KeyringController) -> Vec<String> {
        c.default_keyring_info()
            .account_infos
            .into_iter()
            .map(|a| a.address)
            .collect()
    }

    #[test]
    fn starts_uninitialized() {
        let c = controller();
        assert!(c.is_locked());
        assert!(!c.is_default_keyring_created());
        assert_eq!(c.default_keyring_info().account_infos, vec![]);
    }

    #[test]
    fn create_wallet_unlocks_with_one_account() -> eyre::Result<()> {
        let mut c = controller();
        let mnemonic = c
            .create_wallet(PASSWORD)
            .ok_or_else(|| eyre::eyre!("create_wallet failed"))?;
        assert_eq!(mnemonic.split_whitespace().count(), 12);
        assert!(!c.is_locked());
        assert!(c.is_default_keyring_created());
        assert!(!c.is_wallet_backed_up());
        assert_eq!(c.mnemonic_for_default_keyring().as_str(), mnemonic.as_str());

        let info = c.default_keyring_info();
        assert_eq!(info.account_infos.len(), 1);
        assert_eq!(
            info.account_infos.first().map(|a| a.name.as_str()),
            Some("Account 1")
        );
        assert_eq!(c.take_events(), vec![KeyringEvent::KeyringCreated]);
        Ok(())
    }

    #[test]
    fn create_wallet_with_empty_password_changes_nothing() {
        let mut c = controller();
        assert!(c.create_wallet("").is_none());
        assert!(!c.create_default_keyring(""));
        assert!(keyrings(&c).is_none());
        assert!(c.take_events().is_empty());
    }

    #[test]
    fn restore_rejects_empty_inputs_without_writing() {
        let mut c = controller();
        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        let before = keyrings(&c);
        assert!(!c.restore_wallet("", PASSWORD, false));
        assert!(!c.restore_wallet(DIVIDE, "", false));
        assert!(!c.restore_wallet("not a mnemonic", PASSWORD, false));
        assert_eq!(keyrings(&c), before);
    }

    #[test]
    fn restore_derives_no_accounts_and_regenerates_identity() {
        let mut c = controller();
        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        assert!(c.default_keyring_info().account_infos.is_empty());
        assert!(c.is_wallet_backed_up());
        let first = (
            stored_b64(&c, PASSWORD_ENCRYPTOR_SALT),
            stored_b64(&c, ENCRYPTED_MNEMONIC),
        );

        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        let second = (
            stored_b64(&c, PASSWORD_ENCRYPTOR_SALT),
            stored_b64(&c, ENCRYPTED_MNEMONIC),
        );
        assert_ne!(first, second);

        assert!(c.add_account("Main"));
        assert_eq!(addresses(&c), vec![DIVIDE_0]);
    }

    #[test]
    fn lock_unlock_round_trip_restores_accounts() {
        let mut c = controller();
        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        assert!(c.add_account("Main"));
        assert!(c.add_account("Savings"));
        assert!(c.import_account("Hot", IMPORTED_KEY).is_some());
        let before = c.default_keyring_info();

        c.lock();
        assert!(c.is_locked());
        assert!(c.default_keyring_info().account_infos.is_empty());
        assert!(c.mnemonic_for_default_keyring().is_empty());

        assert!(c.unlock(PASSWORD));
        assert_eq!(c.default_keyring_info(), before);
        assert_eq!(addresses(&c), vec![DIVIDE_0, DIVIDE_1, IMPORTED_ADDRESS]);
    }

    #[test]
    fn wrong_password_stays_locked_without_writes() {
        let mut c = controller();
        assert!(c.create_default_keyring(PASSWORD));
        c.lock();
        let before = keyrings(&c);
        assert!(!c.unlock("brave1234?"));
        assert!(!c.unlock(""));
        assert!(c.is_locked());
        assert_eq!(keyrings(&c), before);
        assert!(!c.validate_password("nope"));
        assert!(c.validate_password(PASSWORD));
    }

    #[test]
    fn unlock_uses_the_rounds_stored_with_the_keyring() -> eyre::Result<()> {
        let mut c = controller();
        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        assert!(c.add_account("Main"));
        c.lock();
        assert_eq!(
            c.store
                .get(PASSWORD_ENCRYPTOR_ITERATIONS, DEFAULT_KEYRING_ID)
                .and_then(Value::as_u64),
            Some(1_000)
        );

        c.config.password_kdf_iterations = 2_000;
        assert!(c.validate_password(PASSWORD));
        assert!(c.unlock(PASSWORD));
        assert_eq!(addresses(&c), vec![DIVIDE_0]);

        // Only keyrings sealed from now on pick up the new count.
        assert!(c.create_default_keyring(PASSWORD));
        c.lock();
        assert_eq!(c.sealed_iterations()?, 2_000);
        c.config.password_kdf_iterations = 1_000;
        assert!(c.unlock(PASSWORD));
        Ok(())
    }

    #[test]
    fn malformed_stored_rounds_fail_unlock() -> eyre::Result<()> {
        let mut c = controller();
        assert!(c.create_default_keyring(PASSWORD));
        c.lock();
        c.store
            .set(PASSWORD_ENCRYPTOR_ITERATIONS, json!(0), DEFAULT_KEYRING_ID)?;
        assert!(!c.unlock(PASSWORD));
        c.store
            .set(PASSWORD_ENCRYPTOR_ITERATIONS, json!("1000"), DEFAULT_KEYRING_ID)?;
        assert!(!c.unlock(PASSWORD));
        assert!(c.is_locked());
        Ok(())
    }

    #[test]
    fn lock_persists_unnamed_derived_accounts() {
        let mut c = controller();
        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        assert!(c.add_accounts_with_default_names(2));
        // Simulate a name entry lost from storage.
        assert!(c
            .store
            .update_keyring(DEFAULT_KEYRING_ID, |k| {
                k.remove(store::ACCOUNT_METAS);
            })
            .is_ok());
        c.lock();
        assert!(c.unlock(PASSWORD));
        let names: Vec<String> = c
            .default_keyring_info()
            .account_infos
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Account 1", "Account 2"]);
    }

    #[test]
    fn operations_fail_quietly_while_locked() {
        let mut c = controller();
        assert!(!c.add_account("x"));
        assert!(!c.unlock(PASSWORD));
        assert!(c.create_default_keyring(PASSWORD));
        c.lock();
        c.lock();

        assert!(!c.add_account("x"));
        assert!(!c.add_accounts_with_default_names(1));
        assert!(c.import_account("x", IMPORTED_KEY).is_none());
        assert!(c.import_account_from_json("x", "pw", "{}").is_none());
        assert!(!c.remove_imported_account(IMPORTED_ADDRESS));
        assert!(!c.set_default_keyring_derived_account_name(DIVIDE_0, "x"));
        assert!(!c.set_default_keyring_imported_account_name(IMPORTED_ADDRESS, "x"));
        assert!(!c.set_selected_account(DIVIDE_0));
        assert!(c.private_key_for_imported_account(IMPORTED_ADDRESS).is_empty());
        assert!(c.private_key_for_default_keyring_account(DIVIDE_0).is_empty());
    }

    #[test]
    fn import_export_and_remove() {
        let mut c = controller();
        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        assert!(c.add_account("Main"));
        assert_eq!(
            c.import_account("Hot", &format!("0x{IMPORTED_KEY}")).as_deref(),
            Some(IMPORTED_ADDRESS)
        );
        assert!(c.import_account("Again", IMPORTED_KEY).is_none());
        assert!(c.import_account("Bad", "0x1234").is_none());
        assert!(c.import_account("", IMPORTED_KEY).is_none());

        assert_eq!(
            c.private_key_for_imported_account(&IMPORTED_ADDRESS.to_lowercase())
                .as_str(),
            IMPORTED_KEY
        );
        assert_eq!(
            c.private_key_for_default_keyring_account(DIVIDE_0).as_str(),
            "919af8081ce2a02d9650bf3e10ffb6b7cbadbb1dca749122d7d982cdb6cbcc50"
        );
        assert!(c.private_key_for_imported_account(DIVIDE_0).is_empty());
        assert!(c.private_key_for_imported_account("").is_empty());
        assert!(c.private_key_for_default_keyring_account("0x12").is_empty());

        assert!(!c.remove_imported_account(""));
        assert!(!c.remove_imported_account(DIVIDE_0));
        assert!(c.remove_imported_account(IMPORTED_ADDRESS));
        assert!(!c.remove_imported_account(IMPORTED_ADDRESS));
        assert_eq!(addresses(&c), vec![DIVIDE_0]);
        assert_eq!(
            c.store.imported_accounts(DEFAULT_KEYRING_ID).ok().map(|r| r.len()),
            Some(0)
        );
    }

    #[test]
    fn imported_keys_use_distinct_nonces() -> eyre::Result<()> {
        let mut c = controller();
        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        assert!(c.import_account("A", IMPORTED_KEY).is_some());
        assert!(c
            .import_account(
                "B",
                "17c31fdade7d84f22462f398df300405a76fc11b1fe5a9e286dc8c3b0913e31d"
            )
            .is_some());
        let records = c.store.imported_accounts(DEFAULT_KEYRING_ID)?;
        let mut nonces: Vec<&str> = records
            .iter()
            .map(|r| r.encrypted_private_key_nonce.as_str())
            .collect();
        nonces.push(
            c.store
                .get(PASSWORD_ENCRYPTOR_NONCE, DEFAULT_KEYRING_ID)
                .and_then(Value::as_str)
                .unwrap_or_default(),
        );
        let unique: BTreeSet<&str> = nonces.iter().copied().collect();
        assert_eq!(unique.len(), 3);
        Ok(())
    }

    #[test]
    fn import_from_keystore_json() {
        let mut c = controller();
        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        let json = include_str!("../../tests/fixtures/keystore_v3_pbkdf2.json");
        assert!(c.import_account_from_json("Geth", "wrong", json).is_none());
        assert_eq!(
            c.import_account_from_json("Geth", "testpassword", json)
                .as_deref(),
            Some(IMPORTED_ADDRESS)
        );
    }

    #[test]
    fn recreate_quirk_keeps_metas_and_reencrypts_imports_when_unlocked() {
        let mut c = controller();
        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        assert!(c.add_accounts_with_default_names(3));
        assert!(c.import_account("Hot", IMPORTED_KEY).is_some());

        assert!(c.create_default_keyring("another1!"));
        let info = c.default_keyring_info();
        assert_eq!(info.account_infos.len(), 2);
        assert_eq!(
            info.account_infos.last().map(|a| (a.address.as_str(), a.name.as_str(), a.is_imported)),
            Some((IMPORTED_ADDRESS, "Hot", true))
        );
        assert_eq!(c.store.account_metas(DEFAULT_KEYRING_ID).len(), 3);

        c.lock();
        assert!(c.unlock("another1!"));
        assert_eq!(c.default_keyring_info().account_infos.len(), 4);
        assert_eq!(
            c.private_key_for_imported_account(IMPORTED_ADDRESS).as_str(),
            IMPORTED_KEY
        );
    }

    #[test]
    fn recreate_while_locked_purges_undecryptable_imports() {
        let mut c = controller();
        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        assert!(c.add_account("Main"));
        assert!(c.import_account("Hot", IMPORTED_KEY).is_some());
        c.lock();

        assert!(c.restore_wallet(DIVIDE, "different1!", false));
        assert!(c
            .store
            .imported_accounts(DEFAULT_KEYRING_ID)
            .is_ok_and(|r| r.is_empty()));
        c.lock();
        assert!(c.unlock("different1!"));
        assert_eq!(addresses(&c), vec![DIVIDE_0]);
    }

    #[test]
    fn reset_returns_to_first_run() {
        let mut c = controller();
        assert!(c.create_default_keyring(PASSWORD));
        let first = addresses(&c).into_iter().next().unwrap_or_default();
        assert!(c.set_selected_account(&first));
        assert!(c.set_auto_lock_minutes(30));
        assert!(c
            .store
            .prefs_mut()
            .set(names::SELECTED_NETWORK, json!("0x1"))
            .is_ok());

        assert!(c.reset());
        assert!(c.is_locked());
        assert!(!c.is_default_keyring_created());
        assert!(keyrings(&c).is_none());
        assert!(!c.store.prefs().has(names::SELECTED_NETWORK));
        assert!(!c.store.prefs().has(names::AUTO_LOCK_MINUTES));
        assert!(c.selected_account().is_none());
        assert!(c.mnemonic_for_default_keyring().is_empty());

        assert!(c.create_default_keyring(PASSWORD));
        assert_eq!(c.default_keyring_info().account_infos.len(), 1);
        assert!(!c.is_wallet_backed_up());
    }

    #[test]
    fn failed_reset_keeps_the_wallet() -> eyre::Result<()> {
        let mut c = controller();
        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        assert!(c.add_account("Main"));
        assert!(c.set_selected_account(DIVIDE_0));
        c.lock();

        let mut inner = InMemoryPrefs::new();
        for name in [names::KEYRINGS, names::SELECTED_ACCOUNT] {
            if let Some(v) = c.store.prefs().get(name) {
                inner.set(name, v.clone())?;
            }
        }
        // The second clear of the batch fails.
        let mut reopened =
            KeyringController::new(Box::new(FailingPrefs::new(inner, 2)), test_config());
        let before = keyrings(&reopened);
        assert!(!reopened.reset());
        assert_eq!(keyrings(&reopened), before);
        assert_eq!(reopened.selected_account().as_deref(), Some(DIVIDE_0));
        assert!(reopened.take_events().is_empty());
        assert!(reopened.unlock(PASSWORD));
        assert_eq!(addresses(&reopened), vec![DIVIDE_0]);
        Ok(())
    }

    #[test]
    fn backup_flag_is_idempotent() {
        let mut c = controller();
        assert!(!c.notify_wallet_backup_complete());
        assert!(c.create_default_keyring(PASSWORD));
        c.take_events();
        assert!(c.notify_wallet_backup_complete());
        assert!(c.notify_wallet_backup_complete());
        assert!(c.is_wallet_backed_up());
        assert_eq!(c.take_events(), vec![KeyringEvent::BackedUp]);
        c.lock();
        assert!(c.is_wallet_backed_up());
    }

    #[test]
    fn renames_require_known_accounts_and_names() {
        let mut c = controller();
        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        assert!(c.add_account("Main"));
        assert!(c.import_account("Hot", IMPORTED_KEY).is_some());

        assert!(c.set_default_keyring_derived_account_name(&DIVIDE_0.to_lowercase(), "Renamed"));
        assert!(!c.set_default_keyring_derived_account_name(DIVIDE_0, ""));
        assert!(!c.set_default_keyring_derived_account_name(IMPORTED_ADDRESS, "x"));
        assert!(c.set_default_keyring_imported_account_name(IMPORTED_ADDRESS, "Cold"));
        assert!(!c.set_default_keyring_imported_account_name(DIVIDE_0, "x"));
        assert!(!c.set_default_keyring_imported_account_name("", "x"));

        let names: Vec<String> = c
            .default_keyring_info()
            .account_infos
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Renamed", "Cold"]);
    }

    #[test]
    fn selection_and_auto_lock_settings() {
        let mut c = controller();
        assert_eq!(c.auto_lock_minutes(), test_config().auto_lock_minutes);
        assert!(!c.set_auto_lock_minutes(0));
        assert!(!c.set_auto_lock_minutes(MAX_AUTO_LOCK_MINUTES + 1));
        assert!(c.set_auto_lock_minutes(15));
        assert_eq!(c.auto_lock_minutes(), 15);

        assert!(c.restore_wallet(DIVIDE, PASSWORD, false));
        assert!(c.add_account("Main"));
        assert!(c.import_account("Hot", IMPORTED_KEY).is_some());
        assert!(!c.set_selected_account("0xdeadbeef"));
        assert!(c.set_selected_account(&IMPORTED_ADDRESS.to_lowercase()));
        assert_eq!(c.selected_account().as_deref(), Some(IMPORTED_ADDRESS));

        c.take_events();
        assert!(c.remove_imported_account(IMPORTED_ADDRESS));
        assert!(c.selected_account().is_none());
        assert_eq!(
            c.take_events(),
            vec![
                KeyringEvent::AccountsChanged,
                KeyringEvent::SelectedAccountChanged { address: None }
            ]
        );
    }

    #[test]
    fn strong_password_rules() {
        assert!(KeyringController::is_strong_password("brave1234!"));
        assert!(!KeyringController::is_strong_password("br1!"));
        assert!(!KeyringController::is_strong_password("bravebrave!"));
        assert!(!KeyringController::is_strong_password("1234567!"));
        assert!(!KeyringController::is_strong_password("brave1234"));
    }

    #[test]
    fn legacy_restore_survives_lock_cycle() {
        let cushion = "cushion pitch impact album daring marine much annual budget social clarify balance rose almost area busy among bring hidden bind later capable pulp laundry";
        let info = ImportInfo {
            mnemonic: Zeroizing::new(cushion.to_owned()),
            is_legacy_crypto_wallets: true,
            number_of_accounts: 2,
        };
        let mut c = controller();
        assert!(c.restore_from_import_info(&info, PASSWORD));
        let legacy = addresses(&c);
        assert_eq!(legacy.len(), 2);

        c.lock();
        assert!(c.unlock(PASSWORD));
        assert_eq!(addresses(&c), legacy);

        let mut modern = controller();
        assert!(modern.restore_wallet(cushion, PASSWORD, false));
        assert!(modern.add_accounts_with_default_names(2));
        assert_ne!(addresses(&modern), legacy);
    }

    #[test]
    fn legacy_flat_prefs_migrate_on_construction() -> eyre::Result<()> {
        let salt = random_salt();
        let nonce = random_nonce();
        // Flat-layout keyrings carry no round count and were sealed with the default.
        let encryptor =
            PasswordEncryptor::derive_from_password(PASSWORD, &salt, DEFAULT_PASSWORD_KDF_ITERATIONS)?;
        let ciphertext = encryptor.encrypt(DIVIDE.as_bytes(), &nonce)?;

        let mut prefs = InMemoryPrefs::new();
        prefs.set(names::LEGACY_PASSWORD_ENCRYPTOR_SALT, json!(encode_b64(&salt)))?;
        prefs.set(names::LEGACY_PASSWORD_ENCRYPTOR_NONCE, json!(encode_b64(&nonce)))?;
        prefs.set(names::LEGACY_ENCRYPTED_MNEMONIC, json!(encode_b64(&ciphertext)))?;
        prefs.set(names::LEGACY_DEFAULT_KEYRING_ACCOUNT_NUM, json!(2))?;
        prefs.set(names::LEGACY_ACCOUNT_NAMES, json!(["Main", "Second"]))?;

        let mut c = KeyringController::new(Box::new(prefs), test_config());
        assert!(c.is_default_keyring_created());
        assert!(c.is_locked());
        assert!(!c.migrate_obsolete_prefs());
        assert!(c.unlock(PASSWORD));
        let info = c.default_keyring_info();
        let got: Vec<(&str, &str)> = info
            .account_infos
            .iter()
            .map(|a| (a.address.as_str(), a.name.as_str()))
            .collect();
        assert_eq!(got, vec![(DIVIDE_0, "Main"), (DIVIDE_1, "Second")]);
        Ok(())
    }
}
