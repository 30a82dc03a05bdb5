//! Recover a mnemonic from another wallet extension's encrypted local storage.

mod storage;
mod vault;

pub use storage::{ExtensionStorage, ExternalWalletType};

use crate::{config::KeyringConfig, errors::ImportError};
use serde_json::Value;
use std::path::Path;
use zeroize::Zeroizing;

/// What a successful import hands to the keyring controller.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ImportInfo {
    pub mnemonic: Zeroizing<String>,
    pub is_legacy_crypto_wallets: bool,
    pub number_of_accounts: usize,
}

impl std::fmt::Debug for ImportInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportInfo")
            .field("is_legacy_crypto_wallets", &self.is_legacy_crypto_wallets)
            .field("number_of_accounts", &self.number_of_accounts)
            .finish_non_exhaustive()
    }
}

/// One-shot reader for a single extension's vault.
#[derive(Debug, Clone)]
pub struct ExternalWalletsImporter {
    wallet: ExternalWalletType,
    storage: Option<ExtensionStorage>,
    pbkdf2_candidates: Vec<u32>,
}

impl ExternalWalletsImporter {
    /// `storage` is `None` when the extension is not installed.
    pub fn new(
        wallet: ExternalWalletType,
        storage: Option<ExtensionStorage>,
        cfg: &KeyringConfig,
    ) -> Self {
        Self {
            wallet,
            storage,
            pbkdf2_candidates: cfg.importer_pbkdf2_iterations.clone(),
        }
    }

    pub fn from_storage_file(
        wallet: ExternalWalletType,
        path: &Path,
        cfg: &KeyringConfig,
    ) -> eyre::Result<Self> {
        Ok(Self::new(wallet, ExtensionStorage::load(path)?, cfg))
    }

    pub const fn is_external_wallet_installed(&self) -> bool {
        self.storage.is_some()
    }

    pub fn is_external_wallet_initialized(&self) -> bool {
        self.storage
            .as_ref()
            .and_then(ExtensionStorage::keyring_controller)
            .is_some()
    }

    pub fn get_import_info(&self, password: &str) -> Result<ImportInfo, ImportError> {
        let result = self.import(password);
        match &result {
            Ok(info) => tracing::info!(
                wallet = self.wallet.extension_id(),
                legacy = info.is_legacy_crypto_wallets,
                accounts = info.number_of_accounts,
                "external wallet vault decrypted"
            ),
            Err(e) => tracing::warn!(
                wallet = self.wallet.extension_id(),
                error = %e,
                "external wallet import failed"
            ),
        }
        result
    }

    fn import(&self, password: &str) -> Result<ImportInfo, ImportError> {
        if password.is_empty() {
            return Err(ImportError::PasswordError);
        }
        let kc = self
            .storage
            .as_ref()
            .and_then(ExtensionStorage::keyring_controller)
            .ok_or(ImportError::InternalError)?;

        let is_legacy_crypto_wallets = kc.contains_key("argonParams") || kc.contains_key("salt");
        let vault_password = if is_legacy_crypto_wallets {
            vault::legacy_vault_password(kc, password)?
        } else {
            Zeroizing::new(password.to_owned())
        };

        let vault_json = kc
            .get("vault")
            .and_then(Value::as_str)
            .ok_or(ImportError::JsonError)?;
        let encrypted = vault::EncryptedVault::parse(vault_json)?;

        let candidates = encrypted
            .iterations
            .map_or_else(|| self.pbkdf2_candidates.clone(), |n| vec![n]);
        let mut last_err = ImportError::PasswordError;
        for iterations in candidates {
            let payload = encrypted
                .decrypt(&vault_password, iterations)
                .and_then(|plaintext| vault::parse_payload(&plaintext));
            match payload {
                Ok(p) => {
                    return Ok(ImportInfo {
                        mnemonic: p.mnemonic,
                        is_legacy_crypto_wallets,
                        number_of_accounts: p.number_of_accounts,
                    })
                }
                Err(ImportError::PasswordError) => {}
                // Authenticated but unusable; keep trying, report this if nothing else works.
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const VAULT: &str = include_str!("../../tests/fixtures/metamask_vault.json");
    const VAULT_KEY_METADATA: &str =
        include_str!("../../tests/fixtures/metamask_vault_key_metadata.json");
    const VAULT_UTF8: &str = include_str!("../../tests/fixtures/metamask_vault_utf8.json");
    const LEGACY_VAULT: &str = include_str!("../../tests/fixtures/crypto_wallets_legacy_vault.json");

    const DRIP: &str = "drip caution abandon festival order clown oven regular absorb evidence crew where";
    const CUSHION: &str = "cushion pitch impact album daring marine much annual budget social clarify balance rose almost area busy among bring hidden bind later capable pulp laundry";

    /// Candidates without the 600k count, to keep wrong-password tests fast.
    fn fast_cfg() -> KeyringConfig {
        KeyringConfig {
            importer_pbkdf2_iterations: vec![10_000],
            ..KeyringConfig::default()
        }
    }

    fn importer(storage: &str, cfg: &KeyringConfig) -> eyre::Result<ExternalWalletsImporter> {
        Ok(ExternalWalletsImporter::new(
            ExternalWalletType::MetaMask,
            Some(ExtensionStorage::from_json_str(storage)?),
            cfg,
        ))
    }

    /// Replace the inner `vault` string of a fixture.
    fn with_vault(storage: &str, vault: Value) -> eyre::Result<String> {
        let mut root: Value = serde_json::from_str(storage)?;
        let slot = root
            .pointer_mut("/data/KeyringController/vault")
            .ok_or_else(|| eyre::eyre!("fixture has no vault"))?;
        *slot = Value::String(vault.to_string());
        Ok(root.to_string())
    }

    fn fixture_vault(storage: &str) -> eyre::Result<Value> {
        let root: Value = serde_json::from_str(storage)?;
        let s = root
            .pointer("/data/KeyringController/vault")
            .and_then(Value::as_str)
            .ok_or_else(|| eyre::eyre!("fixture has no vault"))?;
        Ok(serde_json::from_str(s)?)
    }

    #[test]
    fn imports_modern_vault() -> eyre::Result<()> {
        let info = importer(VAULT, &KeyringConfig::default())?.get_import_info("brave4ever")?;
        assert_eq!(info.mnemonic.as_str(), DRIP);
        assert!(!info.is_legacy_crypto_wallets);
        assert_eq!(info.number_of_accounts, 1);
        Ok(())
    }

    #[test]
    fn second_candidate_is_tried_after_the_first_fails() -> eyre::Result<()> {
        let cfg = KeyringConfig {
            importer_pbkdf2_iterations: vec![1_000, 10_000],
            ..KeyringConfig::default()
        };
        let info = importer(VAULT, &cfg)?.get_import_info("brave4ever")?;
        assert_eq!(info.mnemonic.as_str(), DRIP);
        Ok(())
    }

    #[test]
    fn declared_iterations_and_byte_mnemonic_drive_account_count() -> eyre::Result<()> {
        let info = importer(VAULT_KEY_METADATA, &fast_cfg())?.get_import_info("brave4ever")?;
        assert_eq!(info.mnemonic.as_str(), DRIP);
        assert_eq!(info.number_of_accounts, 3);
        Ok(())
    }

    #[test]
    fn non_ascii_mnemonic_round_trips() -> eyre::Result<()> {
        let info = importer(VAULT_UTF8, &fast_cfg())?.get_import_info("brave4ever")?;
        assert_eq!(
            info.mnemonic.as_str(),
            "あつかう　はんぶん　せっけん　ほうりつ　こうぎ　にあう　おしえる　くうそう　とっきゅう　しゅうり　けまり　きさく"
        );
        Ok(())
    }

    #[test]
    fn imports_legacy_crypto_wallets_vault() -> eyre::Result<()> {
        let info = importer(LEGACY_VAULT, &fast_cfg())?.get_import_info("bbbravey")?;
        assert!(info.is_legacy_crypto_wallets);
        assert_eq!(info.mnemonic.as_str(), CUSHION);
        assert_eq!(info.number_of_accounts, 2);
        Ok(())
    }

    #[test]
    fn password_errors() -> eyre::Result<()> {
        let imp = importer(VAULT, &fast_cfg())?;
        assert_eq!(imp.get_import_info("").err(), Some(ImportError::PasswordError));
        assert_eq!(
            imp.get_import_info("brave5ever").err(),
            Some(ImportError::PasswordError)
        );
        let legacy = importer(LEGACY_VAULT, &fast_cfg())?;
        assert_eq!(
            legacy.get_import_info("bbbravez").err(),
            Some(ImportError::PasswordError)
        );
        Ok(())
    }

    #[test]
    fn structural_json_errors() -> eyre::Result<()> {
        let mut vault = fixture_vault(VAULT)?;
        for field in ["iv", "salt", "data"] {
            let mut v = vault.clone();
            if let Some(o) = v.as_object_mut() {
                o.remove(field);
            }
            let imp = importer(&with_vault(VAULT, v)?, &fast_cfg())?;
            assert_eq!(
                imp.get_import_info("brave4ever").err(),
                Some(ImportError::JsonError),
                "missing {field}"
            );
        }

        if let Some(o) = vault.as_object_mut() {
            o.insert("data".into(), json!("***"));
        }
        let imp = importer(&with_vault(VAULT, vault)?, &fast_cfg())?;
        assert_eq!(imp.get_import_info("brave4ever").err(), Some(ImportError::JsonError));

        let not_json = json!({"data": {"KeyringController": {"vault": "{{{"}}}).to_string();
        let imp = importer(&not_json, &fast_cfg())?;
        assert_eq!(imp.get_import_info("brave4ever").err(), Some(ImportError::JsonError));
        Ok(())
    }

    #[test]
    fn legacy_shape_errors_are_internal() -> eyre::Result<()> {
        let mut root: Value = serde_json::from_str(LEGACY_VAULT)?;
        if let Some(t) = root.pointer_mut("/data/KeyringController/argonParams/type") {
            *t = json!(1);
        }
        let imp = importer(&root.to_string(), &fast_cfg())?;
        assert_eq!(imp.get_import_info("bbbravey").err(), Some(ImportError::InternalError));

        let mut root: Value = serde_json::from_str(LEGACY_VAULT)?;
        if let Some(kc) = root
            .pointer_mut("/data/KeyringController")
            .and_then(Value::as_object_mut)
        {
            kc.remove("salt");
        }
        let imp = importer(&root.to_string(), &fast_cfg())?;
        assert_eq!(imp.get_import_info("bbbravey").err(), Some(ImportError::InternalError));
        Ok(())
    }

    #[test]
    fn oversized_argon_params_are_refused_before_hashing() -> eyre::Result<()> {
        for (field, value) in [
            ("mem", json!(4_294_967_295_u64)),
            ("time", json!(1_000_000)),
            ("hashLen", json!(1 << 30)),
        ] {
            let mut root: Value = serde_json::from_str(LEGACY_VAULT)?;
            let slot = root
                .pointer_mut(&format!("/data/KeyringController/argonParams/{field}"))
                .ok_or_else(|| eyre::eyre!("fixture has no {field}"))?;
            *slot = value;
            let imp = importer(&root.to_string(), &fast_cfg())?;
            assert_eq!(
                imp.get_import_info("bbbravey").err(),
                Some(ImportError::InternalError),
                "{field}"
            );
        }
        Ok(())
    }

    #[test]
    fn presence_checks() -> eyre::Result<()> {
        let absent = ExternalWalletsImporter::new(ExternalWalletType::CryptoWallets, None, &fast_cfg());
        assert!(!absent.is_external_wallet_installed());
        assert!(!absent.is_external_wallet_initialized());
        assert_eq!(
            absent.get_import_info("bbbravey").err(),
            Some(ImportError::InternalError)
        );

        let empty = importer("{\"data\":{}}", &fast_cfg())?;
        assert!(empty.is_external_wallet_installed());
        assert!(!empty.is_external_wallet_initialized());

        assert!(importer(VAULT, &fast_cfg())?.is_external_wallet_initialized());
        Ok(())
    }
}
