use eyre::Context as _;
use serde_json::{Map, Value};
use std::path::Path;

/// Browser extensions whose local storage can be imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExternalWalletType {
    MetaMask,
    CryptoWallets,
}

impl ExternalWalletType {
    pub const fn extension_id(self) -> &'static str {
        match self {
            Self::MetaMask => "nkbihfbeogaeaoehlefnkodbefgpgknn",
            Self::CryptoWallets => "cjmkndjhnagcfbpiemnkdpomccnjblmj",
        }
    }
}

/// A snapshot of an extension's local storage: `{"data": {"KeyringController": {...}}}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionStorage {
    root: Value,
}

impl ExtensionStorage {
    pub const fn new(root: Value) -> Self {
        Self { root }
    }

    pub fn from_json_str(s: &str) -> eyre::Result<Self> {
        let root = serde_json::from_str(s).context("parse extension storage")?;
        Ok(Self::new(root))
    }

    /// Load a storage dump. A missing file means the extension is not installed.
    pub fn load(path: &Path) -> eyre::Result<Option<Self>> {
        crate::fsutil::read_to_string_if_exists(path)?
            .map(|s| Self::from_json_str(&s))
            .transpose()
    }

    pub fn keyring_controller(&self) -> Option<&Map<String, Value>> {
        self.root.get("data")?.get("KeyringController")?.as_object()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keyring_controller_requires_the_nested_object() {
        let present = ExtensionStorage::new(json!({"data": {"KeyringController": {"vault": "{}"}}}));
        assert!(present.keyring_controller().is_some());

        for root in [
            json!({}),
            json!({"data": {}}),
            json!({"data": {"KeyringController": "vault"}}),
            json!({"KeyringController": {}}),
        ] {
            assert!(ExtensionStorage::new(root).keyring_controller().is_none());
        }
    }

    #[test]
    fn missing_file_is_not_installed() -> eyre::Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(ExtensionStorage::load(&dir.path().join("absent.json"))?.is_none());

        let p = dir.path().join("storage.json");
        std::fs::write(&p, "{\"data\":{\"KeyringController\":{}}}")?;
        let loaded = ExtensionStorage::load(&p)?;
        assert!(loaded.is_some_and(|s| s.keyring_controller().is_some()));
        Ok(())
    }
}
