use crate::errors::KeyringError;
use alloy::signers::local::PrivateKeySigner;
use bip39::{Language, Mnemonic};
use bitcoin::bip32::{ChildNumber, DerivationPath, Xpriv};
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::Network;
use zeroize::Zeroizing;

/// BIP44 external chain for Ethereum; account `i` lives at `<prefix>/i`.
pub const ETH_DERIVATION_PREFIX: &str = "m/44'/60'/0'/0";

pub const LEGACY_MNEMONIC_WORDS: usize = 24;

pub fn derivation_path(index: u32) -> String {
    format!("{ETH_DERIVATION_PREFIX}/{index}")
}

pub fn index_from_path(path: &str) -> Option<u32> {
    path.strip_prefix(ETH_DERIVATION_PREFIX)?
        .strip_prefix('/')?
        .parse()
        .ok()
}

pub fn generate_mnemonic(words: usize) -> Result<Zeroizing<String>, KeyringError> {
    let mnemonic = Mnemonic::generate_in(Language::English, words)
        .map_err(|_e| KeyringError::InvalidMnemonic)?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

fn parse(phrase: &str) -> Result<Mnemonic, KeyringError> {
    Mnemonic::parse_in_normalized(Language::English, phrase.trim())
        .map_err(|_e| KeyringError::InvalidMnemonic)
}

/// Parse a hex private key, with or without a `0x` prefix.
pub fn parse_private_key_hex(s: &str) -> Result<Zeroizing<Vec<u8>>, KeyringError> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|_e| KeyringError::InvalidPrivateKey)?;
    if bytes.len() != 32 {
        return Err(KeyringError::InvalidPrivateKey);
    }
    Ok(Zeroizing::new(bytes))
}

/// Keys derived from one mnemonic along `m/44'/60'/0'/0/i`, plus accounts
/// imported from raw private keys.
pub struct HdKeyring {
    mnemonic: Zeroizing<String>,
    account_root: Xpriv,
    secp: Secp256k1<All>,
    accounts: Vec<PrivateKeySigner>,
    imported: Vec<PrivateKeySigner>,
}

impl std::fmt::Debug for HdKeyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HdKeyring")
            .field("accounts", &self.accounts.len())
            .field("imported", &self.imported.len())
            .finish_non_exhaustive()
    }
}

impl HdKeyring {
    pub fn from_mnemonic(phrase: &str) -> Result<Self, KeyringError> {
        let mnemonic = parse(phrase)?;
        let seed = Zeroizing::new(mnemonic.to_seed_normalized(""));
        Self::from_seed(&mnemonic, seed.as_ref())
    }

    /// Legacy Brave (Crypto Wallets) keyrings used the 24-word mnemonic's raw
    /// entropy as the BIP32 seed instead of the PBKDF2 seed.
    pub fn from_legacy_mnemonic(phrase: &str) -> Result<Self, KeyringError> {
        let mnemonic = parse(phrase)?;
        if mnemonic.word_count() != LEGACY_MNEMONIC_WORDS {
            return Err(KeyringError::InvalidMnemonic);
        }
        let entropy = Zeroizing::new(mnemonic.to_entropy());
        Self::from_seed(&mnemonic, &entropy)
    }

    fn from_seed(mnemonic: &Mnemonic, seed: &[u8]) -> Result<Self, KeyringError> {
        let secp = Secp256k1::new();
        let master =
            Xpriv::new_master(Network::Bitcoin, seed).map_err(|_e| KeyringError::InvalidMnemonic)?;
        let prefix: DerivationPath = ETH_DERIVATION_PREFIX
            .parse()
            .map_err(|_e| KeyringError::InvalidMnemonic)?;
        let account_root = master
            .derive_priv(&secp, &prefix)
            .map_err(|_e| KeyringError::InvalidMnemonic)?;

        Ok(Self {
            mnemonic: Zeroizing::new(mnemonic.to_string()),
            account_root,
            secp,
            accounts: vec![],
            imported: vec![],
        })
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    fn derive(&self, index: u32) -> Result<PrivateKeySigner, KeyringError> {
        let child = ChildNumber::from_normal_idx(index)
            .map_err(|_e| KeyringError::AccountIndexOutOfRange)?;
        let xpriv = self
            .account_root
            .derive_priv(&self.secp, &[child])
            .map_err(|_e| KeyringError::InvalidPrivateKey)?;
        let secret = Zeroizing::new(xpriv.private_key.secret_bytes());
        PrivateKeySigner::from_slice(secret.as_ref()).map_err(|_e| KeyringError::InvalidPrivateKey)
    }

    /// Derive the next `n` accounts; returns their addresses.
    pub fn add_accounts(&mut self, n: usize) -> Result<Vec<String>, KeyringError> {
        let mut derived = Vec::with_capacity(n);
        for _ in 0..n {
            let next = self.accounts.len().saturating_add(derived.len());
            let index = u32::try_from(next).map_err(|_e| KeyringError::AccountIndexOutOfRange)?;
            derived.push(self.derive(index)?);
        }
        let addresses = derived.iter().map(checksum_address).collect();
        self.accounts.extend(derived);
        Ok(addresses)
    }

    /// Drop HD accounts past `len`; used to undo an add whose persistence failed.
    pub fn truncate_accounts(&mut self, len: usize) {
        self.accounts.truncate(len);
    }

    pub fn accounts_number(&self) -> usize {
        self.accounts.len()
    }

    pub fn address(&self, index: usize) -> Option<String> {
        self.accounts.get(index).map(checksum_address)
    }

    pub fn addresses(&self) -> Vec<String> {
        self.accounts.iter().map(checksum_address).collect()
    }

    /// Derivation index of an HD account.
    pub fn index_of(&self, address: &str) -> Option<usize> {
        self.accounts
            .iter()
            .position(|s| checksum_address(s).eq_ignore_ascii_case(address))
    }

    pub fn private_key_for(&self, address: &str) -> Option<Zeroizing<Vec<u8>>> {
        let index = self.index_of(address)?;
        self.accounts
            .get(index)
            .map(|s| Zeroizing::new(s.to_bytes().to_vec()))
    }

    pub fn has_address(&self, address: &str) -> bool {
        self.index_of(address).is_some() || self.imported_index_of(address).is_some()
    }

    pub fn import_account(&mut self, private_key: &[u8]) -> Result<String, KeyringError> {
        let signer =
            PrivateKeySigner::from_slice(private_key).map_err(|_e| KeyringError::InvalidPrivateKey)?;
        let address = checksum_address(&signer);
        if self.has_address(&address) {
            return Err(KeyringError::DuplicateAccount(address));
        }
        self.imported.push(signer);
        Ok(address)
    }

    pub fn imported_accounts_number(&self) -> usize {
        self.imported.len()
    }

    pub fn imported_addresses(&self) -> Vec<String> {
        self.imported.iter().map(checksum_address).collect()
    }

    fn imported_index_of(&self, address: &str) -> Option<usize> {
        self.imported
            .iter()
            .position(|s| checksum_address(s).eq_ignore_ascii_case(address))
    }

    pub fn imported_private_key(&self, address: &str) -> Option<Zeroizing<Vec<u8>>> {
        let index = self.imported_index_of(address)?;
        self.imported
            .get(index)
            .map(|s| Zeroizing::new(s.to_bytes().to_vec()))
    }

    pub fn remove_imported_account(&mut self, address: &str) -> bool {
        match self.imported_index_of(address) {
            Some(index) => {
                self.imported.remove(index);
                true
            }
            None => false,
        }
    }
}

fn checksum_address(signer: &PrivateKeySigner) -> String {
    signer.address().to_checksum(None)
}
