//! Decoding of extension vaults.
//!
//! `vault` is a JSON string `{data, iv, salt[, keyMetadata]}`, all base64,
//! where `data` is AES-256-GCM ciphertext and tag under a PBKDF2-HMAC-SHA256
//! key. Crypto Wallets additionally stretched the user password with Argon2id
//! and used the hex digest as the vault password.

use crate::{errors::ImportError, keyring::password_encryptor::PasswordEncryptor};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{Map, Value};
use zeroize::Zeroizing;

const HD_KEY_TREE: &str = "HD Key Tree";
const ARGON2ID_TYPE: u64 = 2;
const DEFAULT_NUMBER_OF_ACCOUNTS: usize = 1;

// Ceilings for parameters read from a vault we did not write. Anything
// above them is rejected before a KDF runs or an account is derived.
const MAX_VAULT_PBKDF2_ITERATIONS: u32 = 10_000_000;
const MAX_NUMBER_OF_ACCOUNTS: usize = 1_000;
/// 1 GiB, in KiB.
const MAX_ARGON2_MEMORY_KIB: u32 = 1 << 20;
const MAX_ARGON2_TIME: u32 = 16;
const MAX_ARGON2_HASH_LEN: usize = 64;

#[derive(Deserialize)]
struct RawVault {
    data: String,
    iv: String,
    salt: String,
    #[serde(default, rename = "keyMetadata")]
    key_metadata: Option<KeyMetadata>,
}

#[derive(Deserialize)]
struct KeyMetadata {
    params: KeyMetadataParams,
}

#[derive(Deserialize)]
struct KeyMetadataParams {
    iterations: u32,
}

#[derive(Debug)]
pub(super) struct EncryptedVault {
    data: Vec<u8>,
    iv: Vec<u8>,
    salt: Vec<u8>,
    /// PBKDF2 rounds the vault declares, if it declares any.
    pub(super) iterations: Option<u32>,
}

impl EncryptedVault {
    pub(super) fn parse(vault: &str) -> Result<Self, ImportError> {
        let raw: RawVault = serde_json::from_str(vault).map_err(|_e| ImportError::JsonError)?;
        let iterations = raw.key_metadata.map(|m| m.params.iterations);
        if iterations.is_some_and(|n| n == 0 || n > MAX_VAULT_PBKDF2_ITERATIONS) {
            return Err(ImportError::InternalError);
        }
        let decode = |s: &str| {
            base64::engine::general_purpose::STANDARD
                .decode(s)
                .map_err(|_e| ImportError::JsonError)
        };
        Ok(Self {
            data: decode(&raw.data)?,
            iv: decode(&raw.iv)?,
            salt: decode(&raw.salt)?,
            iterations,
        })
    }

    /// Authenticated decrypt with one PBKDF2 round count; any failure reads as a wrong password.
    pub(super) fn decrypt(
        &self,
        password: &str,
        iterations: u32,
    ) -> Result<Zeroizing<Vec<u8>>, ImportError> {
        let encryptor = PasswordEncryptor::derive_from_password(password, &self.salt, iterations)
            .map_err(|_e| ImportError::PasswordError)?;
        encryptor
            .decrypt_for_importer(&self.data, &self.iv)
            .map_err(|_e| ImportError::PasswordError)
    }
}

/// Recovered HD keyring contents of a decrypted vault.
pub(super) struct VaultPayload {
    pub(super) mnemonic: Zeroizing<String>,
    pub(super) number_of_accounts: usize,
}

/// Find the first HD keyring in the decrypted vault and pull out its mnemonic and account count.
pub(super) fn parse_payload(plaintext: &[u8]) -> Result<VaultPayload, ImportError> {
    let keyrings: Value = serde_json::from_slice(plaintext).map_err(|_e| ImportError::JsonError)?;
    let keyrings = keyrings.as_array().ok_or(ImportError::JsonError)?;
    let hd = keyrings
        .iter()
        .find(|k| k.get("type").and_then(Value::as_str) == Some(HD_KEY_TREE))
        .and_then(|k| k.get("data"))
        .ok_or(ImportError::InternalError)?;

    let mnemonic = match hd.get("mnemonic") {
        Some(Value::String(s)) => Zeroizing::new(s.clone()),
        // Newer extension builds store the phrase as its UTF-8 bytes.
        Some(Value::Array(bytes)) => {
            let bytes: Option<Vec<u8>> = bytes
                .iter()
                .map(|b| b.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect();
            let bytes = Zeroizing::new(bytes.ok_or(ImportError::InternalError)?);
            let s = std::str::from_utf8(&bytes).map_err(|_e| ImportError::InternalError)?;
            Zeroizing::new(s.to_owned())
        }
        _ => return Err(ImportError::InternalError),
    };
    if mnemonic.trim().is_empty() {
        return Err(ImportError::InternalError);
    }

    let number_of_accounts = match hd.get("numberOfAccounts") {
        None => DEFAULT_NUMBER_OF_ACCOUNTS,
        Some(n) => n
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n <= MAX_NUMBER_OF_ACCOUNTS)
            .ok_or(ImportError::InternalError)?,
    };
    Ok(VaultPayload {
        mnemonic,
        number_of_accounts,
    })
}

#[derive(Debug)]
struct ArgonParams {
    hash_len: usize,
    mem: u32,
    time: u32,
}

fn argon_params(keyring_controller: &Map<String, Value>) -> Result<ArgonParams, ImportError> {
    let params = keyring_controller
        .get("argonParams")
        .and_then(Value::as_object)
        .ok_or(ImportError::InternalError)?;
    let field = |name: &str| {
        params
            .get(name)
            .and_then(Value::as_u64)
            .ok_or(ImportError::InternalError)
    };
    let hash_len = field("hashLen")?;
    let mem = field("mem")?;
    let time = field("time")?;
    if field("type")? != ARGON2ID_TYPE {
        return Err(ImportError::InternalError);
    }
    let params = ArgonParams {
        hash_len: usize::try_from(hash_len).map_err(|_e| ImportError::InternalError)?,
        mem: u32::try_from(mem).map_err(|_e| ImportError::InternalError)?,
        time: u32::try_from(time).map_err(|_e| ImportError::InternalError)?,
    };
    if params.mem > MAX_ARGON2_MEMORY_KIB
        || params.time > MAX_ARGON2_TIME
        || params.hash_len > MAX_ARGON2_HASH_LEN
    {
        return Err(ImportError::InternalError);
    }
    Ok(params)
}

/// Stretch the user password the way Crypto Wallets did; the lowercase hex
/// digest is the password of the inner vault.
pub(super) fn legacy_vault_password(
    keyring_controller: &Map<String, Value>,
    password: &str,
) -> Result<Zeroizing<String>, ImportError> {
    let params = argon_params(keyring_controller)?;
    let salt = keyring_controller
        .get("salt")
        .and_then(Value::as_str)
        .ok_or(ImportError::InternalError)?;

    let argon_params = Params::new(params.mem, params.time, 1, Some(params.hash_len))
        .map_err(|_e| ImportError::InternalError)?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);
    let mut out = Zeroizing::new(vec![0_u8; params.hash_len]);
    argon
        .hash_password_into(password.as_bytes(), salt.as_bytes(), out.as_mut_slice())
        .map_err(|_e| ImportError::InternalError)?;
    Ok(Zeroizing::new(hex::encode(out.as_slice())))
}
