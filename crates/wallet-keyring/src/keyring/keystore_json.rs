//! Web3 Secret Storage (V3) keystore decryption.
//!
//! Supports the two KDFs wallets actually emit (`scrypt`, `pbkdf2` with
//! `hmac-sha256`) and the `aes-128-ctr` cipher. The MAC is
//! `keccak256(dk[16..32] ++ ciphertext)`.

use crate::errors::KeyringError;
use aes::Aes128;
use alloy::primitives::keccak256;
use ctr::cipher::{KeyIvInit as _, StreamCipher as _};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use zeroize::Zeroizing;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

const AES_128_CTR: &str = "aes-128-ctr";
const MIN_DKLEN: usize = 32;
const MAX_DKLEN: usize = 64;
/// `128 * r * (n + p)` bytes; geth's standard scrypt (n = 2^18, r = 8, p = 1) just fits.
const MAX_SCRYPT_MEMORY: u64 = 256 * 1024 * 1024 + 1024;
const MAX_SCRYPT_P: u32 = 16;
const MAX_PBKDF2_ROUNDS: u32 = 10_000_000;
const PRIVATE_KEY_LEN: usize = 32;

#[derive(Debug, Deserialize)]
struct CryptoSection {
    cipher: String,
    cipherparams: CipherParams,
    ciphertext: String,
    kdf: String,
    kdfparams: Value,
    mac: String,
}

#[derive(Debug, Deserialize)]
struct CipherParams {
    iv: String,
}

#[derive(Debug, Deserialize)]
struct ScryptParams {
    dklen: usize,
    n: u64,
    r: u32,
    p: u32,
    salt: String,
}

#[derive(Debug, Deserialize)]
struct Pbkdf2Params {
    c: u32,
    dklen: usize,
    #[serde(default)]
    prf: Option<String>,
    salt: String,
}

fn malformed(what: &str) -> KeyringError {
    KeyringError::KeystoreJson(what.to_owned())
}

fn unhex(s: &str, what: &str) -> Result<Vec<u8>, KeyringError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|_e| malformed(what))
}

fn crypto_section(json: &str) -> Result<CryptoSection, KeyringError> {
    let root: Value = serde_json::from_str(json).map_err(|_e| malformed("not json"))?;
    // Some wallets (old geth, MyEtherWallet) capitalize the section name.
    let section = root
        .get("crypto")
        .or_else(|| root.get("Crypto"))
        .ok_or_else(|| malformed("missing crypto section"))?;
    serde_json::from_value(section.clone()).map_err(|_e| malformed("crypto section"))
}

fn derive_key(
    crypto: &CryptoSection,
    password: &str,
) -> Result<Zeroizing<Vec<u8>>, KeyringError> {
    match crypto.kdf.as_str() {
        "scrypt" => {
            let p: ScryptParams = serde_json::from_value(crypto.kdfparams.clone())
                .map_err(|_e| malformed("scrypt kdfparams"))?;
            if !(MIN_DKLEN..=MAX_DKLEN).contains(&p.dklen) || p.n < 2 || !p.n.is_power_of_two() {
                return Err(malformed("scrypt kdfparams"));
            }
            let memory = p
                .n
                .checked_add(u64::from(p.p))
                .and_then(|blocks| blocks.checked_mul(u64::from(p.r)))
                .and_then(|blocks| blocks.checked_mul(128));
            if p.p > MAX_SCRYPT_P || !memory.is_some_and(|m| m <= MAX_SCRYPT_MEMORY) {
                return Err(malformed("scrypt cost too high"));
            }
            let log_n = u8::try_from(p.n.trailing_zeros()).map_err(|_e| malformed("scrypt n"))?;
            let params = scrypt::Params::new(log_n, p.r, p.p, p.dklen)
                .map_err(|_e| malformed("scrypt kdfparams"))?;
            let salt = unhex(&p.salt, "scrypt salt")?;
            let mut dk = Zeroizing::new(vec![0_u8; p.dklen]);
            scrypt::scrypt(password.as_bytes(), &salt, &params, dk.as_mut_slice())
                .map_err(|_e| malformed("scrypt dklen"))?;
            Ok(dk)
        }
        "pbkdf2" => {
            let p: Pbkdf2Params = serde_json::from_value(crypto.kdfparams.clone())
                .map_err(|_e| malformed("pbkdf2 kdfparams"))?;
            if p.prf.as_deref().is_some_and(|prf| prf != "hmac-sha256") {
                return Err(malformed("unsupported pbkdf2 prf"));
            }
            if !(MIN_DKLEN..=MAX_DKLEN).contains(&p.dklen)
                || !(1..=MAX_PBKDF2_ROUNDS).contains(&p.c)
            {
                return Err(malformed("pbkdf2 kdfparams"));
            }
            let salt = unhex(&p.salt, "pbkdf2 salt")?;
            let mut dk = Zeroizing::new(vec![0_u8; p.dklen]);
            pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, p.c, dk.as_mut_slice());
            Ok(dk)
        }
        other => Err(malformed(&format!("unsupported kdf {other}"))),
    }
}

/// Decrypt the private key held by a V3 keystore.
///
/// A MAC mismatch is reported as `DecryptionFailed`, the same as a wrong
/// password anywhere else in the keyring. Structural problems are
/// `KeystoreJson`.
pub fn decrypt_keystore(json: &str, password: &str) -> Result<Zeroizing<Vec<u8>>, KeyringError> {
    if password.is_empty() {
        return Err(KeyringError::EmptyPassword);
    }
    let crypto = crypto_section(json)?;
    if !crypto.cipher.eq_ignore_ascii_case(AES_128_CTR) {
        return Err(malformed("unsupported cipher"));
    }
    let iv = unhex(&crypto.cipherparams.iv, "iv")?;
    let mut buf = Zeroizing::new(unhex(&crypto.ciphertext, "ciphertext")?);
    let mac = unhex(&crypto.mac, "mac")?;

    let dk = derive_key(&crypto, password)?;
    let (Some(enc_key), Some(mac_key)) = (dk.get(..16), dk.get(16..32)) else {
        return Err(malformed("dklen"));
    };

    let mut preimage = Vec::with_capacity(16 + buf.len());
    preimage.extend_from_slice(mac_key);
    preimage.extend_from_slice(&buf);
    if keccak256(&preimage).as_slice() != mac.as_slice() {
        return Err(KeyringError::DecryptionFailed);
    }

    let mut cipher =
        Aes128Ctr::new_from_slices(enc_key, &iv).map_err(|_e| malformed("iv length"))?;
    cipher.apply_keystream(buf.as_mut_slice());
    if buf.len() != PRIVATE_KEY_LEN {
        return Err(KeyringError::InvalidPrivateKey);
    }
    Ok(buf)
}
