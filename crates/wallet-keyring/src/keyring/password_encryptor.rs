use crate::errors::KeyringError;
use aes_gcm::{
    aead::{consts::U16, generic_array::GenericArray, Aead as _, KeyInit as _},
    aes::Aes256,
    Aes256Gcm, AesGcm, Nonce,
};
use rand::Rng as _;
use sha2::Sha256;
use zeroize::Zeroizing;

pub const SALT_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const KEY_LEN: usize = 32;
/// IV length used by browser-extension vaults (WebCrypto AES-GCM with a 16-byte IV).
pub const VAULT_IV_LEN: usize = 16;

type Aes256Gcm16 = AesGcm<Aes256, U16>;

pub fn fill_random(buf: &mut [u8]) {
    let mut rng = rand::rng();
    rng.fill_bytes(buf);
}

pub fn random_salt() -> [u8; SALT_LEN] {
    let mut s = [0_u8; SALT_LEN];
    fill_random(&mut s);
    s
}

pub fn random_nonce() -> [u8; NONCE_LEN] {
    let mut n = [0_u8; NONCE_LEN];
    fill_random(&mut n);
    n
}

/// AES-256-GCM under a key derived from a password with PBKDF2-HMAC-SHA256.
pub struct PasswordEncryptor {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl std::fmt::Debug for PasswordEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordEncryptor").finish_non_exhaustive()
    }
}

impl PasswordEncryptor {
    pub fn derive_from_password(
        password: &str,
        salt: &[u8],
        iterations: u32,
    ) -> Result<Self, KeyringError> {
        if password.is_empty() {
            return Err(KeyringError::EmptyPassword);
        }
        if iterations == 0 {
            return Err(KeyringError::EncryptionFailed);
        }
        let mut key = Zeroizing::new([0_u8; KEY_LEN]);
        pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, key.as_mut());
        Ok(Self { key })
    }

    pub fn encrypt(&self, plaintext: &[u8], nonce: &[u8]) -> Result<Vec<u8>, KeyringError> {
        if nonce.len() != NONCE_LEN {
            return Err(KeyringError::EncryptionFailed);
        }
        let cipher = Aes256Gcm::new_from_slice(self.key.as_ref())
            .map_err(|_e| KeyringError::EncryptionFailed)?;
        cipher
            .encrypt(Nonce::from_slice(nonce), plaintext)
            .map_err(|_e| KeyringError::EncryptionFailed)
    }

    /// Authenticated decrypt. Wrong key, wrong nonce and tampered bytes all
    /// yield the same `DecryptionFailed`.
    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        nonce: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, KeyringError> {
        if nonce.len() != NONCE_LEN {
            return Err(KeyringError::DecryptionFailed);
        }
        let cipher = Aes256Gcm::new_from_slice(self.key.as_ref())
            .map_err(|_e| KeyringError::DecryptionFailed)?;
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|_e| KeyringError::DecryptionFailed)
    }

    /// Decrypt a third-party vault blob, which may use either a 12- or a 16-byte IV.
    pub fn decrypt_for_importer(
        &self,
        ciphertext: &[u8],
        iv: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, KeyringError> {
        match iv.len() {
            NONCE_LEN => self.decrypt(ciphertext, iv),
            VAULT_IV_LEN => {
                let cipher = Aes256Gcm16::new_from_slice(self.key.as_ref())
                    .map_err(|_e| KeyringError::DecryptionFailed)?;
                cipher
                    .decrypt(GenericArray::from_slice(iv), ciphertext)
                    .map(Zeroizing::new)
                    .map_err(|_e| KeyringError::DecryptionFailed)
            }
            _ => Err(KeyringError::DecryptionFailed),
        }
    }
}
