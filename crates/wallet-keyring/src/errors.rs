use thiserror::Error;

/// Internal failure reasons inside the keyring engine.
///
/// These never cross the `KeyringController` boundary as-is: the controller
/// logs them and reports a plain `false`/empty result to its caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyringError {
    #[error("keyring is locked")]
    Locked,

    #[error("keyring has not been created")]
    NotCreated,

    #[error("password must not be empty")]
    EmptyPassword,

    #[error("invalid mnemonic")]
    InvalidMnemonic,

    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("account already exists: {0}")]
    DuplicateAccount(String),

    #[error("account index out of range")]
    AccountIndexOutOfRange,

    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("missing or malformed pref: {0}")]
    MalformedPref(String),

    #[error("keystore json: {0}")]
    KeystoreJson(String),

    #[error("pref store busy")]
    StoreBusy,
}

/// Why an external wallet import failed.
///
/// The successful case (`kNone` in the embedding browser) is the `Ok` arm of
/// `ExternalWalletsImporter::get_import_info`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ImportError {
    /// Empty password, or the vault did not authenticate under it.
    #[error("password error")]
    PasswordError,

    /// Vault is not valid JSON, misses `data`/`iv`/`salt`, or carries bad base64.
    #[error("json error")]
    JsonError,

    /// Structurally broken input that still parsed (e.g. bad Argon2 parameters).
    #[error("internal error")]
    InternalError,
}

impl ImportError {
    pub const fn code(self) -> &'static str {
        match self {
            Self::PasswordError => "password_error",
            Self::JsonError => "json_error",
            Self::InternalError => "internal_error",
        }
    }
}
