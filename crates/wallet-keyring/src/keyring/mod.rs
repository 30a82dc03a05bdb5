//! Password-protected HD keyring: encryption, persistence, derivation and lifecycle.

pub mod controller;
pub mod hd_keyring;
pub mod keystore_json;
pub mod migration;
pub mod password_encryptor;
pub mod service;
pub mod store;

pub use controller::{AccountInfo, KeyringController, KeyringEvent, KeyringInfo};
pub use hd_keyring::HdKeyring;
pub use password_encryptor::PasswordEncryptor;
pub use service::KeyringService;
pub use store::KeyringStore;
