#![recursion_limit = "256"]
#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

pub mod config;
pub mod errors;
pub mod fsutil;
pub mod importer;
pub mod keyring;
pub mod paths;
pub mod prefs;
