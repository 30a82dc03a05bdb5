#![recursion_limit = "256"]
#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::{Parser, Subcommand};
use eyre::Context as _;
use secrecy::ExposeSecret as _;
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::prelude::*;
use wallet_keyring::{
    config::{ConfigStore, KeyringConfig},
    importer::{ExternalWalletType, ExternalWalletsImporter},
    keyring::{migration, KeyringController, KeyringService, KeyringStore},
    paths::KeyringPaths,
    prefs::JsonFilePrefs,
};

mod cli_output;

const PASSWORD_ENV: &str = "WALLET_KEYRING_PASSWORD";
const MNEMONIC_ENV: &str = "WALLET_KEYRING_MNEMONIC";
const PRIVATE_KEY_ENV: &str = "WALLET_KEYRING_PRIVATE_KEY";
const KEYSTORE_PASSWORD_ENV: &str = "WALLET_KEYRING_KEYSTORE_PASSWORD";
const EXTERNAL_PASSWORD_ENV: &str = "WALLET_KEYRING_EXTERNAL_PASSWORD";

#[derive(Parser, Debug)]
#[command(name = "wallet-keyring", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print resolved paths (useful for debugging).
    Paths,

    /// Create a new wallet with a fresh recovery phrase and one account.
    ///
    /// Replaces any existing default keyring. The phrase is printed once.
    Create {
        /// Accept a password that fails the strength rules.
        #[arg(long, default_value_t = false)]
        allow_weak_password: bool,
    },

    /// Restore the default keyring from a recovery phrase (`WALLET_KEYRING_MNEMONIC` or prompt).
    Restore {
        /// Derive keys the way pre-BIP39-seed Brave wallets did (24-word phrases only).
        #[arg(long, default_value_t = false)]
        legacy_brave_wallet: bool,

        /// Number of accounts to derive after restoring.
        #[arg(long, default_value_t = 1)]
        accounts: usize,
    },

    /// Print keyring status. Accounts are listed only with `--unlock`.
    Info {
        #[arg(long, default_value_t = false)]
        unlock: bool,
    },

    /// Derive the next HD account.
    AddAccount {
        #[arg(long)]
        name: String,
    },

    /// Import a raw hex private key (`WALLET_KEYRING_PRIVATE_KEY` or prompt).
    ImportKey {
        #[arg(long)]
        name: String,
    },

    /// Import the key held by an Ethereum V3 keystore file.
    ImportJson {
        #[arg(long)]
        name: String,

        #[arg(long)]
        file: PathBuf,
    },

    /// Restore from another wallet extension's local-storage dump.
    ImportExternal {
        /// JSON dump of the extension's local storage.
        #[arg(long)]
        storage: PathBuf,

        #[arg(long, value_enum, default_value_t = ExternalWalletType::MetaMask)]
        wallet: ExternalWalletType,
    },

    /// Remove an imported (non-HD) account.
    RemoveAccount {
        #[arg(long)]
        address: String,
    },

    /// Print the recovery phrase.
    ShowMnemonic,

    /// Record that the recovery phrase has been backed up.
    BackupComplete,

    /// Move legacy flat wallet prefs into the namespaced layout.
    Migrate,

    /// Delete every keyring and wallet pref.
    Reset {
        /// Required; there is no undo.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

fn init_logging(paths: &KeyringPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("wallet-keyring.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

fn open_service(paths: &KeyringPaths, cfg: &KeyringConfig) -> eyre::Result<KeyringService> {
    let prefs = JsonFilePrefs::open(paths).context("open wallet prefs")?;
    Ok(KeyringService::spawn(KeyringController::new(
        Box::new(prefs),
        cfg.clone(),
    )))
}

async fn unlock(svc: &KeyringService) -> eyre::Result<()> {
    let password = cli_output::secret_from_env_or_prompt(PASSWORD_ENV, "Wallet password: ")?;
    if !svc.unlock(password.expose_secret()).await? {
        eyre::bail!("unlock failed: wrong password or no wallet");
    }
    Ok(())
}

async fn print_info(svc: &KeyringService) -> eyre::Result<()> {
    let info = svc.default_keyring_info().await?;
    cli_output::print_json(&serde_json::to_value(info).context("serialize keyring info")?)
}

async fn run(cmd: Command, paths: &KeyringPaths, cfg: &KeyringConfig) -> eyre::Result<()> {
    match cmd {
        Command::Paths => cli_output::print_json(&json!({
          "config_dir": paths.config_dir,
          "data_dir": paths.data_dir,
          "log_file": paths.log_file,
          "prefs_file": paths.prefs_file(),
        })),
        Command::Migrate => {
            let prefs = JsonFilePrefs::open(paths).context("open wallet prefs")?;
            let mut store = KeyringStore::new(Box::new(prefs));
            let migrated = migration::migrate_obsolete_prefs(&mut store)?;
            cli_output::print_json(&json!({ "migrated": migrated }))
        }
        Command::Create {
            allow_weak_password,
        } => {
            let password = cli_output::secret_from_env_or_prompt(PASSWORD_ENV, "New wallet password: ")?;
            if !allow_weak_password && !KeyringController::is_strong_password(password.expose_secret()) {
                eyre::bail!(
                    "password must be at least 7 characters with a letter, a digit and a symbol (or pass --allow-weak-password)"
                );
            }
            let svc = open_service(paths, cfg)?;
            let mnemonic = svc
                .create_wallet(password.expose_secret())
                .await?
                .ok_or_else(|| eyre::eyre!("wallet creation failed"))?;
            let info = svc.default_keyring_info().await?;
            svc.lock().await?;
            cli_output::print_backup_notice();
            cli_output::print_json(&json!({
              "mnemonic": mnemonic.as_str(),
              "keyring": info,
            }))
        }
        Command::Restore {
            legacy_brave_wallet,
            accounts,
        } => {
            let mnemonic = cli_output::secret_from_env_or_prompt(MNEMONIC_ENV, "Recovery phrase: ")?;
            let password = cli_output::secret_from_env_or_prompt(PASSWORD_ENV, "New wallet password: ")?;
            let svc = open_service(paths, cfg)?;
            if !svc
                .restore_wallet(
                    mnemonic.expose_secret(),
                    password.expose_secret(),
                    legacy_brave_wallet,
                )
                .await?
            {
                eyre::bail!("restore failed: invalid recovery phrase or empty password");
            }
            if accounts > 0
                && !svc
                    .call(move |c| c.add_accounts_with_default_names(accounts))
                    .await?
            {
                eyre::bail!("could not derive accounts");
            }
            print_info(&svc).await?;
            svc.lock().await
        }
        Command::Info { unlock: with_accounts } => {
            let svc = open_service(paths, cfg)?;
            if with_accounts {
                unlock(&svc).await?;
            }
            print_info(&svc).await?;
            svc.lock().await
        }
        Command::AddAccount { name } => {
            let svc = open_service(paths, cfg)?;
            unlock(&svc).await?;
            if !svc.add_account(&name).await? {
                eyre::bail!("could not add account");
            }
            print_info(&svc).await?;
            svc.lock().await
        }
        Command::ImportKey { name } => {
            let svc = open_service(paths, cfg)?;
            unlock(&svc).await?;
            let key = cli_output::secret_from_env_or_prompt(PRIVATE_KEY_ENV, "Private key (hex): ")?;
            let address = svc
                .import_account(&name, key.expose_secret())
                .await?
                .ok_or_else(|| eyre::eyre!("import failed: invalid or duplicate private key"))?;
            svc.lock().await?;
            cli_output::print_json(&json!({ "address": address }))
        }
        Command::ImportJson { name, file } => {
            let json_text = std::fs::read_to_string(&file)
                .with_context(|| format!("read keystore {}", file.display()))?;
            let svc = open_service(paths, cfg)?;
            unlock(&svc).await?;
            let keystore_password =
                cli_output::secret_from_env_or_prompt(KEYSTORE_PASSWORD_ENV, "Keystore password: ")?;
            let address = svc
                .import_account_from_json(&name, keystore_password.expose_secret(), &json_text)
                .await?
                .ok_or_else(|| eyre::eyre!("import failed: wrong keystore password or unsupported file"))?;
            svc.lock().await?;
            cli_output::print_json(&json!({ "address": address }))
        }
        Command::ImportExternal { storage, wallet } => {
            let importer = ExternalWalletsImporter::from_storage_file(wallet, &storage, cfg)?;
            if !importer.is_external_wallet_installed() {
                eyre::bail!("no extension storage at {}", storage.display());
            }
            if !importer.is_external_wallet_initialized() {
                eyre::bail!("extension storage holds no wallet");
            }
            let external_password = cli_output::secret_from_env_or_prompt(
                EXTERNAL_PASSWORD_ENV,
                "Extension wallet password: ",
            )?;
            let info = importer
                .get_import_info(external_password.expose_secret())
                .map_err(|e| eyre::eyre!("external wallet import failed: {}", e.code()))?;
            let password = cli_output::secret_from_env_or_prompt(PASSWORD_ENV, "New wallet password: ")?;
            let svc = open_service(paths, cfg)?;
            if !svc
                .restore_from_import_info(info, password.expose_secret())
                .await?
            {
                eyre::bail!("restore from external wallet failed");
            }
            print_info(&svc).await?;
            svc.lock().await
        }
        Command::RemoveAccount { address } => {
            let svc = open_service(paths, cfg)?;
            unlock(&svc).await?;
            if !svc.remove_imported_account(&address).await? {
                eyre::bail!("no imported account {address}");
            }
            print_info(&svc).await?;
            svc.lock().await
        }
        Command::ShowMnemonic => {
            let svc = open_service(paths, cfg)?;
            unlock(&svc).await?;
            let mnemonic = svc.mnemonic_for_default_keyring().await?;
            svc.lock().await?;
            cli_output::print_json(&json!({ "mnemonic": mnemonic.as_str() }))
        }
        Command::BackupComplete => {
            let svc = open_service(paths, cfg)?;
            if !svc.notify_wallet_backup_complete().await? {
                eyre::bail!("no wallet to mark as backed up");
            }
            print_info(&svc).await
        }
        Command::Reset { yes } => {
            if !yes {
                eyre::bail!("refusing to delete the wallet without --yes");
            }
            let svc = open_service(paths, cfg)?;
            let cleared = svc.reset().await?;
            cli_output::print_json(&json!({ "reset": cleared }))
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = KeyringPaths::discover()?;
    paths.ensure_private_dirs()?;
    let _log_guard = init_logging(&paths);
    let cfg = ConfigStore::new(&paths).load_or_init_default()?;

    run(cli.cmd, &paths, &cfg).await
}
