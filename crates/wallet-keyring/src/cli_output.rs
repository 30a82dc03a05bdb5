//! Centralised helpers for CLI output: JSON results on stdout, notices on stderr.

use eyre::Context as _;
use secrecy::SecretString;
use std::io::{IsTerminal as _, Write as _};

fn stderr_writeln(s: &str) {
    let mut stderr = std::io::stderr().lock();
    if stderr.write_all(s.as_bytes()).is_err() {
        return;
    }
    if stderr.write_all(b"\n").is_err() {
        return;
    }
    let _flush = stderr.flush();
}

/// Write one JSON document to stdout.
pub fn print_json(v: &serde_json::Value) -> eyre::Result<()> {
    let s = serde_json::to_string_pretty(v).context("serialize output")?;
    writeln!(std::io::stdout().lock(), "{s}").context("write output")
}

/// Remind the operator to store a freshly shown recovery phrase (human info only).
pub fn print_backup_notice() {
    stderr_writeln(
        "wallet-keyring: write the recovery phrase down and keep it offline, then run `wallet-keyring backup-complete`.",
    );
}

/// Read a secret from `var`, or prompt for it on the terminal.
///
/// Non-interactive runs must use the environment variable.
pub fn secret_from_env_or_prompt(var: &str, prompt: &str) -> eyre::Result<SecretString> {
    if let Ok(v) = std::env::var(var) {
        return Ok(SecretString::new(v.into()));
    }
    if !std::io::stdin().is_terminal() {
        eyre::bail!("{var} is not set and stdin is not a terminal");
    }
    let v = rpassword::prompt_password(prompt).context("read secret from terminal")?;
    Ok(SecretString::new(v.into()))
}
