use super::PrefService;
use crate::{errors::KeyringError, paths::KeyringPaths};
use eyre::Context as _;
use fs2::FileExt;
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fs::{File, OpenOptions},
    path::PathBuf,
};

/// Prefs persisted as one JSON object on disk.
///
/// Holds an exclusive lock on `prefs.lock` for its whole lifetime so only one
/// process mutates the wallet namespace at a time. Every mutation rewrites
/// the file atomically.
#[derive(Debug)]
pub struct JsonFilePrefs {
    path: PathBuf,
    values: BTreeMap<String, Value>,
    lock: File,
}

impl JsonFilePrefs {
    pub fn open(paths: &KeyringPaths) -> eyre::Result<Self> {
        paths.ensure_private_dirs()?;
        let lock = Self::acquire_lock(paths)?;

        let path = paths.prefs_file();
        let values = match crate::fsutil::read_to_string_if_exists(&path)? {
            Some(s) if !s.trim().is_empty() => {
                serde_json::from_str(&s).context("parse prefs.json")?
            }
            _ => BTreeMap::new(),
        };
        Ok(Self { path, values, lock })
    }

    fn acquire_lock(paths: &KeyringPaths) -> eyre::Result<File> {
        let p = paths.prefs_lock_file();
        let mut oo = OpenOptions::new();
        oo.create(true).read(true).write(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt as _;
            oo.mode(crate::fsutil::MODE_FILE_PRIVATE);
        }
        let f = oo.open(&p).context("open prefs lock file")?;
        // Fail fast rather than block a second CLI invocation behind a long-lived one.
        match FileExt::try_lock_exclusive(&f) {
            Ok(()) => Ok(f),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(KeyringError::StoreBusy.into())
            }
            Err(e) => Err(eyre::Report::new(e).wrap_err("lock prefs exclusive")),
        }
    }

    fn persist(&self) -> eyre::Result<()> {
        let s = serde_json::to_string_pretty(&self.values).context("serialize prefs")?;
        crate::fsutil::write_private_atomic(&self.path, s.as_bytes()).context("write prefs.json")
    }
}

impl PrefService for JsonFilePrefs {
    fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    fn set(&mut self, name: &str, value: Value) -> eyre::Result<()> {
        let previous = self.values.insert(name.to_owned(), value);
        if let Err(e) = self.persist() {
            // Keep memory and disk in agreement when the write fails.
            match previous {
                Some(v) => self.values.insert(name.to_owned(), v),
                None => self.values.remove(name),
            };
            return Err(e);
        }
        Ok(())
    }

    fn clear(&mut self, name: &str) -> eyre::Result<()> {
        let Some(previous) = self.values.remove(name) else {
            return Ok(());
        };
        if let Err(e) = self.persist() {
            self.values.insert(name.to_owned(), previous);
            return Err(e);
        }
        Ok(())
    }

    /// One file rewrite for the whole batch.
    fn clear_many(&mut self, names: &[&str]) -> eyre::Result<()> {
        let removed: Vec<(String, Value)> = names
            .iter()
            .filter_map(|name| self.values.remove_entry(*name))
            .collect();
        if removed.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.persist() {
            self.values.extend(removed);
            return Err(e);
        }
        Ok(())
    }
}

impl Drop for JsonFilePrefs {
    fn drop(&mut self) {
        drop(FileExt::unlock(&self.lock));
    }
}
