//! Async front-end for [`KeyringController`].
//!
//! One tokio task owns the controller. Every request, `lock` included, is a
//! job on a single unbounded queue, so requests run in the order they were
//! sent and each reply is delivered exactly once. A lock can never interleave
//! with an unlock that was queued before it.

use super::controller::{KeyringController, KeyringEvent, KeyringInfo};
use crate::importer::ImportInfo;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use zeroize::Zeroizing;

const EVENT_CHANNEL_CAPACITY: usize = 64;

type Job = Box<dyn FnOnce(&mut KeyringController) + Send>;

/// Cloneable handle to the keyring task. The task exits when the last handle is dropped.
#[derive(Debug, Clone)]
pub struct KeyringService {
    jobs: mpsc::UnboundedSender<Job>,
    events: broadcast::Sender<KeyringEvent>,
}

impl KeyringService {
    /// Move `controller` into a new task on the current runtime.
    pub fn spawn(controller: KeyringController) -> Self {
        let (jobs, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(run(controller, rx, events.clone()));
        Self { jobs, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KeyringEvent> {
        self.events.subscribe()
    }

    /// Queue `f` and wait for its result.
    pub async fn call<T, F>(&self, f: F) -> eyre::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut KeyringController) -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let job: Job = Box::new(move |controller| {
            if tx.send(f(controller)).is_err() {
                tracing::debug!("keyring request abandoned by caller");
            }
        });
        self.jobs
            .send(job)
            .map_err(|_e| eyre::eyre!("keyring service stopped"))?;
        rx.await
            .map_err(|_e| eyre::eyre!("keyring service dropped the request"))
    }

    pub async fn is_locked(&self) -> eyre::Result<bool> {
        self.call(|c| c.is_locked()).await
    }

    pub async fn create_wallet(&self, password: &str) -> eyre::Result<Option<Zeroizing<String>>> {
        let password = Zeroizing::new(password.to_owned());
        self.call(move |c| c.create_wallet(&password)).await
    }

    pub async fn restore_wallet(
        &self,
        mnemonic: &str,
        password: &str,
        is_legacy_brave_wallet: bool,
    ) -> eyre::Result<bool> {
        let mnemonic = Zeroizing::new(mnemonic.to_owned());
        let password = Zeroizing::new(password.to_owned());
        self.call(move |c| c.restore_wallet(&mnemonic, &password, is_legacy_brave_wallet))
            .await
    }

    pub async fn restore_from_import_info(
        &self,
        info: ImportInfo,
        password: &str,
    ) -> eyre::Result<bool> {
        let password = Zeroizing::new(password.to_owned());
        self.call(move |c| c.restore_from_import_info(&info, &password))
            .await
    }

    pub async fn unlock(&self, password: &str) -> eyre::Result<bool> {
        let password = Zeroizing::new(password.to_owned());
        self.call(move |c| c.unlock(&password)).await
    }

    pub async fn lock(&self) -> eyre::Result<()> {
        self.call(KeyringController::lock).await
    }

    pub async fn add_account(&self, name: &str) -> eyre::Result<bool> {
        let name = name.to_owned();
        self.call(move |c| c.add_account(&name)).await
    }

    pub async fn import_account(
        &self,
        name: &str,
        private_key_hex: &str,
    ) -> eyre::Result<Option<String>> {
        let name = name.to_owned();
        let key = Zeroizing::new(private_key_hex.to_owned());
        self.call(move |c| c.import_account(&name, &key)).await
    }

    pub async fn import_account_from_json(
        &self,
        name: &str,
        password: &str,
        json: &str,
    ) -> eyre::Result<Option<String>> {
        let name = name.to_owned();
        let password = Zeroizing::new(password.to_owned());
        let json = Zeroizing::new(json.to_owned());
        self.call(move |c| c.import_account_from_json(&name, &password, &json))
            .await
    }

    pub async fn remove_imported_account(&self, address: &str) -> eyre::Result<bool> {
        let address = address.to_owned();
        self.call(move |c| c.remove_imported_account(&address))
            .await
    }

    pub async fn default_keyring_info(&self) -> eyre::Result<KeyringInfo> {
        self.call(|c| c.default_keyring_info()).await
    }

    pub async fn mnemonic_for_default_keyring(&self) -> eyre::Result<Zeroizing<String>> {
        self.call(|c| c.mnemonic_for_default_keyring()).await
    }

    pub async fn private_key_for_imported_account(
        &self,
        address: &str,
    ) -> eyre::Result<Zeroizing<String>> {
        let address = address.to_owned();
        self.call(move |c| c.private_key_for_imported_account(&address))
            .await
    }

    pub async fn private_key_for_default_keyring_account(
        &self,
        address: &str,
    ) -> eyre::Result<Zeroizing<String>> {
        let address = address.to_owned();
        self.call(move |c| c.private_key_for_default_keyring_account(&address))
            .await
    }

    pub async fn notify_wallet_backup_complete(&self) -> eyre::Result<bool> {
        self.call(KeyringController::notify_wallet_backup_complete)
            .await
    }

    pub async fn set_auto_lock_minutes(&self, minutes: u32) -> eyre::Result<bool> {
        self.call(move |c| c.set_auto_lock_minutes(minutes)).await
    }

    pub async fn reset(&self) -> eyre::Result<bool> {
        self.call(KeyringController::reset).await
    }
}

/// Idle time after which an unlocked keyring locks itself; `None` disables it.
fn idle_timeout(controller: &KeyringController) -> Option<Duration> {
    if controller.is_locked() {
        return None;
    }
    match controller.auto_lock_minutes() {
        0 => None,
        m => Some(Duration::from_secs(u64::from(m).saturating_mul(60))),
    }
}

fn publish(controller: &mut KeyringController, events: &broadcast::Sender<KeyringEvent>) {
    for event in controller.take_events() {
        tracing::debug!(?event, "keyring event");
        if let Err(e) = events.send(event) {
            tracing::trace!(event = ?e.0, "no keyring event subscribers");
        }
    }
}

async fn run(
    mut controller: KeyringController,
    mut jobs: mpsc::UnboundedReceiver<Job>,
    events: broadcast::Sender<KeyringEvent>,
) {
    publish(&mut controller, &events);
    loop {
        // The deadline restarts after every job.
        let next = match idle_timeout(&controller) {
            Some(idle) => match tokio::time::timeout(idle, jobs.recv()).await {
                Ok(job) => job,
                Err(_elapsed) => {
                    tracing::info!(idle_secs = idle.as_secs(), "auto-locking idle keyring");
                    controller.lock();
                    publish(&mut controller, &events);
                    continue;
                }
            },
            None => jobs.recv().await,
        };
        let Some(job) = next else {
            break;
        };
        job(&mut controller);
        publish(&mut controller, &events);
    }
    tracing::debug!("keyring service stopped");
}
