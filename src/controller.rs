//! Serialized processing of watch batches.
//!
//! The reconciler is owned by a single task. Watch batches, status checks
//! and snapshot requests reach it through one command queue, so every batch
//! is fully applied before the next one starts and status pushes never
//! overlap a batch.
//!
//! [`ResourceWatcher`] is the polling feed that lists the watched resources
//! and hands each listing to the controller.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::address::{AddressDefinition, ConfigMap};
use crate::config::AgentConfig;
use crate::error::{AgentError, Result};
use crate::readiness::{ReadinessRecord, StatsMap, StatusReport};
use crate::reconciler::{AddressReconciler, Notification, ReconcileOutcome};
use crate::store::{ResourceKind, ResourceStore};

/// Default depth of the command queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Base delay between failed listings.
const BACKOFF_STEP_SECS: u64 = 2;

/// Upper bound of the delay between failed listings.
const MAX_BACKOFF_SECS: u64 = 60;

/// Commands processed by the controller task.
#[derive(Debug)]
enum Command {
    /// Apply a batch of watched resources.
    WatchUpdate {
        resources: Vec<ConfigMap>,
        reply: oneshot::Sender<ReconcileOutcome>,
    },
    /// Compare the ledger against broker stats.
    CheckStatus {
        stats: StatsMap,
        reply: oneshot::Sender<StatusReport>,
    },
    /// Report the current state.
    Snapshot {
        reply: oneshot::Sender<ControllerSnapshot>,
    },
    /// Stop processing.
    Shutdown,
}

/// Point-in-time view of the controller state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControllerSnapshot {
    /// Identity of this agent instance.
    pub agent_id: String,
    /// Batches processed so far.
    pub batches: u64,
    /// Last defined snapshot.
    pub defined: Vec<AddressDefinition>,
    /// Last ready snapshot.
    pub ready: Vec<AddressDefinition>,
    /// Readiness records ordered by address.
    pub readiness: Vec<ReadinessRecord>,
}

/// Handle for sending work to the controller task.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    commands: mpsc::Sender<Command>,
    notifications: broadcast::Sender<Notification>,
    agent_id: String,
}

/// Returns an identity for this agent instance.
#[must_use]
pub fn agent_identity() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| String::from("unknown"));
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("{host}-{}-{suffix}", std::process::id())
}

/// Spawns the controller task owning `reconciler`.
///
/// The task stops when [`ControllerHandle::shutdown`] is called or every
/// handle is dropped.
#[must_use]
pub fn spawn<S>(reconciler: AddressReconciler<S>, queue_depth: usize) -> (ControllerHandle, JoinHandle<()>)
where
    S: ResourceStore + 'static,
{
    let (commands, receiver) = mpsc::channel(queue_depth.max(1));
    let agent_id = agent_identity();
    let handle = ControllerHandle {
        commands,
        notifications: reconciler.notification_sender(),
        agent_id: agent_id.clone(),
    };

    let span = info_span!("controller", agent = %agent_id);
    let task = tokio::spawn(run(reconciler, receiver, agent_id).instrument(span));
    (handle, task)
}

async fn run<S: ResourceStore>(
    mut reconciler: AddressReconciler<S>,
    mut receiver: mpsc::Receiver<Command>,
    agent_id: String,
) {
    info!("Controller started");
    let mut batches: u64 = 0;

    while let Some(command) = receiver.recv().await {
        match command {
            Command::WatchUpdate { resources, reply } => {
                batches += 1;
                let outcome = reconciler.on_watch_update(&resources);
                debug!("Batch {batches} processed: {outcome:?}");
                let _ = reply.send(outcome);
            }
            Command::CheckStatus { stats, reply } => {
                let report = reconciler.check_status(&stats).await;
                let _ = reply.send(report);
            }
            Command::Snapshot { reply } => {
                let snapshot = ControllerSnapshot {
                    agent_id: agent_id.clone(),
                    batches,
                    defined: reconciler.last_defined().map(<[_]>::to_vec).unwrap_or_default(),
                    ready: reconciler.last_ready().map(<[_]>::to_vec).unwrap_or_default(),
                    readiness: reconciler.ledger().records().cloned().collect(),
                };
                let _ = reply.send(snapshot);
            }
            Command::Shutdown => break,
        }
    }

    info!("Controller stopped after {batches} batches");
}

impl ControllerHandle {
    /// Returns the identity of the agent instance.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Subscribes to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Applies a batch of watched resources and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller has stopped.
    pub async fn watch_update(&self, resources: Vec<ConfigMap>) -> Result<ReconcileOutcome> {
        self.request(|reply| Command::WatchUpdate { resources, reply }).await
    }

    /// Runs a readiness check and waits for every status push to settle.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller has stopped.
    pub async fn check_status(&self, stats: StatsMap) -> Result<StatusReport> {
        self.request(|reply| Command::CheckStatus { stats, reply }).await
    }

    /// Returns the current controller state.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller has stopped.
    pub async fn snapshot(&self) -> Result<ControllerSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Asks the controller to stop after the commands already queued.
    pub async fn shutdown(&self) {
        if self.commands.send(Command::Shutdown).await.is_err() {
            debug!("Controller already stopped");
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| AgentError::internal("Controller is not running"))?;
        response
            .await
            .map_err(|_| AgentError::internal("Controller dropped the request"))
    }
}

/// Polling feed of the watched address resources.
#[derive(Debug)]
pub struct ResourceWatcher<S: ResourceStore> {
    store: Arc<S>,
    selector: String,
    resync_interval: Duration,
}

impl<S: ResourceStore> ResourceWatcher<S> {
    /// Creates a watcher for the resources selected by `config`.
    #[must_use]
    pub fn new(store: Arc<S>, config: &AgentConfig) -> Self {
        Self {
            store,
            selector: config.watch_selector(),
            resync_interval: Duration::from_secs(config.store.resync_interval_secs.max(1)),
        }
    }

    /// Overrides the interval between listings.
    #[must_use]
    pub const fn with_resync_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval;
        self
    }

    /// Returns the label selector of the watched resources.
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Lists the watched resources once.
    ///
    /// Objects that are not shaped like a `ConfigMap` are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub async fn list_once(&self) -> Result<Vec<ConfigMap>> {
        let objects = self
            .store
            .list(ResourceKind::ConfigMap, Some(&self.selector))
            .await?;

        Ok(objects
            .into_iter()
            .filter_map(|object| match serde_json::from_value::<ConfigMap>(object) {
                Ok(config_map) => Some(config_map),
                Err(e) => {
                    warn!("Ignoring malformed resource: {e}");
                    None
                }
            })
            .collect())
    }

    /// Lists the watched resources every resync interval and feeds each
    /// listing to `controller` until `shutdown` turns true.
    ///
    /// Failed listings are retried with a linearly growing delay.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller stops before the watcher.
    pub async fn run(&self, controller: &ControllerHandle, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            "Watching {} ({}) every {}s",
            self.selector,
            self.store.backend_type(),
            self.resync_interval.as_secs()
        );
        let mut failures: u64 = 0;

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.list_once().await {
                Ok(resources) => {
                    failures = 0;
                    controller.watch_update(resources).await?;
                    self.resync_interval
                }
                Err(e) => {
                    failures += 1;
                    let delay = backoff_delay(failures);
                    if e.is_retryable() {
                        warn!("Listing failed (attempt {failures}), retrying in {}s: {e}", delay.as_secs());
                    } else {
                        error!("Listing failed (attempt {failures}), retrying in {}s: {e}", delay.as_secs());
                    }
                    e.retry_delay_secs()
                        .map_or(delay, |secs| delay.max(Duration::from_secs(secs)))
                }
            };

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tokio::time::sleep(delay) => {}
            }
        }

        info!("Watcher stopped");
        Ok(())
    }
}

/// Returns the delay after `failures` consecutive failed listings.
#[must_use]
pub fn backoff_delay(failures: u64) -> Duration {
    Duration::from_secs(failures.saturating_mul(BACKOFF_STEP_SECS).min(MAX_BACKOFF_SECS))
}
