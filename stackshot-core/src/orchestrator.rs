/*!
Runs backup or restore across S3, SQS and SNS, in that order.

A service that cannot be reached is skipped; any other failure is recorded
against its step. Neither stops the remaining services from running.
*/

use std::fmt;
use tracing::{error, info, warn};

use crate::cloud::{Connector, Service};
use crate::ops::{
    backup_object_storage, backup_topics, drain_backup, restore_object_storage, restore_queues,
    restore_topics, Transfer,
};
use crate::snapshot::SnapshotStore;
use crate::storage::StorageAdapter;
use crate::{Result, StackshotError};

/// Which run is being performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Backup,
    Restore,
}

impl fmt::Display for RunKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunKind::Backup => "backup",
            RunKind::Restore => "restore",
        })
    }
}

/// How one service's step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed { containers: usize, items: usize },
    /// The service could not be reached
    Skipped { reason: String },
    Failed { error: String },
}

impl StepOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepOutcome::Completed { .. })
    }

    /// Short status label for summaries
    pub fn label(&self) -> &'static str {
        match self {
            StepOutcome::Completed { .. } => "completed",
            StepOutcome::Skipped { .. } => "skipped",
            StepOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub service: Service,
    pub outcome: StepOutcome,
}

impl StepReport {
    fn settle(kind: RunKind, service: Service, result: Result<Transfer>) -> Self {
        let outcome = match result {
            Ok(Transfer { containers, items }) => {
                info!(%service, %kind, containers, items, "Step completed");
                StepOutcome::Completed { containers, items }
            }
            Err(e) => {
                if e.is_connection() {
                    warn!(%service, error = %e, "Unable to connect to {service}, skipping");
                } else {
                    error!(%service, %kind, error = %e, "Step failed");
                }
                StepOutcome::from(&e)
            }
        };
        Self { service, outcome }
    }
}

/// Per-service results of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub kind: RunKind,
    pub steps: Vec<StepReport>,
}

impl RunReport {
    /// True when every service step completed
    pub fn all_completed(&self) -> bool {
        self.steps.iter().all(|step| step.outcome.is_completed())
    }

    pub fn step(&self, service: Service) -> Option<&StepReport> {
        self.steps.iter().find(|step| step.service == service)
    }
}

/// Drives the per-service operations against one environment and one
/// snapshot store
///
/// # Example
/// ```rust,no_run
/// use stackshot_core::{AwsConnector, EmulatorConfig, LocalFileStorage, Orchestrator, SnapshotStore};
///
/// # async fn run() -> stackshot_core::Result<()> {
/// let config = EmulatorConfig::default();
/// let store = SnapshotStore::new(LocalFileStorage::with_base_dir(&config.snapshot_dir));
/// let orchestrator = Orchestrator::new(AwsConnector::new(config).await?, store);
///
/// let report = orchestrator.backup().await;
/// assert!(report.all_completed());
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator<C: Connector, S: StorageAdapter> {
    connector: C,
    store: SnapshotStore<S>,
}

impl<C: Connector, S: StorageAdapter> Orchestrator<C, S> {
    pub fn new(connector: C, store: SnapshotStore<S>) -> Self {
        Self { connector, store }
    }

    pub fn store(&self) -> &SnapshotStore<S> {
        &self.store
    }

    /// Capture S3, then drain SQS, then capture SNS
    pub async fn backup(&self) -> RunReport {
        info!("Starting backup");
        let mut steps = Vec::with_capacity(Service::ALL.len());
        for service in Service::ALL {
            let result = match service {
                Service::ObjectStorage => match self.connector.object_storage().await {
                    Ok(client) => backup_object_storage(client.as_ref(), &self.store).await,
                    Err(e) => Err(e),
                },
                Service::Queues => match self.connector.queues().await {
                    Ok(client) => drain_backup(client.as_ref(), &self.store).await,
                    Err(e) => Err(e),
                },
                Service::Topics => match self.connector.topics().await {
                    Ok(client) => backup_topics(client.as_ref(), &self.store).await,
                    Err(e) => Err(e),
                },
            };
            steps.push(StepReport::settle(RunKind::Backup, service, result));
        }
        RunReport {
            kind: RunKind::Backup,
            steps,
        }
    }

    /// Recreate S3, then SQS, then SNS from the snapshot
    pub async fn restore(&self) -> RunReport {
        info!("Starting restore");
        let mut steps = Vec::with_capacity(Service::ALL.len());
        for service in Service::ALL {
            let result = match service {
                Service::ObjectStorage => match self.connector.object_storage().await {
                    Ok(client) => restore_object_storage(client.as_ref(), &self.store).await,
                    Err(e) => Err(e),
                },
                Service::Queues => match self.connector.queues().await {
                    Ok(client) => restore_queues(client.as_ref(), &self.store).await,
                    Err(e) => Err(e),
                },
                Service::Topics => match self.connector.topics().await {
                    Ok(client) => restore_topics(client.as_ref(), &self.store).await,
                    Err(e) => Err(e),
                },
            };
            steps.push(StepReport::settle(RunKind::Restore, service, result));
        }
        RunReport {
            kind: RunKind::Restore,
            steps,
        }
    }
}

impl From<&StackshotError> for StepOutcome {
    fn from(e: &StackshotError) -> Self {
        if e.is_connection() {
            StepOutcome::Skipped {
                reason: e.to_string(),
            }
        } else {
            StepOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}
