/*!
# Stackshot Core Engine

Backup and restore of a local AWS emulator's S3, SQS and SNS state.

A backup run captures:

- Every bucket name and every object body
- Every queue URL and every message, draining each queue as it goes
- Every topic ARN and every subscription, with its dead-letter target

into six JSON artifacts in a snapshot directory. A restore run recreates the
same resources in a (presumed empty) emulator from those artifacts.

## Architecture

- `cloud` holds narrow async traits per service, with AWS SDK implementations
- `ops` holds one backup/restore pair per service, written against those traits
- `snapshot` and `storage` persist artifacts through a pluggable adapter
- `Orchestrator` runs the three services in order and reports per step

## Usage

```rust,no_run
use stackshot_core::{AwsConnector, EmulatorConfig, LocalFileStorage, Orchestrator, SnapshotStore};

# async fn run() -> stackshot_core::Result<()> {
let config = EmulatorConfig::default().with_snapshot_dir("./snapshot");
let store = SnapshotStore::new(LocalFileStorage::with_base_dir(&config.snapshot_dir));
let orchestrator = Orchestrator::new(AwsConnector::new(config).await?, store);

let report = orchestrator.backup().await;
for step in &report.steps {
    println!("{}: {}", step.service, step.outcome.label());
}
# Ok(())
# }
```
*/

pub mod cloud;
pub mod config;
pub mod error;
pub mod observability;
pub mod ops;
pub mod orchestrator;
pub mod records;
pub mod snapshot;
pub mod storage;

pub use cloud::{AwsConnector, Connector, Service};
pub use config::EmulatorConfig;
pub use error::{Result, StackshotError};
pub use observability::{init_default_observability, init_observability};
pub use orchestrator::{Orchestrator, RunKind, RunReport, StepOutcome, StepReport};
pub use snapshot::{SnapshotFile, SnapshotStore};
pub use storage::{LocalFileStorage, StorageAdapter};

#[cfg(feature = "metrics")]
pub use observability::StackshotMetrics;
