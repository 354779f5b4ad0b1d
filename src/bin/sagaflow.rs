//! sagaflow: Saga orchestration daemon
//!
//! Loads configuration, registers the configured workflow documents,
//! resumes every saga left incomplete by a previous run, then keeps the
//! engine alive until ctrl-c.
//!
//! ## Configuration
//! ```yaml
//! storage:
//!   type: sqlite
//!   sqlite:
//!     path: data/sagaflow.db
//!
//! workflows:
//!   paths:
//!     - workflows/
//!
//! endpoints:
//!   - name: inventory
//!     address: http://inventory:8080
//!   - name: payments
//!     address: http://payments:8080
//!
//! notifier:
//!   type: webhook
//!   webhook:
//!     endpoint: http://audit:9000/saga-events
//! ```

use tracing::{error, info};

use sagaflow::config::Config;
use sagaflow::orchestrator::Orchestrator;
use sagaflow::utils::bootstrap::{init_tracing, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None).map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;
    let recover_on_startup = config.engine.recover_on_startup;

    let orchestrator = Orchestrator::builder(config).build().await?;

    let workflows = orchestrator.list_workflows().await;
    info!(
        workflows = workflows.len(),
        names = ?workflows.iter().map(|w| w.name.as_str()).collect::<Vec<_>>(),
        "sagaflow started"
    );

    if recover_on_startup {
        let report = orchestrator.recover().await?;
        info!(
            resumed = report.resumed.len(),
            orphaned = report.orphaned.len(),
            "Startup recovery dispatched"
        );
    }

    shutdown_signal().await;

    let in_flight = orchestrator.engine().active().len();
    if in_flight > 0 {
        info!(in_flight, "Exiting with sagas in flight; they resume on next start");
    }
    Ok(())
}
