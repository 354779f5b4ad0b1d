//! Declarative workflow sources.
//!
//! Workflows are YAML documents:
//!
//! ```yaml
//! name: order-fulfillment
//! compensate_on_cancel: false
//! steps:
//!   - name: reserve-inventory
//!     service: inventory-service
//!     method: reserve
//!     compensate: release
//!     timeout_secs: 30
//!     retry: { max_attempts: 3, initial_backoff_ms: 1000 }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::model::{
    RetryPolicy, WorkflowDefinition, WorkflowStep, DEFAULT_INITIAL_BACKOFF,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_STEP_TIMEOUT,
};

use super::RegistryError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct WorkflowDocument {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    compensate_on_cancel: bool,
    #[serde(default)]
    steps: Vec<StepDocument>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct StepDocument {
    name: String,
    service: String,
    method: String,
    #[serde(default)]
    compensate: Option<String>,
    #[serde(default)]
    timeout_secs: Option<u64>,
    #[serde(default)]
    retry: Option<RetryDocument>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RetryDocument {
    max_attempts: Option<u32>,
    initial_backoff_ms: Option<u64>,
}

impl From<StepDocument> for WorkflowStep {
    fn from(doc: StepDocument) -> Self {
        let retry = doc.retry.unwrap_or_default();
        WorkflowStep {
            name: doc.name,
            service_name: doc.service,
            forward_method: doc.method,
            compensate_method: doc.compensate.filter(|m| !m.trim().is_empty()),
            timeout: doc
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_STEP_TIMEOUT),
            // Not clamped: zero attempts must fail validation.
            retry: RetryPolicy {
                max_attempts: retry.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
                initial_backoff: retry
                    .initial_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_INITIAL_BACKOFF),
            },
        }
    }
}

/// Parse and validate one workflow document.
pub fn parse_workflow(source: &str) -> Result<WorkflowDefinition, RegistryError> {
    let doc: WorkflowDocument = serde_yaml::from_str(source)?;
    let definition = WorkflowDefinition {
        name: doc.name,
        description: doc.description,
        steps: doc.steps.into_iter().map(WorkflowStep::from).collect(),
        compensate_on_cancel: doc.compensate_on_cancel,
    };
    definition.validate()?;
    Ok(definition)
}

fn is_workflow_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn collect_files(path: &Path) -> Result<Vec<PathBuf>, RegistryError> {
    let io_err = |source| RegistryError::Io {
        path: path.display().to_string(),
        source,
    };

    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path).map_err(io_err)? {
        let entry_path = entry.map_err(io_err)?.path();
        if entry_path.is_file() && is_workflow_file(&entry_path) {
            files.push(entry_path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load every workflow found under `paths`.
///
/// Each path is a YAML file or a directory whose `*.yaml`/`*.yml` files are
/// read (non-recursive). Unreadable or malformed files are skipped with a
/// warning.
pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> Vec<WorkflowDefinition> {
    let mut definitions = Vec::new();

    for root in paths {
        let files = match collect_files(root.as_ref()) {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "Skipping workflow source");
                continue;
            }
        };

        for file in files {
            let loaded = std::fs::read_to_string(&file)
                .map_err(|source| RegistryError::Io {
                    path: file.display().to_string(),
                    source,
                })
                .and_then(|source| parse_workflow(&source));

            match loaded {
                Ok(definition) => {
                    debug!(path = %file.display(), workflow = %definition.name, "Loaded workflow");
                    definitions.push(definition);
                }
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Skipping malformed workflow file");
                }
            }
        }
    }

    definitions
}
