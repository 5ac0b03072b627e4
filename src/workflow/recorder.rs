//! Run bookkeeping
//!
//! A Recorder identifies one experiment run: its status, logged params and
//! metrics, and the artifacts stored under its namespace.

use super::store::ArtifactStore;
use super::WorkflowError;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Reserved artifact name holding the serialized run metadata
pub const META_ARTIFACT: &str = "meta.json";

/// Run lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The run scope is open; params and metrics may be logged
    Running,
    /// The run scope exited cleanly
    Finished,
    /// The run scope exited with an error or was abandoned
    Failed,
}

/// Snapshot of a run's metadata
///
/// Persisted to the store under [`META_ARTIFACT`] on every mutation, so a run
/// backed by a durable store survives the process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    /// Unique run id
    pub id: Uuid,
    /// Experiment this run belongs to
    pub experiment: String,
    /// Lifecycle status
    pub status: RunStatus,
    /// Logged parameters
    pub params: BTreeMap<String, String>,
    /// Logged metrics
    pub metrics: BTreeMap<String, f64>,
    /// Names of artifacts stored under this run
    pub artifacts: BTreeSet<String>,
    /// When the run was opened
    pub started_at: DateTime<Utc>,
    /// When the run reached a terminal status
    pub ended_at: Option<DateTime<Utc>>,
}

/// The unit of bookkeeping for one experiment run
///
/// Params, metrics, and status freeze once the run reaches a terminal status;
/// artifact writes stay legal so analysis stages can be re-run against a
/// finished run fetched by id.
pub struct Recorder {
    store: Arc<dyn ArtifactStore>,
    meta: Mutex<RunMeta>,
}

impl Recorder {
    pub(crate) fn new(store: Arc<dyn ArtifactStore>, experiment: &str) -> Arc<Self> {
        let meta = RunMeta {
            id: Uuid::new_v4(),
            experiment: experiment.to_string(),
            status: RunStatus::Running,
            params: BTreeMap::new(),
            metrics: BTreeMap::new(),
            artifacts: BTreeSet::new(),
            started_at: Utc::now(),
            ended_at: None,
        };
        let recorder = Arc::new(Self {
            store,
            meta: Mutex::new(meta),
        });
        recorder.persist_meta_best_effort();
        recorder
    }

    /// Unique run id
    pub fn id(&self) -> Uuid {
        self.lock().id
    }

    /// Experiment name
    pub fn experiment(&self) -> String {
        self.lock().experiment.clone()
    }

    /// Current lifecycle status
    pub fn status(&self) -> RunStatus {
        self.lock().status
    }

    /// When the run reached a terminal status, if it has
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.lock().ended_at
    }

    /// Snapshot of the full metadata
    pub fn meta(&self) -> RunMeta {
        self.lock().clone()
    }

    /// Logged parameters
    pub fn params(&self) -> BTreeMap<String, String> {
        self.lock().params.clone()
    }

    /// Logged metrics
    pub fn metrics(&self) -> BTreeMap<String, f64> {
        self.lock().metrics.clone()
    }

    /// Merge key-value pairs into the params map
    ///
    /// Fails with [`WorkflowError::RunFrozen`] once the run is terminal.
    pub fn log_params<I, K, V>(&self, params: I) -> Result<(), WorkflowError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let snapshot = {
            let mut meta = self.lock();
            if meta.status != RunStatus::Running {
                return Err(WorkflowError::RunFrozen {
                    id: meta.id,
                    status: meta.status,
                });
            }
            meta.params
                .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
            meta.clone()
        };
        self.persist_meta(&snapshot)
    }

    /// Merge key-value pairs into the metrics map
    ///
    /// Fails with [`WorkflowError::RunFrozen`] once the run is terminal.
    pub fn log_metrics<I, K>(&self, metrics: I) -> Result<(), WorkflowError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let snapshot = {
            let mut meta = self.lock();
            if meta.status != RunStatus::Running {
                return Err(WorkflowError::RunFrozen {
                    id: meta.id,
                    status: meta.status,
                });
            }
            meta.metrics
                .extend(metrics.into_iter().map(|(k, v)| (k.into(), v)));
            meta.clone()
        };
        self.persist_meta(&snapshot)
    }

    /// Serialize a value and store it under the given artifact name
    ///
    /// Overwrites any previous artifact with the same name. The name
    /// [`META_ARTIFACT`] is reserved.
    pub fn put_artifact<T: Serialize>(&self, name: &str, value: &T) -> Result<(), WorkflowError> {
        let blob = serde_json::to_vec(value).map_err(|source| WorkflowError::Encode {
            name: name.to_string(),
            source,
        })?;
        self.store.put(&self.run_key(), name, &blob)?;
        let snapshot = {
            let mut meta = self.lock();
            meta.artifacts.insert(name.to_string());
            meta.clone()
        };
        self.persist_meta(&snapshot)
    }

    /// Load and deserialize a previously stored artifact
    pub fn load_artifact<T: DeserializeOwned>(&self, name: &str) -> Result<T, WorkflowError> {
        let blob = self.store.get(&self.run_key(), name)?;
        serde_json::from_slice(&blob).map_err(|source| WorkflowError::Decode {
            name: name.to_string(),
            source,
        })
    }

    /// Whether an artifact exists under this run
    pub fn has_artifact(&self, name: &str) -> Result<bool, WorkflowError> {
        Ok(self.store.exists(&self.run_key(), name)?)
    }

    /// Mark the run FAILED
    ///
    /// No-op if the run already reached a terminal status.
    pub fn mark_failed(&self) {
        self.set_terminal(RunStatus::Failed);
    }

    /// Transition to a terminal status; returns false if already terminal
    pub(crate) fn set_terminal(&self, status: RunStatus) -> bool {
        let snapshot = {
            let mut meta = self.lock();
            if meta.status != RunStatus::Running {
                return false;
            }
            meta.status = status;
            meta.ended_at = Some(Utc::now());
            meta.clone()
        };
        // Terminal transitions happen on drop paths as well, where persistence
        // failures cannot propagate
        if let Err(e) = self.persist_meta(&snapshot) {
            tracing::error!(run_id = %snapshot.id, error = %e, "Failed to persist run metadata");
        }
        true
    }

    fn run_key(&self) -> String {
        self.lock().id.to_string()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RunMeta> {
        self.meta.lock().expect("recorder lock poisoned")
    }

    fn persist_meta(&self, meta: &RunMeta) -> Result<(), WorkflowError> {
        let blob = serde_json::to_vec(meta).map_err(|source| WorkflowError::Encode {
            name: META_ARTIFACT.to_string(),
            source,
        })?;
        self.store.put(&meta.id.to_string(), META_ARTIFACT, &blob)?;
        Ok(())
    }

    fn persist_meta_best_effort(&self) {
        let meta = self.meta();
        if let Err(e) = self.persist_meta(&meta) {
            tracing::error!(run_id = %meta.id, error = %e, "Failed to persist run metadata");
        }
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let meta = self.lock();
        f.debug_struct("Recorder")
            .field("id", &meta.id)
            .field("experiment", &meta.experiment)
            .field("status", &meta.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::store::MemoryStore;

    fn recorder() -> Arc<Recorder> {
        Recorder::new(Arc::new(MemoryStore::new()), "test-exp")
    }

    #[test]
    fn test_new_recorder_is_running() {
        let rec = recorder();
        assert_eq!(rec.status(), RunStatus::Running);
        assert_eq!(rec.experiment(), "test-exp");
        assert!(rec.ended_at().is_none());
    }

    #[test]
    fn test_log_params_merges() {
        let rec = recorder();
        rec.log_params([("model", "gbdt")]).unwrap();
        rec.log_params([("topk", "50"), ("model", "linear")]).unwrap();

        let params = rec.params();
        assert_eq!(params["model"], "linear");
        assert_eq!(params["topk"], "50");
    }

    #[test]
    fn test_log_params_after_finish_fails() {
        let rec = recorder();
        rec.set_terminal(RunStatus::Finished);

        let result = rec.log_params([("late", "value")]);
        assert!(matches!(
            result,
            Err(WorkflowError::RunFrozen {
                status: RunStatus::Finished,
                ..
            })
        ));
    }

    #[test]
    fn test_log_metrics() {
        let rec = recorder();
        rec.log_metrics([("ic_mean", 0.05)]).unwrap();
        assert_eq!(rec.metrics()["ic_mean"], 0.05);

        rec.set_terminal(RunStatus::Failed);
        assert!(rec.log_metrics([("late", 1.0)]).is_err());
    }

    #[test]
    fn test_artifact_round_trip() {
        let rec = recorder();
        rec.put_artifact("numbers.json", &vec![1u32, 2, 3]).unwrap();

        let back: Vec<u32> = rec.load_artifact("numbers.json").unwrap();
        assert_eq!(back, vec![1, 2, 3]);
        assert!(rec.has_artifact("numbers.json").unwrap());
        assert!(rec.meta().artifacts.contains("numbers.json"));
    }

    #[test]
    fn test_load_missing_artifact_is_not_found() {
        let rec = recorder();
        let result: Result<Vec<u32>, _> = rec.load_artifact("missing.json");
        assert!(matches!(result, Err(WorkflowError::Store(_))));
    }

    #[test]
    fn test_artifact_write_allowed_after_finish() {
        let rec = recorder();
        rec.set_terminal(RunStatus::Finished);

        rec.put_artifact("late.json", &1u32).unwrap();
        let back: u32 = rec.load_artifact("late.json").unwrap();
        assert_eq!(back, 1);
    }

    #[test]
    fn test_terminal_status_set_once() {
        let rec = recorder();
        assert!(rec.set_terminal(RunStatus::Finished));
        assert!(!rec.set_terminal(RunStatus::Failed));
        assert_eq!(rec.status(), RunStatus::Finished);
    }

    #[test]
    fn test_meta_persisted_to_store() {
        let store = Arc::new(MemoryStore::new());
        let rec = Recorder::new(store.clone(), "persist-exp");
        rec.log_params([("k", "v")]).unwrap();

        let blob = store.get(&rec.id().to_string(), META_ARTIFACT).unwrap();
        let meta: RunMeta = serde_json::from_slice(&blob).unwrap();
        assert_eq!(meta.experiment, "persist-exp");
        assert_eq!(meta.params["k"], "v");
    }
}
