//! Experiment context and scoped run lifecycle

use super::recorder::{Recorder, RunStatus};
use super::store::ArtifactStore;
use super::WorkflowError;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Manages recorder lifecycle for one artifact store
///
/// Every recorder is created through a context and owned by it; later lookups
/// by (experiment, id) hand out shared references.
pub struct ExperimentContext {
    store: Arc<dyn ArtifactStore>,
    registry: Mutex<Vec<Arc<Recorder>>>,
}

impl ExperimentContext {
    /// Create a context over the given store
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            registry: Mutex::new(Vec::new()),
        }
    }

    /// Open a new run under the given experiment
    ///
    /// The returned guard keeps the run RUNNING until it is resolved: call
    /// [`Run::finish`] for a clean exit, or let the guard drop (early return,
    /// panic) to mark the run FAILED. The terminal status is written exactly
    /// once either way.
    pub fn start(&self, experiment: &str) -> Run {
        let recorder = Recorder::new(self.store.clone(), experiment);
        self.registry
            .lock()
            .expect("registry lock poisoned")
            .push(recorder.clone());
        tracing::info!(run_id = %recorder.id(), experiment, "Run started");
        Run {
            recorder,
            resolved: false,
        }
    }

    /// Open a run, execute the body, and resolve the terminal status
    ///
    /// `Ok` from the body marks the run FINISHED; `Err` marks it FAILED and
    /// propagates the error.
    pub fn run<T, E, F>(&self, experiment: &str, body: F) -> Result<T, E>
    where
        F: FnOnce(&Arc<Recorder>) -> Result<T, E>,
    {
        let run = self.start(experiment);
        let recorder = run.recorder().clone();
        match body(&recorder) {
            Ok(value) => {
                run.finish();
                Ok(value)
            }
            Err(e) => {
                run.fail();
                Err(e)
            }
        }
    }

    /// Look up a recorder
    ///
    /// With an id, returns that run regardless of status. Without one, returns
    /// the most recently finished run of the experiment.
    pub fn get_recorder(
        &self,
        experiment: &str,
        recorder_id: Option<Uuid>,
    ) -> Result<Arc<Recorder>, WorkflowError> {
        let registry = self.registry.lock().expect("registry lock poisoned");
        let found = match recorder_id {
            Some(id) => registry
                .iter()
                .find(|r| r.experiment() == experiment && r.id() == id)
                .cloned(),
            None => {
                let mut latest: Option<Arc<Recorder>> = None;
                for rec in registry.iter() {
                    if rec.experiment() != experiment || rec.status() != RunStatus::Finished {
                        continue;
                    }
                    // >= so that ties resolve to the later start
                    if latest
                        .as_ref()
                        .map_or(true, |best| rec.ended_at() >= best.ended_at())
                    {
                        latest = Some(rec.clone());
                    }
                }
                latest
            }
        };
        found.ok_or_else(|| WorkflowError::RecorderNotFound {
            experiment: experiment.to_string(),
            id: recorder_id,
        })
    }

    /// All recorders of an experiment, in creation order
    pub fn list_recorders(&self, experiment: &str) -> Vec<Arc<Recorder>> {
        self.registry
            .lock()
            .expect("registry lock poisoned")
            .iter()
            .filter(|r| r.experiment() == experiment)
            .cloned()
            .collect()
    }
}

/// Scope guard for an open run
///
/// Dropping the guard without calling [`Run::finish`] marks the run FAILED.
pub struct Run {
    recorder: Arc<Recorder>,
    resolved: bool,
}

impl Run {
    /// The recorder backing this run
    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    /// Mark the run FINISHED
    pub fn finish(mut self) {
        self.resolved = true;
        self.recorder.set_terminal(RunStatus::Finished);
        tracing::info!(run_id = %self.recorder.id(), "Run finished");
    }

    /// Mark the run FAILED
    pub fn fail(mut self) {
        self.resolved = true;
        self.recorder.set_terminal(RunStatus::Failed);
        tracing::warn!(run_id = %self.recorder.id(), "Run failed");
    }
}

impl Drop for Run {
    fn drop(&mut self) {
        if !self.resolved && self.recorder.set_terminal(RunStatus::Failed) {
            tracing::warn!(run_id = %self.recorder.id(), "Run abandoned, marked failed");
        }
    }
}

impl std::ops::Deref for Run {
    type Target = Recorder;

    fn deref(&self) -> &Self::Target {
        &self.recorder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::store::MemoryStore;

    fn context() -> ExperimentContext {
        ExperimentContext::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_run_closure_finishes_on_ok() {
        let ctx = context();
        let id = ctx
            .run("exp", |rec| Ok::<_, WorkflowError>(rec.id()))
            .unwrap();

        let rec = ctx.get_recorder("exp", Some(id)).unwrap();
        assert_eq!(rec.status(), RunStatus::Finished);
    }

    #[test]
    fn test_run_closure_fails_on_err() {
        let ctx = context();
        let result: Result<(), WorkflowError> = ctx.run("exp", |rec| {
            rec.log_params([("k", "v")])?;
            Err(WorkflowError::RecorderNotFound {
                experiment: "exp".to_string(),
                id: None,
            })
        });
        assert!(result.is_err());

        let rec = ctx.list_recorders("exp").pop().unwrap();
        assert_eq!(rec.status(), RunStatus::Failed);
        assert_eq!(rec.params()["k"], "v");
    }

    #[test]
    fn test_dropped_guard_marks_failed() {
        let ctx = context();
        let id = {
            let run = ctx.start("exp");
            run.recorder().id()
            // guard dropped without finish
        };

        let rec = ctx.get_recorder("exp", Some(id)).unwrap();
        assert_eq!(rec.status(), RunStatus::Failed);
    }

    #[test]
    fn test_panic_marks_failed() {
        let ctx = context();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _run = ctx.start("exp");
            panic!("body blew up");
        }));
        assert!(result.is_err());

        let rec = ctx.list_recorders("exp").pop().unwrap();
        assert_eq!(rec.status(), RunStatus::Failed);
    }

    #[test]
    fn test_get_recorder_latest_finished() {
        let ctx = context();
        let first = ctx.run("exp", |r| Ok::<_, WorkflowError>(r.id())).unwrap();
        let second = ctx.run("exp", |r| Ok::<_, WorkflowError>(r.id())).unwrap();

        // An open run must not shadow the finished ones
        let _open = ctx.start("exp");

        let latest = ctx.get_recorder("exp", None).unwrap();
        assert_eq!(latest.id(), second);
        assert_ne!(latest.id(), first);
    }

    #[test]
    fn test_get_recorder_unknown_is_error() {
        let ctx = context();
        let result = ctx.get_recorder("exp", Some(Uuid::new_v4()));
        assert!(matches!(
            result,
            Err(WorkflowError::RecorderNotFound { .. })
        ));

        let result = ctx.get_recorder("exp", None);
        assert!(matches!(
            result,
            Err(WorkflowError::RecorderNotFound { id: None, .. })
        ));
    }

    #[test]
    fn test_experiments_are_separate() {
        let ctx = context();
        ctx.run("exp-a", |_| Ok::<_, WorkflowError>(())).unwrap();

        assert!(ctx.get_recorder("exp-b", None).is_err());
        assert_eq!(ctx.list_recorders("exp-a").len(), 1);
        assert!(ctx.list_recorders("exp-b").is_empty());
    }
}
