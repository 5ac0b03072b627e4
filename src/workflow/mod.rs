//! Experiment workflow
//!
//! Run lifecycle, artifact persistence, and the generate-once/load-many
//! computation stages

mod context;
mod recorder;
mod stages;
mod store;

pub use context::{ExperimentContext, Run};
pub use recorder::{Recorder, RunMeta, RunStatus, META_ARTIFACT};
pub use stages::{
    GeneratePolicy, PortfolioAnalysisStage, SignalAnalysisStage, SignalStage, Stage,
};
pub use store::{ArtifactStore, FileStore, MemoryStore, StoreError};

use crate::analysis::AnalysisError;
use crate::backtest::BacktestError;
use crate::config::ConfigError;
use crate::data::DataError;
use crate::model::ModelError;
use thiserror::Error;
use uuid::Uuid;

/// Workflow errors
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Artifact storage failure, including missing artifacts
    #[error(transparent)]
    Store(#[from] StoreError),
    /// No recorder matches the lookup
    #[error("recorder not found for experiment '{experiment}' (id: {id:?})")]
    RecorderNotFound {
        experiment: String,
        id: Option<Uuid>,
    },
    /// The run reached a terminal status and no longer accepts updates
    #[error("run {id} is {status:?} and can no longer be updated")]
    RunFrozen { id: Uuid, status: RunStatus },
    /// Strict-policy guard: the stage already generated this artifact
    #[error("artifact '{name}' already generated for run {id}")]
    AlreadyGenerated { id: Uuid, name: String },
    /// Artifact serialization failure
    #[error("failed to encode artifact '{name}': {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    /// Artifact deserialization failure
    #[error("failed to decode artifact '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Backtest(#[from] BacktestError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}
