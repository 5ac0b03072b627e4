//! Computation stages
//!
//! Each stage computes one or more named artifacts for a recorder exactly
//! once and serves them from the store afterwards.

use super::recorder::{Recorder, RunStatus};
use super::WorkflowError;
use crate::analysis::{
    information_coefficient, portfolio_analysis, AnalysisResult, DailySeries,
    TRADING_DAYS_PER_YEAR,
};
use crate::backtest::{BacktestEngine, Exchange, TopkDropoutStrategy, TradeAccount};
use crate::config::PortfolioConfig;
use crate::data::{DataError, Dataset, Segment, Signal};
use crate::model::Model;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// What a second `generate()` call does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeneratePolicy {
    /// Recompute and overwrite the existing artifacts
    #[default]
    Overwrite,
    /// Refuse with [`WorkflowError::AlreadyGenerated`]
    Strict,
}

/// Generate-once/load-many contract over a recorder
///
/// `generate` computes and persists the stage's artifacts; `load` serves a
/// previously generated artifact; `get_path` resolves an artifact name to its
/// store key without touching storage.
pub trait Stage {
    /// The recorder this stage writes under
    fn recorder(&self) -> &Arc<Recorder>;

    /// Regeneration policy
    fn policy(&self) -> GeneratePolicy;

    /// Subdirectory for this stage's artifacts, empty for the run root
    fn artifact_dir(&self) -> &'static str {
        ""
    }

    /// Artifact names this stage generates
    fn artifact_names(&self) -> &'static [&'static str];

    /// Compute and persist the artifacts
    ///
    /// Called through [`Stage::generate`], which applies the policy guard and
    /// failure handling.
    fn produce(&self) -> Result<(), WorkflowError>;

    /// Resolve an artifact name to its store key (pure, no I/O)
    fn get_path(&self, name: &str) -> String {
        let dir = self.artifact_dir();
        if dir.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", dir, name)
        }
    }

    /// Compute the stage's artifacts
    ///
    /// Under the strict policy a second call fails with `AlreadyGenerated`.
    /// A production failure marks the owning recorder FAILED; the atomic
    /// store writes guarantee no partial artifact is left behind.
    fn generate(&self) -> Result<(), WorkflowError> {
        if self.policy() == GeneratePolicy::Strict {
            for name in self.artifact_names() {
                let path = self.get_path(name);
                if self.recorder().has_artifact(&path)? {
                    return Err(WorkflowError::AlreadyGenerated {
                        id: self.recorder().id(),
                        name: path,
                    });
                }
            }
        }
        match self.produce() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.recorder().mark_failed();
                Err(e)
            }
        }
    }

    /// Load a previously generated artifact
    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T, WorkflowError>
    where
        Self: Sized,
    {
        self.recorder().load_artifact(&self.get_path(name))
    }
}

/// Produces the predicted score table from the model
pub struct SignalStage<'a> {
    model: &'a dyn Model,
    dataset: &'a dyn Dataset,
    recorder: Arc<Recorder>,
    policy: GeneratePolicy,
}

impl<'a> SignalStage<'a> {
    /// Artifact name of the predicted signal
    pub const PRED_ARTIFACT: &'static str = "pred.json";

    /// Create the stage with the default overwrite policy
    pub fn new(model: &'a dyn Model, dataset: &'a dyn Dataset, recorder: Arc<Recorder>) -> Self {
        Self {
            model,
            dataset,
            recorder,
            policy: GeneratePolicy::default(),
        }
    }

    /// Override the regeneration policy
    pub fn with_policy(mut self, policy: GeneratePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load the generated signal
    pub fn load_signal(&self) -> Result<Signal, WorkflowError> {
        self.load(Self::PRED_ARTIFACT)
    }
}

impl Stage for SignalStage<'_> {
    fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    fn policy(&self) -> GeneratePolicy {
        self.policy
    }

    fn artifact_names(&self) -> &'static [&'static str] {
        &[Self::PRED_ARTIFACT]
    }

    fn produce(&self) -> Result<(), WorkflowError> {
        let signal = self.model.predict(self.dataset)?;
        if signal.is_empty() {
            return Err(DataError::EmptySegment(Segment::Test).into());
        }
        self.recorder.put_artifact(Self::PRED_ARTIFACT, &signal)?;
        tracing::info!(
            run_id = %self.recorder.id(),
            rows = signal.len(),
            "Stored predicted signal"
        );
        Ok(())
    }
}

/// Scores the signal against realized labels (IC/RIC series)
pub struct SignalAnalysisStage<'a> {
    dataset: &'a dyn Dataset,
    recorder: Arc<Recorder>,
    policy: GeneratePolicy,
}

impl<'a> SignalAnalysisStage<'a> {
    /// Artifact name of the daily information-coefficient series
    pub const IC_ARTIFACT: &'static str = "ic.json";
    /// Artifact name of the daily rank information-coefficient series
    pub const RIC_ARTIFACT: &'static str = "ric.json";

    /// Create the stage with the default overwrite policy
    pub fn new(dataset: &'a dyn Dataset, recorder: Arc<Recorder>) -> Self {
        Self {
            dataset,
            recorder,
            policy: GeneratePolicy::default(),
        }
    }

    /// Override the regeneration policy
    pub fn with_policy(mut self, policy: GeneratePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load the generated IC series
    pub fn load_ic(&self) -> Result<DailySeries, WorkflowError> {
        self.load(Self::IC_ARTIFACT)
    }

    /// Load the generated rank IC series
    pub fn load_ric(&self) -> Result<DailySeries, WorkflowError> {
        self.load(Self::RIC_ARTIFACT)
    }
}

impl Stage for SignalAnalysisStage<'_> {
    fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    fn policy(&self) -> GeneratePolicy {
        self.policy
    }

    fn artifact_dir(&self) -> &'static str {
        "signal_analysis"
    }

    fn artifact_names(&self) -> &'static [&'static str] {
        &[Self::IC_ARTIFACT, Self::RIC_ARTIFACT]
    }

    fn produce(&self) -> Result<(), WorkflowError> {
        let signal: Signal = self.recorder.load_artifact(SignalStage::PRED_ARTIFACT)?;
        let labels = self.dataset.labels(Segment::Test)?;
        let (ic, ric) = information_coefficient(&signal, &labels)?;

        self.recorder
            .put_artifact(&self.get_path(Self::IC_ARTIFACT), &ic)?;
        self.recorder
            .put_artifact(&self.get_path(Self::RIC_ARTIFACT), &ric)?;

        // Summary metrics are logged only while the run is open; regenerating
        // on a finished run keeps the original summary
        if self.recorder.status() == RunStatus::Running {
            let mut metrics = vec![("ic_mean", series_mean(&ic)), ("ric_mean", series_mean(&ric))];
            if let Some(icir) = series_ir(&ic) {
                metrics.push(("icir", icir));
            }
            if let Some(ricir) = series_ir(&ric) {
                metrics.push(("ricir", ricir));
            }
            self.recorder.log_metrics(metrics)?;
        }

        tracing::info!(
            run_id = %self.recorder.id(),
            days = ic.len(),
            "Stored information-coefficient series"
        );
        Ok(())
    }
}

fn series_mean(series: &DailySeries) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    series.values().sum::<f64>() / series.len() as f64
}

/// Mean over standard deviation; None when the deviation is zero
fn series_ir(series: &DailySeries) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }
    let mean = series_mean(series);
    let n = series.len() as f64;
    let ss = series.values().map(|v| (v - mean) * (v - mean)).sum::<f64>();
    let std = (ss / (n - 1.0)).sqrt();
    (std > 0.0).then(|| mean / std)
}

/// Replays the signal through the backtest and stores the risk report
pub struct PortfolioAnalysisStage<'a> {
    recorder: Arc<Recorder>,
    config: PortfolioConfig,
    exchange: &'a Exchange,
    policy: GeneratePolicy,
}

impl<'a> PortfolioAnalysisStage<'a> {
    /// Artifact name of the day-by-day trade account
    pub const REPORT_ARTIFACT: &'static str = "report.json";
    /// Artifact name of the aggregated risk metrics
    pub const PORT_ANALYSIS_ARTIFACT: &'static str = "port_analysis.json";

    /// Create the stage with the default overwrite policy
    pub fn new(recorder: Arc<Recorder>, config: PortfolioConfig, exchange: &'a Exchange) -> Self {
        Self {
            recorder,
            config,
            exchange,
            policy: GeneratePolicy::default(),
        }
    }

    /// Override the regeneration policy
    pub fn with_policy(mut self, policy: GeneratePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load the generated trade account
    pub fn load_account(&self) -> Result<TradeAccount, WorkflowError> {
        self.load(Self::REPORT_ARTIFACT)
    }

    /// Load the generated risk metrics
    pub fn load_analysis(&self) -> Result<AnalysisResult, WorkflowError> {
        self.load(Self::PORT_ANALYSIS_ARTIFACT)
    }
}

impl Stage for PortfolioAnalysisStage<'_> {
    fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    fn policy(&self) -> GeneratePolicy {
        self.policy
    }

    fn artifact_dir(&self) -> &'static str {
        "portfolio_analysis"
    }

    fn artifact_names(&self) -> &'static [&'static str] {
        &[Self::REPORT_ARTIFACT, Self::PORT_ANALYSIS_ARTIFACT]
    }

    fn produce(&self) -> Result<(), WorkflowError> {
        let signal: Signal = self.recorder.load_artifact(SignalStage::PRED_ARTIFACT)?;

        let strategy = TopkDropoutStrategy::new(&self.config.strategy)?;
        let engine = BacktestEngine::new(self.config.backtest.clone(), self.exchange, strategy)?;
        let account = engine.run(&signal)?;
        let analysis = portfolio_analysis(&account, TRADING_DAYS_PER_YEAR)?;

        self.recorder
            .put_artifact(&self.get_path(Self::REPORT_ARTIFACT), &account)?;
        self.recorder
            .put_artifact(&self.get_path(Self::PORT_ANALYSIS_ARTIFACT), &analysis)?;

        tracing::info!(
            run_id = %self.recorder.id(),
            days = account.len(),
            final_value = %account.final_value(),
            "Stored portfolio analysis"
        );
        Ok(())
    }
}
