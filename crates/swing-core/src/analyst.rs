//! Capability traits for the analysis stages

use crate::config::TraderConfig;
use crate::error::Result;
use crate::narrative::Narrator;
use crate::reports::{FundamentalReport, RiskAssessment, TechnicalReport, TradeSignal};
use crate::stages::{FundamentalAnalyst, RiskAnalyst, SynthesisAnalyst, TechnicalAnalyst};
use crate::state::{PipelineState, StageKind};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Non-fatal stage failure; the pipeline substitutes the stage's default report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("missing input: {0}")]
    MissingInput(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// One analysis stage producing a report of type `R` from the current state
#[async_trait]
pub trait Analyst<R>: Send + Sync
where
    R: Send + 'static,
{
    /// Short identifier used in logs
    fn name(&self) -> &str;

    async fn analyze(&self, state: &PipelineState) -> std::result::Result<R, StageError>;
}

/// Output of the synthesis stage
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub signal: TradeSignal,
    /// Degradations hit while producing the signal (for example a narrator fallback)
    pub notes: Vec<String>,
}

/// A stage report that knows its conservative default and where it lives in the state
pub trait StageReport: Sized + Send + 'static {
    const STAGE: StageKind;

    fn fallback(state: &PipelineState, reason: &str) -> Self;

    fn attach(self, state: PipelineState) -> Result<PipelineState>;
}

impl StageReport for TechnicalReport {
    const STAGE: StageKind = StageKind::Technical;

    fn fallback(_state: &PipelineState, reason: &str) -> Self {
        Self::insufficient(reason)
    }

    fn attach(self, state: PipelineState) -> Result<PipelineState> {
        state.with_technical(self)
    }
}

impl StageReport for FundamentalReport {
    const STAGE: StageKind = StageKind::Fundamental;

    fn fallback(_state: &PipelineState, reason: &str) -> Self {
        Self::neutral(reason)
    }

    fn attach(self, state: PipelineState) -> Result<PipelineState> {
        state.with_fundamental(self)
    }
}

impl StageReport for RiskAssessment {
    const STAGE: StageKind = StageKind::Risk;

    fn fallback(state: &PipelineState, reason: &str) -> Self {
        Self::rejected(state.snapshot().current_price, reason)
    }

    fn attach(self, state: PipelineState) -> Result<PipelineState> {
        state.with_risk(self)
    }
}

impl StageReport for Verdict {
    const STAGE: StageKind = StageKind::Synthesis;

    fn fallback(_state: &PipelineState, reason: &str) -> Self {
        Self {
            signal: TradeSignal::wait(format!("Standing aside: synthesis unavailable ({reason}).")),
            notes: Vec::new(),
        }
    }

    fn attach(self, state: PipelineState) -> Result<PipelineState> {
        let state = self
            .notes
            .into_iter()
            .fold(state, |state, note| state.degraded(StageKind::Synthesis, note));
        state.with_signal(self.signal)
    }
}

/// One analyst per stage; any of them can be swapped independently
#[derive(Clone)]
pub struct AnalysisBackend {
    pub technical: Arc<dyn Analyst<TechnicalReport>>,
    pub fundamental: Arc<dyn Analyst<FundamentalReport>>,
    pub risk: Arc<dyn Analyst<RiskAssessment>>,
    pub synthesis: Arc<dyn Analyst<Verdict>>,
}

impl AnalysisBackend {
    /// Deterministic rule-based analysts configured from `config`
    pub fn rule_based(config: &TraderConfig, narrator: Arc<dyn Narrator>) -> Result<Self> {
        Ok(Self {
            technical: Arc::new(TechnicalAnalyst::new()),
            fundamental: Arc::new(FundamentalAnalyst::new()?),
            risk: Arc::new(RiskAnalyst::new(config.risk.clone())),
            synthesis: Arc::new(SynthesisAnalyst::new(config.synthesis.clone(), narrator)),
        })
    }

    pub fn with_technical(mut self, analyst: Arc<dyn Analyst<TechnicalReport>>) -> Self {
        self.technical = analyst;
        self
    }

    pub fn with_fundamental(mut self, analyst: Arc<dyn Analyst<FundamentalReport>>) -> Self {
        self.fundamental = analyst;
        self
    }

    pub fn with_risk(mut self, analyst: Arc<dyn Analyst<RiskAssessment>>) -> Self {
        self.risk = analyst;
        self
    }

    pub fn with_synthesis(mut self, analyst: Arc<dyn Analyst<Verdict>>) -> Self {
        self.synthesis = analyst;
        self
    }
}
