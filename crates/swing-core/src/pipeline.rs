//! Single-ticker pipeline runner
//!
//! A run fetches one [`TickerSnapshot`] and drives it through the four
//! analysis stages in order:
//!
//! 1. Data gateway (a failure here aborts the run)
//! 2. Technical analysis
//! 3. Fundamental analysis
//! 4. Risk assessment
//! 5. Synthesis into a [`TradeSignal`](crate::reports::TradeSignal)
//!
//! Stage failures are not fatal. The stage's conservative default report is
//! attached instead and the run is marked degraded, so every run that gets
//! past the gateway ends in exactly one signal.

use crate::analyst::{AnalysisBackend, Analyst, StageReport};
use crate::error::{Result, TraderError};
use crate::gateway::MarketDataGateway;
use crate::state::{PipelineOutcome, PipelineReport, PipelineState, StageKind};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Runs the stage sequence for one ticker at a time; share it behind an `Arc`
pub struct Pipeline {
    gateway: Arc<dyn MarketDataGateway>,
    backend: AnalysisBackend,
}

impl Pipeline {
    pub fn new(gateway: Arc<dyn MarketDataGateway>, backend: AnalysisBackend) -> Self {
        Self { gateway, backend }
    }

    /// Run every stage for `ticker`.
    ///
    /// Returns `Aborted` when the gateway cannot produce a snapshot. An `Err`
    /// means the stage ordering itself was violated.
    #[instrument(skip_all, fields(ticker = %ticker))]
    pub async fn run(&self, ticker: &str, sector: Option<&str>) -> Result<PipelineOutcome> {
        let snapshot = match self.gateway.fetch(ticker, sector).await {
            Ok(snapshot) => snapshot,
            Err(failure) => {
                warn!(reason = %failure.reason, "Data gateway failed: {}", failure.detail);
                return Ok(PipelineOutcome::Aborted(failure));
            },
        };

        let mut state = PipelineState::new(snapshot);
        if state.snapshot().is_incomplete() {
            let gaps = format!("incomplete snapshot: {:?}", state.snapshot().gaps);
            state = state.degraded(StageKind::Data, gaps);
        }

        let state = run_stage(self.backend.technical.as_ref(), state).await?;
        let state = run_stage(self.backend.fundamental.as_ref(), state).await?;
        let state = run_stage(self.backend.risk.as_ref(), state).await?;
        let state = run_stage(self.backend.synthesis.as_ref(), state).await?;

        let report = state.finish()?;
        info!(
            action = %report.signal.action(),
            strength = report.technical.strength_score,
            reward_to_risk = report.risk.reward_to_risk(),
            degraded = report.is_degraded(),
            "Pipeline complete"
        );
        Ok(PipelineOutcome::Signaled(Box::new(report)))
    }

    /// Like [`Pipeline::run`], with a gateway failure surfaced as an error
    pub async fn analyze(&self, ticker: &str, sector: Option<&str>) -> Result<PipelineReport> {
        match self.run(ticker, sector).await? {
            PipelineOutcome::Signaled(report) => Ok(*report),
            PipelineOutcome::Aborted(failure) => Err(TraderError::Data(failure)),
        }
    }
}

async fn run_stage<R>(analyst: &dyn Analyst<R>, state: PipelineState) -> Result<PipelineState>
where
    R: StageReport,
{
    match analyst.analyze(&state).await {
        Ok(report) => report.attach(state),
        Err(e) => {
            warn!(stage = analyst.name(), "Stage failed, using conservative default: {e}");
            let reason = e.to_string();
            let report = R::fallback(&state, &reason);
            report.attach(state.degraded(R::STAGE, reason))
        },
    }
}
