//! Per-run pipeline state.
//!
//! A [`PipelineState`] belongs to exactly one ticker run. Stages never mutate
//! it in place: each `with_*` call consumes the state and returns it with one
//! more report attached, refusing to overwrite a populated field or to skip
//! ahead of the stage order.

use crate::error::{DataFailure, Result, TraderError};
use crate::model::{DataGap, Ticker, TickerSnapshot};
use crate::reports::{Action, Direction, FundamentalReport, RiskAssessment, TechnicalReport, TradeSignal};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PipelinePhase {
    Start,
    Fetched,
    TechnicallyAnalyzed,
    FundamentallyAnalyzed,
    RiskAssessed,
    Signaled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageKind {
    Data,
    Technical,
    Fundamental,
    Risk,
    Synthesis,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Data => "data",
            Self::Technical => "technical",
            Self::Fundamental => "fundamental",
            Self::Risk => "risk",
            Self::Synthesis => "synthesis",
        })
    }
}

/// A stage fell back to a conservative default or partial input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Degradation {
    pub stage: StageKind,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PipelineState {
    phase: PipelinePhase,
    snapshot: TickerSnapshot,
    technical: Option<TechnicalReport>,
    fundamental: Option<FundamentalReport>,
    risk: Option<RiskAssessment>,
    signal: Option<TradeSignal>,
    degradations: Vec<Degradation>,
}

impl PipelineState {
    pub fn new(snapshot: TickerSnapshot) -> Self {
        Self {
            phase: PipelinePhase::Fetched,
            snapshot,
            technical: None,
            fundamental: None,
            risk: None,
            signal: None,
            degradations: Vec::new(),
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn snapshot(&self) -> &TickerSnapshot {
        &self.snapshot
    }

    pub fn ticker(&self) -> &Ticker {
        &self.snapshot.ticker
    }

    pub fn technical(&self) -> Option<&TechnicalReport> {
        self.technical.as_ref()
    }

    pub fn fundamental(&self) -> Option<&FundamentalReport> {
        self.fundamental.as_ref()
    }

    pub fn risk(&self) -> Option<&RiskAssessment> {
        self.risk.as_ref()
    }

    pub fn signal(&self) -> Option<&TradeSignal> {
        self.signal.as_ref()
    }

    pub fn degradations(&self) -> &[Degradation] {
        &self.degradations
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }

    pub fn with_technical(mut self, report: TechnicalReport) -> Result<Self> {
        self.advance(PipelinePhase::Fetched, PipelinePhase::TechnicallyAnalyzed, self.technical.is_some())?;
        self.technical = Some(report);
        Ok(self)
    }

    pub fn with_fundamental(mut self, report: FundamentalReport) -> Result<Self> {
        self.advance(
            PipelinePhase::TechnicallyAnalyzed,
            PipelinePhase::FundamentallyAnalyzed,
            self.fundamental.is_some(),
        )?;
        self.fundamental = Some(report);
        Ok(self)
    }

    pub fn with_risk(mut self, assessment: RiskAssessment) -> Result<Self> {
        self.advance(PipelinePhase::FundamentallyAnalyzed, PipelinePhase::RiskAssessed, self.risk.is_some())?;
        self.risk = Some(assessment);
        Ok(self)
    }

    /// Attach the final signal.
    ///
    /// A BUY or SELL that the stored risk assessment does not back (rejected,
    /// wrong direction, or different stop/target) is forced to WAIT and the
    /// run is marked degraded.
    pub fn with_signal(mut self, signal: TradeSignal) -> Result<Self> {
        self.advance(PipelinePhase::RiskAssessed, PipelinePhase::Signaled, self.signal.is_some())?;
        let conflict = self.risk.as_ref().and_then(|risk| signal_conflict(&signal, risk));
        let signal = match conflict {
            Some(reason) => {
                let forced = TradeSignal::wait(signal.thesis());
                self = self.degraded(StageKind::Synthesis, format!("signal forced to WAIT: {reason}"));
                forced
            },
            None => signal,
        };
        self.signal = Some(signal);
        Ok(self)
    }

    /// Record that `stage` ran on degraded input or fell back to its default
    pub fn degraded(mut self, stage: StageKind, reason: impl Into<String>) -> Self {
        self.degradations.push(Degradation {
            stage,
            reason: reason.into(),
        });
        self
    }

    fn advance(&mut self, expected: PipelinePhase, next: PipelinePhase, populated: bool) -> Result<()> {
        if populated {
            return Err(TraderError::State(format!(
                "{next:?} output already attached for {}",
                self.snapshot.ticker
            )));
        }
        if self.phase != expected {
            return Err(TraderError::State(format!(
                "cannot move {} from {:?} to {next:?}",
                self.snapshot.ticker, self.phase
            )));
        }
        self.phase = next;
        Ok(())
    }

    /// Freeze a signaled state into its report
    pub fn finish(self) -> Result<PipelineReport> {
        let (Some(technical), Some(fundamental), Some(risk), Some(signal)) =
            (self.technical, self.fundamental, self.risk, self.signal)
        else {
            return Err(TraderError::State(format!(
                "{} finished in phase {:?}",
                self.snapshot.ticker, self.phase
            )));
        };

        Ok(PipelineReport {
            ticker: self.snapshot.ticker,
            sector: self.snapshot.sector,
            current_price: self.snapshot.current_price,
            data_gaps: self.snapshot.gaps,
            technical,
            fundamental,
            risk,
            signal,
            degradations: self.degradations,
        })
    }
}

fn signal_conflict(signal: &TradeSignal, risk: &RiskAssessment) -> Option<String> {
    let expected = match signal.action() {
        Action::Wait => return None,
        Action::Buy => Direction::Long,
        Action::Sell => Direction::Short,
    };
    let differs = |level: Option<f64>, stored: f64| level.is_none_or(|v| (v - stored).abs() > 1e-9);

    if !risk.is_approved() {
        Some("risk assessment was rejected".to_string())
    } else if risk.direction() != expected {
        Some(format!("{} against a {:?} assessment", signal.action(), risk.direction()))
    } else if differs(signal.stop_loss(), risk.stop_loss()) {
        Some("stop loss differs from the risk assessment".to_string())
    } else if differs(signal.target1(), risk.target1()) || differs(signal.target2(), risk.target2()) {
        Some("targets differ from the risk assessment".to_string())
    } else {
        None
    }
}

/// Terminal record of a run that reached `Signaled`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub ticker: Ticker,
    pub sector: Option<String>,
    pub current_price: f64,
    pub data_gaps: Vec<DataGap>,
    pub technical: TechnicalReport,
    pub fundamental: FundamentalReport,
    pub risk: RiskAssessment,
    pub signal: TradeSignal,
    pub degradations: Vec<Degradation>,
}

impl PipelineReport {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// How a single-ticker run ended
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    Signaled(Box<PipelineReport>),
    Aborted(DataFailure),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::fixture::snapshot_from_closes;
    use crate::reports::RiskInputs;

    fn state() -> PipelineState {
        PipelineState::new(snapshot_from_closes("ITC.NS", &[100.0, 101.0, 102.0]))
    }

    #[test]
    fn test_stages_append_in_order() {
        let state = state();
        assert_eq!(state.phase(), PipelinePhase::Fetched);

        let state = state
            .with_technical(TechnicalReport::insufficient("short"))
            .unwrap()
            .with_fundamental(FundamentalReport::neutral("no news"))
            .unwrap()
            .with_risk(RiskAssessment::rejected(102.0, "neutral"))
            .unwrap()
            .with_signal(TradeSignal::wait("nothing to do"))
            .unwrap();
        assert_eq!(state.phase(), PipelinePhase::Signaled);

        let report = state.finish().unwrap();
        assert_eq!(report.signal.action(), Action::Wait);
        assert_eq!(report.ticker.as_str(), "ITC.NS");
    }

    #[test]
    fn test_populated_field_cannot_be_rewritten() {
        let state = state()
            .with_technical(TechnicalReport::insufficient("first"))
            .unwrap();
        let err = state
            .with_technical(TechnicalReport::insufficient("second"))
            .unwrap_err();
        assert!(matches!(err, TraderError::State(_)));
    }

    #[test]
    fn test_stage_order_is_enforced() {
        let err = state()
            .with_risk(RiskAssessment::rejected(100.0, "skip ahead"))
            .unwrap_err();
        assert!(matches!(err, TraderError::State(_)));
    }

    #[test]
    fn test_unfinished_state_has_no_report() {
        assert!(state().finish().is_err());
    }

    fn assessed(risk: RiskAssessment) -> PipelineState {
        state()
            .with_technical(TechnicalReport::insufficient("short"))
            .unwrap()
            .with_fundamental(FundamentalReport::neutral("no news"))
            .unwrap()
            .with_risk(risk)
            .unwrap()
    }

    fn approved_long() -> RiskAssessment {
        RiskAssessment::new(RiskInputs {
            direction: Direction::Long,
            entry: 100.0,
            stop_loss: 95.0,
            target1: 110.0,
            target2: 120.0,
            max_allocation_pct: 10.0,
            position_size: 10,
            rejection_reasons: Vec::new(),
        })
    }

    #[test]
    fn test_buy_against_rejected_risk_forced_to_wait() {
        let buy = TradeSignal::directional(&approved_long(), 1.0, "breakout");
        assert_eq!(buy.action(), Action::Buy);

        let report = assessed(RiskAssessment::rejected(100.0, "too volatile"))
            .with_signal(buy)
            .unwrap()
            .finish()
            .unwrap();
        assert!(!report.risk.is_approved());
        assert_eq!(report.signal.action(), Action::Wait);
        assert_eq!(report.signal.thesis(), "breakout");
        assert_eq!(report.degradations[0].stage, StageKind::Synthesis);
    }

    #[test]
    fn test_buy_with_foreign_levels_forced_to_wait() {
        let other = RiskAssessment::new(RiskInputs {
            direction: Direction::Long,
            entry: 100.0,
            stop_loss: 90.0,
            target1: 125.0,
            target2: 140.0,
            max_allocation_pct: 10.0,
            position_size: 10,
            rejection_reasons: Vec::new(),
        });
        assert!(other.is_approved());
        let report = assessed(approved_long())
            .with_signal(TradeSignal::directional(&other, 1.0, "breakout"))
            .unwrap()
            .finish()
            .unwrap();
        assert_eq!(report.signal.action(), Action::Wait);
        assert!(report.degradations[0].reason.contains("stop loss"));
    }

    #[test]
    fn test_matching_buy_is_kept() {
        let risk = approved_long();
        let report = assessed(risk.clone())
            .with_signal(TradeSignal::directional(&risk, 1.0, "breakout"))
            .unwrap()
            .finish()
            .unwrap();
        assert_eq!(report.signal.action(), Action::Buy);
        assert!(!report.is_degraded());
    }

    #[test]
    fn test_degradation_is_recorded() {
        let state = state().degraded(StageKind::Technical, "one bar");
        assert!(state.is_degraded());
        assert_eq!(state.degradations()[0].stage, StageKind::Technical);
    }
}
