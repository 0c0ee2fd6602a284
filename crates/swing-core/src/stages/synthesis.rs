//! Head-trader synthesis: agree, size and narrate, or stand aside

use crate::analyst::{Analyst, StageError, Verdict};
use crate::config::SynthesisConfig;
use crate::narrative::{NarrativeContext, Narrator, TemplateNarrator};
use crate::reports::{
    Action, Bias, Direction, FundamentalReport, RiskAssessment, TechnicalReport, TradeSignal,
};
use crate::state::PipelineState;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct SynthesisAnalyst {
    config: SynthesisConfig,
    narrator: Arc<dyn Narrator>,
}

impl SynthesisAnalyst {
    pub fn new(config: SynthesisConfig, narrator: Arc<dyn Narrator>) -> Self {
        Self { config, narrator }
    }

    /// Reason to stand aside, if any
    fn wait_reason(
        &self,
        technical: &TechnicalReport,
        fundamental: &FundamentalReport,
        risk: &RiskAssessment,
    ) -> Option<String> {
        if !risk.is_approved() {
            let reasons = risk.rejection_reasons().join("; ");
            return Some(format!("risk desk rejected the trade ({reasons})"));
        }
        if !technical.bias.is_directional() {
            return Some("no directional technical bias".to_string());
        }
        if technical.bias.opposes(fundamental.bias) {
            return Some(format!(
                "{} technicals conflict with {} fundamentals",
                technical.bias, fundamental.bias
            ));
        }
        if fundamental.bias == Bias::Neutral {
            let strong_enough = technical.strength_score >= self.config.neutral_fundamental_min_strength;
            if !strong_enough || !fundamental.risk_flags.is_empty() {
                return Some(format!(
                    "neutral fundamentals need technical strength {}+ and no red flags (strength {}, {} flag(s))",
                    self.config.neutral_fundamental_min_strength,
                    technical.strength_score,
                    fundamental.risk_flags.len()
                ));
            }
        }
        None
    }

    pub async fn decide(
        &self,
        ticker: &str,
        technical: &TechnicalReport,
        fundamental: &FundamentalReport,
        risk: &RiskAssessment,
    ) -> Verdict {
        let wait_reason = self.wait_reason(technical, fundamental, risk);
        let action = match (&wait_reason, risk.direction()) {
            (Some(_), _) => Action::Wait,
            (None, Direction::Long) => Action::Buy,
            (None, Direction::Short) => Action::Sell,
        };
        debug!(%action, ?wait_reason, "Synthesis decided");

        let context = NarrativeContext {
            ticker: ticker.to_string(),
            action,
            technical_bias: technical.bias,
            fundamental_bias: fundamental.bias,
            strength_score: technical.strength_score,
            daily_trend: technical.daily_trend.to_string(),
            weekly_trend: technical.weekly_trend.to_string(),
            catalysts: fundamental.catalysts.iter().take(2).cloned().collect(),
            valuation: fundamental.valuation,
            entry: risk.entry(),
            stop_loss: risk.stop_loss(),
            target1: risk.target1(),
            reward_to_risk: risk.reward_to_risk(),
            wait_reason,
        };

        let mut notes = Vec::new();
        let thesis = match self.narrator.narrate(&context).await {
            Ok(thesis) => thesis,
            Err(e) => {
                warn!("Narrator failed, using template thesis: {e}");
                notes.push(format!("narrator unavailable, template thesis used: {e}"));
                TemplateNarrator::render(&context)
            },
        };

        let signal = if action == Action::Wait {
            TradeSignal::wait(thesis)
        } else {
            TradeSignal::directional(risk, self.config.entry_band_pct, thesis)
        };

        Verdict { signal, notes }
    }
}

#[async_trait]
impl Analyst<Verdict> for SynthesisAnalyst {
    fn name(&self) -> &str {
        "synthesis"
    }

    async fn analyze(&self, state: &PipelineState) -> Result<Verdict, StageError> {
        let missing = |what: &str| StageError::MissingInput(format!("{what} report"));
        let technical = state.technical().ok_or_else(|| missing("technical"))?;
        let fundamental = state.fundamental().ok_or_else(|| missing("fundamental"))?;
        let risk = state.risk().ok_or_else(|| missing("risk"))?;

        Ok(self
            .decide(state.ticker().as_str(), technical, fundamental, risk)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TraderError;
    use crate::narrative::MockNarrator;
    use crate::reports::{RiskInputs, TurnaroundProbability};

    fn technical(bias: Bias, strength: u8) -> TechnicalReport {
        let mut report = TechnicalReport::insufficient("test");
        report.bias = bias;
        report.strength_score = strength;
        report
    }

    fn fundamental(bias: Bias, flags: usize) -> FundamentalReport {
        let mut report = FundamentalReport::neutral("test");
        report.bias = bias;
        report.turnaround_probability = TurnaroundProbability::Medium;
        report.risk_flags = (0..flags).map(|i| format!("flag {i}")).collect();
        report
    }

    fn risk(direction: Direction, stop_loss: f64, target1: f64) -> RiskAssessment {
        RiskAssessment::new(RiskInputs {
            direction,
            entry: 100.0,
            stop_loss,
            target1,
            target2: target1 + (target1 - 100.0),
            max_allocation_pct: 10.0,
            position_size: 10,
            rejection_reasons: Vec::new(),
        })
    }

    fn template() -> SynthesisAnalyst {
        SynthesisAnalyst::new(SynthesisConfig::default(), Arc::new(TemplateNarrator))
    }

    #[tokio::test]
    async fn test_agreeing_long_buys() {
        let verdict = template()
            .decide(
                "ITC.NS",
                &technical(Bias::Bullish, 6),
                &fundamental(Bias::Bullish, 0),
                &risk(Direction::Long, 95.0, 112.0),
            )
            .await;

        let signal = verdict.signal;
        assert_eq!(signal.action(), Action::Buy);
        let zone = signal.entry_zone().unwrap();
        assert!((zone.low - 99.0).abs() < 1e-9);
        assert!((zone.high - 100.0).abs() < 1e-9);
        assert_eq!(signal.stop_loss(), Some(95.0));
        assert!(verdict.notes.is_empty());
    }

    #[tokio::test]
    async fn test_short_sells() {
        let verdict = template()
            .decide(
                "ITC.NS",
                &technical(Bias::Bearish, 8),
                &fundamental(Bias::Bearish, 0),
                &risk(Direction::Short, 104.0, 88.0),
            )
            .await;
        assert_eq!(verdict.signal.action(), Action::Sell);
        let zone = verdict.signal.entry_zone().unwrap();
        assert!((zone.high - 101.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rejected_risk_waits() {
        let verdict = template()
            .decide(
                "ITC.NS",
                &technical(Bias::Bullish, 9),
                &fundamental(Bias::Bullish, 0),
                &risk(Direction::Long, 95.0, 108.0),
            )
            .await;
        assert_eq!(verdict.signal.action(), Action::Wait);
        assert!(verdict.signal.entry_zone().is_none());
        assert!(verdict.signal.thesis().contains("rejected"));
    }

    #[tokio::test]
    async fn test_conflicting_biases_wait() {
        let verdict = template()
            .decide(
                "ITC.NS",
                &technical(Bias::Bullish, 9),
                &fundamental(Bias::Bearish, 0),
                &risk(Direction::Long, 95.0, 112.0),
            )
            .await;
        assert_eq!(verdict.signal.action(), Action::Wait);
    }

    #[tokio::test]
    async fn test_neutral_fundamentals_need_strength() {
        let analyst = template();
        let long = risk(Direction::Long, 95.0, 112.0);

        let weak = analyst
            .decide("ITC.NS", &technical(Bias::Bullish, 6), &fundamental(Bias::Neutral, 0), &long)
            .await;
        assert_eq!(weak.signal.action(), Action::Wait);

        let strong = analyst
            .decide("ITC.NS", &technical(Bias::Bullish, 7), &fundamental(Bias::Neutral, 0), &long)
            .await;
        assert_eq!(strong.signal.action(), Action::Buy);

        let flagged = analyst
            .decide("ITC.NS", &technical(Bias::Bullish, 9), &fundamental(Bias::Neutral, 1), &long)
            .await;
        assert_eq!(flagged.signal.action(), Action::Wait);
    }

    #[tokio::test]
    async fn test_narrator_failure_falls_back_to_template() {
        let mut narrator = MockNarrator::new();
        narrator
            .expect_narrate()
            .times(1)
            .returning(|_| Err(TraderError::Upstream("model offline".to_string())));

        let analyst = SynthesisAnalyst::new(SynthesisConfig::default(), Arc::new(narrator));
        let verdict = analyst
            .decide(
                "ITC.NS",
                &technical(Bias::Bullish, 8),
                &fundamental(Bias::Bullish, 0),
                &risk(Direction::Long, 95.0, 112.0),
            )
            .await;

        assert_eq!(verdict.signal.action(), Action::Buy);
        assert!(verdict.signal.thesis().starts_with("ITC.NS:"));
        assert_eq!(verdict.notes.len(), 1);
    }

    #[tokio::test]
    async fn test_narrator_text_is_used() {
        let mut narrator = MockNarrator::new();
        narrator
            .expect_narrate()
            .withf(|ctx| ctx.action == Action::Buy && ctx.ticker == "ITC.NS")
            .returning(|_| Ok("Momentum and an FMCG tailwind favour a long.".to_string()));

        let analyst = SynthesisAnalyst::new(SynthesisConfig::default(), Arc::new(narrator));
        let verdict = analyst
            .decide(
                "ITC.NS",
                &technical(Bias::Bullish, 8),
                &fundamental(Bias::Bullish, 0),
                &risk(Direction::Long, 95.0, 112.0),
            )
            .await;
        assert_eq!(verdict.signal.thesis(), "Momentum and an FMCG tailwind favour a long.");
    }
}
