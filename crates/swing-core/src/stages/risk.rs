//! Stop, targets, sizing and the approval gate

use crate::analyst::{Analyst, StageError};
use crate::config::RiskConfig;
use crate::reports::{
    Bias, Direction, FundamentalReport, RiskAssessment, RiskInputs, TechnicalReport,
    TurnaroundProbability,
};
use crate::state::PipelineState;
use async_trait::async_trait;
use tracing::debug;

/// Pessimistic desk: derives levels from structure and rejects anything marginal
#[derive(Debug, Clone, Default)]
pub struct RiskAnalyst {
    config: RiskConfig,
}

impl RiskAnalyst {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn assess(
        &self,
        entry: f64,
        technical: &TechnicalReport,
        fundamental: &FundamentalReport,
    ) -> RiskAssessment {
        let cfg = &self.config;
        let mut rejection_reasons = Vec::new();

        let direction = match technical.bias {
            Bias::Bearish => Direction::Short,
            Bias::Bullish => Direction::Long,
            Bias::Neutral => {
                rejection_reasons.push("no directional technical bias".to_string());
                Direction::Long
            },
        };

        let stop_loss = self.stop_for(direction, entry, technical);
        let (target1, target2) = self.targets_for(direction, entry, technical);

        let stop_pct = (entry - stop_loss).abs() / entry * 100.0;
        let mut max_allocation_pct =
            (cfg.risk_per_trade_pct / stop_pct * 100.0).min(cfg.max_position_pct);
        if fundamental.turnaround_probability == TurnaroundProbability::Low {
            max_allocation_pct /= 2.0;
        }
        let position_size = (cfg.capital * max_allocation_pct / 100.0 / entry).floor().max(0.0) as u64;

        if let Some(atr) = technical.indicators.atr_14 {
            let atr_pct = atr / entry * 100.0;
            if atr_pct > cfg.max_volatility_pct {
                rejection_reasons.push(format!(
                    "too volatile for a swing trade: ATR {atr_pct:.1}% of price exceeds {:.1}%",
                    cfg.max_volatility_pct
                ));
            }
        }

        if fundamental.risk_flags.len() >= cfg.max_risk_flags {
            rejection_reasons.push(format!(
                "{} fundamental red flags (limit {})",
                fundamental.risk_flags.len(),
                cfg.max_risk_flags
            ));
        }

        let assessment = RiskAssessment::new(RiskInputs {
            direction,
            entry,
            stop_loss,
            target1,
            target2,
            max_allocation_pct,
            position_size,
            rejection_reasons,
        });
        debug!(
            ?direction,
            stop_loss,
            target1,
            reward_to_risk = assessment.reward_to_risk(),
            approved = assessment.is_approved(),
            "Risk assessed"
        );
        assessment
    }

    /// Just beyond the nearest opposing level, held between the min and max stop distance
    fn stop_for(&self, direction: Direction, entry: f64, technical: &TechnicalReport) -> f64 {
        let cfg = &self.config;
        let level_pct = match direction {
            Direction::Long => technical
                .nearest_support()
                .map(|s| (entry - s * (1.0 - cfg.stop_buffer_pct / 100.0)) / entry * 100.0),
            Direction::Short => technical
                .nearest_resistance()
                .map(|r| (r * (1.0 + cfg.stop_buffer_pct / 100.0) - entry) / entry * 100.0),
        };
        let pct = level_pct
            .filter(|pct| pct.is_finite())
            .unwrap_or(cfg.default_stop_pct)
            .clamp(cfg.min_stop_pct, cfg.max_stop_pct);

        match direction {
            Direction::Long => entry * (1.0 - pct / 100.0),
            Direction::Short => entry * (1.0 + pct / 100.0),
        }
    }

    /// Nearest level in the trade direction, then the next one or a 2x projection
    fn targets_for(&self, direction: Direction, entry: f64, technical: &TechnicalReport) -> (f64, f64) {
        let default_move = entry * self.config.default_target_pct / 100.0;
        let (levels, fallback) = match direction {
            Direction::Long => (&technical.resistance_levels, entry + default_move),
            Direction::Short => (&technical.support_levels, entry - default_move),
        };

        let target1 = levels.first().copied().unwrap_or(fallback);
        let target2 = levels
            .get(1)
            .copied()
            .unwrap_or(entry + 2.0 * (target1 - entry));
        (target1, target2)
    }
}

#[async_trait]
impl Analyst<RiskAssessment> for RiskAnalyst {
    fn name(&self) -> &str {
        "risk"
    }

    async fn analyze(&self, state: &PipelineState) -> Result<RiskAssessment, StageError> {
        let technical = state
            .technical()
            .ok_or_else(|| StageError::MissingInput("technical report".to_string()))?;
        let fundamental = state
            .fundamental()
            .ok_or_else(|| StageError::MissingInput("fundamental report".to_string()))?;

        let entry = state.snapshot().current_price;
        if !(entry.is_finite() && entry > 0.0) {
            return Err(StageError::InsufficientData(format!("unusable entry price {entry}")));
        }

        Ok(self.assess(entry, technical, fundamental))
    }
}
