//! Scoring and tiering of scan results

use crate::config::RankingConfig;
use crate::error::{Result, TraderError};
use crate::reports::Action;
use crate::state::PipelineReport;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Conviction bucket; declaration order is output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Tier {
    Strong,
    Watch,
    Monitor,
    Excluded,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Strong => "Strong",
            Self::Watch => "Watch",
            Self::Monitor => "Monitor",
            Self::Excluded => "Excluded",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedEntry {
    pub ticker: String,
    pub tier: Tier,
    pub action: Action,
    pub score: f64,
    pub thesis: String,
    pub reward_to_risk: f64,
    pub strength_score: u8,
    pub degraded: bool,
}

/// Weighted blend of technical strength and capped reward-to-risk, on a 0..=10 scale
pub fn score(strength: f64, reward_to_risk: f64, config: &RankingConfig) -> f64 {
    let cap = config.reward_cap;
    let reward = 10.0 * reward_to_risk.min(cap) / cap;
    (config.strength_weight * strength + config.reward_weight * reward)
        / (config.strength_weight + config.reward_weight)
}

fn tier_for(score: f64, actionable: bool, config: &RankingConfig) -> Tier {
    if !actionable {
        Tier::Excluded
    } else if score >= config.strong_threshold {
        Tier::Strong
    } else if score >= config.watch_threshold {
        Tier::Watch
    } else {
        Tier::Monitor
    }
}

/// Score, tier and order `reports`.
///
/// WAIT signals and rejected trades are `Excluded`. Entries are ordered by
/// tier, then score descending, then ticker ascending, so the result does
/// not depend on input order. A non-finite score fails the whole ranking.
pub fn rank(reports: &[PipelineReport], config: &RankingConfig) -> Result<Vec<RankedEntry>> {
    let mut entries = reports
        .iter()
        .map(|report| {
            let strength = f64::from(report.technical.strength_score);
            let reward_to_risk = report.risk.reward_to_risk();
            let score = score(strength, reward_to_risk, config);
            if !score.is_finite() {
                return Err(TraderError::Ranking(format!(
                    "non-finite score for {} (strength {strength}, reward-to-risk {reward_to_risk})",
                    report.ticker
                )));
            }

            let action = report.signal.action();
            let actionable = action != Action::Wait && report.risk.is_approved();
            Ok(RankedEntry {
                ticker: report.ticker.to_string(),
                tier: tier_for(score, actionable, config),
                action,
                score,
                thesis: report.signal.thesis().to_string(),
                reward_to_risk,
                strength_score: report.technical.strength_score,
                degraded: report.is_degraded(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    entries.sort_by(|a, b| a.tier.cmp(&b.tier).then_with(|| by_score_then_ticker(a, b)));
    Ok(entries)
}

/// Score descending, ticker ascending
fn by_score_then_ticker(a: &RankedEntry, b: &RankedEntry) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.ticker.cmp(&b.ticker))
}
