//! Headline and ratio screening

use crate::analyst::{Analyst, StageError};
use crate::error::Result;
use crate::model::{TickerSnapshot, ratio};
use crate::reports::{Bias, FundamentalReport, TurnaroundProbability, Valuation};
use crate::state::PipelineState;
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

const CATALYST_TERMS: &[&str] = &[
    "order win",
    "order wins",
    "bags order",
    "wins order",
    "wins contract",
    "bags contract",
    "contract win",
    "partnership",
    "partners",
    "launch",
    "launches",
    "EV",
    "PLI",
    "AI",
    "expansion",
    "expands",
    "capacity",
    "acquisition",
    "acquires",
    "approval",
    "approves",
    "upgrade",
    "upgrades",
    "record high",
    "record profit",
    "record revenue",
    "record sales",
    "buyback",
    "beats estimates",
];

const RED_FLAG_TERMS: &[&str] = &[
    "investigation",
    "fraud",
    "downgrade",
    "downgrades",
    "resign",
    "resigns",
    "resignation",
    "penalty",
    "fined",
    "lawsuit",
    "default",
    "defaults",
    "pledge",
    "pledged",
    "raid",
    "insolvency",
    "show cause",
    "recall",
    "misses estimates",
];

const MAX_CATALYSTS: usize = 5;
const CATALYST_POINTS_CAP: usize = 3;

const MAX_DEBT_TO_EQUITY: f64 = 1.5;

/// Word-bounded, case-insensitive alternation over `terms`
fn lexicon(terms: &[&str]) -> Result<Regex> {
    let alternation = terms
        .iter()
        .map(|term| regex::escape(term))
        .collect::<Vec<_>>()
        .join("|");
    Ok(Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))?)
}

/// Catalysts, red flags and valuation from headlines and ratios
#[derive(Debug, Clone)]
pub struct FundamentalAnalyst {
    catalyst_re: Regex,
    red_flag_re: Regex,
}

impl FundamentalAnalyst {
    pub fn new() -> Result<Self> {
        Ok(Self {
            catalyst_re: lexicon(CATALYST_TERMS)?,
            red_flag_re: lexicon(RED_FLAG_TERMS)?,
        })
    }

    pub fn assess(&self, snapshot: &TickerSnapshot) -> FundamentalReport {
        let news = &snapshot.recent_news;
        let mut flags = Vec::new();

        let catalyst_hits: Vec<&String> =
            news.iter().filter(|h| self.catalyst_re.is_match(h)).collect();
        let red_flag_hits: Vec<&String> =
            news.iter().filter(|h| self.red_flag_re.is_match(h)).collect();

        let catalysts: Vec<String> = catalyst_hits
            .iter()
            .take(MAX_CATALYSTS)
            .map(|h| (*h).clone())
            .collect();

        let mut risk_flags: Vec<String> = red_flag_hits.iter().map(|h| (*h).clone()).collect();
        risk_flags.extend(ratio_flags(snapshot));

        let sentiment_score = if news.is_empty() {
            flags.push("no recent headlines".to_string());
            0.0
        } else {
            let net = catalyst_hits.len() as f64 - red_flag_hits.len() as f64;
            (net / news.len() as f64).clamp(-1.0, 1.0)
        };

        let valuation = valuation_of(snapshot);
        if valuation == Valuation::Unknown {
            flags.push("valuation ratios unavailable".to_string());
        }

        let turnaround_probability = turnaround(catalysts.len(), valuation, risk_flags.len());
        let bias = bias_of(turnaround_probability, valuation, risk_flags.len());

        debug!(
            catalysts = catalysts.len(),
            risk_flags = risk_flags.len(),
            ?valuation,
            ?turnaround_probability,
            ?bias,
            "Fundamentals screened"
        );

        FundamentalReport {
            catalysts,
            valuation,
            risk_flags,
            turnaround_probability,
            sentiment_score,
            bias,
            flags,
        }
    }
}

#[async_trait]
impl Analyst<FundamentalReport> for FundamentalAnalyst {
    fn name(&self) -> &str {
        "fundamental"
    }

    async fn analyze(&self, state: &PipelineState) -> std::result::Result<FundamentalReport, StageError> {
        Ok(self.assess(state.snapshot()))
    }
}

fn ratio_flags(snapshot: &TickerSnapshot) -> Vec<String> {
    let mut flags = Vec::new();
    if let Some(de) = snapshot.ratio(ratio::DEBT_TO_EQUITY).filter(|de| *de > MAX_DEBT_TO_EQUITY) {
        flags.push(format!("debt-to-equity {de:.2} above {MAX_DEBT_TO_EQUITY}"));
    }
    if let Some(margin) = snapshot.ratio(ratio::PROFIT_MARGIN).filter(|m| *m < 0.0) {
        flags.push(format!("negative profit margin ({margin:.2})"));
    }
    if let Some(pe) = snapshot.ratio(ratio::PE).filter(|pe| *pe < 0.0) {
        flags.push(format!("negative P/E ({pe:.1}): loss-making"));
    }
    flags
}

/// PEG first, then P/E
fn valuation_of(snapshot: &TickerSnapshot) -> Valuation {
    if let Some(peg) = snapshot.ratio(ratio::PEG) {
        return if peg < 1.0 {
            Valuation::Undervalued
        } else if peg <= 2.0 {
            Valuation::FairlyValued
        } else {
            Valuation::Overvalued
        };
    }

    match snapshot.ratio(ratio::PE) {
        Some(pe) if pe <= 0.0 => Valuation::Overvalued,
        Some(pe) if pe < 15.0 => Valuation::Undervalued,
        Some(pe) if pe <= 35.0 => Valuation::FairlyValued,
        Some(_) => Valuation::Overvalued,
        None => Valuation::Unknown,
    }
}

fn turnaround(catalysts: usize, valuation: Valuation, risk_flags: usize) -> TurnaroundProbability {
    let valuation_points = match valuation {
        Valuation::Undervalued => 2,
        Valuation::FairlyValued => 1,
        Valuation::Overvalued => -1,
        Valuation::Unknown => 0,
    };
    let points = catalysts.min(CATALYST_POINTS_CAP) as i64 + valuation_points - risk_flags as i64;

    if points >= 3 {
        TurnaroundProbability::High
    } else if points >= 1 {
        TurnaroundProbability::Medium
    } else {
        TurnaroundProbability::Low
    }
}

fn bias_of(turnaround: TurnaroundProbability, valuation: Valuation, risk_flags: usize) -> Bias {
    match turnaround {
        TurnaroundProbability::High if valuation != Valuation::Overvalued => Bias::Bullish,
        TurnaroundProbability::Low if valuation == Valuation::Overvalued || risk_flags >= 2 => {
            Bias::Bearish
        },
        _ => Bias::Neutral,
    }
}
