//! Stage reports and the trade signal

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reward-to-risk floor below which a trade is always rejected
pub const MIN_REWARD_TO_RISK: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Uptrend,
    Downtrend,
    Sideways,
}

impl Trend {
    /// +1 for up, -1 for down, 0 for sideways
    pub fn vote(self) -> i32 {
        match self {
            Self::Uptrend => 1,
            Self::Downtrend => -1,
            Self::Sideways => 0,
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uptrend => "uptrend",
            Self::Downtrend => "downtrend",
            Self::Sideways => "sideways",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bias {
    Bullish,
    Bearish,
    Neutral,
}

impl Bias {
    pub fn is_directional(self) -> bool {
        self != Self::Neutral
    }

    pub fn opposes(self, other: Self) -> bool {
        matches!(
            (self, other),
            (Self::Bullish, Self::Bearish) | (Self::Bearish, Self::Bullish)
        )
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Neutral => "neutral",
        })
    }
}

/// Latest indicator values; `None` when the series is too short
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Indicators {
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub sma_50: Option<f64>,
    pub sma_200: Option<f64>,
    pub atr_14: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalReport {
    pub daily_trend: Trend,
    pub weekly_trend: Trend,
    pub indicators: Indicators,
    /// Below price, nearest first
    pub support_levels: Vec<f64>,
    /// Above price, nearest first
    pub resistance_levels: Vec<f64>,
    pub bias: Bias,
    /// 1..=10, or 0 when there was not enough data to judge
    pub strength_score: u8,
    pub volume_confirmed: bool,
    pub flags: Vec<String>,
}

impl TechnicalReport {
    /// Conservative default used when the series cannot be analysed
    pub fn insufficient(reason: impl Into<String>) -> Self {
        Self {
            daily_trend: Trend::Sideways,
            weekly_trend: Trend::Sideways,
            indicators: Indicators::default(),
            support_levels: Vec::new(),
            resistance_levels: Vec::new(),
            bias: Bias::Neutral,
            strength_score: 0,
            volume_confirmed: false,
            flags: vec![reason.into()],
        }
    }

    pub fn nearest_support(&self) -> Option<f64> {
        self.support_levels.first().copied()
    }

    pub fn nearest_resistance(&self) -> Option<f64> {
        self.resistance_levels.first().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Valuation {
    Undervalued,
    FairlyValued,
    Overvalued,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnaroundProbability {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalReport {
    pub catalysts: Vec<String>,
    pub valuation: Valuation,
    pub risk_flags: Vec<String>,
    pub turnaround_probability: TurnaroundProbability,
    /// Headline tone in [-1, 1]
    pub sentiment_score: f64,
    pub bias: Bias,
    pub flags: Vec<String>,
}

impl FundamentalReport {
    /// Conservative default used when fundamentals cannot be assessed
    pub fn neutral(reason: impl Into<String>) -> Self {
        Self {
            catalysts: Vec::new(),
            valuation: Valuation::Unknown,
            risk_flags: Vec::new(),
            turnaround_probability: TurnaroundProbability::Low,
            sentiment_score: 0.0,
            bias: Bias::Neutral,
            flags: vec![reason.into()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeApproval {
    Approved,
    Rejected,
}

/// Proposed trade levels before the reward-to-risk gate is applied
#[derive(Debug, Clone, PartialEq)]
pub struct RiskInputs {
    pub direction: Direction,
    pub entry: f64,
    pub stop_loss: f64,
    pub target1: f64,
    pub target2: f64,
    pub max_allocation_pct: f64,
    pub position_size: u64,
    pub rejection_reasons: Vec<String>,
}

/// Trade levels and the approval verdict.
///
/// Only constructible through [`RiskAssessment::new`] and
/// [`RiskAssessment::rejected`], both of which reject any trade whose
/// reward-to-risk falls below [`MIN_REWARD_TO_RISK`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    direction: Direction,
    entry: f64,
    stop_loss: f64,
    target1: f64,
    target2: f64,
    max_allocation_pct: f64,
    position_size: u64,
    reward_to_risk: f64,
    trade_approval: TradeApproval,
    rejection_reasons: Vec<String>,
}

impl RiskAssessment {
    pub fn new(inputs: RiskInputs) -> Self {
        let RiskInputs {
            direction,
            entry,
            stop_loss,
            target1,
            target2,
            max_allocation_pct,
            position_size,
            mut rejection_reasons,
        } = inputs;

        let risk = (entry - stop_loss).abs();
        let reward = (target1 - entry).abs();
        let reward_to_risk = if risk > 0.0 && reward.is_finite() { reward / risk } else { 0.0 };

        let levels_ordered = match direction {
            Direction::Long => stop_loss < entry && entry < target1 && target1 <= target2,
            Direction::Short => stop_loss > entry && entry > target1 && target1 >= target2,
        };
        if !levels_ordered {
            rejection_reasons.push(format!(
                "levels out of order for a {direction:?} trade (stop {stop_loss:.2}, entry {entry:.2}, target {target1:.2})"
            ));
        }

        // NaN compares false, so this also catches a degenerate ratio
        if !(reward_to_risk >= MIN_REWARD_TO_RISK) {
            rejection_reasons.push(format!(
                "reward-to-risk {reward_to_risk:.2} below {MIN_REWARD_TO_RISK:.1}"
            ));
        }

        if !(max_allocation_pct > 0.0 && max_allocation_pct <= 100.0) {
            rejection_reasons.push(format!("allocation {max_allocation_pct:.2}% out of range"));
        }

        let trade_approval = if rejection_reasons.is_empty() {
            TradeApproval::Approved
        } else {
            TradeApproval::Rejected
        };

        Self {
            direction,
            entry,
            stop_loss,
            target1,
            target2,
            max_allocation_pct: max_allocation_pct.clamp(f64::MIN_POSITIVE, 100.0),
            position_size,
            reward_to_risk,
            trade_approval,
            rejection_reasons,
        }
    }

    /// Rejected long assessment with default 5% stop and 10% target levels
    pub fn rejected(entry: f64, reason: impl Into<String>) -> Self {
        Self::new(RiskInputs {
            direction: Direction::Long,
            entry,
            stop_loss: entry * 0.95,
            target1: entry * 1.10,
            target2: entry * 1.20,
            max_allocation_pct: 1.0,
            position_size: 0,
            rejection_reasons: vec![reason.into()],
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn entry(&self) -> f64 {
        self.entry
    }

    pub fn stop_loss(&self) -> f64 {
        self.stop_loss
    }

    pub fn target1(&self) -> f64 {
        self.target1
    }

    pub fn target2(&self) -> f64 {
        self.target2
    }

    pub fn max_allocation_pct(&self) -> f64 {
        self.max_allocation_pct
    }

    pub fn position_size(&self) -> u64 {
        self.position_size
    }

    pub fn reward_to_risk(&self) -> f64 {
        self.reward_to_risk
    }

    pub fn trade_approval(&self) -> TradeApproval {
        self.trade_approval
    }

    pub fn is_approved(&self) -> bool {
        self.trade_approval == TradeApproval::Approved
    }

    pub fn rejection_reasons(&self) -> &[String] {
        &self.rejection_reasons
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Wait,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
            Self::Wait => "WAIT",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryZone {
    pub low: f64,
    pub high: f64,
}

/// Final recommendation for one ticker
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeSignal {
    action: Action,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry_zone: Option<EntryZone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target2: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_loss: Option<f64>,
    thesis: String,
}

impl TradeSignal {
    pub fn wait(thesis: impl Into<String>) -> Self {
        Self {
            action: Action::Wait,
            entry_zone: None,
            target1: None,
            target2: None,
            stop_loss: None,
            thesis: thesis.into(),
        }
    }

    /// BUY or SELL at the assessed levels; WAIT if the assessment was rejected.
    ///
    /// The entry zone spans `entry_band_pct` on the adverse side of entry:
    /// below it for a long, above it for a short.
    pub fn directional(risk: &RiskAssessment, entry_band_pct: f64, thesis: impl Into<String>) -> Self {
        if !risk.is_approved() {
            return Self::wait(thesis);
        }

        let entry = risk.entry();
        let band = entry * entry_band_pct / 100.0;
        let (action, entry_zone) = match risk.direction() {
            Direction::Long => (Action::Buy, EntryZone { low: entry - band, high: entry }),
            Direction::Short => (Action::Sell, EntryZone { low: entry, high: entry + band }),
        };

        Self {
            action,
            entry_zone: Some(entry_zone),
            target1: Some(risk.target1()),
            target2: Some(risk.target2()),
            stop_loss: Some(risk.stop_loss()),
            thesis: thesis.into(),
        }
    }

    pub fn action(&self) -> Action {
        self.action
    }

    pub fn entry_zone(&self) -> Option<EntryZone> {
        self.entry_zone
    }

    pub fn target1(&self) -> Option<f64> {
        self.target1
    }

    pub fn target2(&self) -> Option<f64> {
        self.target2
    }

    pub fn stop_loss(&self) -> Option<f64> {
        self.stop_loss
    }

    pub fn thesis(&self) -> &str {
        &self.thesis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long(entry: f64, stop_loss: f64, target1: f64) -> RiskInputs {
        RiskInputs {
            direction: Direction::Long,
            entry,
            stop_loss,
            target1,
            target2: target1 + (target1 - entry),
            max_allocation_pct: 10.0,
            position_size: 10,
            rejection_reasons: Vec::new(),
        }
    }

    #[test]
    fn test_reward_to_risk_below_floor_is_rejected() {
        let risk = RiskAssessment::new(long(100.0, 95.0, 108.0));
        assert!((risk.reward_to_risk() - 1.6).abs() < 1e-9);
        assert_eq!(risk.trade_approval(), TradeApproval::Rejected);

        let signal = TradeSignal::directional(&risk, 1.0, "momentum looks fine");
        assert_eq!(signal.action(), Action::Wait);
        assert!(signal.entry_zone().is_none());
    }

    #[test]
    fn test_floor_holds_across_ratios() {
        for target in [100.5, 102.0, 105.0, 109.99, 110.0, 120.0] {
            let risk = RiskAssessment::new(long(100.0, 95.0, target));
            if risk.reward_to_risk() < MIN_REWARD_TO_RISK {
                assert_eq!(risk.trade_approval(), TradeApproval::Rejected, "{target}");
            } else {
                assert_eq!(risk.trade_approval(), TradeApproval::Approved, "{target}");
            }
        }
    }

    #[test]
    fn test_zero_risk_is_rejected() {
        let risk = RiskAssessment::new(long(100.0, 100.0, 110.0));
        assert_eq!(risk.trade_approval(), TradeApproval::Rejected);
    }

    #[test]
    fn test_long_signal_zone() {
        let risk = RiskAssessment::new(long(200.0, 190.0, 230.0));
        assert!(risk.is_approved());

        let signal = TradeSignal::directional(&risk, 1.0, "breakout");
        assert_eq!(signal.action(), Action::Buy);
        let zone = signal.entry_zone().unwrap();
        assert!((zone.low - 198.0).abs() < 1e-9);
        assert!((zone.high - 200.0).abs() < 1e-9);
        assert_eq!(signal.stop_loss(), Some(190.0));
        assert!(signal.target1().unwrap() > zone.high);
    }

    #[test]
    fn test_short_signal_zone() {
        let risk = RiskAssessment::new(RiskInputs {
            direction: Direction::Short,
            entry: 100.0,
            stop_loss: 104.0,
            target1: 90.0,
            target2: 85.0,
            max_allocation_pct: 10.0,
            position_size: 10,
            rejection_reasons: Vec::new(),
        });
        assert!(risk.is_approved());

        let signal = TradeSignal::directional(&risk, 1.0, "breakdown");
        assert_eq!(signal.action(), Action::Sell);
        let zone = signal.entry_zone().unwrap();
        assert!(zone.low <= zone.high);
        assert!((zone.high - 101.0).abs() < 1e-9);
        assert!(signal.target1().unwrap() < zone.low);
    }

    #[test]
    fn test_wait_serializes_thesis_only() {
        let json = serde_json::to_value(TradeSignal::wait("no edge")).unwrap();
        assert_eq!(json, serde_json::json!({"action": "WAIT", "thesis": "no edge"}));
    }

    #[test]
    fn test_bias_opposition() {
        assert!(Bias::Bullish.opposes(Bias::Bearish));
        assert!(!Bias::Bullish.opposes(Bias::Neutral));
        assert!(!Bias::Neutral.is_directional());
    }
}
