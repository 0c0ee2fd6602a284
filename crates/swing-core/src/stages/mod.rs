//! Rule-based analysts, one per pipeline stage

pub mod fundamental;
pub mod risk;
pub mod synthesis;
pub mod technical;

pub use fundamental::FundamentalAnalyst;
pub use risk::RiskAnalyst;
pub use synthesis::SynthesisAnalyst;
pub use technical::TechnicalAnalyst;
