//! Rendering of reports and scan results

use crate::OutputFormat;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use swing_core::{PipelineReport, SectorScanResult};

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.iter().copied().map(Cell::new).collect::<Vec<_>>());
    table
}

fn price(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

pub fn render_report(report: &PipelineReport, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(&report.signal)?);
    }

    let signal = &report.signal;
    let mut out = table(&["Field", "Value"]);
    out.add_row(vec!["Ticker".to_string(), report.ticker.to_string()]);
    out.add_row(vec!["Action".to_string(), signal.action().to_string()]);
    if let Some(zone) = signal.entry_zone() {
        out.add_row(vec!["Entry zone".to_string(), format!("{:.2} - {:.2}", zone.low, zone.high)]);
    }
    out.add_row(vec!["Stop loss".to_string(), price(signal.stop_loss())]);
    out.add_row(vec!["Target 1".to_string(), price(signal.target1())]);
    out.add_row(vec!["Target 2".to_string(), price(signal.target2())]);
    out.add_row(vec![
        "Strength".to_string(),
        format!("{}/10", report.technical.strength_score),
    ]);
    out.add_row(vec!["Thesis".to_string(), signal.thesis().to_string()]);
    for degradation in &report.degradations {
        out.add_row(vec![
            format!("Degraded ({})", degradation.stage),
            degradation.reason.clone(),
        ]);
    }
    Ok(out.to_string())
}

pub fn render_scan(result: &SectorScanResult, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(result)?);
    }

    let mut ranked = table(&["Tier", "Ticker", "Action", "Score", "R:R", "Thesis"]);
    for entry in result.ranked() {
        ranked.add_row(vec![
            entry.tier.to_string(),
            entry.ticker.clone(),
            entry.action.to_string(),
            format!("{:.1}", entry.score),
            format!("{:.2}", entry.reward_to_risk),
            entry.thesis.clone(),
        ]);
    }

    let mut out = format!(
        "{}: {} scanned, {} ranked, {} failed\n{ranked}",
        result.sector(),
        result.scanned(),
        result.ranked().len(),
        result.failures().len()
    );

    if !result.failures().is_empty() {
        let mut failures = table(&["Ticker", "Failure", "Detail"]);
        for failure in result.failures() {
            failures.add_row(vec![
                failure.ticker.clone(),
                failure.failure_reason.to_string(),
                failure.detail.clone(),
            ]);
        }
        out.push_str(&format!("\n{failures}"));
    }
    Ok(out)
}

pub fn render_sectors(sectors: &[String], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(sectors)?),
        OutputFormat::Table => Ok(sectors.join("\n")),
    }
}

pub fn print_report(report: &PipelineReport, format: OutputFormat) -> anyhow::Result<()> {
    println!("{}", render_report(report, format)?);
    Ok(())
}

pub fn print_scan(result: &SectorScanResult, format: OutputFormat) -> anyhow::Result<()> {
    println!("{}", render_scan(result, format)?);
    Ok(())
}

pub fn print_sectors(sectors: &[String], format: OutputFormat) -> anyhow::Result<()> {
    println!("{}", render_sectors(sectors, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use swing_core::{FailureKind, TickerFailure};

    #[test]
    fn test_scan_json_shape() {
        let result = SectorScanResult::new(
            "AUTO",
            1,
            Vec::new(),
            vec![TickerFailure::new("HEROMOTOCO.NS", FailureKind::Timeout, "no answer")],
        );
        let json: serde_json::Value =
            serde_json::from_str(&render_scan(&result, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["sector"], "AUTO");
        assert_eq!(json["failures"][0]["failureReason"], "Timeout");
    }

    #[test]
    fn test_scan_table_lists_failures() {
        let result = SectorScanResult::new(
            "BANK",
            2,
            Vec::new(),
            vec![TickerFailure::new("SBIN.NS", FailureKind::DeadlineExceeded, "too slow")],
        );
        let text = render_scan(&result, OutputFormat::Table).unwrap();
        assert!(text.starts_with("BANK: 2 scanned, 0 ranked, 1 failed"));
        assert!(text.contains("DeadlineExceeded"));
    }

    #[test]
    fn test_sectors_plain_list() {
        let sectors = vec!["AUTO".to_string(), "BANK".to_string()];
        assert_eq!(render_sectors(&sectors, OutputFormat::Table).unwrap(), "AUTO\nBANK");
    }
}
