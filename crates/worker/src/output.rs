use anyhow::Context;
use btcbrief_core::domain::report::RunReport;
use std::fmt::Write as _;
use std::path::Path;

pub fn render_summary(report: &RunReport) -> String {
    let rec = &report.recommendation;
    let mut out = String::new();

    let _ = writeln!(out, "Query: {}", report.query);
    let _ = writeln!(
        out,
        "Articles: {} ({} without usable content)",
        report.articles.len(),
        report.placeholder_count()
    );
    for (i, s) in report.summaries.iter().enumerate() {
        let _ = writeln!(out, "  [{}] {} - {}", i + 1, s.source.title, s.source.url);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Recommendation: {} (confidence {})", rec.verdict, rec.confidence);
    let _ = writeln!(out, "Reasons:");
    for reason in &rec.reasons {
        let _ = writeln!(out, "  - {reason}");
    }
    let _ = writeln!(out, "Risks:");
    for risk in &rec.risks {
        let _ = writeln!(out, "  - {risk}");
    }
    let _ = writeln!(out, "Guidance: {}", rec.guidance);
    if let Some(horizon) = &rec.time_horizon {
        let _ = writeln!(out, "Time horizon: {horizon}");
    }
    out
}

pub fn write_report(path: &Path, report: &RunReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize run report")?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write run report to {}", path.display()))?;
    Ok(())
}
