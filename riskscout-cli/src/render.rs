//! Markdown rendering of a finished research report.

use riskscout_core::ReportResponse;
use std::fmt::Write;

/// Render `report` as a markdown document for terminal or file output.
pub fn report_markdown(report: &ReportResponse) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# External context: {}\n", report.subject);
    let _ = writeln!(
        out,
        "_Run {} at {}_\n",
        report.run_id,
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(out, "{}\n", report.summary);

    if report.search_failed || report.partial_failure {
        let _ = writeln!(out, "> **Warning:** some sources could not be reached.\n");
    }

    if let Some(ref full) = report.full_report {
        let _ = writeln!(out, "## Report\n\n{}\n", full.trim_end());
    }

    bullet_section(&mut out, "Key risks", &report.key_risks);
    bullet_section(&mut out, "Insights", &report.insights);

    if !report.recommended_sources.is_empty() {
        let _ = writeln!(out, "## Recommended for review\n");
        for source in &report.recommended_sources {
            let _ = write!(out, "- [{}]({})", source.title, source.url);
            if let Some(ref citation) = source.citation {
                let _ = write!(out, " ({})", citation.short_form());
            } else if let Some(ref date) = source.date {
                let _ = write!(out, " ({})", date);
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if !report.errors.is_empty() {
        bullet_section(&mut out, "Errors", &report.errors);
    }

    let usage = &report.usage;
    let _ = writeln!(
        out,
        "---\n{} sources, {} key points, {} tokens, ${:.4}{}",
        report.sources.len(),
        report.key_points.len(),
        usage.total_tokens,
        usage.total_cost,
        if usage.model_name.is_empty() {
            String::new()
        } else {
            format!(" ({})", usage.model_name)
        }
    );
    out
}

fn bullet_section(out: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    let _ = writeln!(out, "## {}\n", heading);
    for item in items {
        let _ = writeln!(out, "- {}", item);
    }
    out.push('\n');
}
