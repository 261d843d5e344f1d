//! Output formatting for analysis results.
//!
//! Four formats, all deterministic projections of the same
//! `AggregatedAnalysis` payload:
//! - Console: colored terminal output for human readability
//! - JSON: the payload serialized as-is for programmatic consumption
//! - XML: an escaped element tree of the same fields
//! - Markdown: headings and tables, for CI job summaries

use std::fmt::Write as _;
use std::path::Path;

use colored::*;
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregatedAnalysis;
use crate::analyze::AnalysisError;

/// The closed set of output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Console,
    Json,
    Xml,
    Markdown,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Console => "console",
            ReportFormat::Json => "json",
            ReportFormat::Xml => "xml",
            ReportFormat::Markdown => "markdown",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" => Ok(ReportFormat::Console),
            "json" => Ok(ReportFormat::Json),
            "xml" => Ok(ReportFormat::Xml),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            _ => Err(format!(
                "unknown format {:?}, must be 'console', 'json', 'xml', or 'markdown'",
                s
            )),
        }
    }
}

/// Render the report in the requested format.
pub fn render(
    format: ReportFormat,
    analysis: &AggregatedAnalysis,
    errors: &[AnalysisError],
) -> anyhow::Result<String> {
    match format {
        ReportFormat::Console => Ok(render_console(analysis, errors)),
        ReportFormat::Json => Ok(serde_json::to_string_pretty(analysis)?),
        ReportFormat::Xml => Ok(render_xml(analysis)),
        ReportFormat::Markdown => Ok(render_markdown(analysis)),
    }
}

/// Render and deliver the report: to a file when `output` is given,
/// otherwise to stdout.
pub fn write_report(
    format: ReportFormat,
    analysis: &AggregatedAnalysis,
    errors: &[AnalysisError],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let rendered = render(format, analysis, errors)?;
    match output {
        Some(path) => std::fs::write(path, rendered.as_bytes())?,
        None => println!("{}", rendered),
    }
    Ok(())
}

// =============================================================================
// Console
// =============================================================================

fn render_console(analysis: &AggregatedAnalysis, errors: &[AnalysisError]) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", "cddcheck analysis".bold());
    let _ = writeln!(out);
    let _ = writeln!(out, "  files:    {}", analysis.total_files);
    let _ = writeln!(out, "  classes:  {}", analysis.total_classes);
    let _ = writeln!(out, "  total ICP:   {:.1}", analysis.total_icp);
    let _ = writeln!(out, "  average ICP: {:.2}", analysis.average_icp);
    let _ = writeln!(
        out,
        "  ICP/SLOC correlation: {:.2}",
        analysis.icp_sloc_correlation
    );
    let _ = writeln!(out);

    if !analysis.icp_distribution.is_empty() {
        let _ = writeln!(out, "{}", "Distribution".bold());
        for (icp_type, count) in &analysis.icp_distribution {
            let _ = writeln!(out, "  {:<20} {}", icp_type.to_string(), count);
        }
        let _ = writeln!(out);
    }

    if analysis.classes_over_limit.is_empty() {
        let _ = writeln!(out, "{}", "No classes over the ICP limit".green());
    } else {
        let _ = writeln!(
            out,
            "{}",
            format!(
                "{} class(es) over the ICP limit",
                analysis.classes_over_limit.len()
            )
            .red()
            .bold()
        );
        for class_ref in &analysis.classes_over_limit {
            let limit = class_ref
                .icp_limit
                .map(|l| format!("{:.1}", l))
                .unwrap_or_else(|| "unbounded".to_string());
            let _ = writeln!(
                out,
                "  {} {} (ICP {:.1}, limit {})",
                class_ref.file.dimmed(),
                class_ref.name.red(),
                class_ref.total_icp,
                limit
            );
        }
    }
    let _ = writeln!(out);

    if !analysis.methods_over_sloc_limit.is_empty() {
        let _ = writeln!(
            out,
            "{}",
            format!(
                "{} method(s) over the SLOC limit",
                analysis.methods_over_sloc_limit.len()
            )
            .yellow()
            .bold()
        );
        for method_ref in &analysis.methods_over_sloc_limit {
            let _ = writeln!(
                out,
                "  {} {}.{} ({} code lines)",
                method_ref.file.dimmed(),
                method_ref.class_name,
                method_ref.name.yellow(),
                method_ref.code_lines
            );
        }
        let _ = writeln!(out);
    }

    if !analysis.largest_classes.is_empty() {
        let _ = writeln!(out, "{}", "Largest classes".bold());
        for class_ref in &analysis.largest_classes {
            let _ = writeln!(
                out,
                "  {:<8.1} {} ({})",
                class_ref.total_icp,
                class_ref.name,
                class_ref.file.dimmed()
            );
        }
        let _ = writeln!(out);
    }

    if !analysis.suggestions.is_empty() {
        let _ = writeln!(out, "{}", "Suggestions".bold());
        for suggestion in &analysis.suggestions {
            let _ = writeln!(out, "  - {}", suggestion);
        }
        let _ = writeln!(out);
    }

    if !errors.is_empty() {
        let _ = writeln!(out, "{}", format!("{} error(s)", errors.len()).red().bold());
        for error in errors {
            let _ = writeln!(
                out,
                "  {} {}: {}",
                error.severity.to_string().red(),
                error.file.dimmed(),
                error.message
            );
        }
    }

    out
}

// =============================================================================
// XML
// =============================================================================

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn render_xml(analysis: &AggregatedAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(out, "<analysis>");
    let _ = writeln!(out, "  <totalFiles>{}</totalFiles>", analysis.total_files);
    let _ = writeln!(
        out,
        "  <totalClasses>{}</totalClasses>",
        analysis.total_classes
    );
    let _ = writeln!(out, "  <totalIcp>{:.2}</totalIcp>", analysis.total_icp);
    let _ = writeln!(
        out,
        "  <averageIcp>{:.2}</averageIcp>",
        analysis.average_icp
    );
    let _ = writeln!(
        out,
        "  <icpSlocCorrelation>{:.4}</icpSlocCorrelation>",
        analysis.icp_sloc_correlation
    );

    let _ = writeln!(out, "  <icpDistribution>");
    for (icp_type, count) in &analysis.icp_distribution {
        let _ = writeln!(
            out,
            r#"    <metric name="{}" count="{}"/>"#,
            icp_type, count
        );
    }
    let _ = writeln!(out, "  </icpDistribution>");

    let _ = writeln!(out, "  <classesOverLimit>");
    for class_ref in &analysis.classes_over_limit {
        let _ = writeln!(
            out,
            r#"    <class name="{}" file="{}" icp="{:.2}"/>"#,
            xml_escape(&class_ref.name),
            xml_escape(&class_ref.file),
            class_ref.total_icp
        );
    }
    let _ = writeln!(out, "  </classesOverLimit>");

    let _ = writeln!(out, "  <largestClasses>");
    for class_ref in &analysis.largest_classes {
        let _ = writeln!(
            out,
            r#"    <class name="{}" file="{}" icp="{:.2}"/>"#,
            xml_escape(&class_ref.name),
            xml_escape(&class_ref.file),
            class_ref.total_icp
        );
    }
    let _ = writeln!(out, "  </largestClasses>");

    let _ = writeln!(out, "  <methodsOverSlocLimit>");
    for method_ref in &analysis.methods_over_sloc_limit {
        let _ = writeln!(
            out,
            r#"    <method name="{}.{}" file="{}" codeLines="{}"/>"#,
            xml_escape(&method_ref.class_name),
            xml_escape(&method_ref.name),
            xml_escape(&method_ref.file),
            method_ref.code_lines
        );
    }
    let _ = writeln!(out, "  </methodsOverSlocLimit>");

    let _ = writeln!(out, "  <suggestions>");
    for suggestion in &analysis.suggestions {
        let _ = writeln!(
            out,
            "    <suggestion>{}</suggestion>",
            xml_escape(suggestion)
        );
    }
    let _ = writeln!(out, "  </suggestions>");

    let _ = writeln!(out, "</analysis>");
    out
}

// =============================================================================
// Markdown
// =============================================================================

fn render_markdown(analysis: &AggregatedAnalysis) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Complexity report");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Metric | Value |");
    let _ = writeln!(out, "|---|---|");
    let _ = writeln!(out, "| Files | {} |", analysis.total_files);
    let _ = writeln!(out, "| Classes | {} |", analysis.total_classes);
    let _ = writeln!(out, "| Total ICP | {:.1} |", analysis.total_icp);
    let _ = writeln!(out, "| Average ICP | {:.2} |", analysis.average_icp);
    let _ = writeln!(
        out,
        "| ICP/SLOC correlation | {:.2} |",
        analysis.icp_sloc_correlation
    );
    let _ = writeln!(
        out,
        "| Classes over limit | {} |",
        analysis.classes_over_limit.len()
    );
    let _ = writeln!(out);

    if !analysis.classes_over_limit.is_empty() {
        let _ = writeln!(out, "## Violations");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Class | File | ICP | Limit |");
        let _ = writeln!(out, "|---|---|---|---|");
        for class_ref in &analysis.classes_over_limit {
            let limit = class_ref
                .icp_limit
                .map(|l| format!("{:.1}", l))
                .unwrap_or_else(|| "unbounded".to_string());
            let _ = writeln!(
                out,
                "| {} | {} | {:.1} | {} |",
                class_ref.name, class_ref.file, class_ref.total_icp, limit
            );
        }
        let _ = writeln!(out);
    }

    if !analysis.largest_classes.is_empty() {
        let _ = writeln!(out, "## Largest classes");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Class | File | ICP |");
        let _ = writeln!(out, "|---|---|---|");
        for class_ref in &analysis.largest_classes {
            let _ = writeln!(
                out,
                "| {} | {} | {:.1} |",
                class_ref.name, class_ref.file, class_ref.total_icp
            );
        }
        let _ = writeln!(out);
    }

    if !analysis.methods_over_sloc_limit.is_empty() {
        let _ = writeln!(out, "## Methods over the SLOC limit");
        let _ = writeln!(out);
        let _ = writeln!(out, "| Method | File | Code lines |");
        let _ = writeln!(out, "|---|---|---|");
        for method_ref in &analysis.methods_over_sloc_limit {
            let _ = writeln!(
                out,
                "| {}.{} | {} | {} |",
                method_ref.class_name, method_ref.name, method_ref.file, method_ref.code_lines
            );
        }
        let _ = writeln!(out);
    }

    if !analysis.suggestions.is_empty() {
        let _ = writeln!(out, "## Suggestions");
        let _ = writeln!(out);
        for suggestion in &analysis.suggestions {
            let _ = writeln!(out, "- {}", suggestion);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;

    fn empty_analysis() -> AggregatedAnalysis {
        aggregate(&[])
    }

    #[test]
    fn test_format_round_trip() {
        for format in ["console", "json", "xml", "markdown"] {
            let parsed: ReportFormat = format.parse().unwrap();
            assert_eq!(parsed.as_str(), format);
        }
        assert!("sarif".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_json_payload_shape() {
        let rendered = render(ReportFormat::Json, &empty_analysis(), &[]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["totalFiles"], 0);
        assert_eq!(value["totalClasses"], 0);
        assert_eq!(value["totalIcp"], 0.0);
        assert!(value["classesOverLimit"].as_array().unwrap().is_empty());
        assert!(value["suggestions"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_xml_is_escaped() {
        let mut analysis = empty_analysis();
        analysis.suggestions.push("use <T> & \"quotes\"".to_string());
        let rendered = render(ReportFormat::Xml, &analysis, &[]).unwrap();
        assert!(rendered.contains("use &lt;T&gt; &amp; &quot;quotes&quot;"));
        assert!(rendered.starts_with("<?xml"));
    }

    #[test]
    fn test_markdown_contains_summary_table() {
        let rendered = render(ReportFormat::Markdown, &empty_analysis(), &[]).unwrap();
        assert!(rendered.contains("# Complexity report"));
        assert!(rendered.contains("| Files | 0 |"));
    }

    #[test]
    fn test_console_mentions_errors() {
        let errors = vec![AnalysisError {
            file: "Broken.java".to_string(),
            message: "parse failure".to_string(),
            severity: crate::analyze::Severity::Error,
        }];
        let rendered = render(ReportFormat::Console, &empty_analysis(), &errors).unwrap();
        assert!(rendered.contains("Broken.java"));
        assert!(rendered.contains("parse failure"));
    }
}
