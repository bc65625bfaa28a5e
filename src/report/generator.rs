//! Report generation.
//!
//! JSON output carries the full aggregated series for downstream
//! charting. Markdown output renders one table per run.

use crate::analysis::group_by_trial;
use crate::config::ReportConfig;
use crate::models::{AggregatedSeries, AnalyzedRun, Report, ReportMetadata};
use anyhow::Result;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportConfig) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Trialstats Report\n\n");

    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(&report.runs));
    output.push_str(&generate_summary_section(&report.runs));
    output.push_str(&generate_results_section(&report.runs, options.precision));

    if options.include_failed {
        output.push_str(&generate_failures_section(&report.runs));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Version:** {}\n", metadata.tool_version));
    section.push_str(&format!(
        "- **Runs Processed:** {}\n",
        metadata.runs_processed
    ));
    if metadata.runs_failed > 0 {
        section.push_str(&format!("- **Runs Failed:** {}\n", metadata.runs_failed));
    }
    section.push_str(&format!(
        "- **Duration:** {:.2}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

fn anchor(trial: &str, run: &str) -> String {
    format!("{}-{}", trial, run)
        .replace(['/', '.', ' ', '_'], "-")
        .to_lowercase()
}

/// Generate the table of contents.
fn generate_table_of_contents(runs: &[AnalyzedRun]) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Summary](#summary)\n");
    toc.push_str("- [Results](#results)\n");

    for (trial, trial_runs) in group_by_trial(runs) {
        toc.push_str(&format!("  - {}\n", trial));
        for run in trial_runs.iter().filter(|r| r.is_success()) {
            toc.push_str(&format!(
                "    - [{}](#{})\n",
                run.run,
                anchor(&run.trial, &run.run)
            ));
        }
    }

    toc.push('\n');

    toc
}

/// Generate the summary section.
fn generate_summary_section(runs: &[AnalyzedRun]) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Trial | Run | x values | Metrics | Truncated | Status |\n");
    section.push_str("|:---|:---|:---:|:---:|:---:|:---:|\n");

    for (trial, trial_runs) in group_by_trial(runs) {
        for run in trial_runs {
            match run.series {
                Some(ref series) => section.push_str(&format!(
                    "| {} | `{}` | {} | {} | {} | ok |\n",
                    trial,
                    run.run,
                    series.len(),
                    series.metrics.len(),
                    series.truncated
                )),
                None => section.push_str(&format!(
                    "| {} | `{}` | - | - | - | failed |\n",
                    trial, run.run
                )),
            }
        }
    }
    section.push('\n');

    section
}

/// Generate the per-run results section.
fn generate_results_section(runs: &[AnalyzedRun], precision: usize) -> String {
    let mut section = String::new();

    section.push_str("## Results\n\n");

    if !runs.iter().any(|r| r.is_success()) {
        section.push_str("No run file was aggregated successfully.\n\n");
        return section;
    }

    for (trial, trial_runs) in group_by_trial(runs) {
        if !trial_runs.iter().any(|r| r.is_success()) {
            continue;
        }
        section.push_str(&format!("### {}\n\n", trial));

        for run in trial_runs {
            if let Some(ref series) = run.series {
                section.push_str(&format!(
                    "#### {} {{#{}}}\n\n",
                    run.run,
                    anchor(&run.trial, &run.run)
                ));
                section.push_str(&generate_series_table(series, precision));
            }
        }
    }

    section
}

/// Render one aggregated series as a Markdown table.
fn generate_series_table(series: &AggregatedSeries, precision: usize) -> String {
    let mut table = String::new();

    if series.is_empty() {
        table.push_str("*No settings blocks found.*\n\n");
        return table;
    }

    if series.truncated > 0 {
        table.push_str(&format!(
            "> **Note:** {} observation(s) dropped to align x vectors.\n\n",
            series.truncated
        ));
    }

    table.push_str("| x | blocks |");
    for name in series.metrics.keys() {
        table.push_str(&format!(" {} |", name));
    }
    table.push('\n');

    table.push_str("|---:|---:|");
    for _ in series.metrics.keys() {
        table.push_str("---:|");
    }
    table.push('\n');

    for (i, x) in series.x.iter().enumerate() {
        table.push_str(&format!("| {} | {} |", x, series.blocks[i]));
        for metric in series.metrics.values() {
            table.push_str(&format!(
                " {} ± {} (n={}) |",
                format_value(metric.mean[i], precision),
                format_value(metric.stddev[i], precision),
                metric.count.get(i).copied().unwrap_or_default()
            ));
        }
        table.push('\n');
    }
    table.push('\n');

    table
}

/// Format a statistic; NaN (no observations) renders as `n/a`.
fn format_value(value: f64, precision: usize) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.*}", precision, value)
    }
}

/// Generate the failed runs section.
fn generate_failures_section(runs: &[AnalyzedRun]) -> String {
    let failed: Vec<_> = runs.iter().filter(|r| !r.is_success()).collect();
    if failed.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Failed Runs\n\n");
    for run in failed {
        section.push_str(&format!(
            "- **{}/{}**: {}\n",
            run.trial,
            run.run,
            run.error.as_deref().unwrap_or("unknown error")
        ));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by trialstats v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
