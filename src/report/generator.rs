//! Result rendering.
//!
//! This module renders analysis results, history listings, batch summaries
//! and statistics as terminal text, Markdown or JSON.

use crate::analysis::HistoryStats;
use crate::batch::{BatchOutcome, BatchReport};
use crate::cli::OutputFormat;
use crate::models::{AnalysisResult, Emotions, Sentiment};
use anyhow::Result;
use serde_json::json;

const BAR_WIDTH: usize = 20;
const NO_ENTITIES: &str = "No significant entities identified.";

/// Render a single result.
pub fn render_result(result: &AnalysisResult, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Text => text_result(result),
        OutputFormat::Markdown => markdown_result(result),
        OutputFormat::Json => serde_json::to_string_pretty(result)?,
    })
}

/// Render a history listing, newest first.
pub fn render_history(entries: &[&AnalysisResult], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(entries)?);
    }

    if entries.is_empty() {
        return Ok("History is currently empty. Run your first analysis to see data here.\n"
            .to_string());
    }

    let mut output = String::new();
    match format {
        OutputFormat::Markdown => {
            output.push_str("# Analysis History\n\n");
            output.push_str("| Ref | Date | Sentiment | Confidence | Text |\n");
            output.push_str("|:---|:---|:---:|:---:|:---|\n");
            for entry in entries {
                output.push_str(&format!(
                    "| `{}` | {} | {} {} | {:.0}% | {} |\n",
                    entry.short_ref(),
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.sentiment.emoji(),
                    entry.sentiment,
                    entry.confidence * 100.0,
                    truncate(&entry.text, 60).replace('|', "\\|")
                ));
            }
        }
        _ => {
            output.push_str(&format!("Recent Activity ({} entries)\n\n", entries.len()));
            for entry in entries {
                output.push_str(&format!(
                    "{} {} {:<8} {:>4.0}%  {}  {}\n",
                    entry.sentiment.emoji(),
                    entry.short_ref(),
                    entry.sentiment.as_str(),
                    entry.confidence * 100.0,
                    entry.timestamp.format("%b %d"),
                    truncate(&entry.text, 60)
                ));
            }
        }
    }

    Ok(output)
}

/// One-line summary of a batch item, printed while the batch runs.
pub fn batch_item_line(outcome: &BatchOutcome, total: usize) -> String {
    match &outcome.result {
        Ok(result) => format!(
            "[{}/{}] {} {} ({:.1}%) {}",
            outcome.index,
            total,
            result.sentiment.emoji(),
            result.sentiment,
            result.confidence * 100.0,
            truncate(&outcome.text, 50)
        ),
        Err(e) => format!(
            "[{}/{}] ❌ {} ({})",
            outcome.index,
            total,
            truncate(&outcome.text, 50),
            e
        ),
    }
}

/// Render a finished batch.
pub fn render_batch(report: &BatchReport, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|f| {
                json!({
                    "index": f.index,
                    "text": f.text,
                    "kind": f.error.kind(),
                    "error": f.error.to_string(),
                })
            })
            .collect();
        let value = json!({
            "total": report.total,
            "succeeded": report.succeeded,
            "failed": failed,
            "cancelled": report.cancelled,
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    let markdown = format == OutputFormat::Markdown;
    let mut output = String::new();

    if markdown {
        output.push_str("# Batch Analysis\n\n");
        output.push_str(&format!("- **Items:** {}\n", report.total));
        output.push_str(&format!("- **Succeeded:** {}\n", report.succeeded.len()));
        output.push_str(&format!("- **Failed:** {}\n", report.failed.len()));
        if report.cancelled {
            output.push_str("- **Cancelled:** yes\n");
        }
        output.push('\n');
        for result in &report.succeeded {
            output.push_str(&markdown_result(result));
            output.push_str("\n---\n\n");
        }
    } else {
        output.push_str(&format!(
            "Batch complete: {}/{} succeeded, {} failed{}\n",
            report.succeeded.len(),
            report.total,
            report.failed.len(),
            if report.cancelled { " (cancelled)" } else { "" }
        ));
    }

    if !report.failed.is_empty() {
        output.push_str(if markdown { "## Failures\n\n" } else { "\nFailures:\n" });
        for failure in &report.failed {
            output.push_str(&format!(
                "- item {}: {} ({})\n",
                failure.index,
                truncate(&failure.text, 60),
                failure.error
            ));
        }
    }

    Ok(output)
}

/// Render aggregate statistics.
pub fn render_stats(stats: &HistoryStats, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(stats)?);
    }

    let markdown = format == OutputFormat::Markdown;
    let mut output = String::new();

    if markdown {
        output.push_str("# History Statistics\n\n");
        output.push_str("| Sentiment | Count | Share |\n|:---|:---:|:---:|\n");
        for sentiment in Sentiment::ALL {
            output.push_str(&format!(
                "| {} {} | {} | {:.1}% |\n",
                sentiment.emoji(),
                sentiment,
                stats.count(sentiment),
                stats.percentage(sentiment)
            ));
        }
        output.push_str(&format!(
            "\n**Analyses:** {} · **Average confidence:** {:.1}%\n\n",
            stats.total,
            stats.average_confidence * 100.0
        ));
        output.push_str("## Average Emotions\n\n");
    } else {
        output.push_str(&format!("Analyses: {}\n", stats.total));
        for sentiment in Sentiment::ALL {
            output.push_str(&format!(
                "  {} {:<8} {:>4} ({:.1}%)\n",
                sentiment.emoji(),
                sentiment.as_str(),
                stats.count(sentiment),
                stats.percentage(sentiment)
            ));
        }
        output.push_str(&format!(
            "Average confidence: {:.1}%\n",
            stats.average_confidence * 100.0
        ));
        if let Some(dominant) = stats.dominant_sentiment() {
            output.push_str(&format!("Dominant sentiment: {}\n", dominant));
        }
        output.push_str("\nAverage emotions:\n");
    }

    output.push_str(&emotion_lines(&stats.average_emotions, markdown));

    if !stats.top_entities.is_empty() {
        output.push_str(if markdown { "\n## Top Entities\n\n" } else { "\nTop entities:\n" });
        for (entity, count) in &stats.top_entities {
            output.push_str(&format!("- {} ({})\n", entity, count));
        }
    }

    Ok(output)
}

fn text_result(result: &AnalysisResult) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "{} {}  {:.1}% confidence\n\n",
        result.sentiment.emoji(),
        result.sentiment,
        result.confidence * 100.0
    ));
    output.push_str(&format!("\"{}\"\n\n", result.explanation));

    output.push_str("Entities: ");
    if result.entities.is_empty() {
        output.push_str(NO_ENTITIES);
    } else {
        output.push_str(&result.entities.join(", "));
    }
    output.push_str("\n\n");

    output.push_str(&emotion_lines(&result.emotions, false));
    let (dominant, intensity) = result.emotions.dominant();
    output.push_str(&format!(
        "  dominant: {} ({:.0}%)\n",
        dominant,
        intensity * 100.0
    ));
    output.push_str(&format!(
        "\nREF: {} · {}\n",
        result.short_ref(),
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    output
}

fn markdown_result(result: &AnalysisResult) -> String {
    let mut section = String::new();

    section.push_str(&format!(
        "## {} {} · {:.1}% confidence\n\n",
        result.sentiment.emoji(),
        result.sentiment,
        result.confidence * 100.0
    ));
    section.push_str(&format!("> {}\n\n", result.text.replace('\n', "\n> ")));
    section.push_str(&format!("**Interpretation:** {}\n\n", result.explanation));

    section.push_str("**Entities:** ");
    if result.entities.is_empty() {
        section.push_str(&format!("_{}_", NO_ENTITIES));
    } else {
        let tags: Vec<String> = result.entities.iter().map(|e| format!("`{}`", e)).collect();
        section.push_str(&tags.join(" "));
    }
    section.push_str("\n\n");

    section.push_str(&emotion_lines(&result.emotions, true));
    section.push_str(&format!(
        "\n_REF: {} · {}_\n",
        result.short_ref(),
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    section
}

fn emotion_lines(emotions: &Emotions, markdown: bool) -> String {
    let mut lines = String::new();

    if markdown {
        lines.push_str("| Emotion | Intensity | |\n|:---|:---:|:---|\n");
    }
    for (name, value) in emotions.entries() {
        if markdown {
            lines.push_str(&format!(
                "| {} | {:.0}% | `{}` |\n",
                name,
                value * 100.0,
                emotion_bar(value)
            ));
        } else {
            lines.push_str(&format!(
                "  {:<9}{} {:>3.0}%\n",
                name,
                emotion_bar(value),
                value * 100.0
            ));
        }
    }

    lines
}

/// Fixed-width bar for a value in `[0, 1]`.
fn emotion_bar(value: f64) -> String {
    let filled = (value.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

/// Shorten to `max` characters, single line.
fn truncate(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let mut short: String = flat.chars().take(max.saturating_sub(1)).collect();
        short.push('…');
        short
    }
}
