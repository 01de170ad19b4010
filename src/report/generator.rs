//! Markdown and JSON dashboard generation.
//!
//! This module renders an assembled [`Dashboard`] into a document. It only
//! reads the aggregates; nothing here feeds back into the pipeline.

use crate::models::{Breakdown, Dashboard, DashboardMetadata, FeedStatus, GroupCounts, Panel, PanelContent, Share};
use anyhow::Result;
use std::io::Write;
use std::path::Path;

/// Width of the longest bar in breakdown tables.
const BAR_WIDTH: usize = 20;

/// Rendering options.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Maximum rows shown per grouped breakdown; the rest is summed.
    pub top_n: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self { top_n: 10 }
    }
}

/// Generate a complete Markdown dashboard.
pub fn generate_markdown_report(dashboard: &Dashboard, options: &RenderOptions) -> String {
    let mut output = String::new();

    output.push_str(&format!("# {}\n\n", dashboard.metadata.title));
    output.push_str(&generate_metadata_section(&dashboard.metadata));
    output.push_str(&generate_table_of_contents(dashboard));
    output.push_str(&generate_summary_section(&dashboard.panels));
    output.push_str(&generate_panels_section(&dashboard.panels, options));
    output.push_str(&generate_feeds_section(&dashboard.feeds));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &DashboardMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Generated:** {}\n",
        metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Reporting Day:** {}\n",
        metadata.report_date.format("%Y-%m-%d")
    ));
    section.push_str(&format!("- **HIS API:** `{}`\n", metadata.base_url));
    section.push_str(&format!("- **Feeds Loaded:** {}\n", metadata.feeds_ok));
    if metadata.feeds_failed > 0 {
        section.push_str(&format!("- **Feeds Failed:** {}\n", metadata.feeds_failed));
    }
    section.push_str(&format!(
        "- **Fetch Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(dashboard: &Dashboard) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Summary](#summary)\n");
    toc.push_str("- [Panels](#panels)\n");

    for panel in &dashboard.panels {
        toc.push_str(&format!("  - [{}](#{})\n", panel.title, anchor(&panel.title)));
    }

    toc.push_str("- [Feed Status](#feed-status)\n\n");

    toc
}

/// Generate the tile overview.
fn generate_summary_section(panels: &[Panel]) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str("| Tile | Value |\n");
    section.push_str("|:---|:---:|\n");

    for panel in panels {
        let value = match panel.tile() {
            Some(tile) => format!("**{}**", tile),
            None => "⚠️ unavailable".to_string(),
        };
        section.push_str(&format!("| {} | {} |\n", panel.title, value));
    }
    section.push('\n');

    section
}

/// Generate the per-panel sections.
fn generate_panels_section(panels: &[Panel], options: &RenderOptions) -> String {
    let mut section = String::new();

    section.push_str("## Panels\n\n");
    for panel in panels {
        section.push_str(&generate_panel_block(panel, options));
    }

    section
}

/// Generate a single panel block.
fn generate_panel_block(panel: &Panel, options: &RenderOptions) -> String {
    let mut block = String::new();

    block.push_str(&format!("### {}\n\n", panel.title));

    match &panel.content {
        PanelContent::Failed { error, detail } => {
            block.push_str(&format!("> ⚠️ **Error:** {}\n\n", error));
            if let Some(detail) = detail {
                block.push_str("**Response received:**\n\n");
                block.push_str(&format!("````text\n{}\n````\n\n", detail));
            }
        }
        PanelContent::Ready {
            tile,
            breakdown,
            note,
        } => {
            block.push_str(&format!("**{}:** {}\n\n", panel.title, tile));
            block.push_str(&format!("*{} ({} chart)*\n\n", panel.chart_title, panel.chart));

            match breakdown {
                Breakdown::Counts(counts) => {
                    block.push_str(&generate_counts_table(counts, options.top_n))
                }
                Breakdown::Split { shares } => block.push_str(&generate_split_table(shares)),
            }

            if let Some(note) = note {
                block.push_str(&format!("> ℹ️ {}\n\n", note));
            }
        }
    }

    block.push_str("---\n\n");

    block
}

/// Grouped counts as a table with text bars.
fn generate_counts_table(counts: &GroupCounts, top_n: usize) -> String {
    if counts.is_empty() {
        return "No rows.\n\n".to_string();
    }

    let mut table = String::new();
    let max = counts.groups.first().map(|g| g.count).unwrap_or(0);
    let (head, rest) = counts.top(top_n);

    table.push_str(&format!("| {} | {} | |\n", counts.dimension, counts.name));
    table.push_str("|:---|---:|:---|\n");

    for group in head {
        table.push_str(&format!(
            "| {} | {} | {} |\n",
            escape_cell(&group.key),
            group.count,
            bar(group.count, max)
        ));
    }

    let hidden = counts.groups.len() - head.len();
    if hidden > 0 {
        table.push_str(&format!("| *{} more* | {} | |\n", hidden, rest));
    }

    table.push_str(&format!("| **Total** | **{}** | |\n\n", counts.total()));

    table
}

/// Percentage split as a table.
fn generate_split_table(shares: &[Share]) -> String {
    if shares.is_empty() {
        return "No rows.\n\n".to_string();
    }

    let mut table = String::new();
    let max = shares.iter().map(|s| s.count).max().unwrap_or(0);

    table.push_str("| Category | Count | Share | |\n");
    table.push_str("|:---|---:|---:|:---|\n");

    for share in shares {
        table.push_str(&format!(
            "| {} | {} | {:.1}% | {} |\n",
            escape_cell(&share.name),
            share.count,
            share.percent,
            bar(share.count, max)
        ));
    }
    table.push('\n');

    table
}

/// Generate the feed status section.
fn generate_feeds_section(feeds: &[FeedStatus]) -> String {
    let mut section = String::new();

    section.push_str("## Feed Status\n\n");
    section.push_str("| Feed | Endpoint | Status |\n");
    section.push_str("|:---|:---|:---|\n");

    for feed in feeds {
        let status = match (&feed.rows, &feed.error) {
            (_, Some(error)) => match &feed.detail {
                Some(detail) => format!("❌ {}: `{}`", escape_cell(error), escape_cell(detail)),
                None => format!("❌ {}", escape_cell(error)),
            },
            (Some(rows), None) => format!("✅ {} rows", rows),
            (None, None) => "✅".to_string(),
        };
        section.push_str(&format!("| {} | `{}` | {} |\n", feed.name, feed.url, status));
    }
    section.push('\n');

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Generated by sltdash from live HIS feeds. Figures are not persisted.*\n".to_string()
}

/// Heading slug as GitHub generates it: lowercase, spaces to hyphens,
/// other punctuation dropped.
fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            '-' | '_' => Some(c),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .collect()
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace(['\r', '\n'], " ")
}

fn bar(count: usize, max: usize) -> String {
    if max == 0 || count == 0 {
        return String::new();
    }
    let width = (count * BAR_WIDTH).div_ceil(max);
    "█".repeat(width)
}

/// Generate a JSON dashboard.
pub fn generate_json_report(dashboard: &Dashboard) -> Result<String> {
    serde_json::to_string_pretty(dashboard).map_err(Into::into)
}

/// Write rendered output to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
