//! Markdown job report
//!
//! This module renders a human-readable report of a mirror job: run
//! metadata, page and asset statistics, the per-page table and the tail of
//! the structured job log.

use crate::assets::AssetKind;
use crate::output::traits::{JobSummary, OutputResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Log entries included at the end of the report
const LOG_TAIL: usize = 50;

/// Rows of the page table before it is truncated
const MAX_PAGE_ROWS: usize = 200;

/// Generates a markdown report of a job
///
/// # Arguments
///
/// * `summary` - The job summary data
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn generate_markdown_summary(summary: &JobSummary, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(summary);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a job summary as markdown
pub fn format_markdown_summary(summary: &JobSummary) -> String {
    let stats = &summary.stats;
    let mut md = String::new();

    // Title
    md.push_str("# Kagami Mirror Report\n\n");

    // Run metadata
    md.push_str("## Job Information\n\n");
    md.push_str(&format!("- **Job ID**: {}\n", summary.job_id));
    md.push_str(&format!("- **Start URL**: {}\n", summary.start_url));
    md.push_str(&format!("- **Started**: {}\n", summary.started_at));
    if let Some(finished) = &summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished));
    }
    let seconds = stats.elapsed.as_secs_f64();
    md.push_str(&format!(
        "- **Duration**: {:.1} seconds ({:.2} minutes)\n",
        seconds,
        seconds / 60.0
    ));
    md.push_str(&format!("- **Status**: {}\n", summary.status));
    md.push_str(&format!("- **Backend**: {}\n", stats.backend_label()));
    if let Some(hash) = &summary.config_hash {
        md.push_str(&format!("- **Config Hash**: {}\n", hash));
    }
    md.push('\n');

    if let Some(error) = &summary.error {
        md.push_str("## Failure\n\n");
        md.push_str(&format!("```\n{}\n```\n\n", error));
    }

    // Page statistics
    md.push_str("## Pages\n\n");
    md.push_str("| Outcome | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Fetched | {} |\n", stats.pages_fetched));
    md.push_str(&format!("| Not Found (404) | {} |\n", stats.pages_not_found));
    md.push_str(&format!("| Failed | {} |\n", stats.pages_failed));
    md.push_str(&format!("| Left Over (page cap) | {} |\n", stats.pages_capped));
    md.push_str(&format!("| From Sitemap | {} |\n\n", stats.sitemap_urls));
    md.push_str(&format!(
        "- **Success Rate**: {:.2}%\n\n",
        stats.success_rate()
    ));

    // Asset statistics
    md.push_str("## Assets\n\n");
    md.push_str("| Kind | Downloaded | Failed |\n");
    md.push_str("|------|------------|--------|\n");
    for kind in AssetKind::all() {
        let counts = stats.assets(kind);
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            kind, counts.downloaded, counts.failed
        ));
    }
    md.push_str(&format!(
        "| **Total** | {} | {} |\n\n",
        stats.assets_downloaded(),
        stats.assets_failed()
    ));

    // Page table
    if !summary.pages.is_empty() {
        md.push_str("## Mirrored Pages\n\n");
        md.push_str("| File | Title | URL |\n");
        md.push_str("|------|-------|-----|\n");

        for page in summary.pages.iter().take(MAX_PAGE_ROWS) {
            md.push_str(&format!(
                "| {} | {} | {} |\n",
                page.file,
                escape_cell(&page.title),
                page.url
            ));
        }
        if summary.pages.len() > MAX_PAGE_ROWS {
            md.push_str(&format!(
                "\n... and {} more\n",
                summary.pages.len() - MAX_PAGE_ROWS
            ));
        }
        md.push('\n');
    }

    // Log tail
    if !summary.log.is_empty() {
        let skip = summary.log.len().saturating_sub(LOG_TAIL);
        md.push_str("## Log\n\n");
        if skip > 0 {
            md.push_str(&format!("Last {} of {} entries.\n\n", LOG_TAIL, summary.log.len()));
        }
        md.push_str("```\n");
        for entry in summary.log.iter().skip(skip) {
            md.push_str(&format!(
                "{} {:<5} {}\n",
                entry.timestamp.format("%H:%M:%S"),
                entry.level,
                entry.message
            ));
        }
        md.push_str("```\n");
    }

    md
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
