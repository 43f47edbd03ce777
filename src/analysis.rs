use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::chart;
use crate::config::AppConfig;
use crate::db;
use crate::error::{Error, Result};
use crate::models::{FeedbackEntry, ProjectScore, RatingCount};
use crate::scoring::{self, ScoreBand};

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub audit_no: i64,
    pub window: Vec<i64>,
    /// Mean per project for the selected audit only
    pub project_scores: Vec<ProjectScore>,
    pub rating_counts: Vec<RatingCount>,
    /// Mean per project-audit label across the window
    pub trend: Vec<ProjectScore>,
    pub charts: Vec<PathBuf>,
}

pub fn summarize(audit_no: i64, window: Vec<i64>, entries: &[FeedbackEntry]) -> Result<AnalysisSummary> {
    if entries.is_empty() {
        return Err(Error::NoData(format!(
            "no feedback available for audit numbers {window:?}"
        )));
    }

    let selected: Vec<FeedbackEntry> = entries
        .iter()
        .filter(|e| e.audit_no == audit_no)
        .cloned()
        .collect();

    Ok(AnalysisSummary {
        audit_no,
        window,
        project_scores: scoring::average_by_project(&selected),
        rating_counts: scoring::rating_counts(entries),
        trend: scoring::average_by_project_audit(entries),
        charts: Vec::new(),
    })
}

/// Chart the selected audit against the two audits before it.
pub async fn analyse(pool: &SqlitePool, config: &AppConfig, audit_no: i64) -> Result<AnalysisSummary> {
    let window = scoring::analysis_window(audit_no);
    let entries = db::fetch_by_audits(pool, &window).await?;
    let mut summary = match summarize(audit_no, window, &entries) {
        Ok(summary) => summary,
        Err(err) => {
            warn!("Analysis for audit {audit_no} skipped: {err}");
            return Err(err);
        }
    };
    if summary.project_scores.is_empty() {
        warn!("Audit {audit_no} has no feedback; charting earlier audits only");
    }

    chart::load_font(&config.chart_font)?;
    std::fs::create_dir_all(&config.output_dir)?;

    let scores_path = config.output_path(&format!("analysis_{audit_no}_project_scores.png"));
    let scores_title = format!("Average Score by Project for Audit # {audit_no}");
    chart::render_png(&scores_path, |root| {
        chart::draw_score_points(root, &scores_title, "Project", &summary.project_scores, true)
    })?;

    let counts_path = config.output_path(&format!("analysis_{audit_no}_rating_counts.png"));
    chart::render_png(&counts_path, |root| {
        chart::draw_rating_counts(root, "Project-wise Ratings", &summary.rating_counts)
    })?;

    let trend_path = config.output_path(&format!("analysis_{audit_no}_audit_trend.png"));
    chart::render_png(&trend_path, |root| {
        chart::draw_score_points(
            root,
            "Average Scores for Last Three Audits by Project",
            "Project-Audit",
            &summary.trend,
            false,
        )
    })?;

    summary.charts = vec![scores_path, counts_path, trend_path];
    info!("Analysis for audits {:?} charted", summary.window);
    Ok(summary)
}

pub fn print_summary<W: Write>(summary: &AnalysisSummary, out: &mut W) -> Result<()> {
    writeln!(out, "Report analysis for audit {} (window {:?})", summary.audit_no, summary.window)?;

    writeln!(out)?;
    writeln!(out, "Average score by project:")?;
    if summary.project_scores.is_empty() {
        writeln!(out, "- no feedback recorded for audit {}", summary.audit_no)?;
    }
    for score in &summary.project_scores {
        let band = match ScoreBand::from_score(score.score) {
            ScoreBand::Strong => "strong",
            ScoreBand::Acceptable => "acceptable",
            ScoreBand::Weak => "weak",
        };
        writeln!(
            out,
            "- {}: {:.2} ({band}, {} ratings)",
            score.label, score.score, score.entry_count
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Rating counts:")?;
    for count in &summary.rating_counts {
        writeln!(out, "- {} / {}: {}", count.project, count.rating, count.count)?;
    }

    writeln!(out)?;
    writeln!(out, "Trend by project and audit:")?;
    for score in &summary.trend {
        writeln!(out, "- {}: {:.2}", score.label, score.score)?;
    }

    if !summary.charts.is_empty() {
        writeln!(out)?;
        writeln!(out, "Charts:")?;
        for path in &summary.charts {
            writeln!(out, "- {}", path.display())?;
        }
    }
    Ok(())
}
