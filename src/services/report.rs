use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use time::OffsetDateTime;

use crate::models::Analysis;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Report {
    #[serde(with = "time::serde::rfc3339")]
    pub(crate) generated_at: OffsetDateTime,
    pub(crate) student_name: String,
    pub(crate) subject: String,
    pub(crate) current_analysis: Analysis,
    pub(crate) historical_analyses: Vec<Analysis>,
    pub(crate) metrics: ReportMetrics,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportMetrics {
    pub(crate) analyses_count: usize,
    pub(crate) average_error: i64,
    pub(crate) recent_trend: Option<f64>,
}

impl ReportMetrics {
    /// `history` is most recent first.
    pub(crate) fn from_history(history: &[Analysis]) -> Self {
        let total: f64 = history.iter().map(|analysis| analysis.data.error_percentage).sum();
        let average_error = (total / history.len().max(1) as f64).round() as i64;

        let recent_trend = match (history.first(), history.last()) {
            (Some(first), Some(last)) if history.len() >= 2 => {
                Some(first.data.error_percentage - last.data.error_percentage)
            }
            _ => None,
        };

        Self { analyses_count: history.len(), average_error, recent_trend }
    }
}

/// Analyses belonging to the same student as `current`, in the order given.
pub(crate) fn student_history(current: &Analysis, analyses: &[Analysis]) -> Vec<Analysis> {
    analyses
        .iter()
        .filter(|analysis| analysis.student_name == current.student_name)
        .cloned()
        .collect()
}

/// Returns `None` when there is no persisted analysis to report on.
pub(crate) fn build_report(
    current: Option<&Analysis>,
    analyses: &[Analysis],
    generated_at: OffsetDateTime,
) -> Option<Report> {
    let current = current.filter(|analysis| analysis.has_id())?;
    let history = student_history(current, analyses);

    Some(Report {
        generated_at,
        student_name: current.student_name.clone(),
        subject: current.subject.clone(),
        current_analysis: current.clone(),
        metrics: ReportMetrics::from_history(&history),
        historical_analyses: history,
    })
}

pub(crate) fn report_file_name(student_name: &str) -> String {
    let source = if student_name.is_empty() { "report" } else { student_name };
    let safe: String = source
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect();
    format!("report-{safe}.json")
}

pub(crate) async fn write_report(report: &Report, dir: &Path) -> anyhow::Result<PathBuf> {
    let path = dir.join(report_file_name(&report.student_name));
    let body = serde_json::to_vec_pretty(report).context("Failed to encode report")?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
    tokio::fs::write(&path, body)
        .await
        .with_context(|| format!("Failed to write report {}", path.display()))?;

    tracing::info!(
        path = %path.display(),
        student = %report.student_name,
        analyses = report.metrics.analyses_count,
        "Report written"
    );

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{analysis_fixture, scratch_dir};
    use time::macros::datetime;

    fn history() -> Vec<Analysis> {
        vec![
            analysis_fixture("a3", "Ana Souza", 40.0),
            analysis_fixture("b1", "Bruno", 90.0),
            analysis_fixture("a2", "Ana Souza", 30.0),
            analysis_fixture("a1", "Ana Souza", 20.0),
        ]
    }

    #[test]
    fn metrics_follow_history_order() {
        let all = history();
        let report = build_report(all.first(), &all, datetime!(2025-04-01 12:00 UTC)).expect("report");

        assert_eq!(report.historical_analyses.len(), 3);
        assert_eq!(report.metrics.analyses_count, 3);
        assert_eq!(report.metrics.average_error, 30);
        assert_eq!(report.metrics.recent_trend, Some(20.0));
    }

    #[test]
    fn single_analysis_has_no_trend() {
        let all = vec![analysis_fixture("b1", "Bruno", 33.4)];
        let metrics = ReportMetrics::from_history(&all);
        assert_eq!(metrics.average_error, 33);
        assert_eq!(metrics.recent_trend, None);
        assert_eq!(ReportMetrics::from_history(&[]).average_error, 0);
    }

    #[test]
    fn no_report_without_an_id() {
        let mut pending = analysis_fixture("", "Ana", 10.0);
        pending.id.clear();
        assert!(build_report(Some(&pending), &[], OffsetDateTime::now_utc()).is_none());
        assert!(build_report(None, &[], OffsetDateTime::now_utc()).is_none());
    }

    #[test]
    fn file_name_is_sanitized() {
        assert_eq!(report_file_name("Ana Souza/5ºA"), "report-Ana_Souza_5_A.json");
        assert_eq!(report_file_name(""), "report-report.json");
    }

    #[tokio::test]
    async fn writes_pretty_json() {
        let all = history();
        let report = build_report(all.first(), &all, datetime!(2025-04-01 12:00 UTC)).expect("report");
        let dir = scratch_dir();

        let path = write_report(&report, &dir).await.expect("written");
        assert_eq!(path.file_name().and_then(|name| name.to_str()), Some("report-Ana_Souza.json"));

        let body = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed["generatedAt"], "2025-04-01T12:00:00Z");
        assert_eq!(parsed["metrics"]["averageError"], 30);
        assert_eq!(parsed["metrics"]["recentTrend"], 20.0);
        assert_eq!(parsed["currentAnalysis"]["id"], "a3");
        assert!(body.contains("\n  \"studentName\""));
    }
}
