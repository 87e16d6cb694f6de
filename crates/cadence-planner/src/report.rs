//! Skip report sink.
//!
//! Report generation is a collaborator of the pipeline, not part of it: the
//! committer hands the structured skip list to a sink and records whatever
//! reference comes back.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::batch::SkipEntry;
use crate::PlannerError;

/// Writes a skip report somewhere downloadable and returns its reference.
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn write(&self, entries: &[SkipEntry]) -> Result<String, PlannerError>;
}

/// CSV files under a local reports directory, addressed via a public base
/// URL.
pub struct LocalReportSink {
    dir: PathBuf,
    public_base: String,
}

impl LocalReportSink {
    pub fn new(dir: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            public_base: public_base.into(),
        }
    }
}

#[async_trait]
impl ReportSink for LocalReportSink {
    async fn write(&self, entries: &[SkipEntry]) -> Result<String, PlannerError> {
        let filename = format!("skipped_{}.csv", Utc::now().format("%Y%m%d_%H%M%S"));

        let mut body = String::from(
            "date,reason,intended_local_time,intended_utc_time,media_url,note\n",
        );
        for e in entries {
            body.push_str(&format!(
                "{},{},{},{},{},{}\n",
                e.date,
                e.reason.as_str(),
                e.intended_local_time,
                e.intended_utc_time.to_rfc3339(),
                csv_field(&e.media_url),
                csv_field(&e.note),
            ));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PlannerError::Report(e.to_string()))?;
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| PlannerError::Report(e.to_string()))?;

        info!(path = %path.display(), entries = entries.len(), "skip report written");
        Ok(format!(
            "{}/{}",
            self.public_base.trim_end_matches('/'),
            filename
        ))
    }
}

/// Minimal CSV quoting: wrap fields containing separators or quotes.
fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::SkipReason;
    use chrono::NaiveDate;

    fn entry(note: &str) -> SkipEntry {
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let local = date.and_hms_opt(12, 0, 0).unwrap();
        SkipEntry {
            date,
            reason: SkipReason::DailyCap,
            intended_local_time: local,
            intended_utc_time: local.and_utc(),
            media_url: "/media/a.jpg".to_string(),
            note: note.to_string(),
        }
    }

    #[tokio::test]
    async fn test_writes_csv_and_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalReportSink::new(dir.path(), "http://localhost:8080/media/reports");

        let url = sink.write(&[entry("Limit 15/day")]).await.unwrap();
        assert!(url.starts_with("http://localhost:8080/media/reports/skipped_"));
        assert!(url.ends_with(".csv"));

        let filename = url.rsplit('/').next().unwrap();
        let written = std::fs::read_to_string(dir.path().join(filename)).unwrap();
        assert!(written.starts_with("date,reason,"));
        assert!(written.contains("daily_cap"));
        assert!(written.contains("Limit 15/day"));
    }

    #[tokio::test]
    async fn test_fields_with_commas_are_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let sink = LocalReportSink::new(dir.path(), "/reports");

        let url = sink.write(&[entry("could not fit, window full")]).await.unwrap();
        let filename = url.rsplit('/').next().unwrap();
        let written = std::fs::read_to_string(dir.path().join(filename)).unwrap();
        assert!(written.contains("\"could not fit, window full\""));
    }

    #[test]
    fn test_csv_field_escapes_quotes() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
