use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Provenance of a classification run, attached to every batch summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub run_id: Uuid,
    pub classifier_version: String,
    pub config_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunInfo {
    pub fn start(config_version: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            classifier_version: env!("CARGO_PKG_VERSION").to_owned(),
            config_version: config_version.to_owned(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_stamps_end_time() {
        let run = RunInfo::start("v1");
        assert!(run.finished_at.is_none());
        let run = run.finish();
        assert!(run.finished_at.unwrap() >= run.started_at);
        assert_eq!(run.config_version, "v1");
    }
}
