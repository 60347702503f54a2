use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingSession {
    pub id: String,
    pub start_url: String,
    #[serde(default = "default_status")]
    pub status: String, // "pending", "recording", "paused", "completed", "error"
    #[serde(default)]
    pub entry_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

fn default_status() -> String {
    "pending".to_string()
}

impl RecordingSession {
    pub fn new(start_url: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            start_url,
            status: "pending".to_string(),
            entry_count: 0,
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = "recording".to_string();
        self.started_at = Some(Utc::now());
    }

    pub fn pause(&mut self) {
        self.status = "paused".to_string();
    }

    pub fn resume(&mut self) {
        self.status = "recording".to_string();
    }

    pub fn complete(&mut self) {
        self.status = "completed".to_string();
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String) {
        self.status = "error".to_string();
        self.error = Some(error);
        self.completed_at = Some(Utc::now());
    }
}

/// How one replayed step ended.
///
/// `skipped` marks steps whose locator never resolved (or unknown entries);
/// `success: false` without `skipped` means the element was found but every
/// dispatch attempt failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    pub action: String,
    pub success: bool,
    #[serde(default)]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: i64,
}

impl StepResult {
    pub fn success(index: usize, action: &str, duration_ms: i64) -> Self {
        Self {
            index,
            action: action.to_string(),
            success: true,
            skipped: false,
            error: None,
            duration_ms,
        }
    }

    pub fn skipped(index: usize, action: &str, reason: String) -> Self {
        Self {
            index,
            action: action.to_string(),
            success: false,
            skipped: true,
            error: Some(reason),
            duration_ms: 0,
        }
    }

    pub fn failure(index: usize, action: &str, error: String, duration_ms: i64) -> Self {
        Self {
            index,
            action: action.to_string(),
            success: false,
            skipped: false,
            error: Some(error),
            duration_ms,
        }
    }
}

/// End-of-replay accounting. Playback always runs the script to completion
/// (or explicit cancellation); failures are reported here, never raised.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ReplaySummary {
    pub fn record(&mut self, result: &StepResult) {
        if result.success {
            self.completed += 1;
        } else if result.skipped {
            self.skipped += 1;
        } else {
            self.failed += 1;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySession {
    pub id: String,
    #[serde(default = "default_status")]
    pub status: String, // "pending", "running", "completed", "stopped", "error"
    #[serde(default)]
    pub current_step: usize,
    #[serde(default)]
    pub total_steps: usize,
    #[serde(default)]
    pub results: Vec<StepResult>,
    #[serde(default)]
    pub summary: ReplaySummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReplaySession {
    pub fn new(total_steps: usize) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: "pending".to_string(),
            current_step: 0,
            total_steps,
            results: Vec::new(),
            summary: ReplaySummary {
                total: total_steps,
                ..Default::default()
            },
            error: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn start(&mut self) {
        self.status = "running".to_string();
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = "completed".to_string();
        self.completed_at = Some(Utc::now());
    }

    pub fn stopped(&mut self) {
        self.status = "stopped".to_string();
        self.completed_at = Some(Utc::now());
    }

    pub fn add_result(&mut self, result: StepResult) {
        self.summary.record(&result);
        self.results.push(result);
        self.current_step += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_outcomes() {
        let mut session = ReplaySession::new(3);
        session.start();
        session.add_result(StepResult::success(0, "navigate", 12));
        session.add_result(StepResult::skipped(1, "click", "no element for '#gone'".into()));
        session.add_result(StepResult::failure(2, "drag", "dispatch rejected".into(), 40));
        session.complete();

        assert_eq!(session.summary.total, 3);
        assert_eq!(session.summary.completed, 1);
        assert_eq!(session.summary.skipped, 1);
        assert_eq!(session.summary.failed, 1);
        assert_eq!(session.current_step, 3);
        assert_eq!(session.status, "completed");
    }
}
