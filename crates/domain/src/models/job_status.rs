//! Job status vocabulary.
//!
//! The execution engine reports progress through one free-text status column.
//! [`RawStatus::parse`] is the only place that looks at that text; everything
//! downstream works on the typed value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status written by the engine while it expands the job into table requests.
pub const STATUS_CREATING: &str = "Creating Requests";
/// Status written by the engine while table requests are being processed.
pub const STATUS_PROCESSING: &str = "Processing Requests";
/// Status written by the engine once its last transfer cycle has finished.
pub const STATUS_ENDED: &str = "Transfer Ended";
/// Case-insensitive prefix of engine error statuses.
pub const STATUS_ERROR_PREFIX: &str = "error";

lazy_static::lazy_static! {
    static ref ATTEMPT_REGEX: regex::Regex =
        regex::Regex::new(r"Try:\s*(\d+)/(\d+)\.\s*(\d+)/(\d+)\s+Transferred").unwrap();
}

/// Decoded form of the engine's raw status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawStatus {
    /// No status yet: the engine has not picked the job up.
    NotStarted,
    Creating,
    Processing,
    /// `Try:<attempt>/<max_attempts>. <done>/<expected> Transferred`
    Attempt {
        attempt: u32,
        max_attempts: u32,
        done: u64,
        expected: u64,
    },
    Ended,
    Error(String),
    Unrecognized(String),
}

impl RawStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
            return RawStatus::NotStarted;
        };

        match raw {
            STATUS_CREATING => return RawStatus::Creating,
            STATUS_PROCESSING => return RawStatus::Processing,
            STATUS_ENDED => return RawStatus::Ended,
            _ => {}
        }

        if let Some(caps) = ATTEMPT_REGEX.captures(raw) {
            let attempt = caps[1].parse::<u32>();
            let max_attempts = caps[2].parse::<u32>();
            let done = caps[3].parse::<u64>();
            let expected = caps[4].parse::<u64>();
            if let (Ok(attempt), Ok(max_attempts), Ok(done), Ok(expected)) =
                (attempt, max_attempts, done, expected)
            {
                return RawStatus::Attempt {
                    attempt,
                    max_attempts,
                    done,
                    expected,
                };
            }
        }

        let is_error = raw
            .get(..STATUS_ERROR_PREFIX.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(STATUS_ERROR_PREFIX));
        if is_error {
            return RawStatus::Error(raw.to_string());
        }

        RawStatus::Unrecognized(raw.to_string())
    }

    /// True while the engine is actively working on the job.
    pub fn is_mid_execution(&self) -> bool {
        matches!(self, RawStatus::Creating | RawStatus::Processing)
    }
}

/// Lifecycle state of a copy job, derived on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Submitted,
    Scheduled,
    Running,
    Complete,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Submitted => "submitted",
            JobState::Scheduled => "scheduled",
            JobState::Running => "running",
            JobState::Complete => "complete",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }

    /// A job blocks equivalent submissions until it reaches a terminal state.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "submitted" => Ok(JobState::Submitted),
            "scheduled" => Ok(JobState::Scheduled),
            "running" => Ok(JobState::Running),
            "complete" | "completed" => Ok(JobState::Complete),
            "failed" => Ok(JobState::Failed),
            _ => Err(format!("Invalid job state: {}", s)),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// State of one table transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableState {
    Submitted,
    Running,
    Complete,
    Failed,
}

impl fmt::Display for TableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableState::Submitted => write!(f, "submitted"),
            TableState::Running => write!(f, "running"),
            TableState::Complete => write!(f, "complete"),
            TableState::Failed => write!(f, "failed"),
        }
    }
}

/// Status of a job as presented to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct JobStatusReport {
    pub job_id: String,
    pub state: JobState,
    pub raw_status: Option<String>,
    pub progress_percent: f64,
    pub done_count: u64,
    pub running_count: u64,
    pub total_count: u64,
}
