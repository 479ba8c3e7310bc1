//! Job and table status derivation.
//!
//! Status is never stored: every read recomputes it from the engine's raw
//! status and the job's transfer log counts.
//!
//! | raw status                         | transfers                 | state       |
//! |------------------------------------|---------------------------|-------------|
//! | none                               |                           | Submitted   |
//! | creating                           |                           | Scheduled   |
//! | processing                         | none                      | Scheduled   |
//! | processing                         | some                      | Running     |
//! | `Try:a/m. d/e`, d >= e             |                           | Complete    |
//! | `Try:a/m. d/e`, a >= m, d < e      |                           | Failed      |
//! | `Try:a/m. d/e`, a < m, d < e       | some still running        | Running     |
//! | `Try:a/m. d/e`, a < m, d < e       | none running              | Failed      |
//! | ended                              | some still running        | Failed      |
//! | ended                              | none running              | Complete    |
//! | `error...`                         |                           | Failed      |
//! | anything else                      |                           | Submitted   |

use crate::models::{
    JobSnapshot, JobState, JobStatusReport, RawStatus, TableState, TransferAggregate, TransferLog,
};

/// Derive the lifecycle state of a job.
pub fn derive_job_state(raw: &RawStatus, transfers: &TransferAggregate) -> JobState {
    match raw {
        RawStatus::NotStarted => JobState::Submitted,
        RawStatus::Creating => JobState::Scheduled,
        RawStatus::Processing => {
            if transfers.has_logs() {
                JobState::Running
            } else {
                JobState::Scheduled
            }
        }
        RawStatus::Attempt {
            attempt,
            max_attempts,
            done,
            expected,
        } => {
            if done >= expected {
                JobState::Complete
            } else if attempt >= max_attempts {
                JobState::Failed
            } else if transfers.has_running() {
                JobState::Running
            } else {
                // Attempts left but nothing in flight: the engine gave up.
                JobState::Failed
            }
        }
        RawStatus::Ended => {
            if transfers.has_running() {
                JobState::Failed
            } else {
                JobState::Complete
            }
        }
        RawStatus::Error(_) => JobState::Failed,
        RawStatus::Unrecognized(_) => JobState::Submitted,
    }
}

/// Derive the state of one table transfer from its own row and the raw
/// status of the owning job.
pub fn derive_table_state(log: &TransferLog, job_status: &RawStatus) -> TableState {
    if log.ended_at.is_some() {
        return TableState::Complete;
    }
    match job_status {
        RawStatus::Ended | RawStatus::Attempt { .. } => TableState::Failed,
        RawStatus::Processing => TableState::Running,
        _ => TableState::Submitted,
    }
}

/// Share of finished transfers, in percent with one decimal.
pub fn progress_percent(transfers: &TransferAggregate) -> f64 {
    if transfers.total == 0 {
        return 0.0;
    }
    let ratio = transfers.done() as f64 / transfers.total as f64 * 100.0;
    (ratio * 10.0).round() / 10.0
}

pub fn state_of(snapshot: &JobSnapshot) -> JobState {
    let raw = RawStatus::parse(snapshot.job.raw_status.as_deref());
    derive_job_state(&raw, &snapshot.transfers)
}

pub fn status_report(snapshot: &JobSnapshot) -> JobStatusReport {
    let transfers = &snapshot.transfers;
    JobStatusReport {
        job_id: snapshot.job.job_id.clone(),
        state: state_of(snapshot),
        raw_status: snapshot.job.raw_status.clone(),
        progress_percent: progress_percent(transfers),
        done_count: transfers.done(),
        running_count: transfers.running,
        total_count: transfers.total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn parse(raw: &str) -> RawStatus {
        RawStatus::parse(Some(raw))
    }

    fn agg(total: u64, running: u64) -> TransferAggregate {
        TransferAggregate::new(total, running)
    }

    fn log(ended: bool) -> TransferLog {
        TransferLog {
            id: 7,
            job_id: "job".into(),
            target_host: "host3:3306".into(),
            table_schema: "db1".into(),
            table_name: "transcript".into(),
            renamed_table_schema: "db1".into(),
            target_directory: None,
            started_at: Some(Utc::now()),
            ended_at: ended.then(Utc::now),
            size: None,
            retries: None,
            message: None,
        }
    }

    #[test]
    fn test_no_status_is_submitted() {
        assert_eq!(
            derive_job_state(&RawStatus::NotStarted, &agg(0, 0)),
            JobState::Submitted
        );
    }

    #[test]
    fn test_creating_is_scheduled() {
        assert_eq!(
            derive_job_state(&parse("Creating Requests"), &agg(3, 3)),
            JobState::Scheduled
        );
    }

    #[test]
    fn test_processing_depends_on_logs() {
        let processing = parse("Processing Requests");
        assert_eq!(
            derive_job_state(&processing, &agg(0, 0)),
            JobState::Scheduled
        );
        assert_eq!(derive_job_state(&processing, &agg(4, 1)), JobState::Running);
        assert_eq!(derive_job_state(&processing, &agg(4, 0)), JobState::Running);
    }

    #[test]
    fn test_attempt_all_done_is_complete_regardless_of_tries() {
        let raw = parse("Try:2/3. 5/5 Transferred");
        assert_eq!(derive_job_state(&raw, &agg(5, 0)), JobState::Complete);
        assert_eq!(derive_job_state(&raw, &agg(5, 2)), JobState::Complete);
    }

    #[test]
    fn test_attempt_exhausted_incomplete_is_failed() {
        let raw = parse("Try:3/3. 4/5 Transferred");
        assert_eq!(derive_job_state(&raw, &agg(5, 1)), JobState::Failed);
        assert_eq!(derive_job_state(&raw, &agg(5, 0)), JobState::Failed);
    }

    #[test]
    fn test_attempt_with_tries_left() {
        let raw = parse("Try:1/3. 4/5 Transferred");
        assert_eq!(derive_job_state(&raw, &agg(5, 1)), JobState::Running);
        assert_eq!(derive_job_state(&raw, &agg(5, 0)), JobState::Failed);
    }

    #[test]
    fn test_ended() {
        let raw = parse("Transfer Ended");
        assert_eq!(derive_job_state(&raw, &agg(5, 0)), JobState::Complete);
        assert_eq!(derive_job_state(&raw, &agg(0, 0)), JobState::Complete);
        assert_eq!(derive_job_state(&raw, &agg(5, 2)), JobState::Failed);
    }

    #[test]
    fn test_error_is_failed() {
        assert_eq!(
            derive_job_state(&parse("Error: could not connect"), &agg(0, 0)),
            JobState::Failed
        );
        assert_eq!(
            derive_job_state(&parse("error"), &agg(2, 2)),
            JobState::Failed
        );
    }

    #[test]
    fn test_unrecognized_falls_back_to_submitted() {
        assert_eq!(
            derive_job_state(&parse("Manually Launched by Production team"), &agg(1, 1)),
            JobState::Submitted
        );
    }

    #[test]
    fn test_derivation_is_idempotent() {
        let raw = parse("Try:3/3. 4/5 Transferred");
        let transfers = agg(5, 1);
        let first = derive_job_state(&raw, &transfers);
        for _ in 0..10 {
            assert_eq!(derive_job_state(&raw, &transfers), first);
        }
    }

    #[test]
    fn test_table_state() {
        assert_eq!(
            derive_table_state(&log(true), &parse("Processing Requests")),
            TableState::Complete
        );
        assert_eq!(
            derive_table_state(&log(false), &parse("Transfer Ended")),
            TableState::Failed
        );
        assert_eq!(
            derive_table_state(&log(false), &parse("Try:1/3. 1/2 Transferred")),
            TableState::Failed
        );
        assert_eq!(
            derive_table_state(&log(false), &parse("Processing Requests")),
            TableState::Running
        );
        assert_eq!(
            derive_table_state(&log(false), &parse("Creating Requests")),
            TableState::Submitted
        );
        assert_eq!(
            derive_table_state(&log(false), &RawStatus::NotStarted),
            TableState::Submitted
        );
    }

    #[test]
    fn test_progress() {
        assert_eq!(progress_percent(&agg(0, 0)), 0.0);
        assert_eq!(progress_percent(&agg(4, 0)), 100.0);
        assert_eq!(progress_percent(&agg(4, 3)), 25.0);
        assert_eq!(progress_percent(&agg(3, 2)), 33.3);
        assert_eq!(progress_percent(&agg(3, 1)), 66.7);
    }
}
