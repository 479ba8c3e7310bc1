//! Subcommands and their dispatch.
//!
//! Every command writes one JSON document to stdout. A rejected submission
//! prints its validation report before failing.

use anyhow::Context;
use clap::{Parser, Subcommand};
use domain::models::{CopyJobDraft, JobState};
use domain::services::{CopyJobService, JobListFilter};
use domain::DomainError;
use serde::Serialize;
use serde_json::{json, Value};
use shared::HostAddress;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::app::{build_service, Backends};
use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "dbcopy", version, about = "Submit and track MySQL database copy jobs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply pending metadata store migrations.
    Migrate,

    /// Validate a copy request read from a JSON file and create the job.
    Submit {
        #[arg(long)]
        user: String,
        #[arg(long)]
        file: PathBuf,
        /// Create the job even if target collisions were found.
        #[arg(long)]
        accept_warnings: bool,
    },

    /// Derived status of a job.
    Status { job_id: String },

    /// Per-table transfer logs of a job.
    Logs { job_id: String },

    /// List jobs, newest first.
    Jobs {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        state: Option<JobState>,
    },

    /// Print a copy request carrying the parameters of an existing job.
    Resubmit { job_id: String },

    Delete {
        job_id: String,
        #[arg(long)]
        user: String,
    },

    /// Schemas on a host. Filters use SQL `LIKE` wildcards: `%` for any run of
    /// characters, `_` for exactly one.
    Schemas {
        host: HostAddress,
        #[arg(long)]
        include: Vec<String>,
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Tables of one schema on a host.
    Tables {
        host: HostAddress,
        schema: String,
        #[arg(long)]
        include: Vec<String>,
        #[arg(long)]
        exclude: Vec<String>,
    },

    /// Registered hosts whose name contains `pattern`. With `--user`, only
    /// active hosts that user may copy onto.
    Hosts {
        #[arg(default_value = "")]
        pattern: String,
        #[arg(long)]
        user: Option<String>,
    },

    /// Target groups available to a user.
    Groups {
        #[arg(long)]
        user: String,
    },
}

/// Runs `command` against the metadata store behind `pool`.
pub async fn run(command: Command, config: &Config, pool: PgPool) -> anyhow::Result<()> {
    if let Command::Migrate = command {
        info!("Running database migrations...");
        persistence::db::run_migrations(&pool).await?;
        info!("Database migrations completed");
        return Ok(());
    }

    let service = build_service(Backends::connect(&pool, config), config);
    match execute(command, &service).await {
        Ok(output) => print_json(&output),
        Err(err) => {
            if let Some(report) = err.downcast_ref::<DomainError>().and_then(DomainError::report) {
                print_json(report)?;
            }
            Err(err)
        }
    }
}

/// Executes a job command and returns its output document.
pub async fn execute(command: Command, service: &CopyJobService) -> anyhow::Result<Value> {
    let output = match command {
        Command::Migrate => anyhow::bail!("migrations run against the metadata store directly"),
        Command::Submit {
            user,
            file,
            accept_warnings,
        } => {
            let mut draft = read_draft(&file).await?;
            draft.accept_warnings |= accept_warnings;
            let user = service.resolve_user(&user).await?;
            let job_id = service.submit(&draft, &user).await?;
            json!({ "job_id": job_id })
        }
        Command::Status { job_id } => to_value(service.status_of(&job_id).await?)?,
        Command::Logs { job_id } => to_value(service.transfer_logs(&job_id).await?)?,
        Command::Jobs { user, state } => {
            let filter = JobListFilter {
                username: user,
                state,
            };
            to_value(service.list_jobs(&filter).await?)?
        }
        Command::Resubmit { job_id } => to_value(service.resubmit(&job_id).await?)?,
        Command::Delete { job_id, user } => {
            let user = service.resolve_user(&user).await?;
            service.delete(&job_id, &user).await?;
            json!({ "deleted": job_id })
        }
        Command::Schemas {
            host,
            include,
            exclude,
        } => to_value(service.list_schemas(&host, &include, &exclude).await?)?,
        Command::Tables {
            host,
            schema,
            include,
            exclude,
        } => to_value(
            service
                .list_tables(&host, &[schema], &include, &exclude)
                .await?,
        )?,
        Command::Hosts { pattern, user } => match user {
            Some(user) => {
                let user = service.resolve_user(&user).await?;
                to_value(service.list_target_hosts(&user, &pattern).await?)?
            }
            None => to_value(service.list_source_hosts(&pattern).await?)?,
        },
        Command::Groups { user } => {
            let user = service.resolve_user(&user).await?;
            to_value(service.target_groups_for(&user).await?)?
        }
    };
    Ok(output)
}

async fn read_draft(path: &Path) -> anyhow::Result<CopyJobDraft> {
    let body = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&body).with_context(|| format!("Invalid copy request in {}", path.display()))
}

fn to_value<T: Serialize>(value: T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{addr, mock_service};
    use domain::services::IssueKind;

    fn parse(args: &[&str]) -> Command {
        Cli::try_parse_from(std::iter::once("dbcopy").chain(args.iter().copied()))
            .expect("arguments should parse")
            .command
    }

    fn write_request(name: &str, request: &Value) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "dbcopy-{}-{}.json",
            name,
            std::process::id()
        ));
        std::fs::write(&path, request.to_string()).unwrap();
        path
    }

    #[test]
    fn test_parse_jobs_filter() {
        match parse(&["jobs", "--user", "jdoe", "--state", "running"]) {
            Command::Jobs { user, state } => {
                assert_eq!(user.as_deref(), Some("jdoe"));
                assert_eq!(state, Some(JobState::Running));
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["dbcopy", "jobs", "--state", "paused"]).is_err());
    }

    #[test]
    fn test_parse_schemas_filters() {
        match parse(&["schemas", "host2:3306", "--include", "db%", "--include", "core", "--exclude", "db_tmp"]) {
            Command::Schemas {
                host,
                include,
                exclude,
            } => {
                assert_eq!(host, addr("host2"));
                assert_eq!(include, vec!["db%", "core"]);
                assert_eq!(exclude, vec!["db_tmp"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["dbcopy", "schemas", "host2"]).is_err());
    }

    #[tokio::test]
    async fn test_execute_schemas_and_tables() {
        let (service, _) = mock_service();

        let schemas = execute(parse(&["schemas", "host2:3306", "--include", "db%"]), &service)
            .await
            .unwrap();
        assert_eq!(schemas, json!(["db1", "db2"]));

        let single_char = execute(
            parse(&["schemas", "host2:3306", "--include", "db_", "--exclude", "_b2"]),
            &service,
        )
        .await
        .unwrap();
        assert_eq!(single_char, json!(["db1"]));

        let tables = execute(
            parse(&["tables", "host2:3306", "db1", "--exclude", "meta"]),
            &service,
        )
        .await
        .unwrap();
        assert_eq!(tables, json!(["gene"]));
    }

    #[tokio::test]
    async fn test_execute_submit_then_status() {
        let (service, store) = mock_service();
        let file = write_request(
            "submit",
            &json!({
                "source_host": "host2:3306",
                "target_hosts": ["host3:3306"],
                "include_schemas": ["db1"]
            }),
        );

        let output = execute(
            parse(&["submit", "--user", "jdoe", "--file", file.to_str().unwrap()]),
            &service,
        )
        .await
        .unwrap();
        std::fs::remove_file(&file).ok();

        let job_id = output["job_id"].as_str().unwrap().to_string();
        assert_eq!(store.len(), 1);

        let status = execute(Command::Status { job_id: job_id.clone() }, &service)
            .await
            .unwrap();
        assert_eq!(status["state"], json!("submitted"));

        let jobs = execute(parse(&["jobs", "--state", "complete"]), &service)
            .await
            .unwrap();
        assert_eq!(jobs, json!([]));

        let deleted = execute(parse(&["delete", job_id.as_str(), "--user", "jdoe"]), &service)
            .await
            .unwrap();
        assert_eq!(deleted["deleted"], json!(job_id));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_execute_rejected_submission_carries_report() {
        let (service, store) = mock_service();
        let file = write_request(
            "rejected",
            &json!({
                "source_host": "host2:3306",
                "target_hosts": ["host9:3306"],
                "include_schemas": ["db1"]
            }),
        );

        let err = execute(
            parse(&["submit", "--user", "jdoe", "--file", file.to_str().unwrap()]),
            &service,
        )
        .await
        .unwrap_err();
        std::fs::remove_file(&file).ok();

        let report = err
            .downcast_ref::<DomainError>()
            .and_then(DomainError::report)
            .expect("rejection should carry a report");
        assert!(report.has_issue(IssueKind::HostUnavailable));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_execute_unknown_job() {
        let (service, _) = mock_service();
        let err = execute(parse(&["status", "nope"]), &service)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DomainError>(),
            Some(DomainError::NotFound(_))
        ));
    }
}
