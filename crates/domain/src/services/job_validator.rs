//! Pre-submission validation of copy requests.
//!
//! [`JobValidator::validate`] runs every check and collects the outcome in a
//! [`ValidationReport`] instead of stopping at the first problem. Checks that
//! depend on an earlier one are skipped when their precondition failed: no
//! schema lookups against a malformed host, no collision lookup against a
//! target that is unregistered or unreachable.

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use shared::validation::{validate_email_list, validate_host_address, validate_host_list};
use shared::{HostAddress, NamePatternSet};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, info};

use crate::error::DomainError;
use crate::models::{ActingUser, CopyJob, CopyJobDraft};
use crate::services::access_control::{AccessControl, TargetCheck};
use crate::services::conflict::ConflictDetector;
use crate::services::schema_introspection::{IntrospectionError, SchemaIntrospector};

pub const FIELD_SOURCE_HOST: &str = "source_host";
pub const FIELD_TARGET_HOSTS: &str = "target_hosts";
pub const FIELD_INCLUDE_SCHEMAS: &str = "include_schemas";
pub const FIELD_EXCLUDE_SCHEMAS: &str = "exclude_schemas";
pub const FIELD_INCLUDE_TABLES: &str = "include_tables";
pub const FIELD_EXCLUDE_TABLES: &str = "exclude_tables";
pub const FIELD_TARGET_NAMES: &str = "target_names";
pub const FIELD_EMAIL_LIST: &str = "email_list";
/// Key for problems that concern the request as a whole.
pub const FIELD_JOB: &str = "job";

/// Category of a blocking validation problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    InvalidFormat,
    InvalidFilter,
    RenameMismatch,
    TableFilterScope,
    HostUnavailable,
    NoMatchingSchema,
    IdenticalSourceTarget,
    ConflictingSkipAndRename,
    Forbidden,
    DuplicateJob,
}

/// One blocking problem on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldIssue {
    pub kind: IssueKind,
    pub message: String,
    /// Host the problem is scoped to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Conflicting job, for duplicates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl FieldIssue {
    pub fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            host: None,
            job_id: None,
        }
    }

    pub fn on_host(mut self, host: &HostAddress) -> Self {
        self.host = Some(host.to_string());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    TargetCollision,
    TableCollision,
}

/// A non-blocking finding the submitter has to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldWarning {
    pub kind: WarningKind,
    pub host: String,
    /// Colliding schema or table names.
    pub names: Vec<String>,
    pub message: String,
}

/// Accumulated outcome of validating one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: BTreeMap<String, Vec<FieldIssue>>,
    pub warnings: Vec<FieldWarning>,
}

impl ValidationReport {
    pub fn add_error(&mut self, field: &str, issue: FieldIssue) {
        self.errors.entry(field.to_string()).or_default().push(issue);
    }

    pub fn add_warning(&mut self, warning: FieldWarning) {
        self.warnings.push(warning);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn errors_for(&self, field: &str) -> &[FieldIssue] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_issue(&self, kind: IssueKind) -> bool {
        self.errors.values().flatten().any(|i| i.kind == kind)
    }

    fn field_has_errors(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for (field, issues) in &self.errors {
            for issue in issues {
                parts.push(format!("{}: {}", field, issue.message));
            }
        }
        for warning in &self.warnings {
            parts.push(format!("warning: {}", warning.message));
        }
        f.write_str(&parts.join("; "))
    }
}

/// Result of [`JobValidator::validate`]. `job` is set when no blocking
/// problem was found.
#[derive(Debug, Clone)]
pub struct Validation {
    pub report: ValidationReport,
    pub job: Option<CopyJob>,
}

struct TableOverlap {
    target_schema: String,
    source_tables: BTreeSet<String>,
}

#[derive(Default)]
struct Collisions {
    schemas: Vec<String>,
    tables: Vec<String>,
}

/// Runs the full pre-submission pipeline.
#[derive(Clone)]
pub struct JobValidator {
    introspector: SchemaIntrospector,
    access: AccessControl,
    conflicts: ConflictDetector,
}

impl JobValidator {
    pub fn new(
        introspector: SchemaIntrospector,
        access: AccessControl,
        conflicts: ConflictDetector,
    ) -> Self {
        Self {
            introspector,
            access,
            conflicts,
        }
    }

    pub async fn validate(
        &self,
        draft: &CopyJobDraft,
        user: &ActingUser,
    ) -> Result<Validation, DomainError> {
        let draft = draft.normalized();
        let mut report = ValidationReport::default();

        // Structure.
        let source = match validate_host_address(&draft.source_host) {
            Ok(host) => Some(host),
            Err(_) => {
                report.add_error(
                    FIELD_SOURCE_HOST,
                    FieldIssue::new(
                        IssueKind::InvalidFormat,
                        "Source host should be formatted like host:port",
                    ),
                );
                None
            }
        };
        let targets = match validate_host_list(&draft.target_hosts) {
            Ok(hosts) => hosts,
            Err(e) => {
                let message = e
                    .message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                report.add_error(
                    FIELD_TARGET_HOSTS,
                    FieldIssue::new(IssueKind::InvalidFormat, message),
                );
                Vec::new()
            }
        };
        if !draft.email_list.is_empty() {
            if let Err(e) = validate_email_list(&draft.email_list) {
                let message = e.message.map(|m| m.to_string()).unwrap_or_default();
                report.add_error(
                    FIELD_EMAIL_LIST,
                    FieldIssue::new(IssueKind::InvalidFormat, message),
                );
            }
        }

        let include = parse_filters(&mut report, FIELD_INCLUDE_SCHEMAS, &draft.include_schemas);
        let exclude = parse_filters(&mut report, FIELD_EXCLUDE_SCHEMAS, &draft.exclude_schemas);
        let include_tables = parse_filters(&mut report, FIELD_INCLUDE_TABLES, &draft.include_tables);
        let exclude_tables = parse_filters(&mut report, FIELD_EXCLUDE_TABLES, &draft.exclude_tables);

        check_rename_list(&mut report, &draft, include.as_ref());
        check_table_scope(&mut report, &draft, include.as_ref());

        // Target registration. Permission problems are reported further down,
        // after the schema checks.
        let mut checks = Vec::with_capacity(targets.len());
        for target in &targets {
            let check = self.access.check_target(user, target).await?;
            match &check {
                TargetCheck::Unknown => report.add_error(
                    FIELD_TARGET_HOSTS,
                    FieldIssue::new(
                        IssueKind::HostUnavailable,
                        format!("{} is not a registered host", target),
                    )
                    .on_host(target),
                ),
                TargetCheck::Inactive(_) => report.add_error(
                    FIELD_TARGET_HOSTS,
                    FieldIssue::new(
                        IssueKind::HostUnavailable,
                        format!("{} is not active", target),
                    )
                    .on_host(target),
                ),
                TargetCheck::Allowed(_) | TargetCheck::Forbidden(_) => {}
            }
            checks.push((target.clone(), check));
        }

        // Source schemas.
        let source_schemas = match (&source, &include, &exclude) {
            (Some(source), Some(include), Some(exclude)) => {
                match self
                    .introspector
                    .list_schemas_with(source, include, exclude)
                    .await
                {
                    Ok(names) => Some(names),
                    Err(err) => {
                        report.add_error(FIELD_SOURCE_HOST, introspection_issue(source, err));
                        None
                    }
                }
            }
            _ => None,
        };

        let resolved_targets = match (&source_schemas, &include) {
            (Some(schemas), Some(include)) => {
                resolve_target_names(&mut report, &draft, include, schemas, source.as_ref())
            }
            _ => None,
        };

        // Source and target on the same host.
        if let (Some(source), Some(schemas), Some(names)) =
            (&source, &source_schemas, &resolved_targets)
        {
            if targets.contains(source) {
                let clashing: Vec<&String> = names.values().filter(|n| schemas.contains(*n)).collect();
                if !clashing.is_empty() {
                    report.add_error(
                        FIELD_TARGET_HOSTS,
                        FieldIssue::new(
                            IssueKind::IdenticalSourceTarget,
                            format!(
                                "Source and target are both {} and schemas {} would be copied onto themselves",
                                source,
                                join(clashing)
                            ),
                        )
                        .on_host(source),
                    );
                }
            }
        }

        if !draft.exclude_schemas.is_empty() && draft.is_renaming() {
            report.add_error(
                FIELD_EXCLUDE_SCHEMAS,
                FieldIssue::new(
                    IssueKind::ConflictingSkipAndRename,
                    "Schemas to skip cannot be combined with target names",
                ),
            );
        }

        // Collisions on the targets.
        if !draft.wipe_target {
            if let (Some(source), Some(names)) = (&source, &resolved_targets) {
                let reachable: Vec<&HostAddress> = checks
                    .iter()
                    .filter(|(_, c)| matches!(c, TargetCheck::Allowed(_)))
                    .map(|(h, _)| h)
                    .collect();
                let overlap = self
                    .table_overlap(source, names, &targets, include_tables.as_ref(), exclude_tables.as_ref())
                    .await;
                let target_names: Vec<String> = names.values().cloned().collect();

                let outcomes = join_all(
                    reachable
                        .iter()
                        .map(|target| self.find_collisions(target, &target_names, overlap.as_ref())),
                )
                .await;

                for (target, outcome) in reachable.into_iter().zip(outcomes) {
                    match outcome {
                        Ok(collisions) => add_collision_warnings(&mut report, target, collisions),
                        Err(err) => {
                            report.add_error(FIELD_TARGET_HOSTS, introspection_issue(target, err))
                        }
                    }
                }
            }
        }

        // Permissions.
        for (target, check) in &checks {
            if let TargetCheck::Forbidden(_) = check {
                report.add_error(
                    FIELD_TARGET_HOSTS,
                    FieldIssue::new(
                        IssueKind::Forbidden,
                        format!("You are not allowed to copy to {}", target),
                    )
                    .on_host(target),
                );
            }
        }

        let candidate = match &source {
            Some(source) if !targets.is_empty() => Some(CopyJob::from_draft(
                CopyJob::generate_id(),
                &draft,
                source.clone(),
                targets.clone(),
                &user.username,
                draft.email_list.clone(),
                Utc::now(),
            )),
            _ => None,
        };

        // Duplicates.
        if let Some(job) = &candidate {
            if let Some(existing) = self.conflicts.find_active_duplicate(job).await? {
                let mut issue = FieldIssue::new(
                    IssueKind::DuplicateJob,
                    format!(
                        "An equivalent job ({}) is still in progress",
                        existing.job.job_id
                    ),
                );
                issue.job_id = Some(existing.job.job_id.clone());
                report.add_error(FIELD_JOB, issue);
            }
        }

        if report.has_errors() {
            info!(
                user = %user.username,
                errors = report.errors.values().map(Vec::len).sum::<usize>(),
                "Copy request failed validation"
            );
            return Ok(Validation { report, job: None });
        }

        debug!(user = %user.username, warnings = report.warnings.len(), "Copy request validated");
        Ok(Validation {
            report,
            job: candidate,
        })
    }

    async fn table_overlap(
        &self,
        source: &HostAddress,
        names: &BTreeMap<String, String>,
        targets: &[HostAddress],
        include_tables: Option<&NamePatternSet>,
        exclude_tables: Option<&NamePatternSet>,
    ) -> Option<TableOverlap> {
        if names.len() != 1 || targets.len() != 1 {
            return None;
        }
        let (source_schema, target_schema) = names.iter().next()?;
        let include: Vec<String> = include_tables?.iter().map(|p| p.to_string()).collect();
        let exclude: Vec<String> = exclude_tables?.iter().map(|p| p.to_string()).collect();

        // A failure here is already covered by the source schema lookup.
        let source_tables = self
            .introspector
            .list_tables(source, source_schema, &include, &exclude)
            .await
            .ok()?;
        Some(TableOverlap {
            target_schema: target_schema.clone(),
            source_tables,
        })
    }

    async fn find_collisions(
        &self,
        target: &HostAddress,
        target_names: &[String],
        overlap: Option<&TableOverlap>,
    ) -> Result<Collisions, IntrospectionError> {
        let wanted = NamePatternSet::literals(target_names.iter().cloned());
        let existing = self
            .introspector
            .list_schemas_with(target, &wanted, &NamePatternSet::default())
            .await?;
        let mut collisions = Collisions {
            schemas: existing.into_iter().collect(),
            ..Default::default()
        };

        if let Some(overlap) = overlap {
            if collisions.schemas.contains(&overlap.target_schema) {
                match self
                    .introspector
                    .list_tables(target, &overlap.target_schema, &[], &[])
                    .await
                {
                    Ok(tables) => {
                        collisions.tables = tables
                            .intersection(&overlap.source_tables)
                            .cloned()
                            .collect();
                    }
                    Err(IntrospectionError::UnknownSchema { .. }) => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(collisions)
    }
}

fn parse_filters(
    report: &mut ValidationReport,
    field: &str,
    values: &[String],
) -> Option<NamePatternSet> {
    match NamePatternSet::parse_all(values) {
        Ok(set) => Some(set),
        Err(err) => {
            report.add_error(field, FieldIssue::new(IssueKind::InvalidFilter, err.to_string()));
            None
        }
    }
}

fn check_rename_list(
    report: &mut ValidationReport,
    draft: &CopyJobDraft,
    include: Option<&NamePatternSet>,
) {
    if !draft.is_renaming() {
        return;
    }
    if draft.include_schemas.is_empty() {
        report.add_error(
            FIELD_TARGET_NAMES,
            FieldIssue::new(
                IssueKind::RenameMismatch,
                "Target names require an explicit list of schemas to copy",
            ),
        );
        return;
    }
    if draft.target_names.len() != draft.include_schemas.len() {
        report.add_error(
            FIELD_TARGET_NAMES,
            FieldIssue::new(
                IssueKind::RenameMismatch,
                format!(
                    "{} target names given for {} schemas to copy",
                    draft.target_names.len(),
                    draft.include_schemas.len()
                ),
            ),
        );
    }
    if include.is_some_and(NamePatternSet::has_wildcard) {
        report.add_error(
            FIELD_TARGET_NAMES,
            FieldIssue::new(
                IssueKind::RenameMismatch,
                "Schemas to rename must be named without wildcards",
            ),
        );
    }
}

fn check_table_scope(
    report: &mut ValidationReport,
    draft: &CopyJobDraft,
    include: Option<&NamePatternSet>,
) {
    if draft.include_tables.is_empty() && draft.exclude_tables.is_empty() {
        return;
    }
    let single_literal = include.is_some_and(|set| set.len() == 1 && !set.has_wildcard());
    if !single_literal {
        let field = if draft.include_tables.is_empty() {
            FIELD_EXCLUDE_TABLES
        } else {
            FIELD_INCLUDE_TABLES
        };
        report.add_error(
            field,
            FieldIssue::new(
                IssueKind::TableFilterScope,
                "Table filters can only be used when exactly one schema is copied",
            ),
        );
    }
}

/// Maps each source schema to the name it gets on the targets. Returns `None`
/// when the mapping cannot be built.
fn resolve_target_names(
    report: &mut ValidationReport,
    draft: &CopyJobDraft,
    include: &NamePatternSet,
    schemas: &BTreeSet<String>,
    source: Option<&HostAddress>,
) -> Option<BTreeMap<String, String>> {
    let host = source.map(ToString::to_string).unwrap_or_default();

    if schemas.is_empty() {
        report.add_error(
            FIELD_INCLUDE_SCHEMAS,
            FieldIssue::new(
                IssueKind::NoMatchingSchema,
                format!("No schema on {} matches the requested filters", host),
            ),
        );
        return None;
    }

    if !draft.is_renaming() {
        return Some(schemas.iter().map(|s| (s.clone(), s.clone())).collect());
    }

    // Renames pair each include with a target name, so every include must exist.
    let missing: Vec<&str> = include
        .iter()
        .map(|p| p.as_str())
        .filter(|name| !schemas.contains(*name))
        .collect();
    if !missing.is_empty() {
        report.add_error(
            FIELD_INCLUDE_SCHEMAS,
            FieldIssue::new(
                IssueKind::NoMatchingSchema,
                format!("Schemas not found on {}: {}", host, join(missing)),
            ),
        );
        return None;
    }
    if report.field_has_errors(FIELD_TARGET_NAMES) {
        return None;
    }
    Some(
        draft
            .include_schemas
            .iter()
            .cloned()
            .zip(draft.target_names.iter().cloned())
            .collect(),
    )
}

fn add_collision_warnings(report: &mut ValidationReport, target: &HostAddress, found: Collisions) {
    if !found.schemas.is_empty() {
        report.add_warning(FieldWarning {
            kind: WarningKind::TargetCollision,
            host: target.to_string(),
            message: format!(
                "Schemas {} already exist on {}",
                found.schemas.join(", "),
                target
            ),
            names: found.schemas,
        });
    }
    if !found.tables.is_empty() {
        report.add_warning(FieldWarning {
            kind: WarningKind::TableCollision,
            host: target.to_string(),
            message: format!(
                "Tables {} already exist on {}",
                found.tables.join(", "),
                target
            ),
            names: found.tables,
        });
    }
}

fn introspection_issue(host: &HostAddress, err: IntrospectionError) -> FieldIssue {
    let kind = match err {
        IntrospectionError::InvalidFilter { .. } => IssueKind::InvalidFilter,
        _ => IssueKind::HostUnavailable,
    };
    FieldIssue::new(kind, err.to_string()).on_host(host)
}

fn join<S: AsRef<str>>(names: Vec<S>) -> String {
    names
        .iter()
        .map(|n| n.as_ref())
        .collect::<Vec<&str>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Host, TransferAggregate};
    use crate::services::mock::{
        MockCopyJobStore, MockExclusionList, MockHostDirectory, MockSchemaSource,
    };
    use crate::services::schema_introspection::ExcludedSchemaCache;
    use std::sync::Arc;
    use std::time::Duration;

    fn addr(name: &str) -> HostAddress {
        HostAddress::new(name, 3306)
    }

    fn host(name: &str, groups: &[&str]) -> Host {
        Host {
            id: 0,
            address: addr(name),
            mysql_user: "ensadmin".into(),
            virtual_machine: None,
            mysqld_file_owner: None,
            active: true,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn list(text: &str) -> Vec<String> {
        vec![text.to_string()]
    }

    struct Fixture {
        validator: JobValidator,
        store: Arc<MockCopyJobStore>,
    }

    fn fixture_with(source: MockSchemaSource) -> Fixture {
        let directory = MockHostDirectory::new()
            .with_host(host("host1", &[]))
            .with_host(host("host2", &[]))
            .with_host(host("host3", &[]))
            .with_host(host("host4", &[]))
            .with_host(host("prod1", &["production"]))
            .with_host(host("slow", &[]));
        let store = Arc::new(MockCopyJobStore::new());
        let introspector = SchemaIntrospector::new(
            Arc::new(source),
            Arc::new(ExcludedSchemaCache::new(Arc::new(MockExclusionList::new([
                "mysql",
            ])))),
        )
        .with_timeout(Duration::from_millis(50));
        Fixture {
            validator: JobValidator::new(
                introspector,
                AccessControl::new(Arc::new(directory)),
                ConflictDetector::new(store.clone()),
            ),
            store,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            MockSchemaSource::new()
                .with_schema(addr("host1"), "db1", &["gene", "meta"])
                .with_schema(addr("host1"), "db2", &["gene"])
                .with_schema(addr("host2"), "db1", &["gene", "meta"])
                .with_schema(addr("host2"), "db4", &["exon"])
                .with_schema(addr("host3"), "db9", &[])
                .with_schema(addr("host4"), "db1", &["meta", "xref"])
                .with_schema(addr("prod1"), "db0", &[])
                .with_delay(addr("slow"), Duration::from_secs(5)),
        )
    }

    fn user() -> ActingUser {
        ActingUser::new("jdoe")
    }

    #[tokio::test]
    async fn test_identical_source_target_without_rename() {
        let draft = CopyJobDraft {
            source_host: "host1:3306".into(),
            target_hosts: list("host1:3306,host3:3306"),
            include_schemas: list("db1"),
            ..Default::default()
        };
        let v = fixture().validator.validate(&draft, &user()).await.unwrap();
        assert!(v.job.is_none());
        assert_eq!(
            v.report.errors_for(FIELD_TARGET_HOSTS)[0].kind,
            IssueKind::IdenticalSourceTarget
        );
    }

    #[tokio::test]
    async fn test_rename_to_other_hosts_is_accepted() {
        let draft = CopyJobDraft {
            source_host: "host2:3306".into(),
            target_hosts: list("host4:3306,host3:3306"),
            include_schemas: list("db1,db4"),
            target_names: list("db5,db1"),
            wipe_target: true,
            ..Default::default()
        };
        let v = fixture().validator.validate(&draft, &user()).await.unwrap();
        assert!(!v.report.has_errors(), "{}", v.report);
        let job = v.job.unwrap();
        assert_eq!(job.target_names, vec!["db5", "db1"]);
        assert_eq!(job.username, "jdoe");
    }

    #[tokio::test]
    async fn test_structural_errors_accumulate() {
        let draft = CopyJobDraft {
            source_host: "host1".into(),
            target_hosts: list("host3:port"),
            email_list: list("not-an-address"),
            include_schemas: list("%db[%"),
            ..Default::default()
        };
        let v = fixture().validator.validate(&draft, &user()).await.unwrap();
        let report = v.report;
        assert_eq!(
            report.errors_for(FIELD_SOURCE_HOST)[0].kind,
            IssueKind::InvalidFormat
        );
        assert_eq!(
            report.errors_for(FIELD_TARGET_HOSTS)[0].kind,
            IssueKind::InvalidFormat
        );
        assert!(!report.errors_for(FIELD_EMAIL_LIST).is_empty());
        assert_eq!(
            report.errors_for(FIELD_INCLUDE_SCHEMAS)[0].kind,
            IssueKind::InvalidFilter
        );
    }

    #[tokio::test]
    async fn test_rename_rules() {
        let f = fixture();
        let mismatched = CopyJobDraft {
            source_host: "host2:3306".into(),
            target_hosts: list("host3:3306"),
            include_schemas: list("db1,db4"),
            target_names: list("db5"),
            ..Default::default()
        };
        let v = f.validator.validate(&mismatched, &user()).await.unwrap();
        assert!(v.report.has_issue(IssueKind::RenameMismatch));

        let wildcard = CopyJobDraft {
            include_schemas: list("db%"),
            target_names: list("db5"),
            ..mismatched.clone()
        };
        let v = f.validator.validate(&wildcard, &user()).await.unwrap();
        assert!(v.report.has_issue(IssueKind::RenameMismatch));

        let skip_and_rename = CopyJobDraft {
            include_schemas: list("db1"),
            exclude_schemas: list("db4"),
            target_names: list("db5"),
            ..mismatched
        };
        let v = f.validator.validate(&skip_and_rename, &user()).await.unwrap();
        assert_eq!(
            v.report.errors_for(FIELD_EXCLUDE_SCHEMAS)[0].kind,
            IssueKind::ConflictingSkipAndRename
        );
    }

    #[tokio::test]
    async fn test_no_matching_schema() {
        let draft = CopyJobDraft {
            source_host: "host2:3306".into(),
            target_hosts: list("host3:3306"),
            include_schemas: list("nothing%"),
            ..Default::default()
        };
        let v = fixture().validator.validate(&draft, &user()).await.unwrap();
        assert_eq!(
            v.report.errors_for(FIELD_INCLUDE_SCHEMAS)[0].kind,
            IssueKind::NoMatchingSchema
        );

        let partly_missing = CopyJobDraft {
            include_schemas: list("db1,db7"),
            ..draft.clone()
        };
        let v = fixture()
            .validator
            .validate(&partly_missing, &user())
            .await
            .unwrap();
        assert!(!v.report.has_errors(), "{}", v.report);
        assert_eq!(v.job.unwrap().include_schemas, vec!["db1", "db7"]);

        let renamed_missing = CopyJobDraft {
            include_schemas: list("db1,db7"),
            target_names: list("db5,db8"),
            ..draft
        };
        let v = fixture()
            .validator
            .validate(&renamed_missing, &user())
            .await
            .unwrap();
        let issue = &v.report.errors_for(FIELD_INCLUDE_SCHEMAS)[0];
        assert_eq!(issue.kind, IssueKind::NoMatchingSchema);
        assert!(issue.message.contains("db7"));
    }

    #[tokio::test]
    async fn test_underscore_include_matches_single_char() {
        let draft = CopyJobDraft {
            source_host: "host2:3306".into(),
            target_hosts: list("host3:3306"),
            include_schemas: list("db_1"),
            ..Default::default()
        };
        let only_dbx1 = || {
            fixture_with(
                MockSchemaSource::new()
                    .with_schema(addr("host2"), "dbx1", &["gene"])
                    .with_host(addr("host3")),
            )
        };
        let v = only_dbx1().validator.validate(&draft, &user()).await.unwrap();
        assert!(!v.report.has_errors(), "{}", v.report);
        assert!(v.job.is_some());

        let exact = fixture_with(
            MockSchemaSource::new()
                .with_schema(addr("host2"), "db_1", &["gene"])
                .with_host(addr("host3")),
        );
        let v = exact.validator.validate(&draft, &user()).await.unwrap();
        assert!(!v.report.has_errors(), "{}", v.report);

        // An underscored name is not a wildcard, so it can still be renamed.
        let renamed = CopyJobDraft {
            target_names: list("db_2"),
            ..draft
        };
        let v = exact.validator.validate(&renamed, &user()).await.unwrap();
        assert!(!v.report.has_issue(IssueKind::RenameMismatch), "{}", v.report);
        assert!(!v.report.has_errors(), "{}", v.report);
    }

    #[tokio::test]
    async fn test_target_collision_is_a_warning() {
        let draft = CopyJobDraft {
            source_host: "host2:3306".into(),
            target_hosts: list("host4:3306"),
            include_schemas: list("db1"),
            ..Default::default()
        };
        let v = fixture().validator.validate(&draft, &user()).await.unwrap();
        assert!(!v.report.has_errors());
        assert!(v.job.is_some());

        let kinds: Vec<WarningKind> = v.report.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![WarningKind::TargetCollision, WarningKind::TableCollision]
        );
        assert_eq!(v.report.warnings[0].names, vec!["db1"]);
        assert_eq!(v.report.warnings[1].names, vec!["meta"]);

        let wiped = CopyJobDraft {
            wipe_target: true,
            ..draft
        };
        let v = fixture().validator.validate(&wiped, &user()).await.unwrap();
        assert!(!v.report.has_warnings());
    }

    #[tokio::test]
    async fn test_unreachable_target_does_not_block_others() {
        let draft = CopyJobDraft {
            source_host: "host2:3306".into(),
            target_hosts: list("slow:3306,host4:3306"),
            include_schemas: list("db1"),
            ..Default::default()
        };
        let v = fixture().validator.validate(&draft, &user()).await.unwrap();
        let issues = v.report.errors_for(FIELD_TARGET_HOSTS);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].kind, IssueKind::HostUnavailable);
        assert_eq!(issues[0].host.as_deref(), Some("slow:3306"));
        assert_eq!(v.report.warnings.len(), 1);
        assert_eq!(v.report.warnings[0].host, "host4:3306");
    }

    #[tokio::test]
    async fn test_unknown_and_forbidden_targets() {
        let draft = CopyJobDraft {
            source_host: "host2:3306".into(),
            target_hosts: list("nohost:3306,prod1:3306"),
            include_schemas: list("db1"),
            ..Default::default()
        };
        let v = fixture().validator.validate(&draft, &user()).await.unwrap();
        let kinds: Vec<IssueKind> = v
            .report
            .errors_for(FIELD_TARGET_HOSTS)
            .iter()
            .map(|i| i.kind)
            .collect();
        assert_eq!(kinds, vec![IssueKind::HostUnavailable, IssueKind::Forbidden]);

        let admin = ActingUser::new("admin").superuser();
        let v = fixture().validator.validate(&draft, &admin).await.unwrap();
        assert!(!v.report.has_issue(IssueKind::Forbidden));
    }

    #[tokio::test]
    async fn test_table_filters_need_one_schema() {
        let draft = CopyJobDraft {
            source_host: "host2:3306".into(),
            target_hosts: list("host3:3306"),
            include_schemas: list("db1,db4"),
            include_tables: list("gene"),
            ..Default::default()
        };
        let v = fixture().validator.validate(&draft, &user()).await.unwrap();
        assert_eq!(
            v.report.errors_for(FIELD_INCLUDE_TABLES)[0].kind,
            IssueKind::TableFilterScope
        );
    }

    #[tokio::test]
    async fn test_duplicate_of_active_job() {
        let f = fixture();
        let draft = CopyJobDraft {
            source_host: "host2:3306".into(),
            target_hosts: list("host3:3306"),
            include_schemas: list("db4"),
            ..Default::default()
        };
        let first = f.validator.validate(&draft, &user()).await.unwrap().job.unwrap();
        let first_id = first.job_id.clone();
        f.store.put(first, TransferAggregate::default());

        let v = f.validator.validate(&draft, &user()).await.unwrap();
        let issue = &v.report.errors_for(FIELD_JOB)[0];
        assert_eq!(issue.kind, IssueKind::DuplicateJob);
        assert_eq!(issue.job_id.as_deref(), Some(first_id.as_str()));
    }

    #[test]
    fn test_report_serializes_by_field() {
        let mut report = ValidationReport::default();
        report.add_error(
            FIELD_TARGET_HOSTS,
            FieldIssue::new(IssueKind::Forbidden, "no").on_host(&addr("prod1")),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errors"]["target_hosts"][0]["kind"], "forbidden");
        assert_eq!(json["errors"]["target_hosts"][0]["host"], "prod1:3306");
        assert!(json["errors"]["target_hosts"][0].get("job_id").is_none());
    }
}
