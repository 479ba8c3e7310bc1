//! Service wiring.

use std::sync::Arc;

use domain::services::{
    AccessControl, ConflictDetector, CopyJobService, CopyJobStore, ExcludedSchemaCache,
    HostDirectory, JobValidator, MembershipProvider, SchemaIntrospector, SchemaSource,
};
use persistence::introspection::{MysqlIntrospectionConfig, MysqlSchemaSource};
use persistence::repositories::{
    CopyJobRepository, ExcludedSchemaRepository, HostRepository, UserRepository,
};
use sqlx::PgPool;
use tracing::debug;

use crate::config::Config;

/// Collaborators the domain services run against.
#[derive(Clone)]
pub struct Backends {
    pub store: Arc<dyn CopyJobStore>,
    pub hosts: Arc<dyn HostDirectory>,
    pub membership: Arc<dyn MembershipProvider>,
    pub source: Arc<dyn SchemaSource>,
    pub excluded: Arc<ExcludedSchemaCache>,
}

impl Backends {
    /// Repositories over the metadata store plus live MySQL introspection.
    ///
    /// The excluded-schema cache is installed as the process-wide instance.
    pub fn connect(pool: &PgPool, config: &Config) -> Self {
        let hosts: Arc<dyn HostDirectory> = Arc::new(HostRepository::new(pool.clone()));
        let source = MysqlSchemaSource::new(
            hosts.clone(),
            MysqlIntrospectionConfig {
                password: config.introspection.mysql_password.clone(),
                connect_timeout: config.introspection.connect_timeout(),
            },
        );

        let excluded = Arc::new(ExcludedSchemaCache::new(Arc::new(
            ExcludedSchemaRepository::new(pool.clone()),
        )));
        if ExcludedSchemaCache::install_global(excluded.clone()).is_err() {
            debug!("Excluded schema cache already installed");
        }
        let excluded = ExcludedSchemaCache::global().unwrap_or(excluded);

        Self {
            store: Arc::new(CopyJobRepository::new(pool.clone())),
            hosts,
            membership: Arc::new(UserRepository::new(pool.clone())),
            source: Arc::new(source),
            excluded,
        }
    }
}

/// Builds the job service on top of `backends`.
pub fn build_service(backends: Backends, config: &Config) -> CopyJobService {
    let introspector = SchemaIntrospector::new(backends.source, backends.excluded)
        .with_timeout(config.introspection.timeout());
    let access = AccessControl::new(backends.hosts);
    let validator = JobValidator::new(
        introspector.clone(),
        access.clone(),
        ConflictDetector::new(backends.store.clone()),
    );

    CopyJobService::new(
        backends.store,
        backends.membership,
        validator,
        introspector,
        access,
        config.notification.clone(),
    )
}


#[cfg(test)]
mod tests {
    use super::testing::{addr, mock_service};
    use domain::models::{CopyJobDraft, JobState};

    #[tokio::test]
    async fn test_built_service_applies_exclusion_list() {
        let (service, _) = mock_service();
        let schemas = service.list_schemas(&addr("host2"), &[], &[]).await.unwrap();
        assert_eq!(
            schemas.into_iter().collect::<Vec<_>>(),
            vec!["db1".to_string(), "db2".to_string()]
        );
    }

    #[tokio::test]
    async fn test_built_service_fills_default_recipient() {
        let (service, store) = mock_service();
        let user = service.resolve_user("jdoe").await.unwrap();
        let draft = CopyJobDraft {
            source_host: "host2:3306".into(),
            target_hosts: vec!["host3:3306".into()],
            include_schemas: vec!["db1".into()],
            ..Default::default()
        };

        let job_id = service.submit(&draft, &user).await.unwrap();

        let job = store.get(&job_id).unwrap();
        assert_eq!(job.email_list, vec!["jdoe@ebi.ac.uk"]);
        assert_eq!(
            service.status_of(&job_id).await.unwrap().state,
            JobState::Submitted
        );
    }
}
