//! Common fixtures for scenario tests.
//!
//! Builds a `CopyJobService` over the in-memory collaborators with a small
//! fleet of hosts.

#![allow(dead_code)]

use domain::models::Host;
use domain::services::mock::{
    MockCopyJobStore, MockExclusionList, MockHostDirectory, MockMembership, MockSchemaSource,
};
use domain::services::{
    AccessControl, ConflictDetector, CopyJobService, ExcludedSchemaCache, JobValidator,
    NotificationSettings, SchemaIntrospector,
};
use shared::HostAddress;
use std::sync::Arc;

pub struct TestContext {
    pub service: CopyJobService,
    pub store: Arc<MockCopyJobStore>,
}

pub fn addr(name: &str) -> HostAddress {
    HostAddress::new(name, 3306)
}

pub fn host(name: &str, groups: &[&str]) -> Host {
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

/// host1..host4 are open to everyone, prod1 only to the "production" group.
pub fn setup() -> TestContext {
    let source = MockSchemaSource::new()
        .with_schema(addr("host1"), "mysql", &["user"])
        .with_schema(addr("host1"), "db1", &["gene", "meta"])
        .with_schema(addr("host2"), "db1", &["gene", "meta"])
        .with_schema(addr("host2"), "db4", &["exon"])
        .with_schema(addr("host3"), "db9", &["meta"])
        .with_host(addr("host4"))
        .with_schema(addr("prod1"), "db0", &[]);

    let directory = MockHostDirectory::new()
        .with_host(host("host1", &[]))
        .with_host(host("host2", &[]))
        .with_host(host("host3", &[]))
        .with_host(host("host4", &[]))
        .with_host(host("prod1", &["production"]))
        .with_group("copy-targets", &["host3:3306", "host4:3306", "prod1:3306"]);

    let membership = MockMembership::new()
        .with_user("jdoe", &["genebuild"], None)
        .with_user("release", &["production"], Some("release@example.org"))
        .with_superuser("admin");

    let store = Arc::new(MockCopyJobStore::new());
    let introspector = SchemaIntrospector::new(
        Arc::new(source),
        Arc::new(ExcludedSchemaCache::new(Arc::new(MockExclusionList::new([
            "mysql",
            "information_schema",
            "performance_schema",
        ])))),
    );
    let access = AccessControl::new(Arc::new(directory));
    let validator = JobValidator::new(
        introspector.clone(),
        access.clone(),
        ConflictDetector::new(store.clone()),
    );
    let service = CopyJobService::new(
        store.clone(),
        Arc::new(membership),
        validator,
        introspector,
        access,
        NotificationSettings {
            default_email_domain: Some("ebi.ac.uk".into()),
        },
    );

    TestContext { service, store }
}
