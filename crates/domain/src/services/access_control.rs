//! Target host authorization.
//!
//! A host with no authorization groups is open to every user. A restricted
//! host may be targeted by superusers and by members of at least one of its
//! groups.

use async_trait::async_trait;
use shared::HostAddress;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::error::DomainError;
use crate::models::{ActingUser, Host, TargetGroup};

/// Registry of managed hosts.
#[async_trait]
pub trait HostDirectory: Send + Sync {
    async fn find_host(&self, address: &HostAddress) -> Result<Option<Host>, DomainError>;

    /// Hosts whose name contains `name_fragment`, compared case-insensitively.
    async fn search_hosts(
        &self,
        name_fragment: &str,
        active_only: bool,
    ) -> Result<Vec<Host>, DomainError>;

    async fn target_groups(&self) -> Result<Vec<TargetGroup>, DomainError>;
}

/// User and group membership lookups.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    async fn groups_of(&self, username: &str) -> Result<HashSet<String>, DomainError>;

    async fn is_superuser(&self, username: &str) -> Result<bool, DomainError>;

    /// Registered e-mail address of the user, if any.
    async fn email_of(&self, username: &str) -> Result<Option<String>, DomainError>;
}

/// Resolve the acting user once, so the rest of a request works on plain data.
pub async fn resolve_user(
    provider: &dyn MembershipProvider,
    username: &str,
) -> Result<ActingUser, DomainError> {
    let groups = provider.groups_of(username).await?;
    let is_superuser = provider.is_superuser(username).await?;
    let email = provider.email_of(username).await?;

    Ok(ActingUser {
        username: username.to_string(),
        email,
        groups,
        is_superuser,
    })
}

/// Returns true if `user` may copy to `host`.
pub fn can_target(user: &ActingUser, host: &Host) -> bool {
    if !host.is_restricted() || user.is_superuser {
        return true;
    }
    host.groups.iter().any(|group| user.is_member_of(group))
}

/// Outcome of checking one requested target host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetCheck {
    Allowed(Host),
    /// Not present in the host registry.
    Unknown,
    Inactive(Host),
    Forbidden(Host),
}

/// Host lookups filtered by the acting user's permissions.
#[derive(Clone)]
pub struct AccessControl {
    directory: Arc<dyn HostDirectory>,
}

impl AccessControl {
    pub fn new(directory: Arc<dyn HostDirectory>) -> Self {
        Self { directory }
    }

    pub async fn check_target(
        &self,
        user: &ActingUser,
        address: &HostAddress,
    ) -> Result<TargetCheck, DomainError> {
        let Some(host) = self.directory.find_host(address).await? else {
            return Ok(TargetCheck::Unknown);
        };
        if !host.active {
            return Ok(TargetCheck::Inactive(host));
        }
        if !can_target(user, &host) {
            debug!(user = %user.username, host = %address, "Target host not permitted");
            return Ok(TargetCheck::Forbidden(host));
        }
        Ok(TargetCheck::Allowed(host))
    }

    /// Active hosts whose name contains `pattern`, ordered by name. A `:port`
    /// suffix on the pattern is ignored.
    pub async fn list_source_hosts(&self, pattern: &str) -> Result<Vec<Host>, DomainError> {
        let mut hosts = self
            .directory
            .search_hosts(host_name_fragment(pattern), true)
            .await?;
        hosts.sort_by(|a, b| a.address.cmp(&b.address));
        Ok(hosts)
    }

    /// Like [`AccessControl::list_source_hosts`], without the hosts `user`
    /// may not target.
    pub async fn list_target_hosts(
        &self,
        user: &ActingUser,
        pattern: &str,
    ) -> Result<Vec<Host>, DomainError> {
        let hosts = self.list_source_hosts(pattern).await?;
        Ok(hosts.into_iter().filter(|h| can_target(user, h)).collect())
    }

    /// Target groups restricted to the hosts `user` may target. Groups left
    /// without hosts are dropped.
    pub async fn target_groups_for(
        &self,
        user: &ActingUser,
    ) -> Result<Vec<TargetGroup>, DomainError> {
        let permitted: HashMap<HostAddress, bool> = self
            .directory
            .search_hosts("", true)
            .await?
            .into_iter()
            .map(|h| {
                let allowed = can_target(user, &h);
                (h.address, allowed)
            })
            .collect();

        let groups = self
            .directory
            .target_groups()
            .await?
            .into_iter()
            .map(|group| TargetGroup {
                hosts: group
                    .hosts
                    .into_iter()
                    .filter(|addr| permitted.get(addr).copied().unwrap_or(false))
                    .collect(),
                name: group.name,
            })
            .filter(|group| !group.hosts.is_empty())
            .collect();
        Ok(groups)
    }
}

fn host_name_fragment(pattern: &str) -> &str {
    let pattern = pattern.trim();
    match pattern.split_once(':') {
        Some((name, _)) => name,
        None => pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::{MockHostDirectory, MockMembership};

    fn host(name: &str, groups: &[&str]) -> Host {
        Host {
            id: 0,
            address: HostAddress::new(name, 3306),
            mysql_user: "ensadmin".into(),
            virtual_machine: None,
            mysqld_file_owner: None,
            active: true,
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    fn directory() -> MockHostDirectory {
        let mut retired = host("mysql-retired", &[]);
        retired.active = false;
        MockHostDirectory::new()
            .with_host(host("mysql-sta-1", &[]))
            .with_host(host("mysql-prod-1", &["production"]))
            .with_host(host("mysql-prod-2", &["production", "release"]))
            .with_host(retired)
            .with_group("prod", &["mysql-prod-1:3306", "mysql-prod-2:3306"])
            .with_group("staging", &["mysql-sta-1:3306"])
    }

    #[test]
    fn test_unrestricted_host_open_to_everyone() {
        assert!(can_target(&ActingUser::new("anyone"), &host("h", &[])));
    }

    #[test]
    fn test_superuser_can_target_any_host() {
        let admin = ActingUser::new("admin").superuser();
        assert!(can_target(&admin, &host("h", &["production"])));
    }

    #[test]
    fn test_group_intersection() {
        let h = host("h", &["production", "release"]);
        assert!(can_target(
            &ActingUser::new("u").with_groups(["release"]),
            &h
        ));
        assert!(!can_target(
            &ActingUser::new("u").with_groups(["genebuild"]),
            &h
        ));
        assert!(!can_target(&ActingUser::new("u"), &h));
    }

    #[tokio::test]
    async fn test_check_target() {
        let ac = AccessControl::new(Arc::new(directory()));
        let user = ActingUser::new("jdoe").with_groups(["release"]);

        assert!(matches!(
            ac.check_target(&user, &"mysql-prod-2:3306".parse().unwrap())
                .await
                .unwrap(),
            TargetCheck::Allowed(_)
        ));
        assert!(matches!(
            ac.check_target(&user, &"mysql-prod-1:3306".parse().unwrap())
                .await
                .unwrap(),
            TargetCheck::Forbidden(_)
        ));
        assert!(matches!(
            ac.check_target(&user, &"mysql-retired:3306".parse().unwrap())
                .await
                .unwrap(),
            TargetCheck::Inactive(_)
        ));
        assert_eq!(
            ac.check_target(&user, &"nohost:3306".parse().unwrap())
                .await
                .unwrap(),
            TargetCheck::Unknown
        );
    }

    #[tokio::test]
    async fn test_list_hosts_ignores_port_and_inactive() {
        let ac = AccessControl::new(Arc::new(directory()));
        let names: Vec<String> = ac
            .list_source_hosts("MYSQL:9999")
            .await
            .unwrap()
            .into_iter()
            .map(|h| h.address.to_string())
            .collect();
        assert_eq!(
            names,
            vec!["mysql-prod-1:3306", "mysql-prod-2:3306", "mysql-sta-1:3306"]
        );

        let user = ActingUser::new("jdoe");
        let targets = ac.list_target_hosts(&user, "mysql").await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].address.name(), "mysql-sta-1");
    }

    #[tokio::test]
    async fn test_target_groups_filtered_per_user() {
        let ac = AccessControl::new(Arc::new(directory()));

        let groups = ac
            .target_groups_for(&ActingUser::new("jdoe"))
            .await
            .unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "staging");

        let groups = ac
            .target_groups_for(&ActingUser::new("rm").with_groups(["release"]))
            .await
            .unwrap();
        let prod = groups.iter().find(|g| g.name == "prod").unwrap();
        assert_eq!(prod.host_list(), "mysql-prod-2:3306");
    }

    #[tokio::test]
    async fn test_resolve_user() {
        let membership = MockMembership::new()
            .with_user("jdoe", &["release"], Some("jdoe@example.org"))
            .with_superuser("admin");

        let user = resolve_user(&membership, "jdoe").await.unwrap();
        assert!(user.is_member_of("release"));
        assert!(!user.is_superuser);
        assert_eq!(user.email.as_deref(), Some("jdoe@example.org"));

        let admin = resolve_user(&membership, "admin").await.unwrap();
        assert!(admin.is_superuser);
    }
}
