//! Managed MySQL hosts and their groupings.

use serde::Serialize;
use shared::HostAddress;

/// A managed MySQL server that may be used as copy source or target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Host {
    pub id: i64,
    pub address: HostAddress,
    /// Administrative MySQL account used for introspection.
    pub mysql_user: String,
    pub virtual_machine: Option<String>,
    pub mysqld_file_owner: Option<String>,
    pub active: bool,
    /// Authorization groups allowed to target this host. Empty means unrestricted.
    pub groups: Vec<String>,
}

impl Host {
    pub fn is_restricted(&self) -> bool {
        !self.groups.is_empty()
    }
}

/// A named bundle of hosts offered as a single target choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TargetGroup {
    pub name: String,
    pub hosts: Vec<HostAddress>,
}

impl TargetGroup {
    /// Renders the member hosts as a comma-joined `host:port` list.
    pub fn host_list(&self) -> String {
        self.hosts
            .iter()
            .map(HostAddress::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}
