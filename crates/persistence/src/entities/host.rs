//! Host entities (database row mapping).

use domain::models::Host;
use shared::HostAddress;
use sqlx::FromRow;

/// Database row mapping for the hosts table with its authorization groups
/// aggregated into one column.
#[derive(Debug, Clone, FromRow)]
pub struct HostEntity {
    pub id: i64,
    pub name: String,
    pub port: i32,
    pub mysql_user: String,
    pub virtual_machine: Option<String>,
    pub mysqld_file_owner: Option<String>,
    pub active: bool,
    pub groups: Vec<String>,
}

impl HostEntity {
    /// Converts the row, or returns None when the stored port is out of range.
    pub fn into_host(self) -> Option<Host> {
        let port = u16::try_from(self.port).ok().filter(|p| *p > 0)?;
        Some(Host {
            id: self.id,
            address: HostAddress::new(self.name, port),
            mysql_user: self.mysql_user,
            virtual_machine: self.virtual_machine,
            mysqld_file_owner: self.mysqld_file_owner,
            active: self.active,
            groups: self.groups,
        })
    }
}

/// One member host of a target group.
#[derive(Debug, Clone, FromRow)]
pub struct TargetGroupMemberEntity {
    pub group_name: String,
    pub host_name: String,
    pub port: i32,
}
