//! The user on whose behalf a request is evaluated.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identity and group membership of the acting user, resolved once per
/// request and passed explicitly through the call chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ActingUser {
    pub username: String,
    pub email: Option<String>,
    pub groups: HashSet<String>,
    pub is_superuser: bool,
}

impl ActingUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn superuser(mut self) -> Self {
        self.is_superuser = true;
        self
    }

    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}
