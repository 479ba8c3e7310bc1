//! Schema and table discovery on managed hosts.
//!
//! Live enumeration is delegated to a [`SchemaSource`]. This module applies
//! include/exclude filters on top of it, removes the system schemas listed in
//! the excluded-schema table, and bounds every remote call with a timeout so
//! that one stalled host cannot hold up a whole request.

use async_trait::async_trait;
use shared::{HostAddress, NamePatternSet, PatternError};
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::DomainError;

/// Default bound on one enumeration call against a remote host.
pub const DEFAULT_INTROSPECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Failure reported by a [`SchemaSource`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("{host} is not present in the host registry")]
    HostNotFound { host: String },
    #[error("Schema {schema} not found on {host}")]
    SchemaNotFound { host: String, schema: String },
    #[error("Could not connect to {host}: {reason}")]
    Unreachable { host: String, reason: String },
}

/// Failure of a filtered listing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntrospectionError {
    #[error("{host} is unavailable: {reason}")]
    HostUnavailable { host: String, reason: String },
    #[error("Invalid filter '{pattern}': {reason}")]
    InvalidFilter { pattern: String, reason: String },
    #[error("Schema {schema} does not exist on {host}")]
    UnknownSchema { host: String, schema: String },
    #[error("Excluded schema list could not be loaded: {0}")]
    ExclusionList(String),
}

impl From<PatternError> for IntrospectionError {
    fn from(err: PatternError) -> Self {
        let PatternError::Invalid { pattern, reason } = err;
        IntrospectionError::InvalidFilter { pattern, reason }
    }
}

/// Live schema and table enumeration on a managed server.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    async fn enumerate_schemas(&self, host: &HostAddress) -> Result<Vec<String>, SourceError>;

    async fn enumerate_tables(
        &self,
        host: &HostAddress,
        schema: &str,
    ) -> Result<Vec<String>, SourceError>;
}

/// Persistent list of schemas that are never eligible for copy.
#[async_trait]
pub trait ExclusionListSource: Send + Sync {
    async fn excluded_schema_names(&self) -> Result<HashSet<String>, DomainError>;
}

static GLOBAL_EXCLUDED: OnceLock<Arc<ExcludedSchemaCache>> = OnceLock::new();

/// Populate-once cache of the excluded-schema list.
///
/// The list is loaded on first use and kept for the lifetime of the process.
/// Every worker process holds its own copy, so a change to the table is seen
/// after [`ExcludedSchemaCache::reload`] or a restart.
pub struct ExcludedSchemaCache {
    source: Arc<dyn ExclusionListSource>,
    names: RwLock<Option<Arc<HashSet<String>>>>,
}

impl ExcludedSchemaCache {
    pub fn new(source: Arc<dyn ExclusionListSource>) -> Self {
        Self {
            source,
            names: RwLock::new(None),
        }
    }

    /// Install the process-wide instance. Returns the rejected cache if one
    /// was already installed.
    pub fn install_global(cache: Arc<Self>) -> Result<(), Arc<Self>> {
        GLOBAL_EXCLUDED.set(cache)
    }

    pub fn global() -> Option<Arc<Self>> {
        GLOBAL_EXCLUDED.get().cloned()
    }

    /// Returns the cached names, loading them on first use.
    pub async fn get(&self) -> Result<Arc<HashSet<String>>, DomainError> {
        if let Some(names) = self.names.read().await.as_ref() {
            return Ok(Arc::clone(names));
        }

        let mut guard = self.names.write().await;
        if let Some(names) = guard.as_ref() {
            return Ok(Arc::clone(names));
        }
        let loaded = Arc::new(self.source.excluded_schema_names().await?);
        debug!(count = loaded.len(), "Loaded excluded schema list");
        *guard = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Replace the cached names with a fresh read of the source.
    pub async fn reload(&self) -> Result<Arc<HashSet<String>>, DomainError> {
        let loaded = Arc::new(self.source.excluded_schema_names().await?);
        *self.names.write().await = Some(Arc::clone(&loaded));
        debug!(count = loaded.len(), "Reloaded excluded schema list");
        Ok(loaded)
    }
}

/// Filtered, time-bounded schema and table listings.
#[derive(Clone)]
pub struct SchemaIntrospector {
    source: Arc<dyn SchemaSource>,
    excluded: Arc<ExcludedSchemaCache>,
    timeout: Duration,
}

impl SchemaIntrospector {
    pub fn new(source: Arc<dyn SchemaSource>, excluded: Arc<ExcludedSchemaCache>) -> Self {
        Self {
            source,
            excluded,
            timeout: DEFAULT_INTROSPECTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// List schemas of `host` matching any include expression (all schemas
    /// when none is given) and no exclude expression. System schemas are
    /// always removed.
    pub async fn list_schemas(
        &self,
        host: &HostAddress,
        include: &[String],
        exclude: &[String],
    ) -> Result<BTreeSet<String>, IntrospectionError> {
        let include = NamePatternSet::parse_all(include)?;
        let exclude = NamePatternSet::parse_all(exclude)?;
        self.list_schemas_with(host, &include, &exclude).await
    }

    pub async fn list_schemas_with(
        &self,
        host: &HostAddress,
        include: &NamePatternSet,
        exclude: &NamePatternSet,
    ) -> Result<BTreeSet<String>, IntrospectionError> {
        let excluded = self
            .excluded
            .get()
            .await
            .map_err(|e| IntrospectionError::ExclusionList(e.to_string()))?;
        let names = self
            .bounded(host, self.source.enumerate_schemas(host))
            .await?;

        let result = filter_names(names, include, exclude)
            .into_iter()
            .filter(|name| !excluded.contains(name))
            .collect::<BTreeSet<_>>();
        debug!(host = %host, matched = result.len(), "Listed schemas");
        Ok(result)
    }

    /// List tables of `schema` on `host` with the same filter rules as
    /// [`SchemaIntrospector::list_schemas`].
    pub async fn list_tables(
        &self,
        host: &HostAddress,
        schema: &str,
        include: &[String],
        exclude: &[String],
    ) -> Result<BTreeSet<String>, IntrospectionError> {
        let include = NamePatternSet::parse_all(include)?;
        let exclude = NamePatternSet::parse_all(exclude)?;
        let names = self
            .bounded(host, self.source.enumerate_tables(host, schema))
            .await?;

        let result = filter_names(names, &include, &exclude);
        debug!(host = %host, schema = %schema, matched = result.len(), "Listed tables");
        Ok(result)
    }

    async fn bounded<T, F>(&self, host: &HostAddress, call: F) -> Result<T, IntrospectionError>
    where
        F: Future<Output = Result<T, SourceError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(classify(host, err)),
            Err(_) => {
                warn!(
                    host = %host,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Schema introspection timed out"
                );
                Err(IntrospectionError::HostUnavailable {
                    host: host.to_string(),
                    reason: format!("no answer within {}s", self.timeout.as_secs_f32()),
                })
            }
        }
    }
}

fn classify(host: &HostAddress, err: SourceError) -> IntrospectionError {
    match err {
        SourceError::HostNotFound { .. } => {
            warn!(host = %host, "Introspection requested for unregistered host");
            IntrospectionError::HostUnavailable {
                host: host.to_string(),
                reason: "not present in the host registry".to_string(),
            }
        }
        SourceError::Unreachable { reason, .. } => {
            warn!(host = %host, reason = %reason, "Connection to registered host failed");
            IntrospectionError::HostUnavailable {
                host: host.to_string(),
                reason,
            }
        }
        SourceError::SchemaNotFound { schema, .. } => IntrospectionError::UnknownSchema {
            host: host.to_string(),
            schema,
        },
    }
}

fn filter_names(
    names: Vec<String>,
    include: &NamePatternSet,
    exclude: &NamePatternSet,
) -> BTreeSet<String> {
    names
        .into_iter()
        .filter(|name| include.is_empty() || include.matches_any(name))
        .filter(|name| !exclude.matches_any(name))
        .collect()
}
