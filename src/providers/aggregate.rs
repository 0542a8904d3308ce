use async_trait::async_trait;
use log::{debug, warn};

use crate::error::{CitreeError, HostErrorKind, Result};
use crate::models::{Builds, Job, JobRef, Pipeline, Project, Tenant, TestSuite, Variant};

use super::RemoteHierarchy;

/// Tries each backend in order and returns the first success; fails only
/// when every backend failed.
macro_rules! first_success {
    ($self:ident, $operation:expr, |$backend:ident| $call:expr) => {{
        let mut errors = Vec::new();
        for $backend in &$self.backends {
            match $call.await {
                Ok(value) => {
                    debug!("'{}' served by source '{}'", $operation, $backend.name());
                    return Ok(value);
                }
                Err(err) => {
                    warn!("Source '{}' failed '{}': {err}", $backend.name(), $operation);
                    if matches!(
                        err.host_kind(),
                        Some(HostErrorKind::Unauthorized | HostErrorKind::Forbidden)
                    ) {
                        warn!("Check the token configured for source '{}'", $backend.name());
                    }
                    errors.push(format!("{}: {err}", $backend.name()));
                }
            }
        }
        Err(CitreeError::AggregationExhausted {
            operation: $operation.to_string(),
            errors,
        })
    }};
}

/// Several backends for the same system, consulted in declaration order.
pub struct AggregatedHierarchy {
    name: String,
    backends: Vec<Box<dyn RemoteHierarchy>>,
}

impl AggregatedHierarchy {
    pub fn new(name: &str, backends: Vec<Box<dyn RemoteHierarchy>>) -> Self {
        Self {
            name: name.to_string(),
            backends,
        }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }
}

#[async_trait]
impl RemoteHierarchy for AggregatedHierarchy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn info(&self) -> Result<serde_json::Value> {
        first_success!(self, "info", |backend| backend.info())
    }

    async fn tenants(&self) -> Result<Vec<Tenant>> {
        first_success!(self, "tenants", |backend| backend.tenants())
    }

    async fn projects(&self, tenant: &str) -> Result<Vec<Project>> {
        first_success!(self, "projects", |backend| backend.projects(tenant))
    }

    async fn pipelines(&self, tenant: &str, project: &str) -> Result<Vec<Pipeline>> {
        first_success!(self, "pipelines", |backend| backend
            .pipelines(tenant, project))
    }

    async fn jobs(&self, tenant: &str) -> Result<Vec<Job>> {
        first_success!(self, "jobs", |backend| backend.jobs(tenant))
    }

    async fn pipeline_jobs(
        &self,
        tenant: &str,
        project: &str,
        pipeline: &str,
    ) -> Result<Vec<JobRef>> {
        first_success!(self, "pipeline_jobs", |backend| backend
            .pipeline_jobs(tenant, project, pipeline))
    }

    async fn variants(&self, tenant: &str, job: &str) -> Result<Vec<Variant>> {
        first_success!(self, "variants", |backend| backend.variants(tenant, job))
    }

    async fn builds(&self, tenant: &str, job: &str) -> Result<Builds> {
        first_success!(self, "builds", |backend| backend.builds(tenant, job))
    }

    async fn tests(&self, tenant: &str, build: &str) -> Result<Vec<TestSuite>> {
        first_success!(self, "tests", |backend| backend.tests(tenant, build))
    }
}
