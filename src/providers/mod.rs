mod aggregate;
mod de;
pub mod git;
pub mod rest;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use log::debug;

use crate::config::{SourceConfig, SystemConfig};
use crate::error::{CitreeError, Result};
use crate::models::{Builds, Job, JobRef, Pipeline, Project, Tenant, TestSuite, Variant};
use crate::plugins::Registry;
use crate::workspace::WorkspaceCache;

pub use aggregate::AggregatedHierarchy;
pub use git::GitHierarchy;
pub use rest::RestHierarchy;

/// Level-by-level access to a CI host's hierarchy.
///
/// Each call fetches exactly one level; callers decide which levels to ask
/// for. Operations a backend cannot serve fail with
/// [`CitreeError::CapabilityUnsupported`].
#[async_trait]
pub trait RemoteHierarchy: Send + Sync {
    /// Name of the source, used in logs and errors.
    fn name(&self) -> &str;

    async fn info(&self) -> Result<serde_json::Value> {
        Err(CitreeError::unsupported(self.name(), "info"))
    }

    async fn tenants(&self) -> Result<Vec<Tenant>>;

    async fn projects(&self, _tenant: &str) -> Result<Vec<Project>> {
        Err(CitreeError::unsupported(self.name(), "projects"))
    }

    async fn pipelines(&self, _tenant: &str, _project: &str) -> Result<Vec<Pipeline>> {
        Err(CitreeError::unsupported(self.name(), "pipelines"))
    }

    async fn jobs(&self, tenant: &str) -> Result<Vec<Job>>;

    /// Jobs that run in a pipeline, as references into the tenant's jobs.
    async fn pipeline_jobs(
        &self,
        tenant: &str,
        project: &str,
        pipeline: &str,
    ) -> Result<Vec<JobRef>> {
        let pipelines = self.pipelines(tenant, project).await?;
        Ok(pipelines
            .into_iter()
            .find(|p| p.name == pipeline)
            .map(|p| p.jobs)
            .unwrap_or_default())
    }

    async fn variants(&self, _tenant: &str, _job: &str) -> Result<Vec<Variant>> {
        Err(CitreeError::unsupported(self.name(), "variants"))
    }

    async fn builds(&self, _tenant: &str, _job: &str) -> Result<Builds> {
        Err(CitreeError::unsupported(self.name(), "builds"))
    }

    async fn tests(&self, _tenant: &str, _build: &str) -> Result<Vec<TestSuite>> {
        Err(CitreeError::unsupported(self.name(), "tests"))
    }
}

/// Builds the hierarchy for a configured system: one backend per source,
/// tried in declaration order.
pub fn build_hierarchy(
    system: &SystemConfig,
    workspace: &Arc<Mutex<WorkspaceCache>>,
    registry: &Registry,
) -> Result<AggregatedHierarchy> {
    let mut backends: Vec<Box<dyn RemoteHierarchy>> = Vec::new();

    for source in &system.sources {
        let backend: Box<dyn RemoteHierarchy> = match source {
            SourceConfig::Rest { name, url, token } => {
                Box::new(RestHierarchy::new(name, url, token.clone())?)
            }
            SourceConfig::Git {
                name,
                tenant,
                repos,
            } => Box::new(GitHierarchy::new(
                name,
                tenant,
                repos.clone(),
                Arc::clone(workspace),
            )?),
            SourceConfig::Plugin {
                plugin,
                name,
                settings,
            } => registry
                .source(plugin)
                .ok_or_else(|| {
                    CitreeError::Config(format!(
                        "Source '{name}' uses unknown plugin driver '{plugin}'"
                    ))
                })?
                .build(name, settings)?,
        };
        debug!("System '{}' uses source '{}'", system.name, backend.name());
        backends.push(backend);
    }

    if backends.is_empty() {
        return Err(CitreeError::Config(format!(
            "System '{}' has no sources",
            system.name
        )));
    }

    let hierarchy = AggregatedHierarchy::new(&system.name, backends);
    debug!(
        "System '{}' tries sources in order: {:?}",
        system.name,
        hierarchy.source_names()
    );
    Ok(hierarchy)
}
