use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use indexmap::IndexMap;
use log::{debug, info};

use crate::config::RepoSpec;
use crate::error::{CitreeError, Result};
use crate::models::{Job, Tenant, Variant};
use crate::providers::RemoteHierarchy;
use crate::workspace::WorkspaceCache;

use super::parser::{load_definitions, JobDefinition};
use super::schema::ConfigSchema;

/// Hierarchy read from job definitions kept in Git repositories.
///
/// Only tenants, jobs and variants are available; the repositories hold no
/// projects, pipelines, builds or test results.
pub struct GitHierarchy {
    name: String,
    tenant: String,
    repos: Vec<RepoSpec>,
    workspace: Arc<Mutex<WorkspaceCache>>,
    schema: Arc<ConfigSchema>,
    jobs: Mutex<Option<Vec<Job>>>,
}

impl GitHierarchy {
    pub fn new(
        name: &str,
        tenant: &str,
        repos: Vec<RepoSpec>,
        workspace: Arc<Mutex<WorkspaceCache>>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.to_string(),
            tenant: tenant.to_string(),
            repos,
            workspace,
            schema: Arc::new(ConfigSchema::new()?),
            jobs: Mutex::new(None),
        })
    }

    fn cached_jobs(&self) -> Result<std::sync::MutexGuard<'_, Option<Vec<Job>>>> {
        self.jobs
            .lock()
            .map_err(|_| CitreeError::Config("Job cache lock poisoned".into()))
    }

    /// Jobs of every configured repository, parsed on first use.
    async fn load_jobs(&self) -> Result<Vec<Job>> {
        let cached = self.cached_jobs()?.clone();
        if let Some(jobs) = cached {
            return Ok(jobs);
        }

        let repos = self.repos.clone();
        let workspace = Arc::clone(&self.workspace);
        let schema = Arc::clone(&self.schema);

        // Cloning and parsing block on git and the filesystem
        let jobs =
            tokio::task::spawn_blocking(move || read_repositories(&repos, &workspace, &schema))
                .await
                .map_err(|err| CitreeError::Config(format!("Repository reader failed: {err}")))??;

        *self.cached_jobs()? = Some(jobs.clone());
        Ok(jobs)
    }
}

fn read_repositories(
    repos: &[RepoSpec],
    workspace: &Mutex<WorkspaceCache>,
    schema: &ConfigSchema,
) -> Result<Vec<Job>> {
    let mut jobs: IndexMap<String, Job> = IndexMap::new();

    for repo in repos {
        let repository = {
            let mut workspace = workspace
                .lock()
                .map_err(|_| CitreeError::Config("Workspace lock poisoned".into()))?;
            if !workspace.has(&repo.remote) {
                info!("No workspace for {} yet", repo.remote);
            }
            workspace.resolve(&repo.remote)?
        };
        debug!(
            "Reading {} from {}",
            repository.remote(),
            repository.path().display()
        );

        let dir = repository.join(repo.subdirectory.as_deref());
        if !dir.is_dir() {
            return Err(CitreeError::Config(format!(
                "Subdirectory '{}' not found in {}",
                repo.subdirectory.as_deref().unwrap_or_default(),
                repo.remote
            )));
        }

        let definitions = load_definitions(&dir, schema)?;
        info!(
            "Read {} job definitions from {}",
            definitions.len(),
            repo.remote
        );
        merge_definitions(&mut jobs, definitions, &repo.remote);
    }

    Ok(jobs.into_values().collect())
}

/// Adds each definition as a variant of the job it names, keeping
/// declaration order.
fn merge_definitions(
    jobs: &mut IndexMap<String, Job>,
    definitions: Vec<JobDefinition>,
    remote: &str,
) {
    for definition in definitions {
        let job = jobs
            .entry(definition.name.clone())
            .or_insert_with(|| Job::new(definition.name.clone(), Some(remote.to_string())));

        job.variants.push(Variant {
            name: Some(definition.name),
            parent: definition.parent,
            description: definition.description.unwrap_or_default(),
            branches: definition.branches,
            variables: definition.vars,
        });
    }
}

#[async_trait]
impl RemoteHierarchy for GitHierarchy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn tenants(&self) -> Result<Vec<Tenant>> {
        Ok(vec![Tenant::new(&self.tenant)])
    }

    async fn jobs(&self, tenant: &str) -> Result<Vec<Job>> {
        if tenant != self.tenant {
            debug!("Source '{}' holds no jobs for tenant '{tenant}'", self.name);
            return Ok(Vec::new());
        }

        // Variants are served separately
        Ok(self
            .load_jobs()
            .await?
            .into_iter()
            .map(|job| Job::new(job.name, job.url))
            .collect())
    }

    async fn variants(&self, tenant: &str, job: &str) -> Result<Vec<Variant>> {
        if tenant != self.tenant {
            return Ok(Vec::new());
        }

        Ok(self
            .load_jobs()
            .await?
            .into_iter()
            .find(|candidate| candidate.name == job)
            .map(|found| found.variants)
            .unwrap_or_default())
    }
}
