use async_trait::async_trait;
use indexmap::IndexMap;
use log::{debug, info};

use crate::error::Result;
use crate::models::{
    Build, Builds, Job, JobRef, Pipeline, Project, Tenant, Test, TestSuite, Variant,
};
use crate::providers::RemoteHierarchy;

use super::client::{encode_path, RestClient};
use super::types::{
    BuildDetail, BuildEntry, JobEntry, ProjectDetail, ProjectEntry, SuiteEntry, TenantEntry,
    VariantEntry,
};

/// Hierarchy served by a CI orchestrator's REST API, one GET per level.
pub struct RestHierarchy {
    name: String,
    client: RestClient,
}

impl RestHierarchy {
    /// Creates a REST source for the host at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API URL cannot be constructed.
    pub fn new(name: &str, url: &str, token: Option<String>) -> Result<Self> {
        let client = RestClient::new(url, token)?;

        Ok(Self {
            name: name.to_string(),
            client,
        })
    }

    fn tenant_path(tenant: &str, rest: &str) -> String {
        format!("tenant/{}/{rest}", urlencoding::encode(tenant))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds * 1000.0).round().max(0.0) as u64
}

fn to_variant(entry: VariantEntry) -> Variant {
    Variant {
        name: entry.name,
        parent: entry.parent,
        description: entry.description.unwrap_or_default(),
        branches: entry.branches,
        variables: entry.variables.unwrap_or_default(),
    }
}

fn to_build(entry: BuildEntry) -> Build {
    let mut build = Build::new(entry.uuid);
    build.project = entry.project;
    build.pipeline = entry.pipeline;
    build.status = entry.result;
    build.duration_ms = entry.duration.map(seconds_to_ms);
    build
}

fn to_suite(entry: SuiteEntry) -> TestSuite {
    TestSuite {
        name: entry.name,
        url: entry.url,
        tests: entry
            .tests
            .into_iter()
            .map(|test| Test {
                name: test.name,
                kind: test.kind,
                result: test.result,
                duration_ms: test.duration.map(seconds_to_ms),
                url: test.url,
            })
            .collect(),
    }
}

#[async_trait]
impl RemoteHierarchy for RestHierarchy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn info(&self) -> Result<serde_json::Value> {
        self.client.get_json("info").await
    }

    async fn tenants(&self) -> Result<Vec<Tenant>> {
        let entries: Vec<TenantEntry> = self.client.get_json("tenants").await?;
        info!("Fetched {} tenants from '{}'", entries.len(), self.name);
        Ok(entries.into_iter().map(|e| Tenant::new(e.name)).collect())
    }

    async fn projects(&self, tenant: &str) -> Result<Vec<Project>> {
        let path = Self::tenant_path(tenant, "projects");
        let entries: Vec<ProjectEntry> = self.client.get_json(&path).await?;

        entries
            .into_iter()
            .map(|entry| {
                let canonical = entry.canonical_name.as_deref().unwrap_or(&entry.name);
                let url = self.client.web_url(&format!(
                    "t/{}/project/{}",
                    urlencoding::encode(tenant),
                    encode_path(canonical)
                ))?;
                Ok(Project::new(entry.name, Some(url.to_string())))
            })
            .collect()
    }

    async fn pipelines(&self, tenant: &str, project: &str) -> Result<Vec<Pipeline>> {
        let path = Self::tenant_path(tenant, &format!("project/{}", encode_path(project)));
        let detail: ProjectDetail = self.client.get_json(&path).await?;

        // The same pipeline shows up once per config branch
        let mut merged: IndexMap<String, Pipeline> = IndexMap::new();
        for entry in detail.configs.into_iter().flat_map(|c| c.pipelines) {
            let pipeline = merged
                .entry(entry.name.clone())
                .or_insert_with(|| Pipeline::new(entry.name.clone()));

            for name in entry.jobs.iter().filter_map(|job| job.name()) {
                if !pipeline.jobs.iter().any(|job| job.name == name) {
                    pipeline.jobs.push(JobRef::new(name));
                }
            }
        }

        debug!(
            "Project '{project}' in tenant '{tenant}' has {} pipelines",
            merged.len()
        );
        Ok(merged.into_values().collect())
    }

    async fn jobs(&self, tenant: &str) -> Result<Vec<Job>> {
        let path = Self::tenant_path(tenant, "jobs");
        let entries: Vec<JobEntry> = self.client.get_json(&path).await?;
        info!("Fetched {} jobs for tenant '{tenant}'", entries.len());

        entries
            .into_iter()
            .map(|entry| {
                let url = self.client.web_url(&format!(
                    "t/{}/job/{}",
                    urlencoding::encode(tenant),
                    urlencoding::encode(&entry.name)
                ))?;
                Ok(Job::new(entry.name, Some(url.to_string())))
            })
            .collect()
    }

    async fn variants(&self, tenant: &str, job: &str) -> Result<Vec<Variant>> {
        let path = Self::tenant_path(tenant, &format!("job/{}", urlencoding::encode(job)));
        let entries: Vec<VariantEntry> = self.client.get_json(&path).await?;
        Ok(entries.into_iter().map(to_variant).collect())
    }

    async fn builds(&self, tenant: &str, job: &str) -> Result<Builds> {
        let path = Self::tenant_path(
            tenant,
            &format!("builds?job_name={}", urlencoding::encode(job)),
        );
        let entries: Vec<BuildEntry> = self.client.get_json(&path).await?;
        debug!("Fetched {} builds for job '{job}'", entries.len());

        Ok(entries
            .into_iter()
            .map(|entry| (entry.uuid.clone(), to_build(entry)))
            .collect())
    }

    async fn tests(&self, tenant: &str, build: &str) -> Result<Vec<TestSuite>> {
        let path = Self::tenant_path(tenant, &format!("build/{}", urlencoding::encode(build)));
        let detail: BuildDetail = self.client.get_json(&path).await?;

        let mut suites = Vec::new();
        for artifact in detail.artifacts.iter().filter(|a| a.is_test_results()) {
            debug!("Reading test results artifact '{}'", artifact.name);
            let url = self.client.web_url(&artifact.url)?;
            let entries: Vec<SuiteEntry> = self.client.get_json_url(url).await?;
            suites.extend(entries.into_iter().map(to_suite));
        }

        Ok(suites)
    }
}
