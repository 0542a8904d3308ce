use log::{debug, info};

use crate::config::FeatureConfig;
use crate::depth::{DepthSet, FetchPlan, QueryOptions};
use crate::error::Result;
use crate::models::{Builds, Feature, Job, Project, System, SystemKind, Tenant};
use crate::providers::RemoteHierarchy;

/// Name filters and build/test selectors taken from the query options.
/// Empty lists match everything.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub tenants: Vec<String>,
    pub projects: Vec<String>,
    pub pipelines: Vec<String>,
    pub jobs: Vec<String>,
    pub builds: Vec<String>,
    pub build_status: Vec<String>,
    pub last_build: bool,
    pub test_result: Vec<String>,
}

impl Filters {
    pub fn from_options(options: &QueryOptions) -> Self {
        let values = |name: &str| options.values(name).to_vec();
        Self {
            tenants: values("tenants"),
            projects: values("projects"),
            pipelines: values("pipelines"),
            jobs: values("jobs"),
            builds: values("builds"),
            build_status: values("build_status"),
            last_build: options.is_present("last_build"),
            test_result: values("test_result"),
        }
    }
}

fn matches(filter: &[String], name: &str) -> bool {
    filter.is_empty() || filter.iter().any(|wanted| wanted == name)
}

fn matches_ignore_case(filter: &[String], value: Option<&str>) -> bool {
    filter.is_empty()
        || value.is_some_and(|value| filter.iter().any(|wanted| wanted.eq_ignore_ascii_case(value)))
}

/// Id of the newest build: the highest id when every id is numeric,
/// otherwise the first one in host order.
fn newest_build(builds: &Builds) -> Option<String> {
    let numeric: Option<Vec<(u64, &String)>> = builds
        .keys()
        .map(|id| id.parse::<u64>().ok().map(|number| (number, id)))
        .collect();

    match numeric {
        Some(ids) => ids.into_iter().max_by_key(|(number, _)| *number).map(|(_, id)| id.clone()),
        None => builds.keys().next().cloned(),
    }
}

fn select_builds(builds: Builds, filters: &Filters) -> Builds {
    let mut selected: Builds = builds
        .into_iter()
        .filter(|(id, build)| {
            matches(&filters.builds, id)
                && matches_ignore_case(&filters.build_status, build.status.as_deref())
        })
        .collect();

    if filters.last_build {
        let newest = newest_build(&selected);
        selected.retain(|id, _| Some(id) == newest.as_ref());
    }

    selected
}

/// Materializes the levels of `depth` for one system.
pub struct Query<'a> {
    hierarchy: &'a dyn RemoteHierarchy,
    depth: DepthSet,
    plan: FetchPlan,
    filters: &'a Filters,
}

impl<'a> Query<'a> {
    pub fn new(hierarchy: &'a dyn RemoteHierarchy, depth: DepthSet, filters: &'a Filters) -> Self {
        Self {
            hierarchy,
            depth,
            plan: FetchPlan::from(depth),
            filters,
        }
    }

    /// Fetches the planned levels into a fresh system model.
    ///
    /// # Errors
    ///
    /// Returns the first host error; nothing is retried.
    pub async fn run(
        &self,
        name: &str,
        kind: SystemKind,
        features: &[FeatureConfig],
    ) -> Result<System> {
        let mut system = System::new(name, kind);
        debug!("Fetch plan for '{name}': {:?}", self.plan);

        if !self.plan.tenants {
            return Ok(system);
        }

        for mut tenant in self.hierarchy.tenants().await? {
            if !matches(&self.filters.tenants, &tenant.name) {
                continue;
            }

            if self.plan.projects {
                tenant.projects = self.fetch_projects(&tenant.name).await?;
            }
            if self.plan.jobs {
                tenant.jobs = self.fetch_jobs(&tenant.name).await?;
            }

            system.tenants.push(tenant);
        }

        if self.depth.includes(DepthSet::FEATURES) {
            system.features = probe_features(features, &system.tenants);
        }

        info!("Fetched {} tenants for system '{name}'", system.tenants.len());
        Ok(system)
    }

    async fn fetch_projects(&self, tenant: &str) -> Result<Vec<Project>> {
        let mut projects = Vec::new();

        for mut project in self.hierarchy.projects(tenant).await? {
            if !matches(&self.filters.projects, &project.name) {
                continue;
            }

            if self.plan.pipelines {
                let mut pipelines = self.hierarchy.pipelines(tenant, &project.name).await?;
                pipelines.retain(|pipeline| matches(&self.filters.pipelines, &pipeline.name));
                for pipeline in &mut pipelines {
                    pipeline
                        .jobs
                        .retain(|job| matches(&self.filters.jobs, &job.name));
                }
                project.pipelines = pipelines;
            }

            projects.push(project);
        }

        Ok(projects)
    }

    async fn fetch_jobs(&self, tenant: &str) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();

        for mut job in self.hierarchy.jobs(tenant).await? {
            if !matches(&self.filters.jobs, &job.name) {
                continue;
            }

            if self.plan.variants {
                job.variants = self.hierarchy.variants(tenant, &job.name).await?;
            }

            if self.plan.builds {
                let builds = self.hierarchy.builds(tenant, &job.name).await?;
                job.builds = select_builds(builds, self.filters);

                if self.plan.tests {
                    let wanted = &self.filters.test_result;
                    for build in job.builds.values_mut() {
                        let mut suites = self.hierarchy.tests(tenant, &build.id).await?;
                        for suite in &mut suites {
                            suite
                                .tests
                                .retain(|test| matches_ignore_case(wanted, test.result.as_deref()));
                        }
                        build.test_suites = suites;
                    }
                }
            }

            jobs.push(job);
        }

        Ok(jobs)
    }
}

/// A feature is present when any fetched job name contains its pattern.
pub fn probe_features(features: &[FeatureConfig], tenants: &[Tenant]) -> Vec<Feature> {
    features
        .iter()
        .map(|feature| Feature {
            name: feature.name.clone(),
            present: tenants
                .iter()
                .flat_map(|tenant| &tenant.jobs)
                .any(|job| job.name.contains(&feature.job_pattern)),
        })
        .collect()
}
