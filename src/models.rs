use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Plugin-attached attributes of an entity, keyed by attribute name.
pub type Extensions = IndexMap<String, serde_json::Value>;

/// Builds of a job keyed by id, in host order (newest first).
pub type Builds = IndexMap<String, Build>;

/// Entity kinds that can carry plugin-attached attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    System,
    Tenant,
    Project,
    Pipeline,
    Job,
    Build,
}

/// Flavour of a CI system, selects how it is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SystemKind {
    /// Flat list of jobs (e.g. a jobs-only orchestrator).
    Jobs,
    /// Tenant, project and pipeline tree.
    #[default]
    Workflow,
    Generic,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Environment {
    pub name: String,
    pub systems: Vec<System>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct System {
    pub name: String,
    pub kind: SystemKind,
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extensions: Extensions,
}

impl System {
    pub fn new(name: impl Into<String>, kind: SystemKind) -> Self {
        Self {
            name: name.into(),
            kind,
            tenants: Vec::new(),
            features: Vec::new(),
            extensions: Extensions::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tenant {
    pub name: String,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub jobs: Vec<Job>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extensions: Extensions,
}

impl Tenant {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            projects: Vec::new(),
            jobs: Vec::new(),
            extensions: Extensions::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub name: String,
    pub url: Option<String>,
    #[serde(default)]
    pub pipelines: Vec<Pipeline>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extensions: Extensions,
}

impl Project {
    pub fn new(name: impl Into<String>, url: Option<String>) -> Self {
        Self {
            name: name.into(),
            url,
            pipelines: Vec::new(),
            extensions: Extensions::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pipeline {
    pub name: String,
    /// Names of jobs owned by the tenant that run in this pipeline.
    #[serde(default)]
    pub jobs: Vec<JobRef>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extensions: Extensions,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            jobs: Vec::new(),
            extensions: Extensions::new(),
        }
    }
}

/// Reference by name into a tenant's job set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct JobRef {
    pub name: String,
}

impl JobRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub name: String,
    pub url: Option<String>,
    /// Definitions in declaration order, parents before children.
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub builds: Builds,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extensions: Extensions,
}

impl Job {
    pub fn new(name: impl Into<String>, url: Option<String>) -> Self {
        Self {
            name: name.into(),
            url,
            variants: Vec::new(),
            builds: Builds::new(),
            extensions: Extensions::new(),
        }
    }

    /// Resolves the parent of `variant` among this job's own variants by the
    /// name of the definition that declared it. Returns `None` when the parent
    /// lives outside this job.
    pub fn parent_variant(&self, variant: &Variant) -> Option<&Variant> {
        let parent = variant.parent.as_deref()?;
        self.variants
            .iter()
            .find(|candidate| candidate.name.as_deref() == Some(parent))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Variant {
    /// Name of the job definition that declared this variant, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub parent: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub branches: Vec<String>,
    #[serde(default)]
    pub variables: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Build {
    pub id: String,
    pub project: Option<String>,
    pub pipeline: Option<String>,
    pub status: Option<String>,
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub test_suites: Vec<TestSuite>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extensions: Extensions,
}

impl Build {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project: None,
            pipeline: None,
            status: None,
            duration_ms: None,
            test_suites: Vec::new(),
            extensions: Extensions::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestSuite {
    pub name: String,
    pub url: Option<String>,
    #[serde(default)]
    pub tests: Vec<Test>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Test {
    pub name: String,
    pub kind: Option<String>,
    pub result: Option<String>,
    pub duration_ms: Option<u64>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feature {
    pub name: String,
    pub present: bool,
}
