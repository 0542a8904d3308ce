use indexmap::IndexMap;
use serde::Deserialize;

use crate::providers::de::string_or_list;

#[derive(Debug, Deserialize)]
pub struct TenantEntry {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectEntry {
    pub name: String,
    /// Fully qualified name including the code review host
    #[serde(default)]
    pub canonical_name: Option<String>,
}

/// Response of `GET /api/tenant/{tenant}/project/{project}`.
#[derive(Debug, Deserialize)]
pub struct ProjectDetail {
    #[serde(default)]
    pub configs: Vec<ProjectConfigEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectConfigEntry {
    #[serde(default)]
    pub pipelines: Vec<PipelineEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PipelineEntry {
    pub name: String,
    #[serde(default)]
    pub jobs: Vec<PipelineJobEntry>,
}

/// Pipeline jobs are reported either as objects or as lists of variants.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PipelineJobEntry {
    Variants(Vec<NamedEntry>),
    Single(NamedEntry),
}

impl PipelineJobEntry {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Single(entry) => Some(entry.name.as_str()),
            Self::Variants(variants) => variants.first().map(|entry| entry.name.as_str()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NamedEntry {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct JobEntry {
    pub name: String,
}

/// One definition of a job as returned by `GET /api/tenant/{tenant}/job/{job}`.
#[derive(Debug, Deserialize)]
pub struct VariantEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub branches: Vec<String>,
    #[serde(default)]
    pub variables: Option<IndexMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
pub struct BuildEntry {
    pub uuid: String,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub pipeline: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<f64>,
}

/// Response of `GET /api/tenant/{tenant}/build/{uuid}`.
#[derive(Debug, Deserialize)]
pub struct BuildDetail {
    #[serde(default)]
    pub artifacts: Vec<ArtifactEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ArtifactEntry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl ArtifactEntry {
    pub fn is_test_results(&self) -> bool {
        self.metadata
            .as_ref()
            .and_then(|metadata| metadata.get("type"))
            .and_then(serde_json::Value::as_str)
            == Some(TEST_RESULTS_ARTIFACT)
    }
}

pub const TEST_RESULTS_ARTIFACT: &str = "test_results";

/// A test suite in a `test_results` artifact.
#[derive(Debug, Deserialize)]
pub struct SuiteEntry {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub tests: Vec<TestEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TestEntry {
    pub name: String,
    #[serde(default, alias = "class_name")]
    pub kind: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
}
