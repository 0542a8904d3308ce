use std::collections::BTreeMap;

use bitflags::bitflags;

use crate::plugins::Registry;

bitflags! {
    /// Hierarchy levels a query asks for.
    ///
    /// Bits are independent requests ("tenants and builds"), but the integer
    /// value is also read as an "at least this deep" threshold. Use
    /// [`DepthSet::includes`] for the former and [`DepthSet::at_least`] for
    /// the latter; the two disagree when non-adjacent bits are combined.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DepthSet: u16 {
        const FEATURES = 1;
        const TENANTS = 1 << 1;
        const PROJECTS = 1 << 2;
        const PIPELINES = 1 << 3;
        const JOBS = 1 << 4;
        const VARIANTS = 1 << 5;
        const BUILDS = 1 << 6;
        const TESTS = 1 << 7;
    }
}

/// Option aliases that request each level.
const LEVEL_ALIASES: &[(DepthSet, &[&str])] = &[
    (DepthSet::TENANTS, &["tenants"]),
    (DepthSet::PROJECTS, &["projects"]),
    (DepthSet::PIPELINES, &["pipelines"]),
    (DepthSet::JOBS, &["jobs", "job_url"]),
    (DepthSet::VARIANTS, &["variants"]),
    (DepthSet::BUILDS, &["builds", "last_build", "build_status"]),
    (DepthSet::TESTS, &["tests", "test_result", "test_duration"]),
];

const FEATURES_COMMAND: &str = "features";

impl DepthSet {
    /// Exact membership of `level`.
    pub fn includes(self, level: DepthSet) -> bool {
        self.intersects(level)
    }

    /// Magnitude threshold: true when the combined value reaches `level`,
    /// even if `level` itself is not set.
    pub fn at_least(self, level: DepthSet) -> bool {
        self.magnitude() >= level.bits()
    }

    pub fn magnitude(self) -> u16 {
        self.bits()
    }

    /// Highest level present, if any.
    pub fn highest(self) -> Option<DepthSet> {
        self.iter().last()
    }
}

/// Option name to supplied values. Presence of a key is what counts; values
/// are kept for filtering.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    options: BTreeMap<String, Vec<String>>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(&mut self, name: &str) -> &mut Self {
        self.options.entry(name.to_string()).or_default();
        self
    }

    pub fn set(&mut self, name: &str, values: Vec<String>) -> &mut Self {
        self.options.insert(name.to_string(), values);
        self
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    pub fn values(&self, name: &str) -> &[String] {
        self.options.get(name).map_or(&[], Vec::as_slice)
    }
}

/// Derives the requested levels from the supplied options.
///
/// The result is the union of the built-in alias groups, the `features`
/// sub-command and every derivation registered in `registry`.
pub fn classify(
    options: &QueryOptions,
    subcommand: Option<&str>,
    registry: &Registry,
) -> DepthSet {
    let mut depth = LEVEL_ALIASES
        .iter()
        .filter(|(_, aliases)| aliases.iter().any(|alias| options.is_present(alias)))
        .fold(DepthSet::empty(), |acc, (level, _)| acc | *level);

    if subcommand == Some(FEATURES_COMMAND) {
        depth |= DepthSet::FEATURES;
    }

    for derive in registry.depth_derivations() {
        depth |= derive(options);
    }

    depth
}

/// Levels to fetch from a host, fixed before any request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchPlan {
    pub tenants: bool,
    pub projects: bool,
    pub pipelines: bool,
    pub jobs: bool,
    pub variants: bool,
    pub builds: bool,
    pub tests: bool,
}

impl From<DepthSet> for FetchPlan {
    fn from(depth: DepthSet) -> Self {
        let features = depth.includes(DepthSet::FEATURES);
        let pipelines = depth.includes(DepthSet::PIPELINES);
        let projects = pipelines || depth.includes(DepthSet::PROJECTS);
        let tests = depth.includes(DepthSet::TESTS);
        let builds = tests || depth.includes(DepthSet::BUILDS);
        let variants = depth.includes(DepthSet::VARIANTS);
        let jobs = features || depth.at_least(DepthSet::JOBS);

        Self {
            tenants: features || depth.at_least(DepthSet::TENANTS),
            projects,
            pipelines,
            jobs,
            variants,
            builds,
            tests,
        }
    }
}
