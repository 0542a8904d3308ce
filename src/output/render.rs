//! Depth-aware rendering of the fetched hierarchy.
//!
//! A single [`Walker`] decides what is shown at each level and drives an
//! [`Emitter`]; the text and structured outputs only differ in how they
//! write entities, fields and lists.

use std::collections::HashMap;
use std::fmt;

use log::{debug, warn};
use serde_json::{Map, Value};

use crate::config::OutputFormat;
use crate::depth::DepthSet;
use crate::error::Result;
use crate::models::{
    Build, EntityKind, Environment, Extensions, Feature, Job, JobRef, Pipeline, Project, System,
    SystemKind, Tenant, Test, TestSuite, Variant,
};
use crate::plugins::{ExtensionRenderer, Registry};

use super::styling::{label, outcome, presence, subtle};
use super::RenderConfig;

const INDENT: &str = "  ";

/// Count line closing a list of children.
pub struct Footer<'a> {
    pub children: &'a str,
    pub kind: &'a str,
    pub name: &'a str,
    pub count: usize,
}

impl fmt::Display for Footer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total {} found in {} '{}': {}",
            self.children, self.kind, self.name, self.count
        )
    }
}

/// Output-specific half of the renderer.
pub trait Emitter {
    /// Starts an entity headed by `label` and `name`; children and fields
    /// go inside it until [`Emitter::close`].
    fn open(&mut self, label: &str, name: &str);
    fn close(&mut self);
    fn field(&mut self, key: &str, label: &str, value: &Value);
    fn begin_list(&mut self, key: &str);
    fn end_list(&mut self, footer: Option<&Footer<'_>>);
    fn plugin_section(
        &mut self,
        attribute: &str,
        renderer: &dyn ExtensionRenderer,
        value: &Value,
        config: &RenderConfig,
    );
}

/// Indented lines, two spaces per level.
pub struct TextEmitter {
    lines: Vec<String>,
    level: usize,
    color: bool,
}

impl TextEmitter {
    pub fn new(color: bool) -> Self {
        Self {
            lines: Vec::new(),
            level: 0,
            color,
        }
    }

    pub fn finish(self) -> String {
        self.lines.join("\n")
    }

    fn push(&mut self, line: impl fmt::Display) {
        self.lines
            .push(format!("{}{line}", INDENT.repeat(self.level)));
    }

    fn label(&self, text: &str) -> String {
        if self.color {
            label(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn value(&self, key: &str, value: &Value) -> String {
        match value {
            Value::Bool(flag) if self.color => presence(*flag).to_string(),
            Value::String(text) if self.color && matches!(key, "status" | "result") => {
                outcome(text).to_string()
            }
            other => text_value(other),
        }
    }
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(text_value).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

impl Emitter for TextEmitter {
    fn open(&mut self, label: &str, name: &str) {
        let header = format!("{}{name}", self.label(&format!("{label}: ")));
        self.push(header);
        self.level += 1;
    }

    fn close(&mut self) {
        self.level = self.level.saturating_sub(1);
    }

    fn field(&mut self, key: &str, label: &str, value: &Value) {
        if let Value::Object(entries) = value {
            let header = self.label(&format!("{label}:"));
            self.push(header);
            self.level += 1;
            for (key, entry) in entries {
                self.push(format!("{key}: {}", text_value(entry)));
            }
            self.level -= 1;
        } else {
            let line = format!("{}{}", self.label(&format!("{label}: ")), self.value(key, value));
            self.push(line);
        }
    }

    fn begin_list(&mut self, _key: &str) {}

    fn end_list(&mut self, footer: Option<&Footer<'_>>) {
        if let Some(footer) = footer {
            if self.color {
                self.push(subtle(footer));
            } else {
                self.push(footer);
            }
        }
    }

    fn plugin_section(
        &mut self,
        attribute: &str,
        renderer: &dyn ExtensionRenderer,
        value: &Value,
        config: &RenderConfig,
    ) {
        let header = self.label(&format!("{attribute}:"));
        self.push(header);
        self.level += 1;
        for line in renderer.render_text(value, config) {
            self.push(line);
        }
        self.level -= 1;
    }
}

enum Frame {
    Object(Map<String, Value>),
    List(String, Vec<Value>),
}

/// Builds a JSON document with the same field names as the text output.
#[derive(Default)]
pub struct StructuredEmitter {
    stack: Vec<Frame>,
    root: Map<String, Value>,
    last: Option<Value>,
}

impl StructuredEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The top-level lists, or the last entity closed at the top level.
    pub fn finish(self) -> Value {
        if self.root.is_empty() {
            if let Some(value) = self.last {
                return value;
            }
        }
        Value::Object(self.root)
    }

    fn insert(&mut self, key: &str, value: Value) {
        match self.stack.last_mut() {
            Some(Frame::Object(map)) => {
                map.insert(key.to_string(), value);
            }
            Some(Frame::List(..)) => debug!("Dropping field '{key}' written directly into a list"),
            None => {
                self.root.insert(key.to_string(), value);
            }
        }
    }
}

fn to_key(label: &str) -> String {
    label.to_lowercase().replace(' ', "_")
}

impl Emitter for StructuredEmitter {
    fn open(&mut self, _label: &str, name: &str) {
        let mut map = Map::new();
        map.insert("name".to_string(), Value::from(name));
        self.stack.push(Frame::Object(map));
    }

    fn close(&mut self) {
        let Some(Frame::Object(map)) = self.stack.pop() else {
            return;
        };
        let value = Value::Object(map);
        match self.stack.last_mut() {
            Some(Frame::List(_, items)) => items.push(value),
            _ => self.last = Some(value),
        }
    }

    fn field(&mut self, key: &str, _label: &str, value: &Value) {
        self.insert(key, value.clone());
    }

    fn begin_list(&mut self, key: &str) {
        self.stack.push(Frame::List(to_key(key), Vec::new()));
    }

    fn end_list(&mut self, _footer: Option<&Footer<'_>>) {
        if let Some(Frame::List(key, items)) = self.stack.pop() {
            self.insert(&key, Value::Array(items));
        }
    }

    fn plugin_section(
        &mut self,
        attribute: &str,
        renderer: &dyn ExtensionRenderer,
        value: &Value,
        config: &RenderConfig,
    ) {
        let rendered = renderer.render_structured(value, config);
        self.insert(attribute, rendered);
    }
}

/// Walks the model under the configured depth and feeds an emitter.
pub struct Walker<'a> {
    emitter: &'a mut dyn Emitter,
    registry: &'a Registry,
    systems: &'a RendererTable,
    config: &'a RenderConfig,
}

impl<'a> Walker<'a> {
    pub fn depth(&self) -> DepthSet {
        self.config.depth
    }

    pub fn close(&mut self) {
        self.emitter.close();
    }

    /// Emits `items` as a list named `children`, closed by a count footer
    /// attributed to the owning `kind` and `name`.
    pub fn list<'i, T: 'i>(
        &mut self,
        children: &str,
        owner: (&str, &str),
        items: impl IntoIterator<Item = &'i T>,
        mut each: impl FnMut(&mut Self, &'i T),
    ) {
        self.emitter.begin_list(children);
        let mut count = 0;
        for item in items {
            each(self, item);
            count += 1;
        }
        let (kind, name) = owner;
        self.emitter.end_list(Some(&Footer {
            children,
            kind,
            name,
            count,
        }));
    }

    fn optional(&mut self, key: &str, label: &str, value: Option<impl Into<Value>>) {
        if let Some(value) = value {
            self.emitter.field(key, label, &value.into());
        }
    }

    pub fn environment(&mut self, environment: &Environment) {
        self.emitter.open("Environment", &environment.name);
        self.list(
            "systems",
            ("environment", &environment.name),
            &environment.systems,
            |walker, system| walker.system(system),
        );
        self.close();
    }

    /// Resolves the renderer for the system's kind once and hands over.
    pub fn system(&mut self, system: &System) {
        let systems = self.systems;
        systems.get(system.kind).render(system, self);
    }

    /// Opens a system node with its kind, plugin sections and features.
    /// The caller closes it.
    pub fn system_header(&mut self, system: &System) {
        self.emitter.open("System", &system.name);
        self.emitter
            .field("kind", "Kind", &Value::from(kind_name(system.kind)));
        self.extensions(EntityKind::System, &system.extensions);

        if self.depth().includes(DepthSet::FEATURES) {
            self.list(
                "features",
                ("system", &system.name),
                &system.features,
                |walker, feature| walker.feature(feature),
            );
        }
    }

    pub fn feature(&mut self, feature: &Feature) {
        self.emitter.open("Feature", &feature.name);
        self.emitter
            .field("present", "Present", &Value::Bool(feature.present));
        self.close();
    }

    pub fn tenant(&mut self, tenant: &Tenant) {
        self.emitter.open("Tenant", &tenant.name);
        self.extensions(EntityKind::Tenant, &tenant.extensions);

        if self
            .depth()
            .includes(DepthSet::PROJECTS | DepthSet::PIPELINES)
        {
            self.list(
                "projects",
                ("tenant", &tenant.name),
                &tenant.projects,
                |walker, project| walker.project(project),
            );
        }
        if self.depth().at_least(DepthSet::JOBS) {
            self.list("jobs", ("tenant", &tenant.name), &tenant.jobs, |walker, job| {
                walker.job(job);
            });
        }
        self.close();
    }

    pub fn project(&mut self, project: &Project) {
        self.emitter.open("Project", &project.name);
        self.optional("url", "URL", project.url.clone());
        self.extensions(EntityKind::Project, &project.extensions);

        if self.depth().includes(DepthSet::PIPELINES) {
            self.list(
                "pipelines",
                ("project", &project.name),
                &project.pipelines,
                |walker, pipeline| walker.pipeline(pipeline),
            );
        }
        self.close();
    }

    pub fn pipeline(&mut self, pipeline: &Pipeline) {
        self.emitter.open("Pipeline", &pipeline.name);
        self.extensions(EntityKind::Pipeline, &pipeline.extensions);

        if self.depth().at_least(DepthSet::JOBS) {
            self.list(
                "jobs",
                ("pipeline", &pipeline.name),
                &pipeline.jobs,
                |walker, job: &JobRef| {
                    walker.emitter.open("Job", &job.name);
                    walker.close();
                },
            );
        }
        self.close();
    }

    pub fn job(&mut self, job: &Job) {
        self.emitter.open("Job", &job.name);
        if self.config.job_url {
            self.optional("url", "URL", job.url.clone());
        }
        self.extensions(EntityKind::Job, &job.extensions);

        if self.depth().includes(DepthSet::VARIANTS) {
            self.list("variants", ("job", &job.name), &job.variants, |walker, variant| {
                walker.variant(job, variant);
            });
        }
        if self.depth().at_least(DepthSet::BUILDS) {
            self.list("builds", ("job", &job.name), job.builds.values(), |walker, build| {
                walker.build(build);
            });
        }
        self.close();
    }

    /// Variants without branches of their own show those of their parent
    /// when the parent is a variant of the same job.
    pub fn variant(&mut self, job: &Job, variant: &Variant) {
        self.emitter
            .open("Variant", variant.name.as_deref().unwrap_or(&job.name));
        self.optional("parent", "Parent", variant.parent.clone());
        if !variant.description.is_empty() {
            self.emitter.field(
                "description",
                "Description",
                &Value::from(variant.description.as_str()),
            );
        }

        let branches = if variant.branches.is_empty() {
            job.parent_variant(variant).map(|parent| &parent.branches)
        } else {
            Some(&variant.branches)
        };
        if let Some(branches) = branches.filter(|b| !b.is_empty()) {
            self.emitter
                .field("branches", "Branches", &Value::from(branches.clone()));
        }

        if !variant.variables.is_empty() {
            let variables: Map<String, Value> = variant
                .variables
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            self.emitter
                .field("variables", "Variables", &Value::Object(variables));
        }
        self.close();
    }

    pub fn build(&mut self, build: &Build) {
        self.emitter.open("Build", &build.id);
        self.optional("project", "Project", build.project.clone());
        self.optional("pipeline", "Pipeline", build.pipeline.clone());
        self.optional("status", "Status", build.status.clone());
        self.optional("duration_ms", "Duration (ms)", build.duration_ms);
        self.extensions(EntityKind::Build, &build.extensions);

        if self.depth().at_least(DepthSet::TESTS) {
            self.list(
                "test suites",
                ("build", &build.id),
                &build.test_suites,
                |walker, suite| walker.test_suite(suite),
            );
        }
        self.close();
    }

    pub fn test_suite(&mut self, suite: &TestSuite) {
        self.emitter.open("Test Suite", &suite.name);
        self.optional("url", "URL", suite.url.clone());
        self.list("tests", ("test suite", &suite.name), &suite.tests, |walker, test| {
            walker.test(test);
        });
        self.close();
    }

    pub fn test(&mut self, test: &Test) {
        self.emitter.open("Test", &test.name);
        self.optional("kind", "Kind", test.kind.clone());
        self.optional("result", "Result", test.result.clone());
        if self.config.test_duration {
            self.optional("duration_ms", "Duration (ms)", test.duration_ms);
        }
        self.optional("url", "URL", test.url.clone());
        self.close();
    }

    /// Plugin sections for externally attached attributes; other known
    /// attributes render as plain fields.
    fn extensions(&mut self, entity: EntityKind, extensions: &Extensions) {
        for (attribute, value) in extensions {
            match self.registry.attribute(entity, attribute) {
                Some(descriptor) if descriptor.external => {
                    match self.registry.renderer(&descriptor.plugin) {
                        Some(renderer) => {
                            self.emitter
                                .plugin_section(attribute, renderer, value, self.config);
                        }
                        None => warn!(
                            "No renderer registered for plugin '{}', skipping '{attribute}'",
                            descriptor.plugin
                        ),
                    }
                }
                Some(_) => self.emitter.field(attribute, attribute, value),
                None => debug!("Skipping unregistered attribute '{attribute}' on {entity:?}"),
            }
        }
    }
}

fn kind_name(kind: SystemKind) -> &'static str {
    match kind {
        SystemKind::Jobs => "jobs",
        SystemKind::Workflow => "workflow",
        SystemKind::Generic => "generic",
    }
}

/// Renders one system node, including its header and closing.
pub trait SystemRenderer: Send + Sync {
    fn render(&self, system: &System, walker: &mut Walker<'_>);
}

/// Tenant, project and pipeline tree.
pub struct WorkflowRenderer;

impl SystemRenderer for WorkflowRenderer {
    fn render(&self, system: &System, walker: &mut Walker<'_>) {
        walker.system_header(system);
        if walker.depth().at_least(DepthSet::TENANTS) {
            walker.list(
                "tenants",
                ("system", &system.name),
                &system.tenants,
                |walker, tenant| walker.tenant(tenant),
            );
        }
        walker.close();
    }
}

/// Flat job list across all tenants.
pub struct JobsRenderer;

impl SystemRenderer for JobsRenderer {
    fn render(&self, system: &System, walker: &mut Walker<'_>) {
        walker.system_header(system);
        if walker.depth().at_least(DepthSet::JOBS) {
            walker.list(
                "jobs",
                ("system", &system.name),
                system.tenants.iter().flat_map(|tenant| &tenant.jobs),
                |walker, job| walker.job(job),
            );
        }
        walker.close();
    }
}

/// System renderers by kind, with a fallback for unregistered kinds.
pub struct RendererTable {
    renderers: HashMap<SystemKind, Box<dyn SystemRenderer>>,
    fallback: Box<dyn SystemRenderer>,
}

impl Default for RendererTable {
    fn default() -> Self {
        let mut table = Self {
            renderers: HashMap::new(),
            fallback: Box::new(WorkflowRenderer),
        };
        table.register(SystemKind::Workflow, Box::new(WorkflowRenderer));
        table.register(SystemKind::Jobs, Box::new(JobsRenderer));
        table
    }
}

impl RendererTable {
    pub fn register(&mut self, kind: SystemKind, renderer: Box<dyn SystemRenderer>) {
        self.renderers.insert(kind, renderer);
    }

    pub fn get(&self, kind: SystemKind) -> &dyn SystemRenderer {
        if let Some(renderer) = self.renderers.get(&kind) {
            return &**renderer;
        }
        warn!("No renderer registered for {kind:?} systems, using the default renderer");
        &*self.fallback
    }
}

/// Entry point: renders environments in the configured format.
pub struct Renderer<'a> {
    registry: &'a Registry,
    systems: RendererTable,
    config: RenderConfig,
}

impl<'a> Renderer<'a> {
    pub fn new(registry: &'a Registry, config: RenderConfig) -> Self {
        Self {
            registry,
            systems: RendererTable::default(),
            config,
        }
    }

    pub fn text(&self, environments: &[Environment]) -> String {
        let mut emitter = TextEmitter::new(self.config.color);
        self.walk(&mut emitter, environments);
        emitter.finish()
    }

    pub fn structured(&self, environments: &[Environment]) -> Value {
        let mut emitter = StructuredEmitter::new();
        self.walk(&mut emitter, environments);
        emitter.finish()
    }

    pub fn render(&self, environments: &[Environment]) -> Result<String> {
        match self.config.format {
            OutputFormat::Text => Ok(self.text(environments)),
            OutputFormat::Json => {
                let document = self.structured(environments);
                Ok(if self.config.pretty {
                    serde_json::to_string_pretty(&document)?
                } else {
                    serde_json::to_string(&document)?
                })
            }
        }
    }

    fn walk(&self, emitter: &mut dyn Emitter, environments: &[Environment]) {
        let mut walker = Walker {
            emitter,
            registry: self.registry,
            systems: &self.systems,
            config: &self.config,
        };

        walker.emitter.begin_list("environments");
        for environment in environments {
            walker.environment(environment);
        }
        walker.emitter.end_list(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::plugins::AttributeDescriptor;

    fn config(depth: DepthSet) -> RenderConfig {
        RenderConfig {
            format: OutputFormat::Text,
            pretty: false,
            color: false,
            depth,
            job_url: false,
            test_duration: false,
        }
    }

    fn environment(system: System) -> Vec<Environment> {
        vec![Environment {
            name: "prod".to_string(),
            systems: vec![system],
        }]
    }

    fn tenant_t() -> System {
        let mut tenant = Tenant::new("t");
        tenant.jobs = vec![Job::new("a", None), Job::new("b", None)];
        let mut system = System::new("zuul", SystemKind::Workflow);
        system.tenants.push(tenant);
        system
    }

    fn trimmed(text: &str) -> Vec<&str> {
        text.lines().map(str::trim).collect()
    }

    /// Every key of `expected` is present in `actual` with a matching value;
    /// arrays must match element-wise.
    fn is_subset(expected: &Value, actual: &Value) -> bool {
        match (expected, actual) {
            (Value::Object(expected), Value::Object(actual)) => expected
                .iter()
                .all(|(key, value)| actual.get(key).is_some_and(|found| is_subset(value, found))),
            (Value::Array(expected), Value::Array(actual)) => {
                expected.len() == actual.len()
                    && expected.iter().zip(actual).all(|(e, a)| is_subset(e, a))
            }
            _ => expected == actual,
        }
    }

    #[test]
    fn test_tenant_jobs_text() {
        let registry = Registry::new();
        let renderer = Renderer::new(&registry, config(DepthSet::JOBS));

        let text = renderer.text(&environment(tenant_t()));
        let lines = trimmed(&text);

        assert!(lines.contains(&"Tenant: t"));
        assert!(lines.contains(&"Job: a"));
        assert!(lines.contains(&"Job: b"));
        assert!(lines.contains(&"Total jobs found in tenant 't': 2"));

        let job_a = lines.iter().position(|l| *l == "Job: a").unwrap();
        let footer = lines
            .iter()
            .position(|l| *l == "Total jobs found in tenant 't': 2")
            .unwrap();
        assert!(footer > job_a);
    }

    #[test]
    fn test_tenant_jobs_structured() {
        let registry = Registry::new();
        let renderer = Renderer::new(&registry, config(DepthSet::JOBS));

        let document = renderer.structured(&environment(tenant_t()));
        let tenant = &document["environments"][0]["systems"][0]["tenants"][0];

        assert!(is_subset(
            &json!({"name": "t", "jobs": [{"name": "a"}, {"name": "b"}]}),
            tenant
        ));
        assert!(tenant.get("projects").is_none());
    }

    #[test]
    fn test_text_indents_two_spaces_per_level() {
        let registry = Registry::new();
        let renderer = Renderer::new(&registry, config(DepthSet::JOBS));

        let text = renderer.text(&environment(tenant_t()));
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Environment: prod");
        assert_eq!(lines[1], "  System: zuul");
        assert!(lines.contains(&"    Tenant: t"));
        assert!(lines.contains(&"      Job: a"));
    }

    #[test]
    fn test_tenants_depth_stops_before_jobs() {
        let registry = Registry::new();
        let renderer = Renderer::new(&registry, config(DepthSet::TENANTS));

        let text = renderer.text(&environment(tenant_t()));
        let lines = trimmed(&text);

        assert!(lines.contains(&"Tenant: t"));
        assert!(!lines.contains(&"Job: a"));
        assert!(lines.contains(&"Total tenants found in system 'zuul': 1"));
    }

    #[test]
    fn test_builds_shown_by_magnitude_variants_by_bit() {
        let mut system = tenant_t();
        let job = &mut system.tenants[0].jobs[0];
        let mut build = Build::new("b1");
        build.status = Some("SUCCESS".to_string());
        build.duration_ms = Some(1500);
        job.builds.insert("b1".to_string(), build);
        job.variants.push(Variant {
            name: Some("a".to_string()),
            ..Variant::default()
        });

        let registry = Registry::new();
        let renderer = Renderer::new(&registry, config(DepthSet::TENANTS | DepthSet::BUILDS));
        let text = renderer.text(&environment(system.clone()));
        let lines = trimmed(&text);

        assert!(lines.contains(&"Job: a"));
        assert!(lines.contains(&"Build: b1"));
        assert!(lines.contains(&"Status: SUCCESS"));
        assert!(lines.contains(&"Duration (ms): 1500"));
        assert!(lines.contains(&"Total builds found in job 'a': 1"));
        assert!(!lines.contains(&"Variant: a"));

        let document = renderer.structured(&environment(system));
        let job = &document["environments"][0]["systems"][0]["tenants"][0]["jobs"][0];
        assert_eq!(job["builds"][0]["status"], "SUCCESS");
        assert!(job.get("variants").is_none());
    }

    #[test]
    fn test_job_url_only_when_requested() {
        let mut system = tenant_t();
        system.tenants[0].jobs[0].url = Some("https://zuul.example.com/job/a".to_string());
        let registry = Registry::new();

        let plain = Renderer::new(&registry, config(DepthSet::JOBS));
        let lines = plain.text(&environment(system.clone()));
        assert!(!lines.contains("URL:"));
        let document = plain.structured(&environment(system.clone()));
        let job = &document["environments"][0]["systems"][0]["tenants"][0]["jobs"][0];
        assert!(job.get("url").is_none());

        let mut with_url = config(DepthSet::JOBS);
        with_url.job_url = true;
        let renderer = Renderer::new(&registry, with_url);
        let text = renderer.text(&environment(system.clone()));
        assert!(trimmed(&text).contains(&"URL: https://zuul.example.com/job/a"));
        let document = renderer.structured(&environment(system));
        let job = &document["environments"][0]["systems"][0]["tenants"][0]["jobs"][0];
        assert_eq!(job["url"], "https://zuul.example.com/job/a");
    }

    #[test]
    fn test_test_duration_only_when_requested() {
        let mut system = tenant_t();
        let mut build = Build::new("b1");
        build.test_suites.push(TestSuite {
            name: "unit".to_string(),
            url: None,
            tests: vec![Test {
                name: "test_ok".to_string(),
                kind: None,
                result: Some("success".to_string()),
                duration_ms: Some(42),
                url: None,
            }],
        });
        system.tenants[0].jobs[0].builds.insert("b1".to_string(), build);
        let registry = Registry::new();

        let plain = Renderer::new(&registry, config(DepthSet::TESTS));
        let text = plain.text(&environment(system.clone()));
        let lines = trimmed(&text);
        assert!(lines.contains(&"Test: test_ok"));
        assert!(lines.contains(&"Result: success"));
        assert!(!lines.contains(&"Duration (ms): 42"));

        let mut with_duration = config(DepthSet::TESTS);
        with_duration.test_duration = true;
        let renderer = Renderer::new(&registry, with_duration);
        let text = renderer.text(&environment(system.clone()));
        assert!(trimmed(&text).contains(&"Duration (ms): 42"));
        let document = renderer.structured(&environment(system));
        let test = &document["environments"][0]["systems"][0]["tenants"][0]["jobs"][0]["builds"]
            [0]["test_suites"][0]["tests"][0];
        assert_eq!(test["duration_ms"], 42);
    }

    #[test]
    fn test_variants_inherit_parent_branches() {
        let mut system = tenant_t();
        let job = &mut system.tenants[0].jobs[0];
        job.variants = vec![
            Variant {
                name: Some("base".to_string()),
                branches: vec!["master".to_string()],
                ..Variant::default()
            },
            Variant {
                name: Some("a".to_string()),
                parent: Some("base".to_string()),
                ..Variant::default()
            },
        ];

        let registry = Registry::new();
        let renderer = Renderer::new(&registry, config(DepthSet::JOBS | DepthSet::VARIANTS));
        let document = renderer.structured(&environment(system));
        let job = &document["environments"][0]["systems"][0]["tenants"][0]["jobs"][0];
        let variants = &job["variants"];

        assert_eq!(variants[1]["name"], "a");
        assert_eq!(variants[1]["parent"], "base");
        assert_eq!(variants[1]["branches"], json!(["master"]));
    }

    #[test]
    fn test_projects_and_pipelines() {
        let mut system = tenant_t();
        let mut project = Project::new("nova", Some("https://zuul/t/t/project/nova".to_string()));
        let mut pipeline = Pipeline::new("check");
        pipeline.jobs = vec![JobRef::new("a")];
        project.pipelines.push(pipeline);
        system.tenants[0].projects.push(project);

        let registry = Registry::new();
        let renderer = Renderer::new(&registry, config(DepthSet::PIPELINES));
        let text = renderer.text(&environment(system.clone()));
        let lines = trimmed(&text);

        assert!(lines.contains(&"Project: nova"));
        assert!(lines.contains(&"Pipeline: check"));
        assert!(lines.contains(&"Total pipelines found in project 'nova': 1"));
        // Pipeline jobs need the jobs threshold
        assert!(!lines.contains(&"Job: a"));

        let renderer = Renderer::new(&registry, config(DepthSet::PIPELINES | DepthSet::JOBS));
        let text = renderer.text(&environment(system));
        assert!(trimmed(&text).contains(&"Total jobs found in pipeline 'check': 1"));
    }

    #[test]
    fn test_features_only() {
        let mut system = tenant_t();
        system.features = vec![Feature {
            name: "IPv6".to_string(),
            present: true,
        }];

        let registry = Registry::new();
        let renderer = Renderer::new(&registry, config(DepthSet::FEATURES));
        let text = renderer.text(&environment(system.clone()));
        let lines = trimmed(&text);

        assert!(lines.contains(&"Feature: IPv6"));
        assert!(lines.contains(&"Present: true"));
        assert!(!lines.contains(&"Tenant: t"));

        let document = renderer.structured(&environment(system));
        assert_eq!(
            document["environments"][0]["systems"][0]["features"],
            json!([{"name": "IPv6", "present": true}])
        );
    }

    #[test]
    fn test_jobs_system_lists_jobs_flat() {
        let mut system = tenant_t();
        system.name = "jenkins".to_string();
        system.kind = SystemKind::Jobs;
        let mut other = Tenant::new("u");
        other.jobs.push(Job::new("c", None));
        system.tenants.push(other);

        let registry = Registry::new();
        let renderer = Renderer::new(&registry, config(DepthSet::JOBS));
        let text = renderer.text(&environment(system));
        let lines = trimmed(&text);

        assert!(!lines.contains(&"Tenant: t"));
        assert!(lines.contains(&"Job: c"));
        assert!(lines.contains(&"Total jobs found in system 'jenkins': 3"));
    }

    #[test]
    fn test_unregistered_kind_falls_back_to_default() {
        let mut system = tenant_t();
        system.kind = SystemKind::Generic;

        let registry = Registry::new();
        let renderer = Renderer::new(&registry, config(DepthSet::JOBS));
        let text = renderer.text(&environment(system));
        let lines = trimmed(&text);

        assert!(lines.contains(&"Kind: generic"));
        assert!(lines.contains(&"Tenant: t"));
        assert!(lines.contains(&"Total jobs found in tenant 't': 2"));
    }

    struct Upper;

    impl ExtensionRenderer for Upper {
        fn render_text(&self, value: &Value, _config: &RenderConfig) -> Vec<String> {
            vec![value.as_str().unwrap_or_default().to_uppercase()]
        }

        fn render_structured(&self, value: &Value, config: &RenderConfig) -> Value {
            json!({"value": value, "depth": config.depth.bits()})
        }
    }

    fn plugin_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register_attribute(
            EntityKind::Job,
            "spec",
            AttributeDescriptor {
                plugin: "openstack".to_string(),
                description: "Deployment spec".to_string(),
                external: true,
            },
        );
        registry.register_attribute(
            EntityKind::Job,
            "owner",
            AttributeDescriptor {
                plugin: "openstack".to_string(),
                description: "Owning team".to_string(),
                external: false,
            },
        );
        registry.register_renderer("openstack", Box::new(Upper));
        registry
    }

    #[test]
    fn test_plugin_sections() {
        let mut system = tenant_t();
        let job = &mut system.tenants[0].jobs[0];
        job.extensions.insert("spec".to_string(), json!("ipv6"));
        job.extensions.insert("owner".to_string(), json!("infra"));
        job.extensions.insert("unknown".to_string(), json!("skipped"));

        let registry = plugin_registry();
        let renderer = Renderer::new(&registry, config(DepthSet::JOBS));

        let text = renderer.text(&environment(system.clone()));
        let lines: Vec<&str> = text.lines().collect();
        let section = lines.iter().position(|l| l.trim() == "spec:").unwrap();
        assert_eq!(lines[section + 1], "          IPV6");
        assert!(lines.iter().any(|l| l.trim() == "owner: infra"));
        assert!(!text.contains("skipped"));

        let document = renderer.structured(&environment(system));
        let jobs = &document["environments"][0]["systems"][0]["tenants"][0]["jobs"];
        assert_eq!(jobs[0]["spec"], json!({"value": "ipv6", "depth": 16}));
        assert_eq!(jobs[0]["owner"], "infra");
        assert!(jobs[0].get("unknown").is_none());
        // No attached data, no section
        assert_eq!(jobs[1], json!({"name": "b"}));
    }

    #[test]
    fn test_json_output_reloads() {
        let registry = Registry::new();
        let mut render_config = config(DepthSet::JOBS);
        render_config.format = OutputFormat::Json;
        render_config.pretty = true;
        let renderer = Renderer::new(&registry, render_config);

        let environments = environment(tenant_t());
        let rendered = renderer.render(&environments).unwrap();
        let reloaded: Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(reloaded, renderer.structured(&environments));
        assert!(rendered.contains('\n'));
    }

    #[test]
    fn test_structured_emitter_single_entity() {
        let mut emitter = StructuredEmitter::new();
        emitter.open("Tenant", "t");
        emitter.begin_list("jobs");
        emitter.open("Job", "a");
        emitter.close();
        emitter.end_list(None);
        emitter.close();

        assert_eq!(
            emitter.finish(),
            json!({"name": "t", "jobs": [{"name": "a"}]})
        );
    }
}
