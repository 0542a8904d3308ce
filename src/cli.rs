use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indexmap::IndexMap;
use log::info;

use crate::config::{Config, EnvironmentConfig, OutputFormat, SystemConfig};
use crate::depth::{classify, DepthSet, QueryOptions};
use crate::models::Environment;
use crate::output::{RenderConfig, Renderer, Spinner};
use crate::plugins::Registry;
use crate::providers::{build_hierarchy, RemoteHierarchy};
use crate::query::{Filters, Query};
use crate::workspace::WorkspaceCache;

#[derive(Parser)]
#[command(name = "citree")]
#[command(author, version, about = "CI hierarchy explorer", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./citree.* or the user config dir)
    #[arg(short, long, global = true, env = "CITREE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short = 'f', long, global = true, value_enum)]
    output_format: Option<OutputFormat>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    #[arg(long, global = true, default_value_t = false)]
    no_color: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Remove all cached repository clones before querying
    #[arg(long, global = true, default_value_t = false)]
    clear_workspace: bool,

    /// Environments to query (all by default)
    #[arg(long, global = true, num_args = 1..)]
    envs: Vec<String>,

    /// Systems to query (all by default)
    #[arg(long, global = true, num_args = 1..)]
    systems: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the requested levels of the CI hierarchy
    Query(QueryArgs),
    /// Show which configured features the jobs cover
    Features(FeatureArgs),
    /// Show what each host reports about itself
    Info,
}

#[derive(Args, Debug, Default)]
struct QueryArgs {
    /// Show tenants, optionally only the named ones
    #[arg(long, num_args = 0..)]
    tenants: Option<Vec<String>>,

    #[arg(long, num_args = 0..)]
    projects: Option<Vec<String>>,

    #[arg(long, num_args = 0..)]
    pipelines: Option<Vec<String>>,

    #[arg(long, num_args = 0..)]
    jobs: Option<Vec<String>>,

    /// Show job URLs
    #[arg(long)]
    job_url: bool,

    #[arg(long)]
    variants: bool,

    /// Show builds, optionally only the given build ids
    #[arg(long, num_args = 0..)]
    builds: Option<Vec<String>>,

    /// Only the newest build of each job
    #[arg(long)]
    last_build: bool,

    #[arg(long, num_args = 1..)]
    build_status: Option<Vec<String>>,

    #[arg(long)]
    tests: bool,

    #[arg(long, num_args = 1..)]
    test_result: Option<Vec<String>>,

    #[arg(long)]
    test_duration: bool,
}

impl QueryArgs {
    fn options(&self) -> QueryOptions {
        let mut options = QueryOptions::new();

        let lists = [
            ("tenants", &self.tenants),
            ("projects", &self.projects),
            ("pipelines", &self.pipelines),
            ("jobs", &self.jobs),
            ("builds", &self.builds),
            ("build_status", &self.build_status),
            ("test_result", &self.test_result),
        ];
        for (name, values) in lists {
            if let Some(values) = values {
                options.set(name, values.clone());
            }
        }

        let flags = [
            ("job_url", self.job_url),
            ("variants", self.variants),
            ("last_build", self.last_build),
            ("tests", self.tests),
            ("test_duration", self.test_duration),
        ];
        for (name, present) in flags {
            if present {
                options.flag(name);
            }
        }

        options
    }
}

#[derive(Args, Debug, Default)]
struct FeatureArgs {
    #[arg(long, num_args = 1..)]
    tenants: Option<Vec<String>>,

    /// Only probe these jobs
    #[arg(long, num_args = 1..)]
    jobs: Option<Vec<String>>,
}

impl FeatureArgs {
    /// Filters only; the levels come from the sub-command.
    fn filters(&self) -> Filters {
        Filters {
            tenants: self.tenants.clone().unwrap_or_default(),
            jobs: self.jobs.clone().unwrap_or_default(),
            ..Filters::default()
        }
    }
}

impl Cli {
    fn render_config(
        &self,
        config: &Config,
        depth: DepthSet,
        options: &QueryOptions,
    ) -> RenderConfig {
        RenderConfig {
            format: self.output_format.unwrap_or(config.output.format),
            pretty: self.pretty || config.output.pretty,
            color: !self.no_color && config.output.color,
            depth,
            job_url: options.is_present("job_url"),
            test_duration: options.is_present("test_duration"),
        }
    }

    fn open_workspace(&self, config: &Config) -> Result<Arc<Mutex<WorkspaceCache>>> {
        let root = match &config.workspace.root {
            Some(root) => root.clone(),
            None => WorkspaceCache::default_root()?,
        };
        let mut workspace = WorkspaceCache::new(root)?;

        if self.clear_workspace {
            workspace.clear()?;
            info!("Cleared workspace at {}", workspace.root().display());
        }

        Ok(Arc::new(Mutex::new(workspace)))
    }

    /// Selected systems, grouped by environment.
    fn selection<'c>(
        &self,
        config: &'c Config,
    ) -> Result<Vec<(&'c EnvironmentConfig, Vec<&'c SystemConfig>)>> {
        let environments = config.select_environments(&self.envs);
        if environments.is_empty() {
            anyhow::bail!("No matching environments configured");
        }

        Ok(environments
            .into_iter()
            .map(|environment| {
                let systems = environment
                    .systems
                    .iter()
                    .filter(|system| {
                        self.systems.is_empty() || self.systems.contains(&system.name)
                    })
                    .collect();
                (environment, systems)
            })
            .collect())
    }

    async fn fetch(
        &self,
        config: &Config,
        registry: &Registry,
        depth: DepthSet,
        filters: &Filters,
        spinner: &Spinner,
    ) -> Result<Vec<Environment>> {
        let workspace = self.open_workspace(config)?;
        let mut environments = Vec::new();

        for (environment_config, systems) in self.selection(config)? {
            let mut environment = Environment {
                name: environment_config.name.clone(),
                systems: Vec::new(),
            };

            for system_config in systems {
                spinner.set_message(format!(
                    "Fetching {}/{}",
                    environment.name, system_config.name
                ));

                let hierarchy = build_hierarchy(system_config, &workspace, registry)?;
                let system = Query::new(&hierarchy, depth, filters)
                    .run(&system_config.name, system_config.kind, &config.features)
                    .await
                    .with_context(|| format!("Failed to query system '{}'", system_config.name))?;
                environment.systems.push(system);
            }

            environments.push(environment);
        }

        Ok(environments)
    }

    fn start_spinner() -> Spinner {
        if console::Term::stderr().is_term() {
            Spinner::start("Fetching CI hierarchy")
        } else {
            Spinner::hidden()
        }
    }

    fn write_output(&self, rendered: &str) -> Result<()> {
        if let Some(output_path) = &self.output {
            std::fs::write(output_path, rendered)?;
            info!("Output written to: {}", output_path.display());
        } else {
            println!("{rendered}");
        }
        Ok(())
    }

    async fn execute_query(
        &self,
        config: &Config,
        registry: &Registry,
        render: RenderConfig,
        filters: &Filters,
    ) -> Result<()> {
        let depth = render.depth;
        info!(
            "Querying with depth {:#x}, deepest level {:?}",
            depth.magnitude(),
            depth.highest()
        );

        let spinner = Self::start_spinner();
        let fetched = self.fetch(config, registry, depth, filters, &spinner).await;
        spinner.finish_and_clear();
        let environments = fetched?;

        let rendered = Renderer::new(registry, render).render(&environments)?;
        self.write_output(&rendered)
    }

    async fn collect_info(
        &self,
        config: &Config,
        registry: &Registry,
        spinner: &Spinner,
    ) -> Result<IndexMap<String, IndexMap<String, serde_json::Value>>> {
        let workspace = self.open_workspace(config)?;
        let mut report: IndexMap<String, IndexMap<String, serde_json::Value>> = IndexMap::new();

        for (environment, systems) in self.selection(config)? {
            let entry = report.entry(environment.name.clone()).or_default();
            for system in systems {
                spinner.set_message(format!("Asking {}/{}", environment.name, system.name));
                let hierarchy = build_hierarchy(system, &workspace, registry)?;
                let info = hierarchy
                    .info()
                    .await
                    .with_context(|| format!("Failed to get info for system '{}'", system.name))?;
                entry.insert(system.name.clone(), info);
            }
        }

        Ok(report)
    }

    async fn execute_info(&self, config: &Config, registry: &Registry) -> Result<()> {
        let spinner = Self::start_spinner();
        let collected = self.collect_info(config, registry, &spinner).await;
        spinner.finish_and_clear();
        let report = collected?;

        let rendered = if self.pretty || config.output.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        self.write_output(&rendered)
    }

    pub async fn execute(&self, registry: &Registry) -> Result<()> {
        if self.no_color {
            console::set_colors_enabled(false);
            console::set_colors_enabled_stderr(false);
        }

        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Query(args) => {
                let options = args.options();
                let depth = classify(&options, Some("query"), registry);
                let render = self.render_config(&config, depth, &options);
                self.execute_query(&config, registry, render, &Filters::from_options(&options))
                    .await
            }
            Commands::Features(args) => {
                let options = QueryOptions::new();
                let depth = classify(&options, Some("features"), registry);
                let render = self.render_config(&config, depth, &options);
                self.execute_query(&config, registry, render, &args.filters())
                    .await
            }
            Commands::Info => self.execute_info(&config, registry).await,
        }
    }
}
