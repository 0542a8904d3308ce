use std::collections::HashMap;

use log::debug;
use serde_json::Value;

use crate::depth::{DepthSet, QueryOptions};
use crate::error::Result;
use crate::models::EntityKind;
use crate::output::RenderConfig;
use crate::providers::RemoteHierarchy;

/// Extra level derivation contributed by a plugin.
pub type DepthDerivation = Box<dyn Fn(&QueryOptions) -> DepthSet + Send + Sync>;

/// Describes an attribute a plugin attaches to an existing entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    /// Plugin that owns the attribute; selects the sub-renderer.
    pub plugin: String,
    pub description: String,
    /// Only externally attached attributes get a plugin section.
    pub external: bool,
}

/// Renders plugin-attached values in both output modes.
pub trait ExtensionRenderer: Send + Sync {
    fn render_text(&self, value: &Value, config: &RenderConfig) -> Vec<String>;
    fn render_structured(&self, value: &Value, config: &RenderConfig) -> Value;
}

/// Builds a hierarchy backend for a source whose driver is provided by a plugin.
pub trait SourceFactory: Send + Sync {
    fn build(&self, name: &str, settings: &Value) -> Result<Box<dyn RemoteHierarchy>>;
}

/// Everything plugins contribute, built once at start-up and passed by
/// reference to the classifier, the backend factory and the renderer.
#[derive(Default)]
pub struct Registry {
    attributes: HashMap<(EntityKind, String), AttributeDescriptor>,
    renderers: HashMap<String, Box<dyn ExtensionRenderer>>,
    derivations: Vec<DepthDerivation>,
    sources: HashMap<String, Box<dyn SourceFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // Plugin entry points; the binary itself registers nothing.
    #[allow(dead_code)]
    pub fn register_attribute(
        &mut self,
        entity: EntityKind,
        attribute: &str,
        descriptor: AttributeDescriptor,
    ) {
        debug!(
            "Registering attribute '{attribute}' on {entity:?} for plugin '{}'",
            descriptor.plugin
        );
        self.attributes
            .insert((entity, attribute.to_string()), descriptor);
    }

    #[allow(dead_code)]
    pub fn register_renderer(&mut self, plugin: &str, renderer: Box<dyn ExtensionRenderer>) {
        self.renderers.insert(plugin.to_string(), renderer);
    }

    #[allow(dead_code)]
    pub fn register_depth_derivation(&mut self, derivation: DepthDerivation) {
        self.derivations.push(derivation);
    }

    #[allow(dead_code)]
    pub fn register_source(&mut self, driver: &str, factory: Box<dyn SourceFactory>) {
        self.sources.insert(driver.to_string(), factory);
    }

    pub fn attribute(&self, entity: EntityKind, attribute: &str) -> Option<&AttributeDescriptor> {
        self.attributes.get(&(entity, attribute.to_string()))
    }

    pub fn renderer(&self, plugin: &str) -> Option<&dyn ExtensionRenderer> {
        self.renderers.get(plugin).map(|boxed| &**boxed)
    }

    pub fn depth_derivations(&self) -> &[DepthDerivation] {
        &self.derivations
    }

    pub fn source(&self, driver: &str) -> Option<&dyn SourceFactory> {
        self.sources.get(driver).map(|boxed| &**boxed)
    }
}
