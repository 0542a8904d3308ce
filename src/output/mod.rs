mod progress;
pub mod render;
mod styling;

pub use progress::Spinner;
pub use render::Renderer;
use styling::{subtle, title};

use crate::config::OutputFormat;
use crate::depth::DepthSet;

/// Settings shared by the walker, both emitters and plugin sub-renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderConfig {
    pub format: OutputFormat,
    pub pretty: bool,
    pub color: bool,
    pub depth: DepthSet,
    /// Show job URLs.
    pub job_url: bool,
    /// Show test durations.
    pub test_duration: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            pretty: false,
            color: true,
            depth: DepthSet::empty(),
            job_url: false,
            test_duration: false,
        }
    }
}

/// Prints the `citree` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        title("🌲 citree"),
        subtle(env!("CARGO_PKG_VERSION")),
        subtle("CI hierarchy explorer")
    );
}
