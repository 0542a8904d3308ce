mod parser;
mod provider;
mod schema;

pub use provider::GitHierarchy;
