//! Configuration parsing and validation.
//!
//! Configuration is structured data validated in two stages: against the
//! embedded JSON Schema, then semantically. Both stages run at load time;
//! a config that parses is safe to run with.

mod parser;
mod schema;

pub use parser::{Config, ConfigError, EvaluationConfig, PipelineConfig};
pub use schema::{is_valid_config, validate_config_schema};
