// Process/CLI configuration, distinct from a WorkflowDefinition's own
// engine-level Configuration (see workflow::definition::Configuration).

use serde::Deserialize;

use crate::error::Result;

/// Where the CLI looks for definition files, the default log level, and
/// any other process-wide setting. Layered: built-in defaults, then an
/// optional `workflow.toml`/`config/*.toml`, then `WORKFLOW_` env vars,
/// then a local `.env` file loaded via `dotenv`.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_definitions_dir")]
    pub definitions_dir: String,
    #[serde(default)]
    pub verbose: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_definitions_dir() -> String {
    "./definitions".to_string()
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            definitions_dir: default_definitions_dir(),
            verbose: false,
        }
    }
}

impl RuntimeConfig {
    /// Loads `.env` (if present), then layers `config/default.toml` (if
    /// present) under `WORKFLOW_*` environment overrides.
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let builder = config::Config::builder()
            .set_default("log_level", default_log_level())?
            .set_default("definitions_dir", default_definitions_dir())?
            .set_default("verbose", false)?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("WORKFLOW"));

        let settings = builder.build()?;
        Ok(settings.try_deserialize()?)
    }
}
