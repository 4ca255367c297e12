// mod.rs - Shared command context: resolved paths, output mode, schema loading.

pub mod initiative;
pub mod workitems;

use anyhow::Context as _;
use flow_initiative::{EventDispatcher, FlowConfig, InitiativeStore, ProjectConfig};
use flow_schema::{Schema, SchemaLoader};
use serde::Serialize;

pub struct Context {
    pub config: FlowConfig,
    pub json: bool,
}

impl Context {
    pub fn new(config: FlowConfig, json: bool) -> Self {
        Self { config, json }
    }

    pub fn store(&self) -> InitiativeStore {
        InitiativeStore::new(&self.config.initiatives_dir)
    }

    /// Load the schema named in `openspec/config.yaml` (default `initiative-flow`).
    pub fn load_schema(&self) -> anyhow::Result<Schema> {
        let project = ProjectConfig::load(&self.config.config_file)?;
        SchemaLoader::new(&self.config.schemas_dir)
            .load(&project.schema)
            .with_context(|| format!("loading schema '{}'", project.schema))
    }

    /// Dispatcher that appends lifecycle events to the project event log.
    pub fn dispatcher(&self) -> EventDispatcher {
        EventDispatcher::with_log(&self.config.events_log)
    }

    /// Fail with a readable message when the initiative has no state file.
    pub fn require_initiative(&self, store: &InitiativeStore, id: &str) -> anyhow::Result<()> {
        if !store.exists(id) {
            anyhow::bail!(
                "Initiative '{}' not found in {}",
                id,
                self.config.initiatives_dir.display()
            );
        }
        Ok(())
    }

    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
