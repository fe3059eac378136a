//! Drives resource lifecycles against the state file.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{ProviderError, Result};
use crate::provider::CloudStackProvider;
use crate::resource::ResourceData;
use crate::schema::Schema;
use crate::terraform::plan::{self, Action, Configuration, PlannedChange};
use crate::terraform::state::{StateEntry, StateFile};

pub const SENSITIVE_MASK: &str = "(sensitive)";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub added: usize,
    pub changed: usize,
    pub destroyed: usize,
}

/// The result of reading one data source.
#[derive(Debug, Clone, PartialEq)]
pub struct DataResult {
    pub address: String,
    pub id: String,
    pub attributes: Map<String, Value>,
}

pub struct Engine<'a> {
    provider: &'a CloudStackProvider,
    state_path: PathBuf,
    state: StateFile,
}

impl<'a> Engine<'a> {
    pub fn new(provider: &'a CloudStackProvider, state_path: &Path) -> Result<Self> {
        Ok(Self {
            provider,
            state_path: state_path.to_path_buf(),
            state: StateFile::load(state_path)?,
        })
    }

    pub fn state(&self) -> &StateFile {
        &self.state
    }

    pub fn plan(&self, config: &Configuration) -> Result<Vec<PlannedChange>> {
        plan::plan(config, &self.state, self.provider)
    }

    /// Executes planned changes in order, saving state after each one.
    pub async fn apply(&mut self, changes: &[PlannedChange]) -> Result<ApplySummary> {
        let mut summary = ApplySummary::default();

        for change in changes {
            if change.action == Action::NoOp {
                continue;
            }
            tracing::info!(address = %change.address(), action = %change.action, "applying");

            match change.action {
                Action::Create => {
                    self.create(change).await?;
                    summary.added += 1;
                }
                Action::Update => {
                    self.update(change).await?;
                    summary.changed += 1;
                }
                Action::Replace => {
                    self.delete(&change.resource_type, &change.name).await?;
                    summary.destroyed += 1;
                    self.create(change).await?;
                    summary.added += 1;
                }
                Action::Delete => {
                    self.delete(&change.resource_type, &change.name).await?;
                    summary.destroyed += 1;
                }
                Action::NoOp => {}
            }
        }
        Ok(summary)
    }

    async fn create(&mut self, change: &PlannedChange) -> Result<()> {
        let provider = self.provider;
        let resource = provider.resource(&change.resource_type)?;
        let client = provider.client()?;

        let mut d = ResourceData::new(change.planned.clone());
        let result = resource.create(client, &mut d).await;

        // A failed create that already got an id still owns a real object.
        if d.is_gone() {
            result?;
            return Err(ProviderError::not_found(
                &change.resource_type,
                format!("{} (vanished right after create)", change.name),
            ));
        }
        self.record(&change.resource_type, &change.name, d)?;
        result
    }

    async fn update(&mut self, change: &PlannedChange) -> Result<()> {
        let provider = self.provider;
        let resource = provider.resource(&change.resource_type)?;
        let client = provider.client()?;
        let prior = self
            .state
            .get(&change.resource_type, &change.name)
            .map(|e| e.attributes.clone())
            .unwrap_or_default();

        let mut d = ResourceData::for_update(&change.id, prior, change.planned.clone());
        resource.update(client, &mut d).await?;

        if d.is_gone() {
            self.forget(&change.resource_type, &change.name)?;
            return Ok(());
        }
        self.record(&change.resource_type, &change.name, d)
    }

    async fn delete(&mut self, resource_type: &str, name: &str) -> Result<()> {
        let Some(entry) = self.state.get(resource_type, name).cloned() else {
            return Ok(());
        };
        let provider = self.provider;
        let resource = provider.resource(resource_type)?;
        let client = provider.client()?;

        let mut d = ResourceData::from_state(entry.id, entry.attributes);
        resource.delete(client, &mut d).await?;
        self.forget(resource_type, name)
    }

    /// Re-reads every object in state, dropping the ones that are gone.
    /// Returns the number of dropped entries.
    pub async fn refresh(&mut self) -> Result<usize> {
        let provider = self.provider;
        let client = provider.client()?;
        let mut dropped = 0;

        for entry in self.state.resources.clone() {
            let resource = provider.resource(&entry.resource_type)?;
            let mut d = ResourceData::from_state(&entry.id, entry.attributes.clone());
            resource.read(client, &mut d).await?;

            if d.is_gone() {
                self.state.remove(&entry.resource_type, &entry.name);
                dropped += 1;
            } else {
                self.state.upsert(StateEntry {
                    id: d.id().to_string(),
                    attributes: d.into_attributes(),
                    ..entry
                });
            }
        }
        self.state.save(&self.state_path)?;
        Ok(dropped)
    }

    /// Brings an existing object under management at `address`.
    pub async fn import(&mut self, address: &str, id: &str) -> Result<()> {
        let (resource_type, name) = parse_address(address)?;
        if self.state.get(resource_type, name).is_some() {
            return Err(ProviderError::Config(format!(
                "{} is already managed; remove it from state first",
                address
            )));
        }
        let provider = self.provider;
        let resource = provider.resource(resource_type)?;
        let client = provider.client()?;

        let d = resource.import(client, id).await?;
        tracing::info!(address, id = d.id(), "imported");
        self.record(resource_type, name, d)
    }

    /// Deletes every managed object, newest first.
    pub async fn destroy(&mut self) -> Result<usize> {
        let entries: Vec<(String, String)> = self
            .state
            .resources
            .iter()
            .rev()
            .map(|e| (e.resource_type.clone(), e.name.clone()))
            .collect();

        for (resource_type, name) in &entries {
            tracing::info!(address = %format!("{}.{}", resource_type, name), "destroying");
            self.delete(resource_type, name).await?;
        }
        Ok(entries.len())
    }

    fn record(&mut self, resource_type: &str, name: &str, d: ResourceData) -> Result<()> {
        self.state.upsert(StateEntry {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            id: d.id().to_string(),
            attributes: d.into_attributes(),
        });
        self.state.save(&self.state_path)
    }

    fn forget(&mut self, resource_type: &str, name: &str) -> Result<()> {
        self.state.remove(resource_type, name);
        self.state.save(&self.state_path)
    }
}

/// Reads every data block of the configuration. Results are not stored in
/// state.
pub async fn read_data(
    provider: &CloudStackProvider,
    config: &Configuration,
) -> Result<Vec<DataResult>> {
    let client = provider.client()?;
    let mut results = Vec::new();

    for block in &config.data {
        let data_source = provider.data_source(&block.block_type)?;
        let schema = data_source.schema();
        let mut d = ResourceData::new(plan::prepare(&schema, block)?);
        data_source.read(client, &mut d).await?;
        tracing::debug!(address = %block.address(), id = d.id(), "data source read");

        results.push(DataResult {
            address: format!("data.{}", block.address()),
            id: d.id().to_string(),
            attributes: mask_sensitive(&schema, d.attributes()),
        });
    }
    Ok(results)
}

/// Splits `cloudstack_network.web` into type and name.
pub fn parse_address(address: &str) -> Result<(&str, &str)> {
    match address.split_once('.') {
        Some((resource_type, name)) if !resource_type.is_empty() && !name.is_empty() => {
            Ok((resource_type, name))
        }
        _ => Err(ProviderError::Config(format!(
            "invalid resource address \"{}\", expected <type>.<name>",
            address
        ))),
    }
}

/// Copies `attributes` with every sensitive value replaced for display.
pub fn mask_sensitive(schema: &Schema, attributes: &Map<String, Value>) -> Map<String, Value> {
    attributes
        .iter()
        .map(|(k, v)| {
            let shown = if schema.is_sensitive(k) && !v.is_null() {
                Value::String(SENSITIVE_MASK.to_string())
            } else {
                v.clone()
            };
            (k.clone(), shown)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use serde_json::json;

    #[test]
    fn test_parse_address() {
        assert_eq!(
            parse_address("cloudstack_network.web").unwrap(),
            ("cloudstack_network", "web")
        );
        assert!(parse_address("cloudstack_network").is_err());
        assert!(parse_address(".web").is_err());
        assert!(parse_address("cloudstack_network.").is_err());
    }

    #[test]
    fn test_mask_sensitive() {
        let schema = Schema::new()
            .attr("name", Attribute::required_string())
            .attr("private_key", Attribute::computed_string().sensitive());
        let attributes = match json!({"name": "deploy", "private_key": "-----BEGIN"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };

        let masked = mask_sensitive(&schema, &attributes);
        assert_eq!(masked["name"], json!("deploy"));
        assert_eq!(masked["private_key"], json!(SENSITIVE_MASK));
    }

    #[tokio::test]
    async fn test_plan_against_empty_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CloudStackProvider::new();
        let engine = Engine::new(&provider, &dir.path().join("state.json")).unwrap();

        let config = Configuration::from_value(json!({
            "resource": {"cloudstack_ssh_keypair": {"deploy": {"name": "deploy"}}}
        }))
        .unwrap();
        let changes = engine.plan(&config).unwrap();
        assert_eq!(changes[0].action, Action::Create);
    }

    #[tokio::test]
    async fn test_apply_requires_configured_provider() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CloudStackProvider::new();
        let mut engine = Engine::new(&provider, &dir.path().join("state.json")).unwrap();

        let config = Configuration::from_value(json!({
            "resource": {"cloudstack_ssh_keypair": {"deploy": {"name": "deploy"}}}
        }))
        .unwrap();
        let changes = engine.plan(&config).unwrap();
        let err = engine.apply(&changes).await.unwrap_err();
        assert!(matches!(err, ProviderError::Config(_)));
    }

    #[tokio::test]
    async fn test_import_rejects_managed_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut state = StateFile::default();
        state.upsert(StateEntry {
            resource_type: "cloudstack_vpc".to_string(),
            name: "main".to_string(),
            id: "v-1".to_string(),
            attributes: Map::new(),
        });
        state.save(&path).unwrap();

        let provider = CloudStackProvider::new();
        let mut engine = Engine::new(&provider, &path).unwrap();
        let err = engine.import("cloudstack_vpc.main", "v-2").await.unwrap_err();
        assert!(err.to_string().contains("already managed"));
    }
}
