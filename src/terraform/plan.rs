//! Configuration loading and change planning.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{ProviderError, Result};
use crate::provider::CloudStackProvider;
use crate::schema::{Attribute, Element, Schema};
use crate::terraform::state::{StateEntry, StateFile};

/// One `resource` or `data` block of the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub block_type: String,
    pub name: String,
    pub attributes: Map<String, Value>,
}

impl Block {
    pub fn address(&self) -> String {
        format!("{}.{}", self.block_type, self.name)
    }
}

/// A parsed JSON configuration:
///
/// ```json
/// { "resource": { "cloudstack_network": { "web": { "name": "web" } } },
///   "data":     { "cloudstack_zone":    { "z1":  { "filter": [] } } } }
/// ```
///
/// Blocks keep their declaration order; apply runs in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    pub resources: Vec<Block>,
    pub data: Vec<Block>,
}

impl Configuration {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_value(serde_json::from_str(&content)?)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(root) = value else {
            return Err(ProviderError::Config(
                "configuration must be a JSON object".to_string(),
            ));
        };

        let mut config = Self::default();
        for (section, body) in root {
            let blocks = match section.as_str() {
                "resource" => &mut config.resources,
                "data" => &mut config.data,
                other => {
                    return Err(ProviderError::Config(format!(
                        "unsupported configuration section \"{}\"",
                        other
                    )));
                }
            };
            blocks.extend(parse_blocks(&section, body)?);
        }
        Ok(config)
    }
}

fn parse_blocks(section: &str, body: Value) -> Result<Vec<Block>> {
    let invalid = |what: &str| {
        ProviderError::Config(format!("\"{}\" {} must be a JSON object", section, what))
    };

    let Value::Object(types) = body else {
        return Err(invalid("section"));
    };

    let mut blocks = Vec::new();
    for (block_type, named) in types {
        let Value::Object(named) = named else {
            return Err(invalid("type entries"));
        };
        for (name, attributes) in named {
            let Value::Object(attributes) = attributes else {
                return Err(invalid("blocks"));
            };
            blocks.push(Block {
                block_type: block_type.clone(),
                name,
                attributes,
            });
        }
    }
    Ok(blocks)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    /// A ForceNew attribute changed: delete, then create.
    Replace,
    Delete,
    NoOp,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Replace => "replace",
            Action::Delete => "delete",
            Action::NoOp => "no-op",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub action: Action,
    pub resource_type: String,
    pub name: String,
    /// Id from state; empty for creates.
    pub id: String,
    /// Attributes the resource operation receives.
    pub planned: Map<String, Value>,
    /// Arguments whose value differs from state.
    pub changed: Vec<String>,
}

impl PlannedChange {
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

/// Validates one block and fills in defaults.
pub fn prepare(schema: &Schema, block: &Block) -> Result<Map<String, Value>> {
    schema.validate(&block.attributes).map_err(|errors| {
        ProviderError::validation(&block.address(), errors.join("; "))
    })?;
    let mut attributes = block.attributes.clone();
    schema.apply_defaults(&mut attributes);
    Ok(attributes)
}

/// Checks every block of the configuration, collecting all problems.
pub fn validate(config: &Configuration, provider: &CloudStackProvider) -> Vec<String> {
    let mut problems = Vec::new();
    for block in &config.resources {
        let schema = match provider.resource(&block.block_type) {
            Ok(resource) => resource.schema(),
            Err(e) => {
                problems.push(format!("{}: {}", block.address(), e));
                continue;
            }
        };
        if let Err(e) = prepare(&schema, block) {
            problems.push(e.to_string());
        }
    }
    for block in &config.data {
        let schema = match provider.data_source(&block.block_type) {
            Ok(data_source) => data_source.schema(),
            Err(e) => {
                problems.push(format!("data.{}: {}", block.address(), e));
                continue;
            }
        };
        if let Err(e) = prepare(&schema, block) {
            problems.push(e.to_string());
        }
    }
    problems
}

/// Compares the configuration with state. Deletes of objects no longer
/// configured come first, in reverse state order.
pub fn plan(
    config: &Configuration,
    state: &StateFile,
    provider: &CloudStackProvider,
) -> Result<Vec<PlannedChange>> {
    let mut changes: Vec<PlannedChange> = state
        .resources
        .iter()
        .rev()
        .filter(|entry| {
            !config
                .resources
                .iter()
                .any(|b| b.block_type == entry.resource_type && b.name == entry.name)
        })
        .map(|entry| PlannedChange {
            action: Action::Delete,
            resource_type: entry.resource_type.clone(),
            name: entry.name.clone(),
            id: entry.id.clone(),
            planned: entry.attributes.clone(),
            changed: Vec::new(),
        })
        .collect();

    for block in &config.resources {
        let schema = provider.resource(&block.block_type)?.schema();
        let desired = prepare(&schema, block)?;

        let change = match state.get(&block.block_type, &block.name) {
            None => PlannedChange {
                action: Action::Create,
                resource_type: block.block_type.clone(),
                name: block.name.clone(),
                id: String::new(),
                planned: desired,
                changed: Vec::new(),
            },
            Some(entry) => diff(&schema, entry, desired),
        };
        changes.push(change);
    }
    Ok(changes)
}

fn diff(schema: &Schema, entry: &StateEntry, desired: Map<String, Value>) -> PlannedChange {
    let mut planned = entry.attributes.clone();
    let mut changed = Vec::new();

    for (key, attr) in &schema.attributes {
        if attr.is_computed_only() {
            continue;
        }
        let wanted = desired.get(*key).filter(|v| !v.is_null());
        // Optional+computed arguments left out keep whatever CloudStack chose.
        if wanted.is_none() && attr.computed {
            continue;
        }
        let current = comparable(attr, entry.attributes.get(*key));
        if attr.values_equal(current.as_ref(), comparable(attr, wanted).as_ref()) {
            continue;
        }
        changed.push(key.to_string());
        match wanted {
            Some(value) => {
                planned.insert(key.to_string(), value.clone());
            }
            None => {
                planned.remove(*key);
            }
        }
    }

    let force_new = schema.force_new_keys();
    let action = if changed.is_empty() {
        Action::NoOp
    } else if changed
        .iter()
        .any(|k| force_new.iter().any(|f| *f == k.as_str()))
    {
        Action::Replace
    } else {
        Action::Update
    };

    // A replacement starts from the configuration alone.
    if action == Action::Replace {
        planned = desired;
    }

    PlannedChange {
        action,
        resource_type: entry.resource_type.clone(),
        name: entry.name.clone(),
        id: entry.id.clone(),
        planned,
        changed,
    }
}

/// Normalises a value for comparison: nested blocks lose their computed
/// attributes and get a stable key order.
fn comparable(attr: &Attribute, value: Option<&Value>) -> Option<Value> {
    let value = value?;
    let (Some(Element::Block(block)), Value::Array(items)) = (&attr.elem, value) else {
        return Some(value.clone());
    };
    let items = items
        .iter()
        .map(|item| match item {
            Value::Object(obj) => {
                let sorted: BTreeMap<&String, &Value> = obj
                    .iter()
                    .filter(|(k, _)| !block.get(k).is_some_and(Attribute::is_computed_only))
                    .collect();
                Value::Object(sorted.into_iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            }
            other => other.clone(),
        })
        .collect();
    Some(Value::Array(items))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn entry(resource_type: &str, name: &str, id: &str, attributes: Value) -> StateEntry {
        StateEntry {
            resource_type: resource_type.to_string(),
            name: name.to_string(),
            id: id.to_string(),
            attributes: as_map(attributes),
        }
    }

    fn network_config(display_text: &str, cidr: &str) -> Configuration {
        Configuration::from_value(json!({
            "resource": {
                "cloudstack_network": {
                    "web": {
                        "name": "web",
                        "display_text": display_text,
                        "cidr": cidr,
                        "network_offering": "DefaultIsolatedNetworkOffering",
                        "zone": "zone-1"
                    }
                }
            }
        }))
        .unwrap()
    }

    fn network_state() -> StateFile {
        let mut state = StateFile::default();
        state.upsert(entry(
            "cloudstack_network",
            "web",
            "n-1",
            json!({
                "name": "web",
                "display_text": "web tier",
                "cidr": "10.1.1.0/24",
                "network_offering": "DefaultIsolatedNetworkOffering",
                "zone": "zone-1",
                "source_nat_ip": false,
                "gateway": "10.1.1.1"
            }),
        ));
        state
    }

    #[test]
    fn test_configuration_keeps_declaration_order() {
        let config = Configuration::from_value(json!({
            "resource": {
                "cloudstack_vpc": {"main": {"name": "main"}},
                "cloudstack_network": {"b": {"name": "b"}, "a": {"name": "a"}}
            },
            "data": {"cloudstack_zone": {"z": {"filter": []}}}
        }))
        .unwrap();

        let addresses: Vec<String> = config.resources.iter().map(Block::address).collect();
        assert_eq!(
            addresses,
            ["cloudstack_vpc.main", "cloudstack_network.b", "cloudstack_network.a"]
        );
        assert_eq!(config.data[0].address(), "cloudstack_zone.z");
    }

    #[test]
    fn test_configuration_rejects_unknown_section() {
        let err = Configuration::from_value(json!({"output": {}})).unwrap_err();
        assert!(err.to_string().contains("\"output\""));
    }

    #[test]
    fn test_plan_create() {
        let provider = CloudStackProvider::new();
        let changes = plan(&network_config("web tier", "10.1.1.0/24"), &StateFile::default(), &provider)
            .unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, Action::Create);
        assert_eq!(changes[0].address(), "cloudstack_network.web");
    }

    #[test]
    fn test_plan_no_op_ignores_computed_attributes() {
        let provider = CloudStackProvider::new();
        let changes = plan(&network_config("web tier", "10.1.1.0/24"), &network_state(), &provider)
            .unwrap();
        assert_eq!(changes[0].action, Action::NoOp);
    }

    #[test]
    fn test_plan_update() {
        let provider = CloudStackProvider::new();
        let changes = plan(&network_config("frontend", "10.1.1.0/24"), &network_state(), &provider)
            .unwrap();
        assert_eq!(changes[0].action, Action::Update);
        assert_eq!(changes[0].changed, ["display_text"]);
        assert_eq!(changes[0].id, "n-1");
        assert_eq!(changes[0].planned["gateway"], json!("10.1.1.1"));
    }

    #[test]
    fn test_plan_replace_on_force_new() {
        let provider = CloudStackProvider::new();
        let changes = plan(&network_config("web tier", "10.1.2.0/24"), &network_state(), &provider)
            .unwrap();
        assert_eq!(changes[0].action, Action::Replace);
        assert!(changes[0].planned.get("gateway").is_none());
    }

    #[test]
    fn test_plan_delete_for_unconfigured_state() {
        let provider = CloudStackProvider::new();
        let mut state = network_state();
        state.upsert(entry("cloudstack_vpc", "old", "v-1", json!({"name": "old"})));

        let changes = plan(&network_config("web tier", "10.1.1.0/24"), &state, &provider).unwrap();
        assert_eq!(changes[0].action, Action::Delete);
        assert_eq!(changes[0].address(), "cloudstack_vpc.old");
        assert_eq!(changes[1].action, Action::NoOp);
    }

    #[test]
    fn test_plan_ignores_recorded_rule_ids() {
        let provider = CloudStackProvider::new();
        let mut state = StateFile::default();
        state.upsert(entry(
            "cloudstack_firewall",
            "web",
            "ip-1",
            json!({
                "ip_address_id": "ip-1",
                "managed": false,
                "rule": [{
                    "cidr_list": ["0.0.0.0/0"],
                    "protocol": "tcp",
                    "ports": ["80"],
                    "uuids": {"80": "r-1"}
                }]
            }),
        ));

        let config = |port: &str| {
            Configuration::from_value(json!({
                "resource": {
                    "cloudstack_firewall": {
                        "web": {
                            "ip_address_id": "ip-1",
                            "rule": [{"protocol": "tcp", "ports": [port], "cidr_list": ["0.0.0.0/0"]}]
                        }
                    }
                }
            }))
            .unwrap()
        };

        let changes = plan(&config("80"), &state, &provider).unwrap();
        assert_eq!(changes[0].action, Action::NoOp);

        let changes = plan(&config("443"), &state, &provider).unwrap();
        assert_eq!(changes[0].action, Action::Update);
        assert_eq!(changes[0].changed, ["rule"]);
        assert!(changes[0].planned["rule"][0].get("uuids").is_none());
    }

    #[test]
    fn test_plan_unknown_resource_type() {
        let provider = CloudStackProvider::new();
        let config = Configuration::from_value(json!({
            "resource": {"cloudstack_unicorn": {"x": {}}}
        }))
        .unwrap();
        assert!(matches!(
            plan(&config, &StateFile::default(), &provider),
            Err(ProviderError::UnknownResource(_))
        ));
    }

    #[test]
    fn test_validate_collects_all_problems() {
        let provider = CloudStackProvider::new();
        let config = Configuration::from_value(json!({
            "resource": {
                "cloudstack_network": {"web": {"name": "web", "colour": "blue"}},
                "cloudstack_unicorn": {"x": {}}
            }
        }))
        .unwrap();

        let problems = validate(&config, &provider);
        assert_eq!(problems.len(), 2);
        assert!(problems[0].contains("unsupported argument \"colour\""));
        assert!(problems[0].contains("missing required argument \"zone\""));
        assert!(problems[1].contains("cloudstack_unicorn"));
    }
}
