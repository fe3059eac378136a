//! Resource attribute bags and the on-disk state file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Typed read access to an attribute map.
///
/// Mirrors the zero-value conventions of Terraform's SDK: `get_*` return the
/// zero value for missing attributes, `get_opt_*` return `None` for missing,
/// null or zero values.
pub trait AttributeReader {
    fn raw(&self, key: &str) -> Option<&Value>;

    fn get_str(&self, key: &str) -> &str {
        self.raw(key).and_then(Value::as_str).unwrap_or("")
    }

    fn get_opt_str(&self, key: &str) -> Option<&str> {
        let value = self.get_str(key);
        (!value.is_empty()).then_some(value)
    }

    fn get_bool(&self, key: &str) -> bool {
        self.raw(key).and_then(Value::as_bool).unwrap_or(false)
    }

    fn get_opt_bool(&self, key: &str) -> Option<bool> {
        self.raw(key).and_then(Value::as_bool)
    }

    fn get_int(&self, key: &str) -> i64 {
        self.raw(key).and_then(Value::as_i64).unwrap_or(0)
    }

    fn get_opt_int(&self, key: &str) -> Option<i64> {
        self.raw(key).and_then(Value::as_i64).filter(|v| *v != 0)
    }

    fn get_string_list(&self, key: &str) -> Vec<String> {
        match self.raw(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    fn get_string_map(&self, key: &str) -> BTreeMap<String, String> {
        match self.raw(key) {
            Some(Value::Object(map)) => map
                .iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect(),
            _ => BTreeMap::new(),
        }
    }

    fn get_blocks(&self, key: &str) -> Vec<Map<String, Value>> {
        match self.raw(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_object().cloned())
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl AttributeReader for Map<String, Value> {
    fn raw(&self, key: &str) -> Option<&Value> {
        self.get(key)
    }
}

/// The attribute bag a resource operation works on.
///
/// `attributes` holds the desired (or freshly read) values, `prior` the
/// values recorded in state before the operation started.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceData {
    id: String,
    attributes: Map<String, Value>,
    prior: Map<String, Value>,
}

impl ResourceData {
    /// Data for a create: there is no prior state.
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self {
            id: String::new(),
            attributes,
            prior: Map::new(),
        }
    }

    /// Data for a read or delete of an existing object.
    pub fn from_state(id: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            prior: attributes.clone(),
            attributes,
        }
    }

    /// Data for an update: `attributes` are the planned values.
    pub fn for_update(
        id: impl Into<String>,
        prior: Map<String, Value>,
        attributes: Map<String, Value>,
    ) -> Self {
        Self {
            id: id.into(),
            attributes,
            prior,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Marks the object as gone; the engine then drops it from state.
    pub fn clear_id(&mut self) {
        self.id.clear();
    }

    pub fn is_gone(&self) -> bool {
        self.id.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn prior(&self, key: &str) -> Option<&Value> {
        self.prior.get(key)
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.attributes.insert(key.to_string(), value.into());
    }

    pub fn set_string_map(&mut self, key: &str, map: &BTreeMap<String, String>) {
        let object: Map<String, Value> = map
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        self.set(key, Value::Object(object));
    }

    pub fn has_change(&self, key: &str) -> bool {
        !loosely_equal(self.prior.get(key), self.attributes.get(key))
    }

    /// Returns `(old, new)` for `key`, with missing values as `Null`.
    pub fn change(&self, key: &str) -> (Value, Value) {
        (
            self.prior.get(key).cloned().unwrap_or(Value::Null),
            self.attributes.get(key).cloned().unwrap_or(Value::Null),
        )
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn into_attributes(self) -> Map<String, Value> {
        self.attributes
    }
}

impl AttributeReader for ResourceData {
    fn raw(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

fn loosely_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    let empty = |v: &&Value| match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    };
    match (a.filter(|v| !empty(v)), b.filter(|v| !empty(v))) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// One managed object recorded in the state file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub id: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl StateEntry {
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

/// JSON state file: the last known attributes of every managed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateFile {
    pub version: u32,
    #[serde(default)]
    pub resources: Vec<StateEntry>,
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: Self::VERSION,
            resources: Vec::new(),
        }
    }
}

impl StateFile {
    pub const VERSION: u32 = 1;

    /// Loads the state file; a missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes through a temporary sibling so a crash never leaves a
    /// truncated state file behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn get(&self, resource_type: &str, name: &str) -> Option<&StateEntry> {
        self.resources
            .iter()
            .find(|e| e.resource_type == resource_type && e.name == name)
    }

    pub fn upsert(&mut self, entry: StateEntry) {
        match self
            .resources
            .iter_mut()
            .find(|e| e.resource_type == entry.resource_type && e.name == entry.name)
        {
            Some(existing) => *existing = entry,
            None => self.resources.push(entry),
        }
    }

    pub fn remove(&mut self, resource_type: &str, name: &str) -> Option<StateEntry> {
        let index = self
            .resources
            .iter()
            .position(|e| e.resource_type == resource_type && e.name == name)?;
        Some(self.resources.remove(index))
    }
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

    #[test]
    fn test_getters_zero_values() {
        let d = ResourceData::new(as_map(json!({"name": "", "size": 0})));
        assert_eq!(d.get_str("name"), "");
        assert_eq!(d.get_opt_str("name"), None);
        assert_eq!(d.get_str("missing"), "");
        assert_eq!(d.get_int("size"), 0);
        assert_eq!(d.get_opt_int("size"), None);
        assert!(!d.get_bool("expunge"));
        assert_eq!(d.get_opt_bool("expunge"), None);
    }

    #[test]
    fn test_getters_collections() {
        let d = ResourceData::new(as_map(json!({
            "cidr_list": ["10.0.0.0/8", "192.168.0.0/16"],
            "tags": {"env": "prod"},
            "rule": [{"protocol": "tcp"}]
        })));
        assert_eq!(d.get_string_list("cidr_list").len(), 2);
        assert_eq!(d.get_string_map("tags").get("env"), Some(&"prod".to_string()));
        assert_eq!(d.get_blocks("rule")[0].get_str("protocol"), "tcp");
    }

    #[test]
    fn test_has_change() {
        let prior = as_map(json!({"name": "old", "display_text": "", "tags": {}}));
        let planned = as_map(json!({"name": "new", "tags": {}}));
        let d = ResourceData::for_update("id-1", prior, planned);

        assert!(d.has_change("name"));
        assert!(!d.has_change("display_text"));
        assert!(!d.has_change("tags"));
        assert_eq!(d.change("name"), (json!("old"), json!("new")));
    }

    #[test]
    fn test_from_state_has_no_changes() {
        let d = ResourceData::from_state("id-1", as_map(json!({"name": "web"})));
        assert_eq!(d.id(), "id-1");
        assert!(!d.has_change("name"));
    }

    #[test]
    fn test_clear_id_marks_gone() {
        let mut d = ResourceData::from_state("id-1", Map::new());
        assert!(!d.is_gone());
        d.clear_id();
        assert!(d.is_gone());
    }

    #[test]
    fn test_state_file_upsert_and_remove() {
        let mut state = StateFile::default();
        let entry = StateEntry {
            resource_type: "cloudstack_network".to_string(),
            name: "web".to_string(),
            id: "n1".to_string(),
            attributes: Map::new(),
        };
        state.upsert(entry.clone());
        state.upsert(StateEntry {
            id: "n2".to_string(),
            ..entry
        });

        assert_eq!(state.resources.len(), 1);
        assert_eq!(state.get("cloudstack_network", "web").unwrap().id, "n2");
        assert!(state.remove("cloudstack_network", "web").is_some());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_state_file_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cloudstack.tfstate.json");

        let missing = StateFile::load(&path).unwrap();
        assert_eq!(missing.version, StateFile::VERSION);
        assert!(missing.resources.is_empty());

        let mut state = StateFile::default();
        state.upsert(StateEntry {
            resource_type: "cloudstack_vpc".to_string(),
            name: "main".to_string(),
            id: "v1".to_string(),
            attributes: as_map(json!({"cidr": "10.0.0.0/16"})),
        });
        state.save(&path).unwrap();

        let loaded = StateFile::load(&path).unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.resources[0].address(), "cloudstack_vpc.main");
    }
}
