//! Attribute schemas for resources and data sources.
//!
//! Each resource declares its arguments once; the same declaration drives
//! config validation, default values, replacement detection during planning,
//! and the JSON schema document printed by the CLI.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Bool,
    Int,
    List,
    Set,
    Map,
}

/// Element type of a list or set attribute.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Element {
    Type(AttributeType),
    Block(Schema),
}

#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub computed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub force_new: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elem: Option<Element>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<&'static str>,
}

impl Attribute {
    pub fn new(attr_type: AttributeType) -> Self {
        Self {
            attr_type,
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            default: None,
            elem: None,
            conflicts_with: Vec::new(),
        }
    }

    fn required_of(attr_type: AttributeType) -> Self {
        Self {
            required: true,
            ..Self::new(attr_type)
        }
    }

    fn optional_of(attr_type: AttributeType) -> Self {
        Self {
            optional: true,
            ..Self::new(attr_type)
        }
    }

    fn computed_of(attr_type: AttributeType) -> Self {
        Self {
            computed: true,
            ..Self::new(attr_type)
        }
    }

    pub fn required_string() -> Self {
        Self::required_of(AttributeType::String)
    }

    pub fn optional_string() -> Self {
        Self::optional_of(AttributeType::String)
    }

    pub fn computed_string() -> Self {
        Self::computed_of(AttributeType::String)
    }

    pub fn required_int() -> Self {
        Self::required_of(AttributeType::Int)
    }

    pub fn optional_int() -> Self {
        Self::optional_of(AttributeType::Int)
    }

    pub fn computed_int() -> Self {
        Self::computed_of(AttributeType::Int)
    }

    pub fn required_bool() -> Self {
        Self::required_of(AttributeType::Bool)
    }

    pub fn optional_bool() -> Self {
        Self::optional_of(AttributeType::Bool)
    }

    pub fn computed_bool() -> Self {
        Self::computed_of(AttributeType::Bool)
    }

    pub fn optional_map() -> Self {
        Self::optional_of(AttributeType::Map)
    }

    pub fn computed_map() -> Self {
        Self::computed_of(AttributeType::Map)
    }

    pub fn required_string_set() -> Self {
        Self::required_of(AttributeType::Set).elem(AttributeType::String)
    }

    pub fn optional_string_set() -> Self {
        Self::optional_of(AttributeType::Set).elem(AttributeType::String)
    }

    pub fn optional_string_list() -> Self {
        Self::optional_of(AttributeType::List).elem(AttributeType::String)
    }

    pub fn computed_string_list() -> Self {
        Self::computed_of(AttributeType::List).elem(AttributeType::String)
    }

    pub fn required_block_set(block: Schema) -> Self {
        Self::required_of(AttributeType::Set).elem_block(block)
    }

    pub fn optional_block_set(block: Schema) -> Self {
        Self::optional_of(AttributeType::Set).elem_block(block)
    }

    pub fn optional_block_list(block: Schema) -> Self {
        Self::optional_of(AttributeType::List).elem_block(block)
    }

    pub fn computed_block_list(block: Schema) -> Self {
        Self::computed_of(AttributeType::List).elem_block(block)
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Optional attributes that CloudStack fills in when left unset.
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn elem(mut self, elem: AttributeType) -> Self {
        self.elem = Some(Element::Type(elem));
        self
    }

    pub fn elem_block(mut self, block: Schema) -> Self {
        self.elem = Some(Element::Block(block));
        self
    }

    pub fn conflicts_with(mut self, keys: &[&'static str]) -> Self {
        self.conflicts_with.extend_from_slice(keys);
        self
    }

    /// Attributes only CloudStack can set.
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }

    /// Compares two values the way planning does: unset, null and empty
    /// values are equal, and sets ignore ordering.
    pub fn values_equal(&self, a: Option<&Value>, b: Option<&Value>) -> bool {
        let a = a.filter(|v| !is_empty(v));
        let b = b.filter(|v| !is_empty(v));
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => match (self.attr_type, a, b) {
                (AttributeType::Set, Value::Array(x), Value::Array(y)) => {
                    let mut x: Vec<String> = x.iter().map(Value::to_string).collect();
                    let mut y: Vec<String> = y.iter().map(Value::to_string).collect();
                    x.sort();
                    y.sort();
                    x == y
                }
                (AttributeType::Int, a, b) => a.as_i64().is_some() && a.as_i64() == b.as_i64(),
                _ => a == b,
            },
            _ => false,
        }
    }

    fn check_value(&self, path: &str, value: &Value, errors: &mut Vec<String>) {
        if value.is_null() {
            return;
        }
        match self.attr_type {
            AttributeType::String | AttributeType::Bool | AttributeType::Int => {
                check_scalar(self.attr_type, path, value, errors)
            }
            AttributeType::Map => match value {
                Value::Object(map) => {
                    for (k, v) in map {
                        if !v.is_string() {
                            errors.push(format!("{}.{}: expected a string", path, k));
                        }
                    }
                }
                _ => errors.push(format!("{}: expected a map", path)),
            },
            AttributeType::List | AttributeType::Set => {
                let Value::Array(items) = value else {
                    errors.push(format!("{}: expected a list", path));
                    return;
                };
                for (i, item) in items.iter().enumerate() {
                    let item_path = format!("{}.{}", path, i);
                    match &self.elem {
                        Some(Element::Type(t)) => check_scalar(*t, &item_path, item, errors),
                        Some(Element::Block(block)) => match item {
                            Value::Object(obj) => block.validate_into(&item_path, obj, errors),
                            _ => errors.push(format!("{}: expected a block", item_path)),
                        },
                        None => {}
                    }
                }
            }
        }
    }
}

fn check_scalar(attr_type: AttributeType, path: &str, value: &Value, errors: &mut Vec<String>) {
    let ok = match attr_type {
        AttributeType::String => value.is_string(),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::Int => value.is_i64() || value.is_u64(),
        _ => true,
    };
    if !ok {
        errors.push(format!("{}: expected {:?}", path, attr_type).to_lowercase());
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Schema {
    pub attributes: BTreeMap<&'static str, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &'static str, attr: Attribute) -> Self {
        self.attributes.insert(name, attr);
        self
    }

    /// `tags`: user tags synchronised through createTags / deleteTags.
    pub fn with_tags(self) -> Self {
        self.attr("tags", Attribute::optional_map().computed())
    }

    /// `project`: name or id of the owning project.
    pub fn with_project(self) -> Self {
        self.attr("project", Attribute::optional_string().computed().force_new())
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn force_new_keys(&self) -> Vec<&'static str> {
        self.attributes
            .iter()
            .filter(|(_, a)| a.force_new)
            .map(|(k, _)| *k)
            .collect()
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.get(key).map(|a| a.sensitive).unwrap_or(false)
    }

    /// Checks a configuration block, returning every problem found.
    pub fn validate(&self, config: &Map<String, Value>) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        self.validate_into("", config, &mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_into(&self, prefix: &str, config: &Map<String, Value>, errors: &mut Vec<String>) {
        let path = |key: &str| {
            if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", prefix, key)
            }
        };

        for (key, value) in config {
            match self.get(key) {
                None => errors.push(format!("unsupported argument \"{}\"", path(key))),
                Some(attr) if attr.is_computed_only() => {
                    if !value.is_null() {
                        errors.push(format!("cannot set computed attribute \"{}\"", path(key)))
                    }
                }
                Some(attr) => attr.check_value(&path(key), value, errors),
            }
        }

        for (key, attr) in &self.attributes {
            let present = config.get(*key).map(|v| !v.is_null()).unwrap_or(false);
            if attr.required && !present {
                errors.push(format!("missing required argument \"{}\"", path(key)));
            }
            if present {
                for other in &attr.conflicts_with {
                    if config.get(*other).map(|v| !v.is_null()).unwrap_or(false) {
                        errors.push(format!(
                            "\"{}\" conflicts with \"{}\"",
                            path(key),
                            path(other)
                        ));
                    }
                }
            }
        }
    }

    /// Fills in declared defaults, including inside nested blocks.
    pub fn apply_defaults(&self, config: &mut Map<String, Value>) {
        for (key, attr) in &self.attributes {
            if let Some(default) = &attr.default {
                let missing = config.get(*key).map(Value::is_null).unwrap_or(true);
                if missing {
                    config.insert(key.to_string(), default.clone());
                }
            }
            if let (Some(Element::Block(block)), Some(Value::Array(items))) =
                (&attr.elem, config.get_mut(*key))
            {
                for item in items.iter_mut() {
                    if let Value::Object(obj) = item {
                        block.apply_defaults(obj);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn network_schema() -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("zone", Attribute::required_string().force_new())
            .attr("cidr", Attribute::optional_string().force_new())
            .attr("vpc_id", Attribute::optional_string().force_new())
            .attr("acl_id", Attribute::optional_string().conflicts_with(&["aclid"]))
            .attr("aclid", Attribute::optional_string())
            .attr("display_text", Attribute::optional_string().computed())
            .attr("source_nat_ip", Attribute::optional_bool().default(false))
            .attr("gateway", Attribute::computed_string())
            .with_tags()
    }

    fn as_map(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_validate_accepts_valid_config() {
        let config = as_map(json!({"name": "web", "zone": "zone-1", "tags": {"env": "prod"}}));
        assert!(network_schema().validate(&config).is_ok());
    }

    #[test]
    fn test_validate_reports_missing_required() {
        let config = as_map(json!({"name": "web"}));
        let errors = network_schema().validate(&config).unwrap_err();
        assert_eq!(errors, vec!["missing required argument \"zone\"".to_string()]);
    }

    #[test]
    fn test_validate_rejects_unknown_and_computed() {
        let config = as_map(json!({"name": "web", "zone": "z", "bogus": 1, "gateway": "10.0.0.1"}));
        let errors = network_schema().validate(&config).unwrap_err();
        assert!(errors.contains(&"unsupported argument \"bogus\"".to_string()));
        assert!(errors.contains(&"cannot set computed attribute \"gateway\"".to_string()));
    }

    #[test]
    fn test_validate_type_mismatch() {
        let config = as_map(json!({"name": 5, "zone": "z", "source_nat_ip": "yes"}));
        let errors = network_schema().validate(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.starts_with("name:")));
        assert!(errors.iter().any(|e| e.starts_with("source_nat_ip:")));
    }

    #[test]
    fn test_validate_conflicts() {
        let config = as_map(json!({"name": "n", "zone": "z", "acl_id": "a", "aclid": "b"}));
        let errors = network_schema().validate(&config).unwrap_err();
        assert_eq!(errors, vec!["\"acl_id\" conflicts with \"aclid\"".to_string()]);
    }

    #[test]
    fn test_validate_nested_blocks() {
        let rule = Schema::new()
            .attr("protocol", Attribute::required_string())
            .attr("ports", Attribute::optional_string_set());
        let schema = Schema::new().attr("rule", Attribute::optional_block_set(rule));

        let config = as_map(json!({"rule": [{"ports": ["80"]}, {"protocol": "tcp", "ports": [80]}]}));
        let errors = schema.validate(&config).unwrap_err();
        assert!(errors.contains(&"missing required argument \"rule.0.protocol\"".to_string()));
        assert!(errors.contains(&"rule.1.ports.0: expected string".to_string()));
    }

    #[test]
    fn test_apply_defaults() {
        let rule = Schema::new().attr("action", Attribute::optional_string().default("allow"));
        let schema = network_schema().attr("rule", Attribute::optional_block_set(rule));

        let mut config = as_map(json!({"name": "n", "zone": "z", "rule": [{}]}));
        schema.apply_defaults(&mut config);

        assert_eq!(config["source_nat_ip"], json!(false));
        assert_eq!(config["rule"][0]["action"], json!("allow"));
    }

    #[test]
    fn test_force_new_keys() {
        let keys = network_schema().force_new_keys();
        assert_eq!(keys, vec!["cidr", "vpc_id", "zone"]);
    }

    #[test]
    fn test_values_equal_treats_empty_as_unset() {
        let attr = Attribute::optional_string();
        assert!(attr.values_equal(None, Some(&json!(""))));
        assert!(attr.values_equal(Some(&Value::Null), None));
        assert!(!attr.values_equal(Some(&json!("a")), None));
    }

    #[test]
    fn test_values_equal_sets_ignore_order() {
        let attr = Attribute::optional_string_set();
        assert!(attr.values_equal(Some(&json!(["a", "b"])), Some(&json!(["b", "a"]))));
        assert!(!attr.values_equal(Some(&json!(["a"])), Some(&json!(["b", "a"]))));

        let list = Attribute::optional_string_list();
        assert!(!list.values_equal(Some(&json!(["a", "b"])), Some(&json!(["b", "a"]))));
    }

    #[test]
    fn test_schema_serializes_flags() {
        let schema = Schema::new().attr("zone", Attribute::required_string().force_new());
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["zone"]["type"], "string");
        assert_eq!(json["zone"]["required"], true);
        assert_eq!(json["zone"]["force_new"], true);
        assert!(json["zone"].get("computed").is_none());
    }
}
