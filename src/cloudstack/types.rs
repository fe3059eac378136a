use std::collections::BTreeMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::CloudStackError;

/// Page size used when walking `list*` commands.
pub const DEFAULT_PAGE_SIZE: u32 = 500;

/// Query parameters for a single API command, kept sorted so the request
/// signature is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(BTreeMap<String, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl ToString) -> &mut Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    pub fn set_opt<V: ToString>(&mut self, key: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.set(key, value);
        }
        self
    }

    /// Sets `key` only for non-empty strings, mirroring how unset optional
    /// attributes are left out of the request.
    pub fn set_nonempty(&mut self, key: &str, value: &str) -> &mut Self {
        if !value.is_empty() {
            self.set(key, value);
        }
        self
    }

    pub fn set_list<S: AsRef<str>>(&mut self, key: &str, values: &[S]) -> &mut Self {
        if !values.is_empty() {
            let joined = values
                .iter()
                .map(|v| v.as_ref())
                .collect::<Vec<_>>()
                .join(",");
            self.set(key, joined);
        }
        self
    }

    /// `tags[0].key=k&tags[0].value=v` style maps.
    pub fn set_key_value_map(&mut self, key: &str, map: &BTreeMap<String, String>) -> &mut Self {
        for (i, (k, v)) in map.iter().enumerate() {
            self.set(&format!("{}[{}].key", key, i), k);
            self.set(&format!("{}[{}].value", key, i), v);
        }
        self
    }

    /// `details[0].cpuNumber=2` style maps.
    pub fn set_details(&mut self, key: &str, map: &BTreeMap<String, String>) -> &mut Self {
        for (i, (k, v)) in map.iter().enumerate() {
            self.set(&format!("{}[{}].{}", key, i, k), v);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Params {
    fn from(pairs: [(K, V); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// CloudStack ids are UUIDs; anything else is treated as a name.
pub fn is_id(value: &str) -> bool {
    uuid::Uuid::parse_str(value).is_ok()
}

/// Strips the `{"<command>response": {...}}` envelope and turns embedded
/// `errorcode` / `errortext` pairs into [`CloudStackError::Api`].
pub fn unwrap_envelope(
    command: &str,
    body: serde_json::Value,
) -> Result<serde_json::Value, CloudStackError> {
    let serde_json::Value::Object(mut outer) = body else {
        return Err(CloudStackError::InvalidResponse {
            command: command.to_string(),
            message: "expected a JSON object".to_string(),
        });
    };

    let expected = format!("{}response", command.to_lowercase());
    let inner = match outer.remove(&expected) {
        Some(inner) => inner,
        None if outer.len() == 1 => outer
            .into_iter()
            .next()
            .map(|(_, v)| v)
            .unwrap_or(serde_json::Value::Null),
        None => {
            return Err(CloudStackError::InvalidResponse {
                command: command.to_string(),
                message: format!("missing '{}' in response", expected),
            });
        }
    };

    if let Some(code) = inner.get("errorcode").and_then(|c| c.as_u64()) {
        let message = inner
            .get("errortext")
            .and_then(|t| t.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        return Err(CloudStackError::Api {
            code: code as u16,
            message,
        });
    }

    Ok(inner)
}

/// Deserializes `value[key]`, e.g. the `network` object of a
/// `createNetwork` response or the `virtualmachine` of a job result.
pub fn extract<T: DeserializeOwned>(
    command: &str,
    value: &serde_json::Value,
    key: &str,
) -> Result<T, CloudStackError> {
    let field = value
        .get(key)
        .cloned()
        .ok_or_else(|| CloudStackError::InvalidResponse {
            command: command.to_string(),
            message: format!("missing '{}' in response", key),
        })?;
    serde_json::from_value(field).map_err(|e| CloudStackError::InvalidResponse {
        command: command.to_string(),
        message: format!("failed to parse '{}': {}", key, e),
    })
}

/// Returns the `id` field of a create response, wherever CloudStack put it.
pub fn extract_id(
    command: &str,
    value: &serde_json::Value,
    key: &str,
) -> Result<String, CloudStackError> {
    value
        .get(key)
        .and_then(|v| v.get("id"))
        .or_else(|| value.get("id"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| CloudStackError::InvalidResponse {
            command: command.to_string(),
            message: format!("missing '{}.id' in response", key),
        })
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

pub fn tags_to_map(tags: &[Tag]) -> BTreeMap<String, String> {
    tags.iter()
        .map(|t| (t.key.clone(), t.value.clone()))
        .collect()
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Nic {
    pub id: String,
    pub networkid: String,
    pub ipaddress: String,
    pub isdefault: bool,
    pub macaddress: String,
    pub secondaryip: Vec<SecondaryIp>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecondaryIp {
    pub id: String,
    pub ipaddress: String,
}

#[derive(Debug, Deserialize)]
pub struct AsyncJobStatus {
    pub jobstatus: u8,
    #[serde(default)]
    pub jobresult: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_params_skip_empty_values() {
        let mut params = Params::new();
        params
            .set_nonempty("name", "")
            .set_opt::<String>("displaytext", None)
            .set_list::<&str>("ids", &[]);
        assert!(params.is_empty());
    }

    #[test]
    fn test_params_list_is_comma_joined() {
        let mut params = Params::new();
        params.set_list("cidrlist", &["10.0.0.0/8", "192.168.0.0/16"]);
        assert_eq!(params.get("cidrlist"), Some("10.0.0.0/8,192.168.0.0/16"));
    }

    #[test]
    fn test_params_key_value_map() {
        let mut map = BTreeMap::new();
        map.insert("env".to_string(), "prod".to_string());
        map.insert("app".to_string(), "web".to_string());

        let mut params = Params::new();
        params.set_key_value_map("tags", &map);

        assert_eq!(params.get("tags[0].key"), Some("app"));
        assert_eq!(params.get("tags[0].value"), Some("web"));
        assert_eq!(params.get("tags[1].key"), Some("env"));
        assert_eq!(params.get("tags[1].value"), Some("prod"));
    }

    #[test]
    fn test_params_details_map() {
        let mut map = BTreeMap::new();
        map.insert("cpuNumber".to_string(), "2".to_string());

        let mut params = Params::new();
        params.set_details("details", &map);

        assert_eq!(params.get("details[0].cpuNumber"), Some("2"));
    }

    #[test]
    fn test_is_id() {
        assert!(is_id("5d7e1b5c-6c3b-4d1e-8a4a-0c2b1d9e0f11"));
        assert!(!is_id("Small Instance"));
        assert!(!is_id(""));
    }

    #[test]
    fn test_unwrap_envelope_success() {
        let body = json!({"listzonesresponse": {"count": 1, "zone": [{"id": "z1"}]}});
        let inner = unwrap_envelope("listZones", body).unwrap();
        assert_eq!(inner["count"], 1);
    }

    #[test]
    fn test_unwrap_envelope_error() {
        let body = json!({"createnetworkresponse": {
            "uuidList": [],
            "errorcode": 431,
            "cserrorcode": 4350,
            "errortext": "Unable to find network offering"
        }});
        let err = unwrap_envelope("createNetwork", body).unwrap_err();
        match err {
            CloudStackError::Api { code, message } => {
                assert_eq!(code, 431);
                assert_eq!(message, "Unable to find network offering");
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_unwrap_envelope_generic_error_response() {
        let body = json!({"errorresponse": {"errorcode": 401, "errortext": "unable to verify user credentials"}});
        let err = unwrap_envelope("listZones", body).unwrap_err();
        assert!(matches!(err, CloudStackError::Api { code: 401, .. }));
    }

    #[test]
    fn test_extract_id_nested_and_flat() {
        let nested = json!({"network": {"id": "n1"}});
        assert_eq!(extract_id("createNetwork", &nested, "network").unwrap(), "n1");

        let flat = json!({"id": "r1", "jobid": "j1"});
        assert_eq!(extract_id("createFirewallRule", &flat, "firewallrule").unwrap(), "r1");
    }

    #[test]
    fn test_tags_to_map() {
        let tags = vec![Tag {
            key: "env".to_string(),
            value: "prod".to_string(),
        }];
        let map = tags_to_map(&tags);
        assert_eq!(map.get("env"), Some(&"prod".to_string()));
    }
}
