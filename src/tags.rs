//! Tag synchronisation for taggable resources.

use std::collections::BTreeMap;

use crate::cloudstack::{CloudStackClient, Params};
use crate::error::{Context, Result};
use crate::resource::ResourceData;

/// Computes the tags to delete and to create to move from `old` to `new`.
/// A changed value is deleted and re-created.
pub fn diff(
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, BTreeMap<String, String>) {
    let remove = old
        .iter()
        .filter(|(k, v)| new.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let create = new
        .iter()
        .filter(|(k, v)| old.get(*k) != Some(*v))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    (remove, create)
}

fn string_map(value: Option<&serde_json::Value>) -> BTreeMap<String, String> {
    value
        .and_then(|v| v.as_object())
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

/// Applies the difference between the prior and desired `tags` of `d` to
/// the object `d.id()` of CloudStack type `resource_type` (e.g. `UserVm`).
pub async fn set_tags(
    client: &CloudStackClient,
    d: &ResourceData,
    resource_type: &str,
) -> Result<()> {
    let old = string_map(d.prior("tags"));
    let new = string_map(d.get("tags"));
    let (remove, create) = diff(&old, &new);

    if !remove.is_empty() {
        let mut params = Params::new();
        params
            .set("resourceids", d.id())
            .set("resourcetype", resource_type)
            .set_key_value_map("tags", &remove);
        client
            .execute_async("deleteTags", &params)
            .await
            .context(|| format!("deleting tags from {} {}", resource_type, d.id()))?;
    }

    if !create.is_empty() {
        let mut params = Params::new();
        params
            .set("resourceids", d.id())
            .set("resourcetype", resource_type)
            .set_key_value_map("tags", &create);
        client
            .execute_async("createTags", &params)
            .await
            .context(|| format!("creating tags on {} {}", resource_type, d.id()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_diff_add_only() {
        let (remove, create) = diff(&map(&[]), &map(&[("env", "prod")]));
        assert!(remove.is_empty());
        assert_eq!(create, map(&[("env", "prod")]));
    }

    #[test]
    fn test_diff_remove_only() {
        let (remove, create) = diff(&map(&[("env", "prod")]), &map(&[]));
        assert_eq!(remove, map(&[("env", "prod")]));
        assert!(create.is_empty());
    }

    #[test]
    fn test_diff_changed_value_is_replaced() {
        let (remove, create) = diff(
            &map(&[("env", "prod"), ("team", "web")]),
            &map(&[("env", "dev"), ("team", "web")]),
        );
        assert_eq!(remove, map(&[("env", "prod")]));
        assert_eq!(create, map(&[("env", "dev")]));
    }

    #[test]
    fn test_diff_unchanged() {
        let tags = map(&[("env", "prod")]);
        let (remove, create) = diff(&tags, &tags);
        assert!(remove.is_empty());
        assert!(create.is_empty());
    }
}
