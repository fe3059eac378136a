//! Lifecycle shared by resources that manage a set of CloudStack rules
//! under one parent object (public IP, network, ACL list, security group).
//!
//! Every configured block records the ids of the rules created for it in a
//! computed `uuids` map, keyed by port range, `icmp` or `all`.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::cloudstack::CloudStackClient;
use crate::error::{ProviderError, Result};
use crate::resource::{AttributeReader, ResourceData};
use crate::schema::Attribute;

pub(crate) const UUIDS: &str = "uuids";

#[async_trait]
pub(crate) trait RuleKind: Send + Sync {
    fn label(&self) -> &'static str;

    /// Creates the rules for one block, recording each created id in
    /// `uuids` as it goes so partial failures stay tracked.
    async fn create_block(
        &self,
        client: &CloudStackClient,
        parent_id: &str,
        block: &Map<String, Value>,
        uuids: &mut BTreeMap<String, String>,
    ) -> Result<()>;

    /// Deletes one rule; rules that are already gone count as deleted.
    async fn delete_rule(
        &self,
        client: &CloudStackClient,
        block: &Map<String, Value>,
        rule_id: &str,
    ) -> Result<()>;

    /// Lists the rules currently attached to the parent. Every item carries
    /// its rule id under `id`.
    async fn list_rules(&self, client: &CloudStackClient, parent_id: &str) -> Result<Vec<Value>>;

    /// Builds a block for a rule found in CloudStack but not in the
    /// configuration, returning the `uuids` key it belongs under.
    fn block_from_rule(&self, rule: &Value) -> Option<(String, Map<String, Value>)>;
}

pub(crate) fn uuids_attribute() -> Attribute {
    Attribute::computed_map()
}

/// Parses `"80"` or `"8000-8080"`.
pub(crate) fn parse_port_range(port: &str) -> Result<(u16, u16)> {
    let invalid = || ProviderError::Config(format!("invalid port or port range '{}'", port));
    let (start, end) = match port.split_once('-') {
        Some((start, end)) => (start.trim(), end.trim()),
        None => (port.trim(), port.trim()),
    };
    let start: u16 = start.parse().map_err(|_| invalid())?;
    let end: u16 = end.parse().map_err(|_| invalid())?;
    if start == 0 || start > end {
        return Err(invalid());
    }
    Ok((start, end))
}

pub(crate) fn port_key(start: u64, end: u64) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}

/// Splits CloudStack's comma separated `cidrlist` into a JSON list.
pub(crate) fn cidr_list_value(cidrlist: &str) -> Value {
    Value::Array(
        cidrlist
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
    )
}

fn block_uuids(block: &Map<String, Value>) -> BTreeMap<String, String> {
    block.get_string_map(UUIDS)
}

fn without_uuids(block: &Map<String, Value>) -> Map<String, Value> {
    let mut stripped = block.clone();
    stripped.remove(UUIDS);
    stripped
}

fn uuids_value(uuids: &BTreeMap<String, String>) -> Value {
    Value::Object(
        uuids
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

fn prior_blocks(d: &ResourceData, key: &str) -> Vec<Map<String, Value>> {
    match d.prior(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_object().cloned())
            .collect(),
        _ => Vec::new(),
    }
}

/// Moves the rules from the prior blocks of `key` to the desired ones:
/// unchanged blocks keep their rules, removed or changed blocks have their
/// rules deleted, new blocks get rules created.
pub(crate) async fn sync<K: RuleKind + ?Sized>(
    kind: &K,
    client: &CloudStackClient,
    d: &mut ResourceData,
    key: &str,
    parent_id: &str,
) -> Result<()> {
    let old_blocks = prior_blocks(d, key);
    let mut unmatched_new: Vec<Map<String, Value>> =
        d.get_blocks(key).iter().map(without_uuids).collect();

    let mut result: Vec<Value> = Vec::new();
    let mut failure: Option<ProviderError> = None;

    for old in old_blocks {
        let stripped = without_uuids(&old);
        if let Some(pos) = unmatched_new.iter().position(|n| *n == stripped) {
            unmatched_new.remove(pos);
            result.push(Value::Object(old));
            continue;
        }
        if failure.is_some() {
            result.push(Value::Object(old));
            continue;
        }

        let mut remaining = block_uuids(&old);
        for (port, rule_id) in block_uuids(&old) {
            match kind.delete_rule(client, &old, &rule_id).await {
                Ok(()) => {
                    remaining.remove(&port);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if !remaining.is_empty() {
            let mut kept = old;
            kept.insert(UUIDS.to_string(), uuids_value(&remaining));
            result.push(Value::Object(kept));
        }
    }

    if failure.is_none() {
        for mut block in unmatched_new {
            let mut uuids = BTreeMap::new();
            let outcome = kind.create_block(client, parent_id, &block, &mut uuids).await;
            if !uuids.is_empty() {
                block.insert(UUIDS.to_string(), uuids_value(&uuids));
                result.push(Value::Object(block));
            }
            if let Err(e) = outcome {
                failure = Some(e);
                break;
            }
        }
    }

    tracing::debug!(kind = kind.label(), parent_id, blocks = result.len(), "rules synchronised");
    d.set(key, Value::Array(result));

    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Drops rule ids that no longer exist. With `managed`, rules unknown to
/// the configuration are added so the next apply removes them.
pub(crate) async fn refresh<K: RuleKind + ?Sized>(
    kind: &K,
    client: &CloudStackClient,
    d: &mut ResourceData,
    key: &str,
    parent_id: &str,
    managed: bool,
) -> Result<()> {
    let rules = match kind.list_rules(client, parent_id).await {
        Ok(rules) => rules,
        Err(e) if e.is_not_found() => {
            tracing::warn!(kind = kind.label(), parent_id, "parent no longer exists");
            d.clear_id();
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let existing: BTreeSet<&str> = rules
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_str))
        .collect();

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut result: Vec<Value> = Vec::new();

    for mut block in d.get_blocks(key) {
        let kept: BTreeMap<String, String> = block_uuids(&block)
            .into_iter()
            .filter(|(_, id)| existing.contains(id.as_str()))
            .collect();
        if kept.is_empty() {
            continue;
        }
        seen.extend(kept.values().cloned());
        if let Some(Value::Array(ports)) = block.get_mut("ports") {
            ports.retain(|p| p.as_str().is_some_and(|p| kept.contains_key(p)));
        }
        block.insert(UUIDS.to_string(), uuids_value(&kept));
        result.push(Value::Object(block));
    }

    if managed {
        for rule in &rules {
            let Some(id) = rule.get("id").and_then(Value::as_str) else {
                continue;
            };
            if seen.contains(id) {
                continue;
            }
            if let Some((port, mut block)) = kind.block_from_rule(rule) {
                let uuids = BTreeMap::from([(port, id.to_string())]);
                block.insert(UUIDS.to_string(), uuids_value(&uuids));
                result.push(Value::Object(block));
            }
        }
    }

    if result.is_empty() && !managed {
        tracing::warn!(kind = kind.label(), parent_id, "no rules left");
        d.clear_id();
        return Ok(());
    }

    d.set(key, Value::Array(result));
    Ok(())
}

/// Deletes every rule recorded in the current blocks of `key`.
pub(crate) async fn delete_all<K: RuleKind + ?Sized>(
    kind: &K,
    client: &CloudStackClient,
    d: &mut ResourceData,
    key: &str,
) -> Result<()> {
    let blocks = d.get_blocks(key);
    let mut remaining: Vec<Value> = Vec::new();
    let mut failure: Option<ProviderError> = None;

    for block in blocks {
        if failure.is_some() {
            remaining.push(Value::Object(block));
            continue;
        }
        let mut left = block_uuids(&block);
        for (port, rule_id) in block_uuids(&block) {
            match kind.delete_rule(client, &block, &rule_id).await {
                Ok(()) => {
                    left.remove(&port);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if !left.is_empty() {
            let mut kept = block;
            kept.insert(UUIDS.to_string(), uuids_value(&left));
            remaining.push(Value::Object(kept));
        }
    }

    d.set(key, Value::Array(remaining));
    match failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
