use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::firewall::{block_from_listed_rule, create_protocol_rules};
use super::ignore_not_found;
use super::rules::{self, RuleKind};
use crate::cloudstack::{CloudStackClient, CloudStackError, Params};
use crate::error::{Context, ProviderError, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

struct SecurityGroupRules;

#[derive(Debug, Deserialize)]
struct GroupOwner {
    #[serde(default)]
    account: String,
}

fn rule_block() -> Schema {
    Schema::new()
        .attr("cidr_list", Attribute::optional_string_set())
        .attr("protocol", Attribute::required_string())
        .attr("icmp_type", Attribute::optional_int().computed())
        .attr("icmp_code", Attribute::optional_int().computed())
        .attr("ports", Attribute::optional_string_set())
        .attr("traffic_type", Attribute::optional_string().default("ingress"))
        .attr("user_security_group_list", Attribute::optional_string_set())
        .attr(rules::UUIDS, rules::uuids_attribute())
}

fn is_egress(block: &Map<String, Value>) -> bool {
    block.get_str("traffic_type").eq_ignore_ascii_case("egress")
}

/// Pulls the id of the rule just authorized out of the job result.
fn authorized_rule_id(command: &str, result: &Value, egress: bool) -> std::result::Result<String, CloudStackError> {
    let list = if egress { "egressrule" } else { "ingressrule" };
    result
        .get("securitygroup")
        .and_then(|g| g.get(list))
        .and_then(Value::as_array)
        .and_then(|rules| rules.first())
        .and_then(|r| r.get("ruleid"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| CloudStackError::InvalidResponse {
            command: command.to_string(),
            message: format!("missing 'securitygroup.{}.ruleid' in job result", list),
        })
}

/// Flattens the ingress and egress rules of a listed security group into
/// rule items carrying `id`, `cidrlist` and `traffictype`.
fn flatten_rules(group: &Value) -> Vec<Value> {
    let mut items = Vec::new();
    for (list, traffic_type) in [("ingressrule", "ingress"), ("egressrule", "egress")] {
        let Some(rules) = group.get(list).and_then(Value::as_array) else {
            continue;
        };
        for rule in rules {
            let Some(mut item) = rule.as_object().cloned() else {
                continue;
            };
            if let Some(id) = item.get("ruleid").cloned() {
                item.insert("id".to_string(), id);
            }
            if let Some(cidr) = item.get("cidr").cloned() {
                item.insert("cidrlist".to_string(), cidr);
            }
            item.insert("traffictype".to_string(), Value::String(traffic_type.to_string()));
            items.push(Value::Object(item));
        }
    }
    items
}

#[async_trait]
impl RuleKind for SecurityGroupRules {
    fn label(&self) -> &'static str {
        "security group"
    }

    async fn create_block(
        &self,
        client: &CloudStackClient,
        parent_id: &str,
        block: &Map<String, Value>,
        uuids: &mut BTreeMap<String, String>,
    ) -> Result<()> {
        let cidr_list = block.get_string_list("cidr_list");
        let user_groups = block.get_string_list("user_security_group_list");
        if cidr_list.is_empty() && user_groups.is_empty() {
            return Err(ProviderError::validation(
                "cloudstack_security_group_rule",
                "either cidr_list or user_security_group_list must be set",
            ));
        }

        let egress = is_egress(block);
        let command = if egress {
            "authorizeSecurityGroupEgress"
        } else {
            "authorizeSecurityGroupIngress"
        };

        let mut base = Params::new();
        base.set("securitygroupid", parent_id)
            .set("protocol", block.get_str("protocol"))
            .set_list("cidrlist", &cidr_list);

        for (i, group) in user_groups.iter().enumerate() {
            let owners: Vec<GroupOwner> = client
                .list(
                    "listSecurityGroups",
                    "securitygroup",
                    &Params::from([("securitygroupname", group.as_str()), ("listall", "true")]),
                )
                .await
                .context(|| format!("retrieving security group {}", group))?;
            let owner = owners
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::not_found("security group", group.as_str()))?;
            base.set(&format!("usersecuritygrouplist[{}].account", i), owner.account)
                .set(&format!("usersecuritygrouplist[{}].group", i), group);
        }

        create_protocol_rules(self.label(), base, block, uuids, |params| async move {
            let result = client
                .execute_async(command, &params)
                .await
                .context(|| format!("authorizing rule on security group {}", parent_id))?;
            authorized_rule_id(command, &result, egress)
                .context(|| format!("authorizing rule on security group {}", parent_id))
        })
        .await
    }

    async fn delete_rule(
        &self,
        client: &CloudStackClient,
        block: &Map<String, Value>,
        rule_id: &str,
    ) -> Result<()> {
        let command = if is_egress(block) {
            "revokeSecurityGroupEgress"
        } else {
            "revokeSecurityGroupIngress"
        };
        ignore_not_found(
            client
                .execute_async(command, &Params::from([("id", rule_id)]))
                .await,
        )
        .context(|| format!("revoking security group rule {}", rule_id))
    }

    async fn list_rules(&self, client: &CloudStackClient, parent_id: &str) -> Result<Vec<Value>> {
        let group: Option<Value> = client
            .get_by_id(
                "listSecurityGroups",
                "securitygroup",
                parent_id,
                &Params::from([("listall", "true")]),
            )
            .await
            .context(|| format!("retrieving security group {}", parent_id))?;
        let group = group.ok_or_else(|| ProviderError::not_found("security group", parent_id))?;
        Ok(flatten_rules(&group))
    }

    fn block_from_rule(&self, rule: &Value) -> Option<(String, Map<String, Value>)> {
        let (key, mut block) = block_from_listed_rule(rule)?;
        block.insert(
            "traffic_type".to_string(),
            rule.get("traffictype").cloned().unwrap_or(Value::Null),
        );
        Some((key, block))
    }
}

/// `cloudstack_security_group_rule`: ingress and egress rules of a
/// security group.
pub struct SecurityGroupRuleResource;

#[async_trait]
impl Resource for SecurityGroupRuleResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_security_group_rule"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("security_group_id", Attribute::required_string().force_new())
            .attr("rule", Attribute::optional_block_set(rule_block()))
            .with_project()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let group_id = d.get_str("security_group_id").to_string();
        d.set_id(group_id.clone());
        rules::sync(&SecurityGroupRules, client, d, "rule", &group_id).await?;
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let group_id = d.id().to_string();
        rules::refresh(&SecurityGroupRules, client, d, "rule", &group_id, false).await?;
        if !d.is_gone() {
            d.set("security_group_id", group_id);
        }
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let group_id = d.id().to_string();
        rules::sync(&SecurityGroupRules, client, d, "rule", &group_id).await?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        rules::delete_all(&SecurityGroupRules, client, d, "rule").await
    }
}
