use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::firewall::{block_from_listed_rule, create_protocol_rules};
use super::ignore_not_found;
use super::rules::{self, RuleKind};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, ProviderError, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

struct AclRules;

const ACTIONS: [&str; 2] = ["allow", "deny"];
const TRAFFIC_TYPES: [&str; 2] = ["ingress", "egress"];

fn rule_block() -> Schema {
    Schema::new()
        .attr("action", Attribute::optional_string().default("allow"))
        .attr("cidr_list", Attribute::required_string_set())
        .attr("protocol", Attribute::required_string())
        .attr("icmp_type", Attribute::optional_int().computed())
        .attr("icmp_code", Attribute::optional_int().computed())
        .attr("ports", Attribute::optional_string_set())
        .attr("traffic_type", Attribute::optional_string().default("ingress"))
        .attr("rule_number", Attribute::optional_int().computed())
        .attr("description", Attribute::optional_string())
        .attr(rules::UUIDS, rules::uuids_attribute())
}

fn check_block(block: &Map<String, Value>) -> Result<()> {
    let action = block.get_str("action").to_lowercase();
    if !ACTIONS.contains(&action.as_str()) {
        return Err(ProviderError::validation(
            "cloudstack_network_acl_rule",
            format!("action must be one of {:?}, got '{}'", ACTIONS, action),
        ));
    }
    let traffic_type = block.get_str("traffic_type").to_lowercase();
    if !TRAFFIC_TYPES.contains(&traffic_type.as_str()) {
        return Err(ProviderError::validation(
            "cloudstack_network_acl_rule",
            format!(
                "traffic_type must be one of {:?}, got '{}'",
                TRAFFIC_TYPES, traffic_type
            ),
        ));
    }
    Ok(())
}

#[async_trait]
impl RuleKind for AclRules {
    fn label(&self) -> &'static str {
        "network ACL"
    }

    async fn create_block(
        &self,
        client: &CloudStackClient,
        parent_id: &str,
        block: &Map<String, Value>,
        uuids: &mut BTreeMap<String, String>,
    ) -> Result<()> {
        check_block(block)?;

        let mut base = Params::new();
        base.set("aclid", parent_id)
            .set("action", block.get_str("action"))
            .set("protocol", block.get_str("protocol"))
            .set("traffictype", block.get_str("traffic_type"))
            .set_list("cidrlist", &block.get_string_list("cidr_list"))
            .set_opt("number", block.get_opt_int("rule_number"))
            .set_nonempty("reason", block.get_str("description"));

        create_protocol_rules(self.label(), base, block, uuids, |params| async move {
            let result = client
                .execute_async("createNetworkACL", &params)
                .await
                .context(|| format!("creating network ACL rule in {}", parent_id))?;
            extract_id("createNetworkACL", &result, "networkacl")
                .context(|| format!("creating network ACL rule in {}", parent_id))
        })
        .await
    }

    async fn delete_rule(
        &self,
        client: &CloudStackClient,
        _block: &Map<String, Value>,
        rule_id: &str,
    ) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteNetworkACL", &Params::from([("id", rule_id)]))
                .await,
        )
        .context(|| format!("deleting network ACL rule {}", rule_id))
    }

    async fn list_rules(&self, client: &CloudStackClient, parent_id: &str) -> Result<Vec<Value>> {
        let mut params = Params::new();
        params.set("aclid", parent_id).set("listall", true);
        client
            .list("listNetworkACLs", "networkacl", &params)
            .await
            .context(|| format!("listing rules of network ACL {}", parent_id))
    }

    fn block_from_rule(&self, rule: &Value) -> Option<(String, Map<String, Value>)> {
        let (key, mut block) = block_from_listed_rule(rule)?;
        let text = |field: &str| {
            rule.get(field)
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_lowercase()
        };
        block.insert("action".to_string(), Value::String(text("action")));
        block.insert("traffic_type".to_string(), Value::String(text("traffictype")));
        if let Some(number) = rule.get("number") {
            block.insert("rule_number".to_string(), number.clone());
        }
        if let Some(reason) = rule.get("reason").and_then(Value::as_str) {
            block.insert("description".to_string(), Value::String(reason.to_string()));
        }
        Some((key, block))
    }
}

/// `cloudstack_network_acl_rule`: the rules of a VPC network ACL list.
pub struct NetworkAclRuleResource;

#[async_trait]
impl Resource for NetworkAclRuleResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_network_acl_rule"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("acl_id", Attribute::required_string().force_new())
            .attr("managed", Attribute::optional_bool().default(false))
            .attr("rule", Attribute::optional_block_set(rule_block()))
            .with_project()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let acl_id = d.get_str("acl_id").to_string();
        d.set_id(acl_id.clone());
        rules::sync(&AclRules, client, d, "rule", &acl_id).await?;
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let acl_id = d.id().to_string();
        let managed = d.get_bool("managed");
        rules::refresh(&AclRules, client, d, "rule", &acl_id, managed).await?;
        if !d.is_gone() {
            d.set("acl_id", acl_id);
        }
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let acl_id = d.id().to_string();
        rules::sync(&AclRules, client, d, "rule", &acl_id).await?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        rules::delete_all(&AclRules, client, d, "rule").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_block_rejects_bad_action() {
        let block = json!({"action": "reject", "traffic_type": "ingress"});
        let err = check_block(block.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().contains("action must be one of"));
    }

    #[test]
    fn test_check_block_is_case_insensitive() {
        let block = json!({"action": "Deny", "traffic_type": "Egress"});
        assert!(check_block(block.as_object().unwrap()).is_ok());
    }

    #[test]
    fn test_block_from_rule_keeps_acl_fields() {
        let rule = json!({
            "id": "r1",
            "protocol": "tcp",
            "startport": 22,
            "endport": 22,
            "cidrlist": "10.0.0.0/24",
            "action": "Allow",
            "traffictype": "Ingress",
            "number": 10,
            "reason": "ssh"
        });
        let (key, block) = AclRules.block_from_rule(&rule).unwrap();
        assert_eq!(key, "22");
        assert_eq!(block["action"], json!("allow"));
        assert_eq!(block["traffic_type"], json!("ingress"));
        assert_eq!(block["rule_number"], json!(10));
        assert_eq!(block["description"], json!("ssh"));
    }
}
