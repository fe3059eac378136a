use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::ignore_not_found;
use super::rules::{self, RuleKind, cidr_list_value, parse_port_range, port_key};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, ProviderError, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

/// Ingress rules hang off a public IP, egress rules off a network.
pub(crate) struct FirewallRules {
    egress: bool,
}

impl FirewallRules {
    pub(crate) fn ingress() -> Self {
        Self { egress: false }
    }

    pub(crate) fn egress() -> Self {
        Self { egress: true }
    }

    fn parent_param(&self) -> &'static str {
        if self.egress { "networkid" } else { "ipaddressid" }
    }

    async fn create_rule(&self, client: &CloudStackClient, params: &Params) -> Result<String> {
        let command = if self.egress {
            "createEgressFirewallRule"
        } else {
            "createFirewallRule"
        };
        let result = client
            .execute_async(command, params)
            .await
            .context(|| format!("creating {} rule", self.label()))?;
        extract_id(command, &result, "firewallrule").context(|| format!("creating {} rule", self.label()))
    }
}

pub(crate) fn rule_block() -> Schema {
    Schema::new()
        .attr("cidr_list", Attribute::required_string_set())
        .attr("protocol", Attribute::required_string())
        .attr("icmp_type", Attribute::optional_int().computed())
        .attr("icmp_code", Attribute::optional_int().computed())
        .attr("ports", Attribute::optional_string_set())
        .attr(rules::UUIDS, rules::uuids_attribute())
}

/// Creates one rule per port range for tcp/udp, a single rule otherwise.
pub(crate) async fn create_protocol_rules<F, Fut>(
    label: &str,
    base: Params,
    block: &Map<String, Value>,
    uuids: &mut BTreeMap<String, String>,
    mut create: F,
) -> Result<()>
where
    F: FnMut(Params) -> Fut,
    Fut: std::future::Future<Output = Result<String>>,
{
    let protocol = block.get_str("protocol").to_lowercase();
    match protocol.as_str() {
        "icmp" => {
            let mut params = base;
            params
                .set_opt("icmptype", block.raw("icmp_type").and_then(Value::as_i64))
                .set_opt("icmpcode", block.raw("icmp_code").and_then(Value::as_i64));
            let id = create(params).await?;
            uuids.insert("icmp".to_string(), id);
        }
        "tcp" | "udp" => {
            let ports = block.get_string_list("ports");
            if ports.is_empty() {
                return Err(ProviderError::validation(
                    label,
                    format!("{} rules need at least one port", protocol),
                ));
            }
            for port in ports {
                if uuids.contains_key(&port) {
                    continue;
                }
                let (start, end) = parse_port_range(&port)?;
                let mut params = base.clone();
                params.set("startport", start).set("endport", end);
                let id = create(params).await?;
                uuids.insert(port, id);
            }
        }
        _ => {
            let id = create(base).await?;
            uuids.insert("all".to_string(), id);
        }
    }
    Ok(())
}

/// Rebuilds a rule block from a listed firewall, egress or ACL rule.
pub(crate) fn block_from_listed_rule(rule: &Value) -> Option<(String, Map<String, Value>)> {
    let protocol = rule.get("protocol")?.as_str()?.to_lowercase();
    let mut block = Map::new();
    block.insert(
        "cidr_list".to_string(),
        cidr_list_value(rule.get("cidrlist").and_then(Value::as_str).unwrap_or("")),
    );
    block.insert("protocol".to_string(), Value::String(protocol.clone()));

    let key = match protocol.as_str() {
        "icmp" => {
            block.insert("icmp_type".to_string(), rule.get("icmptype").cloned().unwrap_or(Value::Null));
            block.insert("icmp_code".to_string(), rule.get("icmpcode").cloned().unwrap_or(Value::Null));
            "icmp".to_string()
        }
        "tcp" | "udp" => {
            let start = rule.get("startport").and_then(Value::as_u64)?;
            let end = rule.get("endport").and_then(Value::as_u64).unwrap_or(start);
            let key = port_key(start, end);
            block.insert("ports".to_string(), Value::Array(vec![Value::String(key.clone())]));
            key
        }
        _ => "all".to_string(),
    };
    Some((key, block))
}

#[async_trait]
impl RuleKind for FirewallRules {
    fn label(&self) -> &'static str {
        if self.egress {
            "egress firewall"
        } else {
            "firewall"
        }
    }

    async fn create_block(
        &self,
        client: &CloudStackClient,
        parent_id: &str,
        block: &Map<String, Value>,
        uuids: &mut BTreeMap<String, String>,
    ) -> Result<()> {
        let mut base = Params::new();
        base.set(self.parent_param(), parent_id)
            .set("protocol", block.get_str("protocol"))
            .set_list("cidrlist", &block.get_string_list("cidr_list"));

        create_protocol_rules(self.label(), base, block, uuids, |params| async move {
            self.create_rule(client, &params).await
        })
        .await
    }

    async fn delete_rule(
        &self,
        client: &CloudStackClient,
        _block: &Map<String, Value>,
        rule_id: &str,
    ) -> Result<()> {
        let command = if self.egress {
            "deleteEgressFirewallRule"
        } else {
            "deleteFirewallRule"
        };
        ignore_not_found(
            client
                .execute_async(command, &Params::from([("id", rule_id)]))
                .await,
        )
        .context(|| format!("deleting {} rule {}", self.label(), rule_id))
    }

    async fn list_rules(&self, client: &CloudStackClient, parent_id: &str) -> Result<Vec<Value>> {
        let command = if self.egress {
            "listEgressFirewallRules"
        } else {
            "listFirewallRules"
        };
        let mut params = Params::new();
        params.set(self.parent_param(), parent_id).set("listall", true);
        client
            .list(command, "firewallrule", &params)
            .await
            .context(|| format!("listing {} rules of {}", self.label(), parent_id))
    }

    fn block_from_rule(&self, rule: &Value) -> Option<(String, Map<String, Value>)> {
        block_from_listed_rule(rule)
    }
}

/// `cloudstack_firewall`: ingress firewall rules of a public IP address.
pub struct FirewallResource;

#[async_trait]
impl Resource for FirewallResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_firewall"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("ip_address_id", Attribute::required_string().force_new())
            .attr("managed", Attribute::optional_bool().default(false))
            .attr("rule", Attribute::optional_block_set(rule_block()))
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let ip_address_id = d.get_str("ip_address_id").to_string();
        d.set_id(ip_address_id.clone());
        rules::sync(&FirewallRules::ingress(), client, d, "rule", &ip_address_id).await?;
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let parent_id = d.id().to_string();
        let managed = d.get_bool("managed");
        rules::refresh(&FirewallRules::ingress(), client, d, "rule", &parent_id, managed).await?;
        if !d.is_gone() {
            d.set("ip_address_id", parent_id);
        }
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let parent_id = d.id().to_string();
        rules::sync(&FirewallRules::ingress(), client, d, "rule", &parent_id).await?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        rules::delete_all(&FirewallRules::ingress(), client, d, "rule").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_block_from_tcp_rule() {
        let rule = json!({
            "id": "r1",
            "protocol": "tcp",
            "startport": 8000,
            "endport": 8080,
            "cidrlist": "10.0.0.0/8"
        });
        let (key, block) = block_from_listed_rule(&rule).unwrap();
        assert_eq!(key, "8000-8080");
        assert_eq!(block["ports"], json!(["8000-8080"]));
        assert_eq!(block["cidr_list"], json!(["10.0.0.0/8"]));
    }

    #[test]
    fn test_block_from_icmp_rule() {
        let rule = json!({"id": "r2", "protocol": "icmp", "icmptype": -1, "icmpcode": -1, "cidrlist": "0.0.0.0/0"});
        let (key, block) = block_from_listed_rule(&rule).unwrap();
        assert_eq!(key, "icmp");
        assert_eq!(block["icmp_type"], json!(-1));
    }

    #[test]
    fn test_block_from_all_rule() {
        let rule = json!({"id": "r3", "protocol": "all", "cidrlist": "0.0.0.0/0"});
        let (key, _) = block_from_listed_rule(&rule).unwrap();
        assert_eq!(key, "all");
    }

    #[test]
    fn test_schema_rule_block() {
        let schema = FirewallResource.schema();
        assert!(schema.get("ip_address_id").unwrap().force_new);
        assert!(schema.get("rule").is_some());
    }
}
