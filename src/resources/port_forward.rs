use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::ignore_not_found;
use super::rules::{self, RuleKind};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, ProviderError, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

const FORWARD_KEY: &str = "forward";

struct PortForwards;

fn forward_block() -> Schema {
    Schema::new()
        .attr("protocol", Attribute::required_string())
        .attr("private_port", Attribute::required_int())
        .attr("private_end_port", Attribute::optional_int().computed())
        .attr("public_port", Attribute::required_int())
        .attr("public_end_port", Attribute::optional_int().computed())
        .attr("virtual_machine_id", Attribute::required_string())
        .attr("vm_guest_ip", Attribute::optional_string())
        .attr(rules::UUIDS, rules::uuids_attribute())
}

/// CloudStack reports port numbers of forwarding rules as strings.
fn port_value(rule: &Value, field: &str) -> Value {
    match rule.get(field) {
        Some(Value::String(s)) => s.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
        Some(Value::Number(n)) => Value::Number(n.clone()),
        _ => Value::Null,
    }
}

#[async_trait]
impl RuleKind for PortForwards {
    fn label(&self) -> &'static str {
        "port forward"
    }

    async fn create_block(
        &self,
        client: &CloudStackClient,
        parent_id: &str,
        block: &Map<String, Value>,
        uuids: &mut BTreeMap<String, String>,
    ) -> Result<()> {
        let protocol = block.get_str("protocol").to_lowercase();
        if protocol != "tcp" && protocol != "udp" {
            return Err(ProviderError::validation(
                "cloudstack_port_forward",
                format!("protocol must be tcp or udp, got '{}'", protocol),
            ));
        }

        let mut params = Params::new();
        params
            .set("ipaddressid", parent_id)
            .set("protocol", &protocol)
            .set("privateport", block.get_int("private_port"))
            .set("publicport", block.get_int("public_port"))
            .set("virtualmachineid", block.get_str("virtual_machine_id"))
            .set("openfirewall", false)
            .set_opt("privateendport", block.get_opt_int("private_end_port"))
            .set_opt("publicendport", block.get_opt_int("public_end_port"))
            .set_nonempty("vmguestip", block.get_str("vm_guest_ip"));

        let result = client
            .execute_async("createPortForwardingRule", &params)
            .await
            .context(|| format!("creating port forward on {}", parent_id))?;
        let id = extract_id("createPortForwardingRule", &result, "portforwardingrule")
            .context(|| format!("creating port forward on {}", parent_id))?;
        uuids.insert(FORWARD_KEY.to_string(), id);
        Ok(())
    }

    async fn delete_rule(
        &self,
        client: &CloudStackClient,
        _block: &Map<String, Value>,
        rule_id: &str,
    ) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deletePortForwardingRule", &Params::from([("id", rule_id)]))
                .await,
        )
        .context(|| format!("deleting port forward {}", rule_id))
    }

    async fn list_rules(&self, client: &CloudStackClient, parent_id: &str) -> Result<Vec<Value>> {
        let mut params = Params::new();
        params.set("ipaddressid", parent_id).set("listall", true);
        client
            .list("listPortForwardingRules", "portforwardingrule", &params)
            .await
            .context(|| format!("listing port forwards of {}", parent_id))
    }

    fn block_from_rule(&self, rule: &Value) -> Option<(String, Map<String, Value>)> {
        let mut block = Map::new();
        block.insert("protocol".to_string(), rule.get("protocol")?.clone());
        block.insert("private_port".to_string(), port_value(rule, "privateport"));
        block.insert("private_end_port".to_string(), port_value(rule, "privateendport"));
        block.insert("public_port".to_string(), port_value(rule, "publicport"));
        block.insert("public_end_port".to_string(), port_value(rule, "publicendport"));
        block.insert(
            "virtual_machine_id".to_string(),
            rule.get("virtualmachineid").cloned().unwrap_or(Value::Null),
        );
        if let Some(ip) = rule.get("vmguestip") {
            block.insert("vm_guest_ip".to_string(), ip.clone());
        }
        Some((FORWARD_KEY.to_string(), block))
    }
}

/// `cloudstack_port_forward`: port forwarding rules of a public IP.
pub struct PortForwardResource;

#[async_trait]
impl Resource for PortForwardResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_port_forward"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("ip_address_id", Attribute::required_string().force_new())
            .attr("managed", Attribute::optional_bool().default(false))
            .attr("forward", Attribute::optional_block_set(forward_block()))
            .with_project()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let ip_address_id = d.get_str("ip_address_id").to_string();
        d.set_id(ip_address_id.clone());
        rules::sync(&PortForwards, client, d, "forward", &ip_address_id).await?;
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let ip_address_id = d.id().to_string();
        let managed = d.get_bool("managed");
        rules::refresh(&PortForwards, client, d, "forward", &ip_address_id, managed).await?;
        if !d.is_gone() {
            d.set("ip_address_id", ip_address_id);
        }
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let ip_address_id = d.id().to_string();
        rules::sync(&PortForwards, client, d, "forward", &ip_address_id).await?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        rules::delete_all(&PortForwards, client, d, "forward").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_port_value_parses_strings() {
        let rule = json!({"privateport": "8080", "publicport": 80, "publicendport": "x"});
        assert_eq!(port_value(&rule, "privateport"), json!(8080));
        assert_eq!(port_value(&rule, "publicport"), json!(80));
        assert_eq!(port_value(&rule, "publicendport"), Value::Null);
        assert_eq!(port_value(&rule, "missing"), Value::Null);
    }

    #[test]
    fn test_block_from_rule() {
        let rule = json!({
            "id": "pf1",
            "protocol": "tcp",
            "privateport": "22",
            "privateendport": "22",
            "publicport": "2222",
            "publicendport": "2222",
            "virtualmachineid": "vm1"
        });
        let (key, block) = PortForwards.block_from_rule(&rule).unwrap();
        assert_eq!(key, FORWARD_KEY);
        assert_eq!(block["public_port"], json!(2222));
        assert_eq!(block["virtual_machine_id"], json!("vm1"));
    }
}
