use async_trait::async_trait;

use super::firewall::{FirewallRules, rule_block};
use super::rules;
use crate::cloudstack::CloudStackClient;
use crate::error::Result;
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

/// `cloudstack_egress_firewall`: egress rules of an isolated network.
pub struct EgressFirewallResource;

#[async_trait]
impl Resource for EgressFirewallResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_egress_firewall"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("network_id", Attribute::required_string().force_new())
            .attr("managed", Attribute::optional_bool().default(false))
            .attr("rule", Attribute::optional_block_set(rule_block()))
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let network_id = d.get_str("network_id").to_string();
        d.set_id(network_id.clone());
        rules::sync(&FirewallRules::egress(), client, d, "rule", &network_id).await?;
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let network_id = d.id().to_string();
        let managed = d.get_bool("managed");
        rules::refresh(&FirewallRules::egress(), client, d, "rule", &network_id, managed).await?;
        if !d.is_gone() {
            d.set("network_id", network_id);
        }
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let network_id = d.id().to_string();
        rules::sync(&FirewallRules::egress(), client, d, "rule", &network_id).await?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        rules::delete_all(&FirewallRules::egress(), client, d, "rule").await
    }
}
