use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resolve::{self, Kind};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhysicalNetwork {
    name: String,
    zoneid: String,
    zonename: String,
    broadcastdomainrange: String,
    isolationmethods: String,
    networkspeed: String,
    vlan: String,
    state: String,
}

/// Splits the comma separated list CloudStack answers with.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// `cloudstack_physical_network`: a physical network of a zone.
pub struct PhysicalNetworkResource;

#[async_trait]
impl Resource for PhysicalNetworkResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_physical_network"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string().force_new())
            .attr("zone", Attribute::required_string().force_new())
            .attr("broadcast_domain_range", Attribute::optional_string().default("ZONE").force_new())
            .attr("isolation_methods", Attribute::optional_string_list().computed().force_new())
            .attr("network_speed", Attribute::optional_string().computed())
            .attr("vlan", Attribute::optional_string().computed())
            .attr("state", Attribute::optional_string().computed())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        let zone_id = resolve::retrieve_id(client, Kind::Zone, d.get_str("zone")).await?;

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("zoneid", zone_id)
            .set("broadcastdomainrange", d.get_str("broadcast_domain_range"))
            .set_list("isolationmethods", &d.get_string_list("isolation_methods"))
            .set_nonempty("networkspeed", d.get_str("network_speed"))
            .set_nonempty("vlan", d.get_str("vlan"));

        let result = client
            .execute_async("createPhysicalNetwork", &params)
            .await
            .context(|| format!("creating physical network {}", name))?;
        let id = extract_id("createPhysicalNetwork", &result, "physicalnetwork")
            .context(|| format!("creating physical network {}", name))?;
        d.set_id(id.clone());

        if let Some(state) = d.get_opt_str("state") {
            let mut params = Params::from([("id", id.as_str())]);
            params.set("state", state);
            client
                .execute_async("updatePhysicalNetwork", &params)
                .await
                .context(|| format!("setting state of physical network {}", name))?;
        }

        tracing::info!(id = %id, name = %name, "physical network created");
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let network: Option<PhysicalNetwork> = client
            .get_by_id("listPhysicalNetworks", "physicalnetwork", d.id(), &Params::new())
            .await
            .context(|| format!("retrieving physical network {}", d.id()))?;

        let Some(network) = network else {
            mark_gone(d, "physical network");
            return Ok(());
        };

        d.set("name", network.name);
        d.set("broadcast_domain_range", network.broadcastdomainrange);
        d.set("isolation_methods", split_list(&network.isolationmethods));
        d.set("network_speed", network.networkspeed);
        d.set("vlan", network.vlan);
        d.set("state", network.state);
        resolve::set_value_or_id(d, "zone", &network.zonename, &network.zoneid);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let changed = ["network_speed", "vlan", "state"];
        if changed.iter().any(|k| d.has_change(k)) {
            let mut params = Params::from([("id", d.id())]);
            params
                .set_nonempty("networkspeed", d.get_str("network_speed"))
                .set_nonempty("vlan", d.get_str("vlan"))
                .set_nonempty("state", d.get_str("state"));
            client
                .execute_async("updatePhysicalNetwork", &params)
                .await
                .context(|| format!("updating physical network {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deletePhysicalNetwork", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting physical network {}", d.id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list("VLAN, VXLAN"), vec!["VLAN", "VXLAN"]);
        assert!(split_list("").is_empty());
    }
}
