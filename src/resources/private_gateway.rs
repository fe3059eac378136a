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
struct PrivateGateway {
    gateway: String,
    ipaddress: String,
    netmask: String,
    vlan: String,
    physicalnetworkid: String,
    vpcid: String,
    aclid: String,
}

/// `cloudstack_private_gateway`: a VPC gateway into a private network.
pub struct PrivateGatewayResource;

#[async_trait]
impl Resource for PrivateGatewayResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_private_gateway"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("gateway", Attribute::required_string().force_new())
            .attr("ip_address", Attribute::required_string().force_new())
            .attr("netmask", Attribute::required_string().force_new())
            .attr("vlan", Attribute::required_string().force_new())
            .attr("physical_network_id", Attribute::optional_string().computed().force_new())
            .attr("network_offering", Attribute::optional_string().force_new())
            .attr("acl_id", Attribute::required_string())
            .attr("vpc_id", Attribute::required_string().force_new())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let ip_address = d.get_str("ip_address").to_string();

        let mut params = Params::new();
        params
            .set("gateway", d.get_str("gateway"))
            .set("ipaddress", &ip_address)
            .set("netmask", d.get_str("netmask"))
            .set("vlan", d.get_str("vlan"))
            .set("vpcid", d.get_str("vpc_id"))
            .set("aclid", d.get_str("acl_id"))
            .set_nonempty("physicalnetworkid", d.get_str("physical_network_id"));
        if let Some(offering) = d.get_opt_str("network_offering") {
            let offering_id = resolve::retrieve_id(client, Kind::NetworkOffering, offering).await?;
            params.set("networkofferingid", offering_id);
        }

        let result = client
            .execute_async("createPrivateGateway", &params)
            .await
            .context(|| format!("creating private gateway {}", ip_address))?;
        let id = extract_id("createPrivateGateway", &result, "privategateway")
            .context(|| format!("creating private gateway {}", ip_address))?;

        tracing::info!(id = %id, ip = %ip_address, "private gateway created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let gateway: Option<PrivateGateway> = client
            .get_by_id("listPrivateGateways", "privategateway", d.id(), &Params::new())
            .await
            .context(|| format!("retrieving private gateway {}", d.id()))?;

        let Some(gateway) = gateway else {
            mark_gone(d, "private gateway");
            return Ok(());
        };

        d.set("gateway", gateway.gateway);
        d.set("ip_address", gateway.ipaddress);
        d.set("netmask", gateway.netmask);
        d.set("vlan", gateway.vlan.trim_start_matches("vlan://").to_string());
        d.set("physical_network_id", gateway.physicalnetworkid);
        d.set("vpc_id", gateway.vpcid);
        d.set("acl_id", gateway.aclid);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if d.has_change("acl_id") {
            let mut params = Params::from([("gatewayid", d.id())]);
            params.set("aclid", d.get_str("acl_id"));
            client
                .execute_async("replaceNetworkACLList", &params)
                .await
                .context(|| format!("replacing the ACL of private gateway {}", d.id()))?;
        }
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deletePrivateGateway", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting private gateway {}", d.id()))
    }
}
