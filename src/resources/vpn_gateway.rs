use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VpnGateway {
    vpcid: String,
    publicip: String,
}

/// `cloudstack_vpn_gateway`: the site-to-site VPN endpoint of a VPC.
pub struct VpnGatewayResource;

#[async_trait]
impl Resource for VpnGatewayResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_vpn_gateway"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("vpc_id", Attribute::required_string().force_new())
            .attr("public_ip", Attribute::computed_string())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let vpc_id = d.get_str("vpc_id").to_string();

        let result = client
            .execute_async("createVpnGateway", &Params::from([("vpcid", vpc_id.as_str())]))
            .await
            .context(|| format!("creating VPN gateway for VPC {}", vpc_id))?;
        let id = extract_id("createVpnGateway", &result, "vpngateway")
            .context(|| format!("creating VPN gateway for VPC {}", vpc_id))?;

        tracing::info!(id = %id, vpc = %vpc_id, "VPN gateway created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let gateway: Option<VpnGateway> = client
            .get_by_id(
                "listVpnGateways",
                "vpngateway",
                d.id(),
                &Params::from([("listall", "true")]),
            )
            .await
            .context(|| format!("retrieving VPN gateway {}", d.id()))?;

        let Some(gateway) = gateway else {
            mark_gone(d, "VPN gateway");
            return Ok(());
        };

        d.set("vpc_id", gateway.vpcid);
        d.set("public_ip", gateway.publicip);
        Ok(())
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteVpnGateway", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting VPN gateway {}", d.id()))
    }
}
