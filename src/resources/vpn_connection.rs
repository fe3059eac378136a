use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VpnConnection {
    s2scustomergatewayid: String,
    s2svpngatewayid: String,
    state: String,
}

/// `cloudstack_vpn_connection`: a site-to-site tunnel between a VPN gateway
/// and a customer gateway.
pub struct VpnConnectionResource;

#[async_trait]
impl Resource for VpnConnectionResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_vpn_connection"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("customer_gateway_id", Attribute::required_string().force_new())
            .attr("vpn_gateway_id", Attribute::required_string().force_new())
            .attr("state", Attribute::computed_string())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let vpn_gateway_id = d.get_str("vpn_gateway_id").to_string();

        let mut params = Params::from([("s2svpngatewayid", vpn_gateway_id.as_str())]);
        params.set("s2scustomergatewayid", d.get_str("customer_gateway_id"));

        let result = client
            .execute_async("createVpnConnection", &params)
            .await
            .context(|| format!("creating VPN connection on gateway {}", vpn_gateway_id))?;
        let id = extract_id("createVpnConnection", &result, "vpnconnection")
            .context(|| format!("creating VPN connection on gateway {}", vpn_gateway_id))?;

        tracing::info!(id = %id, "VPN connection created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let connection: Option<VpnConnection> = client
            .get_by_id(
                "listVpnConnections",
                "vpnconnection",
                d.id(),
                &Params::from([("listall", "true")]),
            )
            .await
            .context(|| format!("retrieving VPN connection {}", d.id()))?;

        let Some(connection) = connection else {
            mark_gone(d, "VPN connection");
            return Ok(());
        };

        d.set("customer_gateway_id", connection.s2scustomergatewayid);
        d.set("vpn_gateway_id", connection.s2svpngatewayid);
        d.set("state", connection.state);
        Ok(())
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteVpnConnection", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting VPN connection {}", d.id()))
    }
}
