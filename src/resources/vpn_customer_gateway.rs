use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, Result};
use crate::resolve;
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VpnCustomerGateway {
    name: String,
    cidrlist: String,
    esppolicy: String,
    gateway: String,
    ikepolicy: String,
    ipsecpsk: String,
    dpd: bool,
    esplifetime: i64,
    ikelifetime: i64,
    project: String,
    projectid: String,
}

/// `cloudstack_vpn_customer_gateway`: the remote end of a site-to-site VPN.
pub struct VpnCustomerGatewayResource;

impl VpnCustomerGatewayResource {
    fn gateway_params(&self, d: &ResourceData) -> Params {
        let mut params = Params::new();
        params
            .set("name", d.get_str("name"))
            .set_list("cidrlist", &d.get_string_list("cidr"))
            .set("esppolicy", d.get_str("esp_policy"))
            .set("gateway", d.get_str("gateway"))
            .set("ikepolicy", d.get_str("ike_policy"))
            .set("ipsecpsk", d.get_str("ipsec_psk"))
            .set_opt("dpd", d.get_opt_bool("dpd"))
            .set_opt("esplifetime", d.get_opt_int("esp_lifetime"))
            .set_opt("ikelifetime", d.get_opt_int("ike_lifetime"));
        params
    }
}

#[async_trait]
impl Resource for VpnCustomerGatewayResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_vpn_customer_gateway"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("cidr", Attribute::required_string_set())
            .attr("esp_policy", Attribute::required_string())
            .attr("gateway", Attribute::required_string())
            .attr("ike_policy", Attribute::required_string())
            .attr("ipsec_psk", Attribute::required_string().sensitive())
            .attr("dpd", Attribute::optional_bool().computed())
            .attr("esp_lifetime", Attribute::optional_int().computed())
            .attr("ike_lifetime", Attribute::optional_int().computed())
            .with_project()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();

        let mut params = self.gateway_params(d);
        resolve::set_project_id(client, d, &mut params).await?;

        let result = client
            .execute_async("createVpnCustomerGateway", &params)
            .await
            .context(|| format!("creating VPN customer gateway {}", name))?;
        let id = extract_id("createVpnCustomerGateway", &result, "vpncustomergateway")
            .context(|| format!("creating VPN customer gateway {}", name))?;

        tracing::info!(id = %id, name = %name, "VPN customer gateway created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("listall", "true")]);
        resolve::set_project_id(client, d, &mut params).await?;

        let gateway: Option<VpnCustomerGateway> = client
            .get_by_id("listVpnCustomerGateways", "vpncustomergateway", d.id(), &params)
            .await
            .context(|| format!("retrieving VPN customer gateway {}", d.id()))?;

        let Some(gateway) = gateway else {
            mark_gone(d, "VPN customer gateway");
            return Ok(());
        };

        let cidrs: Vec<String> = gateway
            .cidrlist
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();

        d.set("name", gateway.name);
        d.set("cidr", cidrs);
        d.set("esp_policy", gateway.esppolicy);
        d.set("gateway", gateway.gateway);
        d.set("ike_policy", gateway.ikepolicy);
        if !gateway.ipsecpsk.is_empty() {
            d.set("ipsec_psk", gateway.ipsecpsk);
        }
        d.set("dpd", gateway.dpd);
        d.set("esp_lifetime", gateway.esplifetime);
        d.set("ike_lifetime", gateway.ikelifetime);
        resolve::set_project(d, &gateway.project, &gateway.projectid);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = self.gateway_params(d);
        params.set("id", d.id());
        client
            .execute_async("updateVpnCustomerGateway", &params)
            .await
            .context(|| format!("updating VPN customer gateway {}", d.id()))?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteVpnCustomerGateway", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting VPN customer gateway {}", d.id()))
    }
}
