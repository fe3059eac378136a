use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params};
use crate::error::{Context, Result};
use crate::resolve;
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PublicIpAddress {
    isstaticnat: bool,
    virtualmachineid: String,
    vmipaddress: String,
    project: String,
    projectid: String,
}

/// `cloudstack_static_nat`: one to one NAT between a public IP and an
/// instance. The id is the public IP's id.
pub struct StaticNatResource;

#[async_trait]
impl Resource for StaticNatResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_static_nat"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("ip_address_id", Attribute::required_string().force_new())
            .attr("virtual_machine_id", Attribute::required_string().force_new())
            .attr("vm_guest_ip", Attribute::optional_string().computed().force_new())
            .with_project()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let ip_id = d.get_str("ip_address_id").to_string();

        let mut params = Params::from([("ipaddressid", ip_id.as_str())]);
        params
            .set("virtualmachineid", d.get_str("virtual_machine_id"))
            .set_nonempty("vmguestip", d.get_str("vm_guest_ip"));

        client
            .execute("enableStaticNat", &params)
            .await
            .context(|| format!("enabling static NAT on IP {}", ip_id))?;

        tracing::info!(ip = %ip_id, "static NAT enabled");
        d.set_id(ip_id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("listall", "true")]);
        resolve::set_project_id(client, d, &mut params).await?;

        let ip: Option<PublicIpAddress> = client
            .get_by_id("listPublicIpAddresses", "publicipaddress", d.id(), &params)
            .await
            .context(|| format!("retrieving IP address {}", d.id()))?;

        let Some(ip) = ip.filter(|ip| ip.isstaticnat) else {
            mark_gone(d, "static NAT");
            return Ok(());
        };

        d.set("ip_address_id", d.id().to_string());
        d.set("virtual_machine_id", ip.virtualmachineid);
        d.set("vm_guest_ip", ip.vmipaddress);
        resolve::set_project(d, &ip.project, &ip.projectid);
        Ok(())
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("disableStaticNat", &Params::from([("ipaddressid", d.id())]))
                .await,
        )
        .context(|| format!("disabling static NAT on IP {}", d.id()))
    }
}
