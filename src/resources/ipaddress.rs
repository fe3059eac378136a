use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, Tag, extract_id, tags_to_map};
use crate::error::{Context, ProviderError, Result};
use crate::resolve::{self, Kind};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};
use crate::tags;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PublicIpAddress {
    ipaddress: String,
    associatednetworkid: String,
    vpcid: String,
    zoneid: String,
    zonename: String,
    issourcenat: bool,
    isportable: bool,
    project: String,
    projectid: String,
    tags: Vec<Tag>,
}

/// `cloudstack_ipaddress`: a public IP acquired for a network or VPC.
pub struct IpAddressResource;

#[async_trait]
impl Resource for IpAddressResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_ipaddress"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("is_portable", Attribute::optional_bool().default(false).force_new())
            .attr("network_id", Attribute::optional_string().force_new())
            .attr("vpc_id", Attribute::optional_string().force_new())
            .attr("zone", Attribute::optional_string().computed().force_new())
            .attr("ip_address", Attribute::computed_string())
            .attr("is_source_nat", Attribute::computed_bool())
            .with_project()
            .with_tags()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let network_id = d.get_str("network_id").to_string();
        let vpc_id = d.get_str("vpc_id").to_string();
        if network_id.is_empty() && vpc_id.is_empty() && !d.get_bool("is_portable") {
            return Err(ProviderError::validation(
                self.type_name(),
                "either network_id or vpc_id must be set",
            ));
        }

        let mut params = Params::new();
        params
            .set_nonempty("networkid", &network_id)
            .set_nonempty("vpcid", &vpc_id);
        if d.get_bool("is_portable") {
            params.set("isportable", true);
        }
        if let Some(zone) = d.get_opt_str("zone") {
            params.set("zoneid", resolve::retrieve_id(client, Kind::Zone, zone).await?);
        }
        resolve::set_project_id(client, d, &mut params).await?;

        let result = client
            .execute_async("associateIpAddress", &params)
            .await
            .context(|| "associating a new IP address".to_string())?;
        let id = extract_id("associateIpAddress", &result, "ipaddress")
            .context(|| "associating a new IP address".to_string())?;
        d.set_id(id);

        tags::set_tags(client, d, "PublicIpAddress").await?;

        tracing::info!(id = d.id(), "IP address associated");
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("listall", "true")]);
        resolve::set_project_id(client, d, &mut params).await?;

        let ip: Option<PublicIpAddress> = client
            .get_by_id("listPublicIpAddresses", "publicipaddress", d.id(), &params)
            .await
            .context(|| format!("retrieving IP address {}", d.id()))?;

        let Some(ip) = ip else {
            mark_gone(d, "IP address");
            return Ok(());
        };

        d.set("ip_address", ip.ipaddress);
        d.set("is_source_nat", ip.issourcenat);
        d.set("is_portable", ip.isportable);
        if !ip.associatednetworkid.is_empty() && d.get_opt_str("vpc_id").is_none() {
            d.set("network_id", ip.associatednetworkid);
        }
        if !ip.vpcid.is_empty() {
            d.set("vpc_id", ip.vpcid);
        }
        resolve::set_value_or_id(d, "zone", &ip.zonename, &ip.zoneid);
        resolve::set_project(d, &ip.project, &ip.projectid);
        d.set_string_map("tags", &tags_to_map(&ip.tags));
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        tags::set_tags(client, d, "PublicIpAddress").await?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("disassociateIpAddress", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("disassociating IP address {}", d.id()))
    }
}
