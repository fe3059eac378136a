use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, Tag, extract_id, tags_to_map};
use crate::error::{Context, Result};
use crate::resolve::{self, Kind};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};
use crate::tags;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Vpc {
    name: String,
    displaytext: String,
    cidr: String,
    networkdomain: String,
    vpcofferingid: String,
    vpcofferingname: String,
    zoneid: String,
    zonename: String,
    project: String,
    projectid: String,
    tags: Vec<Tag>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PublicIpAddress {
    ipaddress: String,
}

/// `cloudstack_vpc`: a VPC and its source NAT address.
pub struct VpcResource;

impl VpcResource {
    async fn source_nat_ip(
        &self,
        client: &CloudStackClient,
        d: &ResourceData,
    ) -> Result<Option<String>> {
        let mut params = Params::from([("vpcid", d.id())]);
        params.set("issourcenat", true).set("listall", true);
        resolve::set_project_id(client, d, &mut params).await?;

        let ips: Vec<PublicIpAddress> = client
            .list("listPublicIpAddresses", "publicipaddress", &params)
            .await
            .context(|| format!("retrieving source NAT IP of VPC {}", d.id()))?;
        Ok(ips.into_iter().next().map(|ip| ip.ipaddress))
    }
}

#[async_trait]
impl Resource for VpcResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_vpc"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("display_text", Attribute::optional_string().computed())
            .attr("cidr", Attribute::required_string().force_new())
            .attr("vpc_offering", Attribute::required_string().force_new())
            .attr("network_domain", Attribute::optional_string().computed().force_new())
            .attr("zone", Attribute::required_string().force_new())
            .attr("source_nat_ip", Attribute::computed_string())
            .with_project()
            .with_tags()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        let zone_id = resolve::retrieve_id(client, Kind::Zone, d.get_str("zone")).await?;
        let offering_id =
            resolve::retrieve_id(client, Kind::VpcOffering, d.get_str("vpc_offering")).await?;

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("displaytext", d.get_opt_str("display_text").unwrap_or(&name))
            .set("cidr", d.get_str("cidr"))
            .set("vpcofferingid", offering_id)
            .set("zoneid", zone_id)
            .set_nonempty("networkdomain", d.get_str("network_domain"));
        resolve::set_project_id(client, d, &mut params).await?;

        let result = client
            .execute_async("createVPC", &params)
            .await
            .context(|| format!("creating VPC {}", name))?;
        let id = extract_id("createVPC", &result, "vpc")
            .context(|| format!("creating VPC {}", name))?;
        d.set_id(id.clone());

        tags::set_tags(client, d, "Vpc").await?;

        tracing::info!(id = %id, name = %name, "VPC created");
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("listall", "true")]);
        resolve::set_project_id(client, d, &mut params).await?;

        let vpc: Option<Vpc> = client
            .get_by_id("listVPCs", "vpc", d.id(), &params)
            .await
            .context(|| format!("retrieving VPC {}", d.id()))?;

        let Some(vpc) = vpc else {
            mark_gone(d, "VPC");
            return Ok(());
        };

        let source_nat_ip = self.source_nat_ip(client, d).await?;

        d.set("name", vpc.name);
        d.set("display_text", vpc.displaytext);
        d.set("cidr", vpc.cidr);
        d.set("network_domain", vpc.networkdomain);
        d.set("source_nat_ip", source_nat_ip.unwrap_or_default());
        resolve::set_value_or_id(d, "vpc_offering", &vpc.vpcofferingname, &vpc.vpcofferingid);
        resolve::set_value_or_id(d, "zone", &vpc.zonename, &vpc.zoneid);
        resolve::set_project(d, &vpc.project, &vpc.projectid);
        d.set_string_map("tags", &tags_to_map(&vpc.tags));
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if d.has_change("name") || d.has_change("display_text") {
            let mut params = Params::from([("id", d.id())]);
            params
                .set("name", d.get_str("name"))
                .set_nonempty("displaytext", d.get_str("display_text"));
            client
                .execute_async("updateVPC", &params)
                .await
                .context(|| format!("updating VPC {}", d.id()))?;
        }

        tags::set_tags(client, d, "Vpc").await?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute_async("deleteVPC", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting VPC {}", d.id()))
    }
}
