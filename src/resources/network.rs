use std::net::Ipv4Addr;

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
struct Network {
    name: String,
    displaytext: String,
    cidr: String,
    gateway: String,
    networkdomain: String,
    vpcid: String,
    aclid: String,
    zoneid: String,
    zonename: String,
    networkofferingid: String,
    networkofferingname: String,
    project: String,
    projectid: String,
    tags: Vec<Tag>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NetworkOffering {
    specifyipranges: bool,
}

/// Addresses derived from an IPv4 CIDR.
#[derive(Debug, PartialEq)]
struct CidrRanges {
    gateway: Ipv4Addr,
    netmask: Ipv4Addr,
    start_ip: Ipv4Addr,
    end_ip: Ipv4Addr,
}

/// Gateway is the first usable address, the IP range runs from the second
/// usable address to the last one.
fn cidr_ranges(cidr: &str) -> Result<CidrRanges> {
    let invalid = |reason: &str| ProviderError::Config(format!("invalid CIDR '{}': {}", cidr, reason));

    let (addr, prefix) = cidr
        .split_once('/')
        .ok_or_else(|| invalid("missing prefix length"))?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid("bad address"))?;
    let prefix: u32 = prefix.parse().map_err(|_| invalid("bad prefix length"))?;
    if prefix > 30 {
        return Err(invalid("prefix length must be 30 or less"));
    }

    let mask = if prefix == 0 { 0 } else { u32::MAX << (32 - prefix) };
    let network = u32::from(addr) & mask;
    let broadcast = network | !mask;

    Ok(CidrRanges {
        gateway: Ipv4Addr::from(network + 1),
        netmask: Ipv4Addr::from(mask),
        start_ip: Ipv4Addr::from(network + 2),
        end_ip: Ipv4Addr::from(broadcast - 1),
    })
}

/// `cloudstack_network`: an isolated, shared or VPC tier network.
pub struct NetworkResource;

impl NetworkResource {
    async fn specifies_ip_ranges(&self, client: &CloudStackClient, offering_id: &str) -> Result<bool> {
        let offering: Option<NetworkOffering> = client
            .get_by_id("listNetworkOfferings", "networkoffering", offering_id, &Params::new())
            .await
            .context(|| format!("retrieving network offering {}", offering_id))?;
        Ok(offering.map(|o| o.specifyipranges).unwrap_or(false))
    }
}

#[async_trait]
impl Resource for NetworkResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_network"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("display_text", Attribute::optional_string().computed())
            .attr("cidr", Attribute::optional_string().computed().force_new())
            .attr("gateway", Attribute::optional_string().computed().force_new())
            .attr("startip", Attribute::optional_string().computed().force_new())
            .attr("endip", Attribute::optional_string().computed().force_new())
            .attr("network_domain", Attribute::optional_string().computed())
            .attr("network_offering", Attribute::required_string())
            .attr("vlan", Attribute::optional_string().force_new())
            .attr("vpc_id", Attribute::optional_string().force_new())
            .attr("acl_id", Attribute::optional_string().computed())
            .attr("source_nat_ip", Attribute::optional_bool().default(false).force_new())
            .attr("source_nat_ip_address", Attribute::computed_string())
            .attr("source_nat_ip_id", Attribute::computed_string())
            .attr("zone", Attribute::required_string().force_new())
            .with_project()
            .with_tags()
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        let vpc_id = d.get_str("vpc_id").to_string();
        if vpc_id.is_empty() && d.get_opt_str("acl_id").is_some() {
            return Err(ProviderError::validation(
                self.type_name(),
                "acl_id can only be set on networks inside a VPC",
            ));
        }

        let zone_id = resolve::retrieve_id(client, Kind::Zone, d.get_str("zone")).await?;
        let offering_id =
            resolve::retrieve_id(client, Kind::NetworkOffering, d.get_str("network_offering"))
                .await?;

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("displaytext", d.get_opt_str("display_text").unwrap_or(&name))
            .set("zoneid", zone_id)
            .set("networkofferingid", &offering_id)
            .set_nonempty("vlan", d.get_str("vlan"))
            .set_nonempty("networkdomain", d.get_str("network_domain"))
            .set_nonempty("vpcid", &vpc_id)
            .set_nonempty("aclid", d.get_str("acl_id"));

        if let Some(cidr) = d.get_opt_str("cidr") {
            let ranges = cidr_ranges(cidr)?;
            params
                .set("gateway", d.get_opt_str("gateway").map(str::to_string).unwrap_or(ranges.gateway.to_string()))
                .set("netmask", ranges.netmask);
            if self.specifies_ip_ranges(client, &offering_id).await? {
                params
                    .set("startip", d.get_opt_str("startip").map(str::to_string).unwrap_or(ranges.start_ip.to_string()))
                    .set("endip", d.get_opt_str("endip").map(str::to_string).unwrap_or(ranges.end_ip.to_string()));
            }
        }
        resolve::set_project_id(client, d, &mut params).await?;

        let response = client
            .execute("createNetwork", &params)
            .await
            .context(|| format!("creating network {}", name))?;
        let id = extract_id("createNetwork", &response, "network")
            .context(|| format!("creating network {}", name))?;
        d.set_id(id.clone());

        tags::set_tags(client, d, "Network").await?;

        if d.get_bool("source_nat_ip") {
            let mut ip_params = Params::from([("networkid", id.as_str())]);
            resolve::set_project_id(client, d, &mut ip_params).await?;
            let result = client
                .execute_async("associateIpAddress", &ip_params)
                .await
                .context(|| format!("associating source NAT IP for network {}", name))?;
            let ip_id = extract_id("associateIpAddress", &result, "ipaddress")
                .context(|| format!("associating source NAT IP for network {}", name))?;
            let address = result
                .get("ipaddress")
                .and_then(|ip| ip.get("ipaddress"))
                .and_then(|ip| ip.as_str())
                .unwrap_or("")
                .to_string();
            d.set("source_nat_ip_id", ip_id);
            d.set("source_nat_ip_address", address);
        }

        tracing::info!(id = %id, name = %name, "network created");
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("listall", "true")]);
        resolve::set_project_id(client, d, &mut params).await?;

        let network: Option<Network> = client
            .get_by_id("listNetworks", "network", d.id(), &params)
            .await
            .context(|| format!("retrieving network {}", d.id()))?;

        let Some(network) = network else {
            mark_gone(d, "network");
            return Ok(());
        };

        d.set("name", network.name);
        d.set("display_text", network.displaytext);
        d.set("cidr", network.cidr);
        d.set("gateway", network.gateway);
        d.set("network_domain", network.networkdomain);
        d.set("vpc_id", network.vpcid);
        if !network.aclid.is_empty() {
            d.set("acl_id", network.aclid);
        }
        resolve::set_value_or_id(
            d,
            "network_offering",
            &network.networkofferingname,
            &network.networkofferingid,
        );
        resolve::set_value_or_id(d, "zone", &network.zonename, &network.zoneid);
        resolve::set_project(d, &network.project, &network.projectid);
        d.set_string_map("tags", &tags_to_map(&network.tags));
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let id = d.id().to_string();

        let changed = ["name", "display_text", "network_domain", "network_offering"];
        if changed.iter().any(|k| d.has_change(k)) {
            let mut params = Params::from([("id", id.as_str())]);
            params
                .set("name", d.get_str("name"))
                .set_nonempty("displaytext", d.get_str("display_text"))
                .set_nonempty("networkdomain", d.get_str("network_domain"));
            if d.has_change("network_offering") {
                let offering_id = resolve::retrieve_id(
                    client,
                    Kind::NetworkOffering,
                    d.get_str("network_offering"),
                )
                .await?;
                params.set("networkofferingid", offering_id);
            }
            client
                .execute_async("updateNetwork", &params)
                .await
                .context(|| format!("updating network {}", id))?;
        }

        if d.has_change("acl_id") {
            if let Some(acl_id) = d.get_opt_str("acl_id") {
                let mut params = Params::from([("networkid", id.as_str())]);
                params.set("aclid", acl_id);
                client
                    .execute_async("replaceNetworkACLList", &params)
                    .await
                    .context(|| format!("replacing the ACL of network {}", id))?;
            }
        }

        tags::set_tags(client, d, "Network").await?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        if let Some(ip_id) = d.get_opt_str("source_nat_ip_id") {
            ignore_not_found(
                client
                    .execute_async("disassociateIpAddress", &Params::from([("id", ip_id)]))
                    .await,
            )
            .context(|| format!("disassociating source NAT IP {}", ip_id))?;
        }
        ignore_not_found(
            client
                .execute_async("deleteNetwork", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting network {}", d.id()))
    }
}
