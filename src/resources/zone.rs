use async_trait::async_trait;
use serde::Deserialize;

use super::{ignore_not_found, mark_gone};
use crate::cloudstack::{CloudStackClient, Params, extract_id};
use crate::error::{Context, ProviderError, Result};
use crate::resource::{AttributeReader, Resource, ResourceData};
use crate::schema::{Attribute, Schema};

const NETWORK_TYPES: [&str; 2] = ["Basic", "Advanced"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Zone {
    name: String,
    dns1: String,
    dns2: String,
    internaldns1: String,
    internaldns2: String,
    networktype: String,
    domain: String,
    allocationstate: String,
    localstorageenabled: bool,
    securitygroupsenabled: bool,
}

pub struct ZoneResource;

#[async_trait]
impl Resource for ZoneResource {
    fn type_name(&self) -> &'static str {
        "cloudstack_zone"
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .attr("name", Attribute::required_string())
            .attr("dns1", Attribute::required_string())
            .attr("dns2", Attribute::optional_string().computed())
            .attr("internal_dns1", Attribute::required_string())
            .attr("internal_dns2", Attribute::optional_string().computed())
            .attr("network_type", Attribute::required_string().force_new())
            .attr("domain", Attribute::optional_string().computed())
            .attr("allocation_state", Attribute::optional_string().computed())
            .attr("local_storage_enabled", Attribute::optional_bool().computed())
            .attr("security_group_enabled", Attribute::optional_bool().computed().force_new())
    }

    async fn create(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let name = d.get_str("name").to_string();
        let network_type = d.get_str("network_type");
        if !NETWORK_TYPES.contains(&network_type) {
            return Err(ProviderError::validation(
                self.type_name(),
                format!("network_type must be Basic or Advanced, got '{}'", network_type),
            ));
        }

        let mut params = Params::new();
        params
            .set("name", &name)
            .set("dns1", d.get_str("dns1"))
            .set("internaldns1", d.get_str("internal_dns1"))
            .set("networktype", network_type)
            .set_nonempty("dns2", d.get_str("dns2"))
            .set_nonempty("internaldns2", d.get_str("internal_dns2"))
            .set_nonempty("domain", d.get_str("domain"))
            .set_nonempty("allocationstate", d.get_str("allocation_state"))
            .set_opt("localstorageenabled", d.get_opt_bool("local_storage_enabled"))
            .set_opt("securitygroupenabled", d.get_opt_bool("security_group_enabled"));

        let response = client
            .execute("createZone", &params)
            .await
            .context(|| format!("creating zone {}", name))?;
        let id = extract_id("createZone", &response, "zone")
            .context(|| format!("creating zone {}", name))?;

        tracing::info!(id = %id, name = %name, "zone created");
        d.set_id(id);
        self.read(client, d).await
    }

    async fn read(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let zone: Option<Zone> = client
            .get_by_id("listZones", "zone", d.id(), &Params::new())
            .await
            .context(|| format!("retrieving zone {}", d.id()))?;

        let Some(zone) = zone else {
            mark_gone(d, "zone");
            return Ok(());
        };

        d.set("name", zone.name);
        d.set("dns1", zone.dns1);
        d.set("dns2", zone.dns2);
        d.set("internal_dns1", zone.internaldns1);
        d.set("internal_dns2", zone.internaldns2);
        d.set("network_type", zone.networktype);
        d.set("domain", zone.domain);
        d.set("allocation_state", zone.allocationstate);
        d.set("local_storage_enabled", zone.localstorageenabled);
        d.set("security_group_enabled", zone.securitygroupsenabled);
        Ok(())
    }

    async fn update(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        let mut params = Params::from([("id", d.id())]);
        params
            .set("name", d.get_str("name"))
            .set("dns1", d.get_str("dns1"))
            .set("internaldns1", d.get_str("internal_dns1"))
            .set_nonempty("dns2", d.get_str("dns2"))
            .set_nonempty("internaldns2", d.get_str("internal_dns2"))
            .set_nonempty("domain", d.get_str("domain"))
            .set_nonempty("allocationstate", d.get_str("allocation_state"))
            .set_opt("localstorageenabled", d.get_opt_bool("local_storage_enabled"));
        client
            .execute("updateZone", &params)
            .await
            .context(|| format!("updating zone {}", d.id()))?;
        self.read(client, d).await
    }

    async fn delete(&self, client: &CloudStackClient, d: &mut ResourceData) -> Result<()> {
        ignore_not_found(
            client
                .execute("deleteZone", &Params::from([("id", d.id())]))
                .await,
        )
        .context(|| format!("deleting zone {}", d.id()))
    }
}
